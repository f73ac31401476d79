use crate::samples::{read_samples, SampleSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Percentiles reported for every test file, as fractions
pub const REPORTED_PERCENTILES: [f64; 3] = [0.50, 0.95, 0.99];

/// Errors raised while analyzing a single sample file
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file contained no parseable samples at all
    #[error("no valid latency measurements found in {path}")]
    EmptyInput { path: String },
}

/// Latency distribution of one sample file, in microseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub system: String,
    pub test_file: String,
    pub count: usize,
    pub avg_micros: f64,
    pub min_micros: i64,
    pub max_micros: i64,
    pub p50_micros: i64,
    pub p95_micros: i64,
    pub p99_micros: i64,
}

impl TestResult {
    /// Summarize a set of samples.
    ///
    /// Returns `None` when there is nothing to summarize.
    pub fn from_samples(system: &str, test_file: &str, samples: &[i64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        // i128 so extreme but valid samples cannot overflow the sum
        let sum: i128 = sorted.iter().map(|&v| v as i128).sum();
        let avg_micros = sum as f64 / sorted.len() as f64;

        Some(Self {
            system: system.to_string(),
            test_file: test_file.to_string(),
            count: sorted.len(),
            avg_micros,
            min_micros: sorted[0],
            max_micros: sorted[sorted.len() - 1],
            p50_micros: percentile(&sorted, REPORTED_PERCENTILES[0]) as i64,
            p95_micros: percentile(&sorted, REPORTED_PERCENTILES[1]) as i64,
            p99_micros: percentile(&sorted, REPORTED_PERCENTILES[2]) as i64,
        })
    }
}

/// Percentile of ascending-sorted data by linear interpolation.
///
/// `p` is a fraction in `[0, 1]`. The rank `p * (n - 1)` is split into a
/// lower index and a weight toward the next sample; when there is no next
/// sample the lower sample is returned as is. Empty input yields 0.
pub fn percentile(sorted_data: &[i64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 {
        return 0.0;
    }
    if p <= 0.0 {
        return sorted_data[0] as f64;
    }
    if p >= 1.0 {
        return sorted_data[n - 1] as f64;
    }

    let index = p * (n - 1) as f64;
    let lower = index.floor() as usize;
    let upper = lower + 1;

    if upper >= n {
        return sorted_data[lower] as f64;
    }

    let weight = index - lower as f64;
    sorted_data[lower] as f64 * (1.0 - weight) + sorted_data[upper] as f64 * weight
}

/// Read and summarize one sample file.
///
/// Invalid lines are skipped (and logged by the reader); a file with no
/// valid samples is an error rather than an all-zero result.
pub fn analyze_file(system: &str, path: &Path) -> Result<TestResult, StatsError> {
    let set = read_samples(path).map_err(|source| StatsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    analyze_sample_set(system, path, &set)
}

pub(crate) fn analyze_sample_set(
    system: &str,
    path: &Path,
    set: &SampleSet,
) -> Result<TestResult, StatsError> {
    let test_file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    TestResult::from_samples(system, &test_file, &set.samples).ok_or_else(|| {
        StatsError::EmptyInput {
            path: path.display().to_string(),
        }
    })
}
