use crate::metrics::{analyze_file, TestResult};
use crate::utils::{format_avg_micros, format_ratio};
use colored::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Where to find the sample files of one backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub name: String,
    pub directory: PathBuf,
    /// File name pattern with at most one `*` wildcard, e.g. `test_*.txt`
    pub file_pattern: String,
}

impl BackendDescriptor {
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        file_pattern: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            file_pattern: file_pattern.into(),
        }
    }

    /// `<root>/<name>` with the default `test_*.txt` pattern
    pub fn under(root: &Path, name: &str) -> Self {
        Self::new(
            name,
            root.join(name),
            crate::defaults::SAMPLE_FILE_PATTERN,
        )
    }

    /// Whether a file name matches this backend's pattern
    pub fn matches(&self, file_name: &str) -> bool {
        match self.file_pattern.split_once('*') {
            Some((prefix, suffix)) => {
                file_name.len() >= prefix.len() + suffix.len()
                    && file_name.starts_with(prefix)
                    && file_name.ends_with(suffix)
            }
            None => file_name == self.file_pattern,
        }
    }
}

/// Reasons a backend contributes nothing to the report
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("No results directory found for {backend}")]
    MissingDirectory { backend: String, path: PathBuf },

    #[error("No test files found for {backend}")]
    NoMatchingFiles { backend: String, path: PathBuf },

    /// Files were found but none of them held a valid sample
    #[error("No valid test files for {backend}")]
    NoValidResults { backend: String },

    #[error("Error reading {backend} results: {source}")]
    Io {
        backend: String,
        #[source]
        source: io::Error,
    },
}

/// Sample files for a backend, sorted by path
pub fn discover_files(backend: &BackendDescriptor) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !backend.directory.is_dir() {
        return Err(DiscoveryError::MissingDirectory {
            backend: backend.name.clone(),
            path: backend.directory.clone(),
        });
    }

    let io_err = |source: io::Error| DiscoveryError::Io {
        backend: backend.name.clone(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(&backend.directory).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name();
        let matches = name.to_str().map_or(false, |n| backend.matches(n));
        if matches && entry.path().is_file() {
            files.push(entry.path());
        }
    }

    if files.is_empty() {
        return Err(DiscoveryError::NoMatchingFiles {
            backend: backend.name.clone(),
            path: backend.directory.clone(),
        });
    }

    files.sort();
    Ok(files)
}

/// All analyzed tests of one system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemReport {
    pub system: String,
    /// Sorted by file name
    pub results: Vec<TestResult>,
    /// Sample-weighted mean over all tests
    pub overall_avg_micros: f64,
    pub total_messages: usize,
}

impl SystemReport {
    /// `None` when no test of this system could be analyzed
    pub fn new(system: &str, mut results: Vec<TestResult>) -> Option<Self> {
        if results.is_empty() {
            return None;
        }
        results.sort_by(|a, b| a.test_file.cmp(&b.test_file));

        Some(Self {
            system: system.to_string(),
            overall_avg_micros: weighted_average(&results),
            total_messages: results.iter().map(|r| r.count).sum(),
            results,
        })
    }
}

/// `Σ(avg × count) / Σ(count)`; 0 when there are no samples
pub fn weighted_average(results: &[TestResult]) -> f64 {
    let total_count: usize = results.iter().map(|r| r.count).sum();
    if total_count == 0 {
        return 0.0;
    }
    let total_latency: f64 = results
        .iter()
        .map(|r| r.avg_micros * r.count as f64)
        .sum();
    total_latency / total_count as f64
}

/// Ranking input for one system.
///
/// Unlike [`SystemReport::overall_avg_micros`], this is the plain mean of
/// the per-test averages, so every test counts equally regardless of size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub name: String,
    pub avg_micros: f64,
    pub test_count: usize,
}

impl SystemSummary {
    pub fn from_report(report: &SystemReport) -> Self {
        let test_count = report.results.len();
        let sum: f64 = report.results.iter().map(|r| r.avg_micros).sum();
        Self {
            name: report.system.clone(),
            avg_micros: if test_count > 0 {
                sum / test_count as f64
            } else {
                0.0
            },
            test_count,
        }
    }
}

/// A system's place in the comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSystem {
    /// 1 is fastest
    pub rank: usize,
    pub summary: SystemSummary,
    /// `avg / fastest avg`; `None` for the fastest system itself
    pub slowdown: Option<f64>,
}

/// Sort ascending by mean latency and attach ranks and slowdown ratios.
///
/// The sort is stable, so equal means keep their input order.
pub fn rank_systems(mut summaries: Vec<SystemSummary>) -> Vec<RankedSystem> {
    summaries.sort_by(|a, b| a.avg_micros.total_cmp(&b.avg_micros));

    let fastest_avg = summaries.first().map(|s| s.avg_micros);
    summaries
        .into_iter()
        .enumerate()
        .map(|(i, summary)| {
            let slowdown = match (i, fastest_avg) {
                (0, _) | (_, None) => None,
                (_, Some(fastest)) => Some(summary.avg_micros / fastest),
            };
            RankedSystem {
                rank: i + 1,
                summary,
                slowdown,
            }
        })
        .collect()
}

/// A backend left out of the report, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedBackend {
    pub name: String,
    pub reason: String,
}

/// Everything a single analysis pass produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// In backend configuration order
    pub systems: Vec<SystemReport>,
    pub ranking: Vec<RankedSystem>,
    pub skipped: Vec<SkippedBackend>,
}

/// Analysis pass over an explicit list of backends
pub struct ResultsAnalyzer {
    backends: Vec<BackendDescriptor>,
}

impl ResultsAnalyzer {
    pub fn new(backends: Vec<BackendDescriptor>) -> Self {
        Self { backends }
    }

    pub fn backends(&self) -> &[BackendDescriptor] {
        &self.backends
    }

    /// Analyze every backend in order.
    ///
    /// Missing directories, missing files and unreadable or empty files are
    /// logged and skipped; they never abort the pass.
    pub fn run(&self) -> AnalysisReport {
        let mut report = AnalysisReport::default();

        for backend in &self.backends {
            match self.analyze_backend(backend) {
                Ok(system) => {
                    info!(
                        "Analyzed {} tests ({} messages) for {}",
                        system.results.len(),
                        system.total_messages,
                        backend.name
                    );
                    report.systems.push(system);
                }
                Err(e) => {
                    warn!("{}", e);
                    report.skipped.push(SkippedBackend {
                        name: backend.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let summaries = report
            .systems
            .iter()
            .map(SystemSummary::from_report)
            .collect();
        report.ranking = rank_systems(summaries);
        report
    }

    fn analyze_backend(&self, backend: &BackendDescriptor) -> Result<SystemReport, DiscoveryError> {
        let files = discover_files(backend)?;
        debug!("Found {} sample files for {}", files.len(), backend.name);

        let mut results = Vec::with_capacity(files.len());
        for file in &files {
            match analyze_file(&backend.name, file) {
                Ok(result) => results.push(result),
                Err(e) => warn!("Error analyzing {}: {}", file.display(), e),
            }
        }

        SystemReport::new(&backend.name, results).ok_or_else(|| DiscoveryError::NoValidResults {
            backend: backend.name.clone(),
        })
    }
}

/// Print the per-system sections followed by the cross-system comparison
pub fn render_report<W: Write>(report: &AnalysisReport, out: &mut W) -> io::Result<()> {
    for system in &report.systems {
        writeln!(out)?;
        writeln!(
            out,
            "{}",
            format!("=== {} Results ===", system.system.to_uppercase()).bold()
        )?;

        for (i, result) in system.results.iter().enumerate() {
            writeln!(
                out,
                "Test {}: avg={}, min={}μs, max={}μs, p50={}μs, p95={}μs, p99={}μs ({} msgs)",
                i + 1,
                format_avg_micros(result.avg_micros),
                result.min_micros,
                result.max_micros,
                result.p50_micros,
                result.p95_micros,
                result.p99_micros,
                result.count
            )?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "Overall {}: {} average across {} tests ({} total messages)",
            system.system,
            format_avg_micros(system.overall_avg_micros),
            system.results.len(),
            system.total_messages
        )?;
    }

    if !report.ranking.is_empty() {
        render_comparison(&report.ranking, out)?;
    }
    Ok(())
}

fn render_comparison<W: Write>(ranking: &[RankedSystem], out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "=== SYSTEM COMPARISON ===".bold())?;
    writeln!(out, "Rank | System     | Avg Latency | Tests")?;
    writeln!(out, "-----|------------|-------------|------")?;
    for ranked in ranking {
        writeln!(
            out,
            "{:<4} | {:<10} | {:>8.1}μs | {}",
            ranked.rank, ranked.summary.name, ranked.summary.avg_micros, ranked.summary.test_count
        )?;
    }

    if ranking.len() > 1 {
        let fastest = ranking[0].summary.name.to_uppercase();
        writeln!(out)?;
        writeln!(
            out,
            "{}",
            format!("{} is the fastest system tested.", fastest).green()
        )?;
        for ranked in &ranking[1..] {
            if let Some(ratio) = ranked.slowdown {
                writeln!(
                    out,
                    "{} is {} slower than {}",
                    ranked.summary.name.to_uppercase(),
                    format_ratio(ratio),
                    fastest
                )?;
            }
        }
    }
    Ok(())
}

/// Host details recorded alongside exported results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: num_cpus::get(),
        }
    }
}

/// Export metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub total_tests: usize,
    pub system_info: SystemInfo,
}

/// The JSON document written by `analyze --json`
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportedReport {
    pub metadata: ReportMetadata,
    #[serde(flatten)]
    pub report: AnalysisReport,
}

impl AnalysisReport {
    pub fn total_tests(&self) -> usize {
        self.systems.iter().map(|s| s.results.len()).sum()
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let document = ExportedReport {
            metadata: ReportMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                total_tests: self.total_tests(),
                system_info: SystemInfo::default(),
            },
            report: self.clone(),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&document)?;
        fs::write(path, json)?;

        info!("Analysis written to: {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn result(system: &str, file: &str, avg: f64, count: usize) -> TestResult {
        TestResult {
            system: system.to_string(),
            test_file: file.to_string(),
            count,
            avg_micros: avg,
            min_micros: 0,
            max_micros: 0,
            p50_micros: 0,
            p95_micros: 0,
            p99_micros: 0,
        }
    }

    fn summary(name: &str, avg: f64) -> SystemSummary {
        SystemSummary {
            name: name.to_string(),
            avg_micros: avg,
            test_count: 1,
        }
    }

    #[test]
    fn test_pattern_matching() {
        let backend = BackendDescriptor::new("kafka", "results/kafka", "test_*.txt");
        assert!(backend.matches("test_1700000000.txt"));
        assert!(backend.matches("test_.txt"));
        assert!(!backend.matches("test.txt"));
        assert!(!backend.matches("run_1.txt"));
        assert!(!backend.matches("test_1.csv"));

        let exact = BackendDescriptor::new("kafka", "results/kafka", "samples.txt");
        assert!(exact.matches("samples.txt"));
        assert!(!exact.matches("samples.txt.bak"));
    }

    #[test]
    fn test_weighted_overall_differs_from_unweighted_summary() {
        let report = SystemReport::new(
            "simplified",
            vec![
                result("simplified", "test_2.txt", 200.0, 30),
                result("simplified", "test_1.txt", 100.0, 10),
            ],
        )
        .unwrap();

        assert_eq!(report.overall_avg_micros, 175.0);
        assert_eq!(report.total_messages, 40);
        assert_eq!(report.results[0].test_file, "test_1.txt");

        let summary = SystemSummary::from_report(&report);
        assert_eq!(summary.avg_micros, 150.0);
        assert_eq!(summary.test_count, 2);
    }

    #[test]
    fn test_system_report_requires_results() {
        assert!(SystemReport::new("kafka", Vec::new()).is_none());
        assert_eq!(weighted_average(&[]), 0.0);
    }

    #[test]
    fn test_ranking_order_and_ratios() {
        let ranking = rank_systems(vec![
            summary("A", 50.0),
            summary("B", 100.0),
            summary("C", 25.0),
        ]);

        let names: Vec<&str> = ranking.iter().map(|r| r.summary.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        assert_eq!(
            ranking.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(ranking[0].slowdown, None);
        assert_eq!(ranking[1].slowdown, Some(2.0));
        assert_eq!(ranking[2].slowdown, Some(4.0));
    }

    #[test]
    fn test_ranking_ties_keep_input_order() {
        let ranking = rank_systems(vec![
            summary("mqtt", 10.0),
            summary("kafka", 10.0),
            summary("rabbitmq", 5.0),
        ]);
        let names: Vec<&str> = ranking.iter().map(|r| r.summary.name.as_str()).collect();
        assert_eq!(names, vec!["rabbitmq", "mqtt", "kafka"]);
    }

    #[test]
    fn test_discovery_errors() {
        let dir = TempDir::new().unwrap();

        let missing = BackendDescriptor::under(dir.path(), "kafka");
        assert!(matches!(
            discover_files(&missing),
            Err(DiscoveryError::MissingDirectory { .. })
        ));

        fs::create_dir_all(dir.path().join("mqtt")).unwrap();
        fs::write(dir.path().join("mqtt").join("notes.md"), "x").unwrap();
        let empty = BackendDescriptor::under(dir.path(), "mqtt");
        assert!(matches!(
            discover_files(&empty),
            Err(DiscoveryError::NoMatchingFiles { .. })
        ));
    }

    #[test]
    fn test_backend_without_valid_samples_is_skipped() {
        let dir = TempDir::new().unwrap();
        let backend_dir = dir.path().join("rabbitmq");
        fs::create_dir_all(&backend_dir).unwrap();
        fs::write(backend_dir.join("test_1.txt"), "abc\n\n").unwrap();
        fs::write(backend_dir.join("test_2.txt"), "").unwrap();

        let report =
            ResultsAnalyzer::new(vec![BackendDescriptor::under(dir.path(), "rabbitmq")]).run();
        assert!(report.systems.is_empty());
        assert!(report.ranking.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "rabbitmq");
        assert_eq!(report.skipped[0].reason, "No valid test files for rabbitmq");

        let mut out = Vec::new();
        render_report(&report, &mut out).unwrap();
        assert!(!String::from_utf8(out).unwrap().contains("rabbitmq"));
    }

    #[test]
    fn test_discovery_sorts_matching_files() {
        let dir = TempDir::new().unwrap();
        let backend_dir = dir.path().join("simplified");
        fs::create_dir_all(&backend_dir).unwrap();
        for name in ["test_300.txt", "test_100.txt", "other.txt", "test_200.txt"] {
            fs::write(backend_dir.join(name), "1\n").unwrap();
        }
        fs::create_dir_all(backend_dir.join("test_dir.txt")).unwrap();

        let files = discover_files(&BackendDescriptor::under(dir.path(), "simplified")).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["test_100.txt", "test_200.txt", "test_300.txt"]);
    }

    #[test]
    fn test_render_comparison() {
        let report = AnalysisReport {
            systems: vec![SystemReport::new(
                "simplified",
                vec![result("simplified", "test_1.txt", 25.0, 4)],
            )
            .unwrap()],
            ranking: rank_systems(vec![summary("simplified", 25.0), summary("kafka", 100.0)]),
            skipped: Vec::new(),
        };

        let mut out = Vec::new();
        render_report(&report, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("=== SIMPLIFIED Results ==="));
        assert!(text.contains(
            "Test 1: avg=25.0μs, min=0μs, max=0μs, p50=0μs, p95=0μs, p99=0μs (4 msgs)"
        ));
        assert!(text.contains("Overall simplified: 25.0μs average across 1 tests (4 total messages)"));
        assert!(text.contains("Rank | System     | Avg Latency | Tests"));
        assert!(text.contains("1    | simplified |     25.0μs | 1"));
        assert!(text.contains("2    | kafka      |    100.0μs | 1"));
        assert!(text.contains("SIMPLIFIED is the fastest system tested."));
        assert!(text.contains("KAFKA is 4.0x slower than SIMPLIFIED"));
    }

    #[test]
    fn test_render_single_system_has_no_ratio_lines() {
        let report = AnalysisReport {
            systems: Vec::new(),
            ranking: rank_systems(vec![summary("mqtt", 10.0)]),
            skipped: Vec::new(),
        };
        let mut out = Vec::new();
        render_report(&report, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1    | mqtt       |     10.0μs | 1"));
        assert!(!text.contains("fastest system tested"));
    }

    #[test]
    fn test_render_empty_report_prints_nothing() {
        let mut out = Vec::new();
        render_report(&AnalysisReport::default(), &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_write_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("analysis.json");
        let report = AnalysisReport {
            systems: Vec::new(),
            ranking: rank_systems(vec![summary("mqtt", 10.0)]),
            skipped: vec![SkippedBackend {
                name: "kafka".to_string(),
                reason: "No results directory found for kafka".to_string(),
            }],
        };
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["metadata"]["version"], crate::VERSION);
        assert_eq!(value["ranking"][0]["summary"]["name"], "mqtt");
        assert_eq!(value["skipped"][0]["name"], "kafka");
    }
}
