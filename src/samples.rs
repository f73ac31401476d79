//! # Sample Files
//!
//! A sample file holds one latency measurement per line, as a base-10
//! signed 64-bit integer of microseconds. Empty lines are ignored. Any other
//! line that does not parse is reported and skipped, so one corrupt line
//! never invalidates the rest of a file.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A line that could not be read as a latency sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLine {
    /// 1-based line number within the file
    pub line_number: usize,
    pub content: String,
}

/// Samples read from one file, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSet {
    pub samples: Vec<i64>,
    pub invalid_lines: Vec<InvalidLine>,
}

impl SampleSet {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Parse sample lines from any reader.
///
/// `source` only labels the diagnostics.
pub fn parse_samples<R: BufRead>(reader: R, source: &str) -> std::io::Result<SampleSet> {
    let mut set = SampleSet::default();

    for (index, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        let line = String::from_utf8_lossy(&line);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed.parse::<i64>() {
            Ok(sample) => set.samples.push(sample),
            Err(_) => {
                warn!("Invalid latency value in {}: {}", source, trimmed);
                set.invalid_lines.push(InvalidLine {
                    line_number: index + 1,
                    content: trimmed.to_string(),
                });
            }
        }
    }

    Ok(set)
}

/// Read every sample from a file on disk
pub fn read_samples(path: &Path) -> std::io::Result<SampleSet> {
    let file = File::open(path)?;
    parse_samples(BufReader::new(file), &path.display().to_string())
}

/// Default location of a new sample file: `<root>/<backend>/test_<unix_secs>.txt`
pub fn default_sample_path(root: &Path, backend: &str, unix_secs: i64) -> PathBuf {
    root.join(backend).join(format!("test_{}.txt", unix_secs))
}

/// Appends samples to a new file, one per line
pub struct SampleWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl SampleWriter {
    /// Create (or truncate) the file, creating parent directories as needed
    pub fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        debug!("Writing latency samples to {:?}", path);

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn record(&mut self, latency_micros: i64) -> std::io::Result<()> {
        writeln!(self.writer, "{}", latency_micros)?;
        self.written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush buffered samples and return how many were written
    pub fn finish(mut self) -> std::io::Result<usize> {
        self.writer.flush()?;
        Ok(self.written)
    }
}
