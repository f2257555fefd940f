//! Writes each process's samples to `<output_dir>/<process>.csv`.

use std::path::{Path, PathBuf};

use log::*;

use crate::{error::ExportError, poll::Sample};

#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<(String, PathBuf)>,
    /// Processes with nothing to write.
    pub skipped: Vec<String>,
    pub failed: Vec<(String, ExportError)>,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// File name for a process; path separators become `_`.
pub fn file_name(process: &str) -> String {
    let safe: String = process
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    match safe.as_str() {
        "." | ".." => format!("{}_.csv", safe),
        _ => format!("{}.csv", safe),
    }
}

/// Write one file per non-empty series. A failure on one file does not stop
/// the others.
pub fn export_all(series: &[(String, Vec<Sample>)], dir: &Path) -> ExportReport {
    let mut report = ExportReport::default();
    for (process, samples) in series {
        if samples.is_empty() {
            info!(target: "Export", "No samples for {}, no file written", process);
            report.skipped.push(process.clone());
            continue;
        }
        let path = dir.join(file_name(process));
        match write_samples(&path, samples) {
            Ok(()) => {
                info!(target: "Export", "Saved {} rows for {} to {:?}", samples.len(), process, path);
                report.written.push((process.clone(), path));
            }
            Err(err) => {
                error!(target: "Export", "{}", err);
                report.failed.push((process.clone(), err));
            }
        }
    }
    report
}

pub fn write_samples(path: &Path, samples: &[Sample]) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path).map_err(|source| ExportError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    for sample in samples {
        writer.serialize(sample).map_err(|source| ExportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    writer.flush().map_err(|source| ExportError::Flush {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_samples(path: &Path) -> csv::Result<Vec<Sample>> {
    csv::Reader::from_path(path)?.deserialize().collect()
}
