//! Turns `ps -eo pid,pcpu,pmem,vsz,comm` rows into samples.

use std::str::FromStr;

use chrono::{DateTime, Local};

use crate::{error::LineError, poll::sample::Sample};

const FIELDS: usize = 5;

/// Everything one node's output produced for one process name.
#[derive(Debug, Default)]
pub struct Parsed {
    pub samples: Vec<Sample>,
    /// Rejected lines with the reason, in input order.
    pub rejected: Vec<(String, LineError)>,
}

impl Parsed {
    pub fn malformed(&self) -> impl Iterator<Item = &(String, LineError)> {
        self.rejected.iter().filter(|(_, err)| err.is_malformed())
    }
}

/// Parse raw process-table text from `node`, keeping rows whose command
/// contains `process`. All samples share `captured_at`.
pub fn parse(process: &str, node: &str, output: &str, captured_at: DateTime<Local>) -> Parsed {
    let mut parsed = Parsed::default();
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        match parse_line(process, node, line, captured_at) {
            Ok(sample) => parsed.samples.push(sample),
            Err(err) => parsed.rejected.push((line.to_string(), err)),
        }
    }
    parsed
}

pub fn parse_line(
    process: &str,
    node: &str,
    line: &str,
    captured_at: DateTime<Local>,
) -> Result<Sample, LineError> {
    let fields = split_fields(line, FIELDS);
    let [pid, cpu, mem, vsz, command] = fields[..] else {
        return Err(LineError::TooFewFields(fields.len()));
    };
    let pid: u32 = number("pid", pid)?;
    let cpu_percent = percent("cpu%", cpu)?;
    let mem_percent = percent("mem%", mem)?;
    let vsz: u64 = number("vsz", vsz)?;
    // Loose on purpose: "foo" also matches "foobar_helper".
    if !command.contains(process) {
        return Err(LineError::NameMismatch(command.to_string()));
    }
    Ok(Sample {
        timestamp: captured_at,
        node: node.to_string(),
        pid,
        cpu_percent,
        mem_percent,
        vsz,
    })
}

/// Split on whitespace into at most `max` fields, the last one keeping the
/// remainder of the line (inner whitespace included).
fn split_fields(line: &str, max: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(max);
    let mut rest = line.trim();
    while !rest.is_empty() {
        if fields.len() + 1 == max {
            fields.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                fields.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                fields.push(rest);
                break;
            }
        }
    }
    fields
}

fn number<T: FromStr>(field: &'static str, value: &str) -> Result<T, LineError> {
    value.parse().map_err(|_| LineError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn percent(field: &'static str, value: &str) -> Result<f64, LineError> {
    let parsed: f64 = number(field, value)?;
    if parsed.is_finite() && parsed >= 0.0 {
        Ok(parsed)
    } else {
        Err(LineError::InvalidField {
            field,
            value: value.to_string(),
        })
    }
}
