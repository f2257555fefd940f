use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One observation of one process on one node.
///
/// Field order is the column order of the export files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Local>,
    pub node: String,
    pub pid: u32,
    #[serde(rename = "cpu%")]
    pub cpu_percent: f64,
    #[serde(rename = "mem%")]
    pub mem_percent: f64,
    /// Virtual size in the unit `ps` reports (KiB on Linux).
    pub vsz: u64,
}

/// Wall clock that never goes backwards within a run.
#[derive(Debug)]
pub struct SampleClock {
    last: Mutex<Option<DateTime<Local>>>,
}

impl Default for SampleClock {
    fn default() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }
}

impl SampleClock {
    pub fn now(&self) -> DateTime<Local> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = match *last {
            Some(prev) => prev.max(Local::now()),
            None => Local::now(),
        };
        *last = Some(now);
        now
    }
}
