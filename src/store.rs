//! Run-scoped, append-only sample store keyed by process name.

use std::sync::{Mutex, PoisonError};

use log::*;

use crate::poll::Sample;

#[derive(Debug)]
struct Series {
    process: String,
    samples: Mutex<Vec<Sample>>,
}

/// Samples collected so far, one series per configured process name.
///
/// Keys are fixed at construction and keep the configured order. Each series
/// has its own lock, so concurrent appends never lose data.
#[derive(Debug)]
pub struct Accumulator {
    series: Vec<Series>,
}

impl Accumulator {
    pub fn new<I, S>(processes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut series: Vec<Series> = Vec::new();
        for process in processes {
            let process = process.into();
            if series.iter().all(|s| s.process != process) {
                series.push(Series {
                    process,
                    samples: Mutex::new(Vec::new()),
                });
            }
        }
        Self { series }
    }

    fn find(&self, process: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.process == process)
    }

    /// Append `samples` under `process`, returning how many were stored.
    pub fn append(&self, process: &str, samples: Vec<Sample>) -> usize {
        let Some(series) = self.find(process) else {
            error!(target: "Store", "Dropping {} samples for unknown process {}", samples.len(), process);
            return 0;
        };
        let count = samples.len();
        series
            .samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(samples);
        count
    }

    pub fn len(&self, process: &str) -> usize {
        self.find(process)
            .map(|s| s.samples.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.processes().map(|p| self.len(p)).sum()
    }

    pub fn processes(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.process.as_str())
    }

    /// Copy of one series in capture order.
    #[cfg(test)]
    pub fn samples(&self, process: &str) -> Vec<Sample> {
        self.find(process)
            .map(|s| s.samples.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }

    /// Consume the store, yielding each process with its samples in
    /// configured order.
    pub fn into_series(self) -> Vec<(String, Vec<Sample>)> {
        self.series
            .into_iter()
            .map(|s| {
                let samples = s.samples.into_inner().unwrap_or_else(PoisonError::into_inner);
                (s.process, samples)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::{sync::Arc, thread};

    fn sample(node: &str, pid: u32) -> Sample {
        Sample {
            timestamp: Local::now(),
            node: node.to_string(),
            pid,
            cpu_percent: 1.0,
            mem_percent: 2.0,
            vsz: 100,
        }
    }

    #[test]
    fn keeps_configured_order_without_duplicates() {
        let store = Accumulator::new(["b", "a", "b"]);
        assert_eq!(store.processes().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn appends_in_order_and_counts_grow() {
        let store = Accumulator::new(["foo", "bar"]);
        let per_cycle = [2usize, 0, 3, 1];
        let mut expected = 0;
        let mut next_pid = 0;
        for n in per_cycle {
            let before = store.len("foo");
            let batch: Vec<Sample> = (0..n)
                .map(|_| {
                    next_pid += 1;
                    sample("n1", next_pid)
                })
                .collect();
            assert_eq!(store.append("foo", batch), n);
            expected += n;
            assert!(store.len("foo") >= before);
            assert_eq!(store.len("foo"), expected);
        }
        let pids: Vec<u32> = store.samples("foo").iter().map(|s| s.pid).collect();
        assert_eq!(pids, (1..=6).collect::<Vec<_>>());
        assert_eq!(store.len("bar"), 0);
        assert_eq!(store.total(), 6);
    }

    #[test]
    fn unknown_process_is_not_stored() {
        let store = Accumulator::new(["foo"]);
        assert_eq!(store.append("other", vec![sample("n1", 1)]), 0);
        assert_eq!(store.total(), 0);
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let store = Arc::new(Accumulator::new(["foo", "bar"]));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    let process = if t % 2 == 0 { "foo" } else { "bar" };
                    for i in 0..100 {
                        store.append(process, vec![sample("n", i)]);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len("foo"), 400);
        assert_eq!(store.len("bar"), 400);
    }

    #[test]
    fn into_series_hands_everything_over() {
        let store = Accumulator::new(["foo", "bar"]);
        store.append("bar", vec![sample("n2", 7)]);
        let series = store.into_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].0, "foo");
        assert!(series[0].1.is_empty());
        assert_eq!(series[1].1[0].pid, 7);
    }
}
