use std::{cell::Cell, process::ExitCode};

use chrono::Local;
use color_eyre::eyre::Result;
use log::*;
use tokio::time::sleep;

use crate::{
    config::RunConfig,
    export::{ExportReport, export_all},
    logging,
    poll::{CycleRunner, RemoteExecutor},
    shutdown::ShutdownToken,
    store::Accumulator,
};

/// Exit status when there was nothing to poll.
const EXIT_NO_WORK: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug)]
pub struct RunSummary {
    pub cycles: u64,
    /// Samples collected per process, in configured order.
    pub totals: Vec<(String, usize)>,
    pub export: ExportReport,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Discovery gave nothing to poll; no cycle ran and nothing was written.
    NoNodes,
    Stopped(RunSummary),
}

impl RunOutcome {
    /// A stopped run exits cleanly; export failures are reported per file.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RunOutcome::NoNodes => ExitCode::from(EXIT_NO_WORK),
            RunOutcome::Stopped(_) => ExitCode::SUCCESS,
        }
    }
}

/// Drives poll cycles at a fixed interval until shutdown, then exports.
pub struct Monitor<E> {
    config: RunConfig,
    executor: E,
    phase: Cell<Phase>,
}

impl<E> Monitor<E>
where
    E: RemoteExecutor,
{
    pub fn new(config: RunConfig, executor: E) -> Self {
        Self {
            config,
            executor,
            phase: Cell::new(Phase::Idle),
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    fn enter(&self, phase: Phase) {
        debug!(target: "App", "{:?} -> {:?}", self.phase.get(), phase);
        self.phase.set(phase);
    }

    /// Run the application's main loop.
    ///
    /// Shutdown is only observed between cycles: a cycle that has started
    /// always polls every pair before the loop exits. The wait between cycles
    /// is cut short by a shutdown request.
    pub async fn run(
        &self,
        nodes: Vec<String>,
        mut shutdown: ShutdownToken,
    ) -> Result<RunOutcome> {
        if nodes.is_empty() {
            println!("No node IPs found. Exiting.");
            warn!(target: "App", "No nodes to poll");
            self.enter(Phase::Stopped);
            return Ok(RunOutcome::NoNodes);
        }

        let store = Accumulator::new(&self.config.processes);
        let runner = CycleRunner::new(
            &self.executor,
            &nodes,
            &self.config.processes,
            self.config.fan_out,
        )?;
        self.enter(Phase::Running);
        info!(
            target: "App",
            "Polling {:?} on {} nodes every {:?}",
            self.config.processes,
            nodes.len(),
            self.config.interval
        );
        println!(
            "Monitoring every {}s... Press Ctrl+C to stop.",
            self.config.interval.as_secs()
        );

        let mut cycles: u64 = 0;
        while !shutdown.is_shutdown() {
            println!(
                "\n[{}] Polling metrics...",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
            );
            runner.run(&store).await;
            cycles += 1;
            logging::flush();
            tokio::select! {
                _ = sleep(self.config.interval) => {}
                _ = shutdown.wait() => {}
            }
        }
        self.enter(Phase::Stopping);
        info!(target: "App", "Stopping after {} cycles, {} samples", cycles, store.total());

        let series = store.into_series();
        let totals: Vec<(String, usize)> = series
            .iter()
            .map(|(process, samples)| (process.clone(), samples.len()))
            .collect();
        println!("\nWriting CSV files...");
        let export = export_all(&series, &self.config.output_dir);
        report_export(&export);
        self.enter(Phase::Stopped);
        logging::flush();
        Ok(RunOutcome::Stopped(RunSummary {
            cycles,
            totals,
            export,
        }))
    }
}

fn report_export(report: &ExportReport) {
    for (_, path) in &report.written {
        println!("Saved: {}", path.display());
    }
    for process in &report.skipped {
        println!("No samples for {}, nothing saved", process);
    }
    for (process, err) in &report.failed {
        println!("Failed to save {}: {}", process, err);
    }
    if report.is_success() {
        println!("All done.!");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::TransportError,
        export::read_samples,
        poll::cycle::tests::FakeExecutor,
        shutdown::{ShutdownSender, shutdown_channel},
    };
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    fn run_config(processes: &[&str], dir: &std::path::Path) -> RunConfig {
        RunConfig {
            processes: processes.iter().map(|s| s.to_string()).collect(),
            interval: Duration::from_secs(1),
            fan_out: 2,
            output_dir: dir.to_path_buf(),
        }
    }

    fn nodes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_second_sleep_exports_two_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let exec = FakeExecutor::with(&[
            ("n1", "10 1.0 2.0 300 foo\n20 0.5 0.5 100 bar\n"),
            ("n2", "11 4.0 1.0 400 foo\n"),
        ]);
        let monitor = Monitor::new(run_config(&["foo", "bar"], dir.path()), exec);
        let (tx, token) = shutdown_channel();
        let stopper = async {
            sleep(Duration::from_millis(1500)).await;
            tx.shutdown();
        };

        let (outcome, ()) = tokio::join!(monitor.run(nodes(&["n1", "n2"]), token), stopper);

        let RunOutcome::Stopped(summary) = outcome.unwrap() else {
            panic!("expected a stopped run");
        };
        assert_eq!(summary.cycles, 2);
        assert_eq!(
            summary.totals,
            vec![("foo".to_string(), 4), ("bar".to_string(), 2)]
        );
        assert!(summary.export.is_success());
        assert_eq!(monitor.phase(), Phase::Stopped);

        let foo = read_samples(&dir.path().join("foo.csv")).unwrap();
        assert_eq!(
            foo.iter().map(|s| (s.node.as_str(), s.pid)).collect::<Vec<_>>(),
            vec![("n1", 10), ("n2", 11), ("n1", 10), ("n2", 11)]
        );
        assert!(foo.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        let bar = read_samples(&dir.path().join("bar.csv")).unwrap();
        assert_eq!(bar.len(), 2);
        assert!(bar.iter().all(|s| s.node == "n1" && s.pid == 20 && s.vsz == 100));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_node_list_never_polls() {
        let dir = tempfile::tempdir().unwrap();
        let exec = FakeExecutor::with(&[]);
        let monitor = Monitor::new(run_config(&["foo"], dir.path()), exec);
        let (_tx, token) = shutdown_channel();

        let outcome = monitor.run(vec![], token).await.unwrap();

        assert!(matches!(outcome, RunOutcome::NoNodes));
        assert_eq!(outcome.exit_code(), ExitCode::from(2));
        assert_eq!(monitor.phase(), Phase::Stopped);
        assert_eq!(monitor.executor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let exec = FakeExecutor::with(&[("n1", "1 0 0 0 foo\n")]);
        let monitor = Monitor::new(run_config(&["foo"], dir.path()), exec);
        let (tx, token) = shutdown_channel();
        tx.shutdown();

        let RunOutcome::Stopped(summary) = monitor.run(nodes(&["n1"]), token).await.unwrap() else {
            panic!("expected a stopped run");
        };
        assert_eq!(summary.cycles, 0);
        assert_eq!(summary.export.skipped, vec!["foo"]);
        assert!(!dir.path().join("foo.csv").exists());
    }

    /// Requests shutdown from inside the first remote call.
    struct StopMidCycle {
        sender: ShutdownSender,
        calls: AtomicUsize,
    }

    impl RemoteExecutor for StopMidCycle {
        async fn run(&self, _node: &str, _command: &str) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sender.shutdown();
            Ok("1 0.0 0.0 10 foo bar\n".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_cycle_finishes_before_stopping() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, token) = shutdown_channel();
        let exec = StopMidCycle {
            sender: tx,
            calls: AtomicUsize::new(0),
        };
        let monitor = Monitor::new(run_config(&["foo", "bar"], dir.path()), exec);

        let RunOutcome::Stopped(summary) =
            monitor.run(nodes(&["n1", "n2", "n3"]), token).await.unwrap()
        else {
            panic!("expected a stopped run");
        };
        assert_eq!(summary.cycles, 1);
        assert_eq!(monitor.executor.calls.load(Ordering::SeqCst), 6);
        assert_eq!(
            summary.totals,
            vec![("foo".to_string(), 3), ("bar".to_string(), 3)]
        );
        assert_eq!(summary.export.written.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_export_still_exits_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let exec = FakeExecutor::with(&[("n1", "1 0.0 0.0 10 foo\n")]);
        let monitor = Monitor::new(run_config(&["foo"], &blocker), exec);
        let (tx, token) = shutdown_channel();
        let stopper = async {
            sleep(Duration::from_millis(500)).await;
            tx.shutdown();
        };

        let (outcome, ()) = tokio::join!(monitor.run(nodes(&["n1"]), token), stopper);

        let outcome = outcome.unwrap();
        let RunOutcome::Stopped(summary) = &outcome else {
            panic!("expected a stopped run");
        };
        assert_eq!(summary.export.failed.len(), 1);
        assert!(!summary.export.is_success());
        assert_eq!(outcome.exit_code(), ExitCode::SUCCESS);
    }
}
