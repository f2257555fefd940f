use futures::{StreamExt, stream};
use log::*;

use crate::{
    error::TransportError,
    poll::{
        command::process_query,
        executor::RemoteExecutor,
        parser::{Parsed, parse},
        sample::SampleClock,
    },
    store::Accumulator,
};

/// Counts for one pass over every (process, node) pair.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub samples: usize,
    /// Pairs whose remote call failed.
    pub failures: usize,
    /// Pairs that answered but yielded no samples.
    pub empty: usize,
    pub malformed: usize,
}

struct PairOutcome<'a> {
    process: &'a str,
    node: &'a str,
    output: Result<String, TransportError>,
}

/// Polls every configured process on every node once.
///
/// Up to `fan_out` remote calls are in flight at a time. Results are consumed
/// in (process, node) order, so appends and console output stay in the
/// configured order whatever the fan-out.
pub struct CycleRunner<'a, E> {
    executor: &'a E,
    nodes: &'a [String],
    queries: Vec<(String, String)>,
    fan_out: usize,
    clock: SampleClock,
}

impl<'a, E> CycleRunner<'a, E>
where
    E: RemoteExecutor,
{
    pub fn new(
        executor: &'a E,
        nodes: &'a [String],
        processes: &[String],
        fan_out: usize,
    ) -> color_eyre::Result<Self> {
        let queries = processes
            .iter()
            .map(|p| -> color_eyre::Result<(String, String)> {
                Ok((p.clone(), process_query(p)?))
            })
            .collect::<color_eyre::Result<Vec<_>>>()?;
        Ok(Self {
            executor,
            nodes,
            queries,
            fan_out: fan_out.max(1),
            clock: SampleClock::default(),
        })
    }

    pub async fn run(&self, store: &Accumulator) -> CycleSummary {
        let pairs = self.queries.iter().flat_map(|(process, query)| {
            self.nodes
                .iter()
                .map(move |node| (process.as_str(), query.as_str(), node.as_str()))
        });
        let mut outcomes = stream::iter(pairs)
            .map(|(process, query, node)| self.sample(process, query, node))
            .buffered(self.fan_out);

        let mut summary = CycleSummary::default();
        let mut current: Option<&str> = None;
        while let Some(outcome) = outcomes.next().await {
            if current != Some(outcome.process) {
                println!("\nProcess: {}", outcome.process);
                current = Some(outcome.process);
            }
            self.record(outcome, store, &mut summary);
        }
        info!(
            target: "Cycle",
            "Cycle done: {} samples, {} empty, {} failed, {} malformed lines",
            summary.samples, summary.empty, summary.failures, summary.malformed
        );
        summary
    }

    async fn sample<'s>(
        &'s self,
        process: &'s str,
        query: &'s str,
        node: &'s str,
    ) -> PairOutcome<'s> {
        PairOutcome {
            process,
            node,
            output: self.executor.run(node, query).await,
        }
    }

    fn record(&self, outcome: PairOutcome<'_>, store: &Accumulator, summary: &mut CycleSummary) {
        let PairOutcome {
            process,
            node,
            output,
        } = outcome;
        // stamped on consumption so stored order and time order agree
        let parsed: Parsed = match output {
            Ok(raw) => parse(process, node, &raw, self.clock.now()),
            Err(err) => {
                warn!(target: node, "Polling {} failed: {}", process, err);
                println!("  Failed to poll {} on {}: {}", process, node, err);
                summary.failures += 1;
                return;
            }
        };
        for (line, err) in parsed.malformed() {
            warn!(target: node, "Error parsing line from {}: '{}' -> {}", node, line, err);
            summary.malformed += 1;
        }
        for (line, err) in parsed.rejected.iter().filter(|(_, e)| !e.is_malformed()) {
            debug!(target: node, "Skipping '{}' for {}: {}", line, process, err);
        }
        if parsed.samples.is_empty() {
            println!("  No {} processes found on {}", process, node);
            summary.empty += 1;
            return;
        }
        for s in &parsed.samples {
            println!(
                "  Node: {}, PID: {}, CPU%: {:.2}, MEM%: {:.2}, VSZ: {}",
                s.node, s.pid, s.cpu_percent, s.mem_percent, s.vsz
            );
        }
        summary.samples += store.append(process, parsed.samples);
    }
}
