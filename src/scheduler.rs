use log::{error, info, warn};

use crate::account::Edge;
use crate::collector::{Collector, CollectorOptions, ListView};
use crate::delay_manager::{wait, Pacing, StopSignal, Wait};
use crate::error::{CollectError, RunError};
use crate::resume_manager::CheckpointStore;
use crate::session::{ItemExtractor, SessionProvider};

/// What one batch run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Edges of every target, checkpointed or freshly collected, in target order.
    pub edges: Vec<Edge>,
    /// Every target the run considered.
    pub sources: Vec<String>,
    pub crawled: usize,
    pub resumed: usize,
    pub unavailable: Vec<String>,
    pub failed: Vec<String>,
    /// Pauses taken between targets, in order.
    pub waits: Vec<Wait>,
}

pub struct Scheduler<'a, S, E, C> {
    collector: Collector<'a, S, E>,
    store: &'a C,
    options: CollectorOptions,
    pacing: Pacing,
    stop: StopSignal,
}

impl<'a, S, E, C> Scheduler<'a, S, E, C>
where
    S: SessionProvider,
    E: ItemExtractor<S::Page>,
    C: CheckpointStore,
{
    pub fn new(
        collector: Collector<'a, S, E>,
        store: &'a C,
        options: CollectorOptions,
        pacing: Pacing,
        stop: StopSignal,
    ) -> Self {
        Scheduler {
            collector,
            store,
            options,
            pacing,
            stop,
        }
    }

    /// Walks `targets` in order. Checkpointed targets are loaded without
    /// touching the session; the rest are collected once each and
    /// checkpointed on completion.
    pub fn run(&mut self, targets: &[String]) -> Result<BatchReport, RunError> {
        let total = targets.len();
        let mut report = BatchReport::default();
        let mut attempts = 0;

        for (i, target) in targets.iter().enumerate() {
            info!("Processing {} / {} : @{}", i + 1, total, target);
            report.sources.push(target.clone());

            if self.store.exists(target) {
                info!("Loading existing data for @{}", target);
                match self.store.load(target) {
                    Ok(edges) => {
                        report.resumed += 1;
                        report.edges.extend(edges);
                    }
                    Err(e) => {
                        error!("Checkpoint for @{} is unreadable: {}", target, e);
                        report.failed.push(target.clone());
                    }
                }
                continue;
            }

            attempts += 1;
            self.crawl(target, &mut report)?;

            if let Some(kind) = self.pacing.wait_after(attempts, i + 1 == total) {
                wait(&self.pacing, kind, &self.stop)?;
                report.waits.push(kind);
            }
        }

        info!(
            "Batch finished: {} crawled, {} resumed, {} unavailable, {} failed, {} edges",
            report.crawled,
            report.resumed,
            report.unavailable.len(),
            report.failed.len(),
            report.edges.len()
        );
        Ok(report)
    }

    fn crawl(&mut self, target: &str, report: &mut BatchReport) -> Result<(), RunError> {
        let view = ListView::Following(target.to_string());
        let outcome = match self.collector.collect(&view, &self.options) {
            Ok(outcome) => outcome,
            Err(CollectError::TargetUnavailable { .. }) => {
                warn!("Could not load following for @{}", target);
                report.unavailable.push(target.to_string());
                return Ok(());
            }
            Err(CollectError::Session(e)) if !e.is_fatal() => {
                error!("Failed to collect @{}: {}", target, e);
                report.failed.push(target.to_string());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let edges: Vec<Edge> = outcome
            .accounts
            .iter()
            .map(|account| Edge::from_account(target, account))
            .collect();

        if let Err(e) = self.store.save(target, &edges) {
            error!("Failed to checkpoint @{}: {}", target, e);
            // One bad write costs the target; a dead medium ends the run.
            self.store.probe()?;
            report.failed.push(target.to_string());
            return Ok(());
        }

        report.crawled += 1;
        report.edges.extend(edges);
        Ok(())
    }
}
