//! Periodic scheduling of compliance cycles

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::{CycleRunner, PolicyRegistry, SharedReport};

/// Drives repeated compliance cycles at a fixed interval until
/// shutdown is signalled.
pub struct Scheduler {
    runner: Arc<CycleRunner>,
    policies: PolicyRegistry,
    last_report: SharedReport,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        runner: Arc<CycleRunner>,
        policies: PolicyRegistry,
        last_report: SharedReport,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            runner,
            policies,
            last_report,
            interval,
            shutdown,
        }
    }

    /// Run until the shutdown signal flips. An in-flight cycle is
    /// abandoned on shutdown; its workers abort and their deployment
    /// locks release as the guards drop.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.policies.read().await.clone();
                    if snapshot.is_empty() {
                        tracing::debug!("No policies registered, skipping cycle");
                        continue;
                    }

                    tokio::select! {
                        report = self.runner.run_cycle(&snapshot) => {
                            *self.last_report.write().await = Some(report);
                        }
                        _ = self.shutdown.changed() => {
                            tracing::info!("Shutdown during cycle, abandoning pass");
                            return;
                        }
                    }
                }
                _ = self.shutdown.changed() => {
                    tracing::info!("Scheduler stopping");
                    return;
                }
            }
        }
    }
}
