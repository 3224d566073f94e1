//! Periodic ingestion: bootstrap once, tick on a fixed period, clean up on exit.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::coordinator::{CleanupPlan, DeliveryCoordinator};
use crate::error::IngressError;
use crate::omf::OmfType;
use crate::services::etd_api::EtdSource;
use crate::station::StationEtd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Bootstrapping,
    Running,
    ShuttingDown,
    Stopped,
}

/// What a single trigger did.
#[derive(Debug)]
pub enum TickOutcome {
    /// Values for this many streams were delivered to every sink.
    Completed { streams: usize },
    /// The fetch or a send failed; the next tick runs as usual.
    Failed(IngressError),
    /// Another tick was still running, so this one did nothing.
    Skipped,
}

/// Drives the fetch → normalize → deliver cycle.
///
/// At most one tick body runs at a time: a trigger that finds the tick lock
/// held returns [`TickOutcome::Skipped`] without waiting.
pub struct IngestionScheduler<S> {
    source: S,
    coordinator: DeliveryCoordinator,
    period: Duration,
    state: StdMutex<SchedulerState>,
    tick_lock: Mutex<()>,
}

impl<S: EtdSource> IngestionScheduler<S> {
    pub fn new(source: S, coordinator: DeliveryCoordinator, period: Duration) -> Self {
        Self {
            source,
            coordinator,
            period,
            state: StdMutex::new(SchedulerState::Idle),
            tick_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn coordinator(&self) -> &DeliveryCoordinator {
        &self.coordinator
    }

    fn set_state(&self, next: SchedulerState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        info!(from = ?*state, to = ?next, "Scheduler state change");
        *state = next;
    }

    /// Declares the type and one container per stream seen in a first fetch.
    ///
    /// Any error is fatal: the scheduler falls back to `Idle` and must not be
    /// run. On success it is `Running` and the returned plan is what
    /// [`shutdown`](Self::shutdown) deletes.
    #[tracing::instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<CleanupPlan, IngressError> {
        if self.state() != SchedulerState::Idle {
            return Err(IngressError::Config(format!(
                "bootstrap requires an idle scheduler, state is {:?}",
                self.state()
            )));
        }
        self.set_state(SchedulerState::Bootstrapping);

        match self.declare().await {
            Ok(plan) => {
                self.set_state(SchedulerState::Running);
                Ok(plan)
            }
            Err(e) => {
                error!(error = %e, "Bootstrap failed");
                self.set_state(SchedulerState::Idle);
                Err(e)
            }
        }
    }

    async fn declare(&self) -> Result<CleanupPlan, IngressError> {
        let batch = self.source.fetch_estimates().await?;
        if batch.is_empty() {
            return Err(IngressError::Config(
                "first fetch returned no streams; check the origin and destination filters".to_string(),
            ));
        }

        let type_delete = self.coordinator.send_type(StationEtd::type_definition()).await?;

        let container_delete = match self
            .coordinator
            .send_containers(batch.keys(), StationEtd::type_id())
            .await
        {
            Ok(msg) => msg,
            Err(e) => {
                // Containers are already rolled back; the type they referenced goes last.
                if let Err(rollback) = self.coordinator.send(&type_delete).await {
                    warn!(error = %rollback, "Could not remove type after failed bootstrap");
                }
                return Err(e);
            }
        };
        let plan = CleanupPlan {
            container_delete,
            type_delete,
        };

        info!(streams = batch.len(), "Type and containers created");
        Ok(plan)
    }

    /// Runs one tick unless another one is in flight.
    pub async fn trigger(&self, plan: &CleanupPlan) -> TickOutcome {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            warn!("Previous tick still running, skipping");
            return TickOutcome::Skipped;
        };

        match self.tick(plan).await {
            Ok(streams) => TickOutcome::Completed { streams },
            Err(e) => {
                error!(error = %e, "Ingress tick failed");
                TickOutcome::Failed(e)
            }
        }
    }

    #[tracing::instrument(skip_all)]
    async fn tick(&self, plan: &CleanupPlan) -> Result<usize, IngressError> {
        let mut batch = self.source.fetch_estimates().await?;

        let registered = plan.stream_ids();
        let unknown: BTreeSet<String> = batch
            .keys()
            .filter(|id| !registered.contains(*id))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            warn!(streams = ?unknown, "Dropping streams that were not present at bootstrap");
            batch.retain(|id, _| !unknown.contains(id));
        }

        if batch.is_empty() {
            info!("No registered streams in this fetch, nothing to send");
            return Ok(0);
        }

        self.coordinator.send_data(&batch).await?;
        let streams = batch.len();
        info!(streams, "Sent values for {} stream{}", streams, if streams > 1 { "s" } else { "" });
        Ok(streams)
    }

    /// Ticks every `period` until `shutdown` resolves.
    ///
    /// The period is measured from the end of one tick to the start of the
    /// next, so a slow tick delays the schedule instead of piling up.
    pub async fn run_until<F: Future<Output = ()>>(&self, plan: &CleanupPlan, shutdown: F) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(period_secs = self.period.as_secs_f64(), "Ingress started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.trigger(plan).await;
                    ticker.reset();
                }
            }
        }
    }

    /// Deletes what bootstrap created and closes every sink.
    ///
    /// Cleanup is attempted once; failures are logged and do not stop the
    /// sinks from being closed.
    #[tracing::instrument(skip_all)]
    pub async fn shutdown(&mut self, plan: Option<CleanupPlan>) {
        self.set_state(SchedulerState::ShuttingDown);

        if let Some(plan) = plan {
            match self.coordinator.cleanup(&plan).await {
                Ok(()) => info!("Type and containers deleted"),
                Err(e) => warn!(error = %e, "Cleanup incomplete"),
            }
        }

        self.coordinator.close();
        self.set_state(SchedulerState::Stopped);
    }
}
