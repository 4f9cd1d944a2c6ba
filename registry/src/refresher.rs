//! Background refresher: periodically checks for data releases and applies them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::registry::ModelRegistry;
use crate::update::{RefreshOptions, RefreshOutcome, UpdateSource, UpdateState};

/// Spawns a background task that keeps a registry's data current. Never started implicitly.
pub struct UpdateRefresher {
    registry: Arc<ModelRegistry>,
    source: Arc<dyn UpdateSource>,
    interval: Duration,
}

impl UpdateRefresher {
    /// Create a refresher that will run every `interval`.
    pub fn new(registry: Arc<ModelRegistry>, source: Arc<dyn UpdateSource>, interval: Duration) -> Self {
        Self {
            registry,
            source,
            interval,
        }
    }

    /// Spawn the background refresh loop. Returns a handle that can be used to abort.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match self
                    .registry
                    .refresh(self.source.as_ref(), RefreshOptions::default())
                    .await
                {
                    Ok(RefreshOutcome::Updated { version, generation }) => {
                        tracing::info!(%version, generation, "model data refreshed");
                    }
                    Ok(RefreshOutcome::NotApplied(UpdateState::Disabled { reason })) => {
                        tracing::debug!(%reason, "data updates disabled; refresher stopping");
                        return;
                    }
                    Ok(RefreshOutcome::NotApplied(state)) => {
                        tracing::debug!(state = state.name(), "model data refresh skipped");
                    }
                    Err(e) => tracing::warn!(error = %e, "model data refresh failed"),
                }
            }
        })
    }
}
