//! Bounded worker pool with a per-series barrier.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use vlabel_models::Asset;

use crate::process::{process_episode, process_series, PipelineContext};
use crate::publish;
use crate::stats::StatsSnapshot;

/// Drives the run: series are processed one at a time; within a series a
/// bounded pool of worker tasks handles episodes in parallel, and the
/// series-level step only starts once every episode task has finished —
/// successfully or via journal abandonment. Partial completion never blocks
/// the barrier.
pub struct Orchestrator {
    ctx: Arc<PipelineContext>,
}

impl Orchestrator {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, groups: Vec<(String, Vec<Asset>)>) -> StatsSnapshot {
        let semaphore = Arc::new(Semaphore::new(self.ctx.config.episode_workers));

        for (series, assets) in groups {
            if self.ctx.is_shutdown() {
                info!("Shutdown observed, stopping before next series");
                break;
            }
            info!(series = %series, episodes = assets.len(), "Processing series");

            let mut handles = Vec::with_capacity(assets.len());
            for asset in assets.iter().cloned() {
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let ctx = Arc::clone(&self.ctx);
                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    process_episode(&ctx, &asset).await;
                }));
            }

            // Barrier: the series step must not start while any episode task
            // of this series is still in flight.
            for handle in handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "Episode task panicked; its units count as abandoned");
                }
            }

            if self.ctx.is_shutdown() {
                info!("Shutdown observed, skipping series aggregation");
                break;
            }

            process_series(&self.ctx, &series, &assets).await;

            if let Err(e) = publish::publish_all(&self.ctx).await {
                warn!(series = %series, error = %e, "Manifest publication failed");
            }
        }

        self.ctx.stats.snapshot()
    }
}
