/// Scan Scheduler - polls the node and drives scan passes
///
/// Responsibilities:
/// - Poll chain height at a fixed interval
/// - On a height change, run the identity pass then the data pass
/// - Retry on the next poll when the previous cycle did not complete
/// - Publish a status snapshot for the HTTP API

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, info_span, Instrument};

use crate::engine::IndexerEngine;
use crate::error::ChainError;
use crate::metrics;
use crate::rpc::ChainSource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub last_observed_height: Option<u64>,
    /// Both passes of the last cycle completed and saved their checkpoints.
    pub caught_up: bool,
    /// Cycles in which both passes completed.
    pub passes_completed: u64,
}

pub type SharedStatus = Arc<RwLock<SchedulerStatus>>;

pub struct ScanScheduler {
    engine: Arc<IndexerEngine>,
    chain: Arc<dyn ChainSource>,
    status: SharedStatus,
    poll_interval: Duration,
}

impl ScanScheduler {
    pub fn new(engine: Arc<IndexerEngine>, chain: Arc<dyn ChainSource>, poll_interval: Duration) -> Self {
        Self {
            engine,
            chain,
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
            poll_interval,
        }
    }

    pub fn status(&self) -> SharedStatus {
        Arc::clone(&self.status)
    }

    /// Run both passes in order. Returns `true` when both completed.
    pub async fn run_cycle(&self) -> bool {
        let identity = self.engine.run_identity_pass().await;
        let data = self.engine.run_data_pass().await;
        let complete = identity.is_ok() && data.is_ok();

        let mut status = self.status.write().await;
        status.caught_up = complete;
        if complete {
            status.passes_completed += 1;
        }
        complete
    }

    /// One poll. Returns whether a cycle ran.
    pub async fn tick(&self) -> Result<bool, ChainError> {
        let height = self.chain.height().await?;
        metrics::set_chain_tip_height(height);

        let should_run = {
            let mut status = self.status.write().await;
            let changed = status.last_observed_height != Some(height);
            status.last_observed_height = Some(height);
            changed || !status.caught_up
        };
        if !should_run {
            return Ok(false);
        }

        info!(height = height, "New block found");
        self.run_cycle().await;
        Ok(true)
    }

    /// Poll forever.
    pub async fn run(&self) {
        let span = info_span!("scan_scheduler", poll_interval_secs = self.poll_interval.as_secs());
        async {
            info!("Starting scan scheduler");
            loop {
                if let Err(e) = self.tick().await {
                    error!(error = %e, "Failed to read chain height");
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        .instrument(span)
        .await
    }
}
