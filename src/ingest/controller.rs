use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::sync::UploadHandle;

use super::loop_worker::ingest_loop;
use super::sensor::StepSensor;
use super::stats::IngestStats;
use super::DayTotal;

/// Buffered samples between the sensor callback and the ingestion loop.
/// Drivers deliver at most a few samples per second; a short burst after a
/// scheduling stall fits comfortably.
const SAMPLE_QUEUE_CAPACITY: usize = 64;

/// Owns the sensor subscription and the ingestion task for one device.
pub struct IngestController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    sensor: Option<Box<dyn StepSensor>>,
}

impl IngestController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            sensor: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(
        &mut self,
        mut sensor: Box<dyn StepSensor>,
        db: Database,
        uploads: UploadHandle,
        today_tx: Arc<watch::Sender<DayTotal>>,
        stats: IngestStats,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("ingestion already active");
        }

        let (sample_tx, sample_rx) = mpsc::channel(SAMPLE_QUEUE_CAPACITY);
        sensor
            .start(sample_tx)
            .context("failed to start step sensor")?;

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(ingest_loop(
            db,
            sample_rx,
            uploads,
            today_tx,
            stats,
            token_clone,
        ));

        info!("step ingestion started");
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.sensor = Some(sensor);
        Ok(())
    }

    /// Stops the sensor first so no new samples enter the queue, then lets
    /// the loop drain what was already delivered before joining it.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(mut sensor) = self.sensor.take() {
            sensor.stop();
        }

        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("ingestion loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for IngestController {
    fn default() -> Self {
        Self::new()
    }
}
