use std::sync::Arc;

use chrono::Local;
use log::{error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::reconcile::{RawCounterSample, ReconcileResult};
use crate::sync::{should_upload, UploadCheckpoint, UploadHandle, UploadJob};

use super::stats::IngestStats;
use super::DayTotal;

/// Serialized sensor ingestion. Samples are handled strictly in arrival
/// order by this single consumer, which is the single-writer discipline for
/// the counter baseline and the day rows. A sample that entered reconciliation
/// always reaches local persistence before the next one (or shutdown) is
/// considered.
pub async fn ingest_loop(
    db: Database,
    mut samples: mpsc::Receiver<RawCounterSample>,
    uploads: UploadHandle,
    today_tx: Arc<watch::Sender<DayTotal>>,
    stats: IngestStats,
    cancel: CancellationToken,
) {
    let mut checkpoint = UploadCheckpoint::new(Local::now().date_naive());

    loop {
        tokio::select! {
            maybe_sample = samples.recv() => {
                match maybe_sample {
                    Some(sample) => {
                        process_sample(&db, sample, &uploads, &today_tx, &stats, &mut checkpoint)
                            .await;
                    }
                    None => {
                        info!("sensor channel closed, ingestion loop exiting");
                        break;
                    }
                }
            }
            _ = cancel.cancelled() => {
                // Stop accepting new samples, then drain what the sensor
                // already delivered so nothing accepted is dropped.
                samples.close();
                while let Some(sample) = samples.recv().await {
                    process_sample(&db, sample, &uploads, &today_tx, &stats, &mut checkpoint)
                        .await;
                }
                info!("ingestion loop shut down after drain");
                break;
            }
        }
    }
}

async fn process_sample(
    db: &Database,
    sample: RawCounterSample,
    uploads: &UploadHandle,
    today_tx: &watch::Sender<DayTotal>,
    stats: &IngestStats,
    checkpoint: &mut UploadCheckpoint,
) {
    let today = Local::now().date_naive();
    checkpoint.roll_over(today);

    // The transaction rolled back on failure, baseline included, so the next
    // sample recomputes the same delta. Nothing to repair here beyond logging.
    let outcome = match db.apply_sample(sample, today).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("failed to persist sensor sample: {err:#}");
            return;
        }
    };

    stats.record_sample(&outcome.result).await;

    match outcome.result {
        ReconcileResult::Initialized => {
            info!("step counter baseline initialized at {}", sample.value);
        }
        ReconcileResult::Reset => {
            warn!("step counter reset detected, rebasing at {}", sample.value);
        }
        ReconcileResult::NoChange => {}
        ReconcileResult::Delta(_) => {
            today_tx.send_replace(DayTotal {
                date: outcome.date,
                steps: outcome.daily_total,
            });

            if should_upload(outcome.daily_total, checkpoint) {
                let group_delta = outcome
                    .daily_total
                    .saturating_sub(checkpoint.last_uploaded_daily_total);

                let enqueued = uploads.enqueue(UploadJob {
                    date: outcome.date,
                    daily_total: outcome.daily_total,
                    lifetime_total: outcome.lifetime_total,
                    group_delta,
                });

                if enqueued {
                    checkpoint.mark_uploaded(outcome.daily_total);
                }
                stats.record_upload(enqueued).await;
            }
        }
    }
}
