use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{AuthSession, RemoteStore};

const QUEUE_CAPACITY: usize = 32;

/// One batched push of the latest cumulative totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub date: NaiveDate,
    pub daily_total: u64,
    pub lifetime_total: u64,
    /// Steps credited since the previous enqueued upload; drives the
    /// college/department leaderboard increments.
    pub group_delta: u64,
}

/// Ingestion-side handle to the upload queue.
#[derive(Clone)]
pub struct UploadHandle {
    tx: mpsc::Sender<UploadJob>,
}

impl UploadHandle {
    /// Fire-and-forget enqueue; never blocks the ingestion path. A full
    /// queue drops the job; the next threshold crossing resends the latest
    /// cumulative totals, which the last-write-wins merge absorbs.
    pub fn enqueue(&self, job: UploadJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(err) => {
                warn!("upload queue full, dropping job: {err}");
                false
            }
        }
    }
}

/// Spawns the background task that drains the upload queue. The worker exits
/// when every `UploadHandle` has been dropped.
pub fn spawn_upload_worker(
    store: Arc<dyn RemoteStore>,
    auth: watch::Receiver<Option<AuthSession>>,
) -> (UploadHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<UploadJob>(QUEUE_CAPACITY);

    let handle = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let session = auth.borrow().clone();
            let Some(session) = session else {
                debug!("skipping upload for {}: signed out", job.date);
                continue;
            };

            push_job(store.as_ref(), &session, &job).await;
        }
        info!("upload worker shutting down");
    });

    (UploadHandle { tx }, handle)
}

/// Best-effort push. Failures are logged and swallowed: local aggregates
/// stay authoritative and the next threshold crossing resends up-to-date
/// cumulative values. Each write is attempted independently so one failure
/// does not starve the others.
async fn push_job(store: &dyn RemoteStore, session: &AuthSession, job: &UploadJob) {
    if let Err(err) = store
        .upload_daily(&session.user_id, job.date, job.daily_total)
        .await
    {
        warn!("daily upload failed for {}: {err}", job.date);
    }

    if let Err(err) = store.upload_total(&session.user_id, job.lifetime_total).await {
        warn!("lifetime upload failed: {err}");
    }

    if job.group_delta > 0 {
        if let Err(err) = store
            .increment_group_counters(&session.college, &session.department, job.group_delta)
            .await
        {
            warn!("leaderboard increment failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::sync::watch;

    use super::*;
    use crate::sync::{RankScope, RemoteDoc, SyncError};

    #[derive(Default)]
    struct RecordingStore {
        daily: Mutex<Vec<(String, NaiveDate, u64)>>,
        totals: Mutex<Vec<u64>>,
        increments: Mutex<Vec<(String, String, u64)>>,
    }

    #[async_trait]
    impl RemoteStore for RecordingStore {
        async fn upload_daily(
            &self,
            user_id: &str,
            date: NaiveDate,
            steps: u64,
        ) -> Result<(), SyncError> {
            self.daily
                .lock()
                .expect("lock")
                .push((user_id.to_string(), date, steps));
            Ok(())
        }

        async fn upload_total(&self, _user_id: &str, total: u64) -> Result<(), SyncError> {
            self.totals.lock().expect("lock").push(total);
            Ok(())
        }

        async fn increment_group_counters(
            &self,
            college: &str,
            department: &str,
            amount: u64,
        ) -> Result<(), SyncError> {
            self.increments.lock().expect("lock").push((
                college.to_string(),
                department.to_string(),
                amount,
            ));
            Ok(())
        }

        async fn fetch_ranking(
            &self,
            _scope: RankScope,
            _limit: usize,
        ) -> Result<Vec<RemoteDoc>, SyncError> {
            Ok(Vec::new())
        }
    }

    fn session() -> AuthSession {
        AuthSession {
            user_id: "u-1".into(),
            display_name: "Casey".into(),
            college: "engineering".into(),
            department: "cs".into(),
        }
    }

    fn job(daily: u64) -> UploadJob {
        UploadJob {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).expect("date"),
            daily_total: daily,
            lifetime_total: daily + 10_000,
            group_delta: 120,
        }
    }

    #[tokio::test]
    async fn pushes_all_three_writes_when_signed_in() {
        let store = Arc::new(RecordingStore::default());
        let (_auth_tx, auth_rx) = watch::channel(Some(session()));
        let (handle, worker) = spawn_upload_worker(store.clone(), auth_rx);

        assert!(handle.enqueue(job(600)));
        drop(handle);
        worker.await.expect("worker join");

        let daily = store.daily.lock().expect("lock");
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].2, 600);

        let totals = store.totals.lock().expect("lock");
        assert_eq!(totals.as_slice(), [10_600u64]);

        let increments = store.increments.lock().expect("lock");
        assert_eq!(increments.len(), 1);
        assert_eq!(
            increments[0],
            ("engineering".to_string(), "cs".to_string(), 120)
        );
    }

    struct FlakyStore {
        totals: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl RemoteStore for FlakyStore {
        async fn upload_daily(
            &self,
            _user_id: &str,
            _date: NaiveDate,
            _steps: u64,
        ) -> Result<(), SyncError> {
            Err(SyncError::Network("connection reset".into()))
        }

        async fn upload_total(&self, _user_id: &str, total: u64) -> Result<(), SyncError> {
            self.totals.lock().expect("lock").push(total);
            Ok(())
        }

        async fn increment_group_counters(
            &self,
            _college: &str,
            _department: &str,
            _amount: u64,
        ) -> Result<(), SyncError> {
            Ok(())
        }

        async fn fetch_ranking(
            &self,
            _scope: RankScope,
            _limit: usize,
        ) -> Result<Vec<RemoteDoc>, SyncError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn failures_are_swallowed_and_later_writes_still_run() {
        let store = Arc::new(FlakyStore {
            totals: Mutex::new(Vec::new()),
        });
        let (_auth_tx, auth_rx) = watch::channel(Some(session()));
        let (handle, worker) = spawn_upload_worker(store.clone(), auth_rx);

        assert!(handle.enqueue(job(600)));
        assert!(handle.enqueue(job(900)));
        drop(handle);
        worker.await.expect("worker join");

        // The daily push failed both times, yet the lifetime push of each
        // job and the job after it still went through.
        assert_eq!(store.totals.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn signed_out_jobs_are_silently_skipped() {
        let store = Arc::new(RecordingStore::default());
        let (_auth_tx, auth_rx) = watch::channel(None);
        let (handle, worker) = spawn_upload_worker(store.clone(), auth_rx);

        assert!(handle.enqueue(job(600)));
        drop(handle);
        worker.await.expect("worker join");

        assert!(store.daily.lock().expect("lock").is_empty());
        assert!(store.totals.lock().expect("lock").is_empty());
        assert!(store.increments.lock().expect("lock").is_empty());
    }
}
