//! Walkmate service core: step ingestion, local aggregation, goals, and
//! campus ranking sync for the walking app. The UI layer sits on top of the
//! observable channels exposed here; rendering, navigation and auth screens
//! are not this crate's concern.

pub mod db;
pub mod goals;
pub mod ingest;
pub mod notify;
pub mod reconcile;
pub mod settings;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use log::warn;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use db::Database;
use goals::GoalTracker;
use ingest::{DayTotal, IngestController, IngestSnapshot, IngestStats, StepSensor};
use notify::{apply_reminder_schedule, spawn_completion_notifier, NotificationScheduler};
use settings::{ReminderSettings, SettingsStore};
use sync::{
    spawn_upload_worker, AuthSession, RankEntry, RankScope, RankingFeed, RemoteStore,
    UploadHandle,
};

pub use db::models::{DailyStepRecord, GoalDraft, GoalRecord};
pub use reconcile::{RawCounterSample, ReconcileResult};

/// Initialize logging (reads the RUST_LOG env var).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Poll interval for ranking feeds spawned from this app.
    pub ranking_refresh: Duration,
}

impl AppConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ranking_refresh: Duration::from_secs(60),
        }
    }
}

/// The assembled service: owns the store, the ingestion pipeline, the goal
/// tracker and the sync workers, and hands observable channels to the UI.
pub struct StepApp {
    db: Database,
    settings: Arc<SettingsStore>,
    remote: Arc<dyn RemoteStore>,
    scheduler: Arc<dyn NotificationScheduler>,
    goals: Arc<GoalTracker>,
    ingest: IngestController,
    uploads: UploadHandle,
    stats: IngestStats,
    auth_tx: watch::Sender<Option<AuthSession>>,
    today_tx: Arc<watch::Sender<DayTotal>>,
    ranking_refresh: Duration,
    shutdown_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl StepApp {
    pub async fn bootstrap(
        config: AppConfig,
        remote: Arc<dyn RemoteStore>,
        scheduler: Arc<dyn NotificationScheduler>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;

        let db = Database::new(config.data_dir.join("walkmate.sqlite3"))?;
        let settings = Arc::new(SettingsStore::new(config.data_dir.join("settings.json"))?);

        let (auth_tx, auth_rx) = watch::channel(None);
        let (uploads, upload_task) = spawn_upload_worker(remote.clone(), auth_rx);

        let (tracker, goal_events) = GoalTracker::new(db.clone());
        let goals = Arc::new(tracker);

        // Startup sweep: catch goals that completed or expired while the
        // process was down, before the UI reads anything.
        goals
            .refresh_all()
            .await
            .context("failed to refresh goals at startup")?;

        let notifier_task =
            spawn_completion_notifier(scheduler.clone(), settings.clone(), goal_events);

        apply_reminder_schedule(scheduler.as_ref(), &settings.prefs().reminder)
            .context("failed to apply reminder schedule")?;

        let today = Local::now().date_naive();
        let seed = db.daily_total(today).await?;
        let (today_tx, _) = watch::channel(DayTotal {
            date: today,
            steps: seed,
        });
        let today_tx = Arc::new(today_tx);

        // Goal progress follows the day total: every credited delta triggers
        // a refresh pass over the undone goals.
        let refresh_task = {
            let goals = goals.clone();
            let mut day_rx = today_tx.subscribe();
            tokio::spawn(async move {
                while day_rx.changed().await.is_ok() {
                    if let Err(err) = goals.refresh_all().await {
                        warn!("goal refresh after delta failed: {err:#}");
                    }
                }
            })
        };

        Ok(Self {
            db,
            settings,
            remote,
            scheduler,
            goals,
            ingest: IngestController::new(),
            uploads,
            stats: IngestStats::new(),
            auth_tx,
            today_tx,
            ranking_refresh: config.ranking_refresh,
            shutdown_token: CancellationToken::new(),
            tasks: vec![upload_task, notifier_task, refresh_task],
        })
    }

    /// Start sensor ingestion. Fails fast with the sensor's error when the
    /// device has no step counter.
    pub fn start_tracking(&mut self, sensor: Box<dyn StepSensor>) -> Result<()> {
        self.ingest.start(
            sensor,
            self.db.clone(),
            self.uploads.clone(),
            self.today_tx.clone(),
            self.stats.clone(),
        )
    }

    pub async fn stop_tracking(&mut self) -> Result<()> {
        self.ingest.stop().await
    }

    pub fn is_tracking(&self) -> bool {
        self.ingest.is_running()
    }

    pub fn sign_in(&self, session: AuthSession) {
        self.auth_tx.send_replace(Some(session));
    }

    pub fn sign_out(&self) {
        self.auth_tx.send_replace(None);
    }

    /// Today's running total, updated on every credited delta.
    pub fn today(&self) -> watch::Receiver<DayTotal> {
        self.today_tx.subscribe()
    }

    pub fn goals(&self) -> &GoalTracker {
        &self.goals
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Update the daily reminder preference and re-apply the platform alarm.
    pub fn set_reminder(&self, reminder: ReminderSettings) -> Result<()> {
        self.settings.update_reminder(reminder.clone())?;
        apply_reminder_schedule(self.scheduler.as_ref(), &reminder)
    }

    /// Spawn a polling leaderboard feed for the scope. The receiver starts
    /// with an empty page and follows every refresh until shutdown.
    pub fn spawn_ranking_feed(
        &mut self,
        scope: RankScope,
        limit: usize,
    ) -> watch::Receiver<Vec<RankEntry>> {
        let feed = RankingFeed::new(self.remote.clone(), scope, limit);
        let rx = feed.subscribe();
        let cancel = self.shutdown_token.child_token();
        self.tasks
            .push(tokio::spawn(feed.run(self.ranking_refresh, cancel)));
        rx
    }

    pub async fn ingest_stats(&self) -> IngestSnapshot {
        self.stats.snapshot().await
    }

    /// Stop ingestion (draining buffered samples) and tear down background
    /// workers. Uploads already in the queue are abandoned; the next run's
    /// threshold crossing resends cumulative totals.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stop_tracking().await?;
        self.shutdown_token.cancel();

        for task in self.tasks.drain(..) {
            task.abort();
        }

        Ok(())
    }
}
