use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use log::{info, warn};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::db::{
    models::{GoalDraft, GoalRecord},
    Database,
};

use super::calendar::{expand_to_calendar, goals_on};

const EVENT_QUEUE_CAPACITY: usize = 16;

/// Emitted exactly once per goal, when progress first reaches the target.
#[derive(Debug, Clone)]
pub enum GoalEvent {
    Completed(GoalRecord),
}

/// Sole writer of goal progress. Progress is always recomputed from the
/// daily step rows, never incremented in place, so a refresh is idempotent
/// against unchanged totals.
pub struct GoalTracker {
    db: Database,
    events: mpsc::Sender<GoalEvent>,
    list: watch::Sender<Vec<GoalRecord>>,
}

impl GoalTracker {
    pub fn new(db: Database) -> (Self, mpsc::Receiver<GoalEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (list_tx, _) = watch::channel(Vec::new());

        (
            Self {
                db,
                events: events_tx,
                list: list_tx,
            },
            events_rx,
        )
    }

    /// Observable goal list; re-published after every mutation and refresh.
    pub fn subscribe(&self) -> watch::Receiver<Vec<GoalRecord>> {
        self.list.subscribe()
    }

    pub async fn create_goal(&self, draft: GoalDraft) -> Result<GoalRecord> {
        if draft.target_steps == 0 {
            bail!("goal target must be a positive step count");
        }
        if draft.end_date < draft.start_date {
            bail!(
                "goal ends ({}) before it starts ({})",
                draft.end_date,
                draft.start_date
            );
        }

        let now = Utc::now();
        let goal = GoalRecord {
            id: Uuid::new_v4().to_string(),
            remote_id: None,
            title: draft.title,
            target_steps: draft.target_steps,
            current_steps: 0,
            start_date: draft.start_date,
            end_date: draft.end_date,
            memo: draft.memo,
            is_done: false,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_goal(&goal).await?;

        // Days inside the span may already hold steps; seed progress now so
        // the goal does not render at zero until the next credited delta.
        let seeded = self.refresh_progress(&goal.id).await?.unwrap_or(goal);

        self.publish_list().await?;
        Ok(seeded)
    }

    pub async fn update_memo(&self, goal_id: &str, memo: Option<String>) -> Result<()> {
        self.db.update_goal_memo(goal_id, memo, Utc::now()).await?;
        self.publish_list().await
    }

    pub async fn delete_goal(&self, goal_id: &str) -> Result<()> {
        self.db.delete_goal(goal_id).await?;
        self.publish_list().await
    }

    /// Recompute `current_steps` from the daily sums over the goal's span.
    ///
    /// Completion fires exactly once: the done flag is read and written in
    /// the same pass, and a goal already marked done is never re-signalled.
    /// Returns the refreshed record, or None for an unknown id.
    pub async fn refresh_progress(&self, goal_id: &str) -> Result<Option<GoalRecord>> {
        let Some(mut goal) = self.db.get_goal(goal_id).await? else {
            return Ok(None);
        };

        let sum = self
            .db
            .sum_steps_range(goal.start_date, goal.end_date)
            .await?;

        let newly_done = !goal.is_done && sum >= goal.target_steps;

        if sum != goal.current_steps || newly_done {
            goal.current_steps = sum;
            if newly_done {
                goal.is_done = true;
            }
            goal.updated_at = Utc::now();
            self.db
                .update_goal_progress(&goal.id, sum, goal.is_done, goal.updated_at)
                .await?;
        }

        if newly_done {
            info!("goal '{}' completed at {} steps", goal.title, sum);
            if let Err(err) = self.events.try_send(GoalEvent::Completed(goal.clone())) {
                warn!("dropping goal completion event: {err}");
            }
        }

        Ok(Some(goal))
    }

    /// Refresh every goal that can still change, then re-publish the list.
    /// Run at startup and after each credited delta.
    pub async fn refresh_all(&self) -> Result<()> {
        for goal in self.db.list_goals().await? {
            if !goal.is_done {
                self.refresh_progress(&goal.id).await?;
            }
        }
        self.publish_list().await
    }

    pub async fn goals_for_date(&self, date: NaiveDate) -> Result<Vec<GoalRecord>> {
        Ok(goals_on(&self.db.list_goals().await?, date))
    }

    /// Goals still in play: neither completed nor past their end date.
    pub async fn active_goals(&self, today: NaiveDate) -> Result<Vec<GoalRecord>> {
        Ok(self
            .db
            .list_goals()
            .await?
            .into_iter()
            .filter(|goal| !goal.is_done && !goal.is_expired(today))
            .collect())
    }

    /// Per-day buckets for calendar rendering.
    pub async fn calendar(&self) -> Result<BTreeMap<NaiveDate, Vec<GoalRecord>>> {
        Ok(expand_to_calendar(&self.db.list_goals().await?))
    }

    async fn publish_list(&self) -> Result<()> {
        self.list.send_replace(self.db.list_goals().await?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::db::test_support::temp_db;
    use crate::reconcile::RawCounterSample;

    fn day(s: &str) -> NaiveDate {
        match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(date) => date,
            Err(err) => panic!("bad test date {s}: {err}"),
        }
    }

    fn draft(target: u64, start: &str, end: &str) -> GoalDraft {
        GoalDraft {
            title: "Walk the quad".into(),
            target_steps: target,
            start_date: day(start),
            end_date: day(end),
            memo: None,
        }
    }

    async fn credit(db: &Database, date: NaiveDate, cumulative: f64) {
        db.apply_sample(
            RawCounterSample {
                value: cumulative,
                observed_at: Utc::now(),
            },
            date,
        )
        .await
        .expect("apply sample");
    }

    #[tokio::test]
    async fn completion_fires_exactly_once_across_the_threshold() {
        let db = temp_db("tracker-completion");
        let (tracker, mut events) = GoalTracker::new(db.clone());

        let goal = tracker
            .create_goal(draft(5000, "2025-03-01", "2025-03-07"))
            .await
            .expect("create");

        credit(&db, day("2025-03-01"), 0.0).await; // baseline
        credit(&db, day("2025-03-01"), 4999.0).await;

        let refreshed = tracker
            .refresh_progress(&goal.id)
            .await
            .expect("refresh")
            .expect("present");
        assert_eq!(refreshed.current_steps, 4999);
        assert!(!refreshed.is_done);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        credit(&db, day("2025-03-02"), 5004.0).await;

        let refreshed = tracker
            .refresh_progress(&goal.id)
            .await
            .expect("refresh")
            .expect("present");
        assert_eq!(refreshed.current_steps, 5004);
        assert!(refreshed.is_done);
        assert!(matches!(events.try_recv(), Ok(GoalEvent::Completed(_))));

        // Further refreshes with unchanged totals change nothing and stay silent.
        let again = tracker
            .refresh_progress(&goal.id)
            .await
            .expect("refresh")
            .expect("present");
        assert_eq!(again.current_steps, 5004);
        assert!(again.is_done);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn refresh_is_idempotent_on_unchanged_totals() {
        let db = temp_db("tracker-idempotent");
        let (tracker, _events) = GoalTracker::new(db.clone());

        let goal = tracker
            .create_goal(draft(10_000, "2025-03-01", "2025-03-31"))
            .await
            .expect("create");

        credit(&db, day("2025-03-01"), 0.0).await;
        credit(&db, day("2025-03-01"), 1234.0).await;

        let first = tracker
            .refresh_progress(&goal.id)
            .await
            .expect("refresh")
            .expect("present");
        let second = tracker
            .refresh_progress(&goal.id)
            .await
            .expect("refresh")
            .expect("present");

        assert_eq!(first.current_steps, 1234);
        assert_eq!(second.current_steps, 1234);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn create_seeds_progress_from_existing_days() {
        let db = temp_db("tracker-seed");
        let (tracker, _events) = GoalTracker::new(db.clone());

        credit(&db, day("2025-03-01"), 0.0).await;
        credit(&db, day("2025-03-01"), 800.0).await;

        let goal = tracker
            .create_goal(draft(5000, "2025-03-01", "2025-03-07"))
            .await
            .expect("create");

        assert_eq!(goal.current_steps, 800);
    }

    #[tokio::test]
    async fn active_goals_excludes_done_and_expired() {
        let db = temp_db("tracker-active");
        let (tracker, _events) = GoalTracker::new(db.clone());

        tracker
            .create_goal(draft(5000, "2025-03-01", "2025-03-07"))
            .await
            .expect("past goal");
        tracker
            .create_goal(draft(5000, "2025-03-10", "2025-03-20"))
            .await
            .expect("current goal");

        let active = tracker.active_goals(day("2025-03-12")).await.expect("active");

        assert_eq!(active.len(), 1);
        assert_eq!(active[0].start_date, day("2025-03-10"));
    }

    #[tokio::test]
    async fn invalid_drafts_are_rejected() {
        let db = temp_db("tracker-validate");
        let (tracker, _events) = GoalTracker::new(db);

        assert!(tracker
            .create_goal(draft(0, "2025-03-01", "2025-03-07"))
            .await
            .is_err());
        assert!(tracker
            .create_goal(draft(1000, "2025-03-07", "2025-03-01"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn subscribe_sees_mutations() {
        let db = temp_db("tracker-subscribe");
        let (tracker, _events) = GoalTracker::new(db);
        let rx = tracker.subscribe();

        let goal = tracker
            .create_goal(draft(5000, "2025-03-01", "2025-03-07"))
            .await
            .expect("create");
        assert_eq!(rx.borrow().len(), 1);

        tracker.delete_goal(&goal.id).await.expect("delete");
        assert!(rx.borrow().is_empty());
    }
}
