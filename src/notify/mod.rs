//! Local notification contract and the goal-completion notifier.
//!
//! The platform's alarm service does the actual delivery; this module only
//! decides what to post and when.

use std::sync::Arc;

use anyhow::Result;
use log::warn;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::goals::GoalEvent;
use crate::settings::{ReminderSettings, SettingsStore};

pub const DAILY_REMINDER_ID: &str = "daily-walk-reminder";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub body: String,
}

/// Platform notification collaborator: immediate posts plus wall-clock
/// repeating alarms that survive app-process death.
pub trait NotificationScheduler: Send + Sync + 'static {
    fn notify_now(&self, note: Notification) -> Result<()>;

    fn schedule_daily(&self, hour: u32, minute: u32, note: Notification) -> Result<()>;

    fn cancel(&self, id: &str) -> Result<()>;
}

/// Apply the user's reminder preference: schedule the repeating reminder or
/// cancel a previously scheduled one.
pub fn apply_reminder_schedule(
    scheduler: &dyn NotificationScheduler,
    reminder: &ReminderSettings,
) -> Result<()> {
    if reminder.enabled {
        scheduler.schedule_daily(
            reminder.hour,
            reminder.minute,
            Notification {
                id: DAILY_REMINDER_ID.to_string(),
                title: "Time for a walk".to_string(),
                body: "Get a few steps in before the day ends.".to_string(),
            },
        )
    } else {
        scheduler.cancel(DAILY_REMINDER_ID)
    }
}

/// Consumes goal events and posts the one-time achievement notification.
/// The tracker guarantees one event per completed goal; this task only adds
/// the user's notifications-enabled preference on top.
pub fn spawn_completion_notifier(
    scheduler: Arc<dyn NotificationScheduler>,
    settings: Arc<SettingsStore>,
    mut events: mpsc::Receiver<GoalEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let GoalEvent::Completed(goal) = event;

            if !settings.notifications_enabled() {
                continue;
            }

            let note = Notification {
                id: format!("goal-done-{}", goal.id),
                title: "Goal complete!".to_string(),
                body: format!("'{}' reached {} steps.", goal.title, goal.target_steps),
            };

            if let Err(err) = scheduler.notify_now(note) {
                warn!("failed to post goal completion notification: {err:#}");
            }
        }
    })
}
