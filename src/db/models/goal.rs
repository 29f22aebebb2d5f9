//! Goal data model.
//!
//! A goal is a user-defined target step count over an explicit date range.
//! Lifecycle: created -> mutated (progress, memo) -> either expires (end date
//! passed while undone) or completes -> deleted by explicit user action.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalRecord {
    pub id: String,
    pub remote_id: Option<String>,
    pub title: String,
    pub target_steps: u64,
    pub current_steps: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub memo: Option<String>,
    /// Flips to true exactly once, when progress first reaches the target.
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GoalRecord {
    /// Whether `date` falls inside the goal's inclusive span.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Expired goals are past their end date without having completed.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        !self.is_done && self.end_date < today
    }
}

/// User input for creating a goal; validated by the tracker before insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalDraft {
    pub title: String,
    pub target_steps: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub memo: Option<String>,
}
