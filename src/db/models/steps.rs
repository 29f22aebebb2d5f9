use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::reconcile::ReconcileResult;

/// One row per calendar day. `steps` only ever grows within a day: the
/// ingestion path adds positive deltas and nothing else writes the column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyStepRecord {
    pub date: NaiveDate,
    pub steps: u64,
}

/// Result of applying one sensor sample inside a single store transaction.
///
/// Totals reflect the state after the sample, for any classification, so the
/// caller can publish them without a second round trip.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub result: ReconcileResult,
    pub date: NaiveDate,
    pub daily_total: u64,
    pub lifetime_total: u64,
}
