pub mod goal;
pub mod steps;

pub use goal::{GoalDraft, GoalRecord};
pub use steps::{DailyStepRecord, ReconcileOutcome};
