mod controller;
mod loop_worker;
mod sensor;
mod stats;

pub use controller::IngestController;
pub use sensor::{SensorError, StepSensor};
pub use stats::{IngestSnapshot, IngestStats};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Today's running step total, published to the UI layer through a watch
/// channel. The date identifies which calendar day the count belongs to, so
/// observers can detect midnight rollover.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayTotal {
    pub date: NaiveDate,
    pub steps: u64,
}
