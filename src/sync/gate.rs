use chrono::NaiveDate;

/// Minimum accumulated local change before totals are pushed remotely.
/// Batching bounds write frequency against a per-write-billed backend.
pub const UPLOAD_THRESHOLD_STEPS: u64 = 100;

/// Last daily total that was flushed remotely. In-memory, per process run;
/// a restart simply re-uploads on the first threshold crossing, which the
/// last-write-wins remote merge absorbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadCheckpoint {
    pub date: NaiveDate,
    pub last_uploaded_daily_total: u64,
}

impl UploadCheckpoint {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            last_uploaded_daily_total: 0,
        }
    }

    /// Reset when the calendar day changes; yesterday's uploaded total must
    /// not gate today's much smaller one.
    pub fn roll_over(&mut self, date: NaiveDate) {
        if self.date != date {
            *self = Self::new(date);
        }
    }

    pub fn mark_uploaded(&mut self, daily_total: u64) {
        self.last_uploaded_daily_total = daily_total;
    }
}

pub fn should_upload(new_daily_total: u64, checkpoint: &UploadCheckpoint) -> bool {
    new_daily_total.saturating_sub(checkpoint.last_uploaded_daily_total)
        >= UPLOAD_THRESHOLD_STEPS
}
