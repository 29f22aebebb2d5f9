use thiserror::Error;
use tokio::sync::mpsc;

use crate::reconcile::RawCounterSample;

#[derive(Debug, Error)]
pub enum SensorError {
    /// The device has no step-counter hardware. Surfaced once at startup;
    /// the ingestion path never starts.
    #[error("step counter sensor unavailable")]
    Unavailable,
    #[error("sensor backend failure: {0}")]
    Backend(String),
}

/// Push-style hardware adapter. Implementations register a platform sensor
/// listener and forward every cumulative reading into `tx` until stopped.
/// Readings arrive at irregular, driver-determined intervals.
pub trait StepSensor: Send + 'static {
    fn start(&mut self, tx: mpsc::Sender<RawCounterSample>) -> Result<(), SensorError>;

    fn stop(&mut self);
}
