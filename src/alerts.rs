//! Alert buffering between workers and the reporter
//!
//! Workers push alerts as they find them; the orchestrator drains the buffer
//! once per progress tick and hands the batch to the reporter. Draining
//! counts every alert into the run counters and empties the buffer, so it
//! only ever holds what was raised since the previous tick. Alerts are not
//! kept after they have been drained.
//!
//! The buffer is mutex-guarded, which makes it safe for several verification
//! workers to push at the same time while the orchestrator drains.

use crate::counters::RunCounters;
use crate::types::Alert;
use parking_lot::Mutex;
use std::sync::Arc;

/// Append-only alert buffer drained at each reporting tick
#[derive(Debug)]
pub struct AlertSink {
    buffer: Mutex<Vec<Alert>>,
    counters: Arc<RunCounters>,
}

impl AlertSink {
    /// Create an empty sink that records drained alerts into `counters`
    pub fn new(counters: Arc<RunCounters>) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            counters,
        }
    }

    /// Buffer one alert
    pub fn push(&self, alert: Alert) {
        self.buffer.lock().push(alert);
    }

    /// Buffer several alerts at once
    pub fn extend(&self, alerts: impl IntoIterator<Item = Alert>) {
        let mut buffer = self.buffer.lock();
        buffer.extend(alerts);
    }

    /// Number of alerts waiting to be drained
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Take every buffered alert, counting it into the run totals
    pub fn drain(&self) -> Vec<Alert> {
        let drained = std::mem::take(&mut *self.buffer.lock());
        for alert in &drained {
            self.counters.record_alert(alert.severity);
        }
        drained
    }
}
