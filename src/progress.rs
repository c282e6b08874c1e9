//! Progress reporting
//!
//! The reader calls into a [`Progress`] after every record it consumes.
//! Reporting is purely observational: nothing here can change how a group
//! is classified.

use log::info;

use crate::utils::percent;

/// Receiver of progress updates from the input side of the pipeline
pub trait Progress {
    /// Called after each record with running totals
    fn record(&mut self, records: u64, bytes_read: u64);

    /// Called once the input is exhausted
    fn finish(&mut self) {}
}

/// Discards all updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    #[inline]
    fn record(&mut self, _records: u64, _bytes_read: u64) {}
}

/// Logs percent complete, by bytes read, every `interval` records
#[derive(Debug, Clone)]
pub struct PercentProgress {
    total_bytes: u64,
    interval: u64,
    next_report: u64,
    last_percent: Option<u64>,
}

impl PercentProgress {
    /// `total_bytes` is the input file size
    #[must_use]
    pub fn new(total_bytes: u64) -> Self {
        Self { total_bytes, interval: 10_000, next_report: 0, last_percent: None }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Last percentage that was logged
    pub fn last_percent(&self) -> Option<u64> {
        self.last_percent
    }
}

impl Progress for PercentProgress {
    fn record(&mut self, records: u64, bytes_read: u64) {
        if records <= self.next_report {
            return;
        }
        self.next_report = records + self.interval;
        let pct = percent(bytes_read, self.total_bytes);
        info!("{}% complete", pct);
        self.last_percent = Some(pct);
    }

    fn finish(&mut self) {
        info!("100% complete");
        self.last_percent = Some(100);
    }
}

/// Forwards updates to a closure
impl<F> Progress for F
where
    F: FnMut(u64, u64),
{
    #[inline]
    fn record(&mut self, records: u64, bytes_read: u64) {
        self(records, bytes_read)
    }
}
