//! Progress reporting seam between the pipeline and its host.
//!
//! The pipeline only ever appends messages and pushes a percentage; hosts
//! decide what to do with them (the CLI forwards to `tracing`, a graphical
//! host would drive a progress bar, tests capture everything in memory).

use tracing::{debug, info};

/// Append-only sink for pipeline milestones. Purely observational; no
/// return values, no acknowledgment.
pub trait ProgressReporter {
    fn report(&mut self, message: &str);

    fn set_progress(&mut self, percent: u8) {
        let _ = percent;
    }
}

/// Forwards everything to `tracing`.
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&mut self, message: &str) {
        info!("{message}");
    }

    fn set_progress(&mut self, percent: u8) {
        debug!(percent, "progress");
    }
}

/// Captures messages and the last percentage. Used by tests and any host
/// that wants to replay the log after the run.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    pub messages: Vec<String>,
    pub percent: u8,
}

impl ProgressReporter for MemoryReporter {
    fn report(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    fn set_progress(&mut self, percent: u8) {
        self.percent = percent;
    }
}

/// Bounded monotonic progress indicator. Only ever moves forward, stays
/// capped at 99 until [`Gauge::finish`] sets exactly 100 on success.
#[derive(Debug, Default)]
pub struct Gauge {
    current: u8,
}

impl Gauge {
    pub fn new() -> Self {
        Gauge::default()
    }

    pub fn advance(&mut self, reporter: &mut dyn ProgressReporter, target: u8) {
        let capped = target.min(99);
        if capped > self.current {
            self.current = capped;
            reporter.set_progress(capped);
        }
    }

    pub fn finish(&mut self, reporter: &mut dyn ProgressReporter) {
        self.current = 100;
        reporter.set_progress(100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_is_monotonic_and_capped() {
        let mut reporter = MemoryReporter::default();
        let mut gauge = Gauge::new();

        gauge.advance(&mut reporter, 30);
        assert_eq!(reporter.percent, 30);
        // never moves backwards
        gauge.advance(&mut reporter, 10);
        assert_eq!(reporter.percent, 30);
        // capped below completion until the run finishes
        gauge.advance(&mut reporter, 100);
        assert_eq!(reporter.percent, 99);
        gauge.finish(&mut reporter);
        assert_eq!(reporter.percent, 100);
    }
}
