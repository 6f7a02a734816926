//! Progress reporting per dataset section.
//!
//! Logging is observational only: methods return nothing and cannot change
//! the outcome of a run.

use std::sync::Mutex;

/// Receives progress of long-running sections (one per dataset).
pub trait SectionLogger: Send + Sync {
    fn section_starts(&self, section: &str, message: &str);
    fn section_continues(&self, section: &str, message: &str);
    fn section_ended(&self, section: &str, message: &str);
    fn section_failed(&self, section: &str, message: &str);
}

/// Emits every section event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl SectionLogger for TracingLogger {
    fn section_starts(&self, section: &str, message: &str) {
        tracing::info!(section, "{}", message);
    }

    fn section_continues(&self, section: &str, message: &str) {
        tracing::debug!(section, "{}", message);
    }

    fn section_ended(&self, section: &str, message: &str) {
        tracing::info!(section, "{}", message);
    }

    fn section_failed(&self, section: &str, message: &str) {
        tracing::error!(section, "{}", message);
    }
}

/// Section event kinds, as captured by [`RecordingLogger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionEvent {
    Starts,
    Continues,
    Ended,
    Failed,
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<(SectionEvent, String, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(SectionEvent, String, String)> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Events recorded for one section, in order.
    pub fn section(&self, section: &str) -> Vec<SectionEvent> {
        self.events()
            .into_iter()
            .filter(|(_, s, _)| s == section)
            .map(|(event, _, _)| event)
            .collect()
    }

    fn record(&self, event: SectionEvent, section: &str, message: &str) {
        let entry = (event, section.to_string(), message.to_string());
        match self.events.lock() {
            Ok(mut guard) => guard.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

impl SectionLogger for RecordingLogger {
    fn section_starts(&self, section: &str, message: &str) {
        self.record(SectionEvent::Starts, section, message);
    }

    fn section_continues(&self, section: &str, message: &str) {
        self.record(SectionEvent::Continues, section, message);
    }

    fn section_ended(&self, section: &str, message: &str) {
        self.record(SectionEvent::Ended, section, message);
    }

    fn section_failed(&self, section: &str, message: &str) {
        self.record(SectionEvent::Failed, section, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_logger_filters_by_section() {
        let logger = RecordingLogger::new();
        logger.section_starts("apex-classes", "Querying");
        logger.section_starts("permission-sets", "Querying");
        logger.section_continues("apex-classes", "Scanning 12 bodies");
        logger.section_ended("apex-classes", "12 classes");
        logger.section_failed("permission-sets", "boom");

        assert_eq!(
            logger.section("apex-classes"),
            vec![SectionEvent::Starts, SectionEvent::Continues, SectionEvent::Ended]
        );
        assert_eq!(
            logger.section("permission-sets"),
            vec![SectionEvent::Starts, SectionEvent::Failed]
        );
        assert_eq!(logger.events().len(), 5);
    }
}
