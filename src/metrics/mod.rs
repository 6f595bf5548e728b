use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Counters accumulated by the engine across dispatch passes and navigation.
#[derive(Debug, Default, Clone)]
pub struct LifecycleMetrics {
    dispatch_passes: u64,
    transitions: u64,
    destroyed: u64,
    navigations: u64,
    restore_misses: u64,
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatch(&mut self) {
        self.dispatch_passes = self.dispatch_passes.saturating_add(1);
    }

    pub fn record_transition(&mut self) {
        self.transitions = self.transitions.saturating_add(1);
    }

    pub fn record_destroyed(&mut self) {
        self.destroyed = self.destroyed.saturating_add(1);
    }

    pub fn record_navigation(&mut self) {
        self.navigations = self.navigations.saturating_add(1);
    }

    pub fn record_restore_miss(&mut self) {
        self.restore_misses = self.restore_misses.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            dispatch_passes: self.dispatch_passes,
            transitions: self.transitions,
            destroyed: self.destroyed,
            navigations: self.navigations,
            restore_misses: self.restore_misses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub dispatch_passes: u64,
    pub transitions: u64,
    pub destroyed: u64,
    pub navigations: u64,
    pub restore_misses: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "lifecycle_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("dispatch_passes".to_string(), json!(self.dispatch_passes));
        map.insert("transitions".to_string(), json!(self.transitions));
        map.insert("destroyed".to_string(), json!(self.destroyed));
        map.insert("navigations".to_string(), json!(self.navigations));
        map.insert("restore_misses".to_string(), json!(self.restore_misses));
        map
    }
}
