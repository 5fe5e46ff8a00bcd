use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::telemetry::aggregator::{PeriodicAggregator, Summarizer};
use crate::telemetry::events::{LoggerCounter, LoggersEvent, TelemetryEvent};
use crate::LogLevel;

/// Counts `should_log` checks per logger name and severity.
pub struct LoggerUsageRecorder;

pub type LoggerAggregator = PeriodicAggregator<LoggerUsageRecorder>;

impl Summarizer for LoggerUsageRecorder {
    type Key = String;
    type Counter = LoggerCounter;

    const NAME: &'static str = "LoggerAggregator";

    fn into_event(
        counters: HashMap<String, LoggerCounter>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TelemetryEvent {
        TelemetryEvent::Loggers(LoggersEvent {
            start_at: start.timestamp_millis(),
            end_at: end.timestamp_millis(),
            loggers: counters.into_values().collect(),
        })
    }
}

impl PeriodicAggregator<LoggerUsageRecorder> {
    pub fn record(&self, logger: &str, level: LogLevel) {
        self.record_with(
            logger.to_owned(),
            || LoggerCounter {
                logger_name: logger.to_owned(),
                ..Default::default()
            },
            |counter| match level {
                LogLevel::Trace => counter.traces += 1,
                LogLevel::Debug => counter.debugs += 1,
                LogLevel::Info => counter.infos += 1,
                LogLevel::Warn => counter.warns += 1,
                LogLevel::Error => counter.errors += 1,
                LogLevel::Fatal => counter.fatals += 1,
            },
        );
    }
}
