use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::telemetry::aggregator::{PeriodicAggregator, Summarizer};
use crate::telemetry::events::{
    EvaluationCounter, EvaluationSummaries, EvaluationSummary, TelemetryEvent,
};
use crate::Config;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKey {
    key: String,
    config_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    config_id: String,
    config_row_index: i64,
    conditional_value_index: i64,
    weighted_value_index: Option<i64>,
    selected_value: String,
}

#[derive(Debug, Default)]
pub struct SummaryCounters {
    counters: HashMap<CounterKey, (serde_json::Value, u64)>,
}

/// Counts how often each config was looked up, per selected value.
pub struct EvaluationSummaryRecorder;

pub type EvaluationSummaryAggregator = PeriodicAggregator<EvaluationSummaryRecorder>;

impl Summarizer for EvaluationSummaryRecorder {
    type Key = SummaryKey;
    type Counter = SummaryCounters;

    const NAME: &'static str = "EvaluationSummaryAggregator";

    fn into_event(
        counters: HashMap<SummaryKey, SummaryCounters>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TelemetryEvent {
        let summaries = counters
            .into_iter()
            .map(|(key, summary)| EvaluationSummary {
                key: key.key,
                config_type: key.config_type,
                counters: summary
                    .counters
                    .into_iter()
                    .map(|(counter, (selected_value, count))| EvaluationCounter {
                        config_id: counter.config_id,
                        config_row_index: counter.config_row_index,
                        conditional_value_index: counter.conditional_value_index,
                        weighted_value_index: counter.weighted_value_index,
                        selected_value,
                        count,
                    })
                    .collect(),
            })
            .collect();
        TelemetryEvent::Summaries(EvaluationSummaries {
            start: start.timestamp_millis(),
            end: end.timestamp_millis(),
            summaries,
        })
    }
}

impl PeriodicAggregator<EvaluationSummaryRecorder> {
    /// Counts one lookup of `config`. Configs without evaluation metadata are ignored.
    pub fn record(&self, config: &Config) {
        let meta = match &config.evaluation_metadata {
            Some(meta) => meta,
            None => return,
        };
        let selected_value = config
            .raw_value
            .as_ref()
            .and_then(|raw| serde_json::to_value(raw).ok())
            .unwrap_or_else(|| config.value.to_json_val());
        let counter = CounterKey {
            config_id: meta.config_id.clone(),
            config_row_index: meta.config_row_index,
            conditional_value_index: meta.conditional_value_index,
            weighted_value_index: meta.weighted_value_index,
            selected_value: selected_value.to_string(),
        };
        let key = SummaryKey {
            key: config.key.clone(),
            config_type: meta.config_type.clone(),
        };
        self.record_with(key, SummaryCounters::default, move |summary| {
            summary
                .counters
                .entry(counter)
                .or_insert_with(|| (selected_value, 0))
                .1 += 1;
        });
    }
}
