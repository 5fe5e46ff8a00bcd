use serde::Serialize;

/// The body of a telemetry upload.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvents {
    pub instance_hash: String,
    pub events: Vec<TelemetryEvent>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum TelemetryEvent {
    Summaries(EvaluationSummaries),
    Loggers(LoggersEvent),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EvaluationSummaries {
    pub start: i64,
    pub end: i64,
    pub summaries: Vec<EvaluationSummary>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EvaluationSummary {
    pub key: String,
    #[serde(rename = "type")]
    pub config_type: String,
    pub counters: Vec<EvaluationCounter>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationCounter {
    pub config_id: String,
    pub config_row_index: i64,
    pub conditional_value_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_value_index: Option<i64>,
    pub selected_value: serde_json::Value,
    pub count: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoggersEvent {
    pub start_at: i64,
    pub end_at: i64,
    pub loggers: Vec<LoggerCounter>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoggerCounter {
    pub logger_name: String,
    pub traces: u64,
    pub debugs: u64,
    pub infos: u64,
    pub warns: u64,
    pub errors: u64,
    pub fatals: u64,
}
