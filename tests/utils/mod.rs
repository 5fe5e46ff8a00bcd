use log::kv::Key;
use log::{set_max_level, Level, Log, Metadata, Record};
use rand::distr::{Alphanumeric, SampleString};
use reforge::{EvaluationContext, Options, OptionsBuilder};
use serde_json::json;
use std::cell::RefCell;

pub const EVAL_PATH_PREFIX: &str = r"^/api/v2/configs/eval-with-context/";

pub fn rand_sdk_key() -> String {
    format!("{}-{}", rand_str(8), rand_str(22))
}

fn rand_str(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), len)
}

/// Options pointing every endpoint at the mock server, with telemetry off.
pub fn mock_options(url: &str) -> OptionsBuilder {
    Options::builder(rand_sdk_key().as_str())
        .endpoints([url])
        .telemetry_endpoint(url)
        .collect_evaluation_summaries(false)
}

pub fn user_context(key: &str) -> EvaluationContext {
    EvaluationContext::new().with_attribute("user", "key", key)
}

pub fn evaluations_payload() -> serde_json::Value {
    json!({"evaluations": {
        "turbo": {
            "value": {"double": 2.5},
            "configEvaluationMetadata": {
                "configRowIndex": "0", "conditionalValueIndex": "1",
                "type": "CONFIG", "valueType": "DOUBLE", "id": "17"
            }
        },
        "enabled-flag": {
            "value": {"bool": true},
            "configEvaluationMetadata": {
                "configRowIndex": "1", "conditionalValueIndex": "0",
                "type": "FEATURE_FLAG", "valueType": "BOOL", "id": "18"
            }
        },
        "timeout": {"value": {"duration": {"definition": "PT31M24S", "millis": "1884000"}}},
        "log-level": {"value": {"logLevel": "WARN"}},
        "log-level.noisy": {"value": {"logLevel": "ERROR"}},
        "log-levels.default": {"value": {"logLevel": "INFO"}}
    }})
}

pub fn bool_payload(key: &str, val: bool) -> String {
    json!({"evaluations": {key: {"value": {"bool": val}}}}).to_string()
}

pub struct RecordingLogger {}

impl RecordingLogger {
    thread_local!(pub static LOGS: RefCell<String> = RefCell::new(String::default()));

    pub fn take() -> String {
        Self::LOGS.with_borrow_mut(std::mem::take)
    }
}

impl Log for RecordingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().contains("reforge")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let event_id = record
            .key_values()
            .get(Key::from("event_id"))
            .and_then(|id| id.to_i64())
            .unwrap_or(0);
        Self::LOGS.with_borrow_mut(|l| l.push_str(format!("{level} [{event_id}] {}\n", record.args()).as_str()));
    }

    fn flush(&self) {}
}

pub fn log_record_init() {
    set_max_level(log::LevelFilter::Info);
    _ = log::set_logger(&RecordingLogger {});
}
