#![allow(dead_code)]

use crate::utils::{
    bool_payload, evaluations_payload, log_record_init, mock_options, user_context,
    RecordingLogger, EVAL_PATH_PREFIX,
};
use mockito::Matcher;
use reforge::{
    Bootstrap, Client, DurationValue, ErrorKind, EvaluationContext, LogLevel, ShouldLogParams,
    Value,
};
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod utils;

#[tokio::test]
async fn init_loads_evaluations() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", Matcher::Regex(EVAL_PATH_PREFIX.to_owned()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(evaluations_payload().to_string())
        .create_async()
        .await;

    let client = Client::new();
    client
        .init(mock_options(&server.url()).build().unwrap())
        .await
        .unwrap();

    m.assert_async().await;
    assert!(client.loaded());
    assert_eq!(client.get("turbo"), Some(Value::Float(2.5)));
    assert_eq!(client.get_value::<f64>("turbo"), Some(2.5));
    assert!(client.is_enabled("enabled-flag"));
    assert!(!client.is_enabled("turbo"));
    assert_eq!(client.get("missing"), None);
}

#[tokio::test]
async fn init_failure_keeps_the_client_unloaded() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(EVAL_PATH_PREFIX.to_owned()))
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let client = Client::new();
    let err = client
        .init(mock_options(&server.url()).build().unwrap())
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind, ErrorKind::UnexpectedHttpResponse);
    assert!(!client.loaded());
    assert!(client.extract().is_empty());
}

#[tokio::test]
async fn get_before_load_warns() {
    log_record_init();
    RecordingLogger::take();
    let client = Client::new();

    assert_eq!(client.get("turbo"), None);
    assert!(!client.is_enabled("turbo"));
    assert_eq!(client.get("log-level.app"), None);

    let logs = RecordingLogger::take();
    assert_eq!(
        logs.matches("WARNING [1000] The client has not finished loading data yet. Unable to look up actual value for key \"turbo\".")
            .count(),
        2
    );
    assert!(!logs.contains("log-level.app"));
}

#[tokio::test]
async fn update_context_fetches_for_the_new_context() {
    let mut server = mockito::Server::new_async().await;
    let first = user_context("abc");
    let second = user_context("xyz");
    let m1 = server
        .mock(
            "GET",
            Matcher::Regex(format!("{EVAL_PATH_PREFIX}{}", first.encode())),
        )
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(bool_payload("flag", false))
        .create_async()
        .await;
    let m2 = server
        .mock(
            "GET",
            Matcher::Regex(format!("{EVAL_PATH_PREFIX}{}", second.encode())),
        )
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(bool_payload("flag", true))
        .create_async()
        .await;

    let client = Client::new();
    client
        .init(mock_options(&server.url()).context(first).build().unwrap())
        .await
        .unwrap();
    assert!(!client.is_enabled("flag"));

    client.update_context(second.clone(), false).await.unwrap();

    m1.assert_async().await;
    m2.assert_async().await;
    assert_eq!(client.context(), second);
    assert!(client.is_enabled("flag"));
}

#[tokio::test]
async fn update_context_can_skip_the_load() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", Matcher::Regex(EVAL_PATH_PREFIX.to_owned()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(bool_payload("flag", true))
        .expect(1)
        .create_async()
        .await;

    let client = Client::new();
    client
        .init(mock_options(&server.url()).build().unwrap())
        .await
        .unwrap();
    client
        .update_context(user_context("other"), true)
        .await
        .unwrap();

    m.assert_async().await;
    assert_eq!(client.context(), user_context("other"));
    assert!(client.is_enabled("flag"));
}

#[tokio::test]
async fn init_keeps_the_current_context_when_none_given() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(EVAL_PATH_PREFIX.to_owned()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(bool_payload("flag", true))
        .create_async()
        .await;

    let client = Client::new();
    client
        .init(mock_options(&server.url()).context(user_context("abc")).build().unwrap())
        .await
        .unwrap();
    client
        .init(mock_options(&server.url()).build().unwrap())
        .await
        .unwrap();

    assert_eq!(client.context(), user_context("abc"));
}

#[tokio::test]
async fn get_duration() {
    let client = Client::new();
    client.hydrate(&evaluations_payload()).unwrap();

    assert_eq!(
        client.get_duration("timeout").unwrap(),
        Some(DurationValue {
            ms: 1884000,
            seconds: 1884.0
        })
    );
    assert_eq!(client.get_duration("missing").unwrap(), None);

    let err = client.get_duration("turbo").err().unwrap();
    assert_eq!(err.kind, ErrorKind::SettingValueTypeMismatch);
    assert_eq!(err.message, "Value for key \"turbo\" is not a duration");
}

#[test]
fn hydrate_and_extract() {
    let client = Client::new();
    client.hydrate(&json!({"a": 1, "b": true})).unwrap();

    let extracted = client.extract();
    assert_eq!(extracted.len(), 2);
    assert_eq!(extracted["a"], Value::Int(1));
    assert_eq!(extracted["b"], Value::Bool(true));
    assert!(client.loaded());
}

#[test]
fn hydrate_replaces_the_cache() {
    let client = Client::new();
    client.hydrate(&json!({"a": 1})).unwrap();
    client.hydrate(&evaluations_payload()).unwrap();

    assert_eq!(client.get("a"), None);
    assert_eq!(client.get("turbo"), Some(Value::Float(2.5)));
}

#[test]
fn should_log_resolution() {
    let client = Client::new();
    client.hydrate(&evaluations_payload()).unwrap();

    let params = |logger_name, desired_level| ShouldLogParams {
        logger_name,
        desired_level,
        default_level: LogLevel::Trace,
    };

    // exact match
    assert!(!client.should_log(params("noisy", LogLevel::Warn)));
    assert!(client.should_log(params("noisy", LogLevel::Error)));
    // root fallback
    assert!(!client.should_log(params("app", LogLevel::Info)));
    assert!(client.should_log(params("app", LogLevel::Warn)));
    assert!(client.should_log(params("app", LogLevel::Fatal)));
}

#[test]
fn should_log_falls_back_to_default_level() {
    let client = Client::new();
    client.hydrate(&json!({"log-level.app": "not a level"})).unwrap();

    let params = ShouldLogParams {
        logger_name: "app",
        desired_level: LogLevel::Debug,
        default_level: LogLevel::Info,
    };
    assert!(!client.should_log(params));
    assert!(client.should_log(ShouldLogParams {
        desired_level: LogLevel::Info,
        ..params
    }));
}

#[test]
fn get_log_level() {
    let client = Client::new();
    assert_eq!(client.get_log_level(""), LogLevel::Debug);

    client.hydrate(&evaluations_payload()).unwrap();
    assert_eq!(client.get_log_level("any"), LogLevel::Info);

    client.hydrate(&json!({"log-levels.default": "bogus"})).unwrap();
    assert_eq!(client.get_log_level("any"), LogLevel::Debug);
}

#[tokio::test]
async fn get_log_level_reads_the_configured_key() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(EVAL_PATH_PREFIX.to_owned()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"evaluations": {"my.level": {"value": {"logLevel": "ERROR"}}}}).to_string())
        .create_async()
        .await;

    let client = Client::new();
    client
        .init(mock_options(&server.url()).logger_key("my.level").build().unwrap())
        .await
        .unwrap();

    assert_eq!(client.get_log_level(""), LogLevel::Error);
}

#[tokio::test]
async fn after_evaluation_runs_after_get_returns() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let client = Client::new();
    client.hydrate(&evaluations_payload()).unwrap();
    let recorder = Arc::clone(&seen);
    client.set_after_evaluation(move |key, value, _context| {
        recorder
            .lock()
            .unwrap()
            .push((key.to_owned(), value.cloned()));
    });

    assert_eq!(client.get("turbo"), Some(Value::Float(2.5)));
    assert_eq!(client.get("missing"), None);
    assert_eq!(client.get("log-level"), Some(Value::LogLevel(LogLevel::Warn)));
    assert!(seen.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("turbo".to_owned(), Some(Value::Float(2.5))),
            ("missing".to_owned(), None)
        ]
    );
}

#[tokio::test]
async fn after_evaluation_from_options_receives_the_context() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(EVAL_PATH_PREFIX.to_owned()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(bool_payload("flag", true))
        .create_async()
        .await;
    let contexts = Arc::new(Mutex::new(Vec::<EvaluationContext>::new()));
    let recorder = Arc::clone(&contexts);

    let client = Client::new();
    client
        .init(
            mock_options(&server.url())
                .context(user_context("abc"))
                .after_evaluation(move |_key, _value, context| {
                    recorder.lock().unwrap().push(context.clone());
                })
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(client.is_enabled("flag"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*contexts.lock().unwrap(), vec![user_context("abc")]);
}

#[tokio::test]
async fn matching_bootstrap_skips_the_network() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", Matcher::Regex(EVAL_PATH_PREFIX.to_owned()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(bool_payload("flag", false))
        .expect(0)
        .create_async()
        .await;
    let bootstrap = Bootstrap::new(
        user_context("abc"),
        json!({"flag": {"value": {"bool": true}}}),
    );

    let client = Client::new();
    client
        .init(
            mock_options(&server.url())
                .context(user_context("abc"))
                .bootstrap(bootstrap)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

    m.assert_async().await;
    assert!(client.is_enabled("flag"));
}

#[tokio::test]
async fn mismatching_bootstrap_is_ignored() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", Matcher::Regex(EVAL_PATH_PREFIX.to_owned()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(bool_payload("flag", false))
        .expect(1)
        .create_async()
        .await;
    let bootstrap = Bootstrap::new(
        user_context("someone-else"),
        json!({"flag": {"value": {"bool": true}}}),
    );

    let client = Client::new();
    client
        .init(
            mock_options(&server.url())
                .context(user_context("abc"))
                .bootstrap(bootstrap)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

    m.assert_async().await;
    assert!(!client.is_enabled("flag"));
}

#[tokio::test]
async fn bootstrap_is_read_once() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", Matcher::Regex(EVAL_PATH_PREFIX.to_owned()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(bool_payload("flag", false))
        .expect(1)
        .create_async()
        .await;
    let bootstrap = Bootstrap::new(
        user_context("abc"),
        json!({"flag": {"value": {"bool": true}}}),
    );

    let client = Client::new();
    client
        .init(
            mock_options(&server.url())
                .context(user_context("abc"))
                .bootstrap(bootstrap)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(client.is_enabled("flag"));

    client
        .update_context(user_context("abc"), false)
        .await
        .unwrap();

    m.assert_async().await;
    assert!(!client.is_enabled("flag"));
}

#[tokio::test(flavor = "multi_thread")]
async fn set_http_timeout_applies_to_the_next_fetch() {
    let mut server = mockito::Server::new_async().await;
    let body = bool_payload("flag", true);
    server
        .mock("GET", Matcher::Regex(EVAL_PATH_PREFIX.to_owned()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_chunked_body(move |w| {
            std::thread::sleep(Duration::from_millis(300));
            w.write_all(body.as_bytes())
        })
        .create_async()
        .await;

    let client = Client::new();
    client
        .init(mock_options(&server.url()).build().unwrap())
        .await
        .unwrap();
    assert!(client.is_enabled("flag"));

    client.set_http_timeout(Duration::from_millis(100)).unwrap();
    let err = client
        .update_context(user_context("abc"), false)
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind, ErrorKind::HttpRequestTimeout);
    assert!(client.is_enabled("flag"));
}
