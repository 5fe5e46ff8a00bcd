use crate::bootstrap::{self, Bootstrap};
use crate::constants::{DEFAULT_LOGGER_KEY, LOG_LEVEL_PREFIX};
use crate::dispatch::Dispatcher;
use crate::errors::ErrorKind;
use crate::fetch::loader::RemoteLoader;
use crate::logger::Logger;
use crate::model::config::{digest, Config};
use crate::options::AfterEvaluationCallback;
use crate::telemetry::evaluation_summary::EvaluationSummaryAggregator;
use crate::telemetry::logger_usage::LoggerAggregator;
use crate::telemetry::uploader::TelemetryUploader;
use crate::value::{DurationValue, Value, ValuePrimitive};
use crate::{ClientError, EvaluationContext, LogLevel, Options, PollStatus};
use arc_swap::{ArcSwap, ArcSwapOption};
use log::{debug, error, warn};
use std::any::type_name;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Parameters of [`Client::should_log`].
#[derive(Debug, Clone, Copy)]
pub struct ShouldLogParams<'a> {
    /// Name of the logger, looked up as `log-level.{logger_name}`.
    pub logger_name: &'a str,
    /// The level of the message about to be logged.
    pub desired_level: LogLevel,
    /// The threshold used when no level is configured for the logger.
    pub default_level: LogLevel,
}

struct Session {
    loader: RemoteLoader,
    logger_key: String,
    bootstrap: Mutex<Option<Bootstrap>>,
    summaries: Option<Arc<EvaluationSummaryAggregator>>,
    loggers: Option<Arc<LoggerAggregator>>,
}

impl Session {
    fn claim_bootstrap(&self) -> Option<Bootstrap> {
        self.bootstrap.lock().ok().and_then(|mut b| b.take())
    }

    async fn stop_telemetry(&self) {
        if let Some(summaries) = &self.summaries {
            summaries.stop().await;
        }
        if let Some(loggers) = &self.loggers {
            loggers.stop().await;
        }
    }

    /// Stops the telemetry timers and flushes in the background when a runtime is available.
    fn shutdown(self: Arc<Self>) {
        if let Some(summaries) = &self.summaries {
            summaries.stop_timer();
        }
        if let Some(loggers) = &self.loggers {
            loggers.stop_timer();
        }
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move { self.stop_telemetry().await });
        }
    }
}

struct PollTimer {
    id: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct PollState {
    status: PollStatus,
    timer: Option<PollTimer>,
    next_timer_id: u64,
}

struct ClientState {
    instance_hash: String,
    configs: ArcSwap<HashMap<String, Config>>,
    loaded: AtomicBool,
    context: ArcSwap<EvaluationContext>,
    session: ArcSwapOption<Session>,
    after_evaluation: ArcSwapOption<AfterEvaluationCallback>,
    collect_evaluation_summaries: AtomicBool,
    collect_logger_names: AtomicBool,
    poll: Mutex<PollState>,
    poll_count: AtomicU64,
    dispatcher: Dispatcher,
}

impl ClientState {
    fn session(&self) -> Result<Arc<Session>, ClientError> {
        match self.session.load_full() {
            Some(session) => Ok(session),
            None => {
                let err = ClientError::new(
                    ErrorKind::NotInitialized,
                    "The client is not initialized. Call init() first.".to_owned(),
                );
                error!(event_id = err.kind.as_u16(); "{}", err);
                Err(err)
            }
        }
    }

    fn poll_state(&self) -> MutexGuard<'_, PollState> {
        match self.poll.lock() {
            Ok(poll) => poll,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_current_timer(&self, id: u64) -> bool {
        let poll = self.poll_state();
        matches!(poll.status, PollStatus::Running(_))
            && poll
                .timer
                .as_ref()
                .is_some_and(|t| t.id == id && !t.token.is_cancelled())
    }

    fn adopt(&self, payload: &serde_json::Value, kind: ErrorKind) -> Result<(), ClientError> {
        match digest(payload) {
            Ok(configs) => {
                self.configs.store(Arc::new(configs));
                self.loaded.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(err) => {
                let err = ClientError::new(kind, format!("Could not adopt the config payload. {err}"));
                error!(event_id = err.kind.as_u16(); "{}", err);
                Err(err)
            }
        }
    }

    async fn load(&self) -> Result<(), ClientError> {
        let session = self.session()?;
        let context = self.context.load_full();

        if let Some(bootstrap) = session.claim_bootstrap() {
            if bootstrap.context == *context {
                debug!("Adopting the bootstrap evaluations");
                return self.adopt(&bootstrap.payload(), ErrorKind::InvalidPayload);
            }
            debug!("Ignoring the bootstrap evaluations, they were made for another context");
        }

        session.loader.set_context(context.as_ref().clone());
        let result = match session.loader.load().await {
            Ok(payload) => self.adopt(&payload, ErrorKind::InvalidHttpResponseContent),
            Err(err) => Err(err),
        };
        if matches!(self.poll_state().status, PollStatus::Running(_)) {
            self.poll_count.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    fn get(&self, key: &str) -> Option<Value> {
        let log_level_key = key.starts_with(LOG_LEVEL_PREFIX);
        if !self.loaded.load(Ordering::SeqCst) {
            if !log_level_key {
                warn!(event_id = ErrorKind::NotInitialized.as_u16(); "The client has not finished loading data yet. Unable to look up actual value for key \"{key}\".");
            }
            return None;
        }

        let configs = self.configs.load();
        let config = configs.get(key);
        let value = config.map(|c| c.value.clone());

        if !log_level_key {
            if self.collect_evaluation_summaries.load(Ordering::SeqCst) {
                if let (Some(config), Some(summaries)) = (
                    config,
                    self.session.load_full().and_then(|s| s.summaries.clone()),
                ) {
                    let config = config.clone();
                    self.dispatcher.submit(move || summaries.record(&config));
                }
            }
            if let Some(callback) = self.after_evaluation.load_full() {
                let key = key.to_owned();
                let value = value.clone();
                let context = self.context.load_full();
                self.dispatcher
                    .submit(move || (**callback)(key.as_str(), value.as_ref(), &*context));
            }
        }

        value
    }

    fn configured_level(&self, key: &str) -> Option<LogLevel> {
        self.get(key).and_then(|value| value.as_log_level())
    }
}

/// The client runtime: holds the current context and configuration snapshot, keeps it fresh
/// and reports usage telemetry.
///
/// # Examples
///
/// ```no_run
/// use reforge::{Client, EvaluationContext, Options};
///
/// #[tokio::main]
/// async fn main() {
///     let client = Client::new();
///     let options = Options::builder("sdk-key")
///         .context(EvaluationContext::new().with_attribute("user", "key", "abc"))
///         .build()
///         .unwrap();
///
///     client.init(options).await.unwrap();
///     let is_enabled = client.is_enabled("my-flag");
/// }
/// ```
pub struct Client {
    state: Arc<ClientState>,
}

impl Client {
    /// Creates a new, uninitialized [`Client`].
    pub fn new() -> Self {
        Self {
            state: Arc::new(ClientState {
                instance_hash: uuid::Uuid::new_v4().to_string(),
                configs: ArcSwap::from_pointee(HashMap::new()),
                loaded: AtomicBool::new(false),
                context: ArcSwap::from_pointee(EvaluationContext::default()),
                session: ArcSwapOption::empty(),
                after_evaluation: ArcSwapOption::empty(),
                collect_evaluation_summaries: AtomicBool::new(true),
                collect_logger_names: AtomicBool::new(false),
                poll: Mutex::new(PollState::default()),
                poll_count: AtomicU64::new(0),
                dispatcher: Dispatcher::new(),
            }),
        }
    }

    /// Initializes the client with the given [`Options`] and loads the configuration.
    ///
    /// The configuration comes from the bootstrap when its context matches, otherwise it is
    /// fetched. Calling `init` again replaces the previous setup and flushes its telemetry.
    ///
    /// # Errors
    ///
    /// This method fails when the HTTP clients can't be created or the configuration can't be loaded.
    pub async fn init(&self, mut options: Options) -> Result<(), ClientError> {
        let state = &self.state;
        if let Some(context) = options.context() {
            state.context.store(Arc::new(context.clone()));
        }

        let loader = RemoteLoader::new(&options)?;
        loader.set_context(self.context());
        let uploader = Arc::new(TelemetryUploader::new(&options)?);

        let summaries = options.collect_evaluation_summaries().then(|| {
            let aggregator = Arc::new(EvaluationSummaryAggregator::new(
                Arc::clone(&uploader),
                &state.instance_hash,
                options.max_telemetry_keys(),
                options.telemetry_sync_interval(),
            ));
            aggregator.start();
            aggregator
        });
        let loggers = options.collect_logger_names().then(|| {
            let aggregator = Arc::new(LoggerAggregator::new(
                Arc::clone(&uploader),
                &state.instance_hash,
                options.max_telemetry_keys(),
                options.telemetry_sync_interval(),
            ));
            aggregator.start();
            aggregator
        });

        state
            .collect_evaluation_summaries
            .store(options.collect_evaluation_summaries(), Ordering::SeqCst);
        state
            .collect_logger_names
            .store(options.collect_logger_names(), Ordering::SeqCst);
        state
            .after_evaluation
            .store(options.after_evaluation().cloned().map(Arc::new));

        let session = Session {
            loader,
            logger_key: options.logger_key().to_owned(),
            bootstrap: Mutex::new(options.take_bootstrap().or_else(bootstrap::claim_global)),
            summaries,
            loggers,
        };
        if let Some(previous) = state.session.swap(Some(Arc::new(session))) {
            previous.shutdown();
        }

        state.load().await
    }

    /// Replaces the evaluation context and, unless `skip_load` is set, reloads the configuration for it.
    ///
    /// # Errors
    ///
    /// This method fails when the client is not initialized or the configuration can't be loaded.
    pub async fn update_context(
        &self,
        context: EvaluationContext,
        skip_load: bool,
    ) -> Result<(), ClientError> {
        self.state.session()?;
        self.state.context.store(Arc::new(context));
        if skip_load {
            return Ok(());
        }
        self.state.load().await
    }

    /// Changes the timeout of the following configuration fetches.
    ///
    /// # Errors
    ///
    /// This method fails when the client is not initialized.
    pub fn set_http_timeout(&self, timeout: Duration) -> Result<(), ClientError> {
        self.state.session()?.loader.set_timeout(timeout);
        Ok(())
    }

    /// Loads the configuration now and then every `frequency`.
    ///
    /// A previously started polling is replaced. The next load is scheduled even when the
    /// immediate one fails.
    ///
    /// # Errors
    ///
    /// This method fails when the client is not initialized or the immediate load fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use reforge::{Client, Options};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::new();
    ///     client.init(Options::builder("sdk-key").build().unwrap()).await.unwrap();
    ///     client.poll(Duration::from_secs(60)).await.unwrap();
    /// }
    /// ```
    pub async fn poll(&self, frequency: Duration) -> Result<(), ClientError> {
        self.state.session()?;
        {
            let mut poll = self.state.poll_state();
            if let Some(timer) = poll.timer.take() {
                timer.token.cancel();
            }
            poll.status = PollStatus::Pending;
        }

        let result = self.state.load().await;
        self.schedule(frequency);
        result
    }

    fn schedule(&self, frequency: Duration) {
        let (id, token) = {
            let mut poll = self.state.poll_state();
            if poll.status != PollStatus::Pending {
                return;
            }
            if let Some(timer) = poll.timer.take() {
                timer.token.cancel();
            }
            poll.next_timer_id += 1;
            let id = poll.next_timer_id;
            let token = CancellationToken::new();
            poll.timer = Some(PollTimer {
                id,
                token: token.clone(),
            });
            poll.status = PollStatus::Running(frequency);
            (id, token)
        };

        let weak: Weak<ClientState> = Arc::downgrade(&self.state);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(frequency) => {},
                    _ = token.cancelled() => break
                }
                let state = match weak.upgrade() {
                    Some(state) => state,
                    None => break,
                };
                if !state.is_current_timer(id) {
                    break;
                }
                if let Err(err) = state.load().await {
                    debug!("Scheduled load failed. ({err})");
                }
                if !state.is_current_timer(id) {
                    break;
                }
            }
        });
    }

    /// Cancels the scheduled loads. Calling it again has no further effect.
    pub fn stop_polling(&self) {
        let mut poll = self.state.poll_state();
        if let Some(timer) = poll.timer.take() {
            timer.token.cancel();
        }
        poll.status = PollStatus::Stopped;
    }

    /// Stops the telemetry timers and uploads what was collected so far.
    pub async fn stop_telemetry(&self) {
        if let Some(session) = self.state.session.load_full() {
            session.stop_telemetry().await;
        }
    }

    /// Looks up the value of the config identified by `key`.
    ///
    /// Returns [`None`] when the key is unknown or nothing was loaded yet. Lookups outside the
    /// `log-level` namespace are counted for telemetry and reported to the after-evaluation
    /// callback once this method returned.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reforge::{Client, Options};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::new();
    ///     client.init(Options::builder("sdk-key").build().unwrap()).await.unwrap();
    ///
    ///     let value = client.get("my-config");
    /// }
    /// ```
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.get(key)
    }

    /// Typed variant of [`Client::get`].
    ///
    /// Returns [`None`] when the value is missing or has a different type.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reforge::{Client, Options};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::new();
    ///     client.init(Options::builder("sdk-key").build().unwrap()).await.unwrap();
    ///
    ///     let turbo: Option<f64> = client.get_value("turbo");
    /// }
    /// ```
    pub fn get_value<T: ValuePrimitive>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match T::from_value(&value) {
            Some(val) => Some(val),
            None => {
                warn!(event_id = ErrorKind::SettingValueTypeMismatch.as_u16(); "The type of the value of '{key}' doesn't match the requested type ({}).", type_name::<T>());
                None
            }
        }
    }

    /// Returns `true` only when the value of `key` is the boolean `true`.
    pub fn is_enabled(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }

    /// Looks up a duration value.
    ///
    /// # Errors
    ///
    /// This method fails when the value exists but is not a duration.
    pub fn get_duration(&self, key: &str) -> Result<Option<DurationValue>, ClientError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Duration(duration)) => Ok(Some(duration)),
            Some(_) => {
                let err = ClientError::new(
                    ErrorKind::SettingValueTypeMismatch,
                    format!("Value for key \"{key}\" is not a duration"),
                );
                error!(event_id = err.kind.as_u16(); "{}", err);
                Err(err)
            }
        }
    }

    /// Decides whether a message at `desired_level` should be logged by `logger_name`.
    ///
    /// The threshold is read from `log-level.{logger_name}`, then from `log-level`, then
    /// `default_level` is used.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reforge::{Client, LogLevel, ShouldLogParams};
    ///
    /// let client = Client::new();
    /// let log = client.should_log(ShouldLogParams {
    ///     logger_name: "my.app",
    ///     desired_level: LogLevel::Info,
    ///     default_level: LogLevel::Warn,
    /// });
    /// assert!(!log);
    /// ```
    pub fn should_log(&self, params: ShouldLogParams<'_>) -> bool {
        if self.state.collect_logger_names.load(Ordering::SeqCst) {
            if let Some(loggers) = self.state.session.load_full().and_then(|s| s.loggers.clone()) {
                let name = params.logger_name.to_owned();
                let level = params.desired_level;
                self.state
                    .dispatcher
                    .submit(move || loggers.record(&name, level));
            }
        }

        let threshold = self
            .state
            .configured_level(&format!("{LOG_LEVEL_PREFIX}.{}", params.logger_name))
            .or_else(|| self.state.configured_level(LOG_LEVEL_PREFIX))
            .unwrap_or(params.default_level);
        threshold.allows(params.desired_level)
    }

    /// Returns the level configured under the logger key, or [`LogLevel::Debug`] when it is
    /// missing or invalid.
    pub fn get_log_level(&self, _logger_name: &str) -> LogLevel {
        let key = self
            .state
            .session
            .load_full()
            .map(|s| s.logger_key.clone())
            .unwrap_or_else(|| DEFAULT_LOGGER_KEY.to_owned());
        self.state.configured_level(&key).unwrap_or(LogLevel::Debug)
    }

    /// Returns a logger whose messages pass the level returned by [`Client::get_log_level`].
    pub fn logger(&self) -> Logger<'_> {
        Logger::new(self)
    }

    /// Returns the value of every loaded config.
    pub fn extract(&self) -> HashMap<String, Value> {
        self.state
            .configs
            .load()
            .iter()
            .map(|(key, config)| (key.clone(), config.value.clone()))
            .collect()
    }

    /// Replaces the configuration with the given payload and marks the client as loaded.
    ///
    /// Both evaluation payloads (`{"evaluations": {...}}`) and plain `{key: value}` objects are accepted.
    ///
    /// # Errors
    ///
    /// This method fails when the payload is not a JSON object.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reforge::Client;
    ///
    /// let client = Client::new();
    /// client.hydrate(&serde_json::json!({"a": 1, "b": true})).unwrap();
    /// assert!(client.loaded());
    /// ```
    pub fn hydrate(&self, raw: &serde_json::Value) -> Result<(), ClientError> {
        self.state.adopt(raw, ErrorKind::InvalidPayload)
    }

    /// Sets the callback invoked after each lookup made with [`Client::get`].
    pub fn set_after_evaluation<F>(&self, callback: F)
    where
        F: Fn(&str, Option<&Value>, &EvaluationContext) + Send + Sync + 'static,
    {
        let callback: AfterEvaluationCallback = Arc::new(callback);
        self.state.after_evaluation.store(Some(Arc::new(callback)));
    }

    /// True once a configuration was adopted.
    pub fn loaded(&self) -> bool {
        self.state.loaded.load(Ordering::SeqCst)
    }

    /// The current evaluation context.
    pub fn context(&self) -> EvaluationContext {
        self.state.context.load_full().as_ref().clone()
    }

    /// Unique identifier of this client instance, sent with telemetry.
    pub fn instance_hash(&self) -> &str {
        &self.state.instance_hash
    }

    /// The current [`PollStatus`].
    pub fn poll_status(&self) -> PollStatus {
        self.state.poll_state().status
    }

    /// Number of loads completed while polling was running.
    pub fn poll_count(&self) -> u64 {
        self.state.poll_count.load(Ordering::SeqCst)
    }

    /// Identifier of the scheduled poll timer, if any.
    pub fn poll_timer_id(&self) -> Option<u64> {
        self.state.poll_state().timer.as_ref().map(|t| t.id)
    }

    /// True when evaluation summaries are collected.
    pub fn is_collecting_evaluation_summaries(&self) -> bool {
        self.state.collect_evaluation_summaries.load(Ordering::SeqCst)
    }

    /// True when logger names are collected.
    pub fn is_collecting_logger_names(&self) -> bool {
        self.state.collect_logger_names.load(Ordering::SeqCst)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(timer) = self.state.poll_state().timer.take() {
            timer.token.cancel();
        }
        if let Some(session) = self.state.session.swap(None) {
            session.shutdown();
        }
    }
}

#[cfg(test)]
mod client_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn not_loaded() {
        let client = Client::new();

        assert!(!client.loaded());
        assert_eq!(client.get("turbo"), None);
        assert!(!client.is_enabled("turbo"));
        assert_eq!(client.poll_status(), PollStatus::NotStarted);
        assert_eq!(client.poll_count(), 0);
        assert_eq!(client.poll_timer_id(), None);
        assert!(client.is_collecting_evaluation_summaries());
        assert!(!client.is_collecting_logger_names());
    }

    #[tokio::test]
    async fn lifecycle_before_init() {
        let client = Client::new();

        let err = client
            .update_context(EvaluationContext::new(), true)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::NotInitialized);

        let err = client.set_http_timeout(Duration::from_secs(1)).err().unwrap();
        assert_eq!(err.kind, ErrorKind::NotInitialized);

        let err = client.poll(Duration::from_secs(1)).await.err().unwrap();
        assert_eq!(err.kind, ErrorKind::NotInitialized);
        assert_eq!(client.poll_status(), PollStatus::NotStarted);
    }

    #[test]
    fn hydrate_and_extract() {
        let client = Client::new();
        client.hydrate(&json!({"a": 1, "b": true})).unwrap();

        let extracted = client.extract();
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted["a"], Value::Int(1));
        assert_eq!(extracted["b"], Value::Bool(true));
        assert!(client.is_enabled("b"));
        assert!(!client.is_enabled("a"));
        assert_eq!(client.get_value::<i64>("a"), Some(1));
        assert_eq!(client.get_value::<bool>("a"), None);
    }

    #[test]
    fn hydrate_rejects_non_objects() {
        let client = Client::new();

        let err = client.hydrate(&json!("nope")).err().unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidPayload);
        assert!(!client.loaded());
    }

    #[test]
    fn stop_polling_is_idempotent() {
        let client = Client::new();

        client.stop_polling();
        client.stop_polling();

        assert_eq!(client.poll_status(), PollStatus::Stopped);
        assert_eq!(client.poll_timer_id(), None);
    }

    #[test]
    fn after_evaluation_survives_a_runtime_shutdown() {
        let client = Client::new();
        client.hydrate(&json!({"a": 1})).unwrap();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        client.set_after_evaluation(move |_key, _value, _context| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let runtime = || {
            tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap()
        };

        runtime().block_on(async {
            client.get("a");
            tokio::time::sleep(Duration::from_millis(50)).await;
        });
        runtime().block_on(async {
            client.get("a");
            client.get("a");
            tokio::time::sleep(Duration::from_millis(50)).await;
        });

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
