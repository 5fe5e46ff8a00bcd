use crate::constants::{
    DEFAULT_CLIENT_NAME, DEFAULT_ENDPOINTS, DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_LOGGER_KEY,
    DEFAULT_MAX_TELEMETRY_KEYS, DEFAULT_TELEMETRY_ENDPOINT, DEFAULT_TELEMETRY_SYNC_INTERVAL_MS,
    PKG_VERSION,
};
use crate::errors::{ClientError, ErrorKind};
use crate::{Bootstrap, CollectContextMode, EvaluationContext, Value};
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked after each configuration lookup with the key, the looked up value and
/// the context it was evaluated for.
pub type AfterEvaluationCallback =
    Arc<dyn Fn(&str, Option<&Value>, &EvaluationContext) + Send + Sync>;

/// Configuration options passed to [`crate::Client::init`].
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use reforge::{EvaluationContext, Options};
///
/// let options = Options::builder("SDK_KEY")
///     .context(EvaluationContext::new().with_attribute("user", "key", "abc"))
///     .http_timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct Options {
    sdk_key: String,
    context: Option<EvaluationContext>,
    endpoints: Vec<String>,
    telemetry_endpoint: String,
    http_timeout: Duration,
    collect_evaluation_summaries: bool,
    collect_logger_names: bool,
    collect_context_mode: CollectContextMode,
    client_name: String,
    client_version: String,
    logger_key: String,
    telemetry_sync_interval: Duration,
    max_telemetry_keys: usize,
    bootstrap: Option<Bootstrap>,
    after_evaluation: Option<AfterEvaluationCallback>,
}

impl Options {
    /// Creates an [`OptionsBuilder`] for the given SDK key.
    pub fn builder(sdk_key: &str) -> OptionsBuilder {
        OptionsBuilder::new(sdk_key)
    }

    /// Get the SDK key.
    pub fn sdk_key(&self) -> &str {
        &self.sdk_key
    }

    /// Get the evaluation context, if one was given.
    pub fn context(&self) -> Option<&EvaluationContext> {
        self.context.as_ref()
    }

    /// Get the config endpoints in the order they are tried.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Get the telemetry endpoint.
    pub fn telemetry_endpoint(&self) -> &str {
        &self.telemetry_endpoint
    }

    /// Get the configured HTTP request timeout.
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    /// True when evaluation summaries are collected.
    pub fn collect_evaluation_summaries(&self) -> bool {
        self.collect_evaluation_summaries
    }

    /// True when logger names are collected.
    pub fn collect_logger_names(&self) -> bool {
        self.collect_logger_names
    }

    /// Get the configured [`CollectContextMode`].
    pub fn collect_context_mode(&self) -> CollectContextMode {
        self.collect_context_mode
    }

    /// Get the value of the SDK version header, `{client name}-{client version}`.
    pub fn sdk_version(&self) -> String {
        format!("{}-{}", self.client_name, self.client_version)
    }

    /// Get the key of the config holding the log level returned by [`crate::Client::get_log_level`].
    pub fn logger_key(&self) -> &str {
        &self.logger_key
    }

    /// Get the interval of the telemetry flushes.
    pub fn telemetry_sync_interval(&self) -> Duration {
        self.telemetry_sync_interval
    }

    /// Get the maximum number of distinct keys a telemetry window holds.
    pub fn max_telemetry_keys(&self) -> usize {
        self.max_telemetry_keys
    }

    /// Get the configured [`Bootstrap`].
    pub fn bootstrap(&self) -> Option<&Bootstrap> {
        self.bootstrap.as_ref()
    }

    pub(crate) fn take_bootstrap(&mut self) -> Option<Bootstrap> {
        self.bootstrap.take()
    }

    pub(crate) fn after_evaluation(&self) -> Option<&AfterEvaluationCallback> {
        self.after_evaluation.as_ref()
    }
}

/// Builder to create [`Options`].
///
/// Every setting is optional except the SDK key; defaults are applied by [`OptionsBuilder::build`].
pub struct OptionsBuilder {
    sdk_key: String,
    context: Option<EvaluationContext>,
    endpoints: Option<Vec<String>>,
    telemetry_endpoint: Option<String>,
    http_timeout: Option<Duration>,
    collect_evaluation_summaries: bool,
    collect_logger_names: bool,
    collect_context_mode: Option<CollectContextMode>,
    client_name: Option<String>,
    client_version: Option<String>,
    logger_key: Option<String>,
    telemetry_sync_interval: Option<Duration>,
    max_telemetry_keys: Option<usize>,
    bootstrap: Option<Bootstrap>,
    after_evaluation: Option<AfterEvaluationCallback>,
}

impl OptionsBuilder {
    pub(crate) fn new(sdk_key: &str) -> Self {
        Self {
            sdk_key: sdk_key.to_owned(),
            context: None,
            endpoints: None,
            telemetry_endpoint: None,
            http_timeout: None,
            collect_evaluation_summaries: true,
            collect_logger_names: false,
            collect_context_mode: None,
            client_name: None,
            client_version: None,
            logger_key: None,
            telemetry_sync_interval: None,
            max_telemetry_keys: None,
            bootstrap: None,
            after_evaluation: None,
        }
    }

    /// Set the [`EvaluationContext`] configuration is evaluated for.
    /// When not set, [`crate::Client::init`] keeps the client's current context.
    pub fn context(mut self, context: EvaluationContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Set the config endpoints. They are tried in order until one succeeds.
    /// Default value is `https://primary.reforge.com`, then `https://secondary.reforge.com`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reforge::Options;
    ///
    /// let builder = Options::builder("SDK_KEY")
    ///     .endpoints(["https://primary.example.com", "https://secondary.example.com"]);
    /// ```
    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = Some(endpoints.into_iter().map(Into::into).collect());
        self
    }

    /// Set the telemetry endpoint.
    /// Default value is `https://telemetry.reforge.com/api/v1`.
    pub fn telemetry_endpoint(mut self, endpoint: &str) -> Self {
        self.telemetry_endpoint = Some(endpoint.to_owned());
        self
    }

    /// Set the HTTP request timeout.
    /// Default value is `10` seconds.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Indicate whether evaluation summaries should be collected.
    /// Default value is `true`.
    pub fn collect_evaluation_summaries(mut self, collect: bool) -> Self {
        self.collect_evaluation_summaries = collect;
        self
    }

    /// Indicate whether logger names passed to [`crate::Client::should_log`] should be collected.
    /// Default value is `false`.
    pub fn collect_logger_names(mut self, collect: bool) -> Self {
        self.collect_logger_names = collect;
        self
    }

    /// Set the [`CollectContextMode`].
    /// Default value is [`CollectContextMode::PeriodicExample`].
    pub fn collect_context_mode(mut self, mode: CollectContextMode) -> Self {
        self.collect_context_mode = Some(mode);
        self
    }

    /// Set the client name sent in the SDK version header.
    /// Default value is `sdk-rust`.
    pub fn client_name(mut self, name: &str) -> Self {
        self.client_name = Some(name.to_owned());
        self
    }

    /// Set the client version sent in the SDK version header.
    /// Default value is the version of this crate.
    pub fn client_version(mut self, version: &str) -> Self {
        self.client_version = Some(version.to_owned());
        self
    }

    /// Set the key of the config read by [`crate::Client::get_log_level`].
    /// Default value is `log-levels.default`.
    pub fn logger_key(mut self, key: &str) -> Self {
        self.logger_key = Some(key.to_owned());
        self
    }

    /// Set how often collected telemetry is uploaded. Must be greater than zero.
    /// Default value is `30` seconds.
    pub fn telemetry_sync_interval(mut self, interval: Duration) -> Self {
        self.telemetry_sync_interval = Some(interval);
        self
    }

    /// Set the maximum number of distinct keys collected between two uploads.
    /// Default value is `100000`.
    pub fn max_telemetry_keys(mut self, max: usize) -> Self {
        self.max_telemetry_keys = Some(max);
        self
    }

    /// Set a [`Bootstrap`] that seeds the client when its context matches.
    pub fn bootstrap(mut self, bootstrap: Bootstrap) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    /// Set a callback invoked after each lookup made with [`crate::Client::get`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reforge::Options;
    ///
    /// let builder = Options::builder("SDK_KEY")
    ///     .after_evaluation(|key, value, _context| {
    ///         println!("{key} evaluated to {value:?}");
    ///     });
    /// ```
    pub fn after_evaluation<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, Option<&Value>, &EvaluationContext) + Send + Sync + 'static,
    {
        self.after_evaluation = Some(Arc::new(callback));
        self
    }

    /// Create the [`Options`] from the configuration made on the builder.
    ///
    /// # Errors
    ///
    /// This method fails if the given SDK key is empty or the telemetry sync interval is zero.
    pub fn build(self) -> Result<Options, ClientError> {
        if self.sdk_key.is_empty() {
            return Err(ClientError::new(
                ErrorKind::InvalidSdkKey,
                "SDK Key cannot be empty".to_owned(),
            ));
        }
        if self.telemetry_sync_interval.is_some_and(|i| i.is_zero()) {
            return Err(ClientError::new(
                ErrorKind::InvalidOptions,
                "Telemetry sync interval must be greater than zero".to_owned(),
            ));
        }
        Ok(Options {
            sdk_key: self.sdk_key,
            context: self.context,
            endpoints: self
                .endpoints
                .filter(|endpoints| !endpoints.is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect()),
            telemetry_endpoint: self
                .telemetry_endpoint
                .unwrap_or(DEFAULT_TELEMETRY_ENDPOINT.to_owned()),
            http_timeout: self
                .http_timeout
                .unwrap_or(Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS)),
            collect_evaluation_summaries: self.collect_evaluation_summaries,
            collect_logger_names: self.collect_logger_names,
            collect_context_mode: self.collect_context_mode.unwrap_or_default(),
            client_name: self.client_name.unwrap_or(DEFAULT_CLIENT_NAME.to_owned()),
            client_version: self.client_version.unwrap_or(PKG_VERSION.to_owned()),
            logger_key: self.logger_key.unwrap_or(DEFAULT_LOGGER_KEY.to_owned()),
            telemetry_sync_interval: self
                .telemetry_sync_interval
                .unwrap_or(Duration::from_millis(DEFAULT_TELEMETRY_SYNC_INTERVAL_MS)),
            max_telemetry_keys: self
                .max_telemetry_keys
                .unwrap_or(DEFAULT_MAX_TELEMETRY_KEYS),
            bootstrap: self.bootstrap,
            after_evaluation: self.after_evaluation,
        })
    }
}
