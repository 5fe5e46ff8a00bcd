use std::sync::Mutex;
use std::time::Duration;

use arc_swap::ArcSwap;
use log::{debug, error};
use reqwest::header::HeaderMap;

use crate::constants::{EVAL_WITH_CONTEXT_PATH, SDK_VERSION_HEADER};
use crate::errors::ClientError;
use crate::errors::ErrorKind::*;
use crate::fetch::prefetch;
use crate::{CollectContextMode, EvaluationContext, Options};

/// Fetches the configuration evaluated for a context.
pub struct RemoteLoader {
    sdk_key: String,
    endpoints: Vec<String>,
    collect_context_mode: CollectContextMode,
    http_client: reqwest::Client,
    context: ArcSwap<EvaluationContext>,
    timeout: Mutex<Duration>,
}

impl RemoteLoader {
    pub fn new(options: &Options) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        let version = options.sdk_version().parse().map_err(|err| {
            ClientError::new(
                HttpClientInitFailure,
                format!("Invalid SDK version header value. ({err})"),
            )
        })?;
        headers.insert(SDK_VERSION_HEADER, version);
        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| {
                ClientError::new(
                    HttpClientInitFailure,
                    format!("Could not create the HTTP client. ({err})"),
                )
            })?;
        Ok(Self {
            sdk_key: options.sdk_key().to_owned(),
            endpoints: options.endpoints().to_vec(),
            collect_context_mode: options.collect_context_mode(),
            http_client,
            context: ArcSwap::from_pointee(options.context().cloned().unwrap_or_default()),
            timeout: Mutex::new(options.http_timeout()),
        })
    }

    fn timeout_error(&self) -> ClientError {
        let msg = format!(
            "Request timed out while trying to fetch config. Timeout value: {}ms",
            self.timeout().as_millis()
        );
        error!(event_id = HttpRequestTimeout.as_u16(); "{}", msg);
        ClientError::new(HttpRequestTimeout, msg)
    }

    pub fn set_context(&self, context: EvaluationContext) {
        self.context.store(context.into());
    }

    pub fn context(&self) -> EvaluationContext {
        self.context.load().as_ref().clone()
    }

    pub fn set_timeout(&self, timeout: Duration) {
        if let Ok(mut current) = self.timeout.lock() {
            *current = timeout;
        }
    }

    pub fn timeout(&self) -> Duration {
        match self.timeout.lock() {
            Ok(timeout) => *timeout,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Loads the payload for the current context, preferring a pending prefetch of the same context.
    pub async fn load(&self) -> Result<serde_json::Value, ClientError> {
        let encoded = self.context.load().encode();
        if let Some(prefetched) = prefetch::claim(&encoded) {
            debug!("Using the prefetched config payload");
            return prefetched.outcome().await;
        }
        self.fetch(&encoded).await
    }

    pub(crate) async fn fetch(&self, encoded_context: &str) -> Result<serde_json::Value, ClientError> {
        let mut last_err = ClientError::new(
            HttpRequestFailure,
            "No config endpoint is configured.".to_owned(),
        );
        for endpoint in &self.endpoints {
            match self.fetch_http(endpoint, encoded_context).await {
                Ok(payload) => return Ok(payload),
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }

    async fn fetch_http(
        &self,
        endpoint: &str,
        encoded_context: &str,
    ) -> Result<serde_json::Value, ClientError> {
        let url = format!(
            "{endpoint}{EVAL_WITH_CONTEXT_PATH}{encoded_context}",
            endpoint = endpoint.trim_end_matches('/')
        );
        let result = self
            .http_client
            .get(url)
            .query(&[("collectContextMode", self.collect_context_mode.as_str())])
            .basic_auth("u", Some(&self.sdk_key))
            .timeout(self.timeout())
            .send()
            .await;

        match result {
            Ok(response) => match response.status().as_u16() {
                200 => {
                    let body = response.text().await.map_err(|err| {
                        if err.is_timeout() {
                            return self.timeout_error();
                        }
                        let msg = format!("Fetching config was successful but the HTTP response content was invalid. {err}");
                        error!(event_id = InvalidHttpResponseContent.as_u16(); "{}", msg);
                        ClientError::new(InvalidHttpResponseContent, msg)
                    })?;
                    match serde_json::from_str::<serde_json::Value>(&body) {
                        Ok(payload) => {
                            debug!("Fetch was successful: config fetched from {endpoint}");
                            Ok(payload)
                        }
                        Err(err) => {
                            let msg = format!("Fetching config was successful but the HTTP response content was invalid. JSON parsing failed. ({err})");
                            error!(event_id = InvalidHttpResponseContent.as_u16(); "{}", msg);
                            Err(ClientError::new(InvalidHttpResponseContent, msg))
                        }
                    }
                }
                code @ 401 | code @ 403 => {
                    let msg = format!("Your SDK Key seems to be wrong. Status code: {code}");
                    error!(event_id = InvalidSdkKey.as_u16(); "{}", msg);
                    Err(ClientError::new(InvalidSdkKey, msg))
                }
                code => {
                    let msg = format!("Unexpected HTTP response was received while trying to fetch config. Status code: {code}");
                    error!(event_id = UnexpectedHttpResponse.as_u16(); "{}", msg);
                    Err(ClientError::new(UnexpectedHttpResponse, msg))
                }
            },
            Err(err) => {
                if err.is_timeout() {
                    Err(self.timeout_error())
                } else {
                    let msg = format!("Unexpected error occurred while trying to fetch config. It is most likely due to a local network issue. {err}");
                    error!(event_id = HttpRequestFailure.as_u16(); "{}", msg);
                    Err(ClientError::new(HttpRequestFailure, msg))
                }
            }
        }
    }
}
