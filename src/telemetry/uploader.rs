use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};

use crate::constants::SDK_VERSION_HEADER;
use crate::errors::{ClientError, ErrorKind};
use crate::telemetry::events::TelemetryEvents;
use crate::Options;

/// The result of a telemetry upload. Uploads never fail the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The server accepted the batch.
    Delivered,
    /// The server answered with a non-success status code.
    Rejected(u16),
    /// The upload was abandoned after the timeout elapsed.
    Aborted,
    /// The upload failed before a response arrived.
    Failed,
}

pub struct TelemetryUploader {
    sdk_key: String,
    endpoint: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl TelemetryUploader {
    pub fn new(options: &Options) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        let version = options.sdk_version().parse().map_err(|err| {
            ClientError::new(
                ErrorKind::HttpClientInitFailure,
                format!("Invalid SDK version header value. ({err})"),
            )
        })?;
        headers.insert(SDK_VERSION_HEADER, version);
        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| {
                ClientError::new(
                    ErrorKind::HttpClientInitFailure,
                    format!("Could not create the HTTP client. ({err})"),
                )
            })?;
        Ok(Self {
            sdk_key: options.sdk_key().to_owned(),
            endpoint: options.telemetry_endpoint().trim_end_matches('/').to_owned(),
            timeout: options.http_timeout(),
            http_client,
        })
    }

    pub async fn post(&self, events: &TelemetryEvents) -> UploadOutcome {
        let body = match serde_json::to_vec(events) {
            Ok(body) => body,
            Err(err) => {
                warn!("Could not serialize telemetry events. ({err})");
                return UploadOutcome::Failed;
            }
        };
        let result = self
            .http_client
            .post(format!("{}/telemetry", self.endpoint))
            .basic_auth("u", Some(&self.sdk_key))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .timeout(self.timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => UploadOutcome::Delivered,
            Ok(response) => {
                let status = response.status();
                warn!(
                    "Error uploading telemetry {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                );
                UploadOutcome::Rejected(status.as_u16())
            }
            Err(err) if err.is_timeout() => {
                debug!("Telemetry request aborted");
                UploadOutcome::Aborted
            }
            Err(err) => {
                warn!("Error uploading telemetry. ({err})");
                UploadOutcome::Failed
            }
        }
    }
}
