//! Shared HTTP plumbing for the remote sources.

use crate::error::{Result, SourceError};
use delta_core::NetworkConfig;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Build the HTTP client shared by every remote source.
///
/// # Errors
/// Returns error if the HTTP client cannot be created.
pub fn build_http_client(config: &NetworkConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()?)
}

/// Send a request and parse the body as JSON.
///
/// Non-success statuses become [`SourceError::Status`]; bodies that are not
/// JSON become a schema mismatch.
pub async fn fetch_json(request: RequestBuilder) -> Result<Value> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        tracing::debug!(error = %e, "response body is not JSON");
        SourceError::undecodable()
    })
}

/// Deserialize a JSON value into a typed payload, reporting `message` on mismatch.
pub fn decode<T: DeserializeOwned>(value: Value, message: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        tracing::debug!(error = %e, "payload does not match expected schema");
        SourceError::SchemaMismatch(message.to_string())
    })
}

/// Numbers that some APIs send as strings (`"0.97"`) and others as floats.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("number out of range")),
        Value::String(s) => s.trim().parse().map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("expected number, got {other}"))),
    }
}
