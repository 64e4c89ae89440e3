use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ServerConfig;
use crate::errors::{DriverError, DriverResult};
use crate::protocol::transport::{Endpoint, HttpMethod, Transport};

/// Fields whose values are base64 image payloads; never logged.
const IMAGE_FIELDS: [&str; 3] = ["firstImage", "secondImage", "image"];

/// W3C JSON wire transport over an already established session.
pub struct HttpTransport {
    session_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(server_url: &str, session_id: &str, request_timeout: Duration) -> DriverResult<Self> {
        if server_url.trim().is_empty() {
            return Err(DriverError::Config("server url is empty".into()));
        }
        if session_id.trim().is_empty() {
            return Err(DriverError::Config("session id is empty".into()));
        }
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            session_url: format!("{}/session/{}", server_url.trim_end_matches('/'), session_id),
            client,
        })
    }

    pub fn from_config(server: &ServerConfig) -> DriverResult<Self> {
        let url = server
            .url
            .as_deref()
            .ok_or_else(|| DriverError::Config("server.url is not configured".into()))?;
        let session_id = server
            .session_id
            .as_deref()
            .ok_or_else(|| DriverError::Config("server.session_id is not configured".into()))?;
        Self::new(url, session_id, Duration::from_millis(server.request_timeout_ms))
    }

    fn url_for(&self, endpoint: Endpoint) -> String {
        match endpoint.path() {
            "" => self.session_url.clone(),
            path => format!("{}/{}", self.session_url, path),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, endpoint: Endpoint, params: Value) -> DriverResult<Value> {
        let url = self.url_for(endpoint);
        tracing::debug!(
            endpoint = %endpoint,
            body = %redact_images(&params),
            "sending request"
        );

        let request = match endpoint.method() {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Delete => self.client.delete(&url),
            HttpMethod::Post => self.client.post(&url).json(&params),
        };
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            DriverError::malformed(format!("{endpoint} returned non-JSON body ({status}): {e}"))
        })?;

        if status.is_success() {
            return match body {
                Value::Object(mut map) => map.remove("value").ok_or_else(|| {
                    DriverError::malformed(format!("{endpoint} response has no 'value' field"))
                }),
                _ => Err(DriverError::malformed(format!("{endpoint} response is not an object"))),
            };
        }

        let err = classify_error(&body["value"], status.as_u16());
        tracing::debug!(endpoint = %endpoint, status = status.as_u16(), error = %err, "request failed");
        Err(err)
    }
}

/// Maps a W3C error object to a classified error.
pub(crate) fn classify_error(value: &Value, status: u16) -> DriverError {
    let code = value["error"].as_str().unwrap_or("unknown error").to_string();
    let message = value["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP status {status}"));

    match code.as_str() {
        "no such element" => DriverError::TransientNotFound(message),
        "stale element reference" => DriverError::StaleElement {
            id: value["data"]["elementId"].as_str().unwrap_or_default().to_string(),
            reason: message,
        },
        "invalid argument" => DriverError::InvalidArgument(message),
        "invalid session id" => DriverError::SessionLost(message),
        "timeout" | "script timeout" => DriverError::Timeout(message),
        "unsupported operation" | "unknown command" | "unknown method" => DriverError::Unsupported {
            command: message,
            platform: "remote server".into(),
        },
        _ => DriverError::Remote { error: code, message },
    }
}

fn redact_images(params: &Value) -> String {
    let mut copy = params.clone();
    if let Some(obj) = copy.as_object_mut() {
        for key in IMAGE_FIELDS {
            if let Some(v) = obj.get_mut(key) {
                let len = v.as_str().map(str::len).unwrap_or(0);
                *v = Value::String(format!("<base64 image, {len} chars>"));
            }
        }
    }
    serde_json::to_string(&copy).unwrap_or_default()
}
