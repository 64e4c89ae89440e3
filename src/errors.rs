use std::time::Duration;

use thiserror::Error;

use crate::images::template::ImageTemplate;

/// Classified failure kinds. The wait engine decides retry vs. abort purely
/// on these, never on the concrete error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    MalformedResponse,
    TransientNotFound,
    WaitTimeout,
    ElementNotFound,
    StaleElement,
    SessionLost,
    TransportLost,
    Timeout,
    Unsupported,
    Remote,
    Config,
    Io,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Not found yet: {0}")]
    TransientNotFound(String),

    #[error(
        "{message} (timeout {}ms, interval {}ms, {attempts} attempt(s) in {}ms){}",
        .timeout.as_millis(),
        .interval.as_millis(),
        .elapsed.as_millis(),
        last_error_suffix(.last_error)
    )]
    WaitTimeout {
        message: String,
        timeout: Duration,
        interval: Duration,
        elapsed: Duration,
        attempts: u32,
        #[source]
        last_error: Option<Box<DriverError>>,
    },

    #[error(
        "No element matching {template} could be located within {}ms{}",
        .timeout.as_millis(),
        last_error_suffix(.last_error)
    )]
    ElementNotFound {
        template: ImageTemplate,
        timeout: Duration,
        elapsed: Duration,
        #[source]
        last_error: Option<Box<DriverError>>,
    },

    #[error("Stale element '{id}': {reason}")]
    StaleElement { id: String, reason: String },

    #[error("Session lost: {0}")]
    SessionLost(String),

    #[error("Transport timed out: {0}")]
    Timeout(String),

    #[error("'{command}' is not supported on {platform}")]
    Unsupported { command: String, platform: String },

    #[error("Remote error '{error}': {message}")]
    Remote { error: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

fn last_error_suffix(last: &Option<Box<DriverError>>) -> String {
    match last {
        Some(e) => format!("; last error: {e}"),
        None => String::new(),
    }
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DriverError::MalformedResponse(_)
            | DriverError::Json(_)
            | DriverError::Base64(_) => ErrorKind::MalformedResponse,
            DriverError::TransientNotFound(_) => ErrorKind::TransientNotFound,
            DriverError::WaitTimeout { .. } => ErrorKind::WaitTimeout,
            DriverError::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            DriverError::StaleElement { .. } => ErrorKind::StaleElement,
            DriverError::SessionLost(_) => ErrorKind::SessionLost,
            DriverError::Timeout(_) => ErrorKind::Timeout,
            DriverError::Unsupported { .. } => ErrorKind::Unsupported,
            DriverError::Remote { .. } => ErrorKind::Remote,
            DriverError::Config(_) | DriverError::TomlDe(_) => ErrorKind::Config,
            DriverError::Io(_) => ErrorKind::Io,
            DriverError::Http(e) if e.is_timeout() => ErrorKind::Timeout,
            DriverError::Http(_) => ErrorKind::TransportLost,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        DriverError::MalformedResponse(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        DriverError::InvalidArgument(msg.into())
    }
}

impl serde::Serialize for DriverError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_timeout_message_includes_timing() {
        let err = DriverError::WaitTimeout {
            message: "button never showed up".into(),
            timeout: Duration::from_millis(1500),
            interval: Duration::from_millis(250),
            elapsed: Duration::from_millis(1502),
            attempts: 7,
            last_error: Some(Box::new(DriverError::TransientNotFound("no match".into()))),
        };
        let text = err.to_string();
        assert!(text.contains("button never showed up"));
        assert!(text.contains("timeout 1500ms"));
        assert!(text.contains("interval 250ms"));
        assert!(text.contains("last error: Not found yet: no match"));
        assert_eq!(err.kind(), ErrorKind::WaitTimeout);
    }

    #[test]
    fn test_decode_errors_are_malformed() {
        use base64::Engine as _;
        let err: DriverError = base64::engine::general_purpose::STANDARD
            .decode("!!!")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_serializes_as_display_string() {
        let err = DriverError::StaleElement {
            id: "appium-image-element-1".into(),
            reason: "moved".into(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Stale element 'appium-image-element-1': moved\"");
    }
}
