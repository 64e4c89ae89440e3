use async_trait::async_trait;
use serde_json::Value;

use crate::errors::DriverResult;

/// Remote commands this client issues. Paths are relative to the session URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Screenshot,
    CompareImages,
    GetSettings,
    UpdateSettings,
    GetNetworkConnection,
    SetNetworkConnection,
    PerformActions,
    TouchPerform,
    DeleteSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl Endpoint {
    pub fn method(self) -> HttpMethod {
        match self {
            Endpoint::Screenshot | Endpoint::GetSettings | Endpoint::GetNetworkConnection => {
                HttpMethod::Get
            }
            Endpoint::DeleteSession => HttpMethod::Delete,
            _ => HttpMethod::Post,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Screenshot => "screenshot",
            Endpoint::CompareImages => "appium/compare_images",
            Endpoint::GetSettings | Endpoint::UpdateSettings => "appium/settings",
            Endpoint::GetNetworkConnection | Endpoint::SetNetworkConnection => "network_connection",
            Endpoint::PerformActions => "actions",
            Endpoint::TouchPerform => "touch/perform",
            Endpoint::DeleteSession => "",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let method = match self.method() {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        };
        write!(f, "{method} /{}", self.path())
    }
}

/// Request/response primitive to an established remote session.
///
/// Implementations return the unwrapped response value and classify every
/// failure into a [`crate::errors::ErrorKind`]. Calls may be retried, so the
/// same request must be safe to send more than once.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, endpoint: Endpoint, params: Value) -> DriverResult<Value>;
}
