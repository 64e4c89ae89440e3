pub mod elements;
pub mod platform;

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use crate::config::DriverConfig;
use crate::errors::{DriverError, DriverResult};
use crate::images::cache::ElementCache;
use crate::images::compare::ImageComparator;
use crate::images::finder::ImageFinder;
use crate::mapping::Decoded;
use crate::network::{decode_connection_type, encode_connection_type, NetworkConnectionType};
use crate::protocol::http::HttpTransport;
use crate::protocol::transport::{Endpoint, Transport};
use crate::protocol::types::{
    FeatureMatchOptions, FindOccurrenceResult, MatchResult, OccurrenceOptions, SimilarityOptions,
    SimilarityResult,
};
use crate::settings::Settings;
use crate::wait::Wait;

use self::platform::{Capability, Platform};

/// One remote automation session. Every command goes through the injected
/// transport; nothing is shared between sessions.
pub struct Session {
    transport: Arc<dyn Transport>,
    config: DriverConfig,
    settings: RwLock<Settings>,
    elements: ElementCache,
    comparator: ImageComparator,
    finder: ImageFinder,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, config: DriverConfig) -> Self {
        Self {
            settings: RwLock::new(config.settings.clone()),
            elements: ElementCache::new(config.cache.max_elements),
            comparator: ImageComparator::new(transport.clone()),
            finder: ImageFinder::new(transport.clone()),
            transport,
            config,
        }
    }

    /// Attach to the session named in `config` over HTTP.
    pub fn connect(config: DriverConfig) -> DriverResult<Self> {
        let transport = HttpTransport::from_config(&config.server)?;
        tracing::info!(
            url = config.server.url.as_deref().unwrap_or_default(),
            platform = %config.server.platform,
            "attached to remote session"
        );
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn platform(&self) -> Platform {
        self.config.server.platform
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Default wait used by find-by-image.
    pub fn default_wait(&self) -> Wait {
        Wait::from_config(&self.config.wait)
    }

    fn require(&self, capability: Capability, command: &str) -> DriverResult<()> {
        if self.platform().supports(capability) {
            Ok(())
        } else {
            Err(DriverError::Unsupported {
                command: command.to_string(),
                platform: self.platform().to_string(),
            })
        }
    }

    // ── Settings ──────────────────────────────────────────────────────────

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Validates recognized keys locally, forwards the whole map to the
    /// server, then commits the local copy.
    pub async fn update_settings(&self, updates: Map<String, Value>) -> DriverResult<Settings> {
        self.require(Capability::Settings, "update_settings")?;
        let mut settings = self.settings.write().await;
        let merged = settings.merged(&updates, self.config.unknown_settings)?;
        self.transport
            .call(Endpoint::UpdateSettings, json!({ "settings": updates }))
            .await?;
        *settings = merged.clone();
        tracing::info!(keys = ?updates.keys().collect::<Vec<_>>(), "settings updated");
        Ok(merged)
    }

    /// Settings as the server currently reports them, including keys this
    /// client does not model.
    pub async fn remote_settings(&self) -> DriverResult<Value> {
        self.require(Capability::Settings, "get_settings")?;
        self.transport.call(Endpoint::GetSettings, Value::Null).await
    }

    // ── Image comparison ─────────────────────────────────────────────────

    pub async fn compare_images(
        &self,
        first: &[u8],
        second: &[u8],
        options: &FeatureMatchOptions,
    ) -> DriverResult<MatchResult> {
        self.require(Capability::ImageComparison, "compare_images")?;
        self.comparator.compare_images(first, second, options).await
    }

    pub async fn find_image_occurrence(
        &self,
        full: &[u8],
        partial: &[u8],
        options: &OccurrenceOptions,
    ) -> DriverResult<FindOccurrenceResult> {
        self.require(Capability::ImageComparison, "find_image_occurrence")?;
        self.comparator.find_image_occurrence(full, partial, options).await
    }

    pub async fn images_similarity(
        &self,
        first: &[u8],
        second: &[u8],
        options: &SimilarityOptions,
    ) -> DriverResult<SimilarityResult> {
        self.require(Capability::ImageComparison, "images_similarity")?;
        self.comparator.images_similarity(first, second, options).await
    }

    // ── Network ──────────────────────────────────────────────────────────

    pub async fn network_connection(&self) -> DriverResult<Decoded<NetworkConnectionType>> {
        self.require(Capability::NetworkConnection, "network_connection")?;
        let raw = self.transport.call(Endpoint::GetNetworkConnection, Value::Null).await?;
        let code = raw
            .as_i64()
            .ok_or_else(|| DriverError::malformed(format!("network connection must be an integer, got {raw}")))?;
        Ok(decode_connection_type(code))
    }

    /// Returns the state the device reports after the change.
    pub async fn set_network_connection(&self, name: &str) -> DriverResult<Decoded<NetworkConnectionType>> {
        self.require(Capability::NetworkConnection, "set_network_connection")?;
        let code = encode_connection_type(name)?;
        let raw = self
            .transport
            .call(
                Endpoint::SetNetworkConnection,
                json!({ "parameters": { "type": code } }),
            )
            .await?;
        // Some servers acknowledge with null; anything else must be a code.
        let reported = match raw {
            Value::Null => code,
            other => other.as_i64().ok_or_else(|| {
                DriverError::malformed(format!("network connection must be an integer, got {other}"))
            })?,
        };
        tracing::debug!(requested = code, reported, "network connection changed");
        Ok(decode_connection_type(reported))
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Deletes the remote session and invalidates every image element.
    pub async fn end(&self) -> DriverResult<()> {
        let dropped = self.elements.clear().await;
        tracing::info!(dropped_elements = dropped, "ending session");
        self.transport.call(Endpoint::DeleteSession, Value::Null).await?;
        Ok(())
    }
}
