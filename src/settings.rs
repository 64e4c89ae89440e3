use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{DriverError, DriverResult};

/// Image-related session settings. Wire names are camelCase and match the
/// server's settings API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Settings {
    /// Minimum template match score in `[0, 1]`.
    pub image_match_threshold: f64,
    /// Re-find an image element before every query against it.
    pub check_for_image_element_staleness: bool,
    /// Store the geometry seen by a passing staleness check on the element.
    pub auto_update_image_element_position: bool,
    pub image_element_tap_strategy: TapStrategy,
    /// Request the visualization on find and expose it as the `visual` attribute.
    pub get_matched_image_result: bool,
    /// Max per-field pixel drift before an element counts as stale.
    pub image_staleness_tolerance: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_match_threshold: 0.4,
            check_for_image_element_staleness: true,
            auto_update_image_element_position: false,
            image_element_tap_strategy: TapStrategy::W3cActions,
            get_matched_image_result: false,
            image_staleness_tolerance: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TapStrategy {
    #[default]
    W3cActions,
    TouchActions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSettingsPolicy {
    /// Forward unknown keys to the server untouched.
    #[default]
    PassThrough,
    /// Fail the whole update.
    Reject,
}

impl Settings {
    pub fn validate(&self) -> DriverResult<()> {
        if !(0.0..=1.0).contains(&self.image_match_threshold) {
            return Err(DriverError::invalid_argument(format!(
                "imageMatchThreshold must be within [0, 1], got {}",
                self.image_match_threshold
            )));
        }
        if self.image_staleness_tolerance.is_nan() || self.image_staleness_tolerance < 0.0 {
            return Err(DriverError::invalid_argument(format!(
                "imageStalenessTolerance must be non-negative, got {}",
                self.image_staleness_tolerance
            )));
        }
        Ok(())
    }

    /// Returns the settings with `updates` merged in. Nothing changes unless
    /// every recognized value is well-typed and valid.
    pub fn merged(&self, updates: &Map<String, Value>, policy: UnknownSettingsPolicy) -> DriverResult<Settings> {
        let mut current = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => return Err(DriverError::invalid_argument("settings did not serialize to an object")),
        };

        let unknown: Vec<&str> = updates
            .keys()
            .filter(|k| !current.contains_key(k.as_str()))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            match policy {
                UnknownSettingsPolicy::Reject => {
                    return Err(DriverError::invalid_argument(format!(
                        "unknown setting(s): {}",
                        unknown.join(", ")
                    )))
                }
                UnknownSettingsPolicy::PassThrough => {
                    tracing::debug!(keys = ?unknown, "forwarding unrecognized settings verbatim");
                }
            }
        }

        for (key, value) in updates {
            if let Some(slot) = current.get_mut(key) {
                *slot = value.clone();
            }
        }

        let merged: Settings = serde_json::from_value(Value::Object(current))
            .map_err(|e| DriverError::invalid_argument(format!("invalid setting value: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
