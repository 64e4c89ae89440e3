use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{DriverError, DriverResult};
use crate::mapping::{self, CodedName, Decoded};

/// Device network connection state, as understood by the server's
/// `network_connection` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkConnectionType {
    AirplaneMode,
    Wifi,
    Data,
    All,
    None,
}

impl CodedName for NetworkConnectionType {
    const TABLE: &'static [(Self, &'static str, i64)] = &[
        (NetworkConnectionType::AirplaneMode, "airplane_mode", 1),
        (NetworkConnectionType::Wifi, "wifi", 2),
        (NetworkConnectionType::Data, "data", 4),
        (NetworkConnectionType::All, "all", 6),
        (NetworkConnectionType::None, "none", 0),
    ];
    const LABEL: &'static str = "network connection type";
}

impl FromStr for NetworkConnectionType {
    type Err = DriverError;

    fn from_str(s: &str) -> DriverResult<Self> {
        let code = mapping::encode::<Self>(s)?;
        decode_connection_type(code)
            .known()
            .ok_or_else(|| DriverError::invalid_argument(format!("unmapped code {code}")))
    }
}

impl std::fmt::Display for NetworkConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn encode_connection_type(name: &str) -> DriverResult<i64> {
    mapping::encode::<NetworkConnectionType>(name)
}

pub fn decode_connection_type(code: i64) -> Decoded<NetworkConnectionType> {
    mapping::decode(code)
}
