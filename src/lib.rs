pub mod config;
pub mod errors;
pub mod images;
pub mod mapping;
pub mod network;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod wait;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{DriverError, DriverResult, ErrorKind};
pub use images::element::{is_image_element_id, ImageElement};
pub use network::{decode_connection_type, encode_connection_type, NetworkConnectionType};
pub use protocol::response::{parse_find_result, parse_match_result, parse_similarity_result};
pub use protocol::transport::{Endpoint, Transport};
pub use session::Session;
pub use wait::{wait, Wait};

/// Install a stderr subscriber filtered by `RUST_LOG` (default `info`).
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Load configuration (file, `.env`, environment) and attach to the
/// configured remote session.
pub fn connect_from_env() -> DriverResult<Session> {
    let config = config::load_config()?;
    Session::connect(config)
}
