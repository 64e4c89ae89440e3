use std::sync::Arc;

use base64::Engine as _;

use crate::errors::{DriverError, DriverResult};

/// Template image to search for on screen. Cheap to clone; the base64 form
/// is computed once and reused for every poll.
#[derive(Clone)]
pub struct ImageTemplate {
    bytes: Arc<[u8]>,
    encoded: Arc<str>,
}

impl ImageTemplate {
    pub fn new(bytes: impl Into<Vec<u8>>) -> DriverResult<Self> {
        let bytes: Vec<u8> = bytes.into();
        if bytes.is_empty() {
            return Err(DriverError::invalid_argument("template image is empty"));
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok(Self {
            bytes: bytes.into(),
            encoded: encoded.into(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn base64(&self) -> &str {
        &self.encoded
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn preview(&self) -> &str {
        let end = self.encoded.len().min(16);
        &self.encoded[..end]
    }
}

impl std::fmt::Debug for ImageTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageTemplate")
            .field("len", &self.len())
            .field("base64", &format_args!("{}...", self.preview()))
            .finish()
    }
}

impl std::fmt::Display for ImageTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "template image ({} bytes, {}...)", self.len(), self.preview())
    }
}

/// Encodes an arbitrary image for transport, rejecting empty input.
pub(crate) fn encode_image(bytes: &[u8], what: &str) -> DriverResult<String> {
    if bytes.is_empty() {
        return Err(DriverError::invalid_argument(format!("{what} is empty")));
    }
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}
