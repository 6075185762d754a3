//! Limits shared by the decoders and serializers.
//!
//! Every size limit is enforced before memory proportional to the claimed size is
//! reserved, so a crafted length field can not be used to exhaust memory.

use serde::{Deserialize, Serialize};

/// Default upper bound of an http request body.
pub const DEFAULT_MAX_BODY_SIZE: u64 = 8 * 1024 * 1024;

/// Default upper bound of a single websocket frame payload.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 100_000;

/// Default capacity of the outbound staging buffer, one max sized tcp packet.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 65_535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Maximum http body size in bytes, for both content-length and chunked bodies.
    pub max_body_size: u64,
    /// Maximum websocket payload size in bytes.
    pub max_payload_size: u64,
    /// Capacity of the fixed buffer each outbound unit is staged in.
    pub write_buffer_size: usize,
    /// Reject websocket frames without a masking key (server role).
    pub require_masked_frames: bool,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            require_masked_frames: false,
        }
    }
}

impl WireConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_body_size(mut self, max_body_size: u64) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    #[must_use]
    pub fn with_max_payload_size(mut self, max_payload_size: u64) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// # Panics
    ///
    /// Panics if `write_buffer_size` is zero, no unit could ever be produced.
    #[must_use]
    pub fn with_write_buffer_size(mut self, write_buffer_size: usize) -> Self {
        assert!(write_buffer_size > 0, "write buffer size must be positive");
        self.write_buffer_size = write_buffer_size;
        self
    }

    #[must_use]
    pub fn with_require_masked_frames(mut self, require_masked_frames: bool) -> Self {
        self.require_masked_frames = require_masked_frames;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: WireConfig = serde_json::from_str(r#"{ "max_payload_size": 10 }"#).unwrap();

        assert_eq!(config.max_payload_size, 10);
        assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
        assert_eq!(config.write_buffer_size, DEFAULT_WRITE_BUFFER_SIZE);
        assert!(!config.require_masked_frames);
    }

    #[test]
    fn builder_setters() {
        let config = WireConfig::new().with_max_body_size(1024).with_write_buffer_size(16).with_require_masked_frames(true);

        assert_eq!(config.max_body_size, 1024);
        assert_eq!(config.write_buffer_size, 16);
        assert!(config.require_masked_frames);
    }
}
