//! Packet layer configuration
//!
//! Limits applied when building outbound packets and when accepting inbound
//! ones.

use crate::ssh::packet::{MAX_PACKET_SIZE, MIN_PACKET_SIZE, MIN_PADDING_LEN};
use sealwire_platform::{SealError, SealResult};

/// Upper bound accepted for [`PacketConfig::max_packet_size`].
pub const MAX_CONFIGURABLE_PACKET_SIZE: usize = 256 * 1024;

/// Packet size and padding limits
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketConfig {
    /// Largest `packet_length` accepted from the peer
    pub max_packet_size: usize,

    /// Smallest padding written to outbound packets
    pub min_padding_len: u8,
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
            min_padding_len: MIN_PADDING_LEN,
        }
    }
}

impl PacketConfig {
    /// Create builder for packet configuration
    pub fn builder() -> PacketConfigBuilder {
        PacketConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> SealResult<()> {
        if self.max_packet_size < MIN_PACKET_SIZE {
            return Err(SealError::Config(format!(
                "max_packet_size {} is below the minimum {}",
                self.max_packet_size, MIN_PACKET_SIZE
            )));
        }
        if self.max_packet_size > MAX_CONFIGURABLE_PACKET_SIZE {
            return Err(SealError::Config(format!(
                "max_packet_size {} exceeds {}",
                self.max_packet_size, MAX_CONFIGURABLE_PACKET_SIZE
            )));
        }
        if self.min_padding_len < MIN_PADDING_LEN {
            return Err(SealError::Config(format!(
                "min_padding_len must be at least {}",
                MIN_PADDING_LEN
            )));
        }
        Ok(())
    }
}

/// Builder for PacketConfig
#[derive(Default)]
pub struct PacketConfigBuilder {
    max_packet_size: Option<usize>,
    min_padding_len: Option<u8>,
}

impl PacketConfigBuilder {
    /// Create new packet config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum inbound packet length
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = Some(size);
        self
    }

    /// Set minimum outbound padding
    pub fn with_min_padding_len(mut self, len: u8) -> Self {
        self.min_padding_len = Some(len);
        self
    }

    /// Build PacketConfig with validation
    pub fn build(self) -> SealResult<PacketConfig> {
        let defaults = PacketConfig::default();
        let config = PacketConfig {
            max_packet_size: self.max_packet_size.unwrap_or(defaults.max_packet_size),
            min_padding_len: self.min_padding_len.unwrap_or(defaults.min_padding_len),
        };

        config.validate()?;
        Ok(config)
    }
}
