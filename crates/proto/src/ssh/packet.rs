//! SSH binary packet protocol (RFC 4253 Section 6).
//!
//! # Packet Format
//!
//! ```text
//! uint32    packet_length
//! byte      padding_length
//! byte[n1]  payload (n1 = packet_length - padding_length - 1)
//! byte[n2]  random padding (n2 = padding_length)
//! byte[m]   mac (absent until keys are in use)
//! ```
//!
//! # Constraints
//!
//! - `packet_length` counts neither itself nor the MAC
//! - `padding_length` is 4..=255
//! - `packet_length + 4` MUST be a multiple of the padding multiple
//!   (8 or the cipher block size). With encrypt-then-MAC the length field
//!   stays in clear and `packet_length` alone is aligned.
//! - Maximum packet size: 35000 bytes (configurable via [`PacketConfig`])
//!
//! # Example
//!
//! ```rust
//! use sealwire_proto::ssh::Packet;
//!
//! // Pad for a 16 byte block cipher
//! let packet = Packet::with_padding(b"SSH-MSG-KEXINIT payload".to_vec(), 16, false);
//! let bytes = packet.to_bytes();
//! assert_eq!(bytes.len() % 16, 0);
//!
//! let parsed = Packet::from_bytes(&bytes).unwrap();
//! assert_eq!(parsed.payload(), b"SSH-MSG-KEXINIT payload");
//! ```

use crate::ssh::config::PacketConfig;
use bytes::{Buf, BufMut, BytesMut};
use rand::RngCore;
use sealwire_platform::{SealError, SealResult};

/// Maximum packet size in bytes (RFC 4253 Section 6.1).
pub const MAX_PACKET_SIZE: usize = 35000;

/// Minimum packet size in bytes.
pub const MIN_PACKET_SIZE: usize = 16;

/// Minimum padding length in bytes (RFC 4253 Section 6).
pub const MIN_PADDING_LEN: u8 = 4;

/// Maximum padding length in bytes (fits in u8).
pub const MAX_PADDING_LEN: u8 = 255;

/// Default padding multiple when no cipher is active.
pub const DEFAULT_PADDING_MULTIPLE: u8 = 8;

/// SSH binary packet.
///
/// # Invariants
///
/// - Padding length is between 4 and 255 bytes
/// - Packets built here are aligned to the requested padding multiple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    payload: Vec<u8>,
    padding: Vec<u8>,
    mac: Option<Vec<u8>>,
}

impl Packet {
    /// Creates a packet padded to the 8 byte default alignment.
    ///
    /// # Panics
    ///
    /// Panics if the payload is too large (> 35000 bytes).
    pub fn new(payload: Vec<u8>) -> Self {
        Self::with_padding(payload, DEFAULT_PADDING_MULTIPLE, false)
    }

    /// Creates a packet padded for `padding_multiple`.
    ///
    /// When `encrypt_then_mac` is set the 4 byte length field is left out of
    /// the alignment, because it is never encrypted.
    ///
    /// # Panics
    ///
    /// Panics if the payload is too large (> 35000 bytes) or
    /// `padding_multiple` is zero.
    pub fn with_padding(payload: Vec<u8>, padding_multiple: u8, encrypt_then_mac: bool) -> Self {
        Self::with_config(
            payload,
            padding_multiple,
            encrypt_then_mac,
            &PacketConfig::default(),
        )
    }

    /// Like [`Packet::with_padding`], using the limits in `config`.
    ///
    /// # Panics
    ///
    /// Panics if the payload exceeds `config.max_packet_size` or
    /// `padding_multiple` is zero.
    pub fn with_config(
        payload: Vec<u8>,
        padding_multiple: u8,
        encrypt_then_mac: bool,
        config: &PacketConfig,
    ) -> Self {
        assert!(padding_multiple > 0, "Padding multiple must be non-zero");

        let multiple = padding_multiple as usize;
        let min_padding = config.min_padding_len as usize;

        // Bytes that take part in the alignment, before padding
        let aligned_len = if encrypt_then_mac { 1 } else { 5 } + payload.len();
        let shortfall = (aligned_len + min_padding) % multiple;
        let padding_len = min_padding + (multiple - shortfall) % multiple;

        assert!(
            padding_len <= MAX_PADDING_LEN as usize,
            "Padding multiple too large, cannot add sufficient padding"
        );

        let packet_length = 1 + payload.len() + padding_len;
        assert!(
            packet_length <= config.max_packet_size,
            "Packet size {} exceeds maximum {}",
            packet_length,
            config.max_packet_size
        );

        let mut padding = vec![0u8; padding_len];
        rand::thread_rng().fill_bytes(&mut padding);

        Self {
            payload,
            padding,
            mac: None,
        }
    }

    /// Assembles a packet from already chosen parts.
    ///
    /// Intended for tests and for callers that need deterministic padding.
    pub fn from_parts(payload: Vec<u8>, padding: Vec<u8>) -> SealResult<Self> {
        if padding.len() < MIN_PADDING_LEN as usize || padding.len() > MAX_PADDING_LEN as usize {
            return Err(SealError::MalformedInput(format!(
                "Padding length {} outside {}..={}",
                padding.len(),
                MIN_PADDING_LEN,
                MAX_PADDING_LEN
            )));
        }

        Ok(Self {
            payload,
            padding,
            mac: None,
        })
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the packet and returns its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Padding bytes.
    pub fn padding(&self) -> &[u8] {
        &self.padding
    }

    /// MAC received with or attached to this packet.
    pub fn mac(&self) -> Option<&[u8]> {
        self.mac.as_deref()
    }

    /// Attaches a MAC, emitted after the padding by [`Packet::to_bytes`].
    pub fn set_mac(&mut self, mac: Vec<u8>) {
        self.mac = Some(mac);
    }

    /// Value of the `packet_length` field.
    pub fn packet_length(&self) -> usize {
        1 + self.payload.len() + self.padding.len()
    }

    /// Plaintext wire form, MAC appended when set.
    ///
    /// ```text
    /// uint32    packet_length (big-endian)
    /// byte      padding_length
    /// byte[n1]  payload
    /// byte[n2]  random padding
    /// byte[m]   mac (if present)
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let packet_length = self.packet_length();
        let mut buf =
            BytesMut::with_capacity(4 + packet_length + self.mac.as_ref().map_or(0, |m| m.len()));

        buf.put_u32(packet_length as u32);
        buf.put_u8(self.padding.len() as u8);
        buf.put_slice(&self.payload);
        buf.put_slice(&self.padding);

        if let Some(mac) = &self.mac {
            buf.put_slice(mac);
        }

        buf.to_vec()
    }

    /// Parses a packet from wire format with the default limits.
    ///
    /// Any bytes after the padding are taken as the MAC.
    ///
    /// # Errors
    ///
    /// - [`SealError::IncompleteData`] if fewer bytes than declared are present
    /// - [`SealError::MalformedInput`] for out-of-range lengths or padding
    pub fn from_bytes(data: &[u8]) -> SealResult<Self> {
        Self::parse(data, &PacketConfig::default())
    }

    /// Parses a packet from wire format, enforcing `config.max_packet_size`.
    pub fn parse(data: &[u8], config: &PacketConfig) -> SealResult<Self> {
        if data.len() < 5 {
            return Err(SealError::IncompleteData {
                needed: 5,
                available: data.len(),
            });
        }

        let mut buf = data;
        let packet_length = buf.get_u32() as usize;

        if packet_length > config.max_packet_size {
            return Err(SealError::MalformedInput(format!(
                "packet_length {} above limit {}",
                packet_length, config.max_packet_size
            )));
        }

        if packet_length < 5 {
            return Err(SealError::MalformedInput(format!(
                "packet_length {} below minimum 5",
                packet_length
            )));
        }

        if buf.len() < packet_length {
            return Err(SealError::IncompleteData {
                needed: 4 + packet_length,
                available: data.len(),
            });
        }

        let padding_length = buf.get_u8() as usize;

        if padding_length < config.min_padding_len as usize {
            return Err(SealError::MalformedInput(format!(
                "padding_length {} below minimum {}",
                padding_length, config.min_padding_len
            )));
        }

        if packet_length < 1 + padding_length {
            return Err(SealError::MalformedInput(format!(
                "padding_length {} does not fit in packet_length {}",
                padding_length, packet_length
            )));
        }

        let payload_length = packet_length - 1 - padding_length;
        let payload = buf[..payload_length].to_vec();
        buf.advance(payload_length);

        let padding = buf[..padding_length].to_vec();
        buf.advance(padding_length);

        let mac = if buf.is_empty() {
            None
        } else {
            Some(buf.to_vec())
        };

        Ok(Self {
            payload,
            padding,
            mac,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_new() {
        let payload = b"Hello, SSH!".to_vec();
        let packet = Packet::new(payload.clone());

        assert_eq!(packet.payload(), &payload[..]);
        assert!(packet.padding().len() >= MIN_PADDING_LEN as usize);
        assert!(packet.mac().is_none());
    }

    #[test]
    fn test_packet_alignment() {
        for multiple in [8u8, 16] {
            for len in 0..40 {
                let packet = Packet::with_padding(vec![0x42; len], multiple, false);
                assert_eq!(packet.to_bytes().len() % multiple as usize, 0);
                assert!(packet.padding().len() >= 4);
                assert!(packet.padding().len() < 4 + multiple as usize);
            }
        }
    }

    #[test]
    fn test_packet_alignment_etm_excludes_length() {
        for len in 0..40 {
            let packet = Packet::with_padding(vec![0x42; len], 16, true);
            assert_eq!(packet.packet_length() % 16, 0);
            assert_eq!((packet.to_bytes().len() - 4) % 16, 0);
        }
    }

    #[test]
    fn test_packet_honours_config_padding() {
        let config = PacketConfig::builder()
            .with_min_padding_len(12)
            .build()
            .unwrap();
        let packet = Packet::with_config(b"x".to_vec(), 8, false, &config);
        assert!(packet.padding().len() >= 12);
        assert_eq!(packet.to_bytes().len() % 8, 0);
    }

    #[test]
    fn test_parse_enforces_configured_min_padding() {
        let bytes = Packet::from_parts(b"abc".to_vec(), vec![0; 4])
            .unwrap()
            .to_bytes();
        assert!(Packet::parse(&bytes, &PacketConfig::default()).is_ok());

        let strict = PacketConfig::builder()
            .with_min_padding_len(8)
            .build()
            .unwrap();
        match Packet::parse(&bytes, &strict) {
            Err(SealError::MalformedInput(msg)) => {
                assert!(msg.contains("padding_length 4 below minimum 8"))
            }
            other => panic!("Expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_packet_round_trip() {
        let payload = b"Test SSH packet payload".to_vec();
        let packet = Packet::new(payload.clone());

        let bytes = packet.to_bytes();
        let parsed = Packet::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.payload(), &payload[..]);
        assert_eq!(parsed.padding(), packet.padding());
    }

    #[test]
    fn test_packet_with_mac() {
        let mut packet = Packet::new(b"payload".to_vec());
        let mac = vec![0xaa; 16];
        packet.set_mac(mac.clone());

        let parsed = Packet::from_bytes(&packet.to_bytes()).unwrap();
        assert_eq!(parsed.mac(), Some(&mac[..]));
    }

    #[test]
    fn test_from_parts_validates_padding() {
        assert!(Packet::from_parts(b"x".to_vec(), vec![0; 4]).is_ok());
        assert!(matches!(
            Packet::from_parts(b"x".to_vec(), vec![0; 3]),
            Err(SealError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_packet_invalid_too_short() {
        let result = Packet::from_bytes(&[0, 0, 0, 10]);
        assert!(matches!(
            result,
            Err(SealError::IncompleteData {
                needed: 5,
                available: 4
            })
        ));
    }

    #[test]
    fn test_packet_invalid_padding_too_short() {
        let data = vec![
            0, 0, 0, 8, // packet_length = 8
            2, // padding_length = 2 (< MIN_PADDING_LEN = 4)
            0x48, 0x65, 0x6c, 0x6c, 0x6f, // payload "Hello"
            0x00, 0x00, // padding
        ];
        match Packet::from_bytes(&data) {
            Err(SealError::MalformedInput(msg)) => assert!(msg.contains("padding_length 2")),
            other => panic!("Expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_packet_padding_longer_than_packet() {
        let data = vec![0, 0, 0, 5, 200, 0, 0, 0, 0];
        assert!(matches!(
            Packet::from_bytes(&data),
            Err(SealError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_packet_invalid_incomplete() {
        let data = vec![0, 0, 0, 20, 4, 0x48, 0x65];
        assert!(matches!(
            Packet::from_bytes(&data),
            Err(SealError::IncompleteData { needed: 24, .. })
        ));
    }

    #[test]
    fn test_packet_respects_configured_maximum() {
        let config = PacketConfig::builder()
            .with_max_packet_size(64)
            .build()
            .unwrap();
        let packet = Packet::new(vec![0u8; 100]);
        assert!(matches!(
            Packet::parse(&packet.to_bytes(), &config),
            Err(SealError::MalformedInput(_))
        ));
    }

    #[test]
    #[should_panic(expected = "Packet size")]
    fn test_packet_exceeds_max_size() {
        let _packet = Packet::new(vec![0u8; MAX_PACKET_SIZE + 1000]);
    }
}
