//! ECDH key exchange init message (RFC 5656 Section 4).
//!
//! ```text
//! byte      SSH_MSG_KEX_ECDH_INIT (30)
//! string    Q_C, client's ephemeral public key octet string
//! ```
//!
//! The curve arithmetic happens elsewhere; this type only carries and
//! encodes `Q_C`.
//!
//! # Example
//!
//! ```rust
//! use num_bigint::BigUint;
//! use sealwire_proto::ssh::kex_ecdh::KeyExchangeEcdhInitMessage;
//!
//! let msg = KeyExchangeEcdhInitMessage::from_coordinates(
//!     &BigUint::from(0x1234u32),
//!     &BigUint::from(0x80u32),
//! );
//! assert_eq!(msg.qc(), &[0x04, 0x12, 0x34, 0x00, 0x80]);
//!
//! let bytes = msg.to_bytes();
//! assert_eq!(bytes[0], 30);
//! ```

use crate::ssh::message::MessageType;
use crate::ssh::wire;
use bytes::{BufMut, BytesMut};
use num_bigint::BigUint;
use sealwire_platform::{SealError, SealResult};

/// Marker byte of an uncompressed SEC1 point.
pub const UNCOMPRESSED_POINT_MARKER: u8 = 0x04;

/// SSH_MSG_KEX_ECDH_INIT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExchangeEcdhInitMessage {
    qc: Vec<u8>,
}

impl KeyExchangeEcdhInitMessage {
    /// Message number.
    pub const MESSAGE_NUMBER: u8 = MessageType::KexEcdhInit as u8;

    /// Message name.
    pub const MESSAGE_NAME: &'static str = MessageType::KexEcdhInit.name();

    /// Wraps an already encoded `Q_C`. The bytes are not altered.
    pub fn new(qc: Vec<u8>) -> Self {
        Self { qc }
    }

    /// Builds `Q_C = 0x04 || d || q` from two affine coordinates.
    ///
    /// Each coordinate uses the minimal big-endian form, with a leading
    /// zero byte only when its top bit is set.
    pub fn from_coordinates(d: &BigUint, q: &BigUint) -> Self {
        let d = wire::to_signed_be_minimal(&d.to_bytes_be());
        let q = wire::to_signed_be_minimal(&q.to_bytes_be());

        let mut qc = Vec::with_capacity(1 + d.len() + q.len());
        qc.push(UNCOMPRESSED_POINT_MARKER);
        qc.extend_from_slice(&d);
        qc.extend_from_slice(&q);
        Self { qc }
    }

    /// Client ephemeral public key octet string.
    pub fn qc(&self) -> &[u8] {
        &self.qc
    }

    /// Message type.
    pub fn message_type(&self) -> MessageType {
        MessageType::KexEcdhInit
    }

    /// Message body without the message number: `string Q_C`.
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(4 + self.qc.len());
        wire::write_bytes(&mut buf, &self.qc);
        buf.to_vec()
    }

    /// Full message: message number followed by `string Q_C`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(5 + self.qc.len());
        buf.put_u8(Self::MESSAGE_NUMBER);
        wire::write_bytes(&mut buf, &self.qc);
        buf.to_vec()
    }

    /// Parses a full message.
    pub fn from_bytes(data: &[u8]) -> SealResult<Self> {
        let mut offset = 0;
        let number = wire::read_u8(data, &mut offset)?;
        if number != Self::MESSAGE_NUMBER {
            return Err(SealError::MalformedInput(format!(
                "Expected {}, got message {}",
                MessageType::KexEcdhInit,
                number
            )));
        }

        let qc = wire::read_bytes(data, &mut offset)?;
        if offset != data.len() {
            return Err(SealError::MalformedInput(format!(
                "{} trailing bytes after {}",
                data.len() - offset,
                Self::MESSAGE_NAME
            )));
        }

        Ok(Self { qc })
    }
}
