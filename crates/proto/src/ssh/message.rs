//! SSH message numbers handled by this layer (RFC 5656).
//!
//! # Example
//!
//! ```rust
//! use sealwire_proto::ssh::message::MessageType;
//!
//! let msg_type = MessageType::KexEcdhInit;
//! assert_eq!(msg_type as u8, 30);
//! assert_eq!(msg_type.name(), "SSH_MSG_KEX_ECDH_INIT");
//! ```

use std::fmt;

/// Message numbers this layer produces or inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Client ephemeral public key `Q_C` (RFC 5656 Section 4)
    KexEcdhInit = 30,
}

impl MessageType {
    /// Returns the RFC name of this message.
    pub const fn name(&self) -> &'static str {
        match self {
            MessageType::KexEcdhInit => "SSH_MSG_KEX_ECDH_INIT",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}
