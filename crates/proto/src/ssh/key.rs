//! SSH public keys (RFC 4253 Section 6.6, RFC 5656 Section 3.1, RFC 8709).
//!
//! A key blob is the key type name followed by type specific fields:
//!
//! | Type | Fields |
//! |------|--------|
//! | `ssh-rsa` | `mpint e`, `mpint n` |
//! | `ssh-dss` | `mpint p`, `mpint q`, `mpint g`, `mpint y` |
//! | `ecdsa-sha2-*` | `string curve`, `string Q` |
//! | `ssh-ed25519` | `string key` |
//!
//! # Example
//!
//! ```rust
//! use sealwire_proto::ssh::key::{KeyKind, PublicKey};
//!
//! let key = PublicKey::from_openssh(
//!     "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAICFS+NGbeR0kRTJC4V8uq2y3z/p7al7TAJeWDgaYgdsS alice",
//! )
//! .unwrap();
//! assert_eq!(key.kind(), KeyKind::Ed25519);
//! assert_eq!(PublicKey::from_blob(&key.to_blob()).unwrap(), key);
//! ```

use crate::ssh::dsa::DsaKey;
use crate::ssh::logging;
use crate::ssh::wire;
use base64::Engine;
use bytes::BytesMut;
use sealwire_platform::{SealError, SealResult};
use sha2::{Digest, Sha256};

/// Public key algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// ssh-rsa
    Rsa,
    /// ssh-dss
    Dss,
    /// ecdsa-sha2-nistp256
    EcdsaNistP256,
    /// ecdsa-sha2-nistp384
    EcdsaNistP384,
    /// ecdsa-sha2-nistp521
    EcdsaNistP521,
    /// ssh-ed25519
    Ed25519,
}

impl KeyKind {
    /// Key type name used in blobs.
    pub fn name(&self) -> &'static str {
        match self {
            KeyKind::Rsa => "ssh-rsa",
            KeyKind::Dss => "ssh-dss",
            KeyKind::EcdsaNistP256 => "ecdsa-sha2-nistp256",
            KeyKind::EcdsaNistP384 => "ecdsa-sha2-nistp384",
            KeyKind::EcdsaNistP521 => "ecdsa-sha2-nistp521",
            KeyKind::Ed25519 => "ssh-ed25519",
        }
    }

    /// Number of fields after the type name.
    pub fn field_count(&self) -> usize {
        match self {
            KeyKind::Rsa => 2,
            KeyKind::Dss => 4,
            KeyKind::EcdsaNistP256 | KeyKind::EcdsaNistP384 | KeyKind::EcdsaNistP521 => 2,
            KeyKind::Ed25519 => 1,
        }
    }

    /// Parses a key type name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ssh-rsa" => Some(KeyKind::Rsa),
            "ssh-dss" => Some(KeyKind::Dss),
            "ecdsa-sha2-nistp256" => Some(KeyKind::EcdsaNistP256),
            "ecdsa-sha2-nistp384" => Some(KeyKind::EcdsaNistP384),
            "ecdsa-sha2-nistp521" => Some(KeyKind::EcdsaNistP521),
            "ssh-ed25519" => Some(KeyKind::Ed25519),
            _ => None,
        }
    }

    /// Curve identifier for ECDSA kinds.
    pub fn curve_name(&self) -> Option<&'static str> {
        match self {
            KeyKind::EcdsaNistP256 => Some("nistp256"),
            KeyKind::EcdsaNistP384 => Some("nistp384"),
            KeyKind::EcdsaNistP521 => Some("nistp521"),
            _ => None,
        }
    }
}

/// SSH public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    /// RSA public key
    Rsa {
        /// Public exponent
        e: Vec<u8>,
        /// Modulus
        n: Vec<u8>,
    },
    /// DSA public key
    Dss(DsaKey),
    /// ECDSA public key
    Ecdsa {
        /// Curve
        kind: KeyKind,
        /// Uncompressed SEC1 point
        point: Vec<u8>,
    },
    /// Ed25519 public key (32 bytes)
    Ed25519([u8; 32]),
}

impl PublicKey {
    /// Builds a key from the raw contents of its blob fields.
    ///
    /// Integer fields may carry a leading zero byte; it is removed.
    pub fn from_fields(kind: KeyKind, fields: &[Vec<u8>]) -> SealResult<Self> {
        if fields.len() != kind.field_count() {
            return Err(SealError::InvalidKeyData(format!(
                "{} key needs {} fields, got {}",
                kind.name(),
                kind.field_count(),
                fields.len()
            )));
        }

        match kind {
            KeyKind::Rsa => {
                let e = unsigned_field(kind, &fields[0])?;
                let n = unsigned_field(kind, &fields[1])?;
                if e.is_empty() || n.is_empty() {
                    return Err(SealError::InvalidKeyData(
                        "RSA exponent and modulus must be non-zero".to_string(),
                    ));
                }
                Ok(PublicKey::Rsa { e, n })
            }
            KeyKind::Dss => {
                let mut numbers = Vec::with_capacity(4);
                for field in fields {
                    numbers.push(unsigned_field(kind, field)?);
                }
                Ok(PublicKey::Dss(DsaKey::from_public_key_data(kind.name(), &numbers)?))
            }
            KeyKind::EcdsaNistP256 | KeyKind::EcdsaNistP384 | KeyKind::EcdsaNistP521 => {
                let expected = kind.curve_name().unwrap_or_default();
                if fields[0] != expected.as_bytes() {
                    return Err(SealError::InvalidKeyData(format!(
                        "{} key carries curve {:?}",
                        kind.name(),
                        String::from_utf8_lossy(&fields[0])
                    )));
                }
                validate_ec_point(kind, &fields[1])?;
                Ok(PublicKey::Ecdsa {
                    kind,
                    point: fields[1].clone(),
                })
            }
            KeyKind::Ed25519 => {
                let bytes: [u8; 32] = fields[0].as_slice().try_into().map_err(|_| {
                    SealError::InvalidKeyData(format!(
                        "Ed25519 public key must be 32 bytes, got {}",
                        fields[0].len()
                    ))
                })?;
                ed25519_dalek::VerifyingKey::from_bytes(&bytes).map_err(|e| {
                    SealError::InvalidKeyData(format!("Invalid Ed25519 public key: {}", e))
                })?;
                Ok(PublicKey::Ed25519(bytes))
            }
        }
    }

    /// Parses a public key blob.
    pub fn from_blob(blob: &[u8]) -> SealResult<Self> {
        let mut offset = 0;
        let name = wire::read_string(blob, &mut offset)?;
        let kind = KeyKind::from_name(&name).ok_or_else(|| {
            SealError::UnsupportedAlgorithm(format!("Unknown public key type: {}", name))
        })?;

        let fields = read_fields(blob, &mut offset, kind.field_count())?;
        if offset != blob.len() {
            return Err(SealError::MalformedInput(format!(
                "{} trailing bytes after {} key",
                blob.len() - offset,
                name
            )));
        }

        let key = match Self::from_fields(kind, &fields) {
            Ok(key) => key,
            Err(e) => {
                logging::log_key_rejected(kind.name(), &e.to_string());
                return Err(e);
            }
        };
        logging::log_key_parsed(kind.name(), &key.fingerprint_sha256());
        Ok(key)
    }

    /// Parses a `type base64 [comment]` line as found in `.pub` files.
    pub fn from_openssh(line: &str) -> SealResult<Self> {
        let mut parts = line.split_whitespace();
        let (key_type, data) = match (parts.next(), parts.next()) {
            (Some(key_type), Some(data)) => (key_type, data),
            _ => {
                return Err(SealError::MalformedInput(
                    "Expected '<type> <base64> [comment]'".to_string(),
                ))
            }
        };

        let blob = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| SealError::MalformedInput(format!("Invalid base64 key data: {}", e)))?;
        let key = Self::from_blob(&blob)?;
        if key.kind().name() != key_type {
            return Err(SealError::MalformedInput(format!(
                "Key type {} does not match encoded type {}",
                key_type,
                key.kind().name()
            )));
        }
        Ok(key)
    }

    /// Encodes the key as a blob.
    pub fn to_blob(&self) -> Vec<u8> {
        if let PublicKey::Dss(dsa) = self {
            return dsa.public_blob();
        }

        let mut buf = BytesMut::new();
        wire::write_string(&mut buf, self.kind().name());
        match self {
            PublicKey::Rsa { e, n } => {
                wire::write_mpint(&mut buf, e);
                wire::write_mpint(&mut buf, n);
            }
            PublicKey::Ecdsa { kind, point } => {
                wire::write_string(&mut buf, kind.curve_name().unwrap_or_default());
                wire::write_bytes(&mut buf, point);
            }
            PublicKey::Ed25519(key) => wire::write_bytes(&mut buf, key),
            PublicKey::Dss(_) => {}
        }
        buf.to_vec()
    }

    /// Key family.
    pub fn kind(&self) -> KeyKind {
        match self {
            PublicKey::Rsa { .. } => KeyKind::Rsa,
            PublicKey::Dss(_) => KeyKind::Dss,
            PublicKey::Ecdsa { kind, .. } => *kind,
            PublicKey::Ed25519(_) => KeyKind::Ed25519,
        }
    }

    /// SHA-256 over the key blob.
    pub fn fingerprint_sha256(&self) -> [u8; 32] {
        Sha256::digest(self.to_blob()).into()
    }
}

/// Reads `count` length-prefixed fields.
pub(crate) fn read_fields(
    data: &[u8],
    offset: &mut usize,
    count: usize,
) -> SealResult<Vec<Vec<u8>>> {
    (0..count).map(|_| wire::read_bytes(data, offset)).collect()
}

fn unsigned_field(kind: KeyKind, raw: &[u8]) -> SealResult<Vec<u8>> {
    if raw.first().map_or(false, |b| b & 0x80 != 0) {
        return Err(SealError::InvalidKeyData(format!(
            "Negative integer in {} key",
            kind.name()
        )));
    }
    Ok(wire::strip_leading_zeros(raw).to_vec())
}

fn validate_ec_point(kind: KeyKind, point: &[u8]) -> SealResult<()> {
    let valid = match kind {
        KeyKind::EcdsaNistP256 => p256::ecdsa::VerifyingKey::from_sec1_bytes(point).is_ok(),
        KeyKind::EcdsaNistP384 => p384::ecdsa::VerifyingKey::from_sec1_bytes(point).is_ok(),
        KeyKind::EcdsaNistP521 => p521::ecdsa::VerifyingKey::from_sec1_bytes(point).is_ok(),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SealError::InvalidKeyData(format!(
            "Invalid {} public point",
            kind.name()
        )))
    }
}
