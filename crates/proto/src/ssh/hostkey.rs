//! SSH Host Key Algorithms
//!
//! This module verifies host key signatures according to RFC 4253
//! Section 6.6, and keeps the name to verifier table used during key
//! exchange and certificate validation.
//!
//! # Supported Algorithms
//!
//! - `ssh-ed25519` - EdDSA signature using Ed25519 (RFC 8709)
//! - `ecdsa-sha2-nistp256/384/521` - ECDSA (RFC 5656)
//! - `rsa-sha2-256`, `rsa-sha2-512` - RSA with SHA-2 (RFC 8332)
//! - `ssh-rsa` - RSA with SHA-1 (legacy)
//! - `ssh-dss` - DSA with SHA-1 (legacy)
//!
//! # Signature blob
//!
//! ```text
//! string    algorithm name
//! string    raw signature
//! ```
//!
//! # Example
//!
//! ```rust
//! use sealwire_proto::ssh::hostkey::HostKeyAlgorithms;
//!
//! let table = HostKeyAlgorithms::with_defaults();
//! assert!(table.contains("ssh-ed25519"));
//! assert!(table.create("ssh-foo", &[]).is_err());
//! ```

use crate::ssh::key::{KeyKind, PublicKey};
use crate::ssh::logging;
use crate::ssh::wire;
use bytes::BytesMut;
use ring::signature::{
    RsaPublicKeyComponents, RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
    RSA_PKCS1_2048_8192_SHA256, RSA_PKCS1_2048_8192_SHA512,
};
use sealwire_platform::{SealError, SealResult};
use signature::Verifier;
use std::sync::Arc;

/// Host key algorithm identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKeyAlgorithm {
    /// ssh-ed25519 - EdDSA signature using Ed25519
    SshEd25519,
    /// rsa-sha2-256 - RSA signature with SHA-256
    RsaSha2_256,
    /// rsa-sha2-512 - RSA signature with SHA-512
    RsaSha2_512,
    /// ssh-rsa - Legacy RSA with SHA-1
    SshRsa,
    /// ssh-dss - Legacy DSA with SHA-1
    SshDss,
    /// ecdsa-sha2-nistp256 - ECDSA signature using P-256 curve
    EcdsaSha2Nistp256,
    /// ecdsa-sha2-nistp384 - ECDSA signature using P-384 curve
    EcdsaSha2Nistp384,
    /// ecdsa-sha2-nistp521 - ECDSA signature using P-521 curve
    EcdsaSha2Nistp521,
}

impl HostKeyAlgorithm {
    /// All algorithms, most preferred first.
    pub const ALL: [HostKeyAlgorithm; 8] = [
        HostKeyAlgorithm::SshEd25519,
        HostKeyAlgorithm::EcdsaSha2Nistp256,
        HostKeyAlgorithm::EcdsaSha2Nistp384,
        HostKeyAlgorithm::EcdsaSha2Nistp521,
        HostKeyAlgorithm::RsaSha2_512,
        HostKeyAlgorithm::RsaSha2_256,
        HostKeyAlgorithm::SshRsa,
        HostKeyAlgorithm::SshDss,
    ];

    /// Get the algorithm name as specified in RFC 4253
    pub fn name(&self) -> &'static str {
        match self {
            HostKeyAlgorithm::SshEd25519 => "ssh-ed25519",
            HostKeyAlgorithm::RsaSha2_256 => "rsa-sha2-256",
            HostKeyAlgorithm::RsaSha2_512 => "rsa-sha2-512",
            HostKeyAlgorithm::SshRsa => "ssh-rsa",
            HostKeyAlgorithm::SshDss => "ssh-dss",
            HostKeyAlgorithm::EcdsaSha2Nistp256 => "ecdsa-sha2-nistp256",
            HostKeyAlgorithm::EcdsaSha2Nistp384 => "ecdsa-sha2-nistp384",
            HostKeyAlgorithm::EcdsaSha2Nistp521 => "ecdsa-sha2-nistp521",
        }
    }

    /// Parse algorithm from name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ssh-ed25519" => Some(HostKeyAlgorithm::SshEd25519),
            "rsa-sha2-256" => Some(HostKeyAlgorithm::RsaSha2_256),
            "rsa-sha2-512" => Some(HostKeyAlgorithm::RsaSha2_512),
            "ssh-rsa" => Some(HostKeyAlgorithm::SshRsa),
            "ssh-dss" => Some(HostKeyAlgorithm::SshDss),
            "ecdsa-sha2-nistp256" => Some(HostKeyAlgorithm::EcdsaSha2Nistp256),
            "ecdsa-sha2-nistp384" => Some(HostKeyAlgorithm::EcdsaSha2Nistp384),
            "ecdsa-sha2-nistp521" => Some(HostKeyAlgorithm::EcdsaSha2Nistp521),
            _ => None,
        }
    }

    /// Key family this algorithm signs with.
    pub fn key_kind(&self) -> KeyKind {
        match self {
            HostKeyAlgorithm::SshEd25519 => KeyKind::Ed25519,
            HostKeyAlgorithm::RsaSha2_256
            | HostKeyAlgorithm::RsaSha2_512
            | HostKeyAlgorithm::SshRsa => KeyKind::Rsa,
            HostKeyAlgorithm::SshDss => KeyKind::Dss,
            HostKeyAlgorithm::EcdsaSha2Nistp256 => KeyKind::EcdsaNistP256,
            HostKeyAlgorithm::EcdsaSha2Nistp384 => KeyKind::EcdsaNistP384,
            HostKeyAlgorithm::EcdsaSha2Nistp521 => KeyKind::EcdsaNistP521,
        }
    }

    /// Verifies a raw signature (the inner string of a signature blob).
    ///
    /// Returns `Ok(false)` for a well-formed key and a signature that does
    /// not match. A key of the wrong family is an error.
    pub fn verify(&self, key: &PublicKey, data: &[u8], signature: &[u8]) -> SealResult<bool> {
        if key.kind() != self.key_kind() {
            return Err(SealError::UnsupportedAlgorithm(format!(
                "{} cannot verify with a {} key",
                self.name(),
                key.kind().name()
            )));
        }

        match key {
            PublicKey::Ed25519(public_key) => verify_ed25519(public_key, data, signature),
            PublicKey::Rsa { e, n } => {
                let params = match self {
                    HostKeyAlgorithm::RsaSha2_256 => &RSA_PKCS1_2048_8192_SHA256,
                    HostKeyAlgorithm::RsaSha2_512 => &RSA_PKCS1_2048_8192_SHA512,
                    _ => &RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
                };
                // Some signers drop leading zeros of the signature
                let signature = if signature.len() < n.len() {
                    wire::to_fixed_width_be(signature, n.len())?
                } else {
                    signature.to_vec()
                };
                let components = RsaPublicKeyComponents {
                    n: n.as_slice(),
                    e: e.as_slice(),
                };
                Ok(components.verify(params, data, &signature).is_ok())
            }
            PublicKey::Dss(dsa) => dsa.digital_signature().verify(data, signature),
            PublicKey::Ecdsa { kind, point } => verify_ecdsa(*kind, point, data, signature),
        }
    }
}

impl std::fmt::Display for HostKeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn verify_ed25519(public_key: &[u8; 32], data: &[u8], signature: &[u8]) -> SealResult<bool> {
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(public_key)
        .map_err(|e| SealError::InvalidKeyData(format!("Invalid Ed25519 public key: {}", e)))?;

    let sig_bytes: [u8; 64] = match signature.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return Ok(false),
    };
    let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);

    Ok(verifying_key.verify(data, &signature).is_ok())
}

/// ECDSA signatures are `mpint r || mpint s` (RFC 5656 Section 3.1.2).
fn verify_ecdsa(kind: KeyKind, point: &[u8], data: &[u8], signature: &[u8]) -> SealResult<bool> {
    let mut offset = 0;
    let (r, s) = match (
        wire::read_mpint(signature, &mut offset),
        wire::read_mpint(signature, &mut offset),
    ) {
        (Ok(r), Ok(s)) if offset == signature.len() => (r, s),
        _ => return Ok(false),
    };

    let width = match kind {
        KeyKind::EcdsaNistP256 => 32,
        KeyKind::EcdsaNistP384 => 48,
        _ => 66,
    };
    let mut fixed = match wire::to_fixed_width_be(&r, width) {
        Ok(bytes) => bytes,
        Err(_) => return Ok(false),
    };
    match wire::to_fixed_width_be(&s, width) {
        Ok(bytes) => fixed.extend_from_slice(&bytes),
        Err(_) => return Ok(false),
    }

    let invalid_key =
        |e: p256::ecdsa::Error| SealError::InvalidKeyData(format!("Invalid {} key: {}", kind.name(), e));

    let verified = match kind {
        KeyKind::EcdsaNistP256 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(point).map_err(invalid_key)?;
            p256::ecdsa::Signature::from_slice(&fixed)
                .map(|sig| key.verify(data, &sig).is_ok())
                .unwrap_or(false)
        }
        KeyKind::EcdsaNistP384 => {
            let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(point).map_err(invalid_key)?;
            p384::ecdsa::Signature::from_slice(&fixed)
                .map(|sig| key.verify(data, &sig).is_ok())
                .unwrap_or(false)
        }
        _ => {
            let key = p521::ecdsa::VerifyingKey::from_sec1_bytes(point).map_err(invalid_key)?;
            p521::ecdsa::Signature::from_slice(&fixed)
                .map(|sig| key.verify(data, &sig).is_ok())
                .unwrap_or(false)
        }
    };
    Ok(verified)
}

/// Signature blob: algorithm name and raw signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBlob {
    /// Algorithm name
    pub algorithm: String,
    /// Raw signature
    pub signature: Vec<u8>,
}

impl SignatureBlob {
    /// Creates a signature blob.
    pub fn new(algorithm: impl Into<String>, signature: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            signature,
        }
    }

    /// Parses a signature blob. Trailing bytes are rejected.
    pub fn parse(data: &[u8]) -> SealResult<Self> {
        let mut offset = 0;
        let algorithm = wire::read_string(data, &mut offset)?;
        let signature = wire::read_bytes(data, &mut offset)?;
        if offset != data.len() {
            return Err(SealError::MalformedInput(format!(
                "{} trailing bytes after signature",
                data.len() - offset
            )));
        }
        Ok(Self {
            algorithm,
            signature,
        })
    }

    /// Encodes the blob.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(8 + self.algorithm.len() + self.signature.len());
        wire::write_string(&mut buf, &self.algorithm);
        wire::write_bytes(&mut buf, &self.signature);
        buf.to_vec()
    }
}

/// A host key algorithm bound to a key, as negotiated for a session.
pub trait HostAlgorithm: Send + Sync {
    /// Algorithm name
    fn name(&self) -> &str;

    /// Data sent as the host key: a key blob or certificate bytes.
    fn data(&self) -> Vec<u8>;

    /// Verifies a signature blob over `data`.
    ///
    /// A signature that does not match yields `Ok(false)`.
    fn verify_signature(&self, data: &[u8], signature_blob: &[u8]) -> SealResult<bool>;
}

/// Plain public key host algorithm.
#[derive(Debug, Clone)]
pub struct KeyHostAlgorithm {
    algorithm: HostKeyAlgorithm,
    key: PublicKey,
}

impl KeyHostAlgorithm {
    /// Binds `algorithm` to `key`. The key family must match.
    pub fn new(algorithm: HostKeyAlgorithm, key: PublicKey) -> SealResult<Self> {
        if key.kind() != algorithm.key_kind() {
            return Err(SealError::InvalidKeyData(format!(
                "{} key cannot be used with {}",
                key.kind().name(),
                algorithm.name()
            )));
        }
        Ok(Self { algorithm, key })
    }

    /// Parses `blob` and binds it to `algorithm`.
    pub fn from_blob(algorithm: HostKeyAlgorithm, blob: &[u8]) -> SealResult<Self> {
        Self::new(algorithm, PublicKey::from_blob(blob)?)
    }

    /// Signature algorithm
    pub fn algorithm(&self) -> HostKeyAlgorithm {
        self.algorithm
    }

    /// Public key
    pub fn key(&self) -> &PublicKey {
        &self.key
    }
}

impl HostAlgorithm for KeyHostAlgorithm {
    fn name(&self) -> &str {
        self.algorithm.name()
    }

    fn data(&self) -> Vec<u8> {
        self.key.to_blob()
    }

    fn verify_signature(&self, data: &[u8], signature_blob: &[u8]) -> SealResult<bool> {
        let blob = match SignatureBlob::parse(signature_blob) {
            Ok(blob) => blob,
            Err(_) => return Ok(false),
        };
        if blob.algorithm != self.algorithm.name() {
            return Ok(false);
        }
        self.algorithm.verify(&self.key, data, &blob.signature)
    }
}

/// Builds a verifier from a public key blob.
pub type HostAlgorithmFactory =
    Arc<dyn Fn(&[u8]) -> SealResult<Box<dyn HostAlgorithm>> + Send + Sync>;

/// Name to factory table of host key algorithms, in preference order.
#[derive(Clone, Default)]
pub struct HostKeyAlgorithms {
    entries: Vec<(String, HostAlgorithmFactory)>,
}

impl HostKeyAlgorithms {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding every plain key algorithm.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for algorithm in HostKeyAlgorithm::ALL {
            table.register(algorithm.name(), Self::key_factory(algorithm));
        }
        table
    }

    /// Factory for a plain key algorithm.
    pub fn key_factory(algorithm: HostKeyAlgorithm) -> HostAlgorithmFactory {
        Arc::new(move |blob: &[u8]| -> SealResult<Box<dyn HostAlgorithm>> {
            Ok(Box::new(KeyHostAlgorithm::from_blob(algorithm, blob)?))
        })
    }

    /// Adds or replaces an entry. New names go last.
    pub fn register(&mut self, name: impl Into<String>, factory: HostAlgorithmFactory) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name, factory)),
        }
    }

    /// Removes an entry, returning whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        self.entries.len() != before
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Registered names in preference order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the verifier registered under `name` for `blob`.
    pub fn create(&self, name: &str, blob: &[u8]) -> SealResult<Box<dyn HostAlgorithm>> {
        let factory = self
            .entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| factory);
        logging::log_algorithm_lookup(name, factory.is_some());

        match factory {
            Some(factory) => factory(blob),
            None => Err(SealError::UnsupportedAlgorithm(format!(
                "Host key algorithm not available: {}",
                name
            ))),
        }
    }
}

impl std::fmt::Debug for HostKeyAlgorithms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostKeyAlgorithms")
            .field("names", &self.names())
            .finish()
    }
}
