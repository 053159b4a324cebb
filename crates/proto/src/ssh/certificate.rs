//! OpenSSH certificates (`PROTOCOL.certkeys`).
//!
//! ```text
//! string    "ssh-ed25519-cert-v01@openssh.com" (or another type)
//! string    nonce
//! ....      certified key fields (1, 2 or 4 strings)
//! uint64    serial
//! uint32    type
//! string    key id
//! string    valid principals
//! uint64    valid after
//! uint64    valid before
//! string    critical options
//! string    extensions
//! string    reserved
//! string    signature key
//! string    signature
//! ```
//!
//! The CA signature covers every byte before the final `signature` field,
//! see [`Certificate::bytes_for_signature`].
//!
//! # Example
//!
//! ```rust
//! use sealwire_proto::ssh::certificate::{Certificate, CertificateType};
//!
//! let line = "ssh-ed25519-cert-v01@openssh.com AAAAIHNzaC1lZDI1NTE5LWNlcnQtdjAxQG9wZW5zc2guY29tAAAAIOTeWN5ynBem+1+tjZCoyPliEBvMncxephg8x2Yhu8sOAAAAICFS+NGbeR0kRTJC4V8uq2y3z/p7al7TAJeWDgaYgdsSAAAAAAAAACoAAAABAAAAEWFsaWNlQGV4YW1wbGUuY29tAAAAEwAAAAVhbGljZQAAAAZkZXBsb3kAAAAAZZIAgAAAAAB6QyuAAAAAJAAAAA5zb3VyY2UtYWRkcmVzcwAAAA4AAAAKMTAuMC4wLjAvOAAAAIIAAAAVcGVybWl0LVgxMS1mb3J3YXJkaW5nAAAAAAAAABdwZXJtaXQtYWdlbnQtZm9yd2FyZGluZwAAAAAAAAAWcGVybWl0LXBvcnQtZm9yd2FyZGluZwAAAAAAAAAKcGVybWl0LXB0eQAAAAAAAAAOcGVybWl0LXVzZXItcmMAAAAAAAAAAAAAADMAAAALc3NoLWVkMjU1MTkAAAAgy8yVuyyotuf3crllCsOSInIuEphmXrg02cgeXm5AnOMAAABTAAAAC3NzaC1lZDI1NTE5AAAAQFWGQ95nlSA4lo92La9iMqO45u4ojGfV8hKw/HFqXREpDB2z/OWe0nJgAqYp9I5g6LLm58/o83IwsKTz4dWebQs= alice";
//!
//! let cert = Certificate::from_openssh(line).unwrap();
//! assert_eq!(cert.cert_type(), CertificateType::User);
//! assert_eq!(cert.key_id(), "alice@example.com");
//! assert!(cert.is_principal_allowed("deploy"));
//! ```

use crate::ssh::hostkey::SignatureBlob;
use crate::ssh::key::{read_fields, KeyKind, PublicKey};
use crate::ssh::logging;
use crate::ssh::wire;
use base64::Engine;
use sealwire_platform::{SealError, SealResult};
use std::time::{SystemTime, UNIX_EPOCH};

const CERT_SUFFIX: &str = "-cert-v01@openssh.com";

/// Certificate type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateKind {
    /// ssh-rsa-cert-v01@openssh.com
    Rsa,
    /// ssh-dss-cert-v01@openssh.com
    Dss,
    /// ecdsa-sha2-nistp256-cert-v01@openssh.com
    EcdsaNistP256,
    /// ecdsa-sha2-nistp384-cert-v01@openssh.com
    EcdsaNistP384,
    /// ecdsa-sha2-nistp521-cert-v01@openssh.com
    EcdsaNistP521,
    /// ssh-ed25519-cert-v01@openssh.com
    Ed25519,
}

impl CertificateKind {
    /// All certificate kinds.
    pub const ALL: [CertificateKind; 6] = [
        CertificateKind::Ed25519,
        CertificateKind::EcdsaNistP256,
        CertificateKind::EcdsaNistP384,
        CertificateKind::EcdsaNistP521,
        CertificateKind::Rsa,
        CertificateKind::Dss,
    ];

    /// Certificate type name.
    pub fn name(&self) -> &'static str {
        match self {
            CertificateKind::Rsa => "ssh-rsa-cert-v01@openssh.com",
            CertificateKind::Dss => "ssh-dss-cert-v01@openssh.com",
            CertificateKind::EcdsaNistP256 => "ecdsa-sha2-nistp256-cert-v01@openssh.com",
            CertificateKind::EcdsaNistP384 => "ecdsa-sha2-nistp384-cert-v01@openssh.com",
            CertificateKind::EcdsaNistP521 => "ecdsa-sha2-nistp521-cert-v01@openssh.com",
            CertificateKind::Ed25519 => "ssh-ed25519-cert-v01@openssh.com",
        }
    }

    /// Exact match on the type name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Kind of the certified key.
    pub fn key_kind(&self) -> KeyKind {
        match self {
            CertificateKind::Rsa => KeyKind::Rsa,
            CertificateKind::Dss => KeyKind::Dss,
            CertificateKind::EcdsaNistP256 => KeyKind::EcdsaNistP256,
            CertificateKind::EcdsaNistP384 => KeyKind::EcdsaNistP384,
            CertificateKind::EcdsaNistP521 => KeyKind::EcdsaNistP521,
            CertificateKind::Ed25519 => KeyKind::Ed25519,
        }
    }
}

/// Whether a certificate identifies a user or a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CertificateType {
    /// SSH_CERT_TYPE_USER
    User = 1,
    /// SSH_CERT_TYPE_HOST
    Host = 2,
}

impl CertificateType {
    /// Converts the wire value.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(CertificateType::User),
            2 => Some(CertificateType::Host),
            _ => None,
        }
    }

    /// Lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            CertificateType::User => "user",
            CertificateType::Host => "host",
        }
    }
}

/// Parsed OpenSSH certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    kind: CertificateKind,
    nonce: Vec<u8>,
    key: PublicKey,
    serial: u64,
    cert_type: CertificateType,
    key_id: String,
    valid_principals: Vec<String>,
    valid_after: u64,
    valid_before: u64,
    critical_options: Vec<(String, String)>,
    extensions: Vec<(String, String)>,
    signature_key: Vec<u8>,
    signature_key_type: String,
    signed_len: usize,
    signature: Vec<u8>,
    bytes: Vec<u8>,
}

impl Certificate {
    /// Parses the binary certificate.
    pub fn parse(bytes: &[u8]) -> SealResult<Self> {
        let mut offset = 0;

        let name = wire::read_string(bytes, &mut offset)?;
        let kind = CertificateKind::from_name(&name).ok_or_else(|| {
            SealError::UnsupportedAlgorithm(format!("Unknown certificate type: {}", name))
        })?;

        let nonce = wire::read_bytes(bytes, &mut offset)?;
        let key_kind = kind.key_kind();
        let fields = read_fields(bytes, &mut offset, key_kind.field_count())?;
        let key = PublicKey::from_fields(key_kind, &fields)?;

        let serial = wire::read_u64(bytes, &mut offset)?;
        let type_value = wire::read_u32(bytes, &mut offset)?;
        let cert_type = CertificateType::from_u32(type_value).ok_or_else(|| {
            SealError::MalformedInput(format!("Unknown certificate type value: {}", type_value))
        })?;
        let key_id = wire::read_string(bytes, &mut offset)?;
        let valid_principals = parse_principals(wire::read_slice(bytes, &mut offset)?)?;
        let valid_after = wire::read_u64(bytes, &mut offset)?;
        let valid_before = wire::read_u64(bytes, &mut offset)?;
        let critical_options = parse_options(wire::read_slice(bytes, &mut offset)?)?;
        let extensions = parse_options(wire::read_slice(bytes, &mut offset)?)?;
        let _reserved = wire::read_slice(bytes, &mut offset)?;

        let signature_key = wire::read_bytes(bytes, &mut offset)?;
        let mut key_offset = 0;
        let ca_key_type = wire::read_string(&signature_key, &mut key_offset)?;
        if ca_key_type.ends_with(CERT_SUFFIX) {
            return Err(SealError::UnsupportedAlgorithm(format!(
                "Certificate signed by another certificate ({})",
                ca_key_type
            )));
        }

        let signed_len = offset;
        let signature = wire::read_bytes(bytes, &mut offset)?;
        if offset != bytes.len() {
            return Err(SealError::MalformedInput(format!(
                "{} trailing bytes after certificate",
                bytes.len() - offset
            )));
        }

        logging::log_certificate_parsed(
            kind.name(),
            &key_id,
            serial,
            valid_principals.len(),
        );

        Ok(Self {
            kind,
            nonce,
            key,
            serial,
            cert_type,
            key_id,
            valid_principals,
            valid_after,
            valid_before,
            critical_options,
            extensions,
            signature_key,
            signature_key_type: ca_key_type,
            signed_len,
            signature,
            bytes: bytes.to_vec(),
        })
    }

    /// Parses a `type base64 [comment]` line from a `*-cert.pub` file.
    pub fn from_openssh(line: &str) -> SealResult<Self> {
        let mut parts = line.split_whitespace();
        let (cert_type, data) = match (parts.next(), parts.next()) {
            (Some(cert_type), Some(data)) => (cert_type, data),
            _ => {
                return Err(SealError::MalformedInput(
                    "Expected '<type> <base64> [comment]'".to_string(),
                ))
            }
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| SealError::MalformedInput(format!("Invalid base64 certificate: {}", e)))?;
        let cert = Self::parse(&bytes)?;
        if cert.name() != cert_type {
            return Err(SealError::MalformedInput(format!(
                "Certificate type {} does not match encoded type {}",
                cert_type,
                cert.name()
            )));
        }
        Ok(cert)
    }

    /// Certificate type name.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Certificate kind.
    pub fn kind(&self) -> CertificateKind {
        self.kind
    }

    /// CA provided nonce.
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// Certified public key.
    pub fn key(&self) -> &PublicKey {
        &self.key
    }

    /// Serial number.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// User or host.
    pub fn cert_type(&self) -> CertificateType {
        self.cert_type
    }

    /// Key identifier.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Principal names. Empty means any.
    pub fn valid_principals(&self) -> &[String] {
        &self.valid_principals
    }

    /// Start of validity, Unix seconds.
    pub fn valid_after(&self) -> u64 {
        self.valid_after
    }

    /// End of validity, Unix seconds. `u64::MAX` means no expiry.
    pub fn valid_before(&self) -> u64 {
        self.valid_before
    }

    /// Critical options in wire order.
    pub fn critical_options(&self) -> &[(String, String)] {
        &self.critical_options
    }

    /// Extensions in wire order.
    pub fn extensions(&self) -> &[(String, String)] {
        &self.extensions
    }

    /// Value of a critical option.
    pub fn critical_option(&self, name: &str) -> Option<&str> {
        lookup(&self.critical_options, name)
    }

    /// Value of an extension.
    pub fn extension(&self, name: &str) -> Option<&str> {
        lookup(&self.extensions, name)
    }

    /// CA public key blob.
    pub fn signature_key(&self) -> &[u8] {
        &self.signature_key
    }

    /// Key type name of the CA key, e.g. `ssh-ed25519`.
    pub fn signature_key_type(&self) -> &str {
        &self.signature_key_type
    }

    /// CA signature blob.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Full encoded certificate.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The prefix of [`bytes`](Self::bytes) the CA signed.
    pub fn bytes_for_signature(&self) -> &[u8] {
        &self.bytes[..self.signed_len]
    }

    /// Algorithm name inside the CA signature blob.
    pub fn signature_key_algorithm_name(&self) -> SealResult<String> {
        Ok(SignatureBlob::parse(&self.signature)?.algorithm)
    }

    /// Whether `unix_time` falls inside `[valid_after, valid_before)`.
    pub fn is_valid_at(&self, unix_time: u64) -> bool {
        unix_time >= self.valid_after && unix_time < self.valid_before
    }

    /// [`is_valid_at`](Self::is_valid_at) for the current time.
    pub fn is_valid_now(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.is_valid_at(now)
    }

    /// Whether `principal` is listed, or the list is empty.
    pub fn is_principal_allowed(&self, principal: &str) -> bool {
        self.valid_principals.is_empty() || self.valid_principals.iter().any(|p| p == principal)
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn parse_principals(data: &[u8]) -> SealResult<Vec<String>> {
    let mut offset = 0;
    let mut principals = Vec::new();
    while offset < data.len() {
        principals.push(wire::read_string(data, &mut offset)?);
    }
    Ok(principals)
}

/// Name/data pairs. Non-empty data holds a single string.
fn parse_options(data: &[u8]) -> SealResult<Vec<(String, String)>> {
    let mut offset = 0;
    let mut options: Vec<(String, String)> = Vec::new();
    while offset < data.len() {
        let name = wire::read_string(data, &mut offset)?;
        let raw = wire::read_slice(data, &mut offset)?;

        let value = if raw.is_empty() {
            String::new()
        } else {
            let mut inner = 0;
            let value = wire::read_string(raw, &mut inner)?;
            if inner != raw.len() {
                return Err(SealError::MalformedInput(format!(
                    "Trailing bytes in certificate option {}",
                    name
                )));
            }
            value
        };

        if options.iter().any(|(n, _)| *n == name) {
            return Err(SealError::MalformedInput(format!(
                "Duplicate certificate option {}",
                name
            )));
        }
        options.push((name, value));
    }
    Ok(options)
}
