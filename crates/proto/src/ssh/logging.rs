//! Structured logging for packet protection and host trust decisions
//!
//! Every helper emits a `tracing` event with named fields. Secret material
//! and MAC values are never logged.
//!
//! # Log Levels
//!
//! - **TRACE**: Per-packet encryption and decryption
//! - **DEBUG**: Keys and certificates parsed, algorithm table lookups
//! - **WARN**: Integrity failures, rejected keys and certificates
//!
//! # Example
//!
//! ```no_run
//! use sealwire_proto::ssh::logging;
//!
//! tracing_subscriber::fmt()
//!     .with_env_filter("sealwire_proto::ssh=trace")
//!     .init();
//!
//! logging::log_packet_sealed(3, 32, 20, false);
//! ```

use tracing::{debug, trace, warn};

/// Log an outbound packet leaving the encryptor
///
/// # Arguments
///
/// * `seq` - Outbound sequence number
/// * `packet_len` - Plaintext packet length including the length field
/// * `mac_len` - Appended MAC length
/// * `etm` - Encrypt-then-MAC ordering in use
pub fn log_packet_sealed(seq: u32, packet_len: usize, mac_len: usize, etm: bool) {
    trace!(
        direction = "outbound",
        seq_num = seq,
        packet_len = packet_len,
        mac_len = mac_len,
        etm = etm,
        "Packet sealed"
    );
}

/// Log an inbound packet accepted by the decryptor
///
/// # Arguments
///
/// * `seq` - Inbound sequence number
/// * `packet_len` - Declared `packet_length`
/// * `payload_len` - Payload length after removing padding
/// * `etm` - Encrypt-then-MAC ordering in use
pub fn log_packet_opened(seq: u32, packet_len: usize, payload_len: usize, etm: bool) {
    trace!(
        direction = "inbound",
        seq_num = seq,
        packet_len = packet_len,
        payload_len = payload_len,
        etm = etm,
        "Packet opened"
    );
}

/// Log an inbound MAC mismatch
///
/// # Arguments
///
/// * `seq` - Inbound sequence number
pub fn log_integrity_failure(seq: u32) {
    warn!(seq_num = seq, "Packet integrity check failed");
}

/// Log a rejected inbound packet length
///
/// # Arguments
///
/// * `packet_len` - Declared `packet_length`
/// * `reason` - Why it was rejected
pub fn log_packet_rejected(packet_len: usize, reason: &str) {
    warn!(
        packet_len = packet_len,
        reason = reason,
        "Inbound packet rejected"
    );
}

/// Log a parsed public key
///
/// # Arguments
///
/// * `key_type` - SSH key type name
/// * `fingerprint` - SHA-256 fingerprint of the key blob
pub fn log_key_parsed(key_type: &str, fingerprint: &[u8]) {
    debug!(
        key_type = key_type,
        fingerprint = %hex::encode(fingerprint),
        "Public key parsed"
    );
}

/// Log a rejected key
///
/// # Arguments
///
/// * `key_type` - SSH key type name
/// * `reason` - Why construction failed
pub fn log_key_rejected(key_type: &str, reason: &str) {
    warn!(key_type = key_type, reason = reason, "Key rejected");
}

/// Log a parsed certificate
///
/// # Arguments
///
/// * `cert_type` - Certificate type name
/// * `key_id` - Certificate key identifier
/// * `serial` - Certificate serial number
/// * `principals` - Number of valid principals
pub fn log_certificate_parsed(cert_type: &str, key_id: &str, serial: u64, principals: usize) {
    debug!(
        cert_type = cert_type,
        key_id = key_id,
        serial = serial,
        principals = principals,
        "Certificate parsed"
    );
}

/// Log the outcome of a certificate verification
///
/// # Arguments
///
/// * `key_id` - Certificate key identifier
/// * `ca_algorithm` - Signature algorithm of the CA
/// * `stage` - "session" or "ca"
/// * `accepted` - Whether the signature verified
pub fn log_certificate_verification(key_id: &str, ca_algorithm: &str, stage: &str, accepted: bool) {
    if accepted {
        debug!(
            key_id = key_id,
            ca_algorithm = ca_algorithm,
            stage = stage,
            "Certificate signature verified"
        );
    } else {
        warn!(
            key_id = key_id,
            ca_algorithm = ca_algorithm,
            stage = stage,
            "Certificate signature rejected"
        );
    }
}

/// Log a host key algorithm lookup
///
/// # Arguments
///
/// * `name` - Algorithm name looked up
/// * `found` - Whether the table held a factory for it
pub fn log_algorithm_lookup(name: &str, found: bool) {
    if found {
        debug!(algorithm = name, "Host key algorithm resolved");
    } else {
        warn!(algorithm = name, "Host key algorithm not available");
    }
}
