//! SSH transport cryptography for the Sealwire project.
//!
//! This crate provides the pieces of an SSH implementation that turn
//! negotiated algorithms into protected bytes and trusted host keys:
//!
//! - **Packet protection** - AES-CBC/CTR with HMAC in encrypt-and-MAC or
//!   encrypt-then-MAC order
//! - **Key exchange messages** - ECDH init encoding
//! - **Host key trust** - RSA, DSA, ECDSA and Ed25519 signatures, plus
//!   OpenSSH certificates checked against a CA algorithm table
//!
//! # Features
//!
//! - `ssh` (default) - SSH transport cryptography
//!
//! # Example
//!
//! ```rust
//! use sealwire_proto::ssh::crypto::{CipherAlgorithm, MacAlgorithm};
//! use sealwire_proto::ssh::hash_info::HashInfo;
//! use sealwire_proto::ssh::packet::Packet;
//! use sealwire_proto::ssh::packet_crypto::{PacketDecryptor, PacketEncryptor};
//!
//! let mac = HashInfo::for_algorithm(MacAlgorithm::HmacSha2_256Etm);
//! let mut tx = PacketEncryptor::from_negotiated(
//!     Some(CipherAlgorithm::Aes256Ctr), &[7; 32], &[9; 16], Some(&mac), &[1; 32],
//! ).unwrap();
//! let mut rx = PacketDecryptor::from_negotiated(
//!     Some(CipherAlgorithm::Aes256Ctr), &[7; 32], &[9; 16], Some(&mac), &[1; 32],
//! ).unwrap();
//!
//! let packet = Packet::with_padding(b"SSH message payload".to_vec(), tx.padding_multiplier(), true);
//! let wire = tx.encrypt(0, packet.to_bytes()).unwrap();
//!
//! let header = rx.read_header(&wire).unwrap();
//! let body = &wire[rx.header_len()..];
//! let opened = rx.read_body(0, &header, body).unwrap();
//! assert_eq!(opened.payload(), b"SSH message payload");
//! ```
//!
//! # Security
//!
//! - All cryptographic operations use vetted libraries (`ring`, `dalek`,
//!   RustCrypto)
//! - Constant-time MAC comparison
//! - Secure memory handling with `zeroize`
//! - Fuzz targets for certificate parsing and packet decryption

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

#[cfg(feature = "ssh")]
pub mod ssh;
