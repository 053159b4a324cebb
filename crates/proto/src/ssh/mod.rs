//! SSH transport cryptography: packet protection and host key trust.
//!
//! This module covers the parts of RFC 4253 and the OpenSSH certificate
//! format that sit between a negotiated algorithm list and the socket.
//!
//! # Architecture
//!
//! 1. **Framing** ([`packet`], [`config`]) - Binary packet layout and limits
//! 2. **Ciphers and MACs** ([`cipher_mode`], [`crypto`], [`hash_info`]) -
//!    AES in CBC/CTR mode and HMAC, keyed from derived material
//! 3. **Packet protection** ([`packet_crypto`]) - Encrypt-and-MAC and
//!    encrypt-then-MAC ordering with sequence numbers
//! 4. **Key exchange** ([`kex_ecdh`]) - `SSH_MSG_KEX_ECDH_INIT`
//! 5. **Keys** ([`key`], [`dsa`], [`privatekey`]) - Public key blobs, DSA
//!    and PEM private keys
//! 6. **Host key trust** ([`hostkey`], [`certificate`],
//!    [`certificate_host`]) - Signature verification for plain keys and
//!    CA-signed certificates
//!
//! # Security Considerations
//!
//! - **Input Validation**: Every parser bounds-checks lengths before reading
//! - **Constant-Time Operations**: MAC tags are compared with [`subtle`]
//! - **Memory Safety**: Secrets are zeroized on drop using [`zeroize`]
//! - **No Unsafe Code**: Pure Rust implementation without `unsafe`
//!
//! # Example
//!
//! ```rust
//! use sealwire_proto::ssh::Packet;
//!
//! let packet = Packet::new(b"SSH-MSG-KEXINIT payload".to_vec());
//! let bytes = packet.to_bytes();
//!
//! let parsed = Packet::from_bytes(&bytes).unwrap();
//! assert_eq!(parsed.payload(), b"SSH-MSG-KEXINIT payload");
//! ```
//!
//! # References
//!
//! - [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253) - SSH Transport Layer Protocol
//! - [RFC 4344](https://datatracker.ietf.org/doc/html/rfc4344) - SSH Transport Layer Encryption Modes
//! - [RFC 5656](https://datatracker.ietf.org/doc/html/rfc5656) - Elliptic Curve Algorithm Integration in SSH
//! - [RFC 8332](https://datatracker.ietf.org/doc/html/rfc8332) - Use of RSA Keys with SHA-256 and SHA-512
//! - [PROTOCOL.certkeys](https://cvsweb.openbsd.org/src/usr.bin/ssh/PROTOCOL.certkeys) - OpenSSH certificate format

pub mod certificate;
pub mod certificate_host;
pub mod cipher_mode;
pub mod config;
pub mod crypto;
pub mod dsa;
pub mod hash_info;
pub mod hostkey;
pub mod kex_ecdh;
pub mod key;
pub mod logging;
pub mod message;
pub mod packet;
pub mod packet_crypto;
pub mod privatekey;
pub mod wire;

// Re-export main types
pub use certificate::{Certificate, CertificateKind, CertificateType};
pub use certificate_host::CertificateHostAlgorithm;
pub use cipher_mode::{AesBlockCipher, BlockCipher, ChainingMode, CipherMode};
pub use config::PacketConfig;
pub use crypto::{CipherAlgorithm, MacAlgorithm, MacKey, PacketCipher, PacketMac};
pub use dsa::{DsaDigitalSignature, DsaKey};
pub use hash_info::HashInfo;
pub use hostkey::{
    HostAlgorithm, HostKeyAlgorithm, HostKeyAlgorithms, KeyHostAlgorithm, SignatureBlob,
};
pub use kex_ecdh::KeyExchangeEcdhInitMessage;
pub use key::{KeyKind, PublicKey};
pub use message::MessageType;
pub use packet::{Packet, MAX_PACKET_SIZE, MIN_PACKET_SIZE};
pub use packet_crypto::{MacOrdering, PacketDecryptor, PacketEncryptor, PacketHeader};
pub use privatekey::PrivateKey;
