//! SSH cipher and MAC algorithms.
//!
//! This module names the negotiable transport algorithms and builds the
//! objects the packet layer drives:
//!
//! - AES-128/192/256 in CTR mode (RFC 4344) and CBC mode (RFC 4253)
//! - HMAC-SHA1, HMAC-SHA1-96, HMAC-SHA2-256, HMAC-SHA2-512 and their
//!   `-etm@openssh.com` encrypt-then-MAC variants
//!
//! # Security
//!
//! - **Zeroization** - MAC keys and chaining state are wiped on drop
//! - **Constant time** - MAC comparison uses [`subtle::ConstantTimeEq`]
//! - **No detail on failure** - a MAC mismatch is reported as
//!   [`SealError::IntegrityFailure`] only
//!
//! # Example
//!
//! ```rust
//! use sealwire_proto::ssh::crypto::{CipherAlgorithm, MacAlgorithm, MacKey, PacketMac};
//!
//! let cipher = CipherAlgorithm::from_name("aes128-ctr").unwrap();
//! let mut ctx = cipher.create(&[0u8; 16], &[0u8; 16]).unwrap();
//! let mut block = [0u8; 16];
//! ctx.encrypt(&mut block);
//!
//! let mac = MacKey::new(MacAlgorithm::HmacSha2_256, &[0u8; 32]).unwrap();
//! let tag = mac.compute(0, &block).unwrap();
//! assert_eq!(tag.len(), 32);
//! ```

use crate::ssh::cipher_mode::{AesBlockCipher, ChainingMode, CipherMode};
use hmac::{Hmac, Mac};
use sealwire_platform::{SealError, SealResult};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Cipher algorithm for SSH encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    /// AES-128 in counter mode
    Aes128Ctr,
    /// AES-192 in counter mode
    Aes192Ctr,
    /// AES-256 in counter mode
    Aes256Ctr,
    /// AES-128 in CBC mode
    Aes128Cbc,
    /// AES-192 in CBC mode
    Aes192Cbc,
    /// AES-256 in CBC mode
    Aes256Cbc,
}

impl CipherAlgorithm {
    /// Returns the algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            CipherAlgorithm::Aes128Ctr => "aes128-ctr",
            CipherAlgorithm::Aes192Ctr => "aes192-ctr",
            CipherAlgorithm::Aes256Ctr => "aes256-ctr",
            CipherAlgorithm::Aes128Cbc => "aes128-cbc",
            CipherAlgorithm::Aes192Cbc => "aes192-cbc",
            CipherAlgorithm::Aes256Cbc => "aes256-cbc",
        }
    }

    /// Returns the key size in bytes.
    pub fn key_size(&self) -> usize {
        match self {
            CipherAlgorithm::Aes128Ctr | CipherAlgorithm::Aes128Cbc => 16,
            CipherAlgorithm::Aes192Ctr | CipherAlgorithm::Aes192Cbc => 24,
            CipherAlgorithm::Aes256Ctr | CipherAlgorithm::Aes256Cbc => 32,
        }
    }

    /// Returns the IV size in bytes.
    pub fn iv_size(&self) -> usize {
        self.block_size()
    }

    /// Returns the cipher block size in bytes.
    pub fn block_size(&self) -> usize {
        AesBlockCipher::BLOCK_SIZE
    }

    /// Returns the chaining mode.
    pub fn chaining_mode(&self) -> ChainingMode {
        match self {
            CipherAlgorithm::Aes128Ctr | CipherAlgorithm::Aes192Ctr | CipherAlgorithm::Aes256Ctr => {
                ChainingMode::Ctr
            }
            CipherAlgorithm::Aes128Cbc | CipherAlgorithm::Aes192Cbc | CipherAlgorithm::Aes256Cbc => {
                ChainingMode::Cbc
            }
        }
    }

    /// Parses cipher algorithm from name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "aes128-ctr" => Some(CipherAlgorithm::Aes128Ctr),
            "aes192-ctr" => Some(CipherAlgorithm::Aes192Ctr),
            "aes256-ctr" => Some(CipherAlgorithm::Aes256Ctr),
            "aes128-cbc" => Some(CipherAlgorithm::Aes128Cbc),
            "aes192-cbc" => Some(CipherAlgorithm::Aes192Cbc),
            "aes256-cbc" => Some(CipherAlgorithm::Aes256Cbc),
            _ => None,
        }
    }

    /// Builds a packet cipher from derived key and IV material.
    ///
    /// Only the leading `key_size()` and `iv_size()` bytes are used.
    pub fn create(&self, key_material: &[u8], iv: &[u8]) -> SealResult<Box<dyn PacketCipher>> {
        if key_material.len() < self.key_size() {
            return Err(SealError::InvalidKeyData(format!(
                "Insufficient key material: expected {}, got {}",
                self.key_size(),
                key_material.len()
            )));
        }

        let block_cipher = AesBlockCipher::new(&key_material[..self.key_size()])?;
        let mode = CipherMode::new(self.chaining_mode(), Box::new(block_cipher), iv)?;

        Ok(Box::new(BlockModeCipher {
            algorithm: *self,
            mode,
        }))
    }
}

/// A negotiated cipher as seen by the packet layer.
///
/// Implementations keep their own chaining state; callers serialize use.
pub trait PacketCipher: Send {
    /// Smallest unit the cipher operates on, in bytes.
    fn minimum_size(&self) -> u8;

    /// Encrypts `data` in place. `data.len()` is a multiple of
    /// [`Self::minimum_size`].
    fn encrypt(&mut self, data: &mut [u8]);

    /// Decrypts `data` in place. `data.len()` is a multiple of
    /// [`Self::minimum_size`].
    fn decrypt(&mut self, data: &mut [u8]);
}

/// [`PacketCipher`] backed by a [`CipherMode`].
pub struct BlockModeCipher {
    algorithm: CipherAlgorithm,
    mode: CipherMode,
}

impl BlockModeCipher {
    /// Returns the algorithm.
    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }
}

impl PacketCipher for BlockModeCipher {
    fn minimum_size(&self) -> u8 {
        self.mode.block_size() as u8
    }

    fn encrypt(&mut self, data: &mut [u8]) {
        self.mode.encrypt_in_place(data);
    }

    fn decrypt(&mut self, data: &mut [u8]) {
        self.mode.decrypt_in_place(data);
    }
}

impl std::fmt::Debug for BlockModeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockModeCipher")
            .field("algorithm", &self.algorithm)
            .field("mode", &self.mode)
            .finish()
    }
}

/// MAC algorithm for SSH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAlgorithm {
    /// HMAC-SHA1
    HmacSha1,
    /// HMAC-SHA1 truncated to 96 bits
    HmacSha1_96,
    /// HMAC-SHA256
    HmacSha2_256,
    /// HMAC-SHA512
    HmacSha2_512,
    /// HMAC-SHA1, encrypt-then-MAC
    HmacSha1Etm,
    /// HMAC-SHA1-96, encrypt-then-MAC
    HmacSha1_96Etm,
    /// HMAC-SHA256, encrypt-then-MAC
    HmacSha2_256Etm,
    /// HMAC-SHA512, encrypt-then-MAC
    HmacSha2_512Etm,
}

impl MacAlgorithm {
    /// Returns the algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            MacAlgorithm::HmacSha1 => "hmac-sha1",
            MacAlgorithm::HmacSha1_96 => "hmac-sha1-96",
            MacAlgorithm::HmacSha2_256 => "hmac-sha2-256",
            MacAlgorithm::HmacSha2_512 => "hmac-sha2-512",
            MacAlgorithm::HmacSha1Etm => "hmac-sha1-etm@openssh.com",
            MacAlgorithm::HmacSha1_96Etm => "hmac-sha1-96-etm@openssh.com",
            MacAlgorithm::HmacSha2_256Etm => "hmac-sha2-256-etm@openssh.com",
            MacAlgorithm::HmacSha2_512Etm => "hmac-sha2-512-etm@openssh.com",
        }
    }

    /// Returns the key size in bytes.
    pub fn key_size(&self) -> usize {
        match self {
            MacAlgorithm::HmacSha1
            | MacAlgorithm::HmacSha1_96
            | MacAlgorithm::HmacSha1Etm
            | MacAlgorithm::HmacSha1_96Etm => 20,
            MacAlgorithm::HmacSha2_256 | MacAlgorithm::HmacSha2_256Etm => 32,
            MacAlgorithm::HmacSha2_512 | MacAlgorithm::HmacSha2_512Etm => 64,
        }
    }

    /// Returns the MAC output size in bytes.
    pub fn mac_size(&self) -> usize {
        match self {
            MacAlgorithm::HmacSha1_96 | MacAlgorithm::HmacSha1_96Etm => 12,
            other => other.key_size(),
        }
    }

    /// Returns true for the `-etm@openssh.com` variants.
    pub fn is_encrypt_then_mac(&self) -> bool {
        matches!(
            self,
            MacAlgorithm::HmacSha1Etm
                | MacAlgorithm::HmacSha1_96Etm
                | MacAlgorithm::HmacSha2_256Etm
                | MacAlgorithm::HmacSha2_512Etm
        )
    }

    /// Parses MAC algorithm from name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hmac-sha1" => Some(MacAlgorithm::HmacSha1),
            "hmac-sha1-96" => Some(MacAlgorithm::HmacSha1_96),
            "hmac-sha2-256" => Some(MacAlgorithm::HmacSha2_256),
            "hmac-sha2-512" => Some(MacAlgorithm::HmacSha2_512),
            "hmac-sha1-etm@openssh.com" => Some(MacAlgorithm::HmacSha1Etm),
            "hmac-sha1-96-etm@openssh.com" => Some(MacAlgorithm::HmacSha1_96Etm),
            "hmac-sha2-256-etm@openssh.com" => Some(MacAlgorithm::HmacSha2_256Etm),
            "hmac-sha2-512-etm@openssh.com" => Some(MacAlgorithm::HmacSha2_512Etm),
            _ => None,
        }
    }
}

/// A negotiated MAC as seen by the packet layer.
pub trait PacketMac: Send {
    /// MAC output size in bytes.
    fn mac_size(&self) -> usize;

    /// Computes the MAC over `uint32 sequence_number || data`.
    fn compute(&self, sequence_number: u32, data: &[u8]) -> SealResult<Vec<u8>>;

    /// Verifies `received` in constant time.
    ///
    /// Any mismatch, including a length mismatch, is
    /// [`SealError::IntegrityFailure`].
    fn verify(&self, sequence_number: u32, data: &[u8], received: &[u8]) -> SealResult<()> {
        let computed = self.compute(sequence_number, data)?;
        if computed.len() == received.len() && bool::from(computed.ct_eq(received)) {
            Ok(())
        } else {
            Err(SealError::IntegrityFailure)
        }
    }
}

/// MAC key for computing message authentication codes.
pub struct MacKey {
    algorithm: MacAlgorithm,
    key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for MacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacKey")
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .finish()
    }
}

macro_rules! hmac_tag {
    ($digest:ty, $key:expr, $seq:expr, $data:expr) => {{
        let mut mac = Hmac::<$digest>::new_from_slice($key)
            .map_err(|_| SealError::InvalidKeyData("Invalid HMAC key".to_string()))?;
        mac.update(&$seq.to_be_bytes());
        mac.update($data);
        mac.finalize().into_bytes().to_vec()
    }};
}

impl MacKey {
    /// Creates a new MAC key from the leading `key_size()` bytes of
    /// `key_material`.
    pub fn new(algorithm: MacAlgorithm, key_material: &[u8]) -> SealResult<Self> {
        if key_material.len() < algorithm.key_size() {
            return Err(SealError::InvalidKeyData(format!(
                "Insufficient key material for MAC: expected {}, got {}",
                algorithm.key_size(),
                key_material.len()
            )));
        }

        Ok(Self {
            algorithm,
            key: Zeroizing::new(key_material[..algorithm.key_size()].to_vec()),
        })
    }

    /// Returns the algorithm.
    pub fn algorithm(&self) -> MacAlgorithm {
        self.algorithm
    }
}

impl PacketMac for MacKey {
    fn mac_size(&self) -> usize {
        self.algorithm.mac_size()
    }

    fn compute(&self, sequence_number: u32, data: &[u8]) -> SealResult<Vec<u8>> {
        let mut tag = match self.algorithm {
            MacAlgorithm::HmacSha1
            | MacAlgorithm::HmacSha1_96
            | MacAlgorithm::HmacSha1Etm
            | MacAlgorithm::HmacSha1_96Etm => hmac_tag!(Sha1, &self.key, sequence_number, data),
            MacAlgorithm::HmacSha2_256 | MacAlgorithm::HmacSha2_256Etm => {
                hmac_tag!(Sha256, &self.key, sequence_number, data)
            }
            MacAlgorithm::HmacSha2_512 | MacAlgorithm::HmacSha2_512Etm => {
                hmac_tag!(Sha512, &self.key, sequence_number, data)
            }
        };

        tag.truncate(self.algorithm.mac_size());
        Ok(tag)
    }
}
