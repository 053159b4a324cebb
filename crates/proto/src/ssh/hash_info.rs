//! MAC algorithm descriptor.
//!
//! A [`HashInfo`] ties a MAC factory to the key size it needs and to the
//! packet ordering its name implies. The key exchange produces more key
//! material than most MACs need; [`HashInfo::create_mac`] hands exactly the
//! leading `key_size / 8` bytes to the factory.

use crate::ssh::crypto::{MacAlgorithm, MacKey, PacketMac};
use sealwire_platform::{SealError, SealResult};
use std::sync::Arc;

/// Builds a MAC from exactly-sized key bytes.
pub type MacFactory = Arc<dyn Fn(&[u8]) -> SealResult<Box<dyn PacketMac>> + Send + Sync>;

/// MAC algorithm descriptor: key size, factory and ordering flag.
#[derive(Clone)]
pub struct HashInfo {
    key_size: usize,
    factory: MacFactory,
    encrypt_then_mac: bool,
}

impl HashInfo {
    /// Creates a descriptor. `key_size` is in bits.
    pub fn new(key_size: usize, factory: MacFactory, encrypt_then_mac: bool) -> Self {
        Self {
            key_size,
            factory,
            encrypt_then_mac,
        }
    }

    /// Descriptor for one of the built-in HMAC algorithms.
    pub fn for_algorithm(algorithm: MacAlgorithm) -> Self {
        let factory: MacFactory = Arc::new(move |key: &[u8]| {
            MacKey::new(algorithm, key).map(|mac| Box::new(mac) as Box<dyn PacketMac>)
        });
        Self::new(
            algorithm.key_size() * 8,
            factory,
            algorithm.is_encrypt_then_mac(),
        )
    }

    /// Descriptor for a negotiated MAC name.
    pub fn from_name(name: &str) -> SealResult<Self> {
        MacAlgorithm::from_name(name)
            .map(Self::for_algorithm)
            .ok_or_else(|| SealError::UnsupportedAlgorithm(format!("MAC algorithm {}", name)))
    }

    /// Required key size in bits.
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// True when packets must be protected encrypt-then-MAC.
    pub fn is_encrypt_then_mac(&self) -> bool {
        self.encrypt_then_mac
    }

    /// Builds a MAC keyed with the first `key_size / 8` bytes of
    /// `key_material`. Never pads.
    pub fn create_mac(&self, key_material: &[u8]) -> SealResult<Box<dyn PacketMac>> {
        let needed = self.key_size / 8;
        if key_material.len() < needed {
            return Err(SealError::InvalidKeyData(format!(
                "Insufficient key material for MAC: expected {}, got {}",
                needed,
                key_material.len()
            )));
        }

        (self.factory)(&key_material[..needed])
    }
}

impl std::fmt::Debug for HashInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashInfo")
            .field("key_size", &self.key_size)
            .field("encrypt_then_mac", &self.encrypt_then_mac)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the key length it was given.
    fn recording_factory(seen: Arc<Mutex<Vec<usize>>>) -> MacFactory {
        Arc::new(move |key: &[u8]| {
            seen.lock().unwrap().push(key.len());
            MacKey::new(MacAlgorithm::HmacSha1, &[0u8; 20])
                .map(|mac| Box::new(mac) as Box<dyn PacketMac>)
        })
    }

    #[test]
    fn test_factory_receives_exact_key_size() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let info = HashInfo::new(160, recording_factory(seen.clone()), false);

        for len in [20usize, 21, 32, 64, 200] {
            info.create_mac(&vec![0x11; len]).unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec![20; 5]);
    }

    #[test]
    fn test_short_key_material_rejected() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let info = HashInfo::new(256, recording_factory(seen.clone()), false);

        let result = info.create_mac(&[0u8; 31]);
        assert!(matches!(result, Err(SealError::InvalidKeyData(_))));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_truncated_key_matches_direct_key() {
        let info = HashInfo::for_algorithm(MacAlgorithm::HmacSha2_256);
        let mut material = vec![0x33u8; 32];
        material.extend_from_slice(&[0xEE; 32]);

        let derived = info.create_mac(&material).unwrap();
        let direct = MacKey::new(MacAlgorithm::HmacSha2_256, &[0x33u8; 32]).unwrap();
        assert_eq!(
            derived.compute(9, b"data").unwrap(),
            direct.compute(9, b"data").unwrap()
        );
    }

    #[test]
    fn test_etm_flag_follows_name() {
        let plain = HashInfo::from_name("hmac-sha2-256").unwrap();
        assert!(!plain.is_encrypt_then_mac());
        assert_eq!(plain.key_size(), 256);

        let etm = HashInfo::from_name("hmac-sha1-etm@openssh.com").unwrap();
        assert!(etm.is_encrypt_then_mac());
        assert_eq!(etm.key_size(), 160);
    }

    #[test]
    fn test_unknown_name() {
        assert!(matches!(
            HashInfo::from_name("hmac-md5"),
            Err(SealError::UnsupportedAlgorithm(_))
        ));
    }
}
