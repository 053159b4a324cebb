//! Packet protection: cipher and MAC applied per packet.
//!
//! [`PacketEncryptor`] turns a plaintext binary packet into wire bytes and
//! [`PacketDecryptor`] reverses it. Both support the two orderings used by
//! SSH:
//!
//! ```text
//! encrypt-and-MAC   mac  = MAC(seq || length || padlen || payload || padding)
//!                   wire = E(length || padlen || payload || padding) || mac
//!
//! encrypt-then-MAC  ct   = E(padlen || payload || padding)
//!                   mac  = MAC(seq || length || ct)
//!                   wire = length || ct || mac
//! ```
//!
//! The sequence number is never transmitted. With no cipher and no MAC the
//! plaintext packet is emitted unchanged.
//!
//! # Reading packets
//!
//! The decryptor must learn `packet_length` before it knows how much more to
//! read from the transport, so decryption is two calls:
//!
//! ```rust
//! use sealwire_proto::ssh::crypto::{CipherAlgorithm, MacAlgorithm};
//! use sealwire_proto::ssh::hash_info::HashInfo;
//! use sealwire_proto::ssh::packet::Packet;
//! use sealwire_proto::ssh::packet_crypto::{PacketDecryptor, PacketEncryptor};
//!
//! let mac = HashInfo::for_algorithm(MacAlgorithm::HmacSha2_256);
//! let (key, iv, mac_key) = ([1u8; 16], [2u8; 16], [3u8; 32]);
//!
//! let mut tx = PacketEncryptor::from_negotiated(
//!     Some(CipherAlgorithm::Aes128Ctr), &key, &iv, Some(&mac), &mac_key,
//! ).unwrap();
//! let mut rx = PacketDecryptor::from_negotiated(
//!     Some(CipherAlgorithm::Aes128Ctr), &key, &iv, Some(&mac), &mac_key,
//! ).unwrap();
//!
//! let packet = Packet::with_padding(b"hello".to_vec(), tx.padding_multiplier(), false);
//! let wire = tx.encrypt(7, packet.to_bytes()).unwrap();
//!
//! let (head, rest) = wire.split_at(rx.header_len());
//! let header = rx.read_header(head).unwrap();
//! assert_eq!(rx.remaining_len(&header), rest.len());
//! let opened = rx.read_body(7, &header, rest).unwrap();
//! assert_eq!(opened.payload(), b"hello");
//! ```
//!
//! # Preconditions
//!
//! One instance serves one direction of one session. Calls are serialized by
//! the owner; `&mut self` enforces this for safe callers. Encryptor and
//! decryptor never share chaining state.

use crate::ssh::config::PacketConfig;
use crate::ssh::crypto::{CipherAlgorithm, PacketCipher, PacketMac};
use crate::ssh::hash_info::HashInfo;
use crate::ssh::logging;
use crate::ssh::packet::{Packet, DEFAULT_PADDING_MULTIPLE};
use sealwire_platform::{SealError, SealResult};
use zeroize::Zeroizing;

/// Length of the `packet_length` field.
const LENGTH_FIELD: usize = 4;

/// Smallest valid `packet_length`: padding_length byte plus 4 padding bytes.
const MIN_PACKET_LENGTH: usize = 5;

/// Order in which the cipher and MAC are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacOrdering {
    /// MAC over the plaintext, then encrypt everything (RFC 4253)
    #[default]
    EncryptAndMac,
    /// Encrypt all but the length, then MAC the ciphertext
    EncryptThenMac,
}

impl MacOrdering {
    /// Ordering selected by a MAC's encrypt-then-MAC flag.
    pub fn from_encrypt_then_mac(encrypt_then_mac: bool) -> Self {
        if encrypt_then_mac {
            MacOrdering::EncryptThenMac
        } else {
            MacOrdering::EncryptAndMac
        }
    }

    /// True for [`MacOrdering::EncryptThenMac`].
    pub fn is_encrypt_then_mac(&self) -> bool {
        matches!(self, MacOrdering::EncryptThenMac)
    }
}

/// `max(8, cipher block size)`, or 8 without a cipher.
fn padding_multiplier_for(cipher: Option<&dyn PacketCipher>) -> u8 {
    cipher.map_or(DEFAULT_PADDING_MULTIPLE, |c| {
        c.minimum_size().max(DEFAULT_PADDING_MULTIPLE)
    })
}

type NegotiatedParts = (
    MacOrdering,
    Option<Box<dyn PacketCipher>>,
    Option<Box<dyn PacketMac>>,
);

fn build_negotiated(
    cipher: Option<CipherAlgorithm>,
    key: &[u8],
    iv: &[u8],
    hash_info: Option<&HashInfo>,
    mac_key: &[u8],
) -> SealResult<NegotiatedParts> {
    let cipher = cipher.map(|alg| alg.create(key, iv)).transpose()?;
    let mac = hash_info.map(|info| info.create_mac(mac_key)).transpose()?;
    let ordering =
        MacOrdering::from_encrypt_then_mac(hash_info.map_or(false, HashInfo::is_encrypt_then_mac));
    Ok((ordering, cipher, mac))
}

/// Outbound packet protection for one direction.
pub struct PacketEncryptor {
    ordering: MacOrdering,
    cipher: Option<Box<dyn PacketCipher>>,
    mac: Option<Box<dyn PacketMac>>,
    padding_multiplier: u8,
    disposed: bool,
}

impl PacketEncryptor {
    /// Creates an encryptor owning `cipher` and `mac`. Either may be absent.
    pub fn new(
        ordering: MacOrdering,
        cipher: Option<Box<dyn PacketCipher>>,
        mac: Option<Box<dyn PacketMac>>,
    ) -> Self {
        Self {
            ordering,
            padding_multiplier: padding_multiplier_for(cipher.as_deref()),
            cipher,
            mac,
            disposed: false,
        }
    }

    /// Creates an encryptor from negotiated algorithms and derived keys.
    ///
    /// The ordering follows the MAC's encrypt-then-MAC flag.
    pub fn from_negotiated(
        cipher: Option<CipherAlgorithm>,
        key: &[u8],
        iv: &[u8],
        hash_info: Option<&HashInfo>,
        mac_key: &[u8],
    ) -> SealResult<Self> {
        let (ordering, cipher, mac) = build_negotiated(cipher, key, iv, hash_info, mac_key)?;
        Ok(Self::new(ordering, cipher, mac))
    }

    /// Alignment outbound packets must be padded to.
    pub fn padding_multiplier(&self) -> u8 {
        self.padding_multiplier
    }

    /// Cipher and MAC ordering.
    pub fn ordering(&self) -> MacOrdering {
        self.ordering
    }

    /// Length of the MAC appended to each packet.
    pub fn mac_size(&self) -> usize {
        self.mac.as_ref().map_or(0, |m| m.mac_size())
    }

    /// Protects one plaintext packet.
    ///
    /// `packet` is `uint32 packet_length || byte padding_length || payload ||
    /// padding`, already padded for [`Self::padding_multiplier`] and the
    /// ordering in use.
    ///
    /// # Errors
    ///
    /// [`SealError::ContractViolation`] after [`Self::dispose`], for a packet
    /// whose length field disagrees with its size, or for a packet that is
    /// not aligned to the cipher block size.
    pub fn encrypt(&mut self, sequence_number: u32, mut packet: Vec<u8>) -> SealResult<Vec<u8>> {
        if self.disposed {
            return Err(SealError::ContractViolation(
                "Packet encryptor used after dispose".to_string(),
            ));
        }

        self.check_packet(&packet)?;
        let etm = self.ordering.is_encrypt_then_mac();

        let tag = match self.ordering {
            MacOrdering::EncryptAndMac => {
                let tag = self
                    .mac
                    .as_ref()
                    .map(|mac| mac.compute(sequence_number, &packet))
                    .transpose()?;
                if let Some(cipher) = self.cipher.as_mut() {
                    cipher.encrypt(&mut packet);
                }
                tag
            }
            MacOrdering::EncryptThenMac => {
                if let Some(cipher) = self.cipher.as_mut() {
                    cipher.encrypt(&mut packet[LENGTH_FIELD..]);
                }
                self.mac
                    .as_ref()
                    .map(|mac| mac.compute(sequence_number, &packet))
                    .transpose()?
            }
        };

        let packet_len = packet.len();
        let mac_len = tag.as_ref().map_or(0, Vec::len);
        if let Some(tag) = tag {
            packet.extend_from_slice(&tag);
        }

        logging::log_packet_sealed(sequence_number, packet_len, mac_len, etm);
        Ok(packet)
    }

    /// Releases cipher and MAC key material. Later calls fail.
    pub fn dispose(&mut self) {
        self.cipher = None;
        self.mac = None;
        self.disposed = true;
    }

    /// True once [`Self::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn check_packet(&self, packet: &[u8]) -> SealResult<()> {
        if packet.len() < LENGTH_FIELD + MIN_PACKET_LENGTH {
            return Err(SealError::ContractViolation(format!(
                "Packet of {} bytes is shorter than the minimum {}",
                packet.len(),
                LENGTH_FIELD + MIN_PACKET_LENGTH
            )));
        }

        let declared = u32::from_be_bytes([packet[0], packet[1], packet[2], packet[3]]) as usize;
        if declared != packet.len() - LENGTH_FIELD {
            return Err(SealError::ContractViolation(format!(
                "packet_length {} does not match {} bytes supplied",
                declared,
                packet.len() - LENGTH_FIELD
            )));
        }

        if let Some(cipher) = self.cipher.as_deref() {
            let block = (cipher.minimum_size() as usize).max(1);
            let aligned = match self.ordering {
                MacOrdering::EncryptAndMac => packet.len(),
                MacOrdering::EncryptThenMac => packet.len() - LENGTH_FIELD,
            };
            if aligned % block != 0 {
                return Err(SealError::ContractViolation(format!(
                    "Packet region of {} bytes is not a multiple of the {} byte cipher block",
                    aligned, block
                )));
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for PacketEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketEncryptor")
            .field("ordering", &self.ordering)
            .field("has_cipher", &self.cipher.is_some())
            .field("has_mac", &self.mac.is_some())
            .field("padding_multiplier", &self.padding_multiplier)
            .field("disposed", &self.disposed)
            .finish()
    }
}

/// Result of reading the start of an inbound packet.
///
/// Must be handed back to [`PacketDecryptor::read_body`] for the same
/// packet.
pub struct PacketHeader {
    packet_length: usize,
    /// Header bytes in clear. Holds the decrypted first block for
    /// encrypt-and-MAC with a cipher.
    clear: Zeroizing<Vec<u8>>,
}

impl PacketHeader {
    /// Declared `packet_length`.
    pub fn packet_length(&self) -> usize {
        self.packet_length
    }
}

impl std::fmt::Debug for PacketHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketHeader")
            .field("packet_length", &self.packet_length)
            .finish_non_exhaustive()
    }
}

/// Inbound packet protection for one direction.
pub struct PacketDecryptor {
    ordering: MacOrdering,
    cipher: Option<Box<dyn PacketCipher>>,
    mac: Option<Box<dyn PacketMac>>,
    padding_multiplier: u8,
    config: PacketConfig,
    disposed: bool,
}

impl PacketDecryptor {
    /// Creates a decryptor owning `cipher` and `mac`, with default limits.
    pub fn new(
        ordering: MacOrdering,
        cipher: Option<Box<dyn PacketCipher>>,
        mac: Option<Box<dyn PacketMac>>,
    ) -> Self {
        Self::with_config(ordering, cipher, mac, PacketConfig::default())
    }

    /// Creates a decryptor enforcing the limits in `config`.
    pub fn with_config(
        ordering: MacOrdering,
        cipher: Option<Box<dyn PacketCipher>>,
        mac: Option<Box<dyn PacketMac>>,
        config: PacketConfig,
    ) -> Self {
        Self {
            ordering,
            padding_multiplier: padding_multiplier_for(cipher.as_deref()),
            cipher,
            mac,
            config,
            disposed: false,
        }
    }

    /// Creates a decryptor from negotiated algorithms and derived keys.
    pub fn from_negotiated(
        cipher: Option<CipherAlgorithm>,
        key: &[u8],
        iv: &[u8],
        hash_info: Option<&HashInfo>,
        mac_key: &[u8],
    ) -> SealResult<Self> {
        let (ordering, cipher, mac) = build_negotiated(cipher, key, iv, hash_info, mac_key)?;
        Ok(Self::new(ordering, cipher, mac))
    }

    /// Alignment inbound packets are expected to have.
    pub fn padding_multiplier(&self) -> u8 {
        self.padding_multiplier
    }

    /// Cipher and MAC ordering.
    pub fn ordering(&self) -> MacOrdering {
        self.ordering
    }

    /// Length of the MAC trailing each packet.
    pub fn mac_size(&self) -> usize {
        self.mac.as_ref().map_or(0, |m| m.mac_size())
    }

    /// Bytes [`Self::read_header`] needs.
    ///
    /// The length field alone when it travels in clear, otherwise the first
    /// [`Self::padding_multiplier`] bytes, which is never less than the length
    /// field.
    pub fn header_len(&self) -> usize {
        match (self.ordering, self.cipher.is_some()) {
            (MacOrdering::EncryptAndMac, true) => {
                (self.padding_multiplier as usize).max(LENGTH_FIELD)
            }
            _ => LENGTH_FIELD,
        }
    }

    /// Reads and validates `packet_length`.
    ///
    /// Exactly [`Self::header_len`] bytes are consumed; extra bytes are
    /// ignored. For encrypt-and-MAC with a cipher the first block is
    /// decrypted here.
    ///
    /// # Errors
    ///
    /// - [`SealError::IncompleteData`] if `data` is shorter than
    ///   [`Self::header_len`]. No state is changed.
    /// - [`SealError::MalformedInput`] for a length that is too small, too
    ///   large or misaligned.
    /// - [`SealError::ContractViolation`] after [`Self::dispose`].
    pub fn read_header(&mut self, data: &[u8]) -> SealResult<PacketHeader> {
        self.check_live()?;

        let needed = self.header_len();
        if data.len() < needed {
            return Err(SealError::IncompleteData {
                needed,
                available: data.len(),
            });
        }

        let mut clear = Zeroizing::new(data[..needed].to_vec());
        if let (MacOrdering::EncryptAndMac, Some(cipher)) =
            (self.ordering, self.cipher.as_mut())
        {
            cipher.decrypt(&mut clear);
        }

        let packet_length = u32::from_be_bytes([clear[0], clear[1], clear[2], clear[3]]) as usize;
        self.check_length(packet_length)?;

        Ok(PacketHeader {
            packet_length,
            clear,
        })
    }

    /// Bytes still to read after the header, MAC included.
    pub fn remaining_len(&self, header: &PacketHeader) -> usize {
        LENGTH_FIELD + header.packet_length - header.clear.len() + self.mac_size()
    }

    /// Verifies and decrypts the rest of a packet.
    ///
    /// `body` must be exactly [`Self::remaining_len`] bytes.
    ///
    /// # Errors
    ///
    /// - [`SealError::IncompleteData`] if `body` is short. No state is
    ///   changed; call again with the same `header` once more bytes arrive.
    /// - [`SealError::MalformedInput`] if `body` is too long or the
    ///   decrypted padding is invalid.
    /// - [`SealError::IntegrityFailure`] on MAC mismatch.
    pub fn read_body(
        &mut self,
        sequence_number: u32,
        header: &PacketHeader,
        body: &[u8],
    ) -> SealResult<Packet> {
        self.check_live()?;

        let expected = self.remaining_len(header);
        if body.len() < expected {
            return Err(SealError::IncompleteData {
                needed: expected,
                available: body.len(),
            });
        }
        if body.len() > expected {
            return Err(SealError::MalformedInput(format!(
                "Packet body of {} bytes, expected {}",
                body.len(),
                expected
            )));
        }

        let (encrypted, received_mac) = body.split_at(expected - self.mac_size());
        let mut plaintext = Zeroizing::new(Vec::with_capacity(LENGTH_FIELD + header.packet_length));
        plaintext.extend_from_slice(&header.clear);
        plaintext.extend_from_slice(encrypted);

        match self.ordering {
            MacOrdering::EncryptThenMac => {
                self.verify_mac(sequence_number, &plaintext, received_mac)?;
                if let Some(cipher) = self.cipher.as_mut() {
                    cipher.decrypt(&mut plaintext[LENGTH_FIELD..]);
                }
            }
            MacOrdering::EncryptAndMac => {
                if let Some(cipher) = self.cipher.as_mut() {
                    let start = header.clear.len();
                    cipher.decrypt(&mut plaintext[start..]);
                }
                self.verify_mac(sequence_number, &plaintext, received_mac)?;
            }
        }

        let mut packet = Packet::parse(&plaintext, &self.config)?;
        if !received_mac.is_empty() {
            packet.set_mac(received_mac.to_vec());
        }

        logging::log_packet_opened(
            sequence_number,
            header.packet_length,
            packet.payload().len(),
            self.ordering.is_encrypt_then_mac(),
        );
        Ok(packet)
    }

    /// Releases cipher and MAC key material. Later calls fail.
    pub fn dispose(&mut self) {
        self.cipher = None;
        self.mac = None;
        self.disposed = true;
    }

    /// True once [`Self::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn check_live(&self) -> SealResult<()> {
        if self.disposed {
            return Err(SealError::ContractViolation(
                "Packet decryptor used after dispose".to_string(),
            ));
        }
        Ok(())
    }

    fn check_length(&self, packet_length: usize) -> SealResult<()> {
        let reject = |reason: String| {
            logging::log_packet_rejected(packet_length, &reason);
            Err(SealError::MalformedInput(reason))
        };

        if packet_length < MIN_PACKET_LENGTH {
            return reject(format!("packet_length {} is too small", packet_length));
        }
        if packet_length > self.config.max_packet_size {
            return reject(format!(
                "packet_length {} exceeds maximum {}",
                packet_length, self.config.max_packet_size
            ));
        }

        if let Some(cipher) = self.cipher.as_deref() {
            let block = (cipher.minimum_size() as usize).max(1);
            let aligned = match self.ordering {
                MacOrdering::EncryptAndMac => LENGTH_FIELD + packet_length,
                MacOrdering::EncryptThenMac => packet_length,
            };
            if aligned % block != 0 {
                return reject(format!(
                    "packet_length {} is not aligned to the {} byte cipher block",
                    packet_length, block
                ));
            }
        }

        Ok(())
    }

    fn verify_mac(&self, sequence_number: u32, data: &[u8], received: &[u8]) -> SealResult<()> {
        match self.mac.as_ref() {
            Some(mac) => mac.verify(sequence_number, data, received).map_err(|e| {
                if e.is_integrity_failure() {
                    logging::log_integrity_failure(sequence_number);
                }
                e
            }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for PacketDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketDecryptor")
            .field("ordering", &self.ordering)
            .field("has_cipher", &self.cipher.is_some())
            .field("has_mac", &self.mac.is_some())
            .field("padding_multiplier", &self.padding_multiplier)
            .field("config", &self.config)
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::crypto::MacAlgorithm;

    const KEY: [u8; 32] = [0x5A; 32];
    const IV: [u8; 16] = [0xC3; 16];
    const MAC_KEY: [u8; 64] = [0x77; 64];

    fn pair(
        cipher: Option<CipherAlgorithm>,
        mac: Option<MacAlgorithm>,
    ) -> (PacketEncryptor, PacketDecryptor) {
        let info = mac.map(HashInfo::for_algorithm);
        let tx = PacketEncryptor::from_negotiated(cipher, &KEY, &IV, info.as_ref(), &MAC_KEY)
            .unwrap();
        let rx = PacketDecryptor::from_negotiated(cipher, &KEY, &IV, info.as_ref(), &MAC_KEY)
            .unwrap();
        (tx, rx)
    }

    fn open(rx: &mut PacketDecryptor, seq: u32, wire: &[u8]) -> SealResult<Packet> {
        let header = rx.read_header(wire)?;
        let body = &wire[rx.header_len()..];
        rx.read_body(seq, &header, body)
    }

    fn seal(tx: &mut PacketEncryptor, seq: u32, payload: &[u8]) -> Vec<u8> {
        let packet = Packet::with_padding(
            payload.to_vec(),
            tx.padding_multiplier(),
            tx.ordering().is_encrypt_then_mac(),
        );
        tx.encrypt(seq, packet.to_bytes()).unwrap()
    }

    #[test]
    fn test_round_trip_all_combinations() {
        let ciphers = [
            None,
            Some(CipherAlgorithm::Aes128Ctr),
            Some(CipherAlgorithm::Aes256Ctr),
            Some(CipherAlgorithm::Aes192Cbc),
        ];
        let macs = [
            None,
            Some(MacAlgorithm::HmacSha1),
            Some(MacAlgorithm::HmacSha1_96),
            Some(MacAlgorithm::HmacSha2_512),
            Some(MacAlgorithm::HmacSha2_256Etm),
            Some(MacAlgorithm::HmacSha1Etm),
        ];

        for cipher in ciphers {
            for mac in macs {
                let (mut tx, mut rx) = pair(cipher, mac);
                for (seq, len) in [0usize, 1, 15, 16, 17, 100, 1000].iter().enumerate() {
                    let payload: Vec<u8> = (0..*len).map(|i| i as u8).collect();
                    let wire = seal(&mut tx, seq as u32, &payload);
                    let opened = open(&mut rx, seq as u32, &wire).unwrap_or_else(|e| {
                        panic!("{:?}/{:?} len {}: {}", cipher, mac, len, e)
                    });
                    assert_eq!(opened.payload(), &payload[..]);
                }
            }
        }
    }

    #[test]
    fn test_padding_multiplier() {
        let (tx, rx) = pair(None, None);
        assert_eq!(tx.padding_multiplier(), 8);
        assert_eq!(rx.padding_multiplier(), 8);

        let (tx, _) = pair(Some(CipherAlgorithm::Aes128Ctr), None);
        assert_eq!(tx.padding_multiplier(), 16);
    }

    #[test]
    fn test_none_none_is_identity() {
        for ordering in [MacOrdering::EncryptAndMac, MacOrdering::EncryptThenMac] {
            let mut tx = PacketEncryptor::new(ordering, None, None);
            let packet = Packet::new(b"plain".to_vec()).to_bytes();
            assert_eq!(tx.encrypt(0, packet.clone()).unwrap(), packet);
        }
    }

    #[test]
    fn test_etm_leaves_length_in_clear() {
        let (mut tx, _) = pair(
            Some(CipherAlgorithm::Aes128Ctr),
            Some(MacAlgorithm::HmacSha2_256Etm),
        );
        let packet = Packet::with_padding(b"payload".to_vec(), 16, true).to_bytes();
        let wire = tx.encrypt(1, packet.clone()).unwrap();
        assert_eq!(&wire[..4], &packet[..4]);
        assert_ne!(&wire[4..packet.len()], &packet[4..]);
        assert_eq!(wire.len(), packet.len() + 32);
    }

    #[test]
    fn test_encrypt_and_mac_transforms_length() {
        let (mut tx, _) = pair(Some(CipherAlgorithm::Aes128Ctr), Some(MacAlgorithm::HmacSha1));
        let packet = Packet::with_padding(b"payload".to_vec(), 16, false).to_bytes();
        let wire = tx.encrypt(1, packet.clone()).unwrap();
        assert_ne!(&wire[..4], &packet[..4]);
        assert_eq!(wire.len(), packet.len() + 20);
    }

    #[test]
    fn test_tampered_ciphertext_is_integrity_failure() {
        for mac in [MacAlgorithm::HmacSha1, MacAlgorithm::HmacSha2_256Etm] {
            let (mut tx, mut rx) = pair(Some(CipherAlgorithm::Aes128Ctr), Some(mac));
            let mut wire = seal(&mut tx, 9, b"sensitive");
            let last_ct = wire.len() - rx.mac_size() - 1;
            wire[last_ct] ^= 0x01;
            assert!(matches!(
                open(&mut rx, 9, &wire),
                Err(SealError::IntegrityFailure)
            ));
        }
    }

    #[test]
    fn test_wrong_sequence_number_is_integrity_failure() {
        let (mut tx, mut rx) = pair(None, Some(MacAlgorithm::HmacSha2_256));
        let wire = seal(&mut tx, 1, b"data");
        assert!(open(&mut rx, 2, &wire).unwrap_err().is_integrity_failure());
    }

    #[test]
    fn test_short_header_is_incomplete() {
        let (mut tx, mut rx) = pair(Some(CipherAlgorithm::Aes128Ctr), Some(MacAlgorithm::HmacSha1));
        let wire = seal(&mut tx, 0, b"x");

        let err = rx.read_header(&wire[..3]).unwrap_err();
        assert!(matches!(
            err,
            SealError::IncompleteData {
                needed: 16,
                available: 3
            }
        ));

        // Nothing was consumed, so the full packet still opens
        assert_eq!(open(&mut rx, 0, &wire).unwrap().payload(), b"x");
    }

    #[test]
    fn test_short_body_is_incomplete_and_retryable() {
        let (mut tx, mut rx) = pair(
            Some(CipherAlgorithm::Aes256Ctr),
            Some(MacAlgorithm::HmacSha2_512Etm),
        );
        let wire = seal(&mut tx, 4, b"retry me");

        let header = rx.read_header(&wire).unwrap();
        let body = &wire[rx.header_len()..];
        let short = rx.read_body(4, &header, &body[..body.len() - 1]).unwrap_err();
        assert!(short.is_incomplete());
        assert_eq!(rx.read_body(4, &header, body).unwrap().payload(), b"retry me");
    }

    #[test]
    fn test_encrypt_and_mac_body_retry_keeps_cipher_state() {
        let (mut tx, mut rx) = pair(Some(CipherAlgorithm::Aes128Ctr), Some(MacAlgorithm::HmacSha1));
        let first = seal(&mut tx, 0, b"first packet");
        let second = seal(&mut tx, 1, b"second packet");

        // The first block is decrypted by read_header, so the header must be
        // reused rather than read again
        let (head, rest) = first.split_at(rx.header_len());
        let header = rx.read_header(head).unwrap();
        assert_eq!(rx.remaining_len(&header), rest.len());

        let err = rx.read_body(0, &header, &rest[..rest.len() - 1]).unwrap_err();
        assert!(matches!(
            err,
            SealError::IncompleteData { needed, available }
                if needed == rest.len() && available == rest.len() - 1
        ));

        let opened = rx.read_body(0, &header, rest).unwrap();
        assert_eq!(opened.payload(), b"first packet");

        // The CTR keystream stayed in step with the sender
        assert_eq!(open(&mut rx, 1, &second).unwrap().payload(), b"second packet");
    }

    /// Byte-wise stream cipher with a configurable reported block size.
    struct XorCipher {
        block: u8,
        key: u8,
    }

    impl PacketCipher for XorCipher {
        fn minimum_size(&self) -> u8 {
            self.block
        }

        fn encrypt(&mut self, data: &mut [u8]) {
            data.iter_mut().for_each(|b| *b ^= self.key);
        }

        fn decrypt(&mut self, data: &mut [u8]) {
            self.encrypt(data);
        }
    }

    fn xor_pair(block: u8) -> (PacketEncryptor, PacketDecryptor) {
        let cipher = |block| Some(Box::new(XorCipher { block, key: 0x5C }) as Box<dyn PacketCipher>);
        (
            PacketEncryptor::new(MacOrdering::EncryptAndMac, cipher(block), None),
            PacketDecryptor::new(MacOrdering::EncryptAndMac, cipher(block), None),
        )
    }

    #[test]
    fn test_small_block_cipher_reads_full_header() {
        for block in [0u8, 1, 2, 3] {
            let (mut tx, mut rx) = xor_pair(block);
            assert_eq!(rx.padding_multiplier(), 8);
            assert_eq!(rx.header_len(), 8);

            // Decrypts to an oversized packet_length, rejected without panicking
            assert!(matches!(
                rx.read_header(&[0u8; 64]),
                Err(SealError::MalformedInput(_))
            ));
            assert!(rx.read_header(&[0u8; 7]).unwrap_err().is_incomplete());

            let wire = seal(&mut tx, 0, b"stream");
            assert_eq!(open(&mut rx, 0, &wire).unwrap().payload(), b"stream");
        }
    }

    #[test]
    fn test_overlong_body_is_malformed() {
        let (mut tx, mut rx) = pair(None, None);
        let mut wire = seal(&mut tx, 0, b"abc");
        wire.push(0);
        assert!(matches!(
            open(&mut rx, 0, &wire),
            Err(SealError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let (_, mut rx) = pair(None, None);
        let header = [0x00, 0x01, 0x00, 0x00];
        assert!(matches!(
            rx.read_header(&header),
            Err(SealError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_configured_maximum_enforced() {
        let config = PacketConfig::builder()
            .with_max_packet_size(64)
            .build()
            .unwrap();
        let mut rx = PacketDecryptor::with_config(MacOrdering::EncryptAndMac, None, None, config);
        let packet = Packet::new(vec![0u8; 80]).to_bytes();
        assert!(matches!(
            rx.read_header(&packet),
            Err(SealError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_misaligned_length_rejected() {
        let (_, mut rx) = pair(Some(CipherAlgorithm::Aes128Ctr), None);
        // packet_length 13 is not aligned for ETM or EAM with 16 byte blocks
        let mut rx_etm = PacketDecryptor::new(
            MacOrdering::EncryptThenMac,
            Some(CipherAlgorithm::Aes128Ctr.create(&KEY, &IV).unwrap()),
            None,
        );
        assert!(matches!(
            rx_etm.read_header(&[0, 0, 0, 13]),
            Err(SealError::MalformedInput(_))
        ));
        // Random first block decrypts to an implausible length
        assert!(rx.read_header(&[0xFF; 16]).is_err());
    }

    #[test]
    fn test_bad_padding_after_mac_is_malformed() {
        let mut tx = PacketEncryptor::new(MacOrdering::EncryptAndMac, None, None);
        let mut rx = PacketDecryptor::new(MacOrdering::EncryptAndMac, None, None);
        // padding_length 2 is below the RFC minimum
        let bad = vec![0, 0, 0, 8, 2, b'h', b'e', b'l', b'l', b'o', 0, 0];
        let wire = tx.encrypt(0, bad).unwrap();
        assert!(matches!(
            open(&mut rx, 0, &wire),
            Err(SealError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_misaligned_outbound_packet_is_contract_violation() {
        let (mut tx, _) = pair(Some(CipherAlgorithm::Aes128Ctr), None);
        // 5 + 8 + 11 = 24 bytes: aligned to 8 but not to 16
        let packet = Packet::with_padding(b"abcdefgh".to_vec(), 8, false).to_bytes();
        assert_eq!(packet.len(), 24);
        assert!(matches!(
            tx.encrypt(0, packet),
            Err(SealError::ContractViolation(_))
        ));

        let mismatched = vec![0, 0, 0, 99, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            tx.encrypt(0, mismatched),
            Err(SealError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_use_after_dispose_fails() {
        let (mut tx, mut rx) = pair(Some(CipherAlgorithm::Aes128Ctr), Some(MacAlgorithm::HmacSha1));
        let wire = seal(&mut tx, 0, b"x");

        tx.dispose();
        rx.dispose();
        assert!(tx.is_disposed());
        assert_eq!(tx.mac_size(), 0);

        let packet = Packet::new(b"x".to_vec()).to_bytes();
        assert!(matches!(
            tx.encrypt(1, packet),
            Err(SealError::ContractViolation(_))
        ));
        assert!(matches!(
            rx.read_header(&wire),
            Err(SealError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_debug_hides_keys() {
        let (tx, rx) = pair(Some(CipherAlgorithm::Aes128Ctr), Some(MacAlgorithm::HmacSha1));
        assert!(format!("{:?}", tx).contains("has_cipher: true"));
        assert!(format!("{:?}", rx).contains("has_mac: true"));
    }
}
