//! Block cipher chaining modes.
//!
//! [`CipherMode`] binds a [`BlockCipher`] to a chaining mode and an IV and
//! processes exactly one block per call. The running IV (or counter) is
//! mutated by every call, so calls on one instance must be serialized by the
//! owner. `&mut self` on every operation makes that a compile-time property.
//!
//! Supported modes:
//!
//! - **CBC**: `out = E(in ^ iv); iv = out` and `out = D(in) ^ iv; iv = in`
//! - **CTR** (RFC 4344): `out = in ^ E(counter)`, the counter being the IV
//!   taken as one big-endian integer and incremented modulo 2^(8 * block size)
//!
//! Block-size disagreements between the cipher, IV, input and output are
//! caller bugs and panic.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use sealwire_platform::{SealError, SealResult};
use zeroize::Zeroizing;

/// A raw block cipher primitive.
pub trait BlockCipher: Send {
    /// Block size in bytes.
    fn block_size(&self) -> usize;

    /// Encrypts one block in place. `block.len()` equals [`Self::block_size`].
    fn encrypt_block(&self, block: &mut [u8]);

    /// Decrypts one block in place. `block.len()` equals [`Self::block_size`].
    fn decrypt_block(&self, block: &mut [u8]);
}

/// AES with a 128, 192 or 256 bit key.
///
/// Round keys are zeroized on drop by the `aes` crate.
pub enum AesBlockCipher {
    /// AES-128
    Aes128(aes::Aes128),
    /// AES-192
    Aes192(aes::Aes192),
    /// AES-256
    Aes256(aes::Aes256),
}

impl AesBlockCipher {
    /// AES block size in bytes.
    pub const BLOCK_SIZE: usize = 16;

    /// Creates an AES instance, selecting the variant from the key length.
    pub fn new(key: &[u8]) -> SealResult<Self> {
        let invalid =
            |_| SealError::InvalidKeyData(format!("Invalid AES key length: {}", key.len()));

        match key.len() {
            16 => aes::Aes128::new_from_slice(key)
                .map(Self::Aes128)
                .map_err(invalid),
            24 => aes::Aes192::new_from_slice(key)
                .map(Self::Aes192)
                .map_err(invalid),
            32 => aes::Aes256::new_from_slice(key)
                .map(Self::Aes256)
                .map_err(invalid),
            n => Err(SealError::InvalidKeyData(format!(
                "Invalid AES key length: {}",
                n
            ))),
        }
    }
}

impl BlockCipher for AesBlockCipher {
    fn block_size(&self) -> usize {
        Self::BLOCK_SIZE
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let block = aes::Block::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let block = aes::Block::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.decrypt_block(block),
            Self::Aes192(c) => c.decrypt_block(block),
            Self::Aes256(c) => c.decrypt_block(block),
        }
    }
}

impl std::fmt::Debug for AesBlockCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bits = match self {
            Self::Aes128(_) => 128,
            Self::Aes192(_) => 192,
            Self::Aes256(_) => 256,
        };
        f.debug_struct("AesBlockCipher")
            .field("bits", &bits)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Chaining mode applied on top of a block cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainingMode {
    /// Cipher block chaining
    Cbc,
    /// SSH counter mode (RFC 4344)
    Ctr,
}

/// A block cipher bound to a chaining mode and its running IV.
pub struct CipherMode {
    mode: ChainingMode,
    cipher: Box<dyn BlockCipher>,
    iv: Zeroizing<Vec<u8>>,
    scratch: Zeroizing<Vec<u8>>,
}

impl CipherMode {
    /// Binds `cipher` to `mode`, keeping the first `block_size` bytes of `iv`.
    ///
    /// An IV shorter than the block size is rejected.
    pub fn new(mode: ChainingMode, cipher: Box<dyn BlockCipher>, iv: &[u8]) -> SealResult<Self> {
        let block_size = cipher.block_size();
        if iv.len() < block_size {
            return Err(SealError::InvalidKeyData(format!(
                "IV too short: expected {}, got {}",
                block_size,
                iv.len()
            )));
        }

        Ok(Self {
            mode,
            cipher,
            iv: Zeroizing::new(iv[..block_size].to_vec()),
            scratch: Zeroizing::new(vec![0u8; block_size]),
        })
    }

    /// Returns the chaining mode.
    pub fn mode(&self) -> ChainingMode {
        self.mode
    }

    /// Returns the block size in bytes.
    pub fn block_size(&self) -> usize {
        self.iv.len()
    }

    /// Encrypts exactly one block from `input` into `output`.
    ///
    /// Returns the number of bytes processed.
    ///
    /// # Panics
    ///
    /// Panics if either slice is not exactly one block long.
    pub fn encrypt_block(&mut self, input: &[u8], output: &mut [u8]) -> usize {
        self.check_block(input, output);

        match self.mode {
            ChainingMode::Cbc => {
                xor_block(&mut self.scratch, input, &self.iv);
                self.cipher.encrypt_block(&mut self.scratch);
                output.copy_from_slice(&self.scratch);
                self.iv.copy_from_slice(&self.scratch);
            }
            ChainingMode::Ctr => self.apply_keystream(input, output),
        }

        self.iv.len()
    }

    /// Decrypts exactly one block from `input` into `output`.
    ///
    /// Returns the number of bytes processed.
    ///
    /// # Panics
    ///
    /// Panics if either slice is not exactly one block long.
    pub fn decrypt_block(&mut self, input: &[u8], output: &mut [u8]) -> usize {
        self.check_block(input, output);

        match self.mode {
            ChainingMode::Cbc => {
                self.scratch.copy_from_slice(input);
                self.cipher.decrypt_block(&mut self.scratch);
                xor_block(output, &self.scratch, &self.iv);
                self.iv.copy_from_slice(input);
            }
            ChainingMode::Ctr => self.apply_keystream(input, output),
        }

        self.iv.len()
    }

    /// Encrypts a whole number of blocks in place.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not a multiple of the block size.
    pub fn encrypt_in_place(&mut self, data: &mut [u8]) {
        self.process_in_place(data, Self::encrypt_block);
    }

    /// Decrypts a whole number of blocks in place.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not a multiple of the block size.
    pub fn decrypt_in_place(&mut self, data: &mut [u8]) {
        self.process_in_place(data, Self::decrypt_block);
    }

    fn process_in_place(&mut self, data: &mut [u8], op: fn(&mut Self, &[u8], &mut [u8]) -> usize) {
        let block_size = self.block_size();
        assert!(
            data.len() % block_size == 0,
            "Data length {} is not a multiple of block size {}",
            data.len(),
            block_size
        );

        let mut input = Zeroizing::new(vec![0u8; block_size]);
        for chunk in data.chunks_exact_mut(block_size) {
            input.copy_from_slice(chunk);
            op(self, &input, chunk);
        }
    }

    fn apply_keystream(&mut self, input: &[u8], output: &mut [u8]) {
        self.scratch.copy_from_slice(&self.iv);
        self.cipher.encrypt_block(&mut self.scratch);
        xor_block(output, input, &self.scratch);
        increment_counter(&mut self.iv);
    }

    fn check_block(&self, input: &[u8], output: &[u8]) {
        let block_size = self.iv.len();
        assert_eq!(
            self.cipher.block_size(),
            block_size,
            "Cipher block size does not match IV length"
        );
        assert_eq!(input.len(), block_size, "Input is not exactly one block");
        assert_eq!(output.len(), block_size, "Output is not exactly one block");
    }
}

impl std::fmt::Debug for CipherMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherMode")
            .field("mode", &self.mode)
            .field("block_size", &self.iv.len())
            .field("iv", &"<redacted>")
            .finish()
    }
}

/// `output = left ^ right`.
///
/// The 8 and 16 byte cases are single word operations; other lengths fall
/// back to a byte loop.
///
/// # Panics
///
/// Panics if the three slices differ in length.
pub fn xor_block(output: &mut [u8], left: &[u8], right: &[u8]) {
    assert!(
        output.len() == left.len() && left.len() == right.len(),
        "xor_block length mismatch"
    );

    if let (Ok(l), Ok(r)) = (<[u8; 16]>::try_from(left), <[u8; 16]>::try_from(right)) {
        let x = u128::from_ne_bytes(l) ^ u128::from_ne_bytes(r);
        output.copy_from_slice(&x.to_ne_bytes());
    } else if let (Ok(l), Ok(r)) = (<[u8; 8]>::try_from(left), <[u8; 8]>::try_from(right)) {
        let x = u64::from_ne_bytes(l) ^ u64::from_ne_bytes(r);
        output.copy_from_slice(&x.to_ne_bytes());
    } else {
        for ((o, l), r) in output.iter_mut().zip(left).zip(right) {
            *o = l ^ r;
        }
    }
}

/// Big-endian increment, wrapping to zero on overflow.
fn increment_counter(counter: &mut [u8]) {
    for byte in counter.iter_mut().rev() {
        let (next, carry) = byte.overflowing_add(1);
        *byte = next;
        if !carry {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        0x0f,
    ];

    fn iv() -> Vec<u8> {
        (0xf0..=0xffu8).collect()
    }

    fn plaintext() -> Vec<u8> {
        (0u8..32).collect()
    }

    fn aes_mode(mode: ChainingMode, iv: &[u8]) -> CipherMode {
        CipherMode::new(mode, Box::new(AesBlockCipher::new(&KEY).unwrap()), iv).unwrap()
    }

    /// Identity "cipher" with an 8 byte block, to exercise mode plumbing.
    struct Identity8;

    impl BlockCipher for Identity8 {
        fn block_size(&self) -> usize {
            8
        }
        fn encrypt_block(&self, _block: &mut [u8]) {}
        fn decrypt_block(&self, _block: &mut [u8]) {}
    }

    #[test]
    fn test_aes_key_lengths() {
        assert!(AesBlockCipher::new(&[0u8; 16]).is_ok());
        assert!(AesBlockCipher::new(&[0u8; 24]).is_ok());
        assert!(AesBlockCipher::new(&[0u8; 32]).is_ok());
        assert!(matches!(
            AesBlockCipher::new(&[0u8; 20]),
            Err(SealError::InvalidKeyData(_))
        ));
    }

    #[test]
    fn test_iv_truncated_to_block_size() {
        let mut long_iv = iv();
        long_iv.extend_from_slice(&[0xAA; 16]);
        let mode = aes_mode(ChainingMode::Ctr, &long_iv);
        assert_eq!(mode.block_size(), 16);
    }

    #[test]
    fn test_short_iv_rejected() {
        let cipher = Box::new(AesBlockCipher::new(&KEY).unwrap());
        let result = CipherMode::new(ChainingMode::Cbc, cipher, &[0u8; 8]);
        assert!(matches!(result, Err(SealError::InvalidKeyData(_))));
    }

    #[test]
    fn test_cbc_known_vector() {
        let mut mode = aes_mode(ChainingMode::Cbc, &iv());
        let mut data = plaintext();
        mode.encrypt_in_place(&mut data);
        assert_eq!(
            hex::encode(&data),
            "753d5eacf88ed4c2c30496112e5f2221380449120c43e61d91c66cae5065cdad"
        );

        let mut mode = aes_mode(ChainingMode::Cbc, &iv());
        mode.decrypt_in_place(&mut data);
        assert_eq!(data, plaintext());
    }

    #[test]
    fn test_ctr_known_vector() {
        let mut mode = aes_mode(ChainingMode::Ctr, &iv());
        let mut data = plaintext();
        mode.encrypt_in_place(&mut data);
        assert_eq!(
            hex::encode(&data),
            "66a6c5eb3057374f9f58d40c3f1ba3a2a290c513a38b2ababcb469a0728101f5"
        );
    }

    #[test]
    fn test_ctr_counter_wraps() {
        let mut mode = aes_mode(ChainingMode::Ctr, &[0xFF; 16]);
        let mut data = plaintext();
        mode.encrypt_in_place(&mut data);
        assert_eq!(
            hex::encode(&data),
            "3c451d31ca0284246cdea892025db51cd6b02924939a4d9577569b79bdd5c666"
        );
    }

    #[test]
    fn test_ctr_decrypt_equals_encrypt() {
        let mut enc = aes_mode(ChainingMode::Ctr, &iv());
        let mut dec = aes_mode(ChainingMode::Ctr, &iv());

        let input = [0x5Au8; 16];
        let mut ct = [0u8; 16];
        let mut pt = [0u8; 16];
        assert_eq!(enc.encrypt_block(&input, &mut ct), 16);
        assert_eq!(dec.decrypt_block(&ct, &mut pt), 16);
        assert_eq!(pt, input);
    }

    #[test]
    fn test_block_granular_matches_in_place() {
        let mut a = aes_mode(ChainingMode::Cbc, &iv());
        let mut b = aes_mode(ChainingMode::Cbc, &iv());

        let input = plaintext();
        let mut blockwise = vec![0u8; 32];
        a.encrypt_block(&input[..16], &mut blockwise[..16]);
        a.encrypt_block(&input[16..], &mut blockwise[16..]);

        let mut in_place = input.clone();
        b.encrypt_in_place(&mut in_place);
        assert_eq!(blockwise, in_place);
    }

    #[test]
    fn test_eight_byte_block_cbc_chaining() {
        let iv = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut mode = CipherMode::new(ChainingMode::Cbc, Box::new(Identity8), &iv).unwrap();

        let mut out = [0u8; 8];
        mode.encrypt_block(&[0u8; 8], &mut out);
        assert_eq!(out, iv);
        // Next block is chained against the previous ciphertext
        mode.encrypt_block(&iv, &mut out);
        assert_eq!(out, [0u8; 8]);
    }

    #[test]
    #[should_panic(expected = "Input is not exactly one block")]
    fn test_block_size_mismatch_panics() {
        let mut mode = aes_mode(ChainingMode::Ctr, &iv());
        let mut out = [0u8; 16];
        mode.encrypt_block(&[0u8; 8], &mut out);
    }

    #[test]
    fn test_xor_block_sizes() {
        for len in [3usize, 8, 16, 24] {
            let left: Vec<u8> = (0..len as u8).collect();
            let right: Vec<u8> = (0..len as u8).map(|b| b.wrapping_mul(7) ^ 0x5A).collect();
            let mut out = vec![0u8; len];
            xor_block(&mut out, &left, &right);
            for i in 0..len {
                assert_eq!(out[i], left[i] ^ right[i]);
            }
        }
    }

    #[test]
    #[should_panic(expected = "xor_block length mismatch")]
    fn test_xor_block_mismatch_panics() {
        let mut out = [0u8; 16];
        xor_block(&mut out, &[0u8; 16], &[0u8; 8]);
    }

    #[test]
    fn test_increment_counter_carries() {
        let mut counter = [0x00, 0xFF, 0xFF];
        increment_counter(&mut counter);
        assert_eq!(counter, [0x01, 0x00, 0x00]);

        let mut counter = [0xFF, 0xFF];
        increment_counter(&mut counter);
        assert_eq!(counter, [0x00, 0x00]);
    }
}
