//! Fuzz target for inbound packet decryption.
//!
//! Feeds arbitrary bytes through both MAC orderings. Every input must end
//! in a packet or an error, never a panic.
//!
//! Run with:
//! ```bash
//! cd crates/proto
//! cargo +nightly fuzz run packet_decrypt -- -max_total_time=300
//! ```

#![no_main]
use libfuzzer_sys::fuzz_target;
use sealwire_proto::ssh::crypto::{CipherAlgorithm, MacAlgorithm};
use sealwire_proto::ssh::hash_info::HashInfo;
use sealwire_proto::ssh::packet_crypto::PacketDecryptor;

fuzz_target!(|data: &[u8]| {
    for mac in [MacAlgorithm::HmacSha2_256, MacAlgorithm::HmacSha2_256Etm] {
        let info = HashInfo::for_algorithm(mac);
        let Ok(mut rx) = PacketDecryptor::from_negotiated(
            Some(CipherAlgorithm::Aes128Cbc),
            &[0x42; 16],
            &[0x24; 16],
            Some(&info),
            &[0x11; 32],
        ) else {
            return;
        };

        let Ok(header) = rx.read_header(data) else {
            continue;
        };
        let start = rx.header_len();
        let _ = rx.read_body(0, &header, &data[start..]);
    }
});
