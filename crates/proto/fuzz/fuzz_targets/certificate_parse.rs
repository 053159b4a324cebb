//! Fuzz target for OpenSSH certificate parsing.
//!
//! Run with:
//! ```bash
//! cd crates/proto
//! cargo +nightly fuzz run certificate_parse -- -max_total_time=300
//! ```

#![no_main]
use libfuzzer_sys::fuzz_target;
use sealwire_proto::ssh::certificate::Certificate;
use sealwire_proto::ssh::hostkey::HostKeyAlgorithms;

fuzz_target!(|data: &[u8]| {
    if let Ok(cert) = Certificate::parse(data) {
        // Parsed certificates keep their exact bytes
        assert_eq!(cert.bytes(), data);
        assert!(cert.bytes_for_signature().len() < data.len());

        let _ = cert.signature_key_algorithm_name();
        let _ = HostKeyAlgorithms::with_defaults().create(cert.name(), cert.signature_key());
    }
});
