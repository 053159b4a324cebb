//! Host key algorithm backed by an OpenSSH certificate.
//!
//! A signature is accepted only when both checks pass:
//!
//! 1. the session signature verifies against the certified key;
//! 2. the CA signature inside the certificate verifies against the CA key,
//!    using the algorithm named in the CA signature blob as resolved from a
//!    [`HostKeyAlgorithms`] table.
//!
//! Validity window and principals are not checked here; see
//! [`Certificate::is_valid_at`] and [`Certificate::is_principal_allowed`].

use crate::ssh::certificate::Certificate;
use crate::ssh::hostkey::{
    HostAlgorithm, HostAlgorithmFactory, HostKeyAlgorithm, HostKeyAlgorithms, KeyHostAlgorithm,
    SignatureBlob,
};
use crate::ssh::key::KeyKind;
use crate::ssh::logging;
use sealwire_platform::{SealError, SealResult};
use std::sync::Arc;

/// Certificate algorithm names and the signature algorithm each implies.
pub const CERTIFICATE_ALGORITHMS: [(&str, HostKeyAlgorithm); 8] = [
    ("ssh-ed25519-cert-v01@openssh.com", HostKeyAlgorithm::SshEd25519),
    ("ecdsa-sha2-nistp256-cert-v01@openssh.com", HostKeyAlgorithm::EcdsaSha2Nistp256),
    ("ecdsa-sha2-nistp384-cert-v01@openssh.com", HostKeyAlgorithm::EcdsaSha2Nistp384),
    ("ecdsa-sha2-nistp521-cert-v01@openssh.com", HostKeyAlgorithm::EcdsaSha2Nistp521),
    ("rsa-sha2-512-cert-v01@openssh.com", HostKeyAlgorithm::RsaSha2_512),
    ("rsa-sha2-256-cert-v01@openssh.com", HostKeyAlgorithm::RsaSha2_256),
    ("ssh-rsa-cert-v01@openssh.com", HostKeyAlgorithm::SshRsa),
    ("ssh-dss-cert-v01@openssh.com", HostKeyAlgorithm::SshDss),
];

/// Certificate host key algorithm.
pub struct CertificateHostAlgorithm {
    name: String,
    certificate: Certificate,
    session: KeyHostAlgorithm,
    ca_algorithms: Option<Arc<HostKeyAlgorithms>>,
}

impl CertificateHostAlgorithm {
    /// Binds a certificate to the algorithm used for session signatures.
    ///
    /// `ca_algorithms` resolves the CA signature algorithm.
    pub fn new(
        name: impl Into<String>,
        certificate: Certificate,
        signature_algorithm: HostKeyAlgorithm,
        ca_algorithms: Arc<HostKeyAlgorithms>,
    ) -> SealResult<Self> {
        let mut algorithm = Self::without_ca_table(name, certificate, signature_algorithm)?;
        algorithm.ca_algorithms = Some(ca_algorithms);
        Ok(algorithm)
    }

    /// Like [`new`](Self::new) with no CA table.
    ///
    /// Such an instance can send its certificate but verifying with it is
    /// a contract violation.
    pub fn without_ca_table(
        name: impl Into<String>,
        certificate: Certificate,
        signature_algorithm: HostKeyAlgorithm,
    ) -> SealResult<Self> {
        let session = KeyHostAlgorithm::new(signature_algorithm, certificate.key().clone())?;
        Ok(Self {
            name: name.into(),
            certificate,
            session,
            ca_algorithms: None,
        })
    }

    /// Table factory that parses a certificate blob.
    pub fn factory(
        name: impl Into<String>,
        signature_algorithm: HostKeyAlgorithm,
        ca_algorithms: Arc<HostKeyAlgorithms>,
    ) -> HostAlgorithmFactory {
        let name = name.into();
        Arc::new(move |blob: &[u8]| -> SealResult<Box<dyn HostAlgorithm>> {
            let certificate = Certificate::parse(blob)?;
            Ok(Box::new(CertificateHostAlgorithm::new(
                name.clone(),
                certificate,
                signature_algorithm,
                Arc::clone(&ca_algorithms),
            )?))
        })
    }

    /// Registers every certificate algorithm in `table`.
    ///
    /// CA signatures resolve through `ca_algorithms`.
    pub fn register_all(table: &mut HostKeyAlgorithms, ca_algorithms: Arc<HostKeyAlgorithms>) {
        for (name, signature_algorithm) in CERTIFICATE_ALGORITHMS {
            table.register(
                name,
                Self::factory(name, signature_algorithm, Arc::clone(&ca_algorithms)),
            );
        }
    }

    /// The certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Algorithm used for session signatures.
    pub fn signature_algorithm(&self) -> HostKeyAlgorithm {
        self.session.algorithm()
    }

    fn verify_ca_signature(&self) -> SealResult<bool> {
        let cert = &self.certificate;
        let reject = |algorithm: &str| -> SealResult<bool> {
            logging::log_certificate_verification(cert.key_id(), algorithm, "ca", false);
            Ok(false)
        };

        let blob = match SignatureBlob::parse(cert.signature()) {
            Ok(blob) => blob,
            Err(_) => return reject("<malformed>"),
        };

        // The blob may name any algorithm of the CA key's family
        let blob_kind = HostKeyAlgorithm::from_name(&blob.algorithm).map(|alg| alg.key_kind());
        if blob_kind.is_none() || blob_kind != KeyKind::from_name(cert.signature_key_type()) {
            return reject(&blob.algorithm);
        }

        let table = self.ca_algorithms.as_ref().ok_or_else(|| {
            SealError::ContractViolation(format!(
                "{} has no CA algorithm table to verify with",
                self.name
            ))
        })?;

        let verifier = table.create(&blob.algorithm, cert.signature_key())?;
        let accepted = verifier.verify_signature(cert.bytes_for_signature(), cert.signature())?;
        logging::log_certificate_verification(cert.key_id(), &blob.algorithm, "ca", accepted);
        Ok(accepted)
    }
}

impl HostAlgorithm for CertificateHostAlgorithm {
    fn name(&self) -> &str {
        &self.name
    }

    fn data(&self) -> Vec<u8> {
        self.certificate.bytes().to_vec()
    }

    fn verify_signature(&self, data: &[u8], signature_blob: &[u8]) -> SealResult<bool> {
        let session_ok = self.session.verify_signature(data, signature_blob)?;
        logging::log_certificate_verification(
            self.certificate.key_id(),
            self.session.algorithm().name(),
            "session",
            session_ok,
        );
        if !session_ok {
            return Ok(false);
        }

        self.verify_ca_signature()
    }
}

impl std::fmt::Debug for CertificateHostAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateHostAlgorithm")
            .field("name", &self.name)
            .field("key_id", &self.certificate.key_id())
            .field("signature_algorithm", &self.session.algorithm())
            .field("has_ca_table", &self.ca_algorithms.is_some())
            .finish()
    }
}
