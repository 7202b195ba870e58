//! Certificate record - key material plus the metadata selection needs

use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use x509_parser::prelude::*;

use super::domain::normalize_domain;

/// Errors that can occur while building a certificate record
#[derive(Debug, Error)]
pub enum CertError {
    #[error("No certificate found in PEM data")]
    NoCertificate,

    #[error("Failed to parse certificate: {0}")]
    ParseError(String),

    #[error("Private key does not match certificate public key")]
    KeyMismatch,

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An installed-ready certificate: leaf, intermediates, private key and derived metadata.
///
/// Records are immutable. Replacing a certificate means installing a new record.
pub struct Certificate {
    leaf: X509,
    chain: Vec<X509>,
    private_key: PKey<Private>,
    domain_names: Vec<String>,
    common_name: Option<String>,
    not_after: SystemTime,
    thumbprint: String,
    is_self_signed: bool,
}

impl Certificate {
    /// Build a record from already-parsed OpenSSL objects
    pub fn from_parts(
        leaf: X509,
        chain: Vec<X509>,
        private_key: PKey<Private>,
    ) -> Result<Self, CertError> {
        if !leaf.public_key()?.public_eq(&private_key) {
            return Err(CertError::KeyMismatch);
        }

        let der = leaf.to_der()?;
        let (_, parsed) =
            X509Certificate::from_der(&der).map_err(|e| CertError::ParseError(e.to_string()))?;

        let common_name = parsed
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);

        // CN first, then the SAN DNS entries
        let mut domain_names = Vec::new();
        if let Some(cn) = common_name.as_deref().filter(|cn| looks_like_host(cn)) {
            push_unique(&mut domain_names, cn);
        }
        let san = parsed
            .subject_alternative_name()
            .map_err(|e| CertError::ParseError(e.to_string()))?;
        if let Some(san) = san {
            for name in &san.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    push_unique(&mut domain_names, dns);
                }
            }
        }

        let not_after = system_time_from_unix(parsed.validity().not_after.timestamp());
        let is_self_signed = parsed.issuer() == parsed.subject();
        let thumbprint = hex::encode_upper(Sha256::digest(&der));

        Ok(Self {
            leaf,
            chain,
            private_key,
            domain_names,
            common_name,
            not_after,
            thumbprint,
            is_self_signed,
        })
    }

    /// Parse a PEM bundle (leaf first, then intermediates) and a PEM private key
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, CertError> {
        let mut certs = X509::stack_from_pem(cert_pem)?.into_iter();
        let leaf = certs.next().ok_or(CertError::NoCertificate)?;
        let chain = certs.collect();
        let private_key = PKey::private_key_from_pem(key_pem)?;

        Self::from_parts(leaf, chain, private_key)
    }

    /// Load certificate chain and key from PEM files
    pub fn from_files(cert_path: &Path, key_path: &Path) -> Result<Self, CertError> {
        let cert_pem = std::fs::read(cert_path)?;
        let key_pem = std::fs::read(key_path)?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    pub fn leaf(&self) -> &X509 {
        &self.leaf
    }

    /// Intermediate certificates, in the order they were supplied
    pub fn chain(&self) -> &[X509] {
        &self.chain
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    /// Lower-cased domain patterns this certificate is registered under
    pub fn domain_names(&self) -> &[String] {
        &self.domain_names
    }

    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    pub fn not_after(&self) -> SystemTime {
        self.not_after
    }

    /// Upper-case hex SHA-256 of the leaf DER
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn is_self_signed(&self) -> bool {
        self.is_self_signed
    }

    /// Check if certificate is expired
    pub fn is_expired(&self) -> bool {
        SystemTime::now() > self.not_after
    }

    /// Days until expiry (negative once expired)
    pub fn days_until_expiry(&self) -> i64 {
        match self.not_after.duration_since(SystemTime::now()) {
            Ok(duration) => (duration.as_secs() / 86400) as i64,
            Err(e) => -(e.duration().as_secs() as i64 / 86400),
        }
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("common_name", &self.common_name)
            .field("domain_names", &self.domain_names)
            .field("not_after", &self.not_after)
            .field("thumbprint", &self.thumbprint)
            .field("is_self_signed", &self.is_self_signed)
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    let name = normalize_domain(name.trim()).into_owned();
    if !name.is_empty() && !names.contains(&name) {
        names.push(name);
    }
}

// Subject CNs are often organisation names rather than hosts.
fn looks_like_host(cn: &str) -> bool {
    !cn.is_empty()
        && cn
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '*' | '_'))
}

fn system_time_from_unix(timestamp: i64) -> SystemTime {
    if timestamp >= 0 {
        UNIX_EPOCH + Duration::from_secs(timestamp as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(timestamp.unsigned_abs())
    }
}
