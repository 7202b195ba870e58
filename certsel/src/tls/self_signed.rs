//! In-memory self-signed certificates, used as a last-resort fallback

use super::{CertError, Certificate};
use thiserror::Error;

/// Errors that can occur during self-signed cert generation
#[derive(Debug, Error)]
pub enum SelfSignedError {
    #[error("Failed to generate certificate: {0}")]
    GenerationError(String),

    #[error("Generated certificate is unusable: {0}")]
    Certificate(#[from] CertError),
}

/// Generator for self-signed certificates
#[derive(Debug, Clone)]
pub struct SelfSignedGenerator {
    organization: String,
}

impl Default for SelfSignedGenerator {
    fn default() -> Self {
        Self::new("certsel")
    }
}

impl SelfSignedGenerator {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
        }
    }

    /// Generate a self-signed certificate for a hostname.
    ///
    /// `localhost` also covers `*.localhost` and the loopback addresses.
    pub fn generate(&self, domain: &str) -> Result<Certificate, SelfSignedError> {
        if domain.trim().is_empty() {
            return Err(SelfSignedError::GenerationError(
                "domain must not be empty".to_string(),
            ));
        }

        use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};

        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, domain);
        dn.push(DnType::OrganizationName, self.organization.as_str());
        params.distinguished_name = dn;

        let dns_name = domain.try_into().map_err(|e| {
            SelfSignedError::GenerationError(format!("Invalid DNS name '{}': {}", domain, e))
        })?;
        params.subject_alt_names = vec![SanType::DnsName(dns_name)];

        if domain == "localhost" {
            let wildcard = "*.localhost".try_into().map_err(|e| {
                SelfSignedError::GenerationError(format!("Invalid DNS name '*.localhost': {}", e))
            })?;
            params.subject_alt_names.push(SanType::DnsName(wildcard));
            params
                .subject_alt_names
                .push(SanType::IpAddress(std::net::IpAddr::V4(
                    std::net::Ipv4Addr::LOCALHOST,
                )));
            params
                .subject_alt_names
                .push(SanType::IpAddress(std::net::IpAddr::V6(
                    std::net::Ipv6Addr::LOCALHOST,
                )));
        }

        let key_pair = KeyPair::generate().map_err(|e| {
            SelfSignedError::GenerationError(format!("Failed to generate key pair: {}", e))
        })?;

        let cert = params.self_signed(&key_pair).map_err(|e| {
            SelfSignedError::GenerationError(format!("Failed to generate certificate: {}", e))
        })?;

        let certificate =
            Certificate::from_pem(cert.pem().as_bytes(), key_pair.serialize_pem().as_bytes())?;

        tracing::info!(
            domain = %domain,
            thumbprint = %certificate.thumbprint(),
            "Generated self-signed certificate"
        );

        Ok(certificate)
    }
}
