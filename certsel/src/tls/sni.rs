//! SNI-based certificate selection for TLS
//!
//! Plugs the selector into pingora's handshake hook. The callback reads the
//! SNI hostname, asks the selector for a certificate and installs it on the
//! connection together with its intermediates.

use super::{CertSelector, Certificate};
use async_trait::async_trait;
use openssl::ssl::{NameType, SslRef};
use pingora_core::listeners::TlsAccept;
use pingora_core::tls::ext;
use std::sync::Arc;

/// SNI certificate resolver backed by a [`CertSelector`]
pub struct SniCertResolver {
    selector: Arc<CertSelector>,
}

impl SniCertResolver {
    pub fn new(selector: Arc<CertSelector>) -> Self {
        Self { selector }
    }

    pub fn selector(&self) -> &Arc<CertSelector> {
        &self.selector
    }

    /// Resolve and install the certificate for a handshake.
    /// Returns false when nothing was installed.
    pub fn resolve_into(&self, ssl: &mut SslRef) -> bool {
        let hostname = ssl.servername(NameType::HOST_NAME).map(str::to_string);
        if hostname.is_none() {
            tracing::debug!("No SNI hostname in TLS handshake");
        }

        let Some(cert) = self.selector.select(hostname.as_deref()) else {
            tracing::warn!(
                hostname = ?hostname,
                "No certificate found for hostname, TLS handshake will fail"
            );
            return false;
        };

        match apply_certificate(ssl, &cert) {
            Ok(()) => {
                tracing::debug!(
                    hostname = ?hostname,
                    thumbprint = %cert.thumbprint(),
                    "Certificate selected"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    hostname = ?hostname,
                    thumbprint = %cert.thumbprint(),
                    "Failed to set certificate: {}", e
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for SniCertResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SniCertResolver").finish()
    }
}

#[async_trait]
impl TlsAccept for SniCertResolver {
    async fn certificate_callback(&self, ssl: &mut SslRef) {
        self.resolve_into(ssl);
    }
}

/// Install leaf, key and intermediates on a connection
pub fn apply_certificate(
    ssl: &mut SslRef,
    cert: &Certificate,
) -> Result<(), openssl::error::ErrorStack> {
    ssl.set_certificate(cert.leaf())?;
    ssl.set_private_key(cert.private_key())?;
    for intermediate in cert.chain() {
        ext::ssl_add_chain_cert(ssl, intermediate)?;
    }
    Ok(())
}

/// Create TLS callbacks for SNI-based certificate selection
pub fn create_sni_callbacks(selector: Arc<CertSelector>) -> Box<dyn TlsAccept + Send + Sync> {
    Box::new(SniCertResolver::new(selector))
}
