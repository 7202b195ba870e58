//! Certificate selection for TLS handshakes
//!
//! Precedence for a requested server name:
//! 1. Challenge certificate registered for exactly that name
//! 2. Domain registry match (exact, then wildcard)
//! 3. Fallback certificate, if configured
//!
//! Challenge precedence is scoped to the validated name; other names keep
//! resolving normally while a validation is in flight.

use super::preload::{PreloadError, preloader_from_config};
use super::registry::{CertRegistry, Installed};
use super::self_signed::{SelfSignedError, SelfSignedGenerator};
use super::{CertError, Certificate, ChallengeRegistry};
use crate::config::{FallbackConfig, SelectorConfig};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while constructing a selector
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("Failed to load fallback certificate: {0}")]
    Fallback(#[from] CertError),

    #[error("Failed to generate fallback certificate: {0}")]
    SelfSigned(#[from] SelfSignedError),

    #[error("Failed to set up chain preloading: {0}")]
    Preload(#[from] PreloadError),
}

/// Shared entry point for the handshake layer and the issuance workflow
pub struct CertSelector {
    registry: Arc<CertRegistry>,
    challenges: Arc<ChallengeRegistry>,
    fallback: RwLock<Option<Arc<Certificate>>>,
}

impl CertSelector {
    pub fn new(
        registry: Arc<CertRegistry>,
        challenges: Arc<ChallengeRegistry>,
        fallback: Option<Arc<Certificate>>,
    ) -> Self {
        Self {
            registry,
            challenges,
            fallback: RwLock::new(fallback),
        }
    }

    /// Build a selector from configuration.
    ///
    /// The fallback certificate and the trust store are loaded here, so a bad
    /// path or key fails startup instead of the first handshake.
    pub fn from_config(config: &SelectorConfig) -> Result<Self, SelectorError> {
        let preloader = preloader_from_config(&config.preload)?;

        let fallback = match &config.fallback {
            Some(FallbackConfig::Files {
                cert_path,
                key_path,
            }) => Some(Certificate::from_files(cert_path, key_path)?),
            Some(FallbackConfig::SelfSigned { domain }) => {
                Some(SelfSignedGenerator::default().generate(domain)?)
            }
            None => None,
        };

        if let Some(cert) = &fallback {
            tracing::info!(
                common_name = ?cert.common_name(),
                thumbprint = %cert.thumbprint(),
                expires_in_days = cert.days_until_expiry(),
                "Fallback certificate loaded"
            );
        }

        Ok(Self::new(
            Arc::new(CertRegistry::new(preloader)),
            Arc::new(ChallengeRegistry::new()),
            fallback.map(Arc::new),
        ))
    }

    /// Pick the certificate for a handshake. `None` means nothing matched and no
    /// fallback is configured; the handshake layer fails the connection.
    pub fn select(&self, server_name: Option<&str>) -> Option<Arc<Certificate>> {
        if let Some(name) = server_name {
            if !self.challenges.is_empty()
                && let Some(cert) = self.challenges.try_get(name)
            {
                tracing::trace!(hostname = %name, "Serving challenge certificate");
                return Some(cert);
            }

            if let Some(cert) = self.registry.try_get(name) {
                tracing::trace!(
                    hostname = %name,
                    thumbprint = %cert.thumbprint(),
                    "Serving registered certificate"
                );
                return Some(cert);
            }
        }

        let fallback = self.fallback();
        tracing::trace!(
            hostname = ?server_name,
            has_fallback = fallback.is_some(),
            "No registered certificate, using fallback"
        );
        fallback
    }

    /// Install or update a production certificate
    pub fn add(&self, certificate: Arc<Certificate>) -> Vec<Installed> {
        self.registry.add(certificate)
    }

    /// Evict the production certificate for an exact domain key
    pub fn reset(&self, domain: &str) -> Option<Arc<Certificate>> {
        self.registry.reset(domain)
    }

    pub fn has_cert_for_domain(&self, domain: &str) -> bool {
        self.registry.has_cert_for_domain(domain)
    }

    pub fn try_get(&self, domain: &str) -> Option<Arc<Certificate>> {
        self.registry.try_get(domain)
    }

    /// Install a domain validation certificate
    pub fn add_challenge_cert(&self, certificate: Arc<Certificate>) -> Vec<String> {
        self.challenges.add(certificate)
    }

    /// Remove the validation certificate once validation completes or times out
    pub fn clear_challenge_cert(&self, domain: &str) -> Option<Arc<Certificate>> {
        self.challenges.clear(domain)
    }

    pub fn fallback(&self) -> Option<Arc<Certificate>> {
        self.fallback.read().clone()
    }

    /// Swap the fallback certificate at runtime
    pub fn set_fallback(&self, certificate: Option<Arc<Certificate>>) {
        *self.fallback.write() = certificate;
    }

    pub fn registry(&self) -> &Arc<CertRegistry> {
        &self.registry
    }

    pub fn challenges(&self) -> &Arc<ChallengeRegistry> {
        &self.challenges
    }
}

impl std::fmt::Debug for CertSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertSelector")
            .field("registry", &self.registry)
            .field("challenges", &self.challenges)
            .field("has_fallback", &self.fallback.read().is_some())
            .finish()
    }
}
