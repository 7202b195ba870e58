//! Chain preloading - best-effort validation of newly active certificates
//!
//! Preloading builds the trust chain once, when a certificate becomes active, so
//! broken chains surface in logs long before a client hits them. It is a
//! diagnostic, never a gate: nothing here returns a result the caller has to
//! handle, and a failure only produces a warning.

use super::Certificate;
use crate::config::PreloadConfig;
use openssl::stack::Stack;
use openssl::x509::store::{X509Store, X509StoreBuilder};
use openssl::x509::{X509, X509StoreContext};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while setting up a preloader
#[derive(Debug, Error)]
pub enum PreloadError {
    #[error("Failed to build trust store: {0}")]
    TrustStore(#[from] openssl::error::ErrorStack),

    #[error("Failed to read trust roots from {path}: {source}")]
    ReadRoots {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No certificates found in trust root file {0}")]
    EmptyRoots(PathBuf),
}

/// Warms and validates the chain of a certificate that just became active
pub trait ChainPreloader: Send + Sync {
    fn preload(&self, certificate: &Arc<Certificate>);
}

/// Preloader used when preloading is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPreloader;

impl ChainPreloader for NoopPreloader {
    fn preload(&self, _certificate: &Arc<Certificate>) {}
}

/// Outcome of a single chain build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    /// Chain reached a trusted root
    Trusted { depth: usize },
    /// Chain was built but did not verify
    Untrusted { reason: String },
}

/// Builds chains against an OpenSSL trust store.
///
/// Revocation is never consulted: CRL checking is off in a fresh store and no
/// OCSP lookups happen, so a slow or unreachable CA cannot stall this path.
pub struct OpenSslChainPreloader {
    store: X509Store,
}

impl OpenSslChainPreloader {
    /// Trust the platform's default CA locations
    pub fn with_system_roots() -> Result<Self, PreloadError> {
        Self::with_roots(Vec::new(), true)
    }

    /// Trust the given roots, optionally on top of the platform defaults
    pub fn with_roots(
        roots: impl IntoIterator<Item = X509>,
        system_roots: bool,
    ) -> Result<Self, PreloadError> {
        let mut builder = X509StoreBuilder::new()?;
        if system_roots {
            builder.set_default_paths()?;
        }
        for root in roots {
            builder.add_cert(root)?;
        }

        Ok(Self {
            store: builder.build(),
        })
    }

    pub fn from_config(config: &PreloadConfig) -> Result<Self, PreloadError> {
        let mut roots = Vec::new();
        for path in &config.extra_roots {
            let pem = std::fs::read(path).map_err(|source| PreloadError::ReadRoots {
                path: path.clone(),
                source,
            })?;
            let certs = X509::stack_from_pem(&pem)?;
            if certs.is_empty() {
                return Err(PreloadError::EmptyRoots(path.clone()));
            }
            roots.extend(certs);
        }

        Self::with_roots(roots, config.system_roots)
    }

    /// Build and verify the chain for a certificate
    pub fn build_chain(
        &self,
        certificate: &Certificate,
    ) -> Result<ChainStatus, openssl::error::ErrorStack> {
        let mut intermediates = Stack::new()?;
        for cert in certificate.chain() {
            intermediates.push(cert.clone())?;
        }

        let mut context = X509StoreContext::new()?;
        context.init(
            &self.store,
            certificate.leaf(),
            &intermediates,
            |context| {
                if context.verify_cert()? {
                    let depth = context.chain().map(|chain| chain.len()).unwrap_or(0);
                    Ok(ChainStatus::Trusted { depth })
                } else {
                    Ok(ChainStatus::Untrusted {
                        reason: context.error().error_string().to_string(),
                    })
                }
            },
        )
    }
}

impl ChainPreloader for OpenSslChainPreloader {
    fn preload(&self, certificate: &Arc<Certificate>) {
        let common_name = certificate.common_name().unwrap_or("<none>");

        match self.build_chain(certificate) {
            Ok(ChainStatus::Trusted { depth }) => {
                tracing::debug!(
                    common_name = %common_name,
                    thumbprint = %certificate.thumbprint(),
                    depth,
                    "Certificate chain built"
                );
            }
            Ok(ChainStatus::Untrusted { reason }) => {
                tracing::warn!(
                    common_name = %common_name,
                    thumbprint = %certificate.thumbprint(),
                    reason = %reason,
                    "Failed to validate certificate chain"
                );
            }
            Err(e) => {
                tracing::warn!(
                    common_name = %common_name,
                    thumbprint = %certificate.thumbprint(),
                    "Failed to build certificate chain: {}", e
                );
            }
        }
    }
}

impl std::fmt::Debug for OpenSslChainPreloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSslChainPreloader").finish()
    }
}

/// Runs a preloader off the caller's thread.
///
/// Inside a tokio runtime the work goes to the blocking pool and the caller
/// returns immediately; outside one it runs inline.
pub struct DetachedPreloader<P> {
    inner: Arc<P>,
}

impl<P: ChainPreloader + 'static> DetachedPreloader<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl<P: ChainPreloader + 'static> ChainPreloader for DetachedPreloader<P> {
    fn preload(&self, certificate: &Arc<Certificate>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                let certificate = Arc::clone(certificate);
                handle.spawn_blocking(move || inner.preload(&certificate));
            }
            Err(_) => self.inner.preload(certificate),
        }
    }
}

/// Build the preloader described by configuration
pub fn preloader_from_config(
    config: &PreloadConfig,
) -> Result<Arc<dyn ChainPreloader>, PreloadError> {
    if !config.enabled {
        return Ok(Arc::new(NoopPreloader));
    }

    let preloader = OpenSslChainPreloader::from_config(config)?;
    if config.detached {
        Ok(Arc::new(DetachedPreloader::new(preloader)))
    } else {
        Ok(Arc::new(preloader))
    }
}
