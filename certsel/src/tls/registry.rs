//! Domain registry - the active production certificate per domain key
//!
//! Each key holds the freshest certificate ever offered for it: a new certificate
//! replaces the current one only if it expires at the same time or later. The
//! merge runs under the key's shard lock, so concurrent `add` calls for the same
//! key are linearizable while other keys proceed independently.
//!
//! Lookup order:
//! 1. Exact key
//! 2. First wildcard key whose suffix matches (scan order is unspecified, so
//!    overlapping wildcards such as `*.example.com` and `*.a.example.com` have no
//!    defined winner)

use super::domain::{is_wildcard_key, matches_wildcard, normalize_domain};
use super::{Certificate, ChainPreloader, NoopPreloader};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// What happened to one domain key during `add`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Key had no certificate
    Inserted,
    /// A different, older-or-equal certificate was superseded
    Replaced,
    /// The same certificate was already active for the key
    Refreshed,
    /// The existing certificate expires later and stays
    Kept,
}

impl InstallOutcome {
    /// The offered certificate became newly active for the key
    pub fn activated(self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced)
    }
}

/// Per-key result of `add`
#[derive(Debug, Clone)]
pub struct Installed {
    pub key: String,
    /// Certificate registered for the key after the merge
    pub certificate: Arc<Certificate>,
    pub outcome: InstallOutcome,
}

/// Concurrent map from domain key to the active certificate
pub struct CertRegistry {
    exact: DashMap<String, Arc<Certificate>>,
    wildcards: DashMap<String, Arc<Certificate>>,
    preloader: Arc<dyn ChainPreloader>,
}

impl CertRegistry {
    pub fn new(preloader: Arc<dyn ChainPreloader>) -> Self {
        Self {
            exact: DashMap::new(),
            wildcards: DashMap::new(),
            preloader,
        }
    }

    /// Registry that never preloads chains
    pub fn without_preloading() -> Self {
        Self::new(Arc::new(NoopPreloader))
    }

    fn map_for(&self, key: &str) -> &DashMap<String, Arc<Certificate>> {
        if is_wildcard_key(key) {
            &self.wildcards
        } else {
            &self.exact
        }
    }

    /// Install a certificate under every one of its domain names.
    ///
    /// The chain preloader runs at most once, after all keys are merged, and only
    /// when the certificate won at least one key. Self-signed certificates are
    /// never preloaded.
    pub fn add(&self, certificate: Arc<Certificate>) -> Vec<Installed> {
        if certificate.domain_names().is_empty() {
            tracing::debug!(
                thumbprint = %certificate.thumbprint(),
                "Certificate has no domain names, ignoring"
            );
            return Vec::new();
        }

        let mut installed = Vec::with_capacity(certificate.domain_names().len());
        for key in certificate.domain_names() {
            let (current, outcome) = self.upsert(key, &certificate);
            tracing::debug!(
                domain = %key,
                thumbprint = %current.thumbprint(),
                outcome = ?outcome,
                "Certificate registry updated"
            );
            installed.push(Installed {
                key: key.clone(),
                certificate: current,
                outcome,
            });
        }

        if installed.iter().any(|i| i.outcome.activated()) && !certificate.is_self_signed() {
            self.preloader.preload(&certificate);
        }

        installed
    }

    fn upsert(
        &self,
        key: &str,
        candidate: &Arc<Certificate>,
    ) -> (Arc<Certificate>, InstallOutcome) {
        match self.map_for(key).entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get();
                if candidate.not_after() < existing.not_after() {
                    return (Arc::clone(existing), InstallOutcome::Kept);
                }

                let outcome = if existing.thumbprint() == candidate.thumbprint() {
                    InstallOutcome::Refreshed
                } else {
                    InstallOutcome::Replaced
                };
                entry.insert(Arc::clone(candidate));
                (Arc::clone(candidate), outcome)
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(candidate));
                (Arc::clone(candidate), InstallOutcome::Inserted)
            }
        }
    }

    /// Remove the certificate for an exact key. Wildcard keys are removed only
    /// when passed verbatim; no cascading happens.
    pub fn reset(&self, key: &str) -> Option<Arc<Certificate>> {
        let key = normalize_domain(key);
        let removed = self.map_for(&key).remove(&*key).map(|(_, cert)| cert);
        if let Some(cert) = &removed {
            tracing::debug!(
                domain = %key,
                thumbprint = %cert.thumbprint(),
                "Certificate removed from registry"
            );
        }
        removed
    }

    /// Check whether a domain is covered by an exact or wildcard key
    pub fn has_cert_for_domain(&self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        self.map_for(&domain).contains_key(&*domain)
            || self
                .wildcards
                .iter()
                .any(|entry| matches_wildcard(entry.key(), &domain))
    }

    /// Find the certificate for a domain, exact key first, then wildcards
    pub fn try_get(&self, domain: &str) -> Option<Arc<Certificate>> {
        let domain = normalize_domain(domain);
        if let Some(entry) = self.map_for(&domain).get(&*domain) {
            return Some(Arc::clone(entry.value()));
        }

        self.wildcards
            .iter()
            .find(|entry| matches_wildcard(entry.key(), &domain))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcards.is_empty()
    }

    /// Snapshot of all keys and their certificates, sorted by key
    pub fn entries(&self) -> Vec<(String, Arc<Certificate>)> {
        let mut entries: Vec<_> = self
            .exact
            .iter()
            .chain(self.wildcards.iter())
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Default for CertRegistry {
    fn default() -> Self {
        Self::without_preloading()
    }
}

impl std::fmt::Debug for CertRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertRegistry")
            .field("exact", &self.exact.len())
            .field("wildcards", &self.wildcards.len())
            .finish()
    }
}
