//! Challenge registry - short-lived domain validation certificates
//!
//! Unlike the domain registry there is no freshness rule: the latest certificate
//! added for a key always wins, and entries leave only through `clear`. Chains
//! are never preloaded for these certificates.

use super::Certificate;
use super::domain::normalize_domain;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Concurrent map from domain to the active validation certificate
#[derive(Default)]
pub struct ChallengeRegistry {
    certs: DashMap<String, Arc<Certificate>>,
    // Bumped before a slot is filled and dropped after a slot is emptied, so it
    // may briefly over-report but never hides a visible entry.
    live: AtomicUsize,
}

impl ChallengeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a validation certificate under each of its domain names,
    /// replacing whatever was there. Returns the keys written.
    pub fn add(&self, certificate: Arc<Certificate>) -> Vec<String> {
        let mut keys = Vec::with_capacity(certificate.domain_names().len());
        for key in certificate.domain_names() {
            match self.certs.entry(key.clone()) {
                Entry::Occupied(mut entry) => {
                    entry.insert(Arc::clone(&certificate));
                }
                Entry::Vacant(entry) => {
                    self.live.fetch_add(1, Ordering::SeqCst);
                    entry.insert(Arc::clone(&certificate));
                }
            }
            tracing::debug!(domain = %key, "Challenge certificate installed");
            keys.push(key.clone());
        }
        keys
    }

    /// Remove the validation certificate for an exact domain
    pub fn clear(&self, domain: &str) -> Option<Arc<Certificate>> {
        let domain = normalize_domain(domain);
        let removed = self.certs.remove(&*domain).map(|(_, cert)| cert);
        if removed.is_some() {
            self.live.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!(domain = %domain, "Challenge certificate cleared");
        }
        removed
    }

    /// Exact-match lookup
    pub fn try_get(&self, domain: &str) -> Option<Arc<Certificate>> {
        let domain = normalize_domain(domain);
        self.certs
            .get(&*domain)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Single atomic load, cheap enough for every handshake
    pub fn is_empty(&self) -> bool {
        self.live.load(Ordering::SeqCst) == 0
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }
}

impl std::fmt::Debug for ChallengeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeRegistry")
            .field("live", &self.live.load(Ordering::SeqCst))
            .finish()
    }
}
