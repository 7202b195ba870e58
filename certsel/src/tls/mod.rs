//! TLS certificate selection
//!
//! Handles:
//! - Certificate records with metadata derived from the leaf
//! - Freshest-wins domain registry with wildcard lookup
//! - Challenge certificates that override the registry during validation
//! - Chain preloading for newly active certificates
//! - SNI-based certificate selection during the handshake

mod certificate;
mod challenge;
mod domain;
mod preload;
mod registry;
mod selector;
mod self_signed;
mod sni;

#[cfg(test)]
mod testing;

pub use certificate::{CertError, Certificate};
pub use challenge::ChallengeRegistry;
pub use domain::{is_wildcard_key, matches_wildcard, normalize_domain};
pub use preload::{
    ChainPreloader, ChainStatus, DetachedPreloader, NoopPreloader, OpenSslChainPreloader,
    PreloadError, preloader_from_config,
};
pub use registry::{CertRegistry, InstallOutcome, Installed};
pub use selector::{CertSelector, SelectorError};
pub use self_signed::{SelfSignedError, SelfSignedGenerator};
pub use sni::{SniCertResolver, apply_certificate, create_sni_callbacks};
