//! Domain-keyed TLS certificate selection
//!
//! A [`CertSelector`] answers "which certificate do I present for this SNI
//! name?" on every handshake while the issuance workflow adds, replaces and
//! removes certificates concurrently.

pub mod config;
pub mod tls;

pub use config::{FallbackConfig, PreloadConfig, SelectorConfig};
pub use tls::{
    CertError, CertRegistry, CertSelector, Certificate, ChallengeRegistry, InstallOutcome,
    SelectorError, SniCertResolver,
};
