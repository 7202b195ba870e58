//! Selector configuration
//!
//! The host embeds these types in its own configuration file; this crate only
//! defines their shape and defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root selector configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SelectorConfig {
    /// Certificate served when nothing else matches (none = fail the handshake)
    #[serde(default)]
    pub fallback: Option<FallbackConfig>,

    /// Chain preloading settings
    #[serde(default)]
    pub preload: PreloadConfig,
}

/// Where the fallback certificate comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum FallbackConfig {
    /// PEM chain and key on disk
    Files {
        cert_path: PathBuf,
        key_path: PathBuf,
    },
    /// Generated in memory at startup
    SelfSigned {
        #[serde(default = "default_self_signed_domain")]
        domain: String,
    },
}

/// Chain preloading settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreloadConfig {
    /// Validate chains of newly active certificates
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Trust the platform's default CA locations
    #[serde(default = "default_true")]
    pub system_roots: bool,

    /// Additional PEM files with trusted roots
    #[serde(default)]
    pub extra_roots: Vec<PathBuf>,

    /// Run chain builds on the tokio blocking pool instead of the caller's thread
    #[serde(default = "default_true")]
    pub detached: bool,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            system_roots: true,
            extra_roots: Vec::new(),
            detached: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_self_signed_domain() -> String {
    "localhost".to_string()
}
