//! Destination-store client configuration.
//!
//! This module resolves the options a caller hands in (region override,
//! named profile, explicit credential pair) into a [`ClientConfig`] the
//! stores can act on. Resolution is a pure function: no environment
//! lookups, no file reads, no persistence.
//!
//! Layering, in increasing precedence:
//!
//! 1. the hard default region ([`DEFAULT_REGION`]);
//! 2. an explicit region override;
//! 3. a named credential profile;
//! 4. an explicit access-key/secret pair — applied only when BOTH halves
//!    are present; a lone key or lone secret is ignored, not an error.
//!
//! A profile and an explicit pair may coexist; the explicit pair wins at
//! the store-client level.

use crate::error::{Error, Result};

/// Region used when no override is given.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Caller-supplied destination-store options, all optional.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreOptions {
    /// Region override
    pub region: Option<String>,
    /// Named credential profile
    pub profile: Option<String>,
    /// Explicit access key (only used together with `secret_key`)
    pub access_key: Option<String>,
    /// Explicit secret key (only used together with `access_key`)
    pub secret_key: Option<String>,
}

/// An explicit access-key/secret pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key id
    pub access_key: String,
    /// Secret access key
    pub secret_key: String,
}

// Keep the secret out of logs and error output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Resolved destination-store client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Effective region
    pub region: String,
    /// Named credential profile, if any
    pub profile: Option<String>,
    /// Explicit credentials, if a complete pair was given
    pub credentials: Option<Credentials>,
}

/// Resolve caller options into a [`ClientConfig`].
///
/// # Errors
///
/// Returns [`Error::Configuration`] only when the resulting configuration
/// is structurally invalid: a blank region, a blank profile name, or a
/// credential pair with a blank half. A lone key or secret is dropped
/// silently per the layering rules.
pub fn resolve_client_config(options: &StoreOptions) -> Result<ClientConfig> {
    let region = match options.region.as_deref() {
        Some(region) if region.trim().is_empty() => {
            return Err(Error::Configuration {
                reason: "region override is blank".to_string(),
            });
        }
        Some(region) => region.to_string(),
        None => DEFAULT_REGION.to_string(),
    };

    let profile = match options.profile.as_deref() {
        Some(profile) if profile.trim().is_empty() => {
            return Err(Error::Configuration {
                reason: "profile name is blank".to_string(),
            });
        }
        other => other.map(str::to_string),
    };

    let credentials = match (options.access_key.as_deref(), options.secret_key.as_deref()) {
        (Some(access_key), Some(secret_key)) => {
            if access_key.trim().is_empty() || secret_key.trim().is_empty() {
                return Err(Error::Configuration {
                    reason: "explicit credential pair has a blank half".to_string(),
                });
            }
            Some(Credentials {
                access_key: access_key.to_string(),
                secret_key: secret_key.to_string(),
            })
        }
        // A lone key or lone secret is ignored, not an error.
        _ => None,
    };

    Ok(ClientConfig {
        region,
        profile,
        credentials,
    })
}
