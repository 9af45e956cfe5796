//! Signing configuration.
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `COMMIT_TRUST_APP_NAME` | Signer name for unowned stored keys (default: `commit-trust`) |
//! | `COMMIT_TRUST_SIGNING_KEY` | Instance key id, SSH public key path, `default` or `none` |
//! | `COMMIT_TRUST_SIGNING_NAME` | Name attributed to instance and rotated keys |
//! | `COMMIT_TRUST_SIGNING_EMAIL` | Email attributed to instance and rotated keys |
//! | `COMMIT_TRUST_SIGNING_FORMAT` | `openpgp` or `ssh` (default: `openpgp`) |
//! | `COMMIT_TRUST_TRUSTED_SSH_KEYS` | `;`-separated rotated SSH public keys |

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::{TrustError, TrustResult};
use crate::types::RepositoryRef;

/// Key format used for instance signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningFormat {
    #[default]
    OpenPgp,
    Ssh,
}

impl FromStr for SigningFormat {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openpgp" | "gpg" => Ok(Self::OpenPgp),
            "ssh" => Ok(Self::Ssh),
            other => Err(TrustError::config(format!("unknown signing format: {}", other))),
        }
    }
}

/// Instance-wide signing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Signer name used for stored keys that have no owner.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Instance key id (OpenPGP) or public key path (SSH); `default`/`none`
    /// disable the instance key tier.
    #[serde(default = "default_signing_key")]
    pub signing_key: String,

    #[serde(default)]
    pub signing_name: String,

    #[serde(default)]
    pub signing_email: String,

    #[serde(default)]
    pub signing_format: SigningFormat,

    /// Previously used SSH public keys that still verify old commits.
    #[serde(default)]
    pub trusted_ssh_keys: Vec<String>,
}

fn default_app_name() -> String {
    "commit-trust".to_string()
}

fn default_signing_key() -> String {
    "default".to_string()
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            signing_key: default_signing_key(),
            signing_name: String::new(),
            signing_email: String::new(),
            signing_format: SigningFormat::default(),
            trusted_ssh_keys: Vec::new(),
        }
    }
}

impl SigningConfig {
    /// Create config from environment variables (see module docs).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            app_name: std::env::var("COMMIT_TRUST_APP_NAME").unwrap_or(defaults.app_name),
            signing_key: std::env::var("COMMIT_TRUST_SIGNING_KEY")
                .unwrap_or(defaults.signing_key),
            signing_name: std::env::var("COMMIT_TRUST_SIGNING_NAME").unwrap_or_default(),
            signing_email: std::env::var("COMMIT_TRUST_SIGNING_EMAIL").unwrap_or_default(),
            signing_format: std::env::var("COMMIT_TRUST_SIGNING_FORMAT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            trusted_ssh_keys: std::env::var("COMMIT_TRUST_TRUSTED_SSH_KEYS")
                .map(|v| parse_key_list(&v))
                .unwrap_or_default(),
        }
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> TrustResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TrustError::config(format!("invalid signing config: {}", e)))
    }

    /// Whether an explicit instance key is configured.
    pub fn has_instance_key(&self) -> bool {
        !matches!(self.signing_key.trim(), "" | "default" | "none")
    }

    /// Descriptor for the instance key, without key content.
    pub fn instance_key(&self) -> SigningKeySettings {
        SigningKeySettings {
            sign: true,
            key_id: self.signing_key.clone(),
            name: self.signing_name.clone(),
            email: self.signing_email.clone(),
            format: self.signing_format,
            public_key_content: None,
        }
    }

    pub fn with_signing_key(mut self, key: impl Into<String>, format: SigningFormat) -> Self {
        self.signing_key = key.into();
        self.signing_format = format;
        self
    }

    pub fn with_signer(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.signing_name = name.into();
        self.signing_email = email.into();
        self
    }

    pub fn with_trusted_ssh_key(mut self, key: impl Into<String>) -> Self {
        self.trusted_ssh_keys.push(key.into());
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }
}

fn parse_key_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// A configured signing key: the instance key or a repository default key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKeySettings {
    /// Whether this key is used for signing.
    #[serde(default)]
    pub sign: bool,
    pub key_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub format: SigningFormat,
    /// Armored OpenPGP key or SSH authorized-keys line, once loaded.
    #[serde(default)]
    pub public_key_content: Option<String>,
}

/// Source of signing configuration and configured key material.
#[async_trait]
pub trait SigningConfigProvider: Send + Sync {
    fn signing_config(&self) -> &SigningConfig;

    /// Public key content of the instance signing key.
    async fn instance_public_key(&self, ctx: &RequestContext) -> TrustResult<String>;

    /// Default signing key of a repository, with content loaded.
    async fn repository_default_key(
        &self,
        ctx: &RequestContext,
        repository: &RepositoryRef,
    ) -> TrustResult<Option<SigningKeySettings>>;
}

/// Provider over fixed configuration.
///
/// Without explicit instance key content, an SSH instance key is read from
/// the file named by `signing_key`.
#[derive(Debug, Clone, Default)]
pub struct StaticSigningProvider {
    config: SigningConfig,
    instance_public_key: Option<String>,
    repository_keys: HashMap<RepositoryRef, SigningKeySettings>,
}

impl StaticSigningProvider {
    pub fn new(config: SigningConfig) -> Self {
        Self {
            config,
            instance_public_key: None,
            repository_keys: HashMap::new(),
        }
    }

    pub fn with_instance_public_key(mut self, content: impl Into<String>) -> Self {
        self.instance_public_key = Some(content.into());
        self
    }

    pub fn with_repository_key(
        mut self,
        repository: RepositoryRef,
        settings: SigningKeySettings,
    ) -> Self {
        self.repository_keys.insert(repository, settings);
        self
    }
}

#[async_trait]
impl SigningConfigProvider for StaticSigningProvider {
    fn signing_config(&self) -> &SigningConfig {
        &self.config
    }

    async fn instance_public_key(&self, ctx: &RequestContext) -> TrustResult<String> {
        if let Some(content) = &self.instance_public_key {
            return Ok(content.clone());
        }
        if !self.config.has_instance_key() {
            return Err(TrustError::config("no instance signing key configured"));
        }
        match self.config.signing_format {
            SigningFormat::Ssh => {
                let path = self.config.signing_key.trim();
                ctx.run(async {
                    tokio::fs::read_to_string(path).await.map_err(|e| {
                        TrustError::config(format!("failed to read ssh key {}: {}", path, e))
                    })
                })
                .await
                .map(|content| content.trim().to_string())
            }
            SigningFormat::OpenPgp => Err(TrustError::config(format!(
                "no public key content for signing key {}",
                self.config.signing_key
            ))),
        }
    }

    async fn repository_default_key(
        &self,
        ctx: &RequestContext,
        repository: &RepositoryRef,
    ) -> TrustResult<Option<SigningKeySettings>> {
        ctx.check()?;
        Ok(self.repository_keys.get(repository).cloned())
    }
}
