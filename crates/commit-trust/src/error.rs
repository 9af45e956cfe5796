//! Error types for the trust engine.

/// Trust engine errors.
///
/// These never escape the resolvers: each one is converted at the tier
/// boundary into a terminal [`Verdict`](crate::Verdict).
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// A key or identity lookup failed in the backing store.
    #[error("lookup failed: {message}")]
    Lookup { message: String },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// The request deadline passed before the lookup completed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// Signing configuration could not be loaded.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// ASCII armor could not be decoded.
    #[error("invalid armor: {reason}")]
    Armor { reason: String },

    /// OpenPGP packet could not be parsed.
    #[error("invalid signature packet: {reason}")]
    Packet { reason: String },

    /// SSH public key could not be parsed.
    #[error("invalid ssh public key: {reason}")]
    SshKey { reason: String },

    /// SSH signature could not be parsed or did not verify.
    #[error("ssh signature rejected: {reason}")]
    SshSignature { reason: String },

    /// The cryptographic backend failed to process a key or signature.
    #[error("signature backend error: {message}")]
    Backend { message: String },
}

impl TrustError {
    /// Shorthand for a store lookup failure.
    pub fn lookup(message: impl Into<String>) -> Self {
        Self::Lookup {
            message: message.into(),
        }
    }

    /// Shorthand for a configuration failure.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a backend failure.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Whether the caller cancelled the request or its deadline passed.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Whether the error means "trust could not be determined right now"
    /// rather than "the input is bad".
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Lookup { .. } | Self::Cancelled | Self::DeadlineExceeded | Self::Config { .. }
        )
    }
}

/// Result type for trust engine operations.
pub type TrustResult<T> = Result<T, TrustError>;
