//! Error types for request signing.
//!
//! Signing itself cannot fail once a [`crate::RequestSigner`] exists; every
//! variant here describes a misconfiguration detected at construction time.

/// Errors raised while constructing a signer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A credential component is empty.
    #[error("missing credential: {0}")]
    MissingCredentials(&'static str),

    /// The signing region is empty.
    #[error("missing signing region")]
    MissingRegion,
}
