//! Access key pair used to sign requests.

use std::fmt;

use crate::error::AuthError;

/// An access key id and its secret.
///
/// Both halves are checked when the value is built, so a signer holding a
/// `Credentials` never has to report a credential problem per request.
///
/// # Examples
///
/// ```
/// use photostack_auth::credentials::Credentials;
///
/// let creds = Credentials::new("AKID", "secret").unwrap();
/// assert_eq!(creds.access_key_id(), "AKID");
/// assert!(Credentials::new("", "secret").is_err());
/// ```
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    /// Build a credential pair, rejecting empty components.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();

        if access_key_id.trim().is_empty() {
            return Err(AuthError::MissingCredentials("access key id"));
        }
        if secret_access_key.is_empty() {
            return Err(AuthError::MissingCredentials("secret access key"));
        }

        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }

    /// The public access key id.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub(crate) fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}
