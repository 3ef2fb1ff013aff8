//! Error taxonomy for the authentication subsystem.
//!
//! Credential and provider errors are recovered at the route boundary and
//! become redirects; storage faults carry their cause for internal logging
//! and surface as a 500, never as response-body detail.

use std::fmt;

use crate::store::StoreError;

#[derive(Debug)]
pub enum AuthError {
    /// The username already belongs to a user with a local credential.
    DuplicateUsername,
    /// Unknown username or password mismatch; callers cannot tell which.
    InvalidCredentials,
    /// The OAuth provider reported an error or rejected the exchange.
    ProviderDenied,
    /// The provider could not be reached before the request timeout.
    ProviderUnreachable,
    /// A storage-layer fault; fatal for the request.
    StorageUnavailable(anyhow::Error),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateUsername => write!(f, "username is already registered"),
            Self::InvalidCredentials => write!(f, "invalid username or password"),
            Self::ProviderDenied => write!(f, "provider denied the authorization request"),
            Self::ProviderUnreachable => write!(f, "provider unreachable"),
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl AuthError {
    /// Map a storage fault, treating conflicts as bugs at the call site:
    /// callers that can race must match on `StoreError::Conflict` themselves.
    pub(crate) fn storage(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => {
                Self::StorageUnavailable(anyhow::anyhow!("unexpected uniqueness conflict"))
            }
            StoreError::Unavailable(err) => Self::StorageUnavailable(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_never_leaks_internals() {
        let err = AuthError::InvalidCredentials;
        assert_eq!(err.to_string(), "invalid username or password");

        let err = AuthError::storage(StoreError::Conflict);
        assert!(matches!(err, AuthError::StorageUnavailable(_)));
    }
}
