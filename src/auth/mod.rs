pub mod password;
pub mod session;
pub mod state;

pub use session::{IssuedSession, Session, SessionClaims, SessionStore, SessionTokens, SessionUser};
pub use state::{OAuthState, StateSigner};

use thiserror::Error;

/// Authentication failures. `InvalidCredentials` deliberately carries no
/// detail about which check failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot perform this operation on your own account")]
    SelfTargetForbidden,

    #[error("Token error: {0}")]
    Token(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Identity storage failed: {0}")]
    Storage(#[from] crate::database::DatabaseError),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Unauthorized("Session expired".to_string()),
            ErrorKind::InvalidKeyFormat | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidRsaKey(_) => {
                AuthError::Token(err.to_string())
            }
            _ => AuthError::Unauthorized("Invalid session token".to_string()),
        }
    }
}
