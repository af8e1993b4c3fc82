use std::sync::Arc;
use tracing::{debug, warn};

use crate::auth::password::{equalize_timing, verify_password};
use crate::auth::AuthError;
use crate::database::models::Identity;
use crate::database::IdentityStore;

/// Why a credential check failed. Only ever logged; callers see
/// `AuthError::InvalidCredentials` for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    NotFound,
    NoPasswordSet,
    Mismatch,
}

/// Validates email/password pairs against stored bcrypt hashes. Read-only.
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn IdentityStore>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub async fn verify(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = self.store.find_identity_by_email(email).await?;

        // bcrypt is CPU bound; keep it off the async workers
        let password = password.to_string();
        let checked = tokio::task::spawn_blocking(move || Self::check(identity, &password))
            .await
            .map_err(|e| AuthError::Hash(format!("Credential check task failed: {}", e)))?;

        match checked {
            Ok(identity) => {
                debug!("Credentials accepted for identity {}", identity.id);
                Ok(identity)
            }
            Err(reason) => {
                warn!("Credential check rejected ({:?})", reason);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    fn check(identity: Option<Identity>, password: &str) -> Result<Identity, Rejection> {
        let Some(identity) = identity else {
            equalize_timing(password);
            return Err(Rejection::NotFound);
        };

        let Some(hash) = identity.password_hash.as_deref().filter(|h| !h.is_empty()) else {
            equalize_timing(password);
            return Err(Rejection::NoPasswordSet);
        };

        if verify_password(password, hash) {
            Ok(identity)
        } else {
            Err(Rejection::Mismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::database::models::{NewIdentity, Role};
    use crate::database::MemoryStore;

    async fn verifier_with(identities: Vec<NewIdentity>) -> CredentialVerifier {
        let store = Arc::new(MemoryStore::new());
        for identity in identities {
            store.create_identity(identity).await.unwrap();
        }
        CredentialVerifier::new(store)
    }

    fn with_password(email: &str, password: Option<&str>) -> NewIdentity {
        NewIdentity {
            email: email.to_string(),
            password_hash: password.map(|p| hash_password(p, 10).unwrap()),
            name: None,
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn accepts_correct_password() {
        let verifier = verifier_with(vec![with_password("a@x.com", Some("s3cret!"))]).await;
        let identity = verifier.verify("a@x.com", "s3cret!").await.unwrap();
        assert_eq!(identity.email, "a@x.com");
        assert_eq!(identity.role, Role::User);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn hash_comparison_does_not_stall_the_runtime() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let verifier = verifier_with(vec![with_password("a@x.com", Some("s3cret!"))]).await;
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
        };

        // Single worker: the ticker only advances if the comparison runs elsewhere
        verifier.verify("a@x.com", "s3cret!").await.unwrap();
        verifier.verify("nobody@x.com", "s3cret!").await.unwrap_err();
        let observed = ticks.load(Ordering::Relaxed);
        ticker.abort();

        assert!(observed >= 3, "runtime stalled during bcrypt ({} ticks)", observed);
    }

    #[tokio::test]
    async fn every_failure_is_the_same_error() {
        let verifier = verifier_with(vec![
            with_password("a@x.com", Some("s3cret!")),
            with_password("oauth@x.com", None),
        ])
        .await;

        for (email, password) in [
            ("a@x.com", "s3cret"),
            ("a@x.com", "S3cret!"),
            ("a@x.com", ""),
            ("oauth@x.com", ""),
            ("oauth@x.com", "anything"),
            ("nobody@x.com", "s3cret!"),
            ("A@x.com", "s3cret!"),
        ] {
            let err = verifier.verify(email, password).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials), "{} / {}", email, password);
            assert_eq!(err.to_string(), "Invalid email or password");
        }
    }
}
