//! Identity provider contract and the local development implementation.
//!
//! Real deployments delegate sign-in to an external identity service; the
//! studio only depends on this trait and on `AuthError` display texts being
//! suitable for direct user presentation. `LocalAuth` keeps accounts in
//! memory so the surface works in development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

const MIN_PASSWORD_CHARS: usize = 6;

/// An authenticated session handle.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Provider failures; the display text is the user-facing message.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password should be at least 6 characters")]
    WeakPassword,
    #[error("An account with this email already exists")]
    EmailInUse,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

/// Async identity provider seam.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up_with_email(&self, email: &str, password: &str)
    -> Result<Session, AuthError>;

    async fn sign_in_with_email(&self, email: &str, password: &str)
    -> Result<Session, AuthError>;

    async fn sign_out(&self, token: Uuid) -> Result<(), AuthError>;
}

struct StoredAccount {
    salt: String,
    password_hash: String,
}

#[derive(Default)]
struct LocalAuthInner {
    // Keyed by lowercased email
    accounts: HashMap<String, StoredAccount>,
    sessions: HashMap<Uuid, Session>,
}

/// In-memory development provider.
#[derive(Default)]
pub struct LocalAuth {
    inner: Mutex<LocalAuthInner>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live session by token.
    pub fn session(&self, token: Uuid) -> Option<Session> {
        self.lock().sessions.get(&token).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocalAuthInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open_session(inner: &mut LocalAuthInner, email: &str) -> Session {
        let session = Session {
            token: Uuid::new_v4(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        inner.sessions.insert(session.token, session.clone());
        session
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.trim().contains('@') {
        Ok(())
    } else {
        Err(AuthError::InvalidEmail)
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() >= MIN_PASSWORD_CHARS {
        Ok(())
    } else {
        Err(AuthError::WeakPassword)
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl IdentityProvider for LocalAuth {
    async fn sign_up_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        validate_email(email)?;
        validate_password(password)?;

        let mut inner = self.lock();
        match inner.accounts.entry(email.to_lowercase()) {
            Entry::Occupied(_) => Err(AuthError::EmailInUse),
            Entry::Vacant(slot) => {
                let salt = Uuid::new_v4().to_string();
                let password_hash = hash_password(&salt, password);
                slot.insert(StoredAccount {
                    salt,
                    password_hash,
                });
                Ok(Self::open_session(&mut inner, email))
            }
        }
    }

    async fn sign_in_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let mut inner = self.lock();
        // Unknown email and wrong password answer identically
        let Some(account) = inner.accounts.get(&email.to_lowercase()) else {
            return Err(AuthError::InvalidCredentials);
        };
        if hash_password(&account.salt, password) != account.password_hash {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(Self::open_session(&mut inner, email))
    }

    async fn sign_out(&self, token: Uuid) -> Result<(), AuthError> {
        self.lock().sessions.remove(&token);
        Ok(())
    }
}
