//! Credential resolution for sync cycles.
//!
//! The engine asks a [`CredentialResolver`] for a bearer credential once per
//! cycle, before pushing or pulling.

mod token_exchange;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::unix_timestamp_now;

pub use token_exchange::TokenExchangeResolver;

const EXPIRY_SKEW_SECONDS: i64 = 60;

/// The account a sync cycle runs for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountRef {
    pub name: String,
}

impl AccountRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Bearer credential handed to the remote client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    /// Unix seconds; `None` for credentials that do not expire
    expires_at: Option<i64>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    #[must_use]
    pub const fn expiring_at(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub const fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity provider rejected the stored credentials outright.
    #[error("Invalid credentials for account {0}")]
    InvalidCredentials(String),
    #[error("No credentials are configured for account {0}")]
    NotConfigured(String),
    #[error("Authentication denied: {0}")]
    Denied(String),
    #[error("Authentication request failed: {0}")]
    Network(String),
    #[error("Invalid authentication request: {0}")]
    Request(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Produces a credential for an account, refreshing it if needed.
#[allow(async_fn_in_trait)]
pub trait CredentialResolver {
    async fn resolve(&self, account: &AccountRef) -> AuthResult<Credential>;
}

/// Resolver for engines that never authenticate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialResolver for NoCredentials {
    async fn resolve(&self, account: &AccountRef) -> AuthResult<Credential> {
        Err(AuthError::NotConfigured(account.name.clone()))
    }
}

/// Fixed account-to-token table.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    tokens: BTreeMap<String, Credential>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, account: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(account.into(), Credential::new(token));
        self
    }
}

impl CredentialResolver for StaticCredentials {
    async fn resolve(&self, account: &AccountRef) -> AuthResult<Credential> {
        match self.tokens.get(&account.name) {
            Some(credential) if credential.token().trim().is_empty() => {
                Err(AuthError::InvalidCredentials(account.name.clone()))
            }
            Some(credential) => Ok(credential.clone()),
            None => Err(AuthError::NotConfigured(account.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_redacts_token() {
        let credential = Credential::new("secret").expiring_at(123);
        let debug = format!("{credential:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn credential_expiry_uses_skew() {
        let now = unix_timestamp_now();
        assert!(!Credential::new("t").is_expired());
        assert!(Credential::new("t").expiring_at(now + 30).is_expired());
        assert!(!Credential::new("t").expiring_at(now + 3600).is_expired());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn static_credentials_resolve_by_account() {
        let resolver = StaticCredentials::new()
            .with_token("alice", "tok-a")
            .with_token("blank", "  ");

        let credential = resolver.resolve(&AccountRef::new("alice")).await.unwrap();
        assert_eq!(credential.token(), "tok-a");

        assert!(matches!(
            resolver.resolve(&AccountRef::new("blank")).await,
            Err(AuthError::InvalidCredentials(_))
        ));
        assert!(matches!(
            resolver.resolve(&AccountRef::new("bob")).await,
            Err(AuthError::NotConfigured(_))
        ));
    }
}
