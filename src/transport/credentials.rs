//! Bearer credential sources.
//!
//! The client asks for a token on every request and never refreshes or
//! persists one itself.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Supplies the bearer token for outbound requests.
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// No credentials; requests go out unauthenticated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn token(&self) -> Option<String> {
        None
    }
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl CredentialProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Reads the token from an environment variable on every request.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvToken {
    fn token(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|t| !t.trim().is_empty())
    }
}

/// Token slot updated by an external auth layer (login, refresh, logout).
#[derive(Default)]
pub struct TokenStore {
    current: ArcSwapOption<String>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        self.current.store(Some(Arc::new(token.into())));
    }

    pub fn clear(&self) {
        self.current.store(None);
    }
}

impl CredentialProvider for TokenStore {
    fn token(&self) -> Option<String> {
        self.current.load_full().map(|t| t.as_ref().clone())
    }
}
