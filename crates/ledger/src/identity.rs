//! Caller identity resolution.
//!
//! A credential is whatever the transport authenticates (a membership
//! service id, an API principal). The ledger only needs the organizational
//! role behind it, which is looked up in an explicit table rather than
//! derived from the credential's spelling.

use std::collections::BTreeMap;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("no role registered for credential '{credential}'")]
    UnknownCredential { credential: String },
}

/// Maps an opaque caller credential to an organizational role.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credential: &str) -> Result<String, IdentityError>;
}

/// Table-driven resolver: every known credential maps to exactly one role.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    roles: BTreeMap<String, String>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of one credential.
    pub fn with(mut self, credential: impl Into<String>, role: impl Into<String>) -> Self {
        self.insert(credential, role);
        self
    }

    pub fn insert(&mut self, credential: impl Into<String>, role: impl Into<String>) {
        self.roles.insert(credential.into(), role.into());
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl<C, R> FromIterator<(C, R)> for StaticIdentityResolver
where
    C: Into<String>,
    R: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (C, R)>>(iter: I) -> Self {
        let mut resolver = Self::new();
        for (credential, role) in iter {
            resolver.insert(credential, role);
        }
        resolver
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<String, IdentityError> {
        self.roles
            .get(credential)
            .cloned()
            .ok_or_else(|| IdentityError::UnknownCredential {
                credential: credential.to_string(),
            })
    }
}
