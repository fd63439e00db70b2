//! Token generation, constant-time comparison and validation.

use crate::db::TabRepository;
use crate::tab::{TabError, TabId, TabResult};
use async_trait::async_trait;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Random bytes behind every token (hex encoded on the wire)
pub const TOKEN_BYTES: usize = 32;

/// Opaque, unguessable per-tab credential
#[derive(Clone)]
pub struct TabToken(String);

impl TabToken {
    /// Generate a fresh token from the thread-local CSPRNG
    pub fn generate() -> Self {
        let bytes: [u8; TOKEN_BYTES] = rand::random();
        Self(hex::encode(bytes))
    }

    /// Wrap a token loaded from the store
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a presented token in constant time
    pub fn verify(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl PartialEq for TabToken {
    fn eq(&self, other: &Self) -> bool {
        self.verify(&other.0)
    }
}

impl Eq for TabToken {}

impl std::fmt::Debug for TabToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TabToken(<redacted>)")
    }
}

/// Checks a presented token against a tab
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Returns `Ok(false)` on mismatch and `TabError::TabNotFound` for unknown tabs
    async fn validate(&self, tab_id: TabId, token: &str) -> TabResult<bool>;
}

/// Validates tokens against the tab stored in the repository
pub struct RepositoryTokenValidator {
    repo: Arc<dyn TabRepository>,
}

impl RepositoryTokenValidator {
    pub fn new(repo: Arc<dyn TabRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl TokenValidator for RepositoryTokenValidator {
    async fn validate(&self, tab_id: TabId, token: &str) -> TabResult<bool> {
        let tab = self
            .repo
            .load_tab(tab_id)
            .await?
            .ok_or(TabError::TabNotFound(tab_id))?;

        Ok(tab.token.verify(token))
    }
}

/// Fail with `TabError::InvalidToken` unless `token` opens `tab_id`
pub(crate) async fn require_token(
    validator: &dyn TokenValidator,
    tab_id: TabId,
    token: &str,
) -> TabResult<()> {
    if validator.validate(tab_id, token).await? {
        Ok(())
    } else {
        log::warn!("SECURITY: rejected token for tab {tab_id}");
        Err(TabError::InvalidToken)
    }
}
