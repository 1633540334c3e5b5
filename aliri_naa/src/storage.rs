//! Token and account storage

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    account::{AccountEntity, AccountFilter, AccountInfo},
    credential::{CachedAccessToken, CachedIdToken, TokenKeys},
    request::ValidRequest,
    result::AuthenticationResult,
    CorrelationIdRef, TenantIdRef,
};

pub mod in_memory;

pub use in_memory::InMemoryStorage;

/// An error raised by a storage backend
#[derive(Clone, Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or initialized
    #[error("token cache unavailable: {0}")]
    Unavailable(String),
    /// A write was rejected
    #[error("unable to write {entity} to token cache: {reason}")]
    Write {
        /// The kind of entity being written
        entity: &'static str,
        /// Why the write failed
        reason: String,
    },
}

/// Storage for accounts and cached credentials
///
/// Implementations are responsible for their own consistency under
/// concurrent callers. Reads are synchronous; only removal and hydration may
/// suspend.
#[async_trait]
pub trait AuthStorage: Send + Sync {
    /// Prepares the backend for use
    async fn initialize(&self, correlation_id: &CorrelationIdRef) -> Result<(), StorageError>;

    /// Gets the keys of every credential held for the account
    fn get_token_keys(&self, account: &AccountInfo) -> TokenKeys;

    /// Gets an access token for the account that satisfies the request
    ///
    /// When several tokens match, the backend decides which one is returned.
    fn get_access_token(
        &self,
        account: &AccountInfo,
        request: &ValidRequest,
        keys: &TokenKeys,
        tenant_id: Option<&TenantIdRef>,
    ) -> Option<CachedAccessToken>;

    /// Gets the ID token for the account
    fn get_id_token(
        &self,
        account: &AccountInfo,
        keys: &TokenKeys,
        tenant_id: Option<&TenantIdRef>,
    ) -> Option<CachedIdToken>;

    /// Inserts or replaces an account
    fn set_account(&self, entity: AccountEntity);

    /// Gets every account matching the filter
    fn get_all_accounts(&self, filter: &AccountFilter) -> Vec<AccountInfo>;

    /// Gets the first account matching the filter
    fn get_account(&self, filter: &AccountFilter) -> Option<AccountInfo> {
        self.get_all_accounts(filter).into_iter().next()
    }

    /// Sets or clears the active account
    fn set_active_account(&self, account: Option<&AccountInfo>);

    /// Gets the active account
    fn get_active_account(&self) -> Option<AccountInfo>;

    /// Removes every credential held for the account
    async fn remove_account_context(&self, account: &AccountInfo) -> Result<(), StorageError>;

    /// Persists the tokens of a freshly acquired result
    ///
    /// Must be all-or-nothing: a failed hydration leaves the cache unchanged.
    async fn hydrate_cache(
        &self,
        result: &AuthenticationResult,
        request: &ValidRequest,
    ) -> Result<(), StorageError>;
}
