//! An in-memory account and token cache

use std::collections::BTreeMap;

use aliri_clock::{Clock, System};
use arc_swap::ArcSwap;
use async_trait::async_trait;

use super::{AuthStorage, StorageError};
use crate::{
    account::{AccountEntity, AccountFilter, AccountInfo},
    credential::{CachedAccessToken, CachedIdToken, CachedRefreshToken, TokenKeys},
    request::ValidRequest,
    result::AuthenticationResult,
    ClientId, CorrelationIdRef, HomeAccountId, LocalAccountId, TenantIdRef,
};

#[derive(Clone, Debug, PartialEq, Eq)]
struct ActiveAccount {
    home_account_id: HomeAccountId,
    local_account_id: LocalAccountId,
}

#[derive(Clone, Debug, Default)]
struct Snapshot {
    accounts: BTreeMap<String, AccountEntity>,
    access_tokens: BTreeMap<String, CachedAccessToken>,
    id_tokens: BTreeMap<String, CachedIdToken>,
    refresh_tokens: BTreeMap<String, CachedRefreshToken>,
    active_account: Option<ActiveAccount>,
}

/// An in-memory cache of accounts and credentials
///
/// Every mutation swaps in a new snapshot, so readers never observe a
/// partially applied update.
#[derive(Debug)]
pub struct InMemoryStorage<C = System> {
    client_id: ClientId,
    data: ArcSwap<Snapshot>,
    clock: C,
}

impl InMemoryStorage<System> {
    /// Constructs an empty cache for the given client
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            data: ArcSwap::from_pointee(Snapshot::default()),
            clock: System,
        }
    }
}

impl<C> InMemoryStorage<C> {
    /// Sets a custom clock used to stamp cached tokens
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> InMemoryStorage<D> {
        InMemoryStorage {
            client_id: self.client_id,
            data: self.data,
            clock,
        }
    }

    /// The number of cached access tokens, across all accounts
    pub fn access_token_count(&self) -> usize {
        self.data.load().access_tokens.len()
    }

    /// Gets every cached access token held for the account
    pub fn access_tokens_for(&self, account: &AccountInfo) -> Vec<CachedAccessToken> {
        self.data
            .load()
            .access_tokens
            .values()
            .filter(|t| t.home_account_id == account.home_account_id)
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn remove_id_tokens_for(&self, account: &AccountInfo) {
        self.update(|snapshot| {
            snapshot
                .id_tokens
                .retain(|_, t| t.home_account_id != account.home_account_id)
        });
    }

    fn update(&self, f: impl Fn(&mut Snapshot)) {
        self.data.rcu(|current| {
            let mut next = Snapshot::clone(current);
            f(&mut next);
            next
        });
    }
}

#[async_trait]
impl<C: Clock + Send + Sync> AuthStorage for InMemoryStorage<C> {
    async fn initialize(&self, correlation_id: &CorrelationIdRef) -> Result<(), StorageError> {
        tracing::trace!(%correlation_id, "in-memory token cache ready");
        Ok(())
    }

    fn get_token_keys(&self, account: &AccountInfo) -> TokenKeys {
        let data = self.data.load();
        let home = &account.home_account_id;

        TokenKeys {
            id_token: data
                .id_tokens
                .iter()
                .filter(|(_, t)| t.home_account_id == *home)
                .map(|(k, _)| k.clone())
                .collect(),
            access_token: data
                .access_tokens
                .iter()
                .filter(|(_, t)| t.home_account_id == *home)
                .map(|(k, _)| k.clone())
                .collect(),
            refresh_token: data
                .refresh_tokens
                .iter()
                .filter(|(_, t)| t.home_account_id == *home)
                .map(|(k, _)| k.clone())
                .collect(),
        }
    }

    fn get_access_token(
        &self,
        account: &AccountInfo,
        request: &ValidRequest,
        keys: &TokenKeys,
        tenant_id: Option<&TenantIdRef>,
    ) -> Option<CachedAccessToken> {
        let search = request.effective_scopes().search_scopes();
        let data = self.data.load();

        let mut matches = keys
            .access_token
            .iter()
            .filter_map(|k| data.access_tokens.get(k))
            .filter(|t| {
                t.home_account_id == account.home_account_id
                    && t.environment.eq_ignore_ascii_case(&account.environment)
                    && tenant_id.map_or(true, |tid| t.realm.as_str() == tid.as_str())
                    && t.client_id == self.client_id
                    && t.token_type == request.authentication_scheme()
                    && t.target.contains_all(&search)
            });

        let first = matches.next().cloned();
        let others = matches.count();
        if others > 0 {
            tracing::debug!(
                matching = others + 1,
                "multiple cached access tokens match request, using the first"
            );
        }

        first
    }

    fn get_id_token(
        &self,
        account: &AccountInfo,
        keys: &TokenKeys,
        tenant_id: Option<&TenantIdRef>,
    ) -> Option<CachedIdToken> {
        let data = self.data.load();

        keys.id_token
            .iter()
            .filter_map(|k| data.id_tokens.get(k))
            .find(|t| {
                t.home_account_id == account.home_account_id
                    && t.environment.eq_ignore_ascii_case(&account.environment)
                    && tenant_id.map_or(true, |tid| t.realm.as_str() == tid.as_str())
                    && t.client_id == self.client_id
            })
            .cloned()
    }

    fn set_account(&self, entity: AccountEntity) {
        let key = entity.cache_key();
        tracing::trace!(account = %key, "storing account");
        self.update(|snapshot| {
            snapshot.accounts.insert(key.clone(), entity.clone());
        });
    }

    fn get_all_accounts(&self, filter: &AccountFilter) -> Vec<AccountInfo> {
        self.data
            .load()
            .accounts
            .values()
            .map(AccountEntity::to_account_info)
            .filter(|a| filter.matches(a))
            .collect()
    }

    fn set_active_account(&self, account: Option<&AccountInfo>) {
        let active = account.map(|a| ActiveAccount {
            home_account_id: a.home_account_id.clone(),
            local_account_id: a.local_account_id.clone(),
        });
        self.update(|snapshot| snapshot.active_account = active.clone());
    }

    fn get_active_account(&self) -> Option<AccountInfo> {
        let data = self.data.load();
        let active = data.active_account.as_ref()?;

        data.accounts
            .values()
            .find(|e| {
                e.home_account_id == active.home_account_id
                    && e.local_account_id == active.local_account_id
            })
            .map(AccountEntity::to_account_info)
    }

    async fn remove_account_context(&self, account: &AccountInfo) -> Result<(), StorageError> {
        let home = &account.home_account_id;
        self.update(|snapshot| {
            snapshot.access_tokens.retain(|_, t| t.home_account_id != *home);
            snapshot.id_tokens.retain(|_, t| t.home_account_id != *home);
            snapshot.refresh_tokens.retain(|_, t| t.home_account_id != *home);
        });
        tracing::debug!(home_account_id = %home, "removed cached credentials for account");
        Ok(())
    }

    async fn hydrate_cache(
        &self,
        result: &AuthenticationResult,
        request: &ValidRequest,
    ) -> Result<(), StorageError> {
        let account = result.account();
        let cached_at = self.clock.now();
        let target = if result.scopes().is_empty() {
            request.effective_scopes()
        } else {
            result.scopes().clone()
        };

        let access_token = CachedAccessToken {
            secret: result.access_token().to_owned(),
            home_account_id: account.home_account_id.clone(),
            environment: account.environment.clone(),
            realm: result.tenant_id().to_owned(),
            client_id: self.client_id.clone(),
            target,
            token_type: result.token_type(),
            cached_at,
            expires_on: result.expires_on(),
            extended_expires_on: result.ext_expires_on(),
        };

        let id_token = CachedIdToken {
            secret: result.id_token().to_owned(),
            claims: result.id_token_claims().clone(),
            home_account_id: account.home_account_id.clone(),
            environment: account.environment.clone(),
            realm: result.tenant_id().to_owned(),
            client_id: self.client_id.clone(),
        };

        let refresh_token = result.refresh_token().map(|rt| CachedRefreshToken {
            secret: rt.to_owned(),
            home_account_id: account.home_account_id.clone(),
            environment: account.environment.clone(),
            client_id: self.client_id.clone(),
        });

        self.update(|snapshot| {
            snapshot.access_tokens.retain(|_, existing| {
                !(existing.home_account_id == access_token.home_account_id
                    && existing.environment.eq_ignore_ascii_case(&access_token.environment)
                    && existing.realm == access_token.realm
                    && existing.client_id == access_token.client_id
                    && existing.token_type == access_token.token_type
                    && existing.target.intersects(&access_token.target))
            });
            snapshot
                .access_tokens
                .insert(access_token.cache_key(), access_token.clone());
            snapshot
                .id_tokens
                .insert(id_token.cache_key(), id_token.clone());
            if let Some(rt) = &refresh_token {
                snapshot.refresh_tokens.insert(rt.cache_key(), rt.clone());
            }
        });

        tracing::debug!(
            home_account_id = %account.home_account_id,
            has_refresh_token = refresh_token.is_some(),
            expires_on = result.expires_on().0,
            "hydrated token cache"
        );

        Ok(())
    }
}
