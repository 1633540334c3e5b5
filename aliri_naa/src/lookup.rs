//! Answering silent requests from the token cache

use std::fmt;

use aliri_clock::{Clock, DurationSecs};

use crate::{
    account::AccountInfo,
    adapter::NestedAppAuthAdapter,
    credential::{CredentialType, TokenStatus},
    request::ValidRequest,
    result::AuthenticationResult,
    storage::AuthStorage,
};

/// Why the cache could not answer a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CacheMiss {
    NoAccount,
    ForceRefresh,
    NoCachedCredential(CredentialType),
    StaleCredential(TokenStatus),
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NoAccount => f.write_str("no account could be resolved"),
            Self::ForceRefresh => f.write_str("caller asked to bypass the cache"),
            Self::NoCachedCredential(t) => write!(f, "no cached {:?} matches", t),
            Self::StaleCredential(s) => write!(f, "cached access token is {:?}", s),
        }
    }
}

/// Serves silent requests from cached tokens
///
/// A miss is never an error. An access token inside its renewal window, or
/// one cached after the current time, causes every credential of the account
/// to be evicted before the miss is reported.
pub struct CacheLookup<'a, C> {
    storage: &'a dyn AuthStorage,
    adapter: &'a NestedAppAuthAdapter,
    clock: &'a C,
    renewal_offset: DurationSecs,
}

impl<'a, C> fmt::Debug for CacheLookup<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CacheLookup")
            .field("renewal_offset", &self.renewal_offset)
            .finish()
    }
}

impl<'a, C: Clock + Sync> CacheLookup<'a, C> {
    /// Constructs a lookup over the given storage
    pub fn new(
        storage: &'a dyn AuthStorage,
        adapter: &'a NestedAppAuthAdapter,
        clock: &'a C,
        renewal_offset: DurationSecs,
    ) -> Self {
        Self {
            storage,
            adapter,
            clock,
            renewal_offset,
        }
    }

    /// Attempts to answer the request from the cache
    ///
    /// Returns `None` on any miss. No call is made to the host.
    pub async fn lookup_silent(
        &self,
        account: Option<&AccountInfo>,
        request: &ValidRequest,
    ) -> Option<AuthenticationResult> {
        match self.try_lookup(account, request).await {
            Ok(result) => {
                tracing::debug!(
                    correlation_id = %request.correlation_id(),
                    expires_on = result.expires_on().0,
                    "serving token from cache"
                );
                Some(result)
            }
            Err(miss) => {
                tracing::debug!(
                    correlation_id = %request.correlation_id(),
                    reason = %miss,
                    "token cache miss"
                );
                None
            }
        }
    }

    async fn try_lookup(
        &self,
        account: Option<&AccountInfo>,
        request: &ValidRequest,
    ) -> Result<AuthenticationResult, CacheMiss> {
        if request.force_refresh() {
            return Err(CacheMiss::ForceRefresh);
        }

        let account = account.ok_or(CacheMiss::NoAccount)?;
        let request = request.for_cache_lookup(account);
        let tenant_id = Some(&*account.tenant_id);

        let keys = self.storage.get_token_keys(account);
        let access_token = self
            .storage
            .get_access_token(account, &request, &keys, tenant_id)
            .ok_or(CacheMiss::NoCachedCredential(CredentialType::AccessToken))?;

        let status = access_token.token_status_with_clock(self.clock, self.renewal_offset);
        if !status.is_servable() {
            self.evict(account, &request).await;
            return Err(CacheMiss::StaleCredential(status));
        }

        let id_token = self
            .storage
            .get_id_token(account, &keys, tenant_id)
            .ok_or(CacheMiss::NoCachedCredential(CredentialType::IdToken))?;

        Ok(self
            .adapter
            .from_cached_tokens(account, &id_token, &access_token, &request))
    }

    async fn evict(&self, account: &AccountInfo, request: &ValidRequest) {
        if let Err(error) = self.storage.remove_account_context(account).await {
            tracing::warn!(
                correlation_id = %request.correlation_id(),
                home_account_id = %account.home_account_id,
                error = (&error as &dyn std::error::Error),
                "unable to evict stale credentials"
            );
        }
    }
}
