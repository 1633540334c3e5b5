//! The outcome of token acquisition

use aliri_clock::UnixTime;

use crate::{
    account::AccountInfo, claims::IdTokenClaims, request::AuthenticationScheme, scope::ScopeSet,
    AccessToken, AccessTokenRef, CorrelationId, CorrelationIdRef, IdToken, IdTokenRef,
    LocalAccountId, LocalAccountIdRef, RefreshToken, RefreshTokenRef, TenantId, TenantIdRef,
};

/// The outcome of a successful token acquisition
///
/// Results are built once, either from the cache or from a host response,
/// and are not modified afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticationResult {
    pub(crate) authority: String,
    pub(crate) unique_id: LocalAccountId,
    pub(crate) tenant_id: TenantId,
    pub(crate) scopes: ScopeSet,
    pub(crate) account: AccountInfo,
    pub(crate) id_token: IdToken,
    pub(crate) id_token_claims: IdTokenClaims,
    pub(crate) access_token: AccessToken,
    pub(crate) refresh_token: Option<RefreshToken>,
    pub(crate) from_cache: bool,
    pub(crate) expires_on: UnixTime,
    pub(crate) ext_expires_on: UnixTime,
    pub(crate) token_type: AuthenticationScheme,
    pub(crate) correlation_id: CorrelationId,
    pub(crate) state: Option<String>,
    pub(crate) cloud_graph_host_name: Option<String>,
    pub(crate) ms_graph_host: Option<String>,
}

impl AuthenticationResult {
    /// The authority that issued the tokens
    #[inline]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The account's identifier in its tenant
    #[inline]
    pub fn unique_id(&self) -> &LocalAccountIdRef {
        &self.unique_id
    }

    /// The tenant the tokens were issued in
    #[inline]
    pub fn tenant_id(&self) -> &TenantIdRef {
        &self.tenant_id
    }

    /// The scopes granted by the access token
    #[inline]
    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// The account the tokens belong to
    #[inline]
    pub fn account(&self) -> &AccountInfo {
        &self.account
    }

    /// The ID token
    #[inline]
    pub fn id_token(&self) -> &IdTokenRef {
        &self.id_token
    }

    /// Claims decoded from the ID token
    #[inline]
    pub fn id_token_claims(&self) -> &IdTokenClaims {
        &self.id_token_claims
    }

    /// The access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// The refresh token, if the host handed one over
    #[inline]
    pub fn refresh_token(&self) -> Option<&RefreshTokenRef> {
        self.refresh_token.as_deref()
    }

    /// Whether the result was served from the cache
    #[inline]
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// When the access token expires
    #[inline]
    pub fn expires_on(&self) -> UnixTime {
        self.expires_on
    }

    /// When the access token stops being usable during an authority outage
    #[inline]
    pub fn ext_expires_on(&self) -> UnixTime {
        self.ext_expires_on
    }

    /// The token type
    #[inline]
    pub fn token_type(&self) -> AuthenticationScheme {
        self.token_type
    }

    /// The correlation identifier of the request that produced this result
    #[inline]
    pub fn correlation_id(&self) -> &CorrelationIdRef {
        &self.correlation_id
    }

    /// The caller's opaque state
    #[inline]
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// The cloud graph host reported by the host
    #[inline]
    pub fn cloud_graph_host_name(&self) -> Option<&str> {
        self.cloud_graph_host_name.as_deref()
    }

    /// The Microsoft Graph host reported by the host
    #[inline]
    pub fn ms_graph_host(&self) -> Option<&str> {
        self.ms_graph_host.as_deref()
    }

    /// Length of the access token
    #[inline]
    pub fn access_token_size(&self) -> usize {
        self.access_token.as_str().len()
    }

    /// Length of the ID token
    #[inline]
    pub fn id_token_size(&self) -> usize {
        self.id_token.as_str().len()
    }
}
