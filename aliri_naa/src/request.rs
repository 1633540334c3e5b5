//! Token requests
//!
//! Callers build an [`AuthRequest`] and hand it to one of the controller's
//! entry points. The controller tags it with the flow being performed and
//! normalizes it exactly once into a [`ValidRequest`], which is what every
//! later stage consumes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    account::AccountInfo, crypto::CryptoProvider, events::InteractionType, scope::ScopeSet,
    CorrelationId, CorrelationIdRef,
};

/// The token type requested from the authority
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthenticationScheme {
    /// A bearer token
    #[default]
    #[serde(rename = "Bearer")]
    Bearer,
    /// A proof-of-possession token
    #[serde(rename = "pop")]
    Pop,
    /// An SSH certificate
    #[serde(rename = "ssh-cert")]
    Ssh,
}

impl AuthenticationScheme {
    /// The scheme as it appears in cache keys and on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bearer => "Bearer",
            Self::Pop => "pop",
            Self::Ssh => "ssh-cert",
        }
    }
}

/// A request for tokens
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthRequest {
    /// The scopes to request; OIDC default scopes are used when empty
    pub scopes: ScopeSet,
    /// The account to acquire tokens for
    pub account: Option<AccountInfo>,
    /// An authority to use instead of the configured one
    pub authority: Option<String>,
    /// A correlation identifier; one is generated if absent
    pub correlation_id: Option<CorrelationId>,
    /// Additional claims to request, as a JSON object
    pub claims: Option<String>,
    /// Opaque state echoed back in the result
    pub state: Option<String>,
    /// Extra parameters forwarded to the authority by the host
    pub extra_query_parameters: BTreeMap<String, String>,
    /// The token type to request
    pub authentication_scheme: AuthenticationScheme,
}

impl AuthRequest {
    /// Constructs a request for the given scopes
    pub fn new(scopes: ScopeSet) -> Self {
        Self {
            scopes,
            ..Self::default()
        }
    }

    /// Requests tokens for a specific account
    pub fn with_account(mut self, account: AccountInfo) -> Self {
        self.account = Some(account);
        self
    }

    /// Uses the given correlation identifier
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Overrides the authority
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    /// Requests additional claims
    pub fn with_claims(mut self, claims: impl Into<String>) -> Self {
        self.claims = Some(claims.into());
        self
    }
}

/// A request for the silent entry point
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SilentRequest {
    /// The underlying request
    pub request: AuthRequest,
    /// Skips the token cache and always asks the host
    pub force_refresh: bool,
}

impl From<AuthRequest> for SilentRequest {
    fn from(request: AuthRequest) -> Self {
        Self {
            request,
            force_refresh: false,
        }
    }
}

/// A request tagged with the flow that will serve it
#[derive(Clone, Debug, PartialEq)]
pub enum TokenRequest {
    /// The host may interact with the user
    Interactive(AuthRequest),
    /// Silent acquisition, trying the cache first
    Silent(SilentRequest),
    /// Silent single sign-on
    SsoSilent(AuthRequest),
}

impl TokenRequest {
    /// The interaction type reported in events for this request
    pub fn interaction_type(&self) -> InteractionType {
        match self {
            Self::Interactive(_) => InteractionType::Popup,
            Self::Silent(_) | Self::SsoSilent(_) => InteractionType::Silent,
        }
    }

    pub(crate) fn into_valid(self, crypto: &dyn CryptoProvider) -> ValidRequest {
        let (kind, request) = match self {
            Self::Interactive(request) => (FlowKind::Interactive, request),
            Self::Silent(SilentRequest {
                request,
                force_refresh,
            }) => (FlowKind::Silent { force_refresh }, request),
            Self::SsoSilent(request) => (FlowKind::SsoSilent, request),
        };

        let correlation_id = request
            .correlation_id
            .filter(|c| !c.as_str().is_empty())
            .unwrap_or_else(|| CorrelationId::from(crypto.create_new_guid()));

        ValidRequest {
            kind,
            correlation_id,
            scopes: request.scopes,
            account: request.account,
            authority: request.authority,
            claims: request.claims,
            state: request.state,
            extra_query_parameters: request.extra_query_parameters,
            authentication_scheme: request.authentication_scheme,
        }
    }
}

/// The flow a normalized request belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowKind {
    /// Interactive acquisition through the host
    Interactive,
    /// Silent acquisition
    Silent {
        /// Whether the cache is skipped
        force_refresh: bool,
    },
    /// Silent single sign-on
    SsoSilent,
}

/// A request after normalization
///
/// The correlation identifier is fixed at construction and cannot be
/// replaced afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidRequest {
    kind: FlowKind,
    correlation_id: CorrelationId,
    scopes: ScopeSet,
    account: Option<AccountInfo>,
    authority: Option<String>,
    claims: Option<String>,
    state: Option<String>,
    extra_query_parameters: BTreeMap<String, String>,
    authentication_scheme: AuthenticationScheme,
}

impl ValidRequest {
    /// The flow this request belongs to
    #[inline]
    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    /// The correlation identifier
    #[inline]
    pub fn correlation_id(&self) -> &CorrelationIdRef {
        &self.correlation_id
    }

    /// The requested scopes, possibly empty
    #[inline]
    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// The requested scopes, or the OIDC default scopes when none were given
    pub fn effective_scopes(&self) -> ScopeSet {
        if self.scopes.is_empty() {
            ScopeSet::oidc_default()
        } else {
            self.scopes.clone()
        }
    }

    /// The account the request was made for
    #[inline]
    pub fn account(&self) -> Option<&AccountInfo> {
        self.account.as_ref()
    }

    /// The authority override
    #[inline]
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// Additional claims
    #[inline]
    pub fn claims(&self) -> Option<&str> {
        self.claims.as_deref()
    }

    /// Opaque caller state
    #[inline]
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Extra parameters for the authority
    #[inline]
    pub fn extra_query_parameters(&self) -> &BTreeMap<String, String> {
        &self.extra_query_parameters
    }

    /// The requested token type
    #[inline]
    pub fn authentication_scheme(&self) -> AuthenticationScheme {
        self.authentication_scheme
    }

    /// Whether the caller asked to bypass the cache
    #[inline]
    pub fn force_refresh(&self) -> bool {
        matches!(
            self.kind,
            FlowKind::Silent {
                force_refresh: true
            }
        )
    }

    /// Fills in the defaults used when answering from the cache
    ///
    /// The authority falls back to the account's environment and the scopes
    /// fall back to the OIDC default scopes. The correlation identifier is
    /// carried over unchanged.
    pub(crate) fn for_cache_lookup(&self, account: &AccountInfo) -> Self {
        let mut normalized = self.clone();
        if normalized.authority.is_none() {
            normalized.authority = Some(account.environment.clone());
        }
        normalized.scopes = self.effective_scopes();
        normalized
    }
}
