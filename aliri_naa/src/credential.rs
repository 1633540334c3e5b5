//! Cached credentials and their lifetime status

use aliri_clock::{Clock, DurationSecs, UnixTime};
use serde::{Deserialize, Serialize};

use crate::{
    claims::IdTokenClaims, request::AuthenticationScheme, scope::ScopeSet, AccessToken, ClientId,
    HomeAccountId, IdToken, RefreshToken, TenantId,
};

/// The kind of credential held in the cache
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialType {
    /// An access token
    AccessToken,
    /// An ID token
    IdToken,
    /// A refresh token
    RefreshToken,
}

impl CredentialType {
    fn as_key_part(self) -> &'static str {
        match self {
            Self::AccessToken => "accesstoken",
            Self::IdToken => "idtoken",
            Self::RefreshToken => "refreshtoken",
        }
    }
}

/// Builds a credential cache key
///
/// Keys take the form
/// `home_account_id-environment-credential_type-client_id-realm-target`,
/// lowercased.
pub fn credential_key(
    home_account_id: &str,
    environment: &str,
    credential_type: CredentialType,
    client_id: &str,
    realm: &str,
    target: &str,
) -> String {
    format!(
        "{}-{}-{}-{}-{}-{}",
        home_account_id,
        environment,
        credential_type.as_key_part(),
        client_id,
        realm,
        target
    )
    .to_ascii_lowercase()
}

/// The cache keys of every credential held for an account
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenKeys {
    /// ID token keys
    pub id_token: Vec<String>,
    /// Access token keys
    pub access_token: Vec<String>,
    /// Refresh token keys
    pub refresh_token: Vec<String>,
}

impl TokenKeys {
    /// Whether no credentials are held
    pub fn is_empty(&self) -> bool {
        self.id_token.is_empty() && self.access_token.is_empty() && self.refresh_token.is_empty()
    }
}

/// An access token's lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    /// The token is valid and outside the renewal window
    Fresh,
    /// The token is valid, but within the renewal window
    Stale,
    /// The token is no longer valid
    Expired,
    /// The token claims to have been cached in the future, so the clock has
    /// moved backwards since
    ClockTurnedBack,
}

impl TokenStatus {
    /// Whether a token in this state may be handed out without renewal
    #[inline]
    pub fn is_servable(self) -> bool {
        matches!(self, Self::Fresh)
    }
}

/// A cached access token
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedAccessToken {
    /// The token
    pub secret: AccessToken,
    /// The account the token was issued to
    pub home_account_id: HomeAccountId,
    /// The issuing environment
    pub environment: String,
    /// The tenant the token was issued in
    pub realm: TenantId,
    /// The client the token was issued to
    pub client_id: ClientId,
    /// The scopes the token grants
    pub target: ScopeSet,
    /// The token type
    pub token_type: AuthenticationScheme,
    /// When the token was written to the cache
    pub cached_at: UnixTime,
    /// When the token expires
    pub expires_on: UnixTime,
    /// When the token stops being usable during an authority outage
    pub extended_expires_on: UnixTime,
}

impl CachedAccessToken {
    /// The key under which the token is cached
    pub fn cache_key(&self) -> String {
        credential_key(
            self.home_account_id.as_str(),
            &self.environment,
            CredentialType::AccessToken,
            self.client_id.as_str(),
            self.realm.as_str(),
            &self.target.to_key_string(),
        )
    }

    /// Gets the token's lifetime status based on the current time
    /// as reported by the provided clock
    #[inline]
    pub fn token_status_with_clock<C: Clock>(
        &self,
        clock: &C,
        renewal_offset: DurationSecs,
    ) -> TokenStatus {
        self.token_status_at(clock.now(), renewal_offset)
    }

    /// Gets the token's lifetime status as of the provided time
    ///
    /// The token is stale once `time` reaches `expires_on - renewal_offset`.
    pub fn token_status_at(&self, time: UnixTime, renewal_offset: DurationSecs) -> TokenStatus {
        if self.cached_at > time {
            TokenStatus::ClockTurnedBack
        } else if time >= self.expires_on {
            TokenStatus::Expired
        } else if time.0.saturating_add(renewal_offset.0) >= self.expires_on.0 {
            TokenStatus::Stale
        } else {
            TokenStatus::Fresh
        }
    }
}

/// A cached ID token
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedIdToken {
    /// The token
    pub secret: IdToken,
    /// Claims decoded from the token
    pub claims: IdTokenClaims,
    /// The account the token was issued to
    pub home_account_id: HomeAccountId,
    /// The issuing environment
    pub environment: String,
    /// The tenant the token was issued in
    pub realm: TenantId,
    /// The client the token was issued to
    pub client_id: ClientId,
}

impl CachedIdToken {
    /// The key under which the token is cached
    pub fn cache_key(&self) -> String {
        credential_key(
            self.home_account_id.as_str(),
            &self.environment,
            CredentialType::IdToken,
            self.client_id.as_str(),
            self.realm.as_str(),
            "",
        )
    }
}

/// A cached refresh token
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedRefreshToken {
    /// The token
    pub secret: RefreshToken,
    /// The account the token was issued to
    pub home_account_id: HomeAccountId,
    /// The issuing environment
    pub environment: String,
    /// The client the token was issued to
    pub client_id: ClientId,
}

impl CachedRefreshToken {
    /// The key under which the token is cached
    pub fn cache_key(&self) -> String {
        credential_key(
            self.home_account_id.as_str(),
            &self.environment,
            CredentialType::RefreshToken,
            self.client_id.as_str(),
            "",
            "",
        )
    }
}
