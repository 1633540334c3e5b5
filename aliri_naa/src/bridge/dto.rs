//! Messages exchanged with the host bridge

use std::{collections::BTreeMap, error, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    request::AuthenticationScheme, AccessToken, ClientId, CorrelationId, HomeAccountId, IdToken,
    LocalAccountId, RefreshToken, TenantId,
};

/// A token request sent to the host
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NaaTokenRequest {
    /// The home account the host should acquire tokens for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_broker_id: Option<HomeAccountId>,
    /// The nested application's client ID
    pub client_id: ClientId,
    /// The authority to request tokens from
    pub authority: String,
    /// Space-delimited scopes
    pub scope: String,
    /// The correlation identifier of the originating request
    pub correlation_id: CorrelationId,
    /// Claims to request, as a JSON object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<String>,
    /// Opaque caller state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// The token type to request
    #[serde(default)]
    pub authentication_scheme: AuthenticationScheme,
    /// Extra parameters forwarded to the authority
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_parameters: BTreeMap<String, String>,
}

/// The tokens returned by the host
///
/// Field names follow the OAuth2 token response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NaaTokenResponse {
    /// The access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<AccessToken>,
    /// Seconds until the access token expires, counted from the request
    #[serde(default)]
    pub expires_in: u64,
    /// The ID token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<IdToken>,
    /// The refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<RefreshToken>,
    /// Space-delimited scopes granted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// The authority that issued the tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    /// Additional host-specific properties
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// An account as described by the host
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NaaAccountInfo {
    /// Identifier of the account across tenants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_account_id: Option<HomeAccountId>,
    /// The host of the authority that issued the account's tokens
    pub environment: String,
    /// The tenant the account was signed in to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    /// The username used to sign in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Identifier of the account in its tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_account_id: Option<LocalAccountId>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A successful token response from the host
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NaaResponse {
    /// The tokens
    pub token: NaaTokenResponse,
    /// The account the tokens were issued to
    pub account: NaaAccountInfo,
}

/// The status reported with a host failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgeStatusCode {
    /// The user dismissed the host's prompt
    UserCancel,
    /// The host has no network connectivity
    NoNetwork,
    /// The host does not know the requested account
    AccountUnavailable,
    /// The host has disabled nested app auth for this application
    Disabled,
    /// The host does not offer nested app auth
    NestedAppAuthUnavailable,
    /// A transient identity provider failure
    TransientError,
    /// A persistent identity provider failure
    PersistentError,
    /// The user must interact with the host to proceed
    UserInteractionRequired,
    /// A status not known to this crate
    #[serde(other)]
    Unknown,
}

/// A failure reported by the host bridge
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeError {
    /// The failure status
    pub status: BridgeStatusCode,
    /// The error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// A finer-grained error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_error: Option<String>,
    /// A human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Additional host-specific properties
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl BridgeError {
    /// Constructs an error with only a status
    pub fn new(status: BridgeStatusCode) -> Self {
        Self {
            status,
            code: None,
            sub_error: None,
            description: None,
            properties: serde_json::Map::new(),
        }
    }

    /// Adds an error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Adds a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "host bridge reported {:?}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, ": {}", code)?;
        }
        if let Some(description) = &self.description {
            write!(f, " ({})", description)?;
        }
        Ok(())
    }
}

impl error::Error for BridgeError {}

/// The host's view of the signed-in account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountContext {
    /// Identifier of the account across tenants
    pub home_account_id: HomeAccountId,
    /// The host of the authority that issued the account's tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// The tenant the account was signed in to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
}

/// What the host supports
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCapabilities {
    /// Whether the host can report its active account
    #[serde(default)]
    pub query_account: bool,
}
