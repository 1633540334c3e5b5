//! Translation between this crate's types and the host bridge's messages

use aliri_clock::UnixTime;

use crate::{
    account::AccountInfo,
    bridge::dto::{BridgeError, BridgeStatusCode, NaaAccountInfo, NaaResponse, NaaTokenRequest},
    claims::{extract_token_claims, IdTokenClaims},
    config::NestedAppAuthConfig,
    credential::{CachedAccessToken, CachedIdToken},
    error::{AuthError, BridgeFailure, BridgeFailureKind},
    request::ValidRequest,
    result::AuthenticationResult,
    scope::ScopeSet,
    ClientId, HomeAccountId, LocalAccountId, TenantId,
};

const CLOUD_GRAPH_HOST_NAME: &str = "cloud_graph_host_name";
const MS_GRAPH_HOST: &str = "msgraph_host";

/// Converts requests, responses and errors to and from the host's shapes
///
/// Every conversion is pure. Nothing here talks to the host or to storage.
#[derive(Clone, Debug)]
pub struct NestedAppAuthAdapter {
    client_id: ClientId,
    authority: String,
    client_capabilities: Vec<String>,
}

impl NestedAppAuthAdapter {
    /// Constructs an adapter for the configured client
    pub fn new(config: &NestedAppAuthConfig) -> Self {
        Self {
            client_id: config.client_id().clone(),
            authority: config.authority().to_owned(),
            client_capabilities: config.client_capabilities().to_vec(),
        }
    }

    /// Builds the message sent to the host for a request
    pub fn to_naa_token_request(&self, request: &ValidRequest) -> Result<NaaTokenRequest, AuthError> {
        Ok(NaaTokenRequest {
            platform_broker_id: request.account().map(|a| a.home_account_id.clone()),
            client_id: self.client_id.clone(),
            authority: request
                .authority()
                .unwrap_or(&self.authority)
                .to_owned(),
            scope: request.effective_scopes().to_string(),
            correlation_id: request.correlation_id().to_owned(),
            claims: self.merge_claims(request.claims())?,
            state: request.state().map(ToOwned::to_owned),
            authentication_scheme: request.authentication_scheme(),
            extra_parameters: request.extra_query_parameters().clone(),
        })
    }

    /// Adds the client capabilities to the requested claims
    ///
    /// Without capabilities the claims are passed through untouched.
    fn merge_claims(&self, claims: Option<&str>) -> Result<Option<String>, AuthError> {
        let claims = claims.filter(|c| !c.trim().is_empty());
        if self.client_capabilities.is_empty() {
            return Ok(claims.map(ToOwned::to_owned));
        }

        let mut root = match claims {
            Some(c) => match serde_json::from_str::<serde_json::Value>(c) {
                Ok(serde_json::Value::Object(map)) => map,
                Ok(_) => {
                    return Err(AuthError::InvalidClaimsRequest(
                        "claims must be a JSON object".into(),
                    ))
                }
                Err(e) => return Err(AuthError::InvalidClaimsRequest(e.to_string())),
            },
            None => serde_json::Map::new(),
        };

        let access_token = root
            .entry("access_token")
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        match access_token {
            serde_json::Value::Object(map) => {
                map.insert(
                    "xms_cc".into(),
                    serde_json::json!({ "values": self.client_capabilities }),
                );
            }
            _ => {
                return Err(AuthError::InvalidClaimsRequest(
                    "access_token claims must be a JSON object".into(),
                ))
            }
        }

        Ok(Some(serde_json::Value::Object(root).to_string()))
    }

    /// Builds a result from the host's response
    ///
    /// `request_timestamp` is the time the request was sent; the host reports
    /// expiry relative to it.
    pub fn from_naa_token_response(
        &self,
        request: &ValidRequest,
        response: NaaResponse,
        request_timestamp: UnixTime,
    ) -> Result<AuthenticationResult, AuthError> {
        let NaaResponse { token, account } = response;

        let id_token = token
            .id_token
            .ok_or_else(|| BridgeFailure::invalid_response("response is missing an ID token"))?;
        let access_token = token.access_token.ok_or_else(|| {
            BridgeFailure::invalid_response("response is missing an access token")
        })?;

        let claims = extract_token_claims(&id_token).map_err(|e| {
            BridgeFailure::invalid_response(format!("unable to decode ID token: {}", e))
        })?;
        let account = self.from_naa_account_info(&account, Some(&claims))?;

        let scopes = match token.scope.as_deref() {
            Some(scope) if !scope.trim().is_empty() => scope.parse::<ScopeSet>().map_err(|e| {
                BridgeFailure::invalid_response(format!("response scopes are invalid: {}", e))
            })?,
            _ => request.effective_scopes(),
        };

        let expires_on = token
            .expires_in
            .checked_add(request_timestamp.0)
            .map(UnixTime)
            .ok_or_else(|| BridgeFailure::invalid_response("expires_in is out of range"))?;
        let property = |name: &str| {
            token
                .properties
                .get(name)
                .and_then(|v| v.as_str())
                .map(ToOwned::to_owned)
        };

        Ok(AuthenticationResult {
            authority: token
                .authority
                .clone()
                .unwrap_or_else(|| account.environment.clone()),
            unique_id: account.local_account_id.clone(),
            tenant_id: account.tenant_id.clone(),
            scopes,
            id_token,
            id_token_claims: claims,
            access_token,
            refresh_token: token.refresh_token.clone(),
            from_cache: false,
            expires_on,
            ext_expires_on: expires_on,
            token_type: request.authentication_scheme(),
            correlation_id: request.correlation_id().to_owned(),
            state: request.state().map(ToOwned::to_owned),
            cloud_graph_host_name: property(CLOUD_GRAPH_HOST_NAME),
            ms_graph_host: property(MS_GRAPH_HOST),
            account,
        })
    }

    /// Builds an account from the host's description, filling gaps from the
    /// ID token's claims
    ///
    /// The home account identifier falls back to `<local id>.<tenant id>`.
    pub fn from_naa_account_info(
        &self,
        account: &NaaAccountInfo,
        claims: Option<&IdTokenClaims>,
    ) -> Result<AccountInfo, AuthError> {
        let local_account_id = account
            .local_account_id
            .clone()
            .or_else(|| {
                claims
                    .and_then(|c| c.oid.clone().or_else(|| c.sub.clone()))
                    .map(LocalAccountId::from)
            })
            .ok_or_else(|| BridgeFailure::invalid_response("account has no local identifier"))?;

        let tenant_id = account
            .tenant_id
            .clone()
            .or_else(|| claims.and_then(|c| c.tid.clone()).map(TenantId::from))
            .ok_or_else(|| BridgeFailure::invalid_response("account has no tenant"))?;

        let home_account_id = account.home_account_id.clone().unwrap_or_else(|| {
            HomeAccountId::from(format!("{}.{}", local_account_id, tenant_id))
        });

        Ok(AccountInfo {
            home_account_id,
            environment: account.environment.clone(),
            tenant_id,
            username: account
                .username
                .clone()
                .or_else(|| claims.and_then(|c| c.preferred_username.clone()))
                .unwrap_or_default(),
            local_account_id,
            name: account
                .name
                .clone()
                .or_else(|| claims.and_then(|c| c.name.clone())),
            id_token_claims: claims.cloned(),
        })
    }

    /// Translates a host failure into this crate's error taxonomy
    pub fn from_bridge_error(&self, error: &BridgeError) -> AuthError {
        let (kind, default_code) = match error.status {
            BridgeStatusCode::UserCancel => (BridgeFailureKind::UserCancelled, "user_cancelled"),
            BridgeStatusCode::NoNetwork => (
                BridgeFailureKind::NoNetworkConnectivity,
                "no_network_connectivity",
            ),
            BridgeStatusCode::AccountUnavailable => {
                (BridgeFailureKind::NoAccountFound, "no_account_found")
            }
            BridgeStatusCode::Disabled => (
                BridgeFailureKind::BridgeDisabled,
                "nested_app_auth_bridge_disabled",
            ),
            BridgeStatusCode::NestedAppAuthUnavailable => (
                BridgeFailureKind::BridgeUnavailable,
                "nested_app_auth_bridge_disabled",
            ),
            BridgeStatusCode::TransientError | BridgeStatusCode::PersistentError => {
                (BridgeFailureKind::Server, "server_error")
            }
            BridgeStatusCode::UserInteractionRequired => {
                (BridgeFailureKind::InteractionRequired, "interaction_required")
            }
            BridgeStatusCode::Unknown => (BridgeFailureKind::Unknown, "unknown_error"),
        };

        AuthError::Bridge(BridgeFailure {
            kind,
            code: error
                .code
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| default_code.to_owned()),
            description: error.description.clone(),
            sub_error: error.sub_error.clone(),
        })
    }

    /// Builds a result from cached tokens
    ///
    /// `request` must already be normalized for a cache lookup.
    pub fn from_cached_tokens(
        &self,
        account: &AccountInfo,
        id_token: &CachedIdToken,
        access_token: &CachedAccessToken,
        request: &ValidRequest,
    ) -> AuthenticationResult {
        let mut account = account.clone();
        if account.id_token_claims.is_none() {
            account.id_token_claims = Some(id_token.claims.clone());
        }

        AuthenticationResult {
            authority: request
                .authority()
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| account.environment.clone()),
            unique_id: account.local_account_id.clone(),
            tenant_id: access_token.realm.clone(),
            scopes: access_token.target.clone(),
            id_token: id_token.secret.clone(),
            id_token_claims: id_token.claims.clone(),
            access_token: access_token.secret.clone(),
            refresh_token: None,
            from_cache: true,
            expires_on: access_token.expires_on,
            ext_expires_on: access_token.extended_expires_on,
            token_type: access_token.token_type,
            correlation_id: request.correlation_id().to_owned(),
            state: request.state().map(ToOwned::to_owned),
            cloud_graph_host_name: None,
            ms_graph_host: None,
            account,
        }
    }
}
