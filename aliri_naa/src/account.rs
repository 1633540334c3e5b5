//! Accounts and account filtering

use serde::{Deserialize, Serialize};

use crate::{claims::IdTokenClaims, HomeAccountId, LocalAccountId, TenantId};

/// An account known to this application
///
/// Accounts are owned by the storage layer. Requests and results hold
/// transient copies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    /// Identifier of the account across tenants
    pub home_account_id: HomeAccountId,
    /// The host of the authority that issued the account's tokens
    pub environment: String,
    /// The tenant the account was signed in to
    pub tenant_id: TenantId,
    /// The username used to sign in
    pub username: String,
    /// Identifier of the account in its tenant
    pub local_account_id: LocalAccountId,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Claims from the most recent ID token for this account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_claims: Option<IdTokenClaims>,
}

/// The persisted form of an account
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEntity {
    /// Identifier of the account across tenants
    pub home_account_id: HomeAccountId,
    /// The host of the authority that issued the account's tokens
    pub environment: String,
    /// The tenant the account was signed in to
    pub realm: TenantId,
    /// Identifier of the account in its tenant
    pub local_account_id: LocalAccountId,
    /// The username used to sign in
    pub username: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Claims from the most recent ID token for this account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_claims: Option<IdTokenClaims>,
    /// Cloud graph host reported alongside the account's tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_graph_host_name: Option<String>,
    /// Microsoft Graph host reported alongside the account's tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms_graph_host: Option<String>,
}

impl AccountEntity {
    /// Derives the storage entity for an account
    pub fn from_account_info(
        account: &AccountInfo,
        cloud_graph_host_name: Option<&str>,
        ms_graph_host: Option<&str>,
    ) -> Self {
        Self {
            home_account_id: account.home_account_id.clone(),
            environment: account.environment.clone(),
            realm: account.tenant_id.clone(),
            local_account_id: account.local_account_id.clone(),
            username: account.username.clone(),
            name: account.name.clone(),
            id_token_claims: account.id_token_claims.clone(),
            cloud_graph_host_name: cloud_graph_host_name.map(ToOwned::to_owned),
            ms_graph_host: ms_graph_host.map(ToOwned::to_owned),
        }
    }

    /// The account as presented to callers
    pub fn to_account_info(&self) -> AccountInfo {
        AccountInfo {
            home_account_id: self.home_account_id.clone(),
            environment: self.environment.clone(),
            tenant_id: self.realm.clone(),
            username: self.username.clone(),
            local_account_id: self.local_account_id.clone(),
            name: self.name.clone(),
            id_token_claims: self.id_token_claims.clone(),
        }
    }

    /// The key under which the entity is stored
    pub fn cache_key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.home_account_id, self.environment, self.realm
        )
        .to_ascii_lowercase()
    }
}

/// Criteria for selecting accounts from storage
///
/// Unset criteria match any account. An empty filter matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountFilter {
    /// Match on the home account identifier
    pub home_account_id: Option<HomeAccountId>,
    /// Match on the local account identifier
    pub local_account_id: Option<LocalAccountId>,
    /// Match on the tenant
    pub tenant_id: Option<TenantId>,
    /// Match on the username, ignoring ASCII case
    pub username: Option<String>,
    /// Match on the environment
    pub environment: Option<String>,
}

impl AccountFilter {
    /// A filter that matches a single home account identifier
    pub fn by_home_account_id(home_account_id: HomeAccountId) -> Self {
        Self {
            home_account_id: Some(home_account_id),
            ..Self::default()
        }
    }

    /// Whether the account satisfies every set criterion
    pub fn matches(&self, account: &AccountInfo) -> bool {
        self.home_account_id
            .as_ref()
            .map_or(true, |id| *id == account.home_account_id)
            && self
                .local_account_id
                .as_ref()
                .map_or(true, |id| *id == account.local_account_id)
            && self
                .tenant_id
                .as_ref()
                .map_or(true, |id| *id == account.tenant_id)
            && self
                .username
                .as_ref()
                .map_or(true, |u| u.eq_ignore_ascii_case(&account.username))
            && self
                .environment
                .as_ref()
                .map_or(true, |e| e.eq_ignore_ascii_case(&account.environment))
    }
}
