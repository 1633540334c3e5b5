//! Controller configuration

use aliri_clock::DurationSecs;
use serde::{Deserialize, Serialize};

use crate::ClientId;

/// The authority used when none is configured
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common";

/// How long before expiry a cached access token stops being served by default
pub const DEFAULT_TOKEN_RENEWAL_OFFSET: DurationSecs = DurationSecs(300);

/// Configuration for a nested app auth controller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedAppAuthConfig {
    client_id: ClientId,
    #[serde(default = "default_authority")]
    authority: String,
    #[serde(
        default = "default_renewal_offset",
        rename = "tokenRenewalOffsetSeconds",
        with = "seconds"
    )]
    token_renewal_offset: DurationSecs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    client_capabilities: Vec<String>,
    #[serde(default = "default_use_cache_for_lookup")]
    use_cache_for_lookup: bool,
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_owned()
}

fn default_renewal_offset() -> DurationSecs {
    DEFAULT_TOKEN_RENEWAL_OFFSET
}

fn default_use_cache_for_lookup() -> bool {
    true
}

mod seconds {
    use aliri_clock::DurationSecs;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DurationSecs, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DurationSecs, D::Error> {
        Ok(DurationSecs(u64::deserialize(deserializer)?))
    }
}

impl NestedAppAuthConfig {
    /// Constructs a configuration for the given client with default settings
    ///
    /// Uses the multi-tenant `common` authority and a renewal offset of
    /// five minutes, with no client capabilities. Silent requests are
    /// answered from the local cache when possible.
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            authority: default_authority(),
            token_renewal_offset: DEFAULT_TOKEN_RENEWAL_OFFSET,
            client_capabilities: Vec::new(),
            use_cache_for_lookup: default_use_cache_for_lookup(),
        }
    }

    /// Sets the authority tokens are requested from
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Sets how long before expiry a cached access token stops being served
    pub fn with_token_renewal_offset(mut self, offset: DurationSecs) -> Self {
        self.token_renewal_offset = offset;
        self
    }

    /// Declares a client capability, such as `CP1`
    pub fn with_client_capability(mut self, capability: impl Into<String>) -> Self {
        self.client_capabilities.push(capability.into());
        self
    }

    /// Sets whether silent requests may be answered from the local cache
    ///
    /// When disabled, every request goes to the host. Accounts and tokens
    /// returned by the host are still written to storage.
    pub fn with_cache_for_lookup(mut self, enabled: bool) -> Self {
        self.use_cache_for_lookup = enabled;
        self
    }

    /// The nested application's client ID
    #[inline]
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// The configured authority
    #[inline]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The renewal offset
    #[inline]
    pub fn token_renewal_offset(&self) -> DurationSecs {
        self.token_renewal_offset
    }

    /// The declared client capabilities
    #[inline]
    pub fn client_capabilities(&self) -> &[String] {
        &self.client_capabilities
    }

    /// Whether silent requests may be answered from the local cache
    #[inline]
    pub fn use_cache_for_lookup(&self) -> bool {
        self.use_cache_for_lookup
    }
}
