//! Errors surfaced by nested app authentication

use std::fmt;

use thiserror::Error;

use crate::storage::StorageError;

/// An error returned to callers of the nested app auth controller
///
/// Cache misses never appear here. They are handled inside the lookup engine
/// and result in a call to the host bridge instead.
#[derive(Clone, Debug, Error)]
pub enum AuthError {
    /// The operation is not available when authenticating through a host
    #[error("{operation} is not supported in nested app auth mode")]
    UnsupportedOperation {
        /// The name of the rejected operation
        operation: &'static str,
    },
    /// The host bridge reported a failure, or returned something unusable
    #[error(transparent)]
    Bridge(#[from] BridgeFailure),
    /// A precondition of the controller does not hold
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// The claims supplied with a request were not a JSON object
    #[error("invalid claims request: {0}")]
    InvalidClaimsRequest(String),
    /// The token cache rejected an update
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// The failure kind, when the error came from the host bridge
    pub fn bridge_failure_kind(&self) -> Option<BridgeFailureKind> {
        match self {
            Self::Bridge(failure) => Some(failure.kind),
            _ => None,
        }
    }
}

/// The category of a host bridge failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BridgeFailureKind {
    /// The user dismissed the host's prompt
    UserCancelled,
    /// The host has no network connectivity
    NoNetworkConnectivity,
    /// The host could not find the requested account
    NoAccountFound,
    /// The host has disabled nested app auth for this application
    BridgeDisabled,
    /// The host does not offer nested app auth
    BridgeUnavailable,
    /// The identity provider returned an error, transient or persistent
    Server,
    /// The request can only succeed with user interaction
    InteractionRequired,
    /// The host's response could not be turned into a result
    InvalidResponse,
    /// The host reported a status this crate does not recognize
    Unknown,
}

impl BridgeFailureKind {
    /// Whether a retry with an interactive request may succeed
    #[inline]
    pub fn requires_interaction(self) -> bool {
        matches!(self, Self::InteractionRequired)
    }
}

impl fmt::Display for BridgeFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::UserCancelled => "user cancelled",
            Self::NoNetworkConnectivity => "no network connectivity",
            Self::NoAccountFound => "no account found",
            Self::BridgeDisabled => "bridge disabled",
            Self::BridgeUnavailable => "bridge unavailable",
            Self::Server => "server error",
            Self::InteractionRequired => "interaction required",
            Self::InvalidResponse => "invalid response",
            Self::Unknown => "unknown error",
        })
    }
}

/// A host bridge failure translated into this crate's taxonomy
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("host bridge failure ({kind}): {code}{}", description_suffix(.description))]
pub struct BridgeFailure {
    /// The failure category
    pub kind: BridgeFailureKind,
    /// The error code, as reported by the host or assigned by this crate
    pub code: String,
    /// A human-readable description
    pub description: Option<String>,
    /// A finer-grained code reported by the host
    pub sub_error: Option<String>,
}

fn description_suffix(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

impl BridgeFailure {
    /// Constructs a failure with the given kind and code
    pub fn new(kind: BridgeFailureKind, code: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            description: None,
            sub_error: None,
        }
    }

    /// Adds a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// A response from the host was missing data or could not be decoded
    pub(crate) fn invalid_response(description: impl Into<String>) -> Self {
        Self::new(BridgeFailureKind::InvalidResponse, "invalid_response")
            .with_description(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_failure_display_includes_description() {
        let failure = BridgeFailure::new(BridgeFailureKind::Server, "invalid_grant")
            .with_description("AADSTS700082: refresh token expired");
        assert_eq!(
            failure.to_string(),
            "host bridge failure (server error): invalid_grant: AADSTS700082: refresh token expired"
        );
    }

    #[test]
    fn bridge_failure_display_without_description() {
        let failure = BridgeFailure::new(BridgeFailureKind::UserCancelled, "user_cancelled");
        assert_eq!(
            failure.to_string(),
            "host bridge failure (user cancelled): user_cancelled"
        );
    }

    #[test]
    fn unsupported_operation_names_operation() {
        let err = AuthError::UnsupportedOperation {
            operation: "login_redirect",
        };
        assert_eq!(
            err.to_string(),
            "login_redirect is not supported in nested app auth mode"
        );
        assert_eq!(err.bridge_failure_kind(), None);
    }
}
