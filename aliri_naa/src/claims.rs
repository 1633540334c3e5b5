//! ID token claims

use aliri_base64::Base64Url;
use aliri_clock::UnixTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::IdTokenRef;

/// Claims carried by an OpenID Connect ID token
///
/// Only the claims this crate uses to build accounts are given their own
/// fields. Everything else is kept in `other`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// The object ID of the user in the tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    /// The subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// The tenant the token was issued in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,
    /// The user's preferred username, usually an email address or UPN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    /// The user's display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Expiration time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<UnixTime>,
    /// Issued-at time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<UnixTime>,
    /// Any remaining claims
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// An ID token that could not be decoded
#[derive(Debug, Error)]
pub enum InvalidIdToken {
    /// The token did not have the three segments of a compact JWT
    #[error("ID token is not a compact JWT: expected 3 segments, found {0}")]
    Malformed(usize),
    /// The payload segment was not valid base64url
    #[error("ID token payload is not valid base64url")]
    Encoding(#[from] aliri_base64::InvalidBase64Data),
    /// The payload did not hold a JSON claims object
    #[error("ID token payload is not a JSON claims object")]
    Claims(#[from] serde_json::Error),
}

/// Extracts the claims from an ID token without verifying its signature
///
/// In nested app auth the token arrives from the trusted host or from our own
/// cache, so no signature check is made here.
pub fn extract_token_claims(id_token: &IdTokenRef) -> Result<IdTokenClaims, InvalidIdToken> {
    let segments: Vec<&str> = id_token.as_str().split('.').collect();
    if segments.len() != 3 {
        return Err(InvalidIdToken::Malformed(segments.len()));
    }

    let payload = Base64Url::from_encoded(segments[1])?;
    Ok(serde_json::from_slice(payload.as_vec())?)
}
