//! OAuth2 scope handling for token requests and cached credentials

use std::{convert::TryFrom, fmt, iter::FromIterator, slice, str::FromStr};

use aliri_braid::braid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The scopes every OpenID Connect request carries when the caller supplies none
pub const OIDC_DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

const OFFLINE_ACCESS: &str = "offline_access";

/// An invalid scope token
#[derive(Debug, Error)]
pub enum InvalidScopeToken {
    /// The scope token was the empty string
    #[error("scope token cannot be empty")]
    EmptyString,
    /// The scope token contained an invalid byte
    #[error("invalid scope token byte at position {position}: 0x{value:02x}")]
    InvalidByte {
        /// The index in the scope token where the invalid byte was found
        position: usize,
        /// The invalid byte value
        value: u8,
    },
}

impl From<std::convert::Infallible> for InvalidScopeToken {
    #[inline]
    fn from(x: std::convert::Infallible) -> Self {
        match x {}
    }
}

/// An OAuth2 scope token as defined in [RFC 6749, Section 3.3][RFC6749 3.3]
///
/// A scope token must be composed of printable ASCII characters excluding
/// ` ` (space), `"` (double quote), and `\` (backslash).
///
///   [RFC6749 3.3]: (https://datatracker.ietf.org/doc/html/rfc6749#section-3.3)
#[braid(
    serde,
    validator,
    ref_doc = "A borrowed reference to an OAuth2 [`ScopeToken`]"
)]
pub struct ScopeToken;

impl aliri_braid::Validator for ScopeToken {
    type Error = InvalidScopeToken;

    fn validate(s: &str) -> Result<(), Self::Error> {
        if s.is_empty() {
            Err(InvalidScopeToken::EmptyString)
        } else if let Some((position, &value)) = s
            .as_bytes()
            .iter()
            .enumerate()
            .find(|(_, &b)| b <= 0x20 || b == 0x22 || b == 0x5C || 0x7F <= b)
        {
            Err(InvalidScopeToken::InvalidByte { position, value })
        } else {
            Ok(())
        }
    }
}

impl ScopeTokenRef {
    fn is_oidc(&self) -> bool {
        OIDC_DEFAULT_SCOPES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(self.as_str()))
    }

    fn eq_token(&self, other: &ScopeTokenRef) -> bool {
        self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

/// An ordered set of scope tokens
///
/// Insertion order is preserved so that the scope string sent to the host
/// matches what the caller asked for. Duplicates collapse, compared without
/// regard to ASCII case.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeSet(Vec<ScopeToken>);

impl ScopeSet {
    /// Produces an empty scope set
    #[inline]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// The OpenID Connect default scopes
    pub fn oidc_default() -> Self {
        OIDC_DEFAULT_SCOPES
            .iter()
            .copied()
            .map(ScopeToken::from_static)
            .collect()
    }

    /// Adds a scope token unless an equivalent token is already present
    pub fn insert(&mut self, scope_token: ScopeToken) {
        if !self.contains(&scope_token) {
            self.0.push(scope_token);
        }
    }

    /// Adds an additional scope token
    #[inline]
    pub fn and(mut self, scope_token: ScopeToken) -> Self {
        self.insert(scope_token);
        self
    }

    /// Whether the set holds no scope tokens
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of distinct scope tokens
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Produces an iterator of the scope tokens in insertion order
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// Checks whether an equivalent scope token is in the set
    pub fn contains(&self, scope_token: &ScopeTokenRef) -> bool {
        self.0.iter().any(|s| s.eq_token(scope_token))
    }

    /// Checks to see whether this set contains all of the scope tokens in `subset`
    pub fn contains_all(&self, subset: &ScopeSet) -> bool {
        subset.iter().all(|s| self.contains(s))
    }

    /// Checks whether the two sets share at least one scope token
    pub fn intersects(&self, other: &ScopeSet) -> bool {
        other.iter().any(|s| self.contains(s))
    }

    /// Whether every scope token in the set is an OpenID Connect default scope
    pub fn contains_only_oidc(&self) -> bool {
        self.0.iter().all(|s| s.is_oidc())
    }

    /// The scopes used to match this request against cached access tokens
    ///
    /// OIDC scopes are never recorded against access tokens by the authority,
    /// so they are dropped unless they are all that was asked for. In that case
    /// only `offline_access` is dropped.
    pub fn search_scopes(&self) -> Self {
        let keep: fn(&ScopeToken) -> bool = if self.contains_only_oidc() {
            |s| !s.as_str().eq_ignore_ascii_case(OFFLINE_ACCESS)
        } else {
            |s| !s.is_oidc()
        };

        Self(self.0.iter().filter(|s| keep(s)).cloned().collect())
    }

    /// Lowercased, space-delimited form used in cache keys
    pub fn to_key_string(&self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

impl fmt::Debug for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.0.iter().map(|s| s.as_str())).finish()
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for s in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(s.as_str())?;
            first = false;
        }
        Ok(())
    }
}

/// An iterator over a set of borrowed scope tokens
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    iter: slice::Iter<'a, ScopeToken>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ScopeTokenRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|x| x.as_ref())
    }
}

impl<'a> IntoIterator for &'a ScopeSet {
    type Item = &'a ScopeTokenRef;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Iter {
            iter: self.0.iter(),
        }
    }
}

impl IntoIterator for ScopeSet {
    type Item = ScopeToken;
    type IntoIter = std::vec::IntoIter<ScopeToken>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<S> Extend<S> for ScopeSet
where
    S: Into<ScopeToken>,
{
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = S>,
    {
        for s in iter {
            self.insert(s.into());
        }
    }
}

impl<S> FromIterator<S> for ScopeSet
where
    S: Into<ScopeToken>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        let mut set = Self::empty();
        set.extend(iter);
        set
    }
}

impl TryFrom<&'_ str> for ScopeSet {
    type Error = InvalidScopeToken;

    #[inline]
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.split_whitespace().map(str::parse::<ScopeToken>).collect()
    }
}

impl TryFrom<String> for ScopeSet {
    type Error = InvalidScopeToken;

    #[inline]
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}

impl FromStr for ScopeSet {
    type Err = InvalidScopeToken;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl From<ScopeSet> for String {
    fn from(s: ScopeSet) -> Self {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(s: &str) -> ScopeSet {
        s.parse().unwrap()
    }

    #[test]
    fn scope_token_rejects_empty() {
        let x = "".parse::<ScopeToken>();
        assert!(matches!(x, Err(InvalidScopeToken::EmptyString)));
    }

    #[test]
    fn scope_token_rejects_quote() {
        let x = "User.\"Read\"".parse::<ScopeToken>();
        assert!(matches!(x, Err(InvalidScopeToken::InvalidByte { position: 5, .. })));
    }

    #[test]
    fn scope_token_rejects_non_ascii() {
        let x = "User.¿Read".parse::<ScopeToken>();
        assert!(matches!(x, Err(InvalidScopeToken::InvalidByte { .. })));
    }

    #[test]
    fn duplicates_collapse_without_regard_to_case() {
        let s = scopes("User.Read openid user.read OPENID Mail.Send");
        assert_eq!(s.len(), 3);
        assert_eq!(s.to_string(), "User.Read openid Mail.Send");
    }

    #[test]
    fn superset_check_is_case_insensitive() {
        let cached = scopes("User.Read Mail.Send");
        assert!(cached.contains_all(&scopes("mail.send")));
        assert!(!cached.contains_all(&scopes("mail.send Files.Read")));
        assert!(cached.intersects(&scopes("Files.Read MAIL.SEND")));
    }

    #[test]
    fn search_scopes_drop_oidc_scopes_when_resource_scopes_present() {
        let s = scopes("openid profile User.Read offline_access");
        assert_eq!(s.search_scopes(), scopes("User.Read"));
    }

    #[test]
    fn search_scopes_keep_openid_profile_when_only_oidc_requested() {
        let s = ScopeSet::oidc_default();
        assert!(s.contains_only_oidc());
        assert_eq!(s.search_scopes(), scopes("openid profile"));
    }

    #[test]
    fn serializes_as_space_delimited_string() {
        let s = scopes("User.Read Mail.Send");
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "\"User.Read Mail.Send\"");
        let back: ScopeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn key_string_is_lowercase() {
        assert_eq!(scopes("User.Read Mail.Send").to_key_string(), "user.read mail.send");
    }
}
