//! Token acquisition for applications nested inside a hosting application
//!
//! In nested app auth (NAA) an application runs embedded in a host, such as
//! an add-in inside an office suite. The host already holds the user's
//! session, so the nested application never talks to the identity provider
//! itself. Instead it asks the host for tokens through a [`HostBridge`] and
//! keeps what it receives in a local cache.
//!
//! The [`NestedAppAuthController`] ties the pieces together:
//!
//! * silent requests are answered from storage while the cached access token
//!   is outside its renewal window;
//! * a token inside its renewal window evicts every cached credential of its
//!   account and the request falls through to the host;
//! * tokens returned by the host are written back to storage and their
//!   account becomes the active account.
//!
//! Failures reported by the host are translated into [`AuthError`]s. Nothing
//! is retried.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use aliri_naa::{
//!     bridge::HostBridge, AuthRequest, ClientId, NestedAppAuthConfig,
//!     NestedAppAuthController,
//! };
//!
//! # async fn run(bridge: Arc<dyn HostBridge>) -> Result<(), aliri_naa::AuthError> {
//! let config = NestedAppAuthConfig::new(ClientId::from_static("my-client-id"));
//! let controller = NestedAppAuthController::new(config, Some(bridge))?;
//! controller.initialize().await?;
//!
//! let request = AuthRequest::new("User.Read".parse().expect("valid scopes"));
//! let result = controller.acquire_token_silent(request.into()).await?;
//!
//! tracing::info!(
//!     from_cache = result.from_cache(),
//!     expires_on = result.expires_on().0,
//!     "token acquired"
//! );
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;

pub mod account;
pub mod adapter;
pub mod bridge;
pub mod claims;
pub mod config;
pub mod controller;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod events;
pub mod hydrator;
pub mod lookup;
pub mod performance;
pub mod request;
pub mod resolver;
pub mod result;
pub mod scope;
pub mod storage;

#[cfg(test)]
mod test_util;

pub use account::{AccountFilter, AccountInfo};
pub use braids::*;
pub use config::NestedAppAuthConfig;
pub use controller::NestedAppAuthController;
pub use error::{AuthError, BridgeFailure, BridgeFailureKind};
pub use request::{AuthRequest, SilentRequest, TokenRequest};
pub use result::AuthenticationResult;
pub use scope::{ScopeSet, ScopeToken, ScopeTokenRef};
