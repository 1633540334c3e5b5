//! The host bridge
//!
//! In nested app auth the hosting application owns the conversation with the
//! identity provider. This crate only ever asks the host for tokens through
//! a [`HostBridge`].

use async_trait::async_trait;

pub mod dto;

use dto::{AccountContext, BridgeError, HostCapabilities, NaaAccountInfo, NaaResponse, NaaTokenRequest};

/// A channel to the hosting application
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Requests tokens, allowing the host to interact with the user
    async fn get_token_interactive(
        &self,
        request: &NaaTokenRequest,
    ) -> Result<NaaResponse, BridgeError>;

    /// Requests tokens without user interaction
    async fn get_token_silent(&self, request: &NaaTokenRequest)
        -> Result<NaaResponse, BridgeError>;

    /// Asks the host for its signed-in account
    async fn get_active_account(&self) -> Result<Option<NaaAccountInfo>, BridgeError>;

    /// The account the host reported during its handshake, if any
    fn get_account_context(&self) -> Option<AccountContext>;

    /// What the host reported it supports during its handshake
    fn get_host_capabilities(&self) -> Option<HostCapabilities>;
}
