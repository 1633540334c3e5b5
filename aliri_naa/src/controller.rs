//! The nested app auth controller
//!
//! [`NestedAppAuthController`] is the entry point applications use to
//! acquire tokens through their host. Silent requests are answered from the
//! token cache when possible. Everything else is forwarded to the host bridge
//! and the result is written back to the cache.

use std::{fmt, sync::Arc};

use aliri_clock::{Clock, System};

use crate::{
    account::{AccountEntity, AccountFilter, AccountInfo},
    adapter::NestedAppAuthAdapter,
    bridge::{dto::BridgeError, HostBridge},
    config::NestedAppAuthConfig,
    crypto::{CryptoProvider, UuidCrypto},
    error::AuthError,
    events::{
        CallbackId, EventError, EventHandler, EventMessage, EventPayload, EventSink, EventType,
        InteractionType,
    },
    hydrator,
    lookup::CacheLookup,
    performance::{MeasurementFields, PerformanceClient, PerformanceEvent, TracingPerformanceClient},
    request::{AuthRequest, FlowKind, SilentRequest, TokenRequest, ValidRequest},
    resolver::resolve_account,
    result::AuthenticationResult,
    storage::{AuthStorage, InMemoryStorage},
    CorrelationId,
};

const VISIBILITY_CHANGE_COUNT: &str = "visibilityChangeCount";

/// A failure while going through the host, before translation
enum HostFailure {
    Bridge(BridgeError),
    Auth(AuthError),
}

impl From<BridgeError> for HostFailure {
    fn from(error: BridgeError) -> Self {
        Self::Bridge(error)
    }
}

impl From<AuthError> for HostFailure {
    fn from(error: AuthError) -> Self {
        Self::Auth(error)
    }
}

/// Acquires tokens through a hosting application
///
/// The controller never talks to the identity provider itself. Silent
/// requests are served from storage while the cached access token is outside
/// its renewal window; every other request goes to the host bridge.
pub struct NestedAppAuthController<C = System> {
    config: NestedAppAuthConfig,
    adapter: NestedAppAuthAdapter,
    bridge: Arc<dyn HostBridge>,
    storage: Arc<dyn AuthStorage>,
    events: EventHandler,
    performance: Arc<dyn PerformanceClient>,
    crypto: Arc<dyn CryptoProvider>,
    clock: C,
}

impl<C> fmt::Debug for NestedAppAuthController<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NestedAppAuthController")
            .field("config", &self.config)
            .field("events", &self.events)
            .finish()
    }
}

impl NestedAppAuthController<System> {
    /// Constructs a controller that acquires tokens through `bridge`
    ///
    /// Fails when no bridge is available, since nothing could be served
    /// without one. Tokens are cached in memory until
    /// [`with_storage`][Self::with_storage] says otherwise.
    pub fn new(
        config: NestedAppAuthConfig,
        bridge: Option<Arc<dyn HostBridge>>,
    ) -> Result<Self, AuthError> {
        let bridge = bridge.ok_or_else(|| {
            AuthError::InvariantViolation("nested app auth requires a host bridge".into())
        })?;

        Ok(Self {
            adapter: NestedAppAuthAdapter::new(&config),
            storage: Arc::new(InMemoryStorage::new(config.client_id().clone())),
            config,
            bridge,
            events: EventHandler::new(),
            performance: Arc::new(TracingPerformanceClient),
            crypto: Arc::new(UuidCrypto),
            clock: System,
        })
    }
}

impl<C> NestedAppAuthController<C> {
    /// Sets the storage used for accounts and tokens
    pub fn with_storage(mut self, storage: Arc<dyn AuthStorage>) -> Self {
        self.storage = storage;
        self
    }

    /// Sets the client that measures host round trips
    pub fn with_performance_client(mut self, performance: Arc<dyn PerformanceClient>) -> Self {
        self.performance = performance;
        self
    }

    /// Sets the source of generated identifiers
    pub fn with_crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.crypto = crypto;
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> NestedAppAuthController<D> {
        NestedAppAuthController {
            config: self.config,
            adapter: self.adapter,
            bridge: self.bridge,
            storage: self.storage,
            events: self.events,
            performance: self.performance,
            crypto: self.crypto,
            clock,
        }
    }

    /// The controller's configuration
    #[inline]
    pub fn config(&self) -> &NestedAppAuthConfig {
        &self.config
    }

    /// Registers a receiver for lifecycle events
    pub fn add_event_callback(&self, sink: Arc<dyn EventSink>) -> CallbackId {
        self.events.add_callback(self.crypto.create_new_guid(), sink)
    }

    /// Removes a previously registered event receiver
    pub fn remove_event_callback(&self, id: &CallbackId) -> bool {
        self.events.remove_callback(id)
    }

    /// Gets every known account matching the filter
    pub fn get_all_accounts(&self, filter: &AccountFilter) -> Vec<AccountInfo> {
        self.storage.get_all_accounts(filter)
    }

    /// Gets the first known account matching the filter
    pub fn get_account(&self, filter: &AccountFilter) -> Option<AccountInfo> {
        self.storage.get_account(filter)
    }

    /// Gets the active account
    pub fn get_active_account(&self) -> Option<AccountInfo> {
        self.storage.get_active_account()
    }

    /// Sets or clears the active account
    ///
    /// An account that is not in storage cannot become active. In that case
    /// the active account is left as it was and no event is emitted.
    pub fn set_active_account(&self, account: Option<&AccountInfo>) {
        if let Some(account) = account {
            let filter = AccountFilter::by_home_account_id(account.home_account_id.clone());
            if self.storage.get_account(&filter).is_none() {
                tracing::warn!(
                    home_account_id = %account.home_account_id,
                    "cannot make an unknown account active"
                );
                return;
            }
        }

        self.storage.set_active_account(account);
        self.events.emit_event(
            EventMessage::new(EventType::ActiveAccountChanged, InteractionType::None)
                .with_payload(EventPayload::Account(account.cloned())),
        );
    }

    /// Completes a redirect flow
    ///
    /// Redirects never happen in nested app auth, so there is never anything
    /// to complete.
    pub async fn handle_redirect_promise(&self) -> Result<Option<AuthenticationResult>, AuthError> {
        Ok(None)
    }

    /// Not available in nested app auth
    pub async fn acquire_token_redirect(&self, _request: AuthRequest) -> Result<(), AuthError> {
        unsupported("acquire_token_redirect")
    }

    /// Not available in nested app auth
    pub async fn login_redirect(&self, _request: AuthRequest) -> Result<(), AuthError> {
        unsupported("login_redirect")
    }

    /// Not available in nested app auth
    pub async fn logout(&self) -> Result<(), AuthError> {
        unsupported("logout")
    }

    /// Not available in nested app auth
    pub async fn logout_redirect(&self) -> Result<(), AuthError> {
        unsupported("logout_redirect")
    }

    /// Not available in nested app auth
    pub async fn logout_popup(&self) -> Result<(), AuthError> {
        unsupported("logout_popup")
    }

    /// Not available in nested app auth
    pub async fn acquire_token_by_code(
        &self,
        _code: &str,
    ) -> Result<AuthenticationResult, AuthError> {
        unsupported("acquire_token_by_code")
    }

    /// Not available in nested app auth
    pub async fn acquire_token_by_refresh_token(
        &self,
        _request: AuthRequest,
    ) -> Result<AuthenticationResult, AuthError> {
        unsupported("acquire_token_by_refresh_token")
    }

    /// Not available in nested app auth
    pub async fn acquire_token_native(
        &self,
        _request: AuthRequest,
    ) -> Result<AuthenticationResult, AuthError> {
        unsupported("acquire_token_native")
    }

    /// Not available in nested app auth
    pub fn add_performance_callback(
        &self,
        _client: Arc<dyn PerformanceClient>,
    ) -> Result<CallbackId, AuthError> {
        unsupported("add_performance_callback")
    }

    /// Not available in nested app auth
    pub async fn clear_cache(&self) -> Result<(), AuthError> {
        unsupported("clear_cache")
    }
}

fn unsupported<T>(operation: &'static str) -> Result<T, AuthError> {
    tracing::warn!(operation, "operation is not supported in nested app auth mode");
    Err(AuthError::UnsupportedOperation { operation })
}

impl<C: Clock + Send + Sync> NestedAppAuthController<C> {
    /// Prepares storage and picks up the host's signed-in account
    ///
    /// When the host can report its active account, that account is stored
    /// and made active.
    pub async fn initialize(&self) -> Result<(), AuthError> {
        let correlation_id = CorrelationId::from(self.crypto.create_new_guid());
        self.events.emit_event(
            EventMessage::new(EventType::InitializeStart, InteractionType::None)
                .with_correlation_id(correlation_id.clone()),
        );

        let measurement = self
            .performance
            .start_measurement(PerformanceEvent::Initialize, &correlation_id);
        let outcome = self.initialize_inner(&correlation_id).await;
        measurement.end(
            MeasurementFields {
                success: Some(outcome.is_ok()),
                ..MeasurementFields::default()
            },
            outcome.as_ref().err(),
        );

        self.events.emit_event(
            EventMessage::new(EventType::InitializeEnd, InteractionType::None)
                .with_correlation_id(correlation_id),
        );

        outcome
    }

    async fn initialize_inner(&self, correlation_id: &CorrelationId) -> Result<(), AuthError> {
        self.storage.initialize(correlation_id).await?;

        let query_account = self
            .bridge
            .get_host_capabilities()
            .map_or(false, |c| c.query_account);
        if !query_account {
            return Ok(());
        }

        let naa_account = self
            .bridge
            .get_active_account()
            .await
            .map_err(|e| self.adapter.from_bridge_error(&e))?;

        if let Some(naa_account) = naa_account {
            let account = self.adapter.from_naa_account_info(&naa_account, None)?;
            tracing::debug!(
                %correlation_id,
                home_account_id = %account.home_account_id,
                "host reported an active account"
            );
            self.storage
                .set_account(AccountEntity::from_account_info(&account, None, None));
            self.storage.set_active_account(Some(&account));
        }

        Ok(())
    }

    /// Acquires a token without user interaction, trying the cache first
    pub async fn acquire_token_silent(
        &self,
        request: SilentRequest,
    ) -> Result<AuthenticationResult, AuthError> {
        self.acquire(TokenRequest::Silent(request)).await
    }

    /// Acquires a token from the host without user interaction
    pub async fn sso_silent(&self, request: AuthRequest) -> Result<AuthenticationResult, AuthError> {
        self.acquire(TokenRequest::SsoSilent(request)).await
    }

    /// Acquires a token, letting the host interact with the user
    pub async fn acquire_token_popup(
        &self,
        request: AuthRequest,
    ) -> Result<AuthenticationResult, AuthError> {
        self.acquire(TokenRequest::Interactive(request)).await
    }

    /// Signs the user in, letting the host interact with the user
    pub async fn login_popup(&self, request: AuthRequest) -> Result<AuthenticationResult, AuthError> {
        self.acquire(TokenRequest::Interactive(request)).await
    }

    /// Writes a result's account and tokens to storage
    pub async fn hydrate_cache(
        &self,
        result: &AuthenticationResult,
        request: TokenRequest,
    ) -> Result<(), AuthError> {
        let request = request.into_valid(&*self.crypto);
        hydrator::hydrate_cache(&*self.storage, result, &request).await
    }

    async fn acquire(&self, request: TokenRequest) -> Result<AuthenticationResult, AuthError> {
        let interaction_type = request.interaction_type();
        let request = request.into_valid(&*self.crypto);
        self.run(interaction_type, request).await
    }

    #[tracing::instrument(
        err,
        skip_all,
        fields(correlation_id = %request.correlation_id(), flow = ?request.kind())
    )]
    async fn run(
        &self,
        interaction_type: InteractionType,
        request: ValidRequest,
    ) -> Result<AuthenticationResult, AuthError> {
        self.events.emit_event(
            EventMessage::new(EventType::AcquireTokenStart, interaction_type)
                .with_correlation_id(request.correlation_id().to_owned())
                .with_payload(EventPayload::Request(request.clone())),
        );

        if let FlowKind::Silent { .. } = request.kind() {
            if !self.config.use_cache_for_lookup() {
                tracing::debug!("cache lookups are disabled, going to the host");
            } else if let Some(result) = self.lookup_cached(&request).await {
                self.emit_success(interaction_type, &result);
                return Ok(result);
            }
        }

        self.acquire_from_host(interaction_type, &request).await
    }

    async fn lookup_cached(&self, request: &ValidRequest) -> Option<AuthenticationResult> {
        let mut measurement = self
            .performance
            .start_measurement(PerformanceEvent::AcquireTokenSilent, request.correlation_id());
        measurement.add(MeasurementFields {
            nested_app_auth_request: Some(true),
            ..MeasurementFields::default()
        });

        let account_context = self.bridge.get_account_context();
        let account = resolve_account(request, account_context.as_ref(), &*self.storage);
        let result = CacheLookup::new(
            &*self.storage,
            &self.adapter,
            &self.clock,
            self.config.token_renewal_offset(),
        )
        .lookup_silent(account.as_ref(), request)
        .await;

        measurement.end(
            MeasurementFields {
                success: Some(result.is_some()),
                from_cache: Some(result.is_some()),
                access_token_size: result.as_ref().map(|r| r.access_token_size()),
                id_token_size: result.as_ref().map(|r| r.id_token_size()),
                ..MeasurementFields::default()
            },
            None,
        );

        result
    }

    async fn acquire_from_host(
        &self,
        interaction_type: InteractionType,
        request: &ValidRequest,
    ) -> Result<AuthenticationResult, AuthError> {
        let event = match request.kind() {
            FlowKind::Interactive => PerformanceEvent::AcquireTokenPopup,
            FlowKind::Silent { .. } | FlowKind::SsoSilent => PerformanceEvent::SsoSilent,
        };
        let mut measurement = self
            .performance
            .start_measurement(event, request.correlation_id());
        measurement.add(MeasurementFields {
            nested_app_auth_request: Some(true),
            ..MeasurementFields::default()
        });
        if event == PerformanceEvent::SsoSilent {
            measurement.increment(VISIBILITY_CHANGE_COUNT, 0);
        }

        match self.request_from_host(request).await {
            Ok(result) => {
                self.emit_success(interaction_type, &result);
                measurement.end(
                    MeasurementFields {
                        success: Some(true),
                        request_id: Some(result.correlation_id().as_str().to_owned()),
                        access_token_size: Some(result.access_token_size()),
                        id_token_size: Some(result.id_token_size()),
                        from_cache: Some(false),
                        ..MeasurementFields::default()
                    },
                    None,
                );
                Ok(result)
            }
            Err(failure) => {
                let (event_error, error) = match failure {
                    HostFailure::Bridge(raw) => {
                        let error = self.adapter.from_bridge_error(&raw);
                        (EventError::Bridge(raw), error)
                    }
                    HostFailure::Auth(error) => (EventError::Auth(error.clone()), error),
                };

                self.events.emit_event(
                    EventMessage::new(EventType::AcquireTokenFailure, interaction_type)
                        .with_correlation_id(request.correlation_id().to_owned())
                        .with_error(event_error),
                );
                measurement.end(
                    MeasurementFields {
                        success: Some(false),
                        ..MeasurementFields::default()
                    },
                    Some(&error),
                );
                Err(error)
            }
        }
    }

    async fn request_from_host(
        &self,
        request: &ValidRequest,
    ) -> Result<AuthenticationResult, HostFailure> {
        let naa_request = self.adapter.to_naa_token_request(request)?;
        let request_timestamp = self.clock.now();

        tracing::trace!(scope = %naa_request.scope, "requesting token from host");
        let response = match request.kind() {
            FlowKind::Interactive => self.bridge.get_token_interactive(&naa_request).await?,
            FlowKind::Silent { .. } | FlowKind::SsoSilent => {
                self.bridge.get_token_silent(&naa_request).await?
            }
        };

        let result = self
            .adapter
            .from_naa_token_response(request, response, request_timestamp)?;
        hydrator::hydrate_cache(&*self.storage, &result, request).await?;
        self.storage.set_active_account(Some(result.account()));

        tracing::info!(
            home_account_id = %result.account().home_account_id,
            expires_on = result.expires_on().0,
            "received token from host"
        );

        Ok(result)
    }

    fn emit_success(&self, interaction_type: InteractionType, result: &AuthenticationResult) {
        self.events.emit_event(
            EventMessage::new(EventType::AcquireTokenSuccess, interaction_type)
                .with_correlation_id(result.correlation_id().to_owned())
                .with_payload(EventPayload::Result(result.clone())),
        );
    }
}
