//! Shared fixtures and fakes for unit tests

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use aliri_base64::Base64Url;
use aliri_clock::{Clock, UnixTime};
use async_trait::async_trait;

use crate::{
    account::{AccountEntity, AccountFilter, AccountInfo},
    adapter::NestedAppAuthAdapter,
    bridge::{
        dto::{
            AccountContext, BridgeError, BridgeStatusCode, HostCapabilities, NaaAccountInfo,
            NaaResponse, NaaTokenRequest, NaaTokenResponse,
        },
        HostBridge,
    },
    claims::IdTokenClaims,
    config::NestedAppAuthConfig,
    credential::{CachedAccessToken, CachedIdToken, TokenKeys},
    crypto::CryptoProvider,
    error::AuthError,
    events::{EventMessage, EventSink, EventType},
    performance::{Measurement, MeasurementFields, PerformanceClient, PerformanceEvent},
    request::{AuthRequest, AuthenticationScheme, TokenRequest, ValidRequest},
    result::AuthenticationResult,
    storage::{AuthStorage, InMemoryStorage, StorageError},
    AccessToken, ClientId, CorrelationId, CorrelationIdRef, HomeAccountId, IdToken,
    LocalAccountId, TenantId, TenantIdRef,
};

pub(crate) const ENVIRONMENT: &str = "login.microsoftonline.com";

pub(crate) fn claims(name: &str) -> IdTokenClaims {
    IdTokenClaims {
        oid: Some(format!("{}-oid", name)),
        tid: Some("tenant".into()),
        preferred_username: Some(format!("{}@contoso.com", name)),
        ..IdTokenClaims::default()
    }
}

/// An account named `name` in the `tenant` tenant
pub(crate) fn account(name: &str) -> AccountInfo {
    AccountInfo {
        home_account_id: HomeAccountId::from(format!("{}-oid.tenant", name)),
        environment: ENVIRONMENT.into(),
        tenant_id: TenantId::from_static("tenant"),
        username: format!("{}@contoso.com", name),
        local_account_id: LocalAccountId::from(format!("{}-oid", name)),
        name: None,
        id_token_claims: Some(claims(name)),
    }
}

/// An unsigned ID token carrying the given claims
pub(crate) fn id_token(claims: serde_json::Value) -> IdToken {
    let header = Base64Url::from_raw(br#"{"alg":"none"}"#.to_vec());
    let payload = Base64Url::from_raw(serde_json::to_vec(&claims).unwrap_or_default());
    IdToken::from(format!("{}.{}.", header, payload))
}

pub(crate) fn id_token_for(account: &AccountInfo) -> IdToken {
    let claims = account.id_token_claims.clone().unwrap_or_default();
    id_token(serde_json::to_value(&claims).unwrap_or_default())
}

pub(crate) fn cached_access_token(
    account: &AccountInfo,
    scopes: &str,
    cached_at: UnixTime,
    expires_on: UnixTime,
) -> CachedAccessToken {
    CachedAccessToken {
        secret: AccessToken::from(format!("at-{}", account.local_account_id)),
        home_account_id: account.home_account_id.clone(),
        environment: account.environment.clone(),
        realm: account.tenant_id.clone(),
        client_id: ClientId::from_static("client"),
        target: scopes.parse().unwrap_or_default(),
        token_type: AuthenticationScheme::Bearer,
        cached_at,
        expires_on,
        extended_expires_on: expires_on,
    }
}

/// A host response granting `scopes` to `account`
pub(crate) fn naa_response(account: &AccountInfo, scopes: &str, expires_in: u64) -> NaaResponse {
    NaaResponse {
        token: NaaTokenResponse {
            access_token: Some(AccessToken::from(format!(
                "at-{}-{}",
                account.local_account_id, expires_in
            ))),
            expires_in,
            id_token: Some(id_token_for(account)),
            scope: Some(scopes.into()),
            ..NaaTokenResponse::default()
        },
        account: NaaAccountInfo {
            home_account_id: Some(account.home_account_id.clone()),
            environment: account.environment.clone(),
            tenant_id: Some(account.tenant_id.clone()),
            username: Some(account.username.clone()),
            local_account_id: Some(account.local_account_id.clone()),
            name: account.name.clone(),
        },
    }
}

/// A result as the host would produce it, expiring at `expires_on`
pub(crate) fn bridge_result(
    account: &AccountInfo,
    scopes: &str,
    expires_on: u64,
) -> AuthenticationResult {
    let adapter =
        NestedAppAuthAdapter::new(&NestedAppAuthConfig::new(ClientId::from_static("client")));
    let request = TokenRequest::SsoSilent(AuthRequest::new(scopes.parse().unwrap_or_default()))
        .into_valid(&SequentialGuids::default());

    adapter
        .from_naa_token_response(
            &request,
            naa_response(account, scopes, expires_on),
            UnixTime(0),
        )
        .unwrap()
}

/// Hands out `guid-1`, `guid-2`, and so on
#[derive(Debug, Default)]
pub(crate) struct SequentialGuids(AtomicUsize);

impl SequentialGuids {
    pub(crate) fn issued(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl CryptoProvider for SequentialGuids {
    fn create_new_guid(&self) -> String {
        format!("guid-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// A clock whose time is shared between its clones
#[derive(Clone, Debug, Default)]
pub(crate) struct SharedClock(Arc<AtomicU64>);

impl SharedClock {
    pub(crate) fn at(secs: u64) -> Self {
        Self(Arc::new(AtomicU64::new(secs)))
    }

    pub(crate) fn set(&self, secs: u64) {
        self.0.store(secs, Ordering::SeqCst);
    }
}

impl Clock for SharedClock {
    fn now(&self) -> UnixTime {
        UnixTime(self.0.load(Ordering::SeqCst))
    }
}

/// Storage that rejects every hydration
#[derive(Debug)]
pub(crate) struct FailingStorage {
    pub(crate) inner: InMemoryStorage<SharedClock>,
}

impl FailingStorage {
    pub(crate) fn new(clock: SharedClock) -> Self {
        Self {
            inner: InMemoryStorage::new(ClientId::from_static("client")).with_clock(clock),
        }
    }
}

impl Default for FailingStorage {
    fn default() -> Self {
        Self::new(SharedClock::default())
    }
}

#[async_trait]
impl AuthStorage for FailingStorage {
    async fn initialize(&self, correlation_id: &CorrelationIdRef) -> Result<(), StorageError> {
        self.inner.initialize(correlation_id).await
    }

    fn get_token_keys(&self, account: &AccountInfo) -> TokenKeys {
        self.inner.get_token_keys(account)
    }

    fn get_access_token(
        &self,
        account: &AccountInfo,
        request: &ValidRequest,
        keys: &TokenKeys,
        tenant_id: Option<&TenantIdRef>,
    ) -> Option<CachedAccessToken> {
        self.inner.get_access_token(account, request, keys, tenant_id)
    }

    fn get_id_token(
        &self,
        account: &AccountInfo,
        keys: &TokenKeys,
        tenant_id: Option<&TenantIdRef>,
    ) -> Option<CachedIdToken> {
        self.inner.get_id_token(account, keys, tenant_id)
    }

    fn set_account(&self, entity: AccountEntity) {
        self.inner.set_account(entity)
    }

    fn get_all_accounts(&self, filter: &AccountFilter) -> Vec<AccountInfo> {
        self.inner.get_all_accounts(filter)
    }

    fn set_active_account(&self, account: Option<&AccountInfo>) {
        self.inner.set_active_account(account)
    }

    fn get_active_account(&self) -> Option<AccountInfo> {
        self.inner.get_active_account()
    }

    async fn remove_account_context(&self, account: &AccountInfo) -> Result<(), StorageError> {
        self.inner.remove_account_context(account).await
    }

    async fn hydrate_cache(
        &self,
        _result: &AuthenticationResult,
        _request: &ValidRequest,
    ) -> Result<(), StorageError> {
        Err(StorageError::Write {
            entity: "access token",
            reason: "quota exceeded".into(),
        })
    }
}

/// Which host entry point was called
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BridgeCall {
    Interactive,
    Silent,
}

/// A host that answers from a queue of scripted responses
#[derive(Debug, Default)]
pub(crate) struct ScriptedBridge {
    responses: Mutex<VecDeque<Result<NaaResponse, BridgeError>>>,
    calls: Mutex<Vec<(BridgeCall, NaaTokenRequest)>>,
    account_context: Option<AccountContext>,
    capabilities: Option<HostCapabilities>,
    active_account: Option<NaaAccountInfo>,
}

impl ScriptedBridge {
    pub(crate) fn with_account_context(mut self, account: &AccountInfo) -> Self {
        self.account_context = Some(AccountContext {
            home_account_id: account.home_account_id.clone(),
            environment: Some(account.environment.clone()),
            tenant_id: Some(account.tenant_id.clone()),
        });
        self
    }

    pub(crate) fn with_active_account(mut self, account: &AccountInfo) -> Self {
        self.capabilities = Some(HostCapabilities {
            query_account: true,
        });
        self.active_account = Some(naa_response(account, "", 0).account);
        self
    }

    pub(crate) fn respond_with(self, response: Result<NaaResponse, BridgeError>) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
        self
    }

    pub(crate) fn calls(&self) -> Vec<(BridgeCall, NaaTokenRequest)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn answer(
        &self,
        call: BridgeCall,
        request: &NaaTokenRequest,
    ) -> Result<NaaResponse, BridgeError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((call, request.clone()));
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| {
                Err(BridgeError::new(BridgeStatusCode::Unknown).with_code("no_scripted_response"))
            })
    }
}

#[async_trait]
impl HostBridge for ScriptedBridge {
    async fn get_token_interactive(
        &self,
        request: &NaaTokenRequest,
    ) -> Result<NaaResponse, BridgeError> {
        self.answer(BridgeCall::Interactive, request)
    }

    async fn get_token_silent(
        &self,
        request: &NaaTokenRequest,
    ) -> Result<NaaResponse, BridgeError> {
        self.answer(BridgeCall::Silent, request)
    }

    async fn get_active_account(&self) -> Result<Option<NaaAccountInfo>, BridgeError> {
        Ok(self.active_account.clone())
    }

    fn get_account_context(&self) -> Option<AccountContext> {
        self.account_context.clone()
    }

    fn get_host_capabilities(&self) -> Option<HostCapabilities> {
        self.capabilities
    }
}

/// Collects every emitted event
#[derive(Clone, Debug, Default)]
pub(crate) struct RecordedEvents(Arc<Mutex<Vec<EventMessage>>>);

impl RecordedEvents {
    pub(crate) fn all(&self) -> Vec<EventMessage> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub(crate) fn types(&self) -> Vec<EventType> {
        self.all().iter().map(|e| e.event_type).collect()
    }
}

impl EventSink for RecordedEvents {
    fn emit_event(&self, message: &EventMessage) {
        if let Ok(mut events) = self.0.lock() {
            events.push(message.clone());
        }
    }
}

/// A completed measurement
#[derive(Clone, Debug)]
pub(crate) struct RecordedMeasurement {
    pub(crate) event: PerformanceEvent,
    pub(crate) correlation_id: CorrelationId,
    pub(crate) fields: MeasurementFields,
    pub(crate) counters: Vec<(&'static str, u64)>,
    pub(crate) error: Option<AuthError>,
}

/// Collects measurements as they start and end
#[derive(Clone, Debug, Default)]
pub(crate) struct RecordedMeasurements {
    started: Arc<Mutex<Vec<PerformanceEvent>>>,
    ended: Arc<Mutex<Vec<RecordedMeasurement>>>,
}

impl RecordedMeasurements {
    pub(crate) fn started(&self) -> Vec<PerformanceEvent> {
        self.started.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub(crate) fn ended(&self) -> Vec<RecordedMeasurement> {
        self.ended.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl PerformanceClient for RecordedMeasurements {
    fn start_measurement(
        &self,
        event: PerformanceEvent,
        correlation_id: &CorrelationIdRef,
    ) -> Box<dyn Measurement> {
        if let Ok(mut started) = self.started.lock() {
            started.push(event);
        }
        Box::new(Recording {
            sink: self.ended.clone(),
            record: RecordedMeasurement {
                event,
                correlation_id: correlation_id.to_owned(),
                fields: MeasurementFields::default(),
                counters: Vec::new(),
                error: None,
            },
        })
    }
}

struct Recording {
    sink: Arc<Mutex<Vec<RecordedMeasurement>>>,
    record: RecordedMeasurement,
}

impl Measurement for Recording {
    fn add(&mut self, fields: MeasurementFields) {
        self.record.fields.merge(fields);
    }

    fn increment(&mut self, counter: &'static str, by: u64) {
        self.record.counters.push((counter, by));
    }

    fn end(mut self: Box<Self>, fields: MeasurementFields, error: Option<&AuthError>) {
        self.record.fields.merge(fields);
        self.record.error = error.cloned();
        if let Ok(mut ended) = self.sink.lock() {
            ended.push(self.record.clone());
        }
    }
}
