//! Performance measurements around host round trips

use std::{error, fmt, time::Instant};

use crate::{error::AuthError, CorrelationId, CorrelationIdRef};

/// The operation being measured
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PerformanceEvent {
    /// Silent acquisition from the cache
    AcquireTokenSilent,
    /// Silent acquisition through the host
    SsoSilent,
    /// Interactive acquisition through the host
    AcquireTokenPopup,
    /// Controller initialization
    Initialize,
}

impl PerformanceEvent {
    /// The name under which the measurement is reported
    pub fn name(self) -> &'static str {
        match self {
            Self::AcquireTokenSilent => "acquireTokenSilent",
            Self::SsoSilent => "ssoSilent",
            Self::AcquireTokenPopup => "acquireTokenPopup",
            Self::Initialize => "initialize",
        }
    }
}

/// Fields recorded against a measurement
///
/// Unset fields are left as they were.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeasurementFields {
    /// Whether the operation succeeded
    pub success: Option<bool>,
    /// The request identifier of the result
    pub request_id: Option<String>,
    /// Length of the returned access token
    pub access_token_size: Option<usize>,
    /// Length of the returned ID token
    pub id_token_size: Option<usize>,
    /// Whether the request went through nested app auth
    pub nested_app_auth_request: Option<bool>,
    /// Whether the result was served from the cache
    pub from_cache: Option<bool>,
}

impl MeasurementFields {
    /// Overlays the set fields of `other` onto these fields
    pub fn merge(&mut self, other: MeasurementFields) {
        self.success = other.success.or(self.success);
        if other.request_id.is_some() {
            self.request_id = other.request_id;
        }
        self.access_token_size = other.access_token_size.or(self.access_token_size);
        self.id_token_size = other.id_token_size.or(self.id_token_size);
        self.nested_app_auth_request = other
            .nested_app_auth_request
            .or(self.nested_app_auth_request);
        self.from_cache = other.from_cache.or(self.from_cache);
    }
}

/// An in-flight measurement
pub trait Measurement: Send {
    /// Records fields against the measurement
    fn add(&mut self, fields: MeasurementFields);

    /// Increments a named counter
    fn increment(&mut self, counter: &'static str, by: u64);

    /// Completes the measurement
    fn end(self: Box<Self>, fields: MeasurementFields, error: Option<&AuthError>);
}

/// A factory for measurements
pub trait PerformanceClient: Send + Sync {
    /// Begins measuring an operation
    fn start_measurement(
        &self,
        event: PerformanceEvent,
        correlation_id: &CorrelationIdRef,
    ) -> Box<dyn Measurement>;
}

/// Reports measurements as `tracing` events when they end
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPerformanceClient;

impl PerformanceClient for TracingPerformanceClient {
    fn start_measurement(
        &self,
        event: PerformanceEvent,
        correlation_id: &CorrelationIdRef,
    ) -> Box<dyn Measurement> {
        tracing::trace!(measurement = event.name(), %correlation_id, "starting measurement");
        Box::new(TracingMeasurement {
            event,
            correlation_id: correlation_id.to_owned(),
            started: Instant::now(),
            fields: MeasurementFields::default(),
            counters: Vec::new(),
        })
    }
}

struct TracingMeasurement {
    event: PerformanceEvent,
    correlation_id: CorrelationId,
    started: Instant,
    fields: MeasurementFields,
    counters: Vec<(&'static str, u64)>,
}

impl fmt::Debug for TracingMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TracingMeasurement")
            .field("event", &self.event)
            .field("correlation_id", &self.correlation_id)
            .field("fields", &self.fields)
            .field("counters", &self.counters)
            .finish()
    }
}

impl Measurement for TracingMeasurement {
    fn add(&mut self, fields: MeasurementFields) {
        self.fields.merge(fields);
    }

    fn increment(&mut self, counter: &'static str, by: u64) {
        match self.counters.iter_mut().find(|(name, _)| *name == counter) {
            Some((_, count)) => *count += by,
            None => self.counters.push((counter, by)),
        }
    }

    fn end(mut self: Box<Self>, fields: MeasurementFields, error: Option<&AuthError>) {
        self.fields.merge(fields);
        let elapsed_ms = self.started.elapsed().as_millis() as u64;

        if let Some(error) = error {
            tracing::debug!(
                measurement = self.event.name(),
                correlation_id = %self.correlation_id,
                elapsed_ms,
                success = false,
                error = (error as &dyn error::Error),
                "measurement ended"
            );
        } else {
            tracing::debug!(
                measurement = self.event.name(),
                correlation_id = %self.correlation_id,
                elapsed_ms,
                success = self.fields.success,
                request_id = self.fields.request_id.as_deref(),
                access_token_size = self.fields.access_token_size.map(|s| s as u64),
                id_token_size = self.fields.id_token_size.map(|s| s as u64),
                from_cache = self.fields.from_cache,
                counters = ?self.counters,
                "measurement ended"
            );
        }
    }
}
