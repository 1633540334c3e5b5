//! Lifecycle events
//!
//! The controller reports the start and outcome of every acquisition through
//! an [`EventHandler`]. Events are always logged with `tracing` and are fanned
//! out to any registered [`EventSink`]s.

use std::{error, fmt, sync::Arc};

use arc_swap::ArcSwap;

use crate::{
    account::AccountInfo, bridge::dto::BridgeError, error::AuthError, request::ValidRequest,
    result::AuthenticationResult, CorrelationId,
};

/// The kind of lifecycle event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Initialization has begun
    InitializeStart,
    /// Initialization has finished
    InitializeEnd,
    /// A token acquisition has begun
    AcquireTokenStart,
    /// A token acquisition succeeded
    AcquireTokenSuccess,
    /// A token acquisition failed
    AcquireTokenFailure,
    /// The active account was changed by the application
    ActiveAccountChanged,
}

/// How the user may be involved in an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionType {
    /// The host may show UI
    Popup,
    /// No user interaction
    Silent,
    /// Not an interaction at all
    None,
}

/// Data attached to an event
#[derive(Clone, Debug)]
pub enum EventPayload {
    /// The request being served
    Request(ValidRequest),
    /// The result handed back to the caller
    Result(AuthenticationResult),
    /// The new active account
    Account(Option<AccountInfo>),
}

/// The error attached to a failure event, as originally raised
#[derive(Clone, Debug)]
pub enum EventError {
    /// The raw error reported by the host bridge
    Bridge(BridgeError),
    /// An error raised by this crate
    Auth(AuthError),
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bridge(e) => fmt::Display::fmt(e, f),
            Self::Auth(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl error::Error for EventError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Bridge(e) => Some(e),
            Self::Auth(e) => Some(e),
        }
    }
}

/// A lifecycle event
#[derive(Clone, Debug)]
pub struct EventMessage {
    /// The kind of event
    pub event_type: EventType,
    /// How the user is involved
    pub interaction_type: InteractionType,
    /// The correlation identifier of the operation, when there is one
    pub correlation_id: Option<CorrelationId>,
    /// Associated data
    pub payload: Option<EventPayload>,
    /// The error, for failure events
    pub error: Option<EventError>,
}

impl EventMessage {
    /// Constructs an event without payload or error
    pub fn new(event_type: EventType, interaction_type: InteractionType) -> Self {
        Self {
            event_type,
            interaction_type,
            correlation_id: None,
            payload: None,
            error: None,
        }
    }

    /// Attaches a correlation identifier
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Attaches a payload
    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attaches an error
    pub fn with_error(mut self, error: EventError) -> Self {
        self.error = Some(error);
        self
    }
}

/// A receiver of lifecycle events
pub trait EventSink: Send + Sync {
    /// Handles an event
    fn emit_event(&self, message: &EventMessage);
}

impl<F> EventSink for F
where
    F: Fn(&EventMessage) + Send + Sync,
{
    #[inline]
    fn emit_event(&self, message: &EventMessage) {
        self(message)
    }
}

/// A handle to a registered event callback
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallbackId(String);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logs events and dispatches them to registered sinks
#[derive(Default)]
pub struct EventHandler {
    sinks: ArcSwap<Vec<(CallbackId, Arc<dyn EventSink>)>>,
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field(
                "sinks",
                &self
                    .sinks
                    .load()
                    .iter()
                    .map(|(id, _)| id.0.clone())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl EventHandler {
    /// Constructs a handler with no registered sinks
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sink, returning a handle that can later remove it
    pub fn add_callback(&self, id: String, sink: Arc<dyn EventSink>) -> CallbackId {
        let id = CallbackId(id);
        let entry = (id.clone(), sink);
        self.sinks.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(entry.clone());
            next
        });
        tracing::debug!(callback = %id, "event callback registered");
        id
    }

    /// Removes a previously registered sink
    ///
    /// Returns whether a sink was removed.
    pub fn remove_callback(&self, id: &CallbackId) -> bool {
        let previous = self.sinks.rcu(|current| {
            current
                .iter()
                .filter(|(existing, _)| existing != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        let removed = previous.iter().any(|(existing, _)| existing == id);
        tracing::debug!(callback = %id, removed, "event callback removed");
        removed
    }

    /// Logs the event and hands it to every registered sink
    pub fn emit_event(&self, message: EventMessage) {
        let correlation_id = message.correlation_id.as_ref().map(|c| c.as_str());
        match &message.error {
            Some(error) => tracing::warn!(
                event = ?message.event_type,
                interaction = ?message.interaction_type,
                correlation_id,
                error = (error as &dyn error::Error),
                "emitting event"
            ),
            None => tracing::debug!(
                event = ?message.event_type,
                interaction = ?message.interaction_type,
                correlation_id,
                "emitting event"
            ),
        }

        for (_, sink) in self.sinks.load().iter() {
            sink.emit_event(&message);
        }
    }
}
