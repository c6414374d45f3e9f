use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info_span, Span};

use ftl_types::{Clock, OperationId, ParticipantId, SystemClock, TokenId};

use crate::error::{FabricError, Result};
use crate::event::{EventKind, EventPayload, LedgerEvent};

/// Filter for subscribing to a subset of ledger events.
///
/// Unset fields match everything; set fields must all match.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<EventKind>>,
    /// If set, only events touching one of these participants.
    pub participants: Option<Vec<ParticipantId>>,
    /// If set, only events touching one of these tokens.
    pub tokens: Option<Vec<TokenId>>,
}

impl EventFilter {
    /// Events of the given kinds only.
    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Events touching `participant` only.
    pub fn participant(participant: ParticipantId) -> Self {
        Self {
            participants: Some(vec![participant]),
            ..Default::default()
        }
    }

    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(ref participants) = self.participants {
            if !event
                .payload
                .participants()
                .into_iter()
                .any(|p| participants.contains(p))
            {
                return false;
            }
        }
        if let Some(ref tokens) = self.tokens {
            if !event
                .payload
                .tokens()
                .into_iter()
                .any(|t| tokens.contains(t))
            {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for ledger events.
pub type EventStream = broadcast::Receiver<LedgerEvent>;

/// Configuration for the [`EventBus`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Capacity of each subscriber's channel. A subscriber further behind
    /// than this loses its oldest events.
    pub channel_capacity: usize,
    /// Upper bound on live subscribers.
    pub max_subscribers: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            max_subscribers: 64,
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(FabricError::InvalidConfig(
                "channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Internal subscriber: a filter paired with a broadcast sender.
struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<LedgerEvent>,
}

impl Subscriber {
    fn is_live(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

#[derive(Default)]
struct RouterState {
    subscribers: Vec<Subscriber>,
    last_sequence: u64,
}

/// Ordered fan-out of ledger events to filtered subscribers.
///
/// Sequence numbers are assigned and events routed under one lock, so every
/// subscriber observes events in sequence order even with concurrent
/// publishers.
pub struct EventBus {
    config: BusConfig,
    clock: Arc<dyn Clock>,
    span: Span,
    router: RwLock<RouterState>,
}

impl EventBus {
    pub fn new(config: BusConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            span: info_span!("bus"),
            router: RwLock::new(RouterState::default()),
        })
    }

    /// Stamp events with `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Log bus activity under `span` instead of the default `bus` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Subscribe to events matching `filter`.
    ///
    /// Subscribers whose streams were dropped do not count toward the limit.
    pub fn subscribe(&self, filter: EventFilter) -> Result<EventStream> {
        let mut router = self
            .router
            .write()
            .map_err(|_| FabricError::LockPoisoned("router"))?;
        router.subscribers.retain(Subscriber::is_live);

        if router.subscribers.len() >= self.config.max_subscribers {
            return Err(FabricError::SubscriberLimit {
                max: self.config.max_subscribers,
            });
        }

        let (sender, receiver) = broadcast::channel(self.config.channel_capacity);
        router.subscribers.push(Subscriber { filter, sender });
        Ok(receiver)
    }

    /// Stamp the next sequence number on an event and deliver it to every
    /// matching subscriber. Never blocks on subscribers.
    pub fn publish(
        &self,
        operation_id: OperationId,
        kind: EventKind,
        payload: EventPayload,
    ) -> Result<LedgerEvent> {
        let _enter = self.span.enter();
        let mut router = self
            .router
            .write()
            .map_err(|_| FabricError::LockPoisoned("router"))?;

        router.last_sequence += 1;
        let event = LedgerEvent::new(
            router.last_sequence,
            self.clock.now(),
            operation_id,
            kind,
            payload,
        );

        router.subscribers.retain(|sub| {
            if sub.filter.matches(&event) {
                // A failed send means every receiver is gone.
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.is_live()
            }
        });

        debug!(id = %event.id, sequence = event.sequence, kind = %event.kind, "event published");
        Ok(event)
    }

    /// Number of registered subscribers, as of the last subscribe or
    /// publish.
    pub fn subscriber_count(&self) -> Result<usize> {
        Ok(self
            .router
            .read()
            .map_err(|_| FabricError::LockPoisoned("router"))?
            .subscribers
            .len())
    }

    /// Sequence number of the most recent event; 0 before the first.
    pub fn last_sequence(&self) -> Result<u64> {
        Ok(self
            .router
            .read()
            .map_err(|_| FabricError::LockPoisoned("router"))?
            .last_sequence)
    }
}
