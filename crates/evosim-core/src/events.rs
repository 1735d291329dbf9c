//! Synchronous event fan-out and the optional action-history sink.
//!
//! Events are collected while a tick runs and dispatched only after it
//! completes, so no listener ever observes intermediate state. Listeners
//! receive `&SimEvent` and cannot reach back into the entity store; that
//! isolation is enforced by ownership, not locking.

use crate::decision::{Action, DeathCause};
use crate::entity::{Animal, AnimalId, Corpse, CorpseId};
use crate::tick::Tick;
use serde::{Deserialize, Serialize};

/// Discriminant used for kind-filtered subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Tick,
    AnimalBorn,
    AnimalDied,
    CorpseCreated,
    CorpseRemoved,
    Paused,
    Resumed,
    Reset,
}

/// Everything the core reports to shells.
#[derive(Debug, Clone, Serialize)]
pub enum SimEvent {
    Tick {
        tick: Tick,
        deer: usize,
        wolf: usize,
        vegetation: usize,
    },
    AnimalBorn {
        animal: Animal,
    },
    AnimalDied {
        animal: Animal,
        cause: DeathCause,
    },
    CorpseCreated {
        corpse: Corpse,
    },
    CorpseRemoved {
        id: CorpseId,
    },
    Paused,
    Resumed,
    Reset,
}

impl SimEvent {
    /// The kind discriminant for subscription filtering.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Tick { .. } => EventKind::Tick,
            Self::AnimalBorn { .. } => EventKind::AnimalBorn,
            Self::AnimalDied { .. } => EventKind::AnimalDied,
            Self::CorpseCreated { .. } => EventKind::CorpseCreated,
            Self::CorpseRemoved { .. } => EventKind::CorpseRemoved,
            Self::Paused => EventKind::Paused,
            Self::Resumed => EventKind::Resumed,
            Self::Reset => EventKind::Reset,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    kind: Option<EventKind>,
    handler: Box<dyn FnMut(&SimEvent)>,
}

/// Small synchronous pub/sub over [`SimEvent`].
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one event kind.
    pub fn subscribe(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&SimEvent) + 'static,
    ) -> SubscriptionId {
        self.push(Some(kind), Box::new(handler))
    }

    /// Subscribe to every event.
    pub fn subscribe_all(&mut self, handler: impl FnMut(&SimEvent) + 'static) -> SubscriptionId {
        self.push(None, Box::new(handler))
    }

    fn push(
        &mut self,
        kind: Option<EventKind>,
        handler: Box<dyn FnMut(&SimEvent)>,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push(Subscriber { id, kind, handler });
        id
    }

    /// Drop a subscription; returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|sub| sub.id != id);
        before != self.subscribers.len()
    }

    /// Deliver one event to every matching subscriber, in subscription order.
    pub fn emit(&mut self, event: &SimEvent) {
        let kind = event.kind();
        for sub in &mut self.subscribers {
            if sub.kind.is_none() || sub.kind == Some(kind) {
                (sub.handler)(event);
            }
        }
    }
}

/// Receives one record per executed action, in execution order.
pub trait ActionHistorySink {
    fn record(&mut self, animal: AnimalId, tick: Tick, action: &Action, detail: &str);
}

/// Default sink that drops all records.
#[derive(Debug, Default)]
pub struct NullActionHistory;

impl ActionHistorySink for NullActionHistory {
    fn record(&mut self, _animal: AnimalId, _tick: Tick, _action: &Action, _detail: &str) {}
}
