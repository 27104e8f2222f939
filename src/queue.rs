//! FIFO event queues.
//!
//! [`EventQueue`] is the per-instance queue of raised events.
//! [`GlobalEventQueue`] carries events between the monitors of a
//! synchronous set, or between sets, tagged with a channel. Both are
//! unbounded and take ownership of what is pushed.

use std::collections::VecDeque;

use crate::event::{Aux, EventId};
use crate::identity::Identity;
use crate::value::Value;

/// An event waiting in an instance queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    /// Raised event.
    pub event: EventId,
    /// Its parameters.
    pub params: Vec<Value>,
    /// Aux of the imported event that caused it.
    pub aux: Aux,
}

/// Per-instance FIFO of raised events.
#[derive(Debug, Default)]
pub struct EventQueue {
    entries: VecDeque<QueuedEvent>,
}

impl EventQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends at the back.
    pub fn push(&mut self, event: EventId, params: Vec<Value>, aux: Aux) {
        self.entries.push_back(QueuedEvent { event, params, aux });
    }

    /// Takes the oldest entry.
    pub fn pop(&mut self) -> Option<QueuedEvent> {
        self.entries.pop_front()
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// An event crossing monitor or set boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalEvent<C> {
    /// Channel the event travels on.
    pub channel: C,
    /// Identity of the raising monitor; `None` for environment input.
    pub identities: Option<Identity>,
    /// Event parameters.
    pub params: Vec<Value>,
    /// Aux carried through the cascade.
    pub aux: Aux,
}

/// FIFO of channel-tagged events.
#[derive(Debug)]
pub struct GlobalEventQueue<C> {
    entries: VecDeque<GlobalEvent<C>>,
}

impl<C> Default for GlobalEventQueue<C> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<C> GlobalEventQueue<C> {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends at the back.
    pub fn push(&mut self, channel: C, identities: Option<Identity>, params: Vec<Value>, aux: Aux) {
        self.entries.push_back(GlobalEvent {
            channel,
            identities,
            params,
            aux,
        });
    }

    /// Takes the oldest entry.
    pub fn pop(&mut self) -> Option<GlobalEvent<C>> {
        self.entries.pop_front()
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
