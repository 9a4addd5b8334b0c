//! # Layout Event/State Protocol
//!
//! Two flows keyed by `ElementId`:
//!
//! 1. **Events**: the guest subscribes an element to a named event; later the
//!    host raises it back through `Bridge::raise_element_event`. The bridge is
//!    a pure conduit and never filters raised events against subscriptions.
//!    Hosts that want filtering ask `is_subscribed` first.
//! 2. **State**: the guest pushes an opaque blob whenever an element's model
//!    changes. Only the `(id, bytes)` framing is visible here.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::handles::ElementId;
use crate::host::Host;

/// Recorded `(element, event)` pairs.
#[derive(Debug, Default)]
pub struct EventSubscriptions {
    entries: DashMap<ElementId, BTreeSet<String>>,
}

impl EventSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a subscription. Returns `false` if it was already present.
    pub fn insert(&self, element: ElementId, event: &str) -> bool {
        self.entries
            .entry(element)
            .or_default()
            .insert(event.to_string())
    }

    pub fn contains(&self, element: ElementId, event: &str) -> bool {
        self.entries
            .get(&element)
            .is_some_and(|events| events.contains(event))
    }

    /// Events recorded for `element`, sorted by name.
    pub fn events_for(&self, element: ElementId) -> Vec<String> {
        self.entries
            .get(&element)
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops every subscription of an element that left the tree.
    pub fn forget(&self, element: ElementId) -> usize {
        self.entries
            .remove(&element)
            .map(|(_, events)| events.len())
            .unwrap_or(0)
    }

    /// Total number of `(element, event)` pairs.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Host half of the protocol: subscription bookkeeping plus state forwarding.
#[derive(Clone)]
pub struct LayoutProtocol {
    subscriptions: Arc<EventSubscriptions>,
    host: Arc<dyn Host>,
}

impl LayoutProtocol {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            subscriptions: Arc::new(EventSubscriptions::new()),
            host,
        }
    }

    /// Records a guest subscription and tells the host about new ones.
    ///
    /// A repeated subscription replaces nothing and is not forwarded again.
    pub fn subscribe(&self, element: ElementId, event: &str) -> bool {
        let fresh = self.subscriptions.insert(element, event);
        if fresh {
            self.host.subscribe_to_event(element, event);
        } else {
            tracing::debug!(%element, event, "duplicate subscription ignored");
        }
        fresh
    }

    /// Forwards a state blob to the rendering layer, unmodified.
    pub fn push_state(&self, element: ElementId, state: &[u8]) {
        self.host.state_changed(element, state);
    }

    pub fn is_subscribed(&self, element: ElementId, event: &str) -> bool {
        self.subscriptions.contains(element, event)
    }

    pub fn events_for(&self, element: ElementId) -> Vec<String> {
        self.subscriptions.events_for(element)
    }

    pub fn forget(&self, element: ElementId) -> usize {
        self.subscriptions.forget(element)
    }

    pub fn subscriptions(&self) -> &EventSubscriptions {
        &self.subscriptions
    }
}
