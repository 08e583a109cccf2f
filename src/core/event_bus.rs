//! Typed event bus owned by each session.
//!
//! Architecture:
//! - Event kinds must be registered before they can be emitted
//! - Subscribers attach to one kind (or all kinds) and are invoked synchronously
//! - emit() invokes callbacks in subscription order; optionally also queues
//!   the event for deferred processing via poll()
//!
//! Callback order: FIFO (first-subscribed, first-called) within one kind,
//! kind subscribers before catch-all subscribers.
//!
//! Callbacks run on whichever thread emitted the event. The bus never holds
//! its subscriber lock while a callback runs, so a handler may subscribe or
//! unsubscribe without deadlocking.

use crate::core::session_events::{EventKind, SessionEvent};
use log::{trace, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Type-erased callback
type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subscriber target: one kind, or everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Topic {
    Kind(EventKind),
    All,
}

#[derive(Default)]
struct Registry {
    kinds: HashSet<EventKind>,
    subscribers: HashMap<Topic, Vec<(SubscriptionId, Callback)>>,
}

/// Session event bus with optional deferred processing.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
    queue: Option<Arc<Mutex<Vec<SessionEvent>>>>,
    next_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.read();
        f.debug_struct("EventBus")
            .field("kinds", &registry.kinds.len())
            .field("subscribers", &registry.subscribers.values().map(Vec::len).sum::<usize>())
            .field("queue_len", &self.queue_len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl EventBus {
    /// Bus without a deferred queue.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            queue: None,
            next_id: Arc::new(AtomicU64::new(1)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bus that also queues every emitted event for [`poll`](Self::poll).
    pub fn with_queue() -> Self {
        Self {
            queue: Some(Arc::new(Mutex::new(Vec::new()))),
            ..Self::new()
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(queue: &Mutex<Vec<SessionEvent>>) -> MutexGuard<'_, Vec<SessionEvent>> {
        queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========== Registration ==========

    /// Declare that this bus carries events of `kind`.
    pub fn register_kind(&self, kind: EventKind) {
        self.write().kinds.insert(kind);
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.read().kinds.contains(&kind)
    }

    // ========== Pub/Sub (immediate) ==========

    /// Subscribe to events of one kind.
    ///
    /// # Example
    /// ```ignore
    /// let id = session.events().subscribe(EventKind::TimeChanged, |e| {
    ///     println!("{e}");
    /// });
    /// ```
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.add(Topic::Kind(kind), Arc::new(callback))
    }

    /// Subscribe to every event kind.
    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.add(Topic::All, Arc::new(callback))
    }

    fn add(&self, topic: Topic, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write().subscribers.entry(topic).or_default().push((id, callback));
        id
    }

    /// Remove one subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.write();
        let mut found = false;
        for subs in registry.subscribers.values_mut() {
            let before = subs.len();
            subs.retain(|(sid, _)| *sid != id);
            found |= subs.len() != before;
        }
        found
    }

    /// Emit an event to its kind's subscribers, then to catch-all subscribers.
    ///
    /// Events of unregistered kinds and events emitted after [`close`](Self::close)
    /// are dropped.
    pub fn emit(&self, event: SessionEvent) {
        if self.is_closed() {
            trace!("Bus closed, dropping {:?}", event);
            return;
        }

        let kind = event.kind();
        let callbacks: Vec<Callback> = {
            let registry = self.read();
            if !registry.kinds.contains(&kind) {
                warn!("Dropping event of unregistered kind {:?}", kind);
                return;
            }
            [Topic::Kind(kind), Topic::All]
                .iter()
                .filter_map(|t| registry.subscribers.get(t))
                .flat_map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)))
                .collect()
        };

        for cb in &callbacks {
            cb(&event);
        }

        // Queue for deferred processing with eviction
        if let Some(queue) = &self.queue {
            let mut queue = Self::lock_queue(queue);
            if queue.len() >= MAX_QUEUE_SIZE {
                let evict_count = queue.len() / 2;
                warn!("EventBus queue full ({} events), evicting oldest {}", queue.len(), evict_count);
                queue.drain(0..evict_count);
            }
            queue.push(event);
        }
    }

    // ========== Deferred Processing ==========

    /// Take all queued events. Always empty for a bus built with [`new`](Self::new).
    pub fn poll(&self) -> Vec<SessionEvent> {
        match &self.queue {
            Some(queue) => std::mem::take(&mut *Self::lock_queue(queue)),
            None => Vec::new(),
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.as_ref().map(|q| Self::lock_queue(q).len()).unwrap_or(0)
    }

    // ========== Teardown ==========

    /// Drop all subscribers and queued events; further emits are ignored.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut registry = self.write();
        registry.subscribers.clear();
        registry.kinds.clear();
        drop(registry);
        if let Some(queue) = &self.queue {
            Self::lock_queue(queue).clear();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn has_subscribers(&self, kind: EventKind) -> bool {
        let registry = self.read();
        [Topic::Kind(kind), Topic::All]
            .iter()
            .any(|t| registry.subscribers.get(t).is_some_and(|v| !v.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;

    fn registered_bus() -> EventBus {
        let bus = EventBus::with_queue();
        for kind in EventKind::ALL {
            bus.register_kind(kind);
        }
        bus
    }

    #[test]
    fn test_subscribe_emit_immediate() {
        let bus = registered_bus();
        let total = Arc::new(AtomicI64::new(0));
        let t = Arc::clone(&total);

        bus.subscribe(EventKind::TimeChanged, move |e| {
            if let SessionEvent::TimeChanged(ms) = e {
                t.fetch_add(*ms, Ordering::SeqCst);
            }
        });

        bus.emit(SessionEvent::TimeChanged(10));
        assert_eq!(total.load(Ordering::SeqCst), 10);

        bus.emit(SessionEvent::TimeChanged(5));
        bus.emit(SessionEvent::Played);
        assert_eq!(total.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn test_unregistered_kind_is_dropped() {
        let bus = EventBus::with_queue();
        bus.register_kind(EventKind::Played);
        let hits = Arc::new(AtomicI64::new(0));
        let h = Arc::clone(&hits);
        bus.subscribe_all(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(SessionEvent::Paused);
        bus.emit(SessionEvent::Played);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.poll(), vec![SessionEvent::Played]);
    }

    #[test]
    fn test_order_preserved_for_catch_all() {
        let bus = registered_bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        bus.subscribe_all(move |e| s.lock().unwrap().push(e.clone()));

        let sent = vec![
            SessionEvent::Played,
            SessionEvent::TimeChanged(1),
            SessionEvent::PositionChanged(0.5),
            SessionEvent::Paused,
            SessionEvent::ReachedEnd,
        ];
        for e in sent.clone() {
            bus.emit(e);
        }
        assert_eq!(*seen.lock().unwrap(), sent);
        assert_eq!(bus.poll(), sent);
        assert_eq!(bus.poll().len(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = registered_bus();
        let hits = Arc::new(AtomicI64::new(0));
        let h = Arc::clone(&hits);
        let id = bus.subscribe(EventKind::Played, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(SessionEvent::Played);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(SessionEvent::Played);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!bus.has_subscribers(EventKind::Played));
    }

    #[test]
    fn test_handler_may_subscribe_reentrantly() {
        let bus = registered_bus();
        let inner = bus.clone();
        bus.subscribe(EventKind::Played, move |_| {
            inner.subscribe(EventKind::Paused, |_| {});
        });
        bus.emit(SessionEvent::Played);
        assert!(bus.has_subscribers(EventKind::Paused));
    }

    #[test]
    fn test_close_drops_everything() {
        let bus = registered_bus();
        let hits = Arc::new(AtomicI64::new(0));
        let h = Arc::clone(&hits);
        bus.subscribe_all(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(SessionEvent::Played);
        assert_eq!(bus.queue_len(), 1);

        bus.close();
        assert!(bus.is_closed());
        assert_eq!(bus.queue_len(), 0);

        bus.emit(SessionEvent::Paused);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.poll().len(), 0);
    }

    #[test]
    fn test_queue_evicts_oldest_half_when_full() {
        let bus = registered_bus();
        for ms in 0..MAX_QUEUE_SIZE as i64 {
            bus.emit(SessionEvent::TimeChanged(ms));
        }
        assert_eq!(bus.queue_len(), MAX_QUEUE_SIZE);

        bus.emit(SessionEvent::ReachedEnd);
        let events = bus.poll();
        assert_eq!(events.len(), MAX_QUEUE_SIZE / 2 + 1);
        assert_eq!(events[0], SessionEvent::TimeChanged(MAX_QUEUE_SIZE as i64 / 2));
        assert_eq!(events.last(), Some(&SessionEvent::ReachedEnd));
    }

    #[test]
    fn test_plain_bus_has_no_queue() {
        let bus = EventBus::new();
        bus.register_kind(EventKind::Played);
        bus.emit(SessionEvent::Played);
        assert_eq!(bus.queue_len(), 0);
        assert!(bus.poll().is_empty());
    }
}
