//! Simulated engine for the demo binary and tests.
//!
//! Each resource owns one engine thread. Every property notification is
//! queued to that thread and delivered in order, so callbacks never run on
//! the thread that issued a command. With `clock` enabled the same thread
//! advances time/position every tick and ends the stream at `length_ms`.
//!
//! The engine counts creations, retains, releases, stops, destroys and any
//! command issued against a destroyed resource (see [`SimStats`]).

use super::{
    CallbackId, Content, Engine, EngineResource, Property, PropertyCallback, PropertyChange,
    PropertyValue, ResourceHandle, ResourceId,
};
use crate::core::state::EngineState;
use crate::error::EngineError;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, error, trace, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

/// How long [`SimResource::flush`] waits for the engine thread.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Simulated engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Clock tick in milliseconds.
    pub tick_ms: u64,
    /// Length of every piece of content.
    pub length_ms: i64,
    /// Advance time on the engine thread while playing.
    pub clock: bool,
    pub pausable: bool,
    pub seekable: bool,
    pub fps: f64,
    pub chapters: i64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_ms: 40,
            length_ms: 5000,
            clock: true,
            pausable: true,
            seekable: true,
            fps: 25.0,
            chapters: 1,
        }
    }
}

impl SimConfig {
    /// No clock: state and time only change when a test injects them.
    pub fn manual() -> Self {
        Self {
            clock: false,
            ..Self::default()
        }
    }
}

/// Command as recorded by a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetState(EngineState),
    Set(Property, PropertyValue),
    Stop,
}

/// Engine-wide counters.
#[derive(Debug, Default)]
pub struct SimStats {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    stops: AtomicUsize,
    retains: AtomicUsize,
    releases: AtomicUsize,
    over_releases: AtomicUsize,
    commands_after_destroy: AtomicUsize,
    double_destroys: AtomicUsize,
}

impl SimStats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn retains(&self) -> usize {
        self.retains.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Releases that took a resource's refcount below zero.
    pub fn over_releases(&self) -> usize {
        self.over_releases.load(Ordering::SeqCst)
    }

    pub fn commands_after_destroy(&self) -> usize {
        self.commands_after_destroy.load(Ordering::SeqCst)
    }

    pub fn double_destroys(&self) -> usize {
        self.double_destroys.load(Ordering::SeqCst)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ========== Engine ==========

pub struct SimEngine {
    config: SimConfig,
    next_id: AtomicU64,
    refuse: AtomicBool,
    shut_down: AtomicBool,
    resources: Mutex<Vec<Arc<SimResource>>>,
    stats: Arc<SimStats>,
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimEngine {
    pub fn new(config: SimConfig) -> Self {
        debug!("SimEngine created: {:?}", config);
        Self {
            config,
            next_id: AtomicU64::new(1),
            refuse: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            resources: Mutex::new(Vec::new()),
            stats: Arc::new(SimStats::default()),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Make subsequent `create` calls fail.
    pub fn set_refuse_create(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Every resource ever created, destroyed ones included.
    pub fn resources(&self) -> Vec<Arc<SimResource>> {
        lock(&self.resources).clone()
    }

    pub fn last_resource(&self) -> Option<Arc<SimResource>> {
        lock(&self.resources).last().cloned()
    }

    /// Typed variant of [`Engine::create`].
    pub fn spawn_resource(&self, content: &Content) -> Result<Arc<SimResource>, EngineError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(EngineError::ShutDown);
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(EngineError::Refused {
                mrl: content.mrl.clone(),
                reason: "creation disabled".into(),
            });
        }
        if content.mrl.trim().is_empty() {
            return Err(EngineError::Unsupported(content.mrl.clone()));
        }

        let id = ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let resource = SimResource::spawn(id, content.clone(), self.config.clone(), Arc::clone(&self.stats))?;
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        lock(&self.resources).push(Arc::clone(&resource));
        debug!("SimEngine: created {} for '{}'", id, content.mrl);
        Ok(resource)
    }
}

impl Engine for SimEngine {
    fn name(&self) -> &str {
        "sim"
    }

    fn create(&self, content: &Content) -> Result<ResourceHandle, EngineError> {
        let resource: ResourceHandle = self.spawn_resource(content)?;
        Ok(resource)
    }

    fn acquire(&self, id: ResourceId) -> Option<ResourceHandle> {
        lock(&self.resources)
            .iter()
            .find(|r| r.id == id && !r.is_destroyed())
            .map(|r| Arc::clone(r) as ResourceHandle)
    }

    fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("SimEngine shut down");
        }
    }
}

// ========== Resource ==========

enum Msg {
    Notify(PropertyChange),
    Flush(Sender<()>),
    Shutdown,
}

#[derive(Debug)]
struct Props {
    state: EngineState,
    time: i64,
    length: i64,
    position: f64,
    chapter: i64,
    rate: f64,
    drawable: Option<i64>,
    seekable: bool,
    pausable: bool,
}

pub struct SimResource {
    id: ResourceId,
    content: Content,
    config: SimConfig,
    props: Mutex<Props>,
    callbacks: Mutex<Vec<(CallbackId, Property, PropertyCallback)>>,
    next_callback: AtomicU64,
    refcount: AtomicI64,
    alive: AtomicBool,
    destroyed: AtomicBool,
    commands: Mutex<Vec<Command>>,
    stats: Arc<SimStats>,
    tx: Mutex<Option<Sender<Msg>>>,
    _thread: Mutex<Option<thread::JoinHandle<()>>>, // Thread exits once the sender is gone
}

impl SimResource {
    fn spawn(
        id: ResourceId,
        content: Content,
        config: SimConfig,
        stats: Arc<SimStats>,
    ) -> Result<Arc<Self>, EngineError> {
        let props = Props {
            state: EngineState::Init,
            time: 0,
            length: super::ms_to_raw(config.length_ms.max(0)),
            position: 0.0,
            chapter: 0,
            rate: 1.0,
            drawable: None,
            seekable: config.seekable,
            pausable: config.pausable,
        };
        let tick = config.clock.then(|| Duration::from_millis(config.tick_ms.max(1)));
        let mrl = content.mrl.clone();

        let resource = Arc::new(Self {
            id,
            content,
            config,
            props: Mutex::new(props),
            callbacks: Mutex::new(Vec::new()),
            next_callback: AtomicU64::new(1),
            refcount: AtomicI64::new(1),
            alive: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
            commands: Mutex::new(Vec::new()),
            stats,
            tx: Mutex::new(None),
            _thread: Mutex::new(None),
        });

        let (tx, rx) = unbounded();
        let weak = Arc::downgrade(&resource);
        let handle = thread::Builder::new()
            .name(format!("sim-engine-{}", id.0))
            .spawn(move || engine_loop(weak, rx, tick))
            .map_err(|e| {
                error!("Failed to spawn engine thread for {}: {}", id, e);
                EngineError::Refused {
                    mrl,
                    reason: e.to_string(),
                }
            })?;

        *lock(&resource.tx) = Some(tx);
        *lock(&resource._thread) = Some(handle);
        Ok(resource)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Commands issued so far, in order.
    pub fn commands(&self) -> Vec<Command> {
        lock(&self.commands).clone()
    }

    pub fn refcount(&self) -> i64 {
        self.refcount.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn callback_count(&self) -> usize {
        lock(&self.callbacks).len()
    }

    pub fn drawable(&self) -> Option<i64> {
        lock(&self.props).drawable
    }

    // ========== Injection (engine-side changes) ==========

    /// Change the primary state as if the pipeline did it.
    pub fn inject_state(&self, state: EngineState) {
        let old = std::mem::replace(&mut lock(&self.props).state, state);
        self.notify(Property::State, Some(PropertyValue::Int(old.code())), PropertyValue::Int(state.code()));
    }

    /// Report a new time (engine units) on the interface-change channel.
    pub fn inject_time(&self, raw: i64) {
        let old = std::mem::replace(&mut lock(&self.props).time, raw);
        self.notify(Property::Time, Some(PropertyValue::Int(old)), PropertyValue::Int(raw));
    }

    /// Report a new position on the interface-change channel.
    pub fn inject_position(&self, position: f64) {
        let old = std::mem::replace(&mut lock(&self.props).position, position);
        self.notify(Property::Position, Some(PropertyValue::Float(old)), PropertyValue::Float(position));
    }

    pub fn inject_seekable(&self, seekable: bool) {
        let old = std::mem::replace(&mut lock(&self.props).seekable, seekable);
        self.notify(Property::Seekable, Some(PropertyValue::Bool(old)), PropertyValue::Bool(seekable));
    }

    pub fn inject_pausable(&self, pausable: bool) {
        let old = std::mem::replace(&mut lock(&self.props).pausable, pausable);
        self.notify(Property::Pausable, Some(PropertyValue::Bool(old)), PropertyValue::Bool(pausable));
    }

    /// Block until every notification queued so far has been delivered.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = unbounded();
        if self.send(Msg::Flush(ack_tx)) {
            let _ = ack_rx.recv_timeout(FLUSH_TIMEOUT);
        }
    }

    // ========== Internals ==========

    fn send(&self, msg: Msg) -> bool {
        match lock(&self.tx).as_ref() {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }

    fn notify(&self, property: Property, old: Option<PropertyValue>, new: PropertyValue) {
        trace!("{}: {} -> {:?}", self.id, property.name(), new);
        self.send(Msg::Notify(PropertyChange { property, old, new }));
    }

    /// Record a command; refuses (and counts) commands against a destroyed resource.
    fn record(&self, command: Command) -> bool {
        if self.is_destroyed() {
            self.stats.commands_after_destroy.fetch_add(1, Ordering::SeqCst);
            warn!("{}: {:?} issued after destroy", self.id, command);
            return false;
        }
        lock(&self.commands).push(command);
        true
    }

    /// Run callbacks subscribed to the change's channel. Engine thread only.
    fn deliver(&self, change: &PropertyChange) {
        let channel = change.property.channel();
        let callbacks: Vec<PropertyCallback> = lock(&self.callbacks)
            .iter()
            .filter(|(_, p, _)| *p == channel)
            .map(|(_, _, cb)| Arc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(self, change);
        }
    }

    /// One clock tick. Engine thread only.
    fn advance(&self, tick: Duration) {
        if !self.is_alive() {
            return;
        }
        let changes = {
            let mut p = lock(&self.props);
            if p.state != EngineState::Playing {
                return;
            }
            let step = (tick.as_micros() as f64 * p.rate) as i64;
            let old_time = p.time;
            let old_pos = p.position;
            p.time = (p.time + step).min(p.length);
            p.position = if p.length > 0 {
                p.time as f64 / p.length as f64
            } else {
                0.0
            };

            let mut changes = vec![
                PropertyChange {
                    property: Property::Position,
                    old: Some(PropertyValue::Float(old_pos)),
                    new: PropertyValue::Float(p.position),
                },
                PropertyChange {
                    property: Property::Time,
                    old: Some(PropertyValue::Int(old_time)),
                    new: PropertyValue::Int(p.time),
                },
            ];
            if p.time >= p.length {
                let old = std::mem::replace(&mut p.state, EngineState::Ended);
                debug!("{}: reached end at {} us", self.id, p.time);
                changes.push(PropertyChange {
                    property: Property::State,
                    old: Some(PropertyValue::Int(old.code())),
                    new: PropertyValue::Int(EngineState::Ended.code()),
                });
            }
            changes
        };

        for change in &changes {
            self.deliver(change);
        }
    }
}

fn engine_loop(weak: Weak<SimResource>, rx: Receiver<Msg>, tick: Option<Duration>) {
    trace!("Engine thread started");
    loop {
        let msg = match tick {
            Some(t) => match rx.recv_timeout(t) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            },
        };

        match msg {
            Some(Msg::Notify(change)) => {
                let Some(resource) = weak.upgrade() else { break };
                resource.deliver(&change);
            }
            Some(Msg::Flush(ack)) => {
                let _ = ack.send(());
            }
            Some(Msg::Shutdown) => break,
            None => {
                let (Some(resource), Some(t)) = (weak.upgrade(), tick) else { break };
                resource.advance(t);
            }
        }
    }
    trace!("Engine thread stopped");
}

impl EngineResource for SimResource {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn content(&self) -> Content {
        self.content.clone()
    }

    fn set_state(&self, state: EngineState) {
        if !self.record(Command::SetState(state)) {
            return;
        }
        if state == EngineState::Playing {
            self.alive.store(true, Ordering::SeqCst);
        }
        let old = std::mem::replace(&mut lock(&self.props).state, state);
        if old != state {
            self.notify(Property::State, Some(PropertyValue::Int(old.code())), PropertyValue::Int(state.code()));
        }
    }

    fn get(&self, property: Property) -> Option<PropertyValue> {
        let p = lock(&self.props);
        Some(match property {
            Property::State => PropertyValue::Int(p.state.code()),
            Property::Seekable => PropertyValue::Bool(p.seekable),
            Property::Pausable => PropertyValue::Bool(p.pausable),
            Property::Position => PropertyValue::Float(p.position),
            Property::Time => PropertyValue::Int(p.time),
            Property::Length => PropertyValue::Int(p.length),
            Property::Chapter => PropertyValue::Int(p.chapter),
            Property::Rate => PropertyValue::Float(p.rate),
            Property::Drawable => PropertyValue::Int(p.drawable?),
            Property::IntfChange => return None,
        })
    }

    fn set(&self, property: Property, value: PropertyValue) {
        if !self.record(Command::Set(property, value)) {
            return;
        }
        let mut p = lock(&self.props);
        match (property, value) {
            (Property::Time, PropertyValue::Int(raw)) => {
                p.time = raw.clamp(0, p.length);
                p.position = if p.length > 0 { p.time as f64 / p.length as f64 } else { 0.0 };
            }
            (Property::Position, v) => {
                if let Some(pos) = v.as_float() {
                    p.position = pos.clamp(0.0, 1.0);
                    p.time = (p.position * p.length as f64) as i64;
                }
            }
            (Property::Chapter, PropertyValue::Int(c)) => p.chapter = c,
            (Property::Rate, v) => {
                if let Some(rate) = v.as_float().filter(|r| *r > 0.0) {
                    p.rate = rate;
                }
            }
            (Property::Drawable, PropertyValue::Int(d)) => p.drawable = Some(d),
            _ => warn!("{}: ignoring write of {:?} to '{}'", self.id, value, property.name()),
        }
    }

    fn choices_count(&self, property: Property) -> Option<i64> {
        (property == Property::Chapter).then_some(self.config.chapters)
    }

    fn video_fps(&self) -> Option<f64> {
        (self.config.fps > 0.0).then_some(self.config.fps)
    }

    fn add_callback(&self, property: Property, callback: PropertyCallback) -> CallbackId {
        let id = CallbackId(self.next_callback.fetch_add(1, Ordering::Relaxed));
        lock(&self.callbacks).push((id, property, callback));
        id
    }

    fn remove_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = lock(&self.callbacks);
        let before = callbacks.len();
        callbacks.retain(|(cid, _, _)| *cid != id);
        callbacks.len() != before
    }

    fn retain(&self) {
        self.refcount.fetch_add(1, Ordering::SeqCst);
        self.stats.retains.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        let prev = self.refcount.fetch_sub(1, Ordering::SeqCst);
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
        if prev <= 0 {
            self.stats.over_releases.fetch_add(1, Ordering::SeqCst);
            warn!("{}: released below zero ({})", self.id, prev - 1);
        }
    }

    fn stop(&self) {
        if !self.record(Command::Stop) {
            return;
        }
        self.alive.store(false, Ordering::SeqCst);
        self.stats.stops.fetch_add(1, Ordering::SeqCst);
        debug!("{}: stopped", self.id);
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            self.stats.double_destroys.fetch_add(1, Ordering::SeqCst);
            warn!("{}: destroyed twice", self.id);
            return;
        }
        self.alive.store(false, Ordering::SeqCst);
        lock(&self.callbacks).clear();
        self.send(Msg::Shutdown);
        lock(&self.tx).take();
        self.stats.destroyed.fetch_add(1, Ordering::SeqCst);
        debug!("{}: destroyed", self.id);
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.is_destroyed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_engine() -> SimEngine {
        SimEngine::new(SimConfig::manual())
    }

    #[test]
    fn test_create_and_acquire() {
        let engine = manual_engine();
        let res = engine.create(&Content::new("sim://a")).unwrap();
        assert_eq!(engine.stats().created(), 1);
        assert!(engine.acquire(res.id()).is_some());
        assert_eq!(res.state_code(), Some(EngineState::Init.code()));

        res.destroy();
        assert!(engine.acquire(res.id()).is_none());
        assert_eq!(engine.stats().destroyed(), 1);
    }

    #[test]
    fn test_create_refused() {
        let engine = manual_engine();
        engine.set_refuse_create(true);
        assert!(matches!(
            engine.create(&Content::new("sim://a")),
            Err(EngineError::Refused { .. })
        ));
        engine.set_refuse_create(false);
        assert!(matches!(
            engine.create(&Content::new("  ")),
            Err(EngineError::Unsupported(_))
        ));
        assert_eq!(engine.stats().created(), 0);
    }

    #[test]
    fn test_callbacks_run_on_engine_thread_in_order() {
        let engine = manual_engine();
        let res = engine.spawn_resource(&Content::new("sim://a")).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let caller = thread::current().id();
        res.add_callback(
            Property::IntfChange,
            Arc::new(move |_: &dyn EngineResource, change: &PropertyChange| {
                assert_ne!(thread::current().id(), caller);
                s.lock().unwrap().push(change.property);
            }),
        );

        res.inject_time(1000);
        res.inject_position(0.5);
        res.inject_state(EngineState::Playing); // different channel
        res.flush();

        assert_eq!(*seen.lock().unwrap(), vec![Property::Time, Property::Position]);
    }

    #[test]
    fn test_shutdown_refuses_create() {
        let engine = manual_engine();
        let res = engine.spawn_resource(&Content::new("sim://a")).unwrap();
        engine.shutdown();
        assert_eq!(
            engine.create(&Content::new("sim://b")).err(),
            Some(EngineError::ShutDown)
        );
        assert_eq!(engine.stats().created(), 1);
        res.set_state(EngineState::Playing);
        assert!(res.is_alive());
    }

    #[test]
    fn test_command_callbacks_not_delivered_on_calling_thread() {
        let engine = manual_engine();
        let res = engine.spawn_resource(&Content::new("sim://a")).unwrap();
        let (tx, rx) = unbounded();
        res.add_callback(
            Property::State,
            Arc::new(move |_: &dyn EngineResource, _: &PropertyChange| {
                let _ = tx.send(thread::current().id());
            }),
        );

        res.set_state(EngineState::Playing);
        res.set_state(EngineState::Paused);
        res.flush();

        let caller = thread::current().id();
        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|id| *id != caller));
    }

    #[test]
    fn test_remove_callback() {
        let engine = manual_engine();
        let res = engine.spawn_resource(&Content::new("sim://a")).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let id = res.add_callback(
            Property::State,
            Arc::new(move |_: &dyn EngineResource, _: &PropertyChange| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        res.inject_state(EngineState::Playing);
        res.flush();
        assert!(res.remove_callback(id));
        assert!(!res.remove_callback(id));
        res.inject_state(EngineState::Paused);
        res.flush();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_commands_after_destroy_are_counted() {
        let engine = manual_engine();
        let res = engine.spawn_resource(&Content::new("sim://a")).unwrap();
        res.set_state(EngineState::Playing);
        res.destroy();
        res.set_state(EngineState::Paused);
        res.stop();
        res.destroy();

        assert_eq!(res.commands(), vec![Command::SetState(EngineState::Playing)]);
        assert_eq!(engine.stats().commands_after_destroy(), 2);
        assert_eq!(engine.stats().double_destroys(), 1);
        assert!(!res.is_alive());
    }

    #[test]
    fn test_refcounting() {
        let engine = manual_engine();
        let res = engine.spawn_resource(&Content::new("sim://a")).unwrap();
        assert_eq!(res.refcount(), 1);
        res.retain();
        res.retain();
        res.release();
        assert_eq!(res.refcount(), 2);
        res.release();
        res.release();
        res.release();
        assert_eq!(engine.stats().over_releases(), 1);
    }

    #[test]
    fn test_property_writes() {
        let engine = manual_engine();
        let res = engine.spawn_resource(&Content::new("sim://a")).unwrap();
        res.set(Property::Time, PropertyValue::Int(2_500_000));
        assert_eq!(res.get(Property::Position), Some(PropertyValue::Float(0.5)));
        res.set(Property::Position, PropertyValue::Float(0.25));
        assert_eq!(res.get(Property::Time), Some(PropertyValue::Int(1_250_000)));
        res.set(Property::Rate, PropertyValue::Float(2.0));
        res.set(Property::Rate, PropertyValue::Float(-1.0));
        assert_eq!(res.get(Property::Rate), Some(PropertyValue::Float(2.0)));
        assert_eq!(res.get(Property::Drawable), None);
        res.set(Property::Drawable, PropertyValue::Int(42));
        assert_eq!(res.drawable(), Some(42));
        assert_eq!(res.choices_count(Property::Chapter), Some(1));
        assert_eq!(res.choices_count(Property::Rate), None);
    }

    #[test]
    fn test_clock_reaches_end() {
        let engine = SimEngine::new(SimConfig {
            tick_ms: 5,
            length_ms: 20,
            ..SimConfig::default()
        });
        let res = engine.spawn_resource(&Content::new("sim://clock")).unwrap();
        let (tx, rx) = unbounded();
        res.add_callback(
            Property::State,
            Arc::new(move |_: &dyn EngineResource, change: &PropertyChange| {
                let _ = tx.send(change.new);
            }),
        );
        res.set_state(EngineState::Playing);

        let mut states = Vec::new();
        while let Ok(v) = rx.recv_timeout(Duration::from_secs(5)) {
            states.push(v);
            if v == PropertyValue::Int(EngineState::Ended.code()) {
                break;
            }
        }
        assert_eq!(
            states,
            vec![
                PropertyValue::Int(EngineState::Playing.code()),
                PropertyValue::Int(EngineState::Ended.code()),
            ]
        );
        assert_eq!(res.get(Property::Time), Some(PropertyValue::Int(20_000)));
    }
}
