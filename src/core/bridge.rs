//! Notification bridge: engine property changes -> session events.
//!
//! Registered once per owned resource, when `play` attaches it. Callbacks
//! hold only weak references to the session and its descriptor, so a
//! resource never keeps its session alive. They never take the session
//! lock: detach may hold it while the engine is still delivering.
//!
//! Translation rules:
//! - state Ended   -> `ReachedEnd`, descriptor `NothingSpecial`
//! - state Paused  -> `Paused`,     descriptor `Playing`
//! - state Playing -> `Played`,     descriptor `Playing`
//! - state Error   -> `ReachedEnd`, descriptor `Error`
//! - position/time -> `PositionChanged`/`TimeChanged`, only while Playing

use crate::core::session::SessionShared;
use crate::core::session_events::SessionEvent;
use crate::core::state::{EngineState, MediaState};
use crate::engine::{
    CallbackId, EngineResource, Property, PropertyCallback, PropertyChange, PropertyValue,
    ResourceHandle, raw_to_ms,
};
use crate::entities::media::{Media, WeakMedia};
use log::{debug, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Channels the bridge listens on.
const STATE_CHANNELS: [Property; 3] = [Property::State, Property::Seekable, Property::Pausable];

/// What callbacks need to reach their session.
struct Target {
    session: Weak<SessionShared>,
    media: WeakMedia,
    active: AtomicBool,
}

/// Live registration on one resource. Dropping it does not unsubscribe.
pub(crate) struct BridgeSubscription {
    resource: ResourceHandle,
    target: Arc<Target>,
    callbacks: Vec<CallbackId>,
}

impl BridgeSubscription {
    /// Remove every callback. In-flight deliveries that already passed the
    /// active check may still complete.
    pub(crate) fn unsubscribe(self) {
        self.target.active.store(false, Ordering::Release);
        for id in &self.callbacks {
            self.resource.remove_callback(*id);
        }
        debug!("Bridge detached from {}", self.resource.id());
    }
}

/// Register state and interface-change callbacks on `resource`.
pub(crate) fn register(
    resource: &ResourceHandle,
    session: Weak<SessionShared>,
    media: &Media,
) -> BridgeSubscription {
    let target = Arc::new(Target {
        session,
        media: media.downgrade(),
        active: AtomicBool::new(true),
    });

    let mut callbacks = Vec::with_capacity(STATE_CHANNELS.len() + 1);
    for channel in STATE_CHANNELS {
        let t = Arc::clone(&target);
        let cb: PropertyCallback = Arc::new(move |res: &dyn EngineResource, change: &PropertyChange| {
            on_state_changed(&t, res, change)
        });
        callbacks.push(resource.add_callback(channel, cb));
    }
    let t = Arc::clone(&target);
    let cb: PropertyCallback = Arc::new(move |res: &dyn EngineResource, change: &PropertyChange| {
        on_interface_changed(&t, res, change)
    });
    callbacks.push(resource.add_callback(Property::IntfChange, cb));

    debug!("Bridge attached to {} ({} callbacks)", resource.id(), callbacks.len());
    BridgeSubscription {
        resource: Arc::clone(resource),
        target,
        callbacks,
    }
}

/// Event and descriptor state for a raw state code; `None` emits nothing.
pub(crate) fn classify_state(code: i64) -> Option<(SessionEvent, MediaState)> {
    match EngineState::from_code(code)? {
        EngineState::Ended => Some((SessionEvent::ReachedEnd, MediaState::NothingSpecial)),
        EngineState::Paused => Some((SessionEvent::Paused, MediaState::Playing)),
        EngineState::Playing => Some((SessionEvent::Played, MediaState::Playing)),
        // Error is reported to subscribers as end of stream.
        EngineState::Error => Some((SessionEvent::ReachedEnd, MediaState::Error)),
        _ => None,
    }
}

fn on_state_changed(target: &Target, resource: &dyn EngineResource, change: &PropertyChange) {
    if !target.active.load(Ordering::Acquire) {
        return;
    }
    trace!("{}: '{}' changed to {:?}", resource.id(), change.property.name(), change.new);

    // Seekable/pausable flips carry no state transition.
    if change.property != Property::State {
        return;
    }
    let Some((event, media_state)) = change.new.as_int().and_then(classify_state) else {
        return;
    };
    let Some(session) = target.session.upgrade() else {
        return;
    };

    if let Some(media) = target.media.upgrade() {
        media.set_state(media_state);
    }
    session.events.emit(event);
}

fn on_interface_changed(target: &Target, resource: &dyn EngineResource, change: &PropertyChange) {
    if !target.active.load(Ordering::Acquire) {
        return;
    }
    // Values seen while buffering or seeking are not meaningful yet.
    if !resource.is_playing() {
        trace!("{}: suppressing '{}' while not playing", resource.id(), change.property.name());
        return;
    }

    let event = match (change.property, change.new) {
        (Property::Position, PropertyValue::Float(p)) => SessionEvent::PositionChanged(p as f32),
        (Property::Time, PropertyValue::Int(raw)) => SessionEvent::TimeChanged(raw_to_ms(raw)),
        _ => return,
    };
    if let Some(session) = target.session.upgrade() {
        session.events.emit(event);
    }
}
