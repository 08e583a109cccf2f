//! Playback session handle with explicit reference counting.
//!
//! A session is shared between the embedding application, its worker
//! threads and the engine's notification threads. Teardown happens exactly
//! once; late callers get an error or a default, never freed state.
//!
//! # Lifetimes
//!
//! - `Session` is a cheap, cloneable handle; clones do not touch the count
//! - `retain()` / `release()` drive the public reference count; the zero
//!   crossing happens under the session lock and runs teardown once
//! - after teardown every mutating call returns `SessionError::Released`,
//!   queries return their "not started" defaults
//!
//! # Locking
//!
//! One mutex guards all session fields. It is held across attach (play) and
//! detach (stop, descriptor change, teardown) but never while ordinary
//! commands run. Commands go through the attachment gate instead: they hold
//! its read side, detach takes the write side before the resource is
//! stopped, so nothing reaches a destroyed resource.
//!
//! # Ownership of the engine resource
//!
//! A resource created by `play` is owned: detach stops and destroys it.
//! A resource adopted with [`Session::adopt_shared_resource`] belongs to
//! another owner: detach only gives back the session's references.

use crate::core::bridge::BridgeSubscription;
use crate::core::event_bus::EventBus;
use crate::core::session_events::EventKind;
use crate::engine::{EngineResource, ResourceHandle, ResourceId};
use crate::entities::{Instance, Media};
use crate::error::{Result, SessionError};
use log::{debug, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use uuid::Uuid;

/// Render target identifier (window handle, surface id, ...).
pub type Drawable = i64;

/// An attached engine resource plus the gate that orders commands before detach.
pub(crate) struct Attachment {
    resource: ResourceHandle,
    bridge: Mutex<Option<BridgeSubscription>>,
    live: RwLock<bool>,
}

impl Attachment {
    pub(crate) fn new(resource: ResourceHandle, bridge: Option<BridgeSubscription>) -> Self {
        Self {
            resource,
            bridge: Mutex::new(bridge),
            live: RwLock::new(true),
        }
    }

    pub(crate) fn id(&self) -> ResourceId {
        self.resource.id()
    }

    /// Run `f` against the resource unless it has been detached.
    ///
    /// `f` runs under the read side of the gate. A notification delivered
    /// synchronously from `f` that calls `stop` or `release` would deadlock
    /// on `retire`, so engines must deliver off the calling thread.
    pub(crate) fn command<R>(&self, f: impl FnOnce(&dyn EngineResource) -> R) -> Option<R> {
        let live = self.live.read().unwrap_or_else(PoisonError::into_inner);
        if !*live {
            return None;
        }
        Some(f(&*self.resource))
    }

    /// Close the gate. Waits for in-flight commands. Returns `false` if
    /// someone else retired it first.
    fn retire(&self) -> bool {
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *live, false)
    }

    fn unsubscribe(&self) {
        let bridge = self.bridge.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(bridge) = bridge {
            bridge.unsubscribe();
        }
    }
}

/// Mutable session fields, guarded by `SessionShared::inner`.
pub(crate) struct SessionInner {
    pub(crate) instance: Instance,
    pub(crate) media: Option<Media>,
    pub(crate) attachment: Option<Arc<Attachment>>,
    pub(crate) owns_resource: bool,
    pub(crate) drawable: Option<Drawable>,
    pub(crate) released: bool,
}

impl SessionInner {
    /// Detach the current resource, if any, following the ownership policy.
    ///
    /// Owned: stop, drop the bridge, release our reference, destroy.
    /// Adopted: release our reference and the one held for the external owner.
    pub(crate) fn detach(&mut self) {
        let Some(attachment) = self.attachment.take() else {
            return;
        };
        if !attachment.retire() {
            return;
        }
        let resource = &attachment.resource;
        if self.owns_resource {
            debug!("Detaching owned {}", resource.id());
            resource.stop();
            attachment.unsubscribe();
            resource.release();
            resource.destroy();
        } else {
            debug!("Detaching shared {}", resource.id());
            attachment.unsubscribe();
            resource.release();
            release_external_owner_retain(resource);
        }
    }
}

pub(crate) struct SessionShared {
    id: Uuid,
    refcount: AtomicUsize,
    inner: Mutex<SessionInner>,
    pub(crate) events: EventBus,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionShared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if inner.released {
            return;
        }
        warn!(
            "Session {} dropped with {} outstanding reference(s), tearing down",
            self.id,
            self.refcount.load(Ordering::Acquire)
        );
        inner.released = true;
        inner.detach();
        inner.media = None;
        self.events.close();
    }
}

/// Handle to a playback session.
#[derive(Clone)]
pub struct Session {
    pub(crate) shared: Arc<SessionShared>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("refcount", &self.ref_count())
            .field("resource", &self.resource_id())
            .finish()
    }
}

impl Session {
    /// Create a session with no content and no engine resource.
    pub fn new(instance: &Instance) -> Result<Session> {
        if !instance.is_valid() {
            return Err(SessionError::InvalidInstance);
        }

        let events = if instance.config().queue_events {
            EventBus::with_queue()
        } else {
            EventBus::new()
        };
        for kind in EventKind::ALL {
            events.register_kind(kind);
        }

        let id = Uuid::new_v4();
        debug!("Session {} created on instance {}", id, instance.id());
        Ok(Session {
            shared: Arc::new(SessionShared {
                id,
                refcount: AtomicUsize::new(1),
                inner: Mutex::new(SessionInner {
                    instance: instance.clone(),
                    media: None,
                    attachment: None,
                    owns_resource: true,
                    drawable: None,
                    released: false,
                }),
                events,
            }),
        })
    }

    /// Create a session seeded with `media`, on the instance that owns it.
    pub fn with_media(media: &Media) -> Result<Session> {
        let session = Self::new(media.instance())?;
        session.lock().media = Some(media.clone());
        Ok(session)
    }

    /// Wrap a resource created and owned elsewhere (e.g. a playlist).
    ///
    /// The session takes two references on the resource: its own, and one
    /// held on behalf of the external owner, which does not retain the
    /// resource itself. Both are given back on detach. This pairing exists
    /// only for that owner; nothing else in the crate uses it.
    pub fn adopt_shared_resource(
        instance: &Instance,
        resource: Option<ResourceHandle>,
    ) -> Result<Session> {
        let resource = resource.ok_or(SessionError::InvalidResource)?;
        let session = Self::new(instance)?;

        let media = match Media::from_resource(instance, &*resource) {
            Ok(media) => media,
            Err(e) => {
                // Nothing attached and nobody else has seen this handle yet,
                // so bypassing the refcount cannot race with a release.
                session.destroy();
                return Err(e);
            }
        };

        let mut inner = session.lock();
        inner.media = Some(media);
        inner.owns_resource = false;
        resource.retain();
        resource.retain();
        debug!("Session {} adopted shared {}", session.shared.id, resource.id());
        inner.attachment = Some(Arc::new(Attachment::new(resource, None)));
        drop(inner);

        Ok(session)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.shared.lock()
    }

    /// Lock, failing if the session has been torn down.
    pub(crate) fn lock_live(&self) -> Result<MutexGuard<'_, SessionInner>> {
        let inner = self.lock();
        if inner.released {
            return Err(SessionError::Released);
        }
        Ok(inner)
    }

    /// Current attachment, if any.
    pub(crate) fn attachment(&self) -> Result<Option<Arc<Attachment>>> {
        Ok(self.lock_live()?.attachment.clone())
    }

    /// Run `f` against the attached resource. `Ok(None)` when nothing is attached.
    pub(crate) fn with_resource<R>(&self, f: impl FnOnce(&dyn EngineResource) -> R) -> Result<Option<R>> {
        Ok(self.attachment()?.and_then(|a| a.command(f)))
    }

    // ========== Reference counting ==========

    /// Take one more reference.
    pub fn retain(&self) {
        let retained = self
            .shared
            .refcount
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n > 0).then_some(n + 1))
            .is_ok();
        if !retained {
            warn!("retain() on released session {}", self.shared.id);
        }
    }

    /// Drop one reference; the last one tears the session down.
    ///
    /// Releasing a session that is already torn down does nothing.
    pub fn release(&self) {
        let mut inner = self.lock();
        if inner.released {
            return;
        }
        if self.shared.refcount.fetch_sub(1, Ordering::AcqRel) > 1 {
            return;
        }

        inner.released = true;
        inner.detach();
        let media = inner.media.take();
        drop(inner);

        self.shared.events.close();
        drop(media);
        debug!("Session {} released", self.shared.id);
    }

    /// Administrative teardown that ignores the reference count.
    ///
    /// Stops and destroys any attached resource whether or not this session
    /// owns it. Only for internal cleanup of sessions nobody else can hold.
    pub(crate) fn destroy(&self) {
        let mut inner = self.lock();
        if inner.released {
            return;
        }
        inner.released = true;
        self.shared.refcount.store(0, Ordering::Release);

        if let Some(attachment) = inner.attachment.take()
            && attachment.retire()
        {
            attachment.resource.stop();
            attachment.unsubscribe();
            attachment.resource.destroy();
        }
        let media = inner.media.take();
        drop(inner);

        self.shared.events.close();
        drop(media);
        debug!("Session {} destroyed", self.shared.id);
    }

    // ========== Introspection ==========

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn ref_count(&self) -> usize {
        self.shared.refcount.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    /// Whether detach will destroy the attached resource.
    pub fn owns_resource(&self) -> bool {
        self.lock().owns_resource
    }

    pub fn resource_id(&self) -> Option<ResourceId> {
        self.lock().attachment.as_ref().map(|a| a.id())
    }

    /// The session's event bus.
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Instance the session currently belongs to.
    pub fn instance(&self) -> Instance {
        self.lock().instance.clone()
    }

    /// Current content descriptor (a retained handle).
    pub fn media(&self) -> Option<Media> {
        self.lock().media.clone()
    }
}

/// Give back the reference taken for the external owner at adoption.
fn release_external_owner_retain(resource: &ResourceHandle) {
    resource.release();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Content;
    use crate::engine::sim::{SimConfig, SimEngine};
    use std::thread;

    fn setup() -> (Arc<SimEngine>, Instance) {
        let engine = Arc::new(SimEngine::new(SimConfig::manual()));
        let instance = Instance::with_engine(engine.clone());
        (engine, instance)
    }

    #[test]
    fn test_new_session_defaults() {
        let (_, instance) = setup();
        let session = Session::new(&instance).unwrap();
        assert_eq!(session.ref_count(), 1);
        assert!(session.owns_resource());
        assert!(session.media().is_none());
        assert!(session.resource_id().is_none());
        assert!(!session.is_released());
        for kind in EventKind::ALL {
            assert!(session.events().is_registered(kind));
        }
    }

    #[test]
    fn test_new_fails_on_shut_down_instance() {
        let (_, instance) = setup();
        instance.shutdown();
        let err = Session::new(&instance).unwrap_err();
        assert!(matches!(err, SessionError::InvalidInstance));
    }

    #[test]
    fn test_with_media_retains_descriptor() {
        let (_, instance) = setup();
        let media = Media::new(&instance, "sim://a");
        let session = Session::with_media(&media).unwrap();
        assert_eq!(media.ref_count(), 2);
        assert!(session.media().unwrap().ptr_eq(&media));

        session.release();
        assert_eq!(media.ref_count(), 1);
    }

    #[test]
    fn test_retain_release_balance() {
        let (engine, instance) = setup();
        let media = Media::new(&instance, "sim://a");
        let session = Session::with_media(&media).unwrap();
        session.play().unwrap();

        for n in 1..=5 {
            for _ in 0..n {
                session.retain();
            }
            assert_eq!(session.ref_count(), 1 + n);
            for _ in 0..n {
                session.release();
            }
            assert_eq!(session.ref_count(), 1);
            assert!(!session.is_released());
            assert_eq!(engine.stats().destroyed(), 0);
        }

        session.release();
        assert!(session.is_released());
        assert_eq!(engine.stats().destroyed(), 1);

        // Further releases are no-ops.
        session.release();
        session.release();
        assert_eq!(engine.stats().destroyed(), 1);
        assert_eq!(engine.stats().double_destroys(), 0);
        assert_eq!(session.ref_count(), 0);
    }

    #[test]
    fn test_retain_after_release_is_ignored() {
        let (_, instance) = setup();
        let session = Session::new(&instance).unwrap();
        session.release();
        session.retain();
        assert_eq!(session.ref_count(), 0);
        assert!(session.is_released());
    }

    #[test]
    fn test_release_closes_bus() {
        let (_, instance) = setup();
        let session = Session::new(&instance).unwrap();
        let bus = session.events().clone();
        session.release();
        assert!(bus.is_closed());
    }

    #[test]
    fn test_adopt_requires_resource() {
        let (_, instance) = setup();
        let err = Session::adopt_shared_resource(&instance, None).unwrap_err();
        assert!(matches!(err, SessionError::InvalidResource));
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_adopt_and_release_balances_engine_refcount() {
        let (engine, instance) = setup();
        let playlist_res = engine.spawn_resource(&Content::new("sim://playlist/1")).unwrap();
        let handle: ResourceHandle = playlist_res.clone();

        let session = Session::adopt_shared_resource(&instance, Some(handle)).unwrap();
        assert!(!session.owns_resource());
        assert_eq!(session.resource_id(), Some(playlist_res.id()));
        assert_eq!(session.media().unwrap().mrl(), "sim://playlist/1");
        assert_eq!(playlist_res.refcount(), 3);

        session.release();
        assert_eq!(playlist_res.refcount(), 1);
        assert!(!playlist_res.is_destroyed());
        assert_eq!(engine.stats().stops(), 0);
        assert_eq!(engine.stats().over_releases(), 0);
    }

    #[test]
    fn test_adopt_with_unusable_metadata_fails() {
        let (_, instance) = setup();
        let other = SimEngine::new(SimConfig::manual());
        // Resource that reports no content location.
        struct Anonymous(ResourceHandle);
        impl EngineResource for Anonymous {
            fn id(&self) -> ResourceId {
                self.0.id()
            }
            fn content(&self) -> Content {
                Content::new("")
            }
            fn set_state(&self, state: crate::core::state::EngineState) {
                self.0.set_state(state)
            }
            fn get(&self, p: crate::engine::Property) -> Option<crate::engine::PropertyValue> {
                self.0.get(p)
            }
            fn set(&self, p: crate::engine::Property, v: crate::engine::PropertyValue) {
                self.0.set(p, v)
            }
            fn choices_count(&self, p: crate::engine::Property) -> Option<i64> {
                self.0.choices_count(p)
            }
            fn video_fps(&self) -> Option<f64> {
                self.0.video_fps()
            }
            fn add_callback(
                &self,
                p: crate::engine::Property,
                cb: crate::engine::PropertyCallback,
            ) -> crate::engine::CallbackId {
                self.0.add_callback(p, cb)
            }
            fn remove_callback(&self, id: crate::engine::CallbackId) -> bool {
                self.0.remove_callback(id)
            }
            fn retain(&self) {
                self.0.retain()
            }
            fn release(&self) {
                self.0.release()
            }
            fn stop(&self) {
                self.0.stop()
            }
            fn destroy(&self) {
                self.0.destroy()
            }
            fn is_alive(&self) -> bool {
                self.0.is_alive()
            }
        }

        let inner = other.spawn_resource(&Content::new("sim://x")).unwrap();
        let handle: ResourceHandle = Arc::new(Anonymous(inner.clone()));
        let err = Session::adopt_shared_resource(&instance, Some(handle)).unwrap_err();
        assert!(matches!(err, SessionError::Media(_)));
        // Failed adoption takes no references.
        assert_eq!(inner.refcount(), 1);
        assert!(!inner.is_destroyed());
    }

    #[test]
    fn test_destroy_bypasses_refcount() {
        let (engine, instance) = setup();
        let media = Media::new(&instance, "sim://a");
        let session = Session::with_media(&media).unwrap();
        session.retain();
        session.retain();
        session.play().unwrap();
        engine.last_resource().unwrap().flush();

        session.destroy();
        assert!(session.is_released());
        assert_eq!(session.ref_count(), 0);
        assert_eq!(engine.stats().destroyed(), 1);
        assert_eq!(media.ref_count(), 1);

        session.destroy();
        session.release();
        assert_eq!(engine.stats().destroyed(), 1);
    }

    #[test]
    fn test_destroy_tears_down_adopted_resource() {
        let (engine, instance) = setup();
        let res = engine.spawn_resource(&Content::new("sim://playlist/2")).unwrap();
        let session = Session::adopt_shared_resource(&instance, Some(res.clone())).unwrap();
        session.destroy();
        assert!(res.is_destroyed());
        assert_eq!(engine.stats().stops(), 1);
    }

    #[test]
    fn test_drop_without_release_tears_down() {
        let (engine, instance) = setup();
        let media = Media::new(&instance, "sim://a");
        let session = Session::with_media(&media).unwrap();
        session.play().unwrap();
        let res = engine.last_resource().unwrap();
        res.flush();
        assert_eq!(res.callback_count(), 4);

        drop(session);
        assert!(res.is_destroyed());
        assert_eq!(media.ref_count(), 1);
    }

    #[test]
    fn test_clones_share_one_count() {
        let (_, instance) = setup();
        let session = Session::new(&instance).unwrap();
        let clone = session.clone();
        clone.retain();
        assert_eq!(session.ref_count(), 2);
        session.release();
        clone.release();
        assert!(session.is_released());
    }

    #[test]
    fn test_concurrent_retain_release() {
        let (engine, instance) = setup();
        let media = Media::new(&instance, "sim://a");
        let session = Session::with_media(&media).unwrap();
        session.play().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = session.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        s.retain();
                        s.release();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(session.ref_count(), 1);
        assert_eq!(engine.stats().destroyed(), 0);
        session.release();
        assert_eq!(engine.stats().destroyed(), 1);
    }
}
