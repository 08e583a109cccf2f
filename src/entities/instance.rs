//! Top-level instance: the engine factory plus shared settings.
//!
//! Sessions and media hold a clone. An instance that has been shut down is
//! an invalid handle: new sessions cannot be created from it.

use crate::engine::Engine;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Settings applied to every session created from an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Keep a deferred event queue on each session bus (see `EventBus::poll`).
    pub queue_events: bool,
    /// Rate applied to freshly created engine resources.
    pub default_rate: f32,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            queue_events: false,
            default_rate: 1.0,
        }
    }
}

struct InstanceInner {
    id: Uuid,
    engine: Arc<dyn Engine>,
    config: InstanceConfig,
    valid: AtomicBool,
}

#[derive(Clone)]
pub struct Instance {
    inner: Arc<InstanceInner>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.inner.id)
            .field("engine", &self.inner.engine.name())
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl Instance {
    pub fn new(engine: Arc<dyn Engine>, config: InstanceConfig) -> Self {
        let id = Uuid::new_v4();
        info!("Instance {} started with engine '{}'", id, engine.name());
        Self {
            inner: Arc::new(InstanceInner {
                id,
                engine,
                config,
                valid: AtomicBool::new(true),
            }),
        }
    }

    pub fn with_engine(engine: Arc<dyn Engine>) -> Self {
        Self::new(engine, InstanceConfig::default())
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.inner.engine
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.inner.config
    }

    pub fn is_valid(&self) -> bool {
        self.inner.valid.load(Ordering::Acquire)
    }

    /// Invalidate this handle and shut the engine down.
    ///
    /// Existing sessions keep their attached resources; creating new ones
    /// (new sessions, or `play` from a stopped state) fails.
    pub fn shutdown(&self) {
        if self.inner.valid.swap(false, Ordering::AcqRel) {
            self.inner.engine.shutdown();
            info!("Instance {} shut down", self.inner.id);
        }
    }

    /// Same underlying instance.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
