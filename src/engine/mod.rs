//! Engine collaborator contracts.
//!
//! The decode/render pipeline lives outside this crate. A session only ever
//! sees it through these traits: a factory ([`Engine`]) that turns content
//! into a running resource, and the resource itself ([`EngineResource`])
//! with its property store, commands and change callbacks.
//!
//! # Units
//!
//! - time/length: engine units (microseconds); sessions expose milliseconds,
//!   rounded to nearest via [`raw_to_ms`]
//! - position: 0.0..=1.0
//! - rate: direct multiplier, 1.0 = normal speed

pub mod sim;

use crate::core::state::EngineState;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Engine time units per millisecond.
pub const RAW_UNITS_PER_MS: i64 = 1000;

/// Convert an engine time value to milliseconds, rounding to nearest.
pub fn raw_to_ms(raw: i64) -> i64 {
    raw.saturating_add(RAW_UNITS_PER_MS / 2) / RAW_UNITS_PER_MS
}

pub fn ms_to_raw(ms: i64) -> i64 {
    ms.saturating_mul(RAW_UNITS_PER_MS)
}

/// Shared handle to a running engine resource.
pub type ResourceHandle = Arc<dyn EngineResource>;

/// Opaque engine-assigned resource id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// What to play, as understood by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Media resource locator.
    pub mrl: String,
    pub title: Option<String>,
}

impl Content {
    pub fn new(mrl: impl Into<String>) -> Self {
        Self {
            mrl: mrl.into(),
            title: None,
        }
    }
}

/// Observable resource properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    /// Raw [`EngineState`] code.
    State,
    Seekable,
    Pausable,
    /// Combined channel: changes of [`Property::Position`] or [`Property::Time`].
    IntfChange,
    Position,
    Time,
    Length,
    Chapter,
    Rate,
    /// Render target.
    Drawable,
}

impl Property {
    pub fn name(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Seekable => "seekable",
            Self::Pausable => "can-pause",
            Self::IntfChange => "intf-change",
            Self::Position => "position",
            Self::Time => "time",
            Self::Length => "length",
            Self::Chapter => "chapter",
            Self::Rate => "rate",
            Self::Drawable => "drawable",
        }
    }

    /// Channel a callback must subscribe to in order to see changes of `self`.
    pub fn channel(self) -> Property {
        match self {
            Self::Position | Self::Time => Self::IntfChange,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl PropertyValue {
    pub fn as_int(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(v),
            Self::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }
}

/// A property change as delivered to callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyChange {
    pub property: Property,
    pub old: Option<PropertyValue>,
    pub new: PropertyValue,
}

/// Callback id returned by [`EngineResource::add_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u64);

/// Change callback. Receives the resource that fired and the change.
pub type PropertyCallback = Arc<dyn Fn(&dyn EngineResource, &PropertyChange) + Send + Sync>;

/// Factory side of the engine.
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    /// Create an idle resource for `content`. Playback starts on
    /// `set_state(EngineState::Playing)`.
    fn create(&self, content: &Content) -> Result<ResourceHandle, EngineError>;

    /// Look up a live (not destroyed) resource by id.
    fn acquire(&self, id: ResourceId) -> Option<ResourceHandle>;

    /// Refuse further `create` calls with [`EngineError::ShutDown`].
    /// Existing resources are unaffected.
    fn shutdown(&self);
}

/// A running pipeline for one piece of content.
///
/// Callbacks may be delivered on any engine thread, but never synchronously
/// on the thread issuing a command (`set_state`, `set`, `stop`, ...). A
/// callback may call back into the session that issued the command, and the
/// session holds its attachment gate while a command runs. Commands never
/// block on callback delivery.
pub trait EngineResource: Send + Sync {
    fn id(&self) -> ResourceId;

    /// Content this resource was created from.
    fn content(&self) -> Content;

    fn set_state(&self, state: EngineState);

    fn get(&self, property: Property) -> Option<PropertyValue>;

    fn set(&self, property: Property, value: PropertyValue);

    /// Number of choices for an enumerable property (chapters).
    fn choices_count(&self, property: Property) -> Option<i64>;

    fn video_fps(&self) -> Option<f64>;

    fn add_callback(&self, property: Property, callback: PropertyCallback) -> CallbackId;

    /// Returns `false` if `id` was not registered.
    fn remove_callback(&self, id: CallbackId) -> bool;

    fn retain(&self);

    fn release(&self);

    /// Halt processing. The resource stays valid.
    fn stop(&self);

    /// Free the resource. Nothing may be issued against it afterwards.
    fn destroy(&self);

    /// Still processing (neither stopped nor destroyed).
    fn is_alive(&self) -> bool;

    fn state_code(&self) -> Option<i64> {
        self.get(Property::State).and_then(PropertyValue::as_int)
    }

    fn is_playing(&self) -> bool {
        self.state_code() == Some(EngineState::Playing.code())
    }
}
