//! PLAYA-SESSION - Playback session handles over a pluggable media engine
//!
//! Re-exports all modules for use by the demo binary.

// Core (events, bridge, session, control)
pub mod core;

// Engine contracts and the simulated engine
pub mod engine;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod error;
pub mod paths;

// Re-export commonly used types from core
pub use core::event_bus::{EventBus, SubscriptionId};
pub use core::session::{Drawable, Session};
pub use core::session_events::{EventKind, SessionEvent};
pub use core::state::{MediaState, PlayerState};

// Re-export entities
pub use entities::{Instance, InstanceConfig, Media};
pub use error::{EngineError, Result, SessionError};
