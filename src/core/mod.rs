//! Core session modules - events, bridge, session object, control
//!
//! These modules form the playback handle layer, independent of any engine.

pub mod bridge;
pub mod control;
pub mod event_bus;
pub mod session;
pub mod session_events;
pub mod state;

// Re-exports for convenience
pub use event_bus::{EventBus, SubscriptionId};
pub use session::{Drawable, Session};
pub use session_events::{EventKind, SessionEvent};
pub use state::{EngineState, MediaState, PlayerState};
