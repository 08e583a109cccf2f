//! Entities module - the objects a session is built from
//!
//! - Instance: engine factory and shared settings
//! - Media: content descriptor, shared by value across sessions

pub mod instance;
pub mod media;

pub use instance::{Instance, InstanceConfig};
pub use media::Media;
