//! Session and engine errors.
//!
//! Every failure is returned synchronously from the call that caused it.
//! Nothing here is ever delivered through the event bus.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`SessionError::InvalidInstance`] | `SESSION_INVALID_INSTANCE` | No |
//! | [`SessionError::InvalidResource`] | `SESSION_INVALID_RESOURCE` | No |
//! | [`SessionError::InvalidRate`] | `SESSION_INVALID_RATE` | No |
//! | [`SessionError::NoMedia`] | `SESSION_NO_MEDIA` | Yes |
//! | [`SessionError::NoInput`] | `SESSION_NO_INPUT` | Yes |
//! | [`SessionError::ResourceCreation`] | `SESSION_RESOURCE_CREATION` | Yes |
//! | [`SessionError::Media`] | `SESSION_MEDIA` | No |
//! | [`SessionError::Released`] | `SESSION_RELEASED` | No |

use thiserror::Error;

/// Result alias used by the session API.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised by the engine collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine refused to open '{mrl}': {reason}")]
    Refused { mrl: String, reason: String },

    #[error("unsupported content location: '{0}'")]
    Unsupported(String),

    #[error("engine is shut down")]
    ShutDown,
}

/// Errors raised by [`crate::Session`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The top-level instance was shut down before the call.
    #[error("invalid instance")]
    InvalidInstance,

    /// Adoption was requested without an engine resource.
    #[error("invalid engine resource")]
    InvalidResource,

    /// Playback rate must be strictly positive.
    #[error("invalid rate: {0}")]
    InvalidRate(f32),

    #[error("no associated content")]
    NoMedia,

    #[error("no input")]
    NoInput,

    #[error("failed to create engine resource")]
    ResourceCreation(#[source] EngineError),

    /// A descriptor could not be derived from a resource's metadata.
    #[error("media error: {0}")]
    Media(String),

    /// The session's reference count already reached zero.
    #[error("session released")]
    Released,
}

impl SessionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInstance => "SESSION_INVALID_INSTANCE",
            Self::InvalidResource => "SESSION_INVALID_RESOURCE",
            Self::InvalidRate(_) => "SESSION_INVALID_RATE",
            Self::NoMedia => "SESSION_NO_MEDIA",
            Self::NoInput => "SESSION_NO_INPUT",
            Self::ResourceCreation(_) => "SESSION_RESOURCE_CREATION",
            Self::Media(_) => "SESSION_MEDIA",
            Self::Released => "SESSION_RELEASED",
        }
    }

    /// Whether retrying (after attaching content, playing, etc.) can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoMedia | Self::NoInput | Self::ResourceCreation(_)
        )
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidInstance | Self::InvalidResource | Self::InvalidRate(_)
        )
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        Self::ResourceCreation(err)
    }
}
