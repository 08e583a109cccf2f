//! Content descriptor shared between sessions.
//!
//! `Media` is a cheap handle: cloning retains the descriptor, dropping the
//! clone releases it. The cached [`MediaState`] is written by the
//! notification bridge of whichever session is playing it.

use crate::core::state::MediaState;
use crate::engine::{Content, EngineResource};
use crate::entities::Instance;
use crate::error::{Result, SessionError};
use log::trace;
use std::sync::{Arc, Mutex, PoisonError, Weak};

struct MediaInner {
    instance: Instance,
    content: Content,
    state: Mutex<MediaState>,
}

#[derive(Clone)]
pub struct Media {
    inner: Arc<MediaInner>,
}

impl std::fmt::Debug for Media {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Media")
            .field("mrl", &self.inner.content.mrl)
            .field("state", &self.state())
            .finish()
    }
}

impl Media {
    pub fn new(instance: &Instance, mrl: impl Into<String>) -> Self {
        Self::from_content(instance, Content::new(mrl))
    }

    pub fn from_content(instance: &Instance, content: Content) -> Self {
        Self {
            inner: Arc::new(MediaInner {
                instance: instance.clone(),
                content,
                state: Mutex::new(MediaState::default()),
            }),
        }
    }

    /// Describe what an existing resource is playing.
    pub fn from_resource(instance: &Instance, resource: &dyn EngineResource) -> Result<Self> {
        let content = resource.content();
        if content.mrl.trim().is_empty() {
            return Err(SessionError::Media(format!(
                "{} carries no content location",
                resource.id()
            )));
        }
        Ok(Self::from_content(instance, content))
    }

    pub fn with_title(instance: &Instance, mrl: impl Into<String>, title: impl Into<String>) -> Self {
        Self::from_content(
            instance,
            Content {
                mrl: mrl.into(),
                title: Some(title.into()),
            },
        )
    }

    pub fn content(&self) -> &Content {
        &self.inner.content
    }

    pub fn mrl(&self) -> &str {
        &self.inner.content.mrl
    }

    pub fn title(&self) -> Option<&str> {
        self.inner.content.title.as_deref()
    }

    /// Instance that created this descriptor.
    pub fn instance(&self) -> &Instance {
        &self.inner.instance
    }

    pub fn state(&self) -> MediaState {
        *self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_state(&self, state: MediaState) {
        trace!("Media '{}' state -> {:?}", self.mrl(), state);
        *self.inner.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Number of live handles (retains) on this descriptor.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &Media) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakMedia {
        WeakMedia(Arc::downgrade(&self.inner))
    }
}

/// Non-owning descriptor reference, held by notification callbacks.
#[derive(Clone)]
pub(crate) struct WeakMedia(Weak<MediaInner>);

impl WeakMedia {
    pub(crate) fn upgrade(&self) -> Option<Media> {
        self.0.upgrade().map(|inner| Media { inner })
    }
}
