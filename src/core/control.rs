//! Playback control and property forwarders.
//!
//! Two states: no resource attached, or one resource attached.
//!
//! - `play` attaches (creating an owned resource) or resumes
//! - `pause` toggles; streams that cannot pause are stopped instead
//! - `stop` detaches an owned resource, or only halts a shared one
//! - setters write straight through to the resource
//!
//! Queries that describe playback state (`state`, `is_seekable`,
//! `can_pause`, `will_play`, `fps`) always answer, falling back to "not
//! started" defaults. Value getters report `NoInput` when nothing is attached.

use crate::core::bridge;
use crate::core::session::{Attachment, Drawable, Session};
use crate::core::state::{EngineState, PlayerState, translate};
use crate::engine::{EngineResource, Property, PropertyValue, ms_to_raw, raw_to_ms};
use crate::entities::Media;
use crate::error::{Result, SessionError};
use log::{debug, warn};
use std::sync::Arc;

impl Session {
    // ========== Transport ==========

    /// Start playback, or resume the attached resource.
    pub fn play(&self) -> Result<()> {
        let mut inner = self.lock_live()?;

        if let Some(attachment) = inner.attachment.clone() {
            drop(inner);
            if attachment.command(|res| res.set_state(EngineState::Playing)).is_none() {
                debug!("Session {}: resume raced with detach", self.id());
            }
            return Ok(());
        }

        let media = inner.media.clone().ok_or(SessionError::NoMedia)?;
        let resource = inner.instance.engine().create(media.content()).map_err(|e| {
            warn!("Session {}: cannot play '{}': {}", self.id(), media.mrl(), e);
            SessionError::ResourceCreation(e)
        })?;

        if let Some(drawable) = inner.drawable {
            resource.set(Property::Drawable, PropertyValue::Int(drawable));
        }
        let rate = inner.instance.config().default_rate;
        if rate > 0.0 && (rate - 1.0).abs() > f32::EPSILON {
            resource.set(Property::Rate, PropertyValue::Float(rate as f64));
        }

        let subscription = bridge::register(&resource, Arc::downgrade(&self.shared), &media);
        resource.retain();
        inner.owns_resource = true;
        debug!("Session {} attached {} for '{}'", self.id(), resource.id(), media.mrl());

        let attachment = Arc::new(Attachment::new(resource, Some(subscription)));
        inner.attachment = Some(Arc::clone(&attachment));
        drop(inner);

        attachment.command(|res| res.set_state(EngineState::Playing));
        Ok(())
    }

    /// Toggle pause.
    ///
    /// A playing stream that cannot pause is stopped.
    pub fn pause(&self) -> Result<()> {
        let attachment = self.attachment()?.ok_or(SessionError::NoInput)?;

        let must_stop = attachment
            .command(|res| {
                if !res.is_playing() {
                    res.set_state(EngineState::Playing);
                    return false;
                }
                if pausable(res) {
                    res.set_state(EngineState::Paused);
                    false
                } else {
                    true
                }
            })
            .ok_or(SessionError::NoInput)?;

        if must_stop {
            debug!("Session {}: stream cannot pause, stopping", self.id());
            self.stop()?;
        }
        Ok(())
    }

    /// Stop playback.
    ///
    /// Owned resources are detached and destroyed, so the next `play`
    /// starts from scratch. A shared resource is only halted.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.lock_live()?;
        if inner.owns_resource {
            inner.detach();
            return Ok(());
        }

        let attachment = inner.attachment.clone().ok_or(SessionError::NoInput)?;
        drop(inner);
        attachment.command(|res| res.stop()).ok_or(SessionError::NoInput)
    }

    /// Replace the content descriptor.
    ///
    /// Detaches the current resource first. The session moves to the
    /// instance that owns the new descriptor.
    pub fn set_media(&self, media: Option<&Media>) -> Result<()> {
        let mut inner = self.lock_live()?;
        inner.detach();
        let old = std::mem::replace(&mut inner.media, media.cloned());
        if let Some(media) = media
            && !inner.instance.ptr_eq(media.instance())
        {
            debug!("Session {} moved to instance {}", self.id(), media.instance().id());
            inner.instance = media.instance().clone();
        }
        drop(inner);
        drop(old);
        Ok(())
    }

    // ========== Render target ==========

    /// Set the render target. Applied now if attached, and to every
    /// resource created later.
    pub fn set_drawable(&self, drawable: Drawable) -> Result<()> {
        let mut inner = self.lock_live()?;
        inner.drawable = Some(drawable);
        let attachment = inner.attachment.clone();
        drop(inner);

        if let Some(attachment) = attachment {
            attachment.command(|res| res.set(Property::Drawable, PropertyValue::Int(drawable)));
        }
        Ok(())
    }

    pub fn drawable(&self) -> Option<Drawable> {
        self.lock().drawable
    }

    // ========== Getters ==========

    /// Content length in milliseconds.
    pub fn length(&self) -> Result<i64> {
        self.read(Property::Length)?
            .as_int()
            .map(raw_to_ms)
            .ok_or(SessionError::NoInput)
    }

    /// Playback time in milliseconds.
    pub fn time(&self) -> Result<i64> {
        self.read(Property::Time)?
            .as_int()
            .map(raw_to_ms)
            .ok_or(SessionError::NoInput)
    }

    pub fn position(&self) -> Result<f32> {
        self.read(Property::Position)?
            .as_float()
            .map(|p| p as f32)
            .ok_or(SessionError::NoInput)
    }

    /// Current chapter. A value outside the `i32` range reports `NoInput`.
    pub fn chapter(&self) -> Result<i32> {
        self.read(Property::Chapter)?
            .as_int()
            .and_then(|c| i32::try_from(c).ok())
            .ok_or(SessionError::NoInput)
    }

    pub fn chapter_count(&self) -> Result<i32> {
        self.with_resource(|res| res.choices_count(Property::Chapter))?
            .flatten()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or(SessionError::NoInput)
    }

    pub fn rate(&self) -> Result<f32> {
        self.read(Property::Rate)?
            .as_float()
            .map(|r| r as f32)
            .ok_or(SessionError::NoInput)
    }

    /// Video frame rate; 0.0 when unknown.
    pub fn fps(&self) -> f64 {
        self.with_resource(|res| res.video_fps())
            .ok()
            .flatten()
            .flatten()
            .unwrap_or(0.0)
    }

    /// Whether an attached resource is still processing.
    pub fn will_play(&self) -> bool {
        self.with_resource(|res| res.is_alive())
            .ok()
            .flatten()
            .unwrap_or(false)
    }

    pub fn state(&self) -> PlayerState {
        translate(self.with_resource(|res| res.state_code()).ok().flatten().flatten())
    }

    pub fn is_seekable(&self) -> bool {
        self.flag(Property::Seekable)
    }

    pub fn can_pause(&self) -> bool {
        self.flag(Property::Pausable)
    }

    // ========== Setters ==========

    /// Seek to `ms` milliseconds. Does nothing when nothing is attached.
    pub fn set_time(&self, ms: i64) -> Result<()> {
        self.write(Property::Time, PropertyValue::Int(ms_to_raw(ms)))?;
        Ok(())
    }

    /// Seek to `position` (0.0..=1.0). Does nothing when nothing is attached.
    pub fn set_position(&self, position: f32) -> Result<()> {
        self.write(Property::Position, PropertyValue::Float(position as f64))?;
        Ok(())
    }

    pub fn set_chapter(&self, chapter: i32) -> Result<()> {
        if !self.write(Property::Chapter, PropertyValue::Int(chapter as i64))? {
            return Err(SessionError::NoInput);
        }
        Ok(())
    }

    /// Set the playback rate, 1.0 being normal speed.
    pub fn set_rate(&self, rate: f32) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(SessionError::InvalidRate(rate));
        }
        if !self.write(Property::Rate, PropertyValue::Float(rate as f64))? {
            return Err(SessionError::NoInput);
        }
        Ok(())
    }

    // ========== Helpers ==========

    fn read(&self, property: Property) -> Result<PropertyValue> {
        self.with_resource(|res| res.get(property))?
            .flatten()
            .ok_or(SessionError::NoInput)
    }

    /// Returns whether a resource received the write.
    fn write(&self, property: Property, value: PropertyValue) -> Result<bool> {
        Ok(self.with_resource(|res| res.set(property, value))?.is_some())
    }

    fn flag(&self, property: Property) -> bool {
        self.with_resource(|res| res.get(property))
            .ok()
            .flatten()
            .flatten()
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }
}

fn pausable(res: &dyn EngineResource) -> bool {
    res.get(Property::Pausable)
        .and_then(PropertyValue::as_bool)
        .unwrap_or(false)
}
