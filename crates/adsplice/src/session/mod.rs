//! One engine bound to one locator and one display region.

pub mod controls;

use std::time::Duration;

use crate::engine::{EngineConfig, EngineProvider, EngineWrapper, PlaybackEvent};
use crate::error::{EngineError, InvalidStateError};
use crate::media::types::{ProgressSnapshot, TransportState, Video};
use crate::settings::PlayerSettings;
use crate::surface::{RegionId, SurfaceStack};

pub use controls::{ActionButton, ControlObserver, FullscreenCallback, PlaybackControls};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Content,
    Ad,
}

impl SessionKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionKind::Content => "content",
            SessionKind::Ad => "ad",
        }
    }
}

pub struct PlaybackSession {
    kind: SessionKind,
    wrapper: EngineWrapper,
    region: RegionId,
    controls: PlaybackControls,
    /// Last transport intent from play()/pause().
    wants_play: bool,
}

impl PlaybackSession {
    /// Create the engine, bind it to `region` and start preparing.
    pub fn new(
        kind: SessionKind,
        video: Video,
        region: RegionId,
        provider: &dyn EngineProvider,
        settings: &PlayerSettings,
    ) -> Result<Self, EngineError> {
        let mut wrapper = EngineWrapper::new(
            video,
            provider,
            EngineConfig::from_settings(settings),
            &settings.user_agent,
        )?;
        wrapper.set_surface(Some(region));
        wrapper.prepare()?;
        log::info!(
            "Created {} session for {} on {region}",
            kind.display_name(),
            wrapper.video().url
        );
        Ok(Self {
            kind,
            wrapper,
            region,
            controls: PlaybackControls::new(Duration::from_millis(settings.controls_timeout_ms)),
            wants_play: false,
        })
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn video(&self) -> &Video {
        self.wrapper.video()
    }

    pub fn controls(&self) -> &PlaybackControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut PlaybackControls {
        &mut self.controls
    }

    pub fn wrapper(&self) -> &EngineWrapper {
        &self.wrapper
    }

    pub fn wrapper_mut(&mut self) -> &mut EngineWrapper {
        &mut self.wrapper
    }

    pub fn playback_state(&self) -> TransportState {
        self.wrapper.playback_state()
    }

    /// Request playback. Applied once the session is controllable.
    pub fn play(&mut self) {
        self.wants_play = true;
        self.controls.notify_play();
        self.apply_intent();
    }

    pub fn pause(&mut self) {
        self.wants_play = false;
        self.controls.notify_pause();
        self.apply_intent();
    }

    pub fn toggle_pause(&mut self) {
        if self.wants_play {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn should_be_playing(&self) -> bool {
        self.wants_play && !self.wrapper.is_released()
    }

    /// Engine is set to play and has media ready or buffering.
    pub fn is_playing(&self) -> bool {
        self.wrapper.play_when_ready()
            && matches!(
                self.playback_state(),
                TransportState::Buffering | TransportState::Ready
            )
    }

    pub fn try_seek(&mut self, position_ms: u64) -> Result<(), InvalidStateError> {
        let state = self.playback_state();
        if !state.is_controllable() {
            return Err(InvalidStateError {
                command: "seek",
                state,
            });
        }
        self.wrapper.seek_to(position_ms);
        Ok(())
    }

    /// Seek if allowed; early requests and disabled seeking are ignored.
    pub fn seek(&mut self, position_ms: u64) {
        if !self.controls.can_seek() {
            log::debug!("Seeking disabled on {} session", self.kind.display_name());
            return;
        }
        if let Err(e) = self.try_seek(position_ms) {
            log::debug!("Ignoring seek on {} session: {e}", self.kind.display_name());
        }
    }

    pub fn position_ms(&self) -> Option<u64> {
        self.playback_state()
            .has_timeline()
            .then(|| self.wrapper.current_position_ms())
    }

    pub fn duration_ms(&self) -> Option<u64> {
        if self.playback_state().has_timeline() {
            self.wrapper.duration_ms()
        } else {
            None
        }
    }

    pub fn progress(&self) -> ProgressSnapshot {
        match self.position_ms() {
            Some(current_ms) => ProgressSnapshot::At {
                current_ms,
                duration_ms: self.duration_ms(),
            },
            None => ProgressSnapshot::NotReady,
        }
    }

    /// Hide chrome and make the region invisible. Does not touch transport.
    pub fn hide(&mut self, stack: &mut SurfaceStack) {
        self.controls.hide();
        stack.set_visible(self.region, false);
    }

    pub fn show(&mut self, stack: &mut SurfaceStack) {
        stack.set_visible(self.region, true);
        self.controls.show();
    }

    pub fn is_visible(&self, stack: &SurfaceStack) -> bool {
        stack.is_visible(self.region)
    }

    pub fn move_surface_to_background(&self, stack: &mut SurfaceStack) {
        stack.lower_to_bottom(self.region);
    }

    pub fn move_surface_to_foreground(&self, stack: &mut SurfaceStack) {
        stack.raise_to_top(self.region);
    }

    /// Detach the region from the engine and wait for the engine to confirm.
    pub fn detach_surface_blocking(&mut self) {
        self.wrapper.blocking_clear_surface();
    }

    /// Free engine resources. Safe to call more than once.
    pub fn release(&mut self) {
        if self.wrapper.is_released() {
            return;
        }
        self.wants_play = false;
        self.wrapper.release();
        log::info!("Released {} session", self.kind.display_name());
    }

    pub fn is_released(&self) -> bool {
        self.wrapper.is_released()
    }

    /// Drain engine events and apply any pending transport intent.
    pub fn poll(&mut self) -> Vec<PlaybackEvent> {
        let events = self.wrapper.poll();
        self.apply_intent();
        events
    }

    fn apply_intent(&mut self) {
        if self.wrapper.is_released() {
            return;
        }
        let state = self.playback_state();
        if !state.is_controllable() {
            log::debug!(
                "Deferring {} on {} session until ready",
                if self.wants_play { "play" } else { "pause" },
                self.kind.display_name()
            );
            return;
        }
        if self.wrapper.play_when_ready() != self.wants_play {
            self.wrapper.set_play_when_ready(self.wants_play);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sim::{BuildMode, EngineCommand, SimulatedProvider};
    use crate::media::types::VideoType;
    use crate::surface::RegionKind;

    fn session(provider: &SimulatedProvider, stack: &mut SurfaceStack) -> PlaybackSession {
        let region = stack.add_region(RegionKind::ContentSurface, "content");
        PlaybackSession::new(
            SessionKind::Content,
            Video::new("content.mp4", VideoType::Mp4),
            region,
            provider,
            &PlayerSettings::default(),
        )
        .expect("session")
    }

    #[test]
    fn play_before_ready_is_deferred_then_applied() {
        let provider = SimulatedProvider::new().with_build_mode(BuildMode::Deferred);
        let mut stack = SurfaceStack::new();
        let mut s = session(&provider, &mut stack);
        s.play();
        let handle = provider.handle_for("content.mp4").expect("engine");
        assert!(!handle.play_when_ready());
        assert!(s.should_be_playing());

        provider.complete_deferred("content.mp4");
        s.poll();
        assert!(handle.play_when_ready());
        assert!(s.is_playing());
    }

    #[test]
    fn position_is_not_ready_before_preparing() {
        let provider = SimulatedProvider::new().with_build_mode(BuildMode::Fail("boom".into()));
        let mut stack = SurfaceStack::new();
        let mut s = session(&provider, &mut stack);
        s.poll();
        assert_eq!(s.playback_state(), TransportState::Idle);
        assert_eq!(s.position_ms(), None);
        assert_eq!(s.duration_ms(), None);
        assert_eq!(s.progress(), ProgressSnapshot::NotReady);
    }

    #[test]
    fn early_seek_is_an_invalid_state() {
        let provider = SimulatedProvider::new().with_build_mode(BuildMode::Deferred);
        let mut stack = SurfaceStack::new();
        let mut s = session(&provider, &mut stack);
        let err = s.try_seek(5000).expect_err("not ready");
        assert_eq!(err.command, "seek");
        assert_eq!(err.state, TransportState::Preparing);
        // The lenient variant swallows it.
        s.seek(5000);
    }

    #[test]
    fn seek_respects_disabled_seeking() {
        let provider = SimulatedProvider::new();
        let mut stack = SurfaceStack::new();
        let mut s = session(&provider, &mut stack);
        s.poll();
        s.controls_mut().set_can_seek(false);
        s.seek(5000);
        let handle = provider.handle_for("content.mp4").expect("engine");
        assert!(!handle.commands().contains(&EngineCommand::SeekTo(5000)));
        s.controls_mut().set_can_seek(true);
        s.seek(5000);
        assert_eq!(s.position_ms(), Some(5000));
    }

    #[test]
    fn release_is_idempotent() {
        let provider = SimulatedProvider::new();
        let mut stack = SurfaceStack::new();
        let mut s = session(&provider, &mut stack);
        s.release();
        s.release();
        let handle = provider.handle_for("content.mp4").expect("engine");
        let releases = handle
            .commands()
            .iter()
            .filter(|c| **c == EngineCommand::Release)
            .count();
        assert_eq!(releases, 1);
        assert!(s.is_released());
        assert!(!s.should_be_playing());
    }

    #[test]
    fn hide_and_show_toggle_region_and_chrome() {
        let provider = SimulatedProvider::new();
        let mut stack = SurfaceStack::new();
        let mut s = session(&provider, &mut stack);
        s.hide(&mut stack);
        assert!(!s.is_visible(&stack));
        assert!(!s.controls().is_visible());
        s.show(&mut stack);
        assert!(s.is_visible(&stack));
        assert!(s.controls().is_visible());
    }

    #[test]
    fn surface_ordering_moves_region() {
        let provider = SimulatedProvider::new();
        let mut stack = SurfaceStack::new();
        let s = session(&provider, &mut stack);
        let other = stack.add_region(RegionKind::AdUi, "ui");
        s.move_surface_to_foreground(&mut stack);
        assert_eq!(stack.z_index(s.region()), Some(1));
        s.move_surface_to_background(&mut stack);
        assert_eq!(stack.z_index(other), Some(1));
    }

    #[test]
    fn toggle_pause_flips_intent() {
        let provider = SimulatedProvider::new();
        let mut stack = SurfaceStack::new();
        let mut s = session(&provider, &mut stack);
        s.poll();
        s.toggle_pause();
        assert!(s.should_be_playing());
        assert!(s.controls().showing_pause());
        s.toggle_pause();
        assert!(!s.should_be_playing());
    }
}
