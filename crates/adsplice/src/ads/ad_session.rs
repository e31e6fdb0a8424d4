use std::sync::Arc;

use super::types::{CallbackHook, CallbackRegistry};
use crate::engine::EngineProvider;
use crate::error::EngineError;
use crate::media::types::Video;
use crate::session::{FullscreenCallback, PlaybackSession, SessionKind};
use crate::settings::PlayerSettings;
use crate::surface::{RegionId, RegionKind, SurfaceStack};

/// Presentation state the ad session inherits from content.
#[derive(Clone, Default)]
pub struct AdPresentation {
    pub fullscreen: bool,
    pub fullscreen_callback: Option<Arc<dyn FullscreenCallback>>,
}

/// Owns zero or one ad [`PlaybackSession`] and its surface region.
pub struct AdSessionController {
    session: Option<PlaybackSession>,
    region: Option<RegionId>,
    ui_region: RegionId,
    callbacks: CallbackRegistry,
}

impl AdSessionController {
    pub fn new(ui_region: RegionId, callbacks: CallbackRegistry) -> Self {
        Self {
            session: None,
            region: None,
            ui_region,
            callbacks,
        }
    }

    /// Tear down any current ad, then build and start a new one in a fresh
    /// region stacked above content and below the ad UI. The ad UI is shown
    /// only once the session exists.
    pub fn start_ad(
        &mut self,
        video: Video,
        stack: &mut SurfaceStack,
        provider: &dyn EngineProvider,
        settings: &PlayerSettings,
        presentation: AdPresentation,
    ) -> Result<(), EngineError> {
        self.destroy_ad(stack);

        let region = stack.add_region(RegionKind::AdSurface, "ad");
        stack.raise_to_top(self.ui_region);

        let mut session =
            match PlaybackSession::new(SessionKind::Ad, video, region, provider, settings) {
                Ok(session) => session,
                Err(e) => {
                    stack.remove_region(region);
                    return Err(e);
                }
            };

        session.play();
        let controls = session.controls_mut();
        controls.set_can_seek(false);
        controls.set_seekbar_color(settings.ad_seekbar_color);
        controls.hide_top_chrome();
        controls.sync_fullscreen(presentation.fullscreen);
        controls.set_fullscreen_callback(presentation.fullscreen_callback);

        log::info!("Ad session started for {}", session.video().url);
        stack.set_visible(self.ui_region, true);
        self.region = Some(region);
        self.session = Some(session);
        self.callbacks.notify(&CallbackHook::Play);
        Ok(())
    }

    pub fn pause_ad(&mut self) {
        match self.session.as_mut() {
            Some(session) => session.pause(),
            None => log::debug!("pause_ad with no ad session"),
        }
    }

    pub fn resume_ad(&mut self) {
        match self.session.as_mut() {
            Some(session) => session.play(),
            None => log::debug!("resume_ad with no ad session"),
        }
    }

    /// Detach and release the ad session. Returns its fullscreen flag, or
    /// `None` if there was no session.
    ///
    /// The surface is detached (blocking) and its region removed before the
    /// session is released and dropped. The ad UI is hidden so it never sits
    /// over content.
    pub fn destroy_ad(&mut self, stack: &mut SurfaceStack) -> Option<bool> {
        if let Some(session) = self.session.as_mut() {
            session.detach_surface_blocking();
        }
        if let Some(region) = self.region.take() {
            stack.remove_region(region);
        }
        stack.set_visible(self.ui_region, false);
        let mut session = self.session.take()?;
        let fullscreen = session.controls().is_fullscreen();
        session.release();
        log::info!("Ad session destroyed");
        Some(fullscreen)
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut PlaybackSession> {
        self.session.as_mut()
    }

    pub fn region(&self) -> Option<RegionId> {
        self.region
    }

    pub fn ui_region(&self) -> RegionId {
        self.ui_region
    }
}
