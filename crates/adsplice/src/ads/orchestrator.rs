use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use super::ad_session::{AdPresentation, AdSessionController};
use super::content::ContentVisibilityController;
use super::notice::{Notice, NoticeQueue};
use super::progress::ProgressReconciler;
use super::service::{
    AdDisplayContainer, AdEventSink, AdPlayerCommand, AdPlayerHandle, AdServiceMessage,
    AdsLoader, AdsManager, AdsRequest, SharedProgress, VideoAdPlayer,
};
use super::types::{
    AdEventType, CallbackHandle, CallbackHook, CallbackRegistry, VideoAdPlayerCallback,
};
use crate::engine::{EngineProvider, PlaybackEvent};
use crate::error::{AdRequestError, PlayerError, Result};
use crate::media::types::{ProgressSnapshot, TransportState, Video, VideoType};
use crate::session::{ActionButton, FullscreenCallback, PlaybackSession, SessionKind};
use crate::settings::PlayerSettings;
use crate::surface::{RegionId, RegionKind, SurfaceStack};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdState {
    NoAd,
    /// Ads requested, waiting for the service to load and play one.
    AdRequested,
    AdPlaying,
    AdPaused,
}

/// Which session is authoritative for visibility and transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveSession {
    None,
    Content,
    Ad,
}

/// Splices ad sessions over a content session.
///
/// Runs on one thread. The ad-decision service and the engines report through
/// channels that [`pump`](Self::pump) drains, so every transition happens here
/// in order.
pub struct AdOrchestrator {
    settings: PlayerSettings,
    provider: Box<dyn EngineProvider>,
    loader: Box<dyn AdsLoader>,
    ads_manager: Option<Box<dyn AdsManager>>,
    stack: SurfaceStack,
    content: ContentVisibilityController,
    ad: AdSessionController,
    reconciler: ProgressReconciler,
    notices: NoticeQueue,
    state: AdState,
    active: ActiveSession,
    ad_tag_url: Option<String>,
    ads_requested: bool,
    /// Locator from the last `load_ad`, played by `play_ad`.
    pending_ad: Option<Video>,
    /// Set once content has been controllable; errors after that are not fatal.
    content_started: bool,
    registry: CallbackRegistry,
    progress: SharedProgress,
    service_tx: Sender<AdServiceMessage>,
    service_rx: Receiver<AdServiceMessage>,
    next_tick: Option<Instant>,
    fullscreen_callback: Option<Arc<dyn FullscreenCallback>>,
}

impl AdOrchestrator {
    /// Create the content session and start preparing it. Ads are requested
    /// on the first [`play`](Self::play) when `ad_tag_url` is set.
    pub fn new(
        content: Video,
        ad_tag_url: Option<String>,
        provider: Box<dyn EngineProvider>,
        loader: Box<dyn AdsLoader>,
        settings: PlayerSettings,
    ) -> Result<Self> {
        let mut stack = SurfaceStack::new();
        let content_region = stack.add_region(RegionKind::ContentSurface, "content");
        let ui_region = stack.add_region(RegionKind::AdUi, "ad ui");
        stack.set_visible(ui_region, false);

        let session = PlaybackSession::new(
            SessionKind::Content,
            content,
            content_region,
            provider.as_ref(),
            &settings,
        )?;
        session.move_surface_to_background(&mut stack);

        let registry = CallbackRegistry::new();
        let (service_tx, service_rx) = crossbeam_channel::unbounded();

        Ok(Self {
            settings,
            provider,
            loader,
            ads_manager: None,
            stack,
            content: ContentVisibilityController::new(session),
            ad: AdSessionController::new(ui_region, registry.clone()),
            reconciler: ProgressReconciler::new(),
            notices: NoticeQueue::default(),
            state: AdState::NoAd,
            active: ActiveSession::Content,
            ad_tag_url: ad_tag_url.filter(|tag| !tag.is_empty()),
            ads_requested: false,
            pending_ad: None,
            content_started: false,
            registry,
            progress: Arc::new(Mutex::new(ProgressSnapshot::NotReady)),
            service_tx,
            service_rx,
            next_tick: None,
            fullscreen_callback: None,
        })
    }

    pub fn state(&self) -> AdState {
        self.state
    }

    pub fn active_session(&self) -> ActiveSession {
        self.active
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn stack(&self) -> &SurfaceStack {
        &self.stack
    }

    pub fn content_session(&self) -> &PlaybackSession {
        self.content.session()
    }

    pub fn content_session_mut(&mut self) -> &mut PlaybackSession {
        self.content.session_mut()
    }

    pub fn ad_session(&self) -> Option<&PlaybackSession> {
        self.ad.session()
    }

    pub fn ad_ui_region(&self) -> RegionId {
        self.ad.ui_region()
    }

    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Sessions whose region is currently visible.
    pub fn visible_sessions(&self) -> Vec<SessionKind> {
        let mut visible = Vec::new();
        if self.content.session().is_visible(&self.stack) {
            visible.push(SessionKind::Content);
        }
        if self.ad.session().is_some_and(|s| s.is_visible(&self.stack)) {
            visible.push(SessionKind::Ad);
        }
        visible
    }

    /// Sessions whose engine is set to play.
    pub fn playing_sessions(&self) -> Vec<SessionKind> {
        let mut playing = Vec::new();
        if self.content.session().is_playing() {
            playing.push(SessionKind::Content);
        }
        if self.ad.session().is_some_and(PlaybackSession::is_playing) {
            playing.push(SessionKind::Ad);
        }
        playing
    }

    /// Handle the ad-decision service drives the ad session through.
    pub fn ad_player_handle(&self) -> AdPlayerHandle {
        AdPlayerHandle::new(
            self.service_tx.clone(),
            self.registry.clone(),
            self.progress.clone(),
        )
    }

    pub fn event_sink(&self) -> AdEventSink {
        AdEventSink::new(self.service_tx.clone())
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    pub fn active_notices(&mut self, now: Instant) -> &[Notice] {
        self.notices.active(now)
    }

    pub fn add_action_button(&mut self, button: ActionButton) {
        self.content.session_mut().controls_mut().add_action_button(button);
    }

    /// Attach the fullscreen callback to whichever session is active.
    pub fn set_fullscreen_callback(&mut self, callback: Arc<dyn FullscreenCallback>) {
        self.fullscreen_callback = Some(callback.clone());
        match self.ad.session_mut() {
            Some(ad) => ad.controls_mut().set_fullscreen_callback(Some(callback)),
            None => self
                .content
                .session_mut()
                .controls_mut()
                .set_fullscreen_callback(Some(callback)),
        }
    }

    /// Viewer pressed play.
    pub fn play(&mut self) {
        if self.state == AdState::NoAd && !self.ads_requested {
            if let Some(tag) = self.ad_tag_url.clone() {
                self.request_ads(tag);
                return;
            }
        }
        if self.ad.has_session() {
            self.resume_ad();
            return;
        }
        if self.content.is_hidden() {
            log::debug!("Ignoring play while content is held for an ad break");
            return;
        }
        self.content.session_mut().play();
        self.active = ActiveSession::Content;
        self.arm_tick(Instant::now());
    }

    /// Pause both sessions.
    pub fn pause(&mut self) {
        self.content.session_mut().pause();
        if self.ad.has_session() {
            self.pause_ad();
        }
    }

    /// Release both sessions and the ads manager.
    pub fn release(&mut self) {
        self.ad.destroy_ad(&mut self.stack);
        self.content.session_mut().release();
        if let Some(mut manager) = self.ads_manager.take() {
            manager.destroy();
        }
        self.next_tick = None;
        self.active = ActiveSession::None;
        self.state = AdState::NoAd;
        self.reconciler.reset();
        self.publish_progress(ProgressSnapshot::NotReady);
        log::info!("Orchestrator released");
    }

    /// Drain service messages and engine events, then run the progress tick
    /// if it is due at `now`.
    ///
    /// Returns an error only when content fails before it ever became
    /// playable; every ad-side failure falls back to content.
    pub fn pump(&mut self, now: Instant) -> Result<()> {
        while let Ok(message) = self.service_rx.try_recv() {
            self.handle_service_message(message);
        }
        self.poll_sessions()?;

        if self.next_tick.is_some_and(|due| due <= now) {
            self.next_tick = None;
            self.run_progress_tick();
            if self.active != ActiveSession::None {
                self.arm_tick(now.max(Instant::now()));
            }
        }
        Ok(())
    }

    /// Poll the active session once, recover a stalled ad and publish the
    /// snapshot to the ad-decision service.
    pub fn run_progress_tick(&mut self) -> ProgressSnapshot {
        let content = (self.active == ActiveSession::Content).then_some(self.content.session());
        let snapshot = self.reconciler.tick(self.ad.session_mut(), content);
        self.publish_progress(snapshot);
        if let Some(manager) = self.ads_manager.as_mut() {
            manager.on_progress(snapshot);
        }
        snapshot
    }

    /// Replace the snapshot the ad-decision service reads.
    fn publish_progress(&self, snapshot: ProgressSnapshot) {
        *self.progress.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn stall_recoveries(&self) -> u64 {
        self.reconciler.stall_recoveries()
    }

    fn arm_tick(&mut self, from: Instant) {
        self.next_tick = Some(from + self.settings.progress_tick());
    }

    fn request_ads(&mut self, ad_tag_url: String) {
        log::info!("Requesting ads from {ad_tag_url}");
        let request = AdsRequest {
            ad_tag_url,
            container: AdDisplayContainer {
                player: self.ad_player_handle(),
                ui_region: self.ad.ui_region(),
            },
            events: self.event_sink(),
        };
        self.ads_requested = true;
        self.state = AdState::AdRequested;
        self.loader.request_ads(request);
    }

    fn handle_service_message(&mut self, message: AdServiceMessage) {
        match message {
            AdServiceMessage::AdsManagerLoaded(mut manager) => {
                log::info!("Ads manager loaded");
                manager.init();
                self.ads_manager = Some(manager);
            }
            AdServiceMessage::AdEvent(event) => self.handle_ad_event(event),
            AdServiceMessage::AdError(error) => self.handle_ad_error(error.into()),
            AdServiceMessage::Player(command) => match command {
                AdPlayerCommand::PlayAd => self.play_ad(),
                AdPlayerCommand::LoadAd(url) => self.load_ad(&url),
                AdPlayerCommand::StopAd => self.stop_ad(),
                AdPlayerCommand::PauseAd => self.pause_ad(),
                AdPlayerCommand::ResumeAd => self.resume_ad(),
            },
        }
    }

    fn handle_ad_event(&mut self, event: AdEventType) {
        match event {
            AdEventType::Loaded => match self.ads_manager.as_mut() {
                Some(manager) => manager.start(),
                None => log::warn!("Ad loaded before the ads manager"),
            },
            AdEventType::ContentPauseRequested => self.pause_content(),
            AdEventType::ContentResumeRequested => self.resume_content(),
            other => log::debug!("Ad event {other:?}"),
        }
    }

    fn poll_sessions(&mut self) -> Result<()> {
        for event in self.content.session_mut().poll() {
            match event {
                PlaybackEvent::Error(e) if !self.content_started => {
                    log::error!("Content failed while preparing: {e}");
                    return Err(e.into());
                }
                PlaybackEvent::Error(e) => {
                    log::warn!("Content playback error: {e}");
                    self.push_notice(&PlayerError::from(e));
                }
                PlaybackEvent::StateChanged { state, .. } => {
                    log::debug!("Content state {state:?}");
                }
                PlaybackEvent::VideoSizeChanged { width, height } => {
                    log::debug!("Content video size {width}x{height}");
                }
            }
        }
        if self.content.session().playback_state().is_controllable() {
            self.content_started = true;
        }

        let Some(ad) = self.ad.session_mut() else {
            return Ok(());
        };
        let mut failure = None;
        for event in ad.poll() {
            match event {
                PlaybackEvent::StateChanged {
                    state: TransportState::Ended,
                    ..
                } => {
                    log::info!("Ad playback ended");
                    self.registry.notify(&CallbackHook::Ended);
                }
                PlaybackEvent::Error(e) => failure = Some(e),
                PlaybackEvent::StateChanged { state, .. } => log::debug!("Ad state {state:?}"),
                PlaybackEvent::VideoSizeChanged { .. } => {}
            }
        }
        if let Some(e) = failure {
            self.handle_ad_error(e.into());
        }
        Ok(())
    }

    /// Hold content for an ad break. An ad that is already playing keeps the
    /// active pointer and its tick.
    fn pause_content(&mut self) {
        log::info!("Content paused for ad break");
        self.content.hide(&mut self.stack);
        if !self.ad.has_session() {
            self.active = ActiveSession::None;
            self.next_tick = None;
            self.publish_progress(ProgressSnapshot::NotReady);
        }
        self.registry.notify(&CallbackHook::Pause);
    }

    /// Leave the ad break: drop any ad session and bring content back.
    fn end_ad_break(&mut self) {
        if let Some(fullscreen) = self.ad.destroy_ad(&mut self.stack) {
            self.content
                .session_mut()
                .controls_mut()
                .sync_fullscreen(fullscreen);
        }
        self.content
            .session_mut()
            .controls_mut()
            .set_fullscreen_callback(self.fullscreen_callback.clone());
        self.content.show(&mut self.stack);
        self.pending_ad = None;
        self.state = AdState::NoAd;
        self.active = ActiveSession::Content;
        self.reconciler.reset();
        self.publish_progress(ProgressSnapshot::NotReady);
        self.arm_tick(Instant::now());
    }

    fn resume_content(&mut self) {
        log::info!("Resuming content");
        self.end_ad_break();
        self.registry.notify(&CallbackHook::Resume);
    }

    fn handle_ad_error(&mut self, error: PlayerError) {
        log::warn!("Ad failed, resuming content: {error}");
        self.push_notice(&error);
        let ad_error = match error {
            PlayerError::AdRequest(e) => e,
            other => AdRequestError::new(other.user_message()),
        };
        self.registry.notify(&CallbackHook::Error(ad_error));
        self.resume_content();
    }

    fn push_notice(&mut self, error: &PlayerError) {
        if self.settings.show_error_notices {
            self.notices.push(
                error.user_message(),
                Instant::now(),
                self.settings.notice_duration(),
            );
        }
    }
}

impl VideoAdPlayer for AdOrchestrator {
    fn play_ad(&mut self) {
        if !self.content.is_hidden() {
            self.content.hide(&mut self.stack);
        }
        let Some(video) = self.pending_ad.clone() else {
            self.handle_ad_error(AdRequestError::new("play_ad called before load_ad").into());
            return;
        };

        let presentation = AdPresentation {
            fullscreen: self.content.session().controls().is_fullscreen(),
            fullscreen_callback: self.fullscreen_callback.clone(),
        };
        let started = self.ad.start_ad(
            video,
            &mut self.stack,
            self.provider.as_ref(),
            &self.settings,
            presentation,
        );
        if let Err(e) = started {
            self.handle_ad_error(e.into());
            return;
        }

        self.content
            .session_mut()
            .controls_mut()
            .set_fullscreen_callback(None);
        self.state = AdState::AdPlaying;
        self.active = ActiveSession::Ad;
        self.reconciler.reset();
        self.publish_progress(ProgressSnapshot::NotReady);
        self.arm_tick(Instant::now());
    }

    fn load_ad(&mut self, url: &str) {
        log::info!("Loading ad {url}");
        self.pending_ad = Some(Video::new(url, VideoType::Other));
    }

    fn stop_ad(&mut self) {
        if self.state == AdState::NoAd && !self.ad.has_session() {
            log::debug!("stop_ad with no ad break in progress");
            return;
        }
        log::info!("Ad stopped");
        self.end_ad_break();
    }

    fn pause_ad(&mut self) {
        self.ad.pause_ad();
        if self.state == AdState::AdPlaying {
            self.state = AdState::AdPaused;
        }
    }

    fn resume_ad(&mut self) {
        self.ad.resume_ad();
        if self.state == AdState::AdPaused {
            self.state = AdState::AdPlaying;
        }
    }

    fn add_callback(&mut self, callback: Arc<dyn VideoAdPlayerCallback>) -> CallbackHandle {
        self.registry.add(callback)
    }

    fn remove_callback(&mut self, handle: CallbackHandle) -> bool {
        self.registry.remove(handle)
    }

    /// Last published snapshot. Does not run a tick.
    fn get_progress(&self) -> ProgressSnapshot {
        *self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AdOrchestrator {
    fn drop(&mut self) {
        if !self.content.session().is_released() || self.ad.has_session() {
            self.release();
        }
    }
}
