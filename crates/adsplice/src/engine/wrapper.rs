use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};

use super::{
    BuildOutcome, BuilderCallback, BuiltRenderers, EngineConfig, EngineNotification,
    EngineProvider, MediaEngine, PlaybackEvent, RENDERER_COUNT, RendererBuilder, SurfaceDelivery,
    TrackSelection, TrackType,
};
use crate::error::EngineError;
use crate::media::types::{TransportState, Video};
use crate::surface::RegionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    Idle,
    Building,
    Built,
}

/// Higher-level handle over one [`MediaEngine`].
///
/// Owns renderer building (with cancellation), surface and track pushes, and
/// de-duplicated state reporting. All methods run on the owner's thread;
/// engine and builder output arrives through channels drained by [`poll`].
///
/// [`poll`]: EngineWrapper::poll
pub struct EngineWrapper {
    video: Video,
    builder: Box<dyn RendererBuilder>,
    engine: Box<dyn MediaEngine>,
    notifications: Receiver<EngineNotification>,
    build_tx: Sender<BuildOutcome>,
    build_rx: Receiver<BuildOutcome>,
    build_state: BuildState,
    /// Cancellation flag of the in-flight build, if any.
    pending_build: Option<Arc<AtomicBool>>,
    surface: Option<RegionId>,
    renderers: Option<BuiltRenderers>,
    track_selection: [TrackSelection; RENDERER_COUNT],
    last_reported: (bool, TransportState),
    queued: Vec<PlaybackEvent>,
    released: bool,
}

impl EngineWrapper {
    pub fn new(
        video: Video,
        provider: &dyn EngineProvider,
        config: EngineConfig,
        user_agent: &str,
    ) -> Result<Self, EngineError> {
        let builder = provider.renderer_builder(&video, user_agent)?;
        let (notify_tx, notifications) = crossbeam_channel::unbounded();
        let engine = provider.create_engine(&video, config, notify_tx);
        let (build_tx, build_rx) = crossbeam_channel::unbounded();

        let mut track_selection = [TrackSelection::PRIMARY; RENDERER_COUNT];
        // Text stays off until a caller opts in.
        track_selection[TrackType::Text.index()] = TrackSelection::Disabled;

        Ok(Self {
            video,
            builder,
            engine,
            notifications,
            build_tx,
            build_rx,
            build_state: BuildState::Idle,
            pending_build: None,
            surface: None,
            renderers: None,
            track_selection,
            last_reported: (false, TransportState::Idle),
            queued: Vec::new(),
            released: false,
        })
    }

    pub fn video(&self) -> &Video {
        &self.video
    }

    /// Start (or restart) renderer building.
    pub fn prepare(&mut self) -> Result<(), EngineError> {
        if self.released {
            return Err(EngineError::Released);
        }
        if self.build_state == BuildState::Built {
            self.engine.stop();
        }
        self.cancel_pending_build();
        self.build_state = BuildState::Building;
        self.maybe_report_state();

        let canceled = Arc::new(AtomicBool::new(false));
        self.pending_build = Some(canceled.clone());
        let callback = BuilderCallback::new(canceled, self.build_tx.clone());
        log::debug!("Building renderers for {}", self.video.url);
        self.builder.build_renderers(&self.video, callback);
        Ok(())
    }

    pub fn is_building(&self) -> bool {
        self.build_state == BuildState::Building
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn surface(&self) -> Option<RegionId> {
        self.surface
    }

    pub fn set_surface(&mut self, surface: Option<RegionId>) {
        self.surface = surface;
        self.push_surface_and_video_track(SurfaceDelivery::Async);
    }

    /// Detach the surface, returning once the engine has processed it.
    pub fn blocking_clear_surface(&mut self) {
        self.surface = None;
        self.push_surface_and_video_track(SurfaceDelivery::Blocking);
    }

    pub fn tracks(&self, track: TrackType) -> Option<&[String]> {
        self.renderers
            .as_ref()
            .map(|r| r.track_names[track.index()].as_slice())
    }

    pub fn selection_for(&self, track: TrackType) -> TrackSelection {
        self.track_selection[track.index()]
    }

    pub fn select_track(&mut self, track: TrackType, selection: TrackSelection) {
        if self.track_selection[track.index()] == selection {
            return;
        }
        self.track_selection[track.index()] = selection;
        if track == TrackType::Video {
            self.push_surface_and_video_track(SurfaceDelivery::Async);
        } else {
            self.push_track_selection(track, true);
        }
    }

    pub fn set_play_when_ready(&mut self, play_when_ready: bool) {
        if self.released {
            return;
        }
        self.engine.set_play_when_ready(play_when_ready);
    }

    pub fn play_when_ready(&self) -> bool {
        !self.released && self.engine.play_when_ready()
    }

    pub fn seek_to(&mut self, position_ms: u64) {
        if self.released {
            return;
        }
        self.engine.seek_to(position_ms);
    }

    pub fn playback_state(&self) -> TransportState {
        if self.released {
            return TransportState::Idle;
        }
        if self.build_state == BuildState::Building {
            return TransportState::Preparing;
        }
        let code = self.engine.playback_state_code();
        TransportState::from_code(code).unwrap_or_else(|| {
            log::warn!("Unknown engine state code {code}, treating as idle");
            TransportState::Idle
        })
    }

    pub fn current_position_ms(&self) -> u64 {
        self.engine.current_position_ms()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.engine.duration_ms()
    }

    /// Cancel any in-flight build and free engine resources. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.cancel_pending_build();
        self.build_state = BuildState::Idle;
        self.surface = None;
        self.engine.release();
        self.released = true;
        self.queued.clear();
        log::debug!("Engine released for {}", self.video.url);
    }

    /// Drain builder and engine feeds into typed events.
    pub fn poll(&mut self) -> Vec<PlaybackEvent> {
        if self.released {
            return Vec::new();
        }

        while let Ok(outcome) = self.build_rx.try_recv() {
            if outcome.canceled.load(Ordering::Acquire) {
                log::debug!("Ignoring renderer build completed after cancel");
                continue;
            }
            self.pending_build = None;
            match outcome.result {
                Ok(renderers) => self.on_renderers(renderers),
                Err(e) => self.on_renderers_error(e),
            }
        }

        while let Ok(notification) = self.notifications.try_recv() {
            match notification {
                EngineNotification::StateChanged { .. } => self.maybe_report_state(),
                EngineNotification::Error(message) => {
                    self.build_state = BuildState::Idle;
                    self.queued
                        .push(PlaybackEvent::Error(EngineError::Playback(message)));
                }
                EngineNotification::VideoSizeChanged { width, height } => {
                    self.queued
                        .push(PlaybackEvent::VideoSizeChanged { width, height });
                }
            }
        }

        std::mem::take(&mut self.queued)
    }

    fn cancel_pending_build(&mut self) {
        if let Some(flag) = self.pending_build.take() {
            flag.store(true, Ordering::Release);
        }
    }

    fn on_renderers(&mut self, renderers: BuiltRenderers) {
        self.renderers = Some(renderers);
        self.build_state = BuildState::Built;
        self.maybe_report_state();
        self.push_surface_and_video_track(SurfaceDelivery::Async);
        self.push_track_selection(TrackType::Audio, true);
        self.push_track_selection(TrackType::Text, true);
        if let Some(renderers) = &self.renderers {
            self.engine.prepare(renderers);
        }
    }

    fn on_renderers_error(&mut self, error: EngineError) {
        log::warn!("Renderer build failed for {}: {error}", self.video.url);
        self.queued.push(PlaybackEvent::Error(error));
        self.build_state = BuildState::Idle;
        self.maybe_report_state();
    }

    fn maybe_report_state(&mut self) {
        let play_when_ready = self.engine.play_when_ready();
        let state = self.playback_state();
        if self.last_reported != (play_when_ready, state) {
            self.queued.push(PlaybackEvent::StateChanged {
                play_when_ready,
                state,
            });
            self.last_reported = (play_when_ready, state);
        }
    }

    fn push_surface_and_video_track(&mut self, delivery: SurfaceDelivery) {
        if self.build_state != BuildState::Built {
            return;
        }
        self.engine.set_surface(self.surface, delivery);
        self.push_track_selection(TrackType::Video, self.surface.is_some());
    }

    fn push_track_selection(&mut self, track: TrackType, allow_enable: bool) {
        if self.build_state != BuildState::Built {
            return;
        }
        let multi_track = self
            .renderers
            .as_ref()
            .is_some_and(|r| r.multi_track[track.index()]);

        match self.track_selection[track.index()] {
            TrackSelection::Disabled => self.engine.set_renderer_enabled(track, false),
            TrackSelection::Track(_) if !multi_track => {
                self.engine.set_renderer_enabled(track, allow_enable);
            }
            TrackSelection::Track(index) => {
                // Switching tracks requires the renderer to be off; hold playback meanwhile.
                let play_when_ready = self.engine.play_when_ready();
                self.engine.set_play_when_ready(false);
                self.engine.set_renderer_enabled(track, false);
                self.engine.select_track(track, index);
                self.engine.set_renderer_enabled(track, allow_enable);
                self.engine.set_play_when_ready(play_when_ready);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sim::{BuildMode, EngineCommand, SimulatedProvider};
    use crate::media::types::VideoType;
    use crate::settings::PlayerSettings;

    fn wrapper(provider: &SimulatedProvider, url: &str) -> EngineWrapper {
        let settings = PlayerSettings::default();
        EngineWrapper::new(
            Video::new(url, VideoType::Mp4),
            provider,
            EngineConfig::from_settings(&settings),
            &settings.user_agent,
        )
        .expect("wrapper")
    }

    #[test]
    fn reports_preparing_while_building() {
        let provider = SimulatedProvider::new().with_build_mode(BuildMode::Deferred);
        let mut w = wrapper(&provider, "a.mp4");
        w.prepare().expect("prepare");
        assert_eq!(w.playback_state(), TransportState::Preparing);
        let events = w.poll();
        assert_eq!(
            events,
            vec![PlaybackEvent::StateChanged {
                play_when_ready: false,
                state: TransportState::Preparing
            }]
        );
    }

    #[test]
    fn built_renderers_prepare_engine_and_reach_ready() {
        let provider = SimulatedProvider::new();
        let mut w = wrapper(&provider, "a.mp4");
        w.set_surface(Some(RegionId::from_raw(1)));
        w.prepare().expect("prepare");
        let events = w.poll();
        assert_eq!(w.playback_state(), TransportState::Ready);
        assert!(events.contains(&PlaybackEvent::StateChanged {
            play_when_ready: false,
            state: TransportState::Ready
        }));
        let handle = provider.handle_for("a.mp4").expect("engine");
        let commands = handle.commands();
        assert!(commands.contains(&EngineCommand::SetSurface {
            surface: Some(RegionId::from_raw(1)),
            blocking: false
        }));
        assert!(commands.contains(&EngineCommand::SetRendererEnabled(TrackType::Video, true)));
        assert!(commands.contains(&EngineCommand::SetRendererEnabled(TrackType::Text, false)));
        assert!(commands.contains(&EngineCommand::Prepare));
    }

    #[test]
    fn state_changes_are_deduplicated() {
        let provider = SimulatedProvider::new();
        let mut w = wrapper(&provider, "a.mp4");
        w.prepare().expect("prepare");
        w.poll();
        let handle = provider.handle_for("a.mp4").expect("engine");
        handle.renotify();
        handle.renotify();
        assert!(w.poll().is_empty());
    }

    #[test]
    fn surface_is_not_pushed_before_build() {
        let provider = SimulatedProvider::new().with_build_mode(BuildMode::Deferred);
        let mut w = wrapper(&provider, "a.mp4");
        w.set_surface(Some(RegionId::from_raw(7)));
        w.prepare().expect("prepare");
        let handle = provider.handle_for("a.mp4").expect("engine");
        assert!(handle.commands().is_empty());
    }

    #[test]
    fn reprepare_cancels_previous_build() {
        let provider = SimulatedProvider::new().with_build_mode(BuildMode::Deferred);
        let mut w = wrapper(&provider, "a.mp4");
        w.prepare().expect("prepare");
        w.prepare().expect("prepare again");
        // Both builds complete; only the second one counts.
        assert_eq!(provider.complete_deferred("a.mp4"), 1);
        w.poll();
        let handle = provider.handle_for("a.mp4").expect("engine");
        let prepares = handle
            .commands()
            .iter()
            .filter(|c| **c == EngineCommand::Prepare)
            .count();
        assert_eq!(prepares, 1);
    }

    #[test]
    fn release_cancels_in_flight_build_and_is_idempotent() {
        let provider = SimulatedProvider::new().with_build_mode(BuildMode::Deferred);
        let mut w = wrapper(&provider, "a.mp4");
        w.prepare().expect("prepare");
        w.release();
        w.release();
        assert_eq!(provider.complete_deferred("a.mp4"), 0);
        assert!(w.poll().is_empty());
        let handle = provider.handle_for("a.mp4").expect("engine");
        let releases = handle
            .commands()
            .iter()
            .filter(|c| **c == EngineCommand::Release)
            .count();
        assert_eq!(releases, 1);
        assert_eq!(w.prepare(), Err(EngineError::Released));
    }

    #[test]
    fn build_error_surfaces_as_event() {
        let provider =
            SimulatedProvider::new().with_build_mode(BuildMode::Fail("manifest 404".into()));
        let mut w = wrapper(&provider, "a.mp4");
        w.prepare().expect("prepare");
        let events = w.poll();
        assert!(events.contains(&PlaybackEvent::Error(EngineError::Build(
            "manifest 404".into()
        ))));
        assert_eq!(w.playback_state(), TransportState::Idle);
    }

    #[test]
    fn engine_error_surfaces_as_playback_error() {
        let provider = SimulatedProvider::new();
        let mut w = wrapper(&provider, "a.mp4");
        w.prepare().expect("prepare");
        w.poll();
        provider.handle_for("a.mp4").expect("engine").fail("decoder died");
        let events = w.poll();
        assert!(events.contains(&PlaybackEvent::Error(EngineError::Playback(
            "decoder died".into()
        ))));
    }

    #[test]
    fn blocking_clear_detaches_surface_synchronously() {
        let provider = SimulatedProvider::new();
        let mut w = wrapper(&provider, "a.mp4");
        w.set_surface(Some(RegionId::from_raw(3)));
        w.prepare().expect("prepare");
        w.poll();
        w.blocking_clear_surface();
        let handle = provider.handle_for("a.mp4").expect("engine");
        assert_eq!(handle.surface(), None);
        assert_eq!(
            handle.commands().last(),
            Some(&EngineCommand::SetRendererEnabled(TrackType::Video, false))
        );
        assert!(handle.commands().contains(&EngineCommand::SetSurface {
            surface: None,
            blocking: true
        }));
    }

    #[test]
    fn multi_track_selection_pauses_around_switch() {
        let mut renderers = BuiltRenderers::single_track();
        renderers.track_names[TrackType::Audio.index()] = vec!["en".into(), "fr".into()];
        renderers.multi_track[TrackType::Audio.index()] = true;
        let provider = SimulatedProvider::new().with_renderers(renderers);
        let mut w = wrapper(&provider, "a.mp4");
        w.prepare().expect("prepare");
        w.poll();
        w.set_play_when_ready(true);
        let handle = provider.handle_for("a.mp4").expect("engine");
        handle.clear_commands();

        w.select_track(TrackType::Audio, TrackSelection::Track(1));
        assert_eq!(
            handle.commands(),
            vec![
                EngineCommand::SetPlayWhenReady(false),
                EngineCommand::SetRendererEnabled(TrackType::Audio, false),
                EngineCommand::SelectTrack(TrackType::Audio, 1),
                EngineCommand::SetRendererEnabled(TrackType::Audio, true),
                EngineCommand::SetPlayWhenReady(true),
            ]
        );
        assert_eq!(
            w.tracks(TrackType::Audio),
            Some(["en".to_string(), "fr".to_string()].as_slice())
        );
    }

    #[test]
    fn unsupported_type_is_an_error() {
        let provider = SimulatedProvider::new().with_unsupported(VideoType::Dash);
        let settings = PlayerSettings::default();
        let result = EngineWrapper::new(
            Video::new("a.mpd", VideoType::Dash),
            &provider,
            EngineConfig::from_settings(&settings),
            &settings.user_agent,
        );
        assert!(matches!(result, Err(EngineError::UnsupportedType(t)) if t == "DASH"));
    }
}
