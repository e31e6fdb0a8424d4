//! In-process engine used by the demo binary and the test suite.
//!
//! A [`SimulatedEngine`] keeps its transport state behind a mutex shared with a
//! [`SimHandle`], so a driver can advance the clock, stall playback or inject
//! failures while the orchestrator only ever sees the [`MediaEngine`] trait.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use rustc_hash::FxHashMap;

use super::{
    BuilderCallback, BuiltRenderers, EngineConfig, EngineNotification, EngineProvider,
    MediaEngine, RendererBuilder, SurfaceDelivery, TrackType,
};
use crate::error::EngineError;
use crate::media::types::{TransportState, Video, VideoType};
use crate::surface::RegionId;

pub const DEFAULT_DURATION_MS: u64 = 60_000;

/// A call made on a [`SimulatedEngine`], recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Prepare,
    SetPlayWhenReady(bool),
    SeekTo(u64),
    Stop,
    SetSurface {
        surface: Option<RegionId>,
        blocking: bool,
    },
    SetRendererEnabled(TrackType, bool),
    SelectTrack(TrackType, usize),
    Release,
}

struct SimState {
    state: TransportState,
    play_when_ready: bool,
    position_ms: u64,
    duration_ms: u64,
    prepared: bool,
    stalled: bool,
    released: bool,
    surface: Option<RegionId>,
    commands: Vec<EngineCommand>,
    notify: Sender<EngineNotification>,
}

impl SimState {
    fn notify_state(&self) {
        let _ = self.notify.send(EngineNotification::StateChanged {
            play_when_ready: self.play_when_ready,
            state_code: self.state.code(),
        });
    }

    fn set_state(&mut self, state: TransportState) {
        if self.state != state {
            self.state = state;
            self.notify_state();
        }
    }
}

/// Driver-side view of one simulated engine.
#[derive(Clone)]
pub struct SimHandle {
    inner: Arc<Mutex<SimState>>,
}

impl SimHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn commands(&self) -> Vec<EngineCommand> {
        self.lock().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.lock().commands.clear();
    }

    pub fn state(&self) -> TransportState {
        self.lock().state
    }

    pub fn position_ms(&self) -> u64 {
        self.lock().position_ms
    }

    pub fn set_position(&self, position_ms: u64) {
        let mut s = self.lock();
        s.position_ms = position_ms.min(s.duration_ms);
    }

    /// Move the playhead forward if the engine is actually playing.
    pub fn advance(&self, elapsed_ms: u64) {
        let mut s = self.lock();
        if s.released || s.stalled || !s.play_when_ready || s.state != TransportState::Ready {
            return;
        }
        s.position_ms = (s.position_ms + elapsed_ms).min(s.duration_ms);
        if s.position_ms == s.duration_ms {
            s.set_state(TransportState::Ended);
        }
    }

    /// A stalled engine reports Ready but its playhead stops moving.
    pub fn set_stalled(&self, stalled: bool) {
        self.lock().stalled = stalled;
    }

    pub fn is_stalled(&self) -> bool {
        self.lock().stalled
    }

    pub fn finish(&self) {
        let mut s = self.lock();
        s.position_ms = s.duration_ms;
        s.set_state(TransportState::Ended);
    }

    pub fn fail(&self, message: &str) {
        let mut s = self.lock();
        s.state = TransportState::Idle;
        let _ = s.notify.send(EngineNotification::Error(message.to_string()));
    }

    /// Re-publish the current state without changing it.
    pub fn renotify(&self) {
        self.lock().notify_state();
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    pub fn play_when_ready(&self) -> bool {
        self.lock().play_when_ready
    }

    pub fn surface(&self) -> Option<RegionId> {
        self.lock().surface
    }
}

pub struct SimulatedEngine {
    handle: SimHandle,
}

impl SimulatedEngine {
    pub fn new(duration_ms: u64, notify: Sender<EngineNotification>) -> Self {
        let state = SimState {
            state: TransportState::Idle,
            play_when_ready: false,
            position_ms: 0,
            duration_ms,
            prepared: false,
            stalled: false,
            released: false,
            surface: None,
            commands: Vec::new(),
            notify,
        };
        Self {
            handle: SimHandle {
                inner: Arc::new(Mutex::new(state)),
            },
        }
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }
}

impl MediaEngine for SimulatedEngine {
    fn prepare(&mut self, _renderers: &BuiltRenderers) {
        let mut s = self.handle.lock();
        s.commands.push(EngineCommand::Prepare);
        if s.released {
            return;
        }
        s.prepared = true;
        s.set_state(TransportState::Buffering);
        s.set_state(TransportState::Ready);
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        let mut s = self.handle.lock();
        s.commands.push(EngineCommand::SetPlayWhenReady(play_when_ready));
        if s.play_when_ready != play_when_ready {
            s.play_when_ready = play_when_ready;
            s.notify_state();
        }
    }

    fn play_when_ready(&self) -> bool {
        self.handle.lock().play_when_ready
    }

    fn seek_to(&mut self, position_ms: u64) {
        let mut s = self.handle.lock();
        s.commands.push(EngineCommand::SeekTo(position_ms));
        s.position_ms = position_ms.min(s.duration_ms);
        if s.state == TransportState::Ended && s.position_ms < s.duration_ms {
            s.set_state(TransportState::Ready);
        }
    }

    fn stop(&mut self) {
        let mut s = self.handle.lock();
        s.commands.push(EngineCommand::Stop);
        s.prepared = false;
        s.set_state(TransportState::Idle);
    }

    fn playback_state_code(&self) -> i32 {
        self.handle.lock().state.code()
    }

    fn current_position_ms(&self) -> u64 {
        self.handle.lock().position_ms
    }

    fn duration_ms(&self) -> Option<u64> {
        let s = self.handle.lock();
        s.prepared.then_some(s.duration_ms)
    }

    fn set_surface(&mut self, surface: Option<RegionId>, delivery: SurfaceDelivery) {
        let mut s = self.handle.lock();
        s.commands.push(EngineCommand::SetSurface {
            surface,
            blocking: delivery == SurfaceDelivery::Blocking,
        });
        s.surface = surface;
    }

    fn set_renderer_enabled(&mut self, track: TrackType, enabled: bool) {
        self.handle
            .lock()
            .commands
            .push(EngineCommand::SetRendererEnabled(track, enabled));
    }

    fn select_track(&mut self, track: TrackType, index: usize) {
        self.handle
            .lock()
            .commands
            .push(EngineCommand::SelectTrack(track, index));
    }

    fn release(&mut self) {
        let mut s = self.handle.lock();
        s.commands.push(EngineCommand::Release);
        s.released = true;
        s.prepared = false;
        s.surface = None;
        s.play_when_ready = false;
        s.state = TransportState::Idle;
    }
}

/// How a simulated renderer build completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMode {
    /// Synchronously, inside `build_renderers`.
    Immediate,
    /// Only when [`SimulatedProvider::complete_deferred`] is called.
    Deferred,
    /// On a named worker thread after a delay.
    Threaded(Duration),
    Fail(String),
}

struct Deferred {
    url: String,
    callback: BuilderCallback,
    renderers: BuiltRenderers,
}

struct ProviderState {
    default_mode: BuildMode,
    modes: FxHashMap<String, BuildMode>,
    durations: FxHashMap<String, u64>,
    renderers: BuiltRenderers,
    unsupported: Vec<VideoType>,
    engines: Vec<(String, SimHandle)>,
    deferred: Vec<Deferred>,
}

/// [`EngineProvider`] that hands out [`SimulatedEngine`]s and keeps a handle to
/// each one.
#[derive(Clone)]
pub struct SimulatedProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState {
                default_mode: BuildMode::Immediate,
                modes: FxHashMap::default(),
                durations: FxHashMap::default(),
                renderers: BuiltRenderers::single_track(),
                unsupported: Vec::new(),
                engines: Vec::new(),
                deferred: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_build_mode(self, mode: BuildMode) -> Self {
        self.lock().default_mode = mode;
        self
    }

    pub fn with_build_mode_for(self, url: impl Into<String>, mode: BuildMode) -> Self {
        self.lock().modes.insert(url.into(), mode);
        self
    }

    pub fn with_duration_for(self, url: impl Into<String>, duration_ms: u64) -> Self {
        self.lock().durations.insert(url.into(), duration_ms);
        self
    }

    pub fn with_renderers(self, renderers: BuiltRenderers) -> Self {
        self.lock().renderers = renderers;
        self
    }

    pub fn with_unsupported(self, video_type: VideoType) -> Self {
        self.lock().unsupported.push(video_type);
        self
    }

    /// Most recently created engine for `url`.
    pub fn handle_for(&self, url: &str) -> Option<SimHandle> {
        self.lock()
            .engines
            .iter()
            .rev()
            .find(|(u, _)| u == url)
            .map(|(_, h)| h.clone())
    }

    pub fn handles_for(&self, url: &str) -> Vec<SimHandle> {
        self.lock()
            .engines
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, h)| h.clone())
            .collect()
    }

    pub fn engine_count(&self) -> usize {
        self.lock().engines.len()
    }

    /// Complete every deferred build for `url`. Returns how many were still
    /// live (not canceled) when completed.
    pub fn complete_deferred(&self, url: &str) -> usize {
        let pending: Vec<Deferred> = {
            let mut state = self.lock();
            let (matching, rest): (Vec<Deferred>, Vec<Deferred>) = std::mem::take(&mut state.deferred)
                .into_iter()
                .partition(|d| d.url == url);
            state.deferred = rest;
            matching
        };
        let mut live = 0;
        for d in pending {
            if !d.callback.is_canceled() {
                live += 1;
            }
            d.callback.on_renderers_built(d.renderers);
        }
        live
    }

    pub fn pending_builds(&self) -> usize {
        self.lock().deferred.len()
    }

    /// Advance every live engine's playhead.
    pub fn advance_all(&self, elapsed_ms: u64) {
        let handles: Vec<SimHandle> = self.lock().engines.iter().map(|(_, h)| h.clone()).collect();
        for handle in handles.iter().filter(|h| !h.is_released()) {
            handle.advance(elapsed_ms);
        }
    }
}

impl EngineProvider for SimulatedProvider {
    fn create_engine(
        &self,
        video: &Video,
        config: EngineConfig,
        notifications: Sender<EngineNotification>,
    ) -> Box<dyn MediaEngine> {
        let mut state = self.lock();
        let duration = state
            .durations
            .get(&video.url)
            .copied()
            .unwrap_or(DEFAULT_DURATION_MS);
        let engine = SimulatedEngine::new(duration, notifications);
        log::debug!(
            "Created simulated engine for {} ({} renderers, {}ms buffer)",
            video.url,
            config.renderer_count,
            config.min_buffer_ms
        );
        state.engines.push((video.url.clone(), engine.handle()));
        Box::new(engine)
    }

    fn renderer_builder(
        &self,
        video: &Video,
        _user_agent: &str,
    ) -> Result<Box<dyn RendererBuilder>, EngineError> {
        let state = self.lock();
        if state.unsupported.contains(&video.video_type) {
            return Err(EngineError::UnsupportedType(
                video.video_type.display_name().to_string(),
            ));
        }
        let mode = state
            .modes
            .get(&video.url)
            .cloned()
            .unwrap_or_else(|| state.default_mode.clone());
        Ok(Box::new(SimRendererBuilder {
            provider: self.clone(),
            mode,
            renderers: state.renderers.clone(),
        }))
    }
}

struct SimRendererBuilder {
    provider: SimulatedProvider,
    mode: BuildMode,
    renderers: BuiltRenderers,
}

impl RendererBuilder for SimRendererBuilder {
    fn build_renderers(&mut self, video: &Video, callback: BuilderCallback) {
        match &self.mode {
            BuildMode::Immediate => callback.on_renderers_built(self.renderers.clone()),
            BuildMode::Fail(message) => {
                callback.on_renderers_error(EngineError::Build(message.clone()));
            }
            BuildMode::Deferred => self.provider.lock().deferred.push(Deferred {
                url: video.url.clone(),
                callback,
                renderers: self.renderers.clone(),
            }),
            BuildMode::Threaded(delay) => {
                let delay = *delay;
                let renderers = self.renderers.clone();
                let spawned = thread::Builder::new()
                    .name("renderer-build".into())
                    .spawn(move || {
                        thread::sleep(delay);
                        callback.on_renderers_built(renderers);
                    });
                if let Err(e) = spawned {
                    log::error!("Failed to spawn renderer build thread: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn engine() -> (SimulatedEngine, crossbeam_channel::Receiver<EngineNotification>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (SimulatedEngine::new(10_000, tx), rx)
    }

    #[test]
    fn prepare_walks_to_ready() {
        let (mut e, rx) = engine();
        e.prepare(&BuiltRenderers::single_track());
        let codes: Vec<i32> = rx
            .try_iter()
            .filter_map(|n| match n {
                EngineNotification::StateChanged { state_code, .. } => Some(state_code),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec![3, 4]);
        assert_eq!(e.duration_ms(), Some(10_000));
    }

    #[test]
    fn advance_requires_playing_and_unstalled() {
        let (mut e, _rx) = engine();
        let h = e.handle();
        e.prepare(&BuiltRenderers::single_track());
        h.advance(500);
        assert_eq!(h.position_ms(), 0);

        e.set_play_when_ready(true);
        h.advance(500);
        assert_eq!(h.position_ms(), 500);

        h.set_stalled(true);
        h.advance(500);
        assert_eq!(h.position_ms(), 500);
    }

    #[test]
    fn reaching_duration_ends_playback() {
        let (mut e, _rx) = engine();
        let h = e.handle();
        e.prepare(&BuiltRenderers::single_track());
        e.set_play_when_ready(true);
        h.advance(20_000);
        assert_eq!(h.position_ms(), 10_000);
        assert_eq!(h.state(), TransportState::Ended);
    }

    #[test]
    fn seek_is_clamped() {
        let (mut e, _rx) = engine();
        e.prepare(&BuiltRenderers::single_track());
        e.seek_to(99_000);
        assert_eq!(e.current_position_ms(), 10_000);
    }

    #[test]
    fn threaded_build_completes_off_thread() {
        let provider =
            SimulatedProvider::new().with_build_mode(BuildMode::Threaded(Duration::from_millis(5)));
        let video = Video::new("a.mp4", VideoType::Mp4);
        let mut builder = provider.renderer_builder(&video, "ua").expect("builder");
        let (tx, rx) = crossbeam_channel::unbounded();
        builder.build_renderers(
            &video,
            BuilderCallback::new(Arc::new(AtomicBool::new(false)), tx),
        );
        let outcome = rx.recv_timeout(Duration::from_secs(5)).expect("outcome");
        assert_eq!(outcome.result, Ok(BuiltRenderers::single_track()));
    }

    #[test]
    fn per_url_modes_override_default() {
        let provider = SimulatedProvider::new()
            .with_build_mode(BuildMode::Deferred)
            .with_build_mode_for("ad.mp4", BuildMode::Immediate);
        let video = Video::new("ad.mp4", VideoType::Mp4);
        let mut builder = provider.renderer_builder(&video, "ua").expect("builder");
        let (tx, rx) = crossbeam_channel::unbounded();
        builder.build_renderers(
            &video,
            BuilderCallback::new(Arc::new(AtomicBool::new(false)), tx),
        );
        assert!(rx.try_recv().is_ok());
        assert_eq!(provider.pending_builds(), 0);
    }

    #[test]
    fn release_records_and_idles() {
        let (mut e, _rx) = engine();
        let h = e.handle();
        e.prepare(&BuiltRenderers::single_track());
        e.release();
        assert!(h.is_released());
        assert_eq!(e.playback_state_code(), TransportState::Idle.code());
        assert_eq!(h.commands().last(), Some(&EngineCommand::Release));
    }
}
