//! Boundary to the media decode/render engine.
//!
//! The engine itself is a black box behind [`MediaEngine`]: it speaks integer
//! state codes and publishes [`EngineNotification`]s from its own threads over
//! a crossbeam channel. Renderer construction for a given [`Video`] is handed
//! to a [`RendererBuilder`], which may finish on any thread. [`EngineWrapper`]
//! turns both feeds into typed [`PlaybackEvent`]s on the caller's thread.

pub mod sim;
pub mod wrapper;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;

use crate::error::EngineError;
use crate::media::types::{TransportState, Video};
use crate::settings::PlayerSettings;
use crate::surface::RegionId;

pub use wrapper::EngineWrapper;

/// Number of renderer slots the engine manages.
pub const RENDERER_COUNT: usize = 4;

/// Renderer slot, indexed the way the engine indexes its renderer array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Video,
    Audio,
    Text,
    Debug,
}

impl TrackType {
    pub const ALL: [TrackType; RENDERER_COUNT] = [
        TrackType::Video,
        TrackType::Audio,
        TrackType::Text,
        TrackType::Debug,
    ];

    pub fn index(&self) -> usize {
        match self {
            TrackType::Video => 0,
            TrackType::Audio => 1,
            TrackType::Text => 2,
            TrackType::Debug => 3,
        }
    }
}

/// Which track of a renderer slot is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSelection {
    Disabled,
    Track(usize),
}

impl TrackSelection {
    pub const PRIMARY: TrackSelection = TrackSelection::Track(0);
}

/// How a surface change is delivered to the engine's playback thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceDelivery {
    /// Queued; returns immediately.
    Async,
    /// Returns only once the playback thread has processed the message.
    Blocking,
}

/// Raw notification published by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineNotification {
    StateChanged {
        play_when_ready: bool,
        state_code: i32,
    },
    Error(String),
    VideoSizeChanged {
        width: u32,
        height: u32,
    },
}

/// Typed event produced by [`EngineWrapper::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    StateChanged {
        play_when_ready: bool,
        state: TransportState,
    },
    Error(EngineError),
    VideoSizeChanged {
        width: u32,
        height: u32,
    },
}

/// Output of a renderer build, one entry per [`TrackType`] slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltRenderers {
    /// Track names per slot. Empty when the slot has no renderer.
    pub track_names: [Vec<String>; RENDERER_COUNT],
    /// Slots whose source can switch between several tracks.
    pub multi_track: [bool; RENDERER_COUNT],
}

impl BuiltRenderers {
    /// One unnamed video and audio track, no text or debug renderer.
    pub fn single_track() -> Self {
        let mut renderers = Self::default();
        renderers.track_names[TrackType::Video.index()] = vec![String::new()];
        renderers.track_names[TrackType::Audio.index()] = vec![String::new()];
        renderers
    }

    pub fn has_renderer(&self, track: TrackType) -> bool {
        !self.track_names[track.index()].is_empty()
    }
}

/// Engine construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub renderer_count: usize,
    pub min_buffer_ms: u64,
    pub min_rebuffer_ms: u64,
}

impl EngineConfig {
    pub fn from_settings(settings: &PlayerSettings) -> Self {
        Self {
            renderer_count: RENDERER_COUNT,
            min_buffer_ms: settings.min_buffer_ms,
            min_rebuffer_ms: settings.min_rebuffer_ms,
        }
    }
}

/// One decode/render engine instance.
pub trait MediaEngine: Send {
    fn prepare(&mut self, renderers: &BuiltRenderers);
    fn set_play_when_ready(&mut self, play_when_ready: bool);
    fn play_when_ready(&self) -> bool;
    /// Out-of-range positions are clamped by the engine.
    fn seek_to(&mut self, position_ms: u64);
    fn stop(&mut self);
    fn playback_state_code(&self) -> i32;
    fn current_position_ms(&self) -> u64;
    fn duration_ms(&self) -> Option<u64>;
    fn set_surface(&mut self, surface: Option<RegionId>, delivery: SurfaceDelivery);
    fn set_renderer_enabled(&mut self, track: TrackType, enabled: bool);
    fn select_track(&mut self, track: TrackType, index: usize);
    fn release(&mut self);
}

/// Builds the renderers for a video. Completion may happen on another thread.
pub trait RendererBuilder: Send {
    fn build_renderers(&mut self, video: &Video, callback: BuilderCallback);
}

/// Creates engines and renderer builders.
pub trait EngineProvider {
    fn create_engine(
        &self,
        video: &Video,
        config: EngineConfig,
        notifications: Sender<EngineNotification>,
    ) -> Box<dyn MediaEngine>;

    fn renderer_builder(
        &self,
        video: &Video,
        user_agent: &str,
    ) -> Result<Box<dyn RendererBuilder>, EngineError>;
}

pub(crate) struct BuildOutcome {
    pub canceled: Arc<AtomicBool>,
    pub result: Result<BuiltRenderers, EngineError>,
}

/// Completion handle given to a [`RendererBuilder`].
///
/// Carries the cancellation flag of the build it belongs to. Once the owning
/// session cancels (re-prepare or release) the outcome is dropped.
pub struct BuilderCallback {
    canceled: Arc<AtomicBool>,
    tx: Sender<BuildOutcome>,
}

impl BuilderCallback {
    pub(crate) fn new(canceled: Arc<AtomicBool>, tx: Sender<BuildOutcome>) -> Self {
        Self { canceled, tx }
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    pub fn on_renderers_built(self, renderers: BuiltRenderers) {
        self.deliver(Ok(renderers));
    }

    pub fn on_renderers_error(self, error: EngineError) {
        self.deliver(Err(error));
    }

    fn deliver(self, result: Result<BuiltRenderers, EngineError>) {
        if self.is_canceled() {
            log::debug!("Dropping renderer build result for canceled prepare");
            return;
        }
        let _ = self.tx.send(BuildOutcome {
            canceled: self.canceled,
            result,
        });
    }
}
