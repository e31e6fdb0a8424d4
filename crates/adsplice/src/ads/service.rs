//! Boundary to the ad-decision service.
//!
//! The service runs on its own threads. It reaches the orchestrator through an
//! [`AdEventSink`] for loader/manager events and an [`AdPlayerHandle`] for the
//! `VideoAdPlayer` capability. Both feed one channel, so capability calls and
//! events are applied in the order the service issued them when
//! [`AdOrchestrator::pump`](crate::ads::AdOrchestrator::pump) drains it.

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::Sender;

use super::types::{AdEventType, CallbackHandle, CallbackRegistry, VideoAdPlayerCallback};
use crate::error::AdRequestError;
use crate::media::types::ProgressSnapshot;
use crate::surface::RegionId;

/// Issues ad requests for an ad tag.
pub trait AdsLoader {
    fn request_ads(&mut self, request: AdsRequest);
}

/// Schedules and drives the ads for one request.
pub trait AdsManager: Send {
    fn init(&mut self);
    fn start(&mut self);
    /// Latest snapshot of the active session, published every tick.
    fn on_progress(&mut self, _progress: ProgressSnapshot) {}
    fn destroy(&mut self) {}
}

/// Message from the ad-decision service to the orchestrator.
pub enum AdServiceMessage {
    AdsManagerLoaded(Box<dyn AdsManager>),
    AdEvent(AdEventType),
    AdError(AdRequestError),
    Player(AdPlayerCommand),
}

/// Call made by the service through the ad player capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdPlayerCommand {
    PlayAd,
    LoadAd(String),
    StopAd,
    PauseAd,
    ResumeAd,
}

/// Sending side of the service event feed.
#[derive(Clone)]
pub struct AdEventSink {
    tx: Sender<AdServiceMessage>,
}

impl AdEventSink {
    pub(crate) fn new(tx: Sender<AdServiceMessage>) -> Self {
        Self { tx }
    }

    pub fn ads_manager_loaded(&self, manager: Box<dyn AdsManager>) {
        self.send(AdServiceMessage::AdsManagerLoaded(manager));
    }

    pub fn ad_event(&self, event: AdEventType) {
        self.send(AdServiceMessage::AdEvent(event));
    }

    pub fn ad_error(&self, error: AdRequestError) {
        self.send(AdServiceMessage::AdError(error));
    }

    fn send(&self, message: AdServiceMessage) {
        if self.tx.send(message).is_err() {
            log::debug!("Ad service message dropped, orchestrator is gone");
        }
    }
}

/// Playback capability the ad-decision service drives the ad session through.
pub trait VideoAdPlayer {
    fn play_ad(&mut self);
    fn load_ad(&mut self, url: &str);
    fn stop_ad(&mut self);
    fn pause_ad(&mut self);
    fn resume_ad(&mut self);
    fn add_callback(&mut self, callback: Arc<dyn VideoAdPlayerCallback>) -> CallbackHandle;
    /// Safe for handles that were never added.
    fn remove_callback(&mut self, handle: CallbackHandle) -> bool;
    fn get_progress(&self) -> ProgressSnapshot;
}

/// Progress snapshot shared between the orchestrator and service threads.
pub type SharedProgress = Arc<Mutex<ProgressSnapshot>>;

/// Thread-safe [`VideoAdPlayer`] handed to the ad-decision service.
///
/// Transport calls are queued and applied on the orchestrator's thread.
/// Callback registration and progress reads take effect immediately.
#[derive(Clone)]
pub struct AdPlayerHandle {
    commands: Sender<AdServiceMessage>,
    registry: CallbackRegistry,
    progress: SharedProgress,
}

impl AdPlayerHandle {
    pub(crate) fn new(
        commands: Sender<AdServiceMessage>,
        registry: CallbackRegistry,
        progress: SharedProgress,
    ) -> Self {
        Self {
            commands,
            registry,
            progress,
        }
    }

    fn send(&self, command: AdPlayerCommand) {
        if self.commands.send(AdServiceMessage::Player(command)).is_err() {
            log::debug!("Ad player command dropped, orchestrator is gone");
        }
    }
}

impl VideoAdPlayer for AdPlayerHandle {
    fn play_ad(&mut self) {
        self.send(AdPlayerCommand::PlayAd);
    }

    fn load_ad(&mut self, url: &str) {
        self.send(AdPlayerCommand::LoadAd(url.to_string()));
    }

    fn stop_ad(&mut self) {
        self.send(AdPlayerCommand::StopAd);
    }

    fn pause_ad(&mut self) {
        self.send(AdPlayerCommand::PauseAd);
    }

    fn resume_ad(&mut self) {
        self.send(AdPlayerCommand::ResumeAd);
    }

    fn add_callback(&mut self, callback: Arc<dyn VideoAdPlayerCallback>) -> CallbackHandle {
        self.registry.add(callback)
    }

    fn remove_callback(&mut self, handle: CallbackHandle) -> bool {
        self.registry.remove(handle)
    }

    fn get_progress(&self) -> ProgressSnapshot {
        *self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Where the ad service renders: the player capability plus its UI region.
#[derive(Clone)]
pub struct AdDisplayContainer {
    pub player: AdPlayerHandle,
    pub ui_region: RegionId,
}

pub struct AdsRequest {
    pub ad_tag_url: String,
    pub container: AdDisplayContainer,
    pub events: AdEventSink,
}
