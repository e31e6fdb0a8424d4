//! Ad insertion: splicing a temporary ad session over the content session.

pub mod ad_session;
pub mod content;
pub mod notice;
pub mod orchestrator;
pub mod progress;
pub mod service;
pub mod types;

pub use orchestrator::{ActiveSession, AdOrchestrator, AdState};
pub use service::{
    AdDisplayContainer, AdEventSink, AdPlayerHandle, AdsLoader, AdsManager, AdsRequest,
    VideoAdPlayer,
};
pub use types::{AdEventType, CallbackHandle, VideoAdPlayerCallback};
