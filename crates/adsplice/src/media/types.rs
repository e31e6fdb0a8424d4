use serde::{Deserialize, Serialize};

/// Streaming format of a video, used to pick a renderer builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoType {
    Dash,
    Hls,
    Mp4,
    Other,
}

impl VideoType {
    pub fn display_name(&self) -> &'static str {
        match self {
            VideoType::Dash => "DASH",
            VideoType::Hls => "HLS",
            VideoType::Mp4 => "MP4",
            VideoType::Other => "other",
        }
    }
}

/// A media locator the engine can play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub url: String,
    pub video_type: VideoType,
    /// Content id for DRM-protected DASH streams.
    #[serde(default)]
    pub content_id: Option<String>,
}

impl Video {
    pub fn new(url: impl Into<String>, video_type: VideoType) -> Self {
        Self {
            url: url.into(),
            video_type,
            content_id: None,
        }
    }

    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }
}

/// Transport state of a playback session.
///
/// Ordered so that `state >= TransportState::Preparing` reads as
/// "position and duration are meaningful".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportState {
    Idle,
    Preparing,
    Buffering,
    Ready,
    Ended,
}

impl TransportState {
    /// Translate the engine's integer state code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(TransportState::Idle),
            2 => Some(TransportState::Preparing),
            3 => Some(TransportState::Buffering),
            4 => Some(TransportState::Ready),
            5 => Some(TransportState::Ended),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            TransportState::Idle => 1,
            TransportState::Preparing => 2,
            TransportState::Buffering => 3,
            TransportState::Ready => 4,
            TransportState::Ended => 5,
        }
    }

    pub fn has_timeline(&self) -> bool {
        *self >= TransportState::Preparing
    }

    /// Whether transport commands (play/pause/seek) are honoured.
    pub fn is_controllable(&self) -> bool {
        matches!(
            self,
            TransportState::Buffering | TransportState::Ready | TransportState::Ended
        )
    }
}

/// Position of the active session as seen by one progress poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSnapshot {
    NotReady,
    At {
        current_ms: u64,
        duration_ms: Option<u64>,
    },
}

impl ProgressSnapshot {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProgressSnapshot::At { .. })
    }

    pub fn current_ms(&self) -> Option<u64> {
        match self {
            ProgressSnapshot::NotReady => None,
            ProgressSnapshot::At { current_ms, .. } => Some(*current_ms),
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match self {
            ProgressSnapshot::NotReady => None,
            ProgressSnapshot::At { duration_ms, .. } => *duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_round_trip_engine_constants() {
        for state in [
            TransportState::Idle,
            TransportState::Preparing,
            TransportState::Buffering,
            TransportState::Ready,
            TransportState::Ended,
        ] {
            assert_eq!(TransportState::from_code(state.code()), Some(state));
        }
        assert_eq!(TransportState::from_code(0), None);
        assert_eq!(TransportState::from_code(42), None);
    }

    #[test]
    fn timeline_is_meaningful_from_preparing() {
        assert!(!TransportState::Idle.has_timeline());
        assert!(TransportState::Preparing.has_timeline());
        assert!(TransportState::Ended.has_timeline());
    }

    #[test]
    fn preparing_is_not_controllable() {
        assert!(!TransportState::Preparing.is_controllable());
        assert!(TransportState::Buffering.is_controllable());
        assert!(TransportState::Ready.is_controllable());
    }

    #[test]
    fn not_ready_snapshot_has_no_time() {
        assert_eq!(ProgressSnapshot::NotReady.current_ms(), None);
        assert!(!ProgressSnapshot::NotReady.is_ready());
        let at = ProgressSnapshot::At {
            current_ms: 1000,
            duration_ms: Some(30_000),
        };
        assert_eq!(at.current_ms(), Some(1000));
        assert_eq!(at.duration_ms(), Some(30_000));
    }

    #[test]
    fn video_builder_sets_content_id() {
        let v = Video::new("https://example.com/a.mpd", VideoType::Dash).with_content_id("bbb");
        assert_eq!(v.content_id.as_deref(), Some("bbb"));
        assert_eq!(v.video_type.display_name(), "DASH");
    }
}
