use crate::media::types::ProgressSnapshot;
use crate::session::{PlaybackSession, SessionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    NoActiveSession,
    Tracking {
        kind: SessionKind,
        last: ProgressSnapshot,
    },
}

/// Per-tick progress poll with ad stall recovery.
///
/// An ad that should be playing but reports the same position on two
/// consecutive ticks is assumed wedged in buffering and gets a pause then
/// play. The comparison baseline is scoped to the session kind, so switching
/// between content and ad starts a fresh baseline.
pub struct ProgressReconciler {
    state: ReconcilerState,
    stall_recoveries: u64,
}

impl Default for ProgressReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReconciler {
    pub fn new() -> Self {
        Self {
            state: ReconcilerState::NoActiveSession,
            stall_recoveries: 0,
        }
    }

    pub fn state(&self) -> ReconcilerState {
        self.state
    }

    pub fn stall_recoveries(&self) -> u64 {
        self.stall_recoveries
    }

    /// Poll the active session. The ad session wins if both are given.
    pub fn tick(
        &mut self,
        ad: Option<&mut PlaybackSession>,
        content: Option<&PlaybackSession>,
    ) -> ProgressSnapshot {
        let (kind, snapshot) = match (ad, content) {
            (Some(ad), _) => {
                let snapshot = ad.progress();
                if self.is_stalled(SessionKind::Ad, snapshot) && ad.should_be_playing() {
                    self.stall_recoveries += 1;
                    log::debug!(
                        "Ad stalled at {:?}ms, forcing pause/play",
                        snapshot.current_ms()
                    );
                    ad.pause();
                    ad.play();
                }
                (SessionKind::Ad, snapshot)
            }
            (None, Some(content)) => (SessionKind::Content, content.progress()),
            (None, None) => {
                self.state = ReconcilerState::NoActiveSession;
                return ProgressSnapshot::NotReady;
            }
        };

        self.state = ReconcilerState::Tracking {
            kind,
            last: snapshot,
        };
        snapshot
    }

    pub fn reset(&mut self) {
        self.state = ReconcilerState::NoActiveSession;
    }

    fn is_stalled(&self, kind: SessionKind, snapshot: ProgressSnapshot) -> bool {
        let ReconcilerState::Tracking {
            kind: last_kind,
            last,
        } = self.state
        else {
            return false;
        };
        kind == SessionKind::Ad
            && last_kind == kind
            && snapshot.is_ready()
            && snapshot.current_ms() == last.current_ms()
    }
}
