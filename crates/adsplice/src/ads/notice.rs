use std::time::{Duration, Instant};

/// Transient, dismissible message for the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub created: Instant,
    pub duration: Duration,
}

impl Notice {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) >= self.duration
    }
}

#[derive(Debug, Default)]
pub struct NoticeQueue {
    notices: Vec<Notice>,
}

impl NoticeQueue {
    pub fn push(&mut self, message: impl Into<String>, now: Instant, duration: Duration) {
        let message = message.into();
        log::info!("Notice: {message}");
        self.notices.push(Notice {
            message,
            created: now,
            duration,
        });
    }

    /// Notices still on screen at `now`. Expired ones are dropped.
    pub fn active(&mut self, now: Instant) -> &[Notice] {
        self.notices.retain(|n| !n.is_expired(now));
        &self.notices
    }

    /// Take every queued notice, expired or not.
    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn dismiss_all(&mut self) {
        self.notices.clear();
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}
