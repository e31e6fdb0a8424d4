use crate::session::PlaybackSession;
use crate::surface::SurfaceStack;

/// Pauses and hides the content session around ad breaks.
///
/// Content is never released here, so it resumes from where it paused.
pub struct ContentVisibilityController {
    session: PlaybackSession,
    hidden: bool,
}

impl ContentVisibilityController {
    pub fn new(session: PlaybackSession) -> Self {
        Self {
            session,
            hidden: false,
        }
    }

    pub fn hide(&mut self, stack: &mut SurfaceStack) {
        self.session.pause();
        self.session.hide(stack);
        self.hidden = true;
        log::debug!("Content hidden at {:?}ms", self.session.position_ms());
    }

    pub fn show(&mut self, stack: &mut SurfaceStack) {
        self.session.show(stack);
        self.session.play();
        self.hidden = false;
        log::debug!("Content shown at {:?}ms", self.session.position_ms());
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PlaybackSession {
        &mut self.session
    }
}
