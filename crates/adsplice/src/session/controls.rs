use std::sync::Arc;
use std::time::Duration;

/// Notified when the viewer toggles fullscreen from a session's chrome.
pub trait FullscreenCallback: Send + Sync {
    fn on_go_to_fullscreen(&self);
    fn on_return_from_fullscreen(&self);
}

/// Observer of transport commands issued through a session.
pub trait ControlObserver: Send + Sync {
    fn on_play(&self) {}
    fn on_pause(&self) {}
}

/// Extra button shown in the session chrome.
pub struct ActionButton {
    pub icon: String,
    pub label: String,
    pub on_click: Box<dyn Fn() + Send + Sync>,
}

impl ActionButton {
    pub fn new(
        icon: impl Into<String>,
        label: impl Into<String>,
        on_click: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            icon: icon.into(),
            label: label.into(),
            on_click: Box::new(on_click),
        }
    }
}

/// Chrome state of one playback session: seekbar, title bar, buttons.
pub struct PlaybackControls {
    pub title: String,
    can_seek: bool,
    visible: bool,
    top_chrome_visible: bool,
    seekbar_color: Option<u32>,
    fullscreen: bool,
    fullscreen_callback: Option<Arc<dyn FullscreenCallback>>,
    action_buttons: Vec<ActionButton>,
    observers: Vec<Arc<dyn ControlObserver>>,
    showing_pause: bool,
    timeout: Duration,
}

impl PlaybackControls {
    pub fn new(timeout: Duration) -> Self {
        Self {
            title: String::new(),
            can_seek: true,
            visible: true,
            top_chrome_visible: true,
            seekbar_color: None,
            fullscreen: false,
            fullscreen_callback: None,
            action_buttons: Vec::new(),
            observers: Vec::new(),
            showing_pause: false,
            timeout,
        }
    }

    pub fn can_seek(&self) -> bool {
        self.can_seek
    }

    pub fn set_can_seek(&mut self, can_seek: bool) {
        self.can_seek = can_seek;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn top_chrome_visible(&self) -> bool {
        self.top_chrome_visible
    }

    pub fn hide_top_chrome(&mut self) {
        self.top_chrome_visible = false;
    }

    pub fn show_top_chrome(&mut self) {
        self.top_chrome_visible = true;
    }

    pub fn seekbar_color(&self) -> Option<u32> {
        self.seekbar_color
    }

    pub fn set_seekbar_color(&mut self, argb: u32) {
        self.seekbar_color = Some(argb);
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Viewer-initiated toggle. Fires the fullscreen callback.
    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        if self.fullscreen == fullscreen {
            return;
        }
        self.fullscreen = fullscreen;
        if let Some(cb) = &self.fullscreen_callback {
            if fullscreen {
                cb.on_go_to_fullscreen();
            } else {
                cb.on_return_from_fullscreen();
            }
        }
    }

    /// Adopt another session's fullscreen flag without notifying anyone.
    pub fn sync_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }

    pub fn set_fullscreen_callback(&mut self, callback: Option<Arc<dyn FullscreenCallback>>) {
        self.fullscreen_callback = callback;
    }

    pub fn has_fullscreen_callback(&self) -> bool {
        self.fullscreen_callback.is_some()
    }

    pub fn add_action_button(&mut self, button: ActionButton) {
        self.action_buttons.push(button);
    }

    pub fn action_buttons(&self) -> &[ActionButton] {
        &self.action_buttons
    }

    /// Returns false if no button has that label.
    pub fn trigger_action(&self, label: &str) -> bool {
        match self.action_buttons.iter().find(|b| b.label == label) {
            Some(button) => {
                (button.on_click)();
                true
            }
            None => false,
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ControlObserver>) {
        self.observers.push(observer);
    }

    /// Whether the play/pause button currently shows "pause".
    pub fn showing_pause(&self) -> bool {
        self.showing_pause
    }

    pub(crate) fn notify_play(&mut self) {
        self.showing_pause = true;
        for observer in &self.observers {
            observer.on_play();
        }
    }

    pub(crate) fn notify_pause(&mut self) {
        self.showing_pause = false;
        for observer in &self.observers {
            observer.on_pause();
        }
    }
}

/// Format a position as `MM:SS`, or `H:MM:SS` past the hour.
pub fn string_for_time(time_ms: u64) -> String {
    let total_seconds = time_ms / 1000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingFullscreen {
        calls: Mutex<Vec<bool>>,
    }

    impl FullscreenCallback for RecordingFullscreen {
        fn on_go_to_fullscreen(&self) {
            self.calls.lock().expect("lock").push(true);
        }
        fn on_return_from_fullscreen(&self) {
            self.calls.lock().expect("lock").push(false);
        }
    }

    #[test]
    fn formats_times() {
        assert_eq!(string_for_time(0), "00:00");
        assert_eq!(string_for_time(65_500), "01:05");
        assert_eq!(string_for_time(3_725_000), "1:02:05");
    }

    #[test]
    fn set_fullscreen_fires_callback_once_per_change() {
        let cb = Arc::new(RecordingFullscreen::default());
        let mut controls = PlaybackControls::new(Duration::from_secs(3));
        controls.set_fullscreen_callback(Some(cb.clone()));
        controls.set_fullscreen(true);
        controls.set_fullscreen(true);
        controls.set_fullscreen(false);
        assert_eq!(*cb.calls.lock().expect("lock"), vec![true, false]);
    }

    #[test]
    fn sync_fullscreen_is_silent() {
        let cb = Arc::new(RecordingFullscreen::default());
        let mut controls = PlaybackControls::new(Duration::from_secs(3));
        controls.set_fullscreen_callback(Some(cb.clone()));
        controls.sync_fullscreen(true);
        assert!(controls.is_fullscreen());
        assert!(cb.calls.lock().expect("lock").is_empty());
    }

    #[test]
    fn action_buttons_trigger_by_label() {
        let clicks = Arc::new(AtomicU32::new(0));
        let mut controls = PlaybackControls::new(Duration::from_secs(3));
        let counter = clicks.clone();
        controls.add_action_button(ActionButton::new("share", "Share", move || {
            counter.fetch_add(1, Ordering::Relaxed);
        }));
        assert!(controls.trigger_action("Share"));
        assert!(!controls.trigger_action("Missing"));
        assert_eq!(clicks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn observers_see_play_and_pause() {
        #[derive(Default)]
        struct Count(AtomicU32, AtomicU32);
        impl ControlObserver for Count {
            fn on_play(&self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
            fn on_pause(&self) {
                self.1.fetch_add(1, Ordering::Relaxed);
            }
        }
        let count = Arc::new(Count::default());
        let mut controls = PlaybackControls::new(Duration::from_secs(3));
        controls.add_observer(count.clone());
        controls.notify_play();
        assert!(controls.showing_pause());
        controls.notify_pause();
        assert_eq!(
            (count.0.load(Ordering::Relaxed), count.1.load(Ordering::Relaxed)),
            (1, 1)
        );
    }
}
