use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;

use crate::error::AdRequestError;

/// Ad lifecycle events emitted by the ad-decision service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdEventType {
    Loaded,
    ContentPauseRequested,
    ContentResumeRequested,
    Started,
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    Completed,
    AllAdsCompleted,
    Skipped,
    Clicked,
    Paused,
    Resumed,
}

/// Observer registered by the ad-decision service on the ad player.
///
/// Hooks default to no-ops so implementors only override what they watch.
pub trait VideoAdPlayerCallback: Send + Sync {
    /// Ad session started.
    fn on_play(&self) {}
    /// Content paused for an ad break.
    fn on_pause(&self) {}
    /// Content resumed after an ad break.
    fn on_resume(&self) {}
    /// Ad session reached the end of its media.
    fn on_ended(&self) {}
    fn on_error(&self, _error: &AdRequestError) {}
}

/// Stable handle to a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

/// One notification fanned out by [`CallbackRegistry::notify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackHook {
    Play,
    Pause,
    Resume,
    Ended,
    Error(AdRequestError),
}

#[derive(Default)]
struct RegistryInner {
    next: u64,
    callbacks: FxHashMap<u64, Arc<dyn VideoAdPlayerCallback>>,
}

/// Set of [`VideoAdPlayerCallback`]s, shareable across threads.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, callback: Arc<dyn VideoAdPlayerCallback>) -> CallbackHandle {
        let mut inner = self.lock();
        let id = inner.next;
        inner.next += 1;
        inner.callbacks.insert(id, callback);
        CallbackHandle(id)
    }

    /// Returns false if the handle was never added or is already removed.
    pub fn remove(&self, handle: CallbackHandle) -> bool {
        self.lock().callbacks.remove(&handle.0).is_some()
    }

    /// Remove every registration of this exact callback object.
    pub fn remove_callback(&self, callback: &Arc<dyn VideoAdPlayerCallback>) -> bool {
        let mut inner = self.lock();
        let before = inner.callbacks.len();
        inner.callbacks.retain(|_, cb| !Arc::ptr_eq(cb, callback));
        inner.callbacks.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().callbacks.is_empty()
    }

    /// Deliver `hook` once to each callback registered at call time.
    pub fn notify(&self, hook: &CallbackHook) {
        // Snapshot so callbacks may add/remove without deadlocking.
        let callbacks: Vec<Arc<dyn VideoAdPlayerCallback>> =
            self.lock().callbacks.values().cloned().collect();
        for cb in callbacks {
            match hook {
                CallbackHook::Play => cb.on_play(),
                CallbackHook::Pause => cb.on_pause(),
                CallbackHook::Resume => cb.on_resume(),
                CallbackHook::Ended => cb.on_ended(),
                CallbackHook::Error(e) => cb.on_error(e),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every hook it receives, in order.
    #[derive(Default)]
    pub(crate) struct RecordingCallback {
        pub hooks: Mutex<Vec<CallbackHook>>,
    }

    impl RecordingCallback {
        pub(crate) fn hooks(&self) -> Vec<CallbackHook> {
            self.hooks.lock().expect("lock").clone()
        }

        pub(crate) fn count(&self, hook: &CallbackHook) -> usize {
            self.hooks().iter().filter(|h| *h == hook).count()
        }
    }

    impl VideoAdPlayerCallback for RecordingCallback {
        fn on_play(&self) {
            self.hooks.lock().expect("lock").push(CallbackHook::Play);
        }
        fn on_pause(&self) {
            self.hooks.lock().expect("lock").push(CallbackHook::Pause);
        }
        fn on_resume(&self) {
            self.hooks.lock().expect("lock").push(CallbackHook::Resume);
        }
        fn on_ended(&self) {
            self.hooks.lock().expect("lock").push(CallbackHook::Ended);
        }
        fn on_error(&self, error: &AdRequestError) {
            self.hooks
                .lock()
                .expect("lock")
                .push(CallbackHook::Error(error.clone()));
        }
    }

    #[test]
    fn notify_reaches_each_callback_once() {
        let registry = CallbackRegistry::new();
        let a = Arc::new(RecordingCallback::default());
        let b = Arc::new(RecordingCallback::default());
        registry.add(a.clone());
        registry.add(b.clone());
        registry.notify(&CallbackHook::Play);
        assert_eq!(a.hooks(), vec![CallbackHook::Play]);
        assert_eq!(b.hooks(), vec![CallbackHook::Play]);
    }

    #[test]
    fn remove_is_safe_for_unknown_handles() {
        let registry = CallbackRegistry::new();
        let handle = registry.add(Arc::new(RecordingCallback::default()));
        assert!(registry.remove(handle));
        assert!(!registry.remove(handle));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_callback_matches_identity() {
        let registry = CallbackRegistry::new();
        let a: Arc<dyn VideoAdPlayerCallback> = Arc::new(RecordingCallback::default());
        let b: Arc<dyn VideoAdPlayerCallback> = Arc::new(RecordingCallback::default());
        registry.add(a.clone());
        registry.add(a.clone());
        registry.add(b.clone());
        assert!(registry.remove_callback(&a));
        assert_eq!(registry.len(), 1);
        let never_added: Arc<dyn VideoAdPlayerCallback> = Arc::new(RecordingCallback::default());
        assert!(!registry.remove_callback(&never_added));
    }

    #[test]
    fn callbacks_may_unregister_during_notify() {
        struct SelfRemoving {
            registry: CallbackRegistry,
            handle: Mutex<Option<CallbackHandle>>,
        }
        impl VideoAdPlayerCallback for SelfRemoving {
            fn on_ended(&self) {
                if let Some(h) = self.handle.lock().expect("lock").take() {
                    self.registry.remove(h);
                }
            }
        }
        let registry = CallbackRegistry::new();
        let cb = Arc::new(SelfRemoving {
            registry: registry.clone(),
            handle: Mutex::new(None),
        });
        let handle = registry.add(cb.clone());
        *cb.handle.lock().expect("lock") = Some(handle);
        registry.notify(&CallbackHook::Ended);
        assert!(registry.is_empty());
    }
}
