// Rawkeys Hook Adapter
// Owns the active interception handle and its swallow policy

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{HookBackend, HookError, HookHandle, HookMode, HookResult, HookSink};
use crate::KeyStateTracker;

struct Installed {
    /// Shared with the sink; cleared under the tracker lock on stop
    live: Arc<AtomicBool>,
    /// `None` while lent out to `pump`
    handle: Option<Box<dyn HookHandle>>,
}

#[derive(Default)]
struct Slot {
    installed: Option<Installed>,
    /// Stopped handles still lent out to a `pump` call
    retiring: usize,
}

/// Owns at most one installed keyboard hook and routes its notifications
/// into a [`KeyStateTracker`].
///
/// All methods take `&self`, so the adapter can be shared with subscribers
/// that need to stop it.
pub struct HookAdapter {
    backend: Mutex<Box<dyn HookBackend>>,
    tracker: KeyStateTracker,
    intercept: Arc<AtomicBool>,
    run_in_background: AtomicBool,
    slot: Mutex<Slot>,
}

impl HookAdapter {
    pub fn new(backend: impl HookBackend + 'static, tracker: KeyStateTracker) -> Self {
        Self {
            backend: Mutex::new(Box::new(backend)),
            tracker,
            intercept: Arc::new(AtomicBool::new(false)),
            run_in_background: AtomicBool::new(false),
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Install the hook.
    ///
    /// With `run_in_background` the backend delivers notifications on its
    /// own thread. Otherwise they are delivered on the thread that calls
    /// [`pump`](Self::pump).
    ///
    /// # Errors
    /// `AlreadyRunning` if a hook is installed, `InstallationFailed` if the
    /// backend refuses. A hook stopped from a subscriber during `pump` still
    /// owns its resources until that `pump` returns; starting before then
    /// also fails with `InstallationFailed`. Either way the tracker keeps
    /// working and a later start may succeed.
    pub fn start(&self, run_in_background: bool) -> HookResult<()> {
        let mut slot = self.slot.lock();
        if slot.installed.is_some() {
            log::debug!("start rejected: hook already installed");
            return Err(HookError::AlreadyRunning);
        }
        if slot.retiring > 0 {
            log::warn!("start rejected: stopped hook is still being pumped");
            return Err(HookError::InstallationFailed(
                "previous hook is still being pumped".to_string(),
            ));
        }

        let mode = HookMode::from_background(run_in_background);
        let live = Arc::new(AtomicBool::new(true));
        let sink = HookSink::new(
            self.tracker.clone(),
            Arc::clone(&live),
            Arc::clone(&self.intercept),
        );

        let handle = match self.backend.lock().install(mode, sink) {
            Ok(handle) => handle,
            Err(e) => {
                live.store(false, Ordering::Release);
                log::warn!("keyboard hook installation failed: {}", e);
                return Err(match e {
                    HookError::InstallationFailed(_) => e,
                    other => HookError::InstallationFailed(other.to_string()),
                });
            }
        };

        self.run_in_background
            .store(run_in_background, Ordering::Release);
        slot.installed = Some(Installed {
            live,
            handle: Some(handle),
        });
        log::info!("keyboard hook installed ({:?})", mode);
        Ok(())
    }

    /// Remove the hook and forget all key state.
    ///
    /// Safe to call at any time, including from a subscriber running on the
    /// hook's own thread. Once this returns no further notifications reach
    /// the tracker or its subscribers. Does nothing when not running.
    pub fn stop(&self) {
        let mut installed = {
            let mut slot = self.slot.lock();
            let Some(installed) = slot.installed.take() else {
                return;
            };
            if installed.handle.is_none() {
                // pump() uninstalls it when it returns
                slot.retiring += 1;
                log::debug!("hook stopped while pumping");
            }
            installed
        };

        self.tracker.exclusive(|| {
            installed.live.store(false, Ordering::Release);
            self.tracker.clear();
        });

        if let Some(mut handle) = installed.handle.take() {
            handle.uninstall();
        }
        log::info!("keyboard hook removed");
    }

    pub fn is_running(&self) -> bool {
        self.slot.lock().installed.is_some()
    }

    /// Mode chosen by the last successful `start`
    pub fn run_in_background(&self) -> bool {
        self.run_in_background.load(Ordering::Acquire)
    }

    pub fn intercept_messages(&self) -> bool {
        self.intercept.load(Ordering::Acquire)
    }

    /// Swallow (`true`) or pass through (`false`) key notifications.
    ///
    /// Read on every notification, so it applies from the next raw event.
    pub fn set_intercept_messages(&self, intercept: bool) {
        self.intercept.store(intercept, Ordering::Release);
    }

    /// Deliver pending notifications of an in-context hook on this thread.
    ///
    /// Returns the number of key notifications dispatched; `Ok(0)` when not
    /// running or when the hook delivers on its own thread.
    pub fn pump(&self, timeout: Duration) -> HookResult<usize> {
        let (live, mut handle) = {
            let mut slot = self.slot.lock();
            let Some(current) = slot.installed.as_mut() else {
                return Ok(0);
            };
            // Already lent to an outer pump on this or another thread
            let Some(handle) = current.handle.take() else {
                return Ok(0);
            };
            (Arc::clone(&current.live), handle)
        };

        let result = handle.pump(timeout);

        let mut stale = {
            let mut slot = self.slot.lock();
            match slot.installed.as_mut() {
                Some(current) if Arc::ptr_eq(&current.live, &live) => {
                    current.handle = Some(handle);
                    return result;
                }
                _ => handle,
            }
        };
        stale.uninstall();
        {
            let mut slot = self.slot.lock();
            slot.retiring = slot.retiring.saturating_sub(1);
        }
        result
    }

    pub fn tracker(&self) -> &KeyStateTracker {
        &self.tracker
    }
}

impl Drop for HookAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for HookAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookAdapter")
            .field("running", &self.is_running())
            .field("run_in_background", &self.run_in_background())
            .field("intercept_messages", &self.intercept_messages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::{Disposition, ManualHook, RawEvent};
    use crate::{Action, Key};

    fn adapter() -> (HookAdapter, ManualHook) {
        let hook = ManualHook::new();
        (HookAdapter::new(hook.clone(), KeyStateTracker::new()), hook)
    }

    #[test]
    fn test_double_start_is_rejected() {
        let (adapter, _hook) = adapter();
        assert!(adapter.start(true).is_ok());
        assert!(matches!(adapter.start(true), Err(HookError::AlreadyRunning)));
        assert!(matches!(adapter.start(false), Err(HookError::AlreadyRunning)));
        assert!(adapter.is_running());

        adapter.stop();
        assert!(!adapter.is_running());
        assert!(adapter.start(true).is_ok());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (adapter, _hook) = adapter();
        adapter.stop();
        adapter.start(false).unwrap();
        adapter.stop();
        adapter.stop();
        assert!(!adapter.is_running());
    }

    #[test]
    fn test_stop_when_idle_leaves_tracker_alone() {
        let (adapter, _hook) = adapter();
        adapter.tracker().notify(Key::A, true);
        adapter.stop();
        assert!(adapter.tracker().any_key_down());
    }

    #[test]
    fn test_installation_failure_is_distinct() {
        let (adapter, hook) = adapter();
        hook.refuse_next_install();

        let err = adapter.start(true).unwrap_err();
        assert!(matches!(err, HookError::InstallationFailed(_)));
        assert!(!adapter.is_running());
        assert!(!adapter.tracker().is_down(Key::A));

        assert!(adapter.start(true).is_ok());
    }

    #[test]
    fn test_mode_follows_start_argument() {
        let (adapter, hook) = adapter();
        adapter.start(false).unwrap();
        assert!(!adapter.run_in_background());
        assert_eq!(hook.mode(), Some(HookMode::InContext));
        adapter.stop();

        adapter.start(true).unwrap();
        assert!(adapter.run_in_background());
        assert_eq!(hook.mode(), Some(HookMode::Background));
    }

    #[test]
    fn test_stop_clears_state_and_uninstalls() {
        let (adapter, hook) = adapter();
        adapter.start(true).unwrap();
        hook.press(Key::A);
        adapter.tracker().advance_frame();
        assert!(adapter.tracker().is_down(Key::A));

        adapter.stop();
        assert!(!hook.is_installed());
        assert!(!adapter.tracker().any_key_down());
        assert!(!adapter.tracker().is_down(Key::A));
        assert_eq!(hook.press(Key::A), None);
    }

    #[test]
    fn test_intercept_flag_changes_while_running() {
        let (adapter, hook) = adapter();
        adapter.start(true).unwrap();

        assert_eq!(hook.press(Key::A), Some(Disposition::PassThrough));
        adapter.set_intercept_messages(true);
        assert_eq!(hook.release(Key::A), Some(Disposition::Swallow));
        assert_eq!(
            hook.send(RawEvent::advisory(-1)),
            Some(Disposition::PassThrough)
        );
        adapter.set_intercept_messages(false);
        assert_eq!(
            hook.send(RawEvent::key(Key::S, Action::Press)),
            Some(Disposition::PassThrough)
        );
    }

    #[test]
    fn test_pump_without_hook_is_noop() {
        let (adapter, _hook) = adapter();
        assert_eq!(adapter.pump(Duration::ZERO).unwrap(), 0);
        adapter.start(false).unwrap();
        assert_eq!(adapter.pump(Duration::ZERO).unwrap(), 0);
        assert!(adapter.is_running());
    }

    #[test]
    fn test_restart_waits_for_pumped_handle() {
        let (adapter, hook) = adapter();
        let adapter = Arc::new(adapter);
        let restarts = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&adapter);
        let r = Arc::clone(&restarts);
        adapter.tracker().on_key_down(move |_| {
            if let Some(adapter) = weak.upgrade() {
                adapter.stop();
                r.lock().push(adapter.start(false).map_err(|e| e.to_string()));
            }
        });

        adapter.start(false).unwrap();
        hook.post(RawEvent::key(Key::ESC, Action::Press));
        assert_eq!(adapter.pump(Duration::ZERO).unwrap(), 1);

        let restarts = restarts.lock().clone();
        assert_eq!(restarts.len(), 1);
        assert!(restarts[0].is_err());
        assert!(!adapter.is_running());
        assert!(!hook.is_installed());

        adapter.start(false).unwrap();
        assert!(hook.is_installed());
    }
}
