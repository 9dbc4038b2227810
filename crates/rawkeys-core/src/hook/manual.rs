// Rawkeys Manual Hook
// In-process notification source for tests and hosts without a native hook

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::{Disposition, HookBackend, HookError, HookHandle, HookMode, HookResult, HookSink, RawEvent};
use crate::{Action, Key};

#[derive(Default)]
struct ManualState {
    sink: Option<HookSink>,
    mode: Option<HookMode>,
    refuse_next: bool,
    /// Bumped by every install; handles of older installs are inert
    generation: u64,
    /// Events waiting for the host to pump an in-context hook
    queued: VecDeque<RawEvent>,
    /// Dispositions of pumped events, oldest first
    outcomes: Vec<(RawEvent, Disposition)>,
}

/// A hook backend fed by the host instead of the operating system.
///
/// Clones share the same state: keep one clone as the controller and hand
/// another to [`HookAdapter`](super::HookAdapter). Events passed to
/// [`send`](Self::send) are delivered synchronously on the calling thread,
/// which plays the role of the platform's callback context.
#[derive(Clone, Default)]
pub struct ManualHook {
    shared: Arc<Mutex<ManualState>>,
}

impl ManualHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `install` fail, as if the platform refused the handle
    pub fn refuse_next_install(&self) {
        self.shared.lock().refuse_next = true;
    }

    pub fn is_installed(&self) -> bool {
        self.shared.lock().sink.is_some()
    }

    /// Mode of the installed hook, if any
    pub fn mode(&self) -> Option<HookMode> {
        self.shared.lock().mode
    }

    /// Deliver a raw notification now.
    ///
    /// Returns `None` when no hook is installed.
    pub fn send(&self, event: RawEvent) -> Option<Disposition> {
        // Never hold our lock while subscribers run; they may stop the hook
        let sink = self.shared.lock().sink.clone()?;
        Some(sink.dispatch(event))
    }

    pub fn press(&self, key: Key) -> Option<Disposition> {
        self.send(RawEvent::key(key, Action::Press))
    }

    pub fn repeat(&self, key: Key) -> Option<Disposition> {
        self.send(RawEvent::key(key, Action::Repeat))
    }

    pub fn release(&self, key: Key) -> Option<Disposition> {
        self.send(RawEvent::key(key, Action::Release))
    }

    /// Post a notification to the hook's message context.
    ///
    /// In-context hooks deliver it on the next pump; background hooks
    /// deliver it immediately. Either way the disposition is recorded for
    /// [`take_outcomes`](Self::take_outcomes). Returns false when no hook
    /// is installed.
    pub fn post(&self, event: RawEvent) -> bool {
        let sink = {
            let mut state = self.shared.lock();
            match (state.mode, state.sink.clone()) {
                (Some(HookMode::InContext), Some(_)) => {
                    state.queued.push_back(event);
                    return true;
                }
                (Some(HookMode::Background), Some(sink)) => sink,
                _ => return false,
            }
        };
        let disposition = sink.dispatch(event);
        self.shared.lock().outcomes.push((event, disposition));
        true
    }

    /// Number of posted events not yet pumped
    pub fn pending(&self) -> usize {
        self.shared.lock().queued.len()
    }

    pub fn take_outcomes(&self) -> Vec<(RawEvent, Disposition)> {
        std::mem::take(&mut self.shared.lock().outcomes)
    }
}

impl HookBackend for ManualHook {
    fn install(&mut self, mode: HookMode, sink: HookSink) -> HookResult<Box<dyn HookHandle>> {
        let mut state = self.shared.lock();
        if std::mem::take(&mut state.refuse_next) {
            return Err(HookError::InstallationFailed(
                "manual hook refused installation".to_string(),
            ));
        }
        state.generation += 1;
        state.sink = Some(sink);
        state.mode = Some(mode);
        state.queued.clear();
        Ok(Box::new(ManualHandle {
            shared: Arc::clone(&self.shared),
            generation: state.generation,
        }))
    }
}

struct ManualHandle {
    shared: Arc<Mutex<ManualState>>,
    generation: u64,
}

impl HookHandle for ManualHandle {
    fn pump(&mut self, _timeout: Duration) -> HookResult<usize> {
        let (sink, events) = {
            let mut state = self.shared.lock();
            if state.generation != self.generation {
                return Ok(0);
            }
            let Some(sink) = state.sink.clone() else {
                return Ok(0);
            };
            (sink, std::mem::take(&mut state.queued))
        };

        let mut delivered = 0;
        for event in events {
            // A subscriber may have stopped the hook mid-batch
            if !sink.is_live() {
                break;
            }
            if event.translate().is_some() {
                delivered += 1;
            }
            let disposition = sink.dispatch(event);
            self.shared.lock().outcomes.push((event, disposition));
        }
        Ok(delivered)
    }

    fn uninstall(&mut self) {
        let mut state = self.shared.lock();
        if state.generation != self.generation {
            return;
        }
        state.sink = None;
        state.mode = None;
        state.queued.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::HookAdapter;
    use crate::KeyStateTracker;

    #[test]
    fn test_send_without_install_returns_none() {
        let hook = ManualHook::new();
        assert!(!hook.is_installed());
        assert_eq!(hook.press(Key::A), None);
        assert!(!hook.post(RawEvent::key(Key::A, Action::Press)));
    }

    #[test]
    fn test_refusal_applies_once() {
        let hook = ManualHook::new();
        let adapter = HookAdapter::new(hook.clone(), KeyStateTracker::new());
        hook.refuse_next_install();
        assert!(adapter.start(true).is_err());
        assert!(!hook.is_installed());
        assert!(adapter.start(true).is_ok());
        assert!(hook.is_installed());
    }

    #[test]
    fn test_in_context_events_wait_for_pump() {
        let hook = ManualHook::new();
        let adapter = HookAdapter::new(hook.clone(), KeyStateTracker::new());
        adapter.start(false).unwrap();

        assert!(hook.post(RawEvent::key(Key::A, Action::Press)));
        assert!(hook.post(RawEvent::advisory(-1)));
        assert_eq!(hook.pending(), 2);
        assert!(!adapter.tracker().any_key_down());

        assert_eq!(adapter.pump(Duration::ZERO).unwrap(), 1);
        assert_eq!(hook.pending(), 0);
        assert!(adapter.tracker().any_key_down());

        let outcomes = hook.take_outcomes();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|(_, d)| *d == Disposition::PassThrough));
    }

    #[test]
    fn test_background_post_delivers_immediately() {
        let hook = ManualHook::new();
        let adapter = HookAdapter::new(hook.clone(), KeyStateTracker::new());
        adapter.set_intercept_messages(true);
        adapter.start(true).unwrap();

        assert!(hook.post(RawEvent::key(Key::A, Action::Press)));
        assert_eq!(hook.pending(), 0);
        assert!(adapter.tracker().any_key_down());
        assert_eq!(
            hook.take_outcomes(),
            vec![(RawEvent::key(Key::A, Action::Press), Disposition::Swallow)]
        );
    }

    #[test]
    fn test_uninstall_drops_queued_events() {
        let hook = ManualHook::new();
        let adapter = HookAdapter::new(hook.clone(), KeyStateTracker::new());
        adapter.start(false).unwrap();
        hook.post(RawEvent::key(Key::A, Action::Press));

        adapter.stop();
        assert_eq!(hook.pending(), 0);
        assert_eq!(hook.mode(), None);
    }

    #[test]
    fn test_stale_handle_leaves_newer_install_alone() {
        let mut hook = ManualHook::new();
        let tracker = KeyStateTracker::new();
        let sink = || {
            HookSink::new(
                tracker.clone(),
                Arc::new(std::sync::atomic::AtomicBool::new(true)),
                Arc::new(std::sync::atomic::AtomicBool::new(false)),
            )
        };

        let mut old = hook.install(HookMode::InContext, sink()).unwrap();
        let mut current = hook.install(HookMode::InContext, sink()).unwrap();
        hook.post(RawEvent::key(Key::A, Action::Press));

        assert_eq!(old.pump(Duration::ZERO).unwrap(), 0);
        old.uninstall();
        assert!(hook.is_installed());
        assert_eq!(hook.pending(), 1);

        assert_eq!(current.pump(Duration::ZERO).unwrap(), 1);
        assert!(tracker.any_key_down());
        current.uninstall();
        assert!(!hook.is_installed());
    }
}
