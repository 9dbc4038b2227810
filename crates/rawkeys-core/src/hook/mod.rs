// Rawkeys Hook Layer
// Platform interception handles and the raw-notification callback contract

mod adapter;
#[cfg(feature = "evdev")]
pub mod linux;
mod manual;

pub use adapter::HookAdapter;
pub use manual::ManualHook;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::input::{is_key_event, EV_KEY};
use crate::{Action, Key, KeyStateTracker};

/// Result type for hook operations
pub type HookResult<T> = Result<T, HookError>;

/// Errors that can occur while installing or driving a hook
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("keyboard hook is already running")]
    AlreadyRunning,

    #[error("failed to install keyboard hook: {0}")]
    InstallationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a hook delivers its notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookMode {
    /// Notifications arrive on a backend-owned thread, even when the host
    /// is not looking for input.
    Background,
    /// Notifications arrive on the host thread that calls
    /// [`HookAdapter::pump`].
    InContext,
}

impl HookMode {
    pub fn from_background(run_in_background: bool) -> Self {
        if run_in_background {
            HookMode::Background
        } else {
            HookMode::InContext
        }
    }
}

/// What the hook tells the platform to do with a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the event on to the next consumer
    PassThrough,
    /// Stop the event here
    Swallow,
}

/// A raw notification as handed over by the platform.
///
/// A negative `code` marks an advisory notification that carries no key
/// event. `kind` is the event type (`EV_KEY` for keys) and `value` the
/// action encoding of [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub code: i32,
    pub kind: u16,
    pub key_code: u16,
    pub value: i32,
}

impl RawEvent {
    /// A key notification
    pub fn key(key: Key, action: Action) -> Self {
        Self {
            code: 0,
            kind: EV_KEY,
            key_code: key.code(),
            value: action.to_i32(),
        }
    }

    /// An advisory notification with a negative code
    pub fn advisory(code: i32) -> Self {
        Self {
            code: code.min(-1),
            kind: 0,
            key_code: 0,
            value: 0,
        }
    }

    /// Translate into the `(key, pressed)` pair the tracker consumes.
    ///
    /// Returns `None` for anything that must pass through untouched:
    /// advisory codes, non-key events and unknown action values.
    pub fn translate(&self) -> Option<(Key, bool)> {
        if self.code < 0 || !is_key_event(self.kind) {
            return None;
        }
        let action = Action::from_i32(self.value)?;
        Some((Key::from(self.key_code), action.is_pressed()))
    }
}

/// Entry point a backend calls for every raw notification.
///
/// Cheap to clone; backends hand clones to their polling threads.
#[derive(Clone)]
pub struct HookSink {
    tracker: KeyStateTracker,
    live: Arc<AtomicBool>,
    intercept: Arc<AtomicBool>,
}

impl HookSink {
    pub(crate) fn new(
        tracker: KeyStateTracker,
        live: Arc<AtomicBool>,
        intercept: Arc<AtomicBool>,
    ) -> Self {
        Self {
            tracker,
            live,
            intercept,
        }
    }

    /// Whether the hook this sink belongs to is still installed
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Process one notification and decide whether it propagates.
    ///
    /// Subscribers have run by the time this returns. Notifications reaching
    /// a stopped hook are passed through without touching state.
    pub fn dispatch(&self, event: RawEvent) -> Disposition {
        let Some((key, pressed)) = event.translate() else {
            return Disposition::PassThrough;
        };

        let delivered = self.tracker.exclusive(|| {
            if !self.is_live() {
                return false;
            }
            self.tracker.notify(key, pressed);
            true
        });
        if !delivered {
            log::debug!("dropping {} after hook stop", key);
            return Disposition::PassThrough;
        }

        if self.intercept.load(Ordering::Acquire) {
            Disposition::Swallow
        } else {
            Disposition::PassThrough
        }
    }
}

/// A source of raw keyboard notifications (the platform hook API).
pub trait HookBackend: Send {
    /// Install an interception handle that reports into `sink`.
    fn install(&mut self, mode: HookMode, sink: HookSink) -> HookResult<Box<dyn HookHandle>>;
}

/// An installed interception handle
pub trait HookHandle: Send {
    /// Deliver pending notifications on the calling thread, waiting up to
    /// `timeout` for the first one. Returns how many key notifications were
    /// dispatched. Handles that deliver on their own thread return `Ok(0)`.
    fn pump(&mut self, _timeout: Duration) -> HookResult<usize> {
        Ok(0)
    }

    /// Remove the handle. Called at most once.
    fn uninstall(&mut self);
}
