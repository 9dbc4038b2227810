// Rawkeys Input Service
// One tracker plus one hook adapter, driven by the host's frame loop

use std::time::Duration;

use crate::hook::{HookAdapter, HookBackend, HookResult};
use crate::state::SubscriptionId;
use crate::{Key, KeyStateTracker, Phase, Settings};

/// Frame-synchronized raw keyboard input.
///
/// Owns a [`KeyStateTracker`] and the [`HookAdapter`] that feeds it. The
/// host calls [`advance_frame`](Self::advance_frame) once per frame and
/// queries phases in between. Dropping the service removes the hook.
#[derive(Debug)]
pub struct RawKeyInput {
    hook: HookAdapter,
}

impl RawKeyInput {
    pub fn new(backend: impl HookBackend + 'static) -> Self {
        Self {
            hook: HookAdapter::new(backend, KeyStateTracker::new()),
        }
    }

    /// Create a service configured from `settings`; the hook is not started
    pub fn with_settings(backend: impl HookBackend + 'static, settings: &Settings) -> Self {
        let service = Self::new(backend);
        service.apply(settings);
        service
    }

    /// Apply the settings that can change without restarting the hook.
    ///
    /// The delivery mode is only read by [`start_with`](Self::start_with).
    pub fn apply(&self, settings: &Settings) {
        self.hook.set_intercept_messages(settings.intercept_messages);
    }

    pub fn start(&self, run_in_background: bool) -> HookResult<()> {
        self.hook.start(run_in_background)
    }

    /// Start in the delivery mode named by `settings`
    pub fn start_with(&self, settings: &Settings) -> HookResult<()> {
        self.apply(settings);
        self.hook.start(settings.run_in_background)
    }

    pub fn stop(&self) {
        self.hook.stop();
    }

    pub fn is_running(&self) -> bool {
        self.hook.is_running()
    }

    pub fn run_in_background(&self) -> bool {
        self.hook.run_in_background()
    }

    pub fn intercept_messages(&self) -> bool {
        self.hook.intercept_messages()
    }

    pub fn set_intercept_messages(&self, intercept: bool) {
        self.hook.set_intercept_messages(intercept);
    }

    /// Deliver pending in-context notifications; see [`HookAdapter::pump`]
    pub fn pump(&self, timeout: Duration) -> HookResult<usize> {
        self.hook.pump(timeout)
    }

    pub fn advance_frame(&self) {
        self.tracker().advance_frame();
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.tracker().is_down(key)
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.tracker().is_held(key)
    }

    pub fn is_up(&self, key: Key) -> bool {
        self.tracker().is_up(key)
    }

    pub fn phase(&self, key: Key) -> Option<Phase> {
        self.tracker().phase(key)
    }

    pub fn any_key_down(&self) -> bool {
        self.tracker().any_key_down()
    }

    pub fn on_key_down(&self, callback: impl Fn(Key) + Send + Sync + 'static) -> SubscriptionId {
        self.tracker().on_key_down(callback)
    }

    pub fn on_key_up(&self, callback: impl Fn(Key) + Send + Sync + 'static) -> SubscriptionId {
        self.tracker().on_key_up(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.tracker().unsubscribe(id)
    }

    pub fn tracker(&self) -> &KeyStateTracker {
        self.hook.tracker()
    }
}
