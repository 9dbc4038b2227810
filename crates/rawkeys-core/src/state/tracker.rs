// Rawkeys Key State Tracker
// Frame-quantized Down/Held/Up phases on top of raw press/release notifications

use indexmap::{IndexMap, IndexSet};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::sync::Arc;

use super::subscribers::{Edge, KeyCallback, SubscriptionId, Subscribers};
use crate::{Key, Phase};

/// Pressed set and phase map for the current frame.
#[derive(Debug, Default)]
struct FrameState {
    /// Keys physically down according to the latest raw notifications
    pressed: IndexSet<Key>,
    /// Keys down now or down last frame; absent keys are settled
    phases: IndexMap<Key, Phase>,
    /// Bumped by every `clear`
    generation: u64,
}

impl FrameState {
    /// Reconcile phases against the pressed set.
    ///
    /// The passes run in this order so a key released during the frame keeps
    /// its `Up` phase for exactly one frame.
    fn advance(&mut self) {
        let FrameState { pressed, phases, .. } = self;

        // Down becomes Held, Up settles
        phases.retain(|_, phase| match phase.next() {
            Some(next) => {
                *phase = next;
                true
            }
            None => false,
        });

        // Newly pressed keys
        for key in pressed.iter() {
            phases.entry(*key).or_insert(Phase::Down);
        }

        // Released keys, removed on the next advance
        for (key, phase) in phases.iter_mut() {
            if !pressed.contains(key) {
                *phase = Phase::Up;
            }
        }
    }

    fn clear(&mut self) {
        self.pressed.clear();
        self.phases.clear();
        self.generation = self.generation.wrapping_add(1);
    }
}

struct Shared {
    state: RefCell<FrameState>,
    subscribers: RefCell<Subscribers>,
}

/// Tracks which keys are pressed and what phase each key is in this frame.
///
/// Raw notifications arrive through [`notify`](Self::notify), possibly on a
/// hook thread, and fire edge subscribers right away. Polling queries only
/// change when the host calls [`advance_frame`](Self::advance_frame).
///
/// Cloning yields another handle to the same state. All entry points are
/// serialized by one reentrant lock, and subscribers run while it is held:
/// a subscriber may query or re-subscribe on its own thread, but must not wait
/// on another thread that needs the tracker.
#[derive(Clone)]
pub struct KeyStateTracker {
    shared: Arc<ReentrantMutex<Shared>>,
}

impl KeyStateTracker {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ReentrantMutex::new(Shared {
                state: RefCell::new(FrameState::default()),
                subscribers: RefCell::new(Subscribers::default()),
            })),
        }
    }

    /// Run `f` while holding the tracker lock.
    ///
    /// Hooks use this to check their liveness and notify atomically with
    /// respect to `stop`.
    pub(crate) fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.shared.lock();
        f()
    }

    /// Feed one raw notification into the pressed set.
    ///
    /// A press of a key that is already down is ignored, so hardware
    /// auto-repeat never produces a second key-down event. A release always
    /// fires key-up subscribers, even without a matching press.
    ///
    /// A subscriber that clears the tracker (as `HookAdapter::stop` does)
    /// ends the dispatch: later subscribers do not see this event.
    pub fn notify(&self, key: Key, pressed: bool) {
        let shared = self.shared.lock();

        let (changed, generation) = {
            let mut state = shared.state.borrow_mut();
            let changed = if pressed {
                state.pressed.insert(key)
            } else {
                state.pressed.shift_remove(&key);
                true
            };
            (changed, state.generation)
        };
        if !changed {
            log::trace!("ignoring repeated press of {}", key);
            return;
        }

        let edge = if pressed { Edge::Down } else { Edge::Up };
        // Snapshot so subscribers may (un)subscribe while being dispatched
        let callbacks = shared.subscribers.borrow().snapshot(edge);
        log::trace!("{:?} {} -> {} subscriber(s)", edge, key, callbacks.len());
        for callback in callbacks {
            if shared.state.borrow().generation != generation {
                log::trace!("tracker cleared while dispatching {}", key);
                break;
            }
            callback(key);
        }
    }

    /// Close the current frame and compute phases for the next one.
    ///
    /// Call exactly once per host frame, after all reads of this frame's
    /// key state.
    pub fn advance_frame(&self) {
        let shared = self.shared.lock();
        shared.state.borrow_mut().advance();
    }

    /// Key went down since the last frame boundary
    pub fn is_down(&self, key: Key) -> bool {
        self.phase(key) == Some(Phase::Down)
    }

    /// Key has been down across at least one frame boundary
    pub fn is_held(&self, key: Key) -> bool {
        self.phase(key) == Some(Phase::Held)
    }

    /// Key went up since the last frame boundary
    pub fn is_up(&self, key: Key) -> bool {
        self.phase(key) == Some(Phase::Up)
    }

    /// Phase of a key for the current frame, `None` if settled
    pub fn phase(&self, key: Key) -> Option<Phase> {
        let shared = self.shared.lock();
        let phase = shared.state.borrow().phases.get(&key).copied();
        phase
    }

    /// Whether any key is physically down right now, regardless of frames
    pub fn any_key_down(&self) -> bool {
        let shared = self.shared.lock();
        let any = !shared.state.borrow().pressed.is_empty();
        any
    }

    /// Keys physically down right now, in press order
    pub fn pressed_keys(&self) -> Vec<Key> {
        let shared = self.shared.lock();
        let keys = shared.state.borrow().pressed.iter().copied().collect();
        keys
    }

    /// Every tracked key with its phase for the current frame
    pub fn phases(&self) -> Vec<(Key, Phase)> {
        let shared = self.shared.lock();
        let phases = shared
            .state
            .borrow()
            .phases
            .iter()
            .map(|(k, p)| (*k, *p))
            .collect();
        phases
    }

    /// Forget all pressed keys and phases. Subscriptions are kept.
    pub fn clear(&self) {
        let shared = self.shared.lock();
        shared.state.borrow_mut().clear();
    }

    /// Register a callback for key-down edges
    pub fn on_key_down(&self, callback: impl Fn(Key) + Send + Sync + 'static) -> SubscriptionId {
        self.subscribe(Edge::Down, Arc::new(callback))
    }

    /// Register a callback for key-up edges
    pub fn on_key_up(&self, callback: impl Fn(Key) + Send + Sync + 'static) -> SubscriptionId {
        self.subscribe(Edge::Up, Arc::new(callback))
    }

    /// Remove a registration. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let shared = self.shared.lock();
        let removed = shared.subscribers.borrow_mut().remove(id);
        removed
    }

    fn subscribe(&self, edge: Edge, callback: KeyCallback) -> SubscriptionId {
        let shared = self.shared.lock();
        let id = shared.subscribers.borrow_mut().add(edge, callback);
        id
    }
}

impl Default for KeyStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeyStateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.lock();
        let state = shared.state.borrow();
        let subscribers = shared.subscribers.borrow();
        let result = f
            .debug_struct("KeyStateTracker")
            .field("state", &*state)
            .field("down_subscribers", &subscribers.len(Edge::Down))
            .field("up_subscribers", &subscribers.len(Edge::Up))
            .finish();
        result
    }
}
