// Rawkeys Edge Subscribers
// Ordered key-down / key-up callback registrations

use smallvec::SmallVec;
use std::sync::Arc;

use crate::Key;

/// Callback invoked with the key of an edge event.
pub type KeyCallback = Arc<dyn Fn(Key) + Send + Sync>;

/// Handle returned by a subscription, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Which edge a subscriber listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    Down,
    Up,
}

/// Snapshot of callbacks taken before dispatch.
///
/// Most hosts register one or two listeners per edge, so this stays inline.
pub(crate) type CallbackBatch = SmallVec<[KeyCallback; 4]>;

#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    down: Vec<(SubscriptionId, KeyCallback)>,
    up: Vec<(SubscriptionId, KeyCallback)>,
}

impl Subscribers {
    fn list_mut(&mut self, edge: Edge) -> &mut Vec<(SubscriptionId, KeyCallback)> {
        match edge {
            Edge::Down => &mut self.down,
            Edge::Up => &mut self.up,
        }
    }

    pub(crate) fn add(&mut self, edge: Edge, callback: KeyCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.list_mut(edge).push((id, callback));
        id
    }

    /// Remove a registration from whichever list holds it.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        for edge in [Edge::Down, Edge::Up] {
            let list = self.list_mut(edge);
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Callbacks for an edge, in registration order.
    pub(crate) fn snapshot(&self, edge: Edge) -> CallbackBatch {
        let list = match edge {
            Edge::Down => &self.down,
            Edge::Up => &self.up,
        };
        list.iter().map(|(_, cb)| Arc::clone(cb)).collect()
    }

    pub(crate) fn len(&self, edge: Edge) -> usize {
        match edge {
            Edge::Down => self.down.len(),
            Edge::Up => self.up.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<(u8, Key)>>>, tag: u8) -> KeyCallback {
        let log = Arc::clone(log);
        Arc::new(move |key| log.lock().push((tag, key)))
    }

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Subscribers::default();
        subs.add(Edge::Down, recorder(&log, 1));
        subs.add(Edge::Down, recorder(&log, 2));
        subs.add(Edge::Up, recorder(&log, 3));

        for cb in subs.snapshot(Edge::Down) {
            cb(Key::A);
        }

        assert_eq!(*log.lock(), vec![(1, Key::A), (2, Key::A)]);
    }

    #[test]
    fn test_remove_finds_either_edge() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Subscribers::default();
        let down = subs.add(Edge::Down, recorder(&log, 1));
        let up = subs.add(Edge::Up, recorder(&log, 2));

        assert!(subs.remove(up));
        assert_eq!(subs.len(Edge::Up), 0);
        assert!(subs.remove(down));
        assert_eq!(subs.len(Edge::Down), 0);
        assert!(!subs.remove(down));
    }

    #[test]
    fn test_ids_are_not_reused() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Subscribers::default();
        let first = subs.add(Edge::Down, recorder(&log, 1));
        subs.remove(first);
        let second = subs.add(Edge::Down, recorder(&log, 1));
        assert_ne!(first, second);
    }
}
