// Rawkeys State Layer
// Pressed-key tracking, frame phases and edge subscribers

mod subscribers;
mod tracker;

pub use subscribers::{KeyCallback, SubscriptionId};
pub use tracker::KeyStateTracker;
