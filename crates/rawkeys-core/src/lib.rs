// Rawkeys Core Library
// Frame-synchronized raw keyboard input: hook adapter and key state tracker

pub mod action;
pub mod hook;
pub mod input;
pub mod key;
pub mod phase;
pub mod service;
pub mod settings;
pub mod state;

pub use action::Action;
pub use hook::{
    Disposition, HookAdapter, HookBackend, HookError, HookHandle, HookMode, HookResult, HookSink,
    ManualHook, RawEvent,
};
pub use input::{is_keyboard, is_virtual_device, matches_device_filter, DeviceCapabilities};
pub use key::Key;
pub use phase::Phase;
pub use service::RawKeyInput;
pub use settings::{default_settings_content, Settings, SettingsError};
pub use state::{KeyStateTracker, SubscriptionId};

#[cfg(feature = "evdev")]
pub use hook::linux::{DeviceInfo, EvdevHook};
