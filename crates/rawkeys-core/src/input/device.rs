// Rawkeys Input Layer - Device Detection
// Deciding which input devices are keyboards worth hooking

use std::collections::HashSet;

use crate::Key;

/// Name of the uinput device that re-emits passed-through events.
///
/// Devices carrying this name are never hooked, or every passed-through
/// event would come straight back in.
pub const VIRTUAL_DEVICE_NAME: &str = "Rawkeys (virtual) passthrough";

/// Key capabilities reported by an input device
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    /// Whether the device supports EV_KEY events
    pub has_ev_key: bool,
    /// Supported key codes
    pub supported_keys: HashSet<u16>,
}

impl DeviceCapabilities {
    pub fn new(has_ev_key: bool, supported_keys: impl IntoIterator<Item = u16>) -> Self {
        Self {
            has_ev_key,
            supported_keys: supported_keys.into_iter().collect(),
        }
    }

    pub fn supports_key(&self, key: Key) -> bool {
        self.supported_keys.contains(&key.code())
    }
}

/// Keys a device must have to count as a full keyboard: the QWERTY row
/// plus A, Z and SPACE. Mice, media remotes and power buttons lack them.
const KEYBOARD_SIGNATURE: &[Key] = &[
    Key::Q,
    Key::W,
    Key::E,
    Key::R,
    Key::T,
    Key::Y,
    Key::A,
    Key::Z,
    Key::SPACE,
];

pub fn is_keyboard(capabilities: &DeviceCapabilities) -> bool {
    capabilities.has_ev_key
        && KEYBOARD_SIGNATURE
            .iter()
            .all(|key| capabilities.supports_key(*key))
}

/// Check if a device is one of our own virtual devices
pub fn is_virtual_device(name: &str) -> bool {
    name.contains(VIRTUAL_DEVICE_NAME)
}
