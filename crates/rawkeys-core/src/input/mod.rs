// Rawkeys Input Layer
// Raw event classification and keyboard device detection

mod device;
mod event;
mod filter;

pub use device::{is_keyboard, is_virtual_device, DeviceCapabilities, VIRTUAL_DEVICE_NAME};
pub use event::{is_key_event, is_sync_event, EV_KEY, EV_SYN};
pub use filter::matches_device_filter;
