// Rawkeys evdev Hook
// Grabs keyboard devices and re-emits passed-through events via uinput

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent};
use std::collections::HashSet;
use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{Disposition, HookBackend, HookError, HookHandle, HookMode, HookResult, HookSink, RawEvent};
use crate::input::{
    is_key_event, is_keyboard, is_sync_event, is_virtual_device, matches_device_filter,
    DeviceCapabilities, VIRTUAL_DEVICE_NAME,
};

/// How long the background thread waits in poll() before rechecking
/// whether it should exit
const POLL_INTERVAL_MS: i32 = 100;

/// Device information for listing devices
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub path: Option<String>,
}

/// Keyboard hook backed by Linux event devices.
///
/// Installing grabs the matching devices, so nothing else sees their events
/// directly. Every event the hook passes through is written to a uinput
/// virtual keyboard instead, which turns swallowing into a per-event choice.
/// Requires read access to `/dev/input/event*` and write access to
/// `/dev/uinput`.
#[derive(Debug, Clone, Default)]
pub struct EvdevHook {
    filter: Vec<String>,
}

impl EvdevHook {
    /// Hook every detected keyboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook only the devices whose name or path is listed
    pub fn with_filter(filter: Vec<String>) -> Self {
        Self { filter }
    }

    /// List keyboards that autodetection would hook
    pub fn list_devices() -> Vec<DeviceInfo> {
        evdev::enumerate()
            .filter(|(_, device)| {
                let name = device.name().unwrap_or("");
                is_keyboard(&capabilities(device)) && !is_virtual_device(name)
            })
            .enumerate()
            .map(|(index, (path, device))| DeviceInfo {
                index,
                name: device.name().unwrap_or("Unknown").to_string(),
                path: path.to_str().map(|s| s.to_string()),
            })
            .collect()
    }
}

impl HookBackend for EvdevHook {
    fn install(&mut self, mode: HookMode, sink: HookSink) -> HookResult<Box<dyn HookHandle>> {
        let keyboards = GrabbedKeyboards::open(&self.filter)?;
        let output = PassThroughDevice::new()
            .map_err(|e| HookError::InstallationFailed(format!("uinput: {}", e)))?;
        log::info!(
            "grabbed {} keyboard device(s): {:?}",
            keyboards.devices.len(),
            keyboards.names()
        );

        let pump = DevicePump {
            keyboards,
            output,
            sink,
        };

        match mode {
            HookMode::InContext => Ok(Box::new(InContextHandle { pump: Some(pump) })),
            HookMode::Background => BackgroundHandle::spawn(pump).map(|h| Box::new(h) as Box<dyn HookHandle>),
        }
    }
}

fn capabilities(device: &Device) -> DeviceCapabilities {
    let keys: Vec<u16> = device
        .supported_keys()
        .map(|keys| keys.iter().map(|k| k.code()).collect())
        .unwrap_or_default();
    DeviceCapabilities::new(device.supported_events().contains(EventType::KEY), keys)
}

/// Grabbed input devices plus their poll descriptors
struct GrabbedKeyboards {
    devices: Vec<Device>,
    poll_fds: Vec<libc::pollfd>,
}

impl GrabbedKeyboards {
    fn open(filter: &[String]) -> HookResult<Self> {
        let mut devices = Vec::new();
        for (path, device) in evdev::enumerate() {
            let name = device.name().unwrap_or("Unknown");
            if matches_device_filter(
                name,
                path.to_str().unwrap_or_default(),
                filter,
                is_keyboard(&capabilities(&device)),
                is_virtual_device(name),
            ) {
                devices.push(device);
            }
        }
        if devices.is_empty() {
            return Err(HookError::InstallationFailed(
                "no keyboard devices found".to_string(),
            ));
        }

        // Build the value first so Drop ungrabs whatever got grabbed
        // if a later grab fails
        let poll_fds = devices
            .iter()
            .map(|d| libc::pollfd {
                fd: d.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();
        let mut grabbed = Self { devices, poll_fds };
        for device in &mut grabbed.devices {
            // A crashed previous run may have left a grab behind
            let _ = device.ungrab();
            device.grab().map_err(|e| {
                HookError::InstallationFailed(format!(
                    "cannot grab {}: {}",
                    device.name().unwrap_or("Unknown"),
                    e
                ))
            })?;
        }
        Ok(grabbed)
    }

    fn names(&self) -> Vec<String> {
        self.devices
            .iter()
            .map(|d| d.name().unwrap_or("Unknown").to_string())
            .collect()
    }
}

/// Ungrabbing on drop keeps the keyboard usable if the hook thread panics.
impl Drop for GrabbedKeyboards {
    fn drop(&mut self) {
        for device in &mut self.devices {
            let _ = device.ungrab();
        }
    }
}

/// uinput keyboard that replays passed-through events
struct PassThroughDevice {
    device: VirtualDevice,
    /// Keys pressed on the virtual device and not yet released
    held: HashSet<u16>,
}

impl PassThroughDevice {
    fn new() -> io::Result<Self> {
        let mut keys = AttributeSet::new();
        for code in 0..0x300u16 {
            keys.insert(evdev::Key::new(code));
        }
        let device = VirtualDeviceBuilder::new()?
            .name(VIRTUAL_DEVICE_NAME)
            .with_keys(&keys)?
            .build()?;
        Ok(Self {
            device,
            held: HashSet::new(),
        })
    }

    fn forward(&mut self, events: &[InputEvent]) -> io::Result<()> {
        // emit() terminates the packet with its own SYN_REPORT
        self.device.emit(events)?;
        for event in events {
            if is_key_event(event.event_type().0) {
                if event.value() == 0 {
                    self.held.remove(&event.code());
                } else {
                    self.held.insert(event.code());
                }
            }
        }
        Ok(())
    }

    fn release_all(&mut self) {
        let releases: Vec<InputEvent> = self
            .held
            .drain()
            .map(|code| InputEvent::new(EventType::KEY, code, 0))
            .collect();
        if !releases.is_empty() {
            if let Err(e) = self.device.emit(&releases) {
                log::warn!("failed to release passed-through keys: {}", e);
            }
        }
    }
}

impl Drop for PassThroughDevice {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Reads grabbed devices and feeds the sink
struct DevicePump {
    keyboards: GrabbedKeyboards,
    output: PassThroughDevice,
    sink: HookSink,
}

impl DevicePump {
    /// Wait up to `timeout_ms` for events and dispatch them all.
    ///
    /// Returns the number of key notifications dispatched. A poll interrupted
    /// by a signal counts as a timeout.
    fn poll(&mut self, timeout_ms: i32) -> io::Result<usize> {
        let GrabbedKeyboards { devices, poll_fds } = &mut self.keyboards;

        let ready = unsafe {
            libc::poll(
                poll_fds.as_mut_ptr(),
                poll_fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }
        if ready == 0 {
            return Ok(0);
        }

        let mut delivered = 0;
        let mut forward = Vec::new();
        for (device, fd) in devices.iter_mut().zip(poll_fds.iter()) {
            if fd.revents & libc::POLLIN == 0 {
                continue;
            }
            let events: Vec<InputEvent> = match device.fetch_events() {
                Ok(events) => events.collect(),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            };

            for event in events {
                let raw = RawEvent {
                    code: 0,
                    kind: event.event_type().0,
                    key_code: event.code(),
                    value: event.value(),
                };
                if is_sync_event(raw.kind) {
                    continue;
                }
                if raw.translate().is_some() {
                    delivered += 1;
                }
                if self.sink.dispatch(raw) == Disposition::PassThrough {
                    forward.push(event);
                }
            }
        }

        if !forward.is_empty() {
            if let Err(e) = self.output.forward(&forward) {
                log::warn!("failed to pass {} event(s) through: {}", forward.len(), e);
            }
        }
        Ok(delivered)
    }
}

/// Hook polled by the host thread through `HookAdapter::pump`
struct InContextHandle {
    pump: Option<DevicePump>,
}

impl HookHandle for InContextHandle {
    fn pump(&mut self, timeout: Duration) -> HookResult<usize> {
        let Some(pump) = self.pump.as_mut() else {
            return Ok(0);
        };
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        Ok(pump.poll(timeout_ms)?)
    }

    fn uninstall(&mut self) {
        // Dropping the pump ungrabs the devices
        self.pump = None;
    }
}

/// Hook polled by a dedicated thread
struct BackgroundHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundHandle {
    fn spawn(mut pump: DevicePump) -> HookResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("rawkeys-hook".to_string())
            .spawn(move || {
                log::debug!("hook thread started");
                while flag.load(Ordering::Acquire) && pump.sink.is_live() {
                    if let Err(e) = pump.poll(POLL_INTERVAL_MS) {
                        log::error!("hook thread stopping on device error: {}", e);
                        break;
                    }
                }
                drop(pump);
                log::debug!("hook thread stopped");
            })
            .map_err(|e| {
                HookError::InstallationFailed(format!("failed to spawn hook thread: {}", e))
            })?;

        Ok(Self {
            running,
            thread: Some(thread),
        })
    }
}

impl HookHandle for BackgroundHandle {
    fn uninstall(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            // Stopped from a subscriber on the hook thread itself: it exits
            // on its own once the current poll returns
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                log::warn!("hook thread panicked");
            }
        }
    }
}

impl Drop for BackgroundHandle {
    fn drop(&mut self) {
        self.uninstall();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::HookAdapter;
    use crate::KeyStateTracker;

    #[test]
    fn test_list_devices() {
        let devices = EvdevHook::list_devices();
        println!("Found {} keyboard device(s)", devices.len());
        for device in &devices {
            println!("  {}: {} ({:?})", device.index, device.name, device.path);
            assert!(!is_virtual_device(&device.name));
        }
    }

    #[test]
    fn test_unknown_filter_fails_installation() {
        let hook = EvdevHook::with_filter(vec!["/dev/input/no-such-device".to_string()]);
        let adapter = HookAdapter::new(hook, KeyStateTracker::new());

        match adapter.start(true) {
            Err(HookError::InstallationFailed(_)) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
        assert!(!adapter.is_running());
    }

    #[test]
    fn test_in_context_start_and_pump() {
        let adapter = HookAdapter::new(EvdevHook::new(), KeyStateTracker::new());
        match adapter.start(false) {
            Ok(()) => {
                assert!(adapter.pump(Duration::from_millis(10)).is_ok());
                adapter.stop();
                assert!(!adapter.is_running());
            }
            Err(HookError::InstallationFailed(e)) => {
                println!("Skipping test: {}", e);
            }
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }
}
