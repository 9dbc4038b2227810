// Rawkeys CLI
// Logs raw key edges and per-frame key phases from the evdev hook

#[cfg(feature = "pure-rust")]
use std::path::PathBuf;
#[cfg(feature = "pure-rust")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "pure-rust")]
use std::sync::Arc;
#[cfg(feature = "pure-rust")]
use std::time::Instant;

#[cfg(feature = "pure-rust")]
use anyhow::Context;
#[cfg(feature = "pure-rust")]
use clap::Parser;

#[cfg(feature = "pure-rust")]
use rawkeys_core::{EvdevHook, Key, RawKeyInput, Settings};

/// Frame-synchronized raw keyboard input monitor
#[cfg(feature = "pure-rust")]
#[derive(Parser, Debug)]
#[command(name = "rawkeys")]
#[command(version)]
#[command(about = "Frame-synchronized raw keyboard input monitor", long_about = None)]
struct Args {
    /// TOML settings file (default: ~/.config/rawkeys/settings.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Receive keys on a hook thread
    #[arg(long, conflicts_with = "foreground")]
    background: bool,

    /// Receive keys only while the frame loop pumps the hook
    #[arg(long)]
    foreground: bool,

    /// Swallow hooked keys so other applications do not see them
    #[arg(short, long)]
    intercept: bool,

    /// Hook only these devices, by name or path (can be used multiple times)
    #[arg(short, long, value_name = "DEVICE")]
    devices: Vec<String>,

    /// Log the frame phase of this key (can be used multiple times)
    #[arg(short, long, value_name = "KEY")]
    watch: Vec<Key>,

    /// Frames per second
    #[arg(short, long, value_name = "HZ")]
    rate: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// List available keyboard devices
    #[arg(long)]
    list_devices: bool,
}

#[cfg(feature = "pure-rust")]
impl Args {
    /// Settings file values with command-line overrides applied
    fn resolve_settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => Settings::load_default().context("loading default settings")?,
        };

        if self.background {
            settings.run_in_background = true;
        }
        if self.foreground {
            settings.run_in_background = false;
        }
        if self.intercept {
            settings.intercept_messages = true;
        }
        if !self.devices.is_empty() {
            settings.devices = self.devices.clone();
        }
        if !self.watch.is_empty() {
            settings.watch = self.watch.clone();
        }
        if let Some(rate) = self.rate {
            settings.set_frame_rate(rate)?;
        }
        Ok(settings)
    }
}

#[cfg(feature = "pure-rust")]
fn list_devices() {
    let devices = EvdevHook::list_devices();
    println!("Found {} keyboard device(s):", devices.len());
    for device in &devices {
        match &device.path {
            Some(path) => println!("  {}: {} ({})", device.index, device.name, path),
            None => println!("  {}: {}", device.index, device.name),
        }
    }
}

#[cfg(feature = "pure-rust")]
fn run(settings: Settings, terminate: Arc<AtomicBool>) -> anyhow::Result<()> {
    let input = RawKeyInput::with_settings(
        EvdevHook::with_filter(settings.devices.clone()),
        &settings,
    );
    input.on_key_down(|key| log::info!("Key Down: {}", key));
    input.on_key_up(|key| log::info!("Key Up: {}", key));

    input
        .start_with(&settings)
        .context("starting keyboard hook")?;
    log::info!(
        "running at {} Hz ({}), intercept {}",
        settings.frame_rate_hz,
        if input.run_in_background() { "background" } else { "foreground" },
        if input.intercept_messages() { "on" } else { "off" },
    );

    let interval = settings.frame_interval();
    let mut frame: u64 = 0;
    while !terminate.load(Ordering::Relaxed) && input.is_running() {
        let frame_start = Instant::now();

        if !input.run_in_background() {
            input.pump(interval).context("pumping keyboard hook")?;
        }

        for key in &settings.watch {
            if let Some(phase) = input.phase(*key) {
                log::info!("[frame {}] {} {}", frame, key, phase);
            }
        }
        input.advance_frame();
        frame += 1;

        if let Some(rest) = interval.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    input.stop();
    log::info!("stopped after {} frame(s)", frame);
    Ok(())
}

#[cfg(feature = "pure-rust")]
fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if args.list_devices {
        list_devices();
        return Ok(());
    }

    let settings = args.resolve_settings()?;

    let terminate = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&terminate))
            .context("registering signal handler")?;
    }

    run(settings, terminate)
}

// Stub for when pure-rust feature is not enabled
#[cfg(not(feature = "pure-rust"))]
fn main() {
    eprintln!("Error: rawkeys binary requires the 'pure-rust' feature to be enabled.");
    eprintln!("Please build with: cargo build --release --features pure-rust --bin rawkeys");
    std::process::exit(1);
}
