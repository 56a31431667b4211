//! rc-remote - console front-end
//!
//! Plays the part of the phone screen: scans for the car, connects, and turns
//! typed button presses into commands.
//!
//! Usage: rc-remote [config.toml] [--mock]

use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver};
use log::{info, warn};
use rc_remote::config::{AppConfig, TransportKind};
use rc_remote::console::{ConsoleCommand, HELP};
use rc_remote::control::{CommandDispatcher, LogHaptics};
use rc_remote::settings::storage::default_store_path;
use rc_remote::settings::{JsonFileStore, PreferenceStore};
use rc_remote::transport::{BleSerialAdapter, MockAdapter};
use rc_remote::{BluetoothAdapter, ConnectionEvent, ConnectionManager, Device, Settings};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Everything the screen reacts to, funnelled through one queue
enum UiEvent {
    Connection(ConnectionEvent),
    Settings(Settings),
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let force_mock = args.iter().any(|a| a == "--mock");

    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {}", path))?,
        None => AppConfig::load_default()?,
    };

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level)).init();

    println!("=== RC Remote ===");
    println!();

    if force_mock || config.transport.kind == TransportKind::Mock {
        println!("Using the simulated car (mock transport)");
        run(demo_adapter(), &config)
    } else {
        let adapter = BleSerialAdapter::new(config.transport.ble_options())
            .context("opening the Bluetooth adapter (try --mock)")?;
        run(adapter, &config)
    }
}

/// Simulated car and a couple of neighbours for trying the front-end
fn demo_adapter() -> MockAdapter {
    MockAdapter::new()
        .with_bonded(Device::new(Some("HC-05"), "00:11:22:33:44:55", true))
        .with_discovered(Device::new(Some("RC-CAR"), "98:D3:31:F5:2A:10", false))
        .with_discovered(Device::new(None, "5C:F3:70:8B:11:02", false))
}

fn run<A: BluetoothAdapter>(adapter: A, config: &AppConfig) -> anyhow::Result<()> {
    let manager = Arc::new(ConnectionManager::new(adapter));

    let store_path = config.storage.path.clone().unwrap_or_else(default_store_path);
    let prefs = PreferenceStore::new(JsonFileStore::new(&store_path));
    let settings = prefs.load();
    info!("Settings file: {}", store_path.display());

    if !manager.is_adapter_enabled() && !manager.request_permissions() {
        warn!("Bluetooth is off or permissions were refused");
        println!("This app needs Bluetooth to drive the car. Turn it on and grant the permissions.");
    }

    let (tx, rx) = unbounded();
    let connection_tx = tx.clone();
    manager.add_listener(move |event| {
        let _ = connection_tx.send(UiEvent::Connection(event.clone()));
    });
    prefs.add_listener(move |settings| {
        let _ = tx.send(UiEvent::Settings(settings.clone()));
    });

    let mut pad = CommandDispatcher::new(Arc::clone(&manager), LogHaptics, settings);
    let mut devices: Vec<Device> = Vec::new();

    println!("{}", HELP);
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(e) => {
                println!("{} (type 'help')", e);
                continue;
            }
        };

        match command {
            ConsoleCommand::Scan => {
                println!("Searching for devices...");
                devices = manager.scan_devices();
                if devices.is_empty() {
                    println!("No devices found. Make sure Bluetooth is on and the car is paired.");
                }
                for (index, device) in devices.iter().enumerate() {
                    println!(
                        "  [{}] {} ({}){}",
                        index,
                        device.display_name(),
                        device.address,
                        if device.is_paired { " paired" } else { "" }
                    );
                }
            }
            ConsoleCommand::Connect(target) => match pick_device(&devices, &target) {
                Some(device) => {
                    if !manager.connect(&device) {
                        println!("Could not connect. Make sure the car is on and in range.");
                    }
                }
                None => println!("No device '{}' in the last scan", target),
            },
            ConsoleCommand::Disconnect => {
                if !manager.disconnect() {
                    println!("Not connected");
                }
            }
            ConsoleCommand::Press(direction) => {
                pad.press_in(direction);
            }
            ConsoleCommand::Release(direction) => {
                pad.press_out(direction);
            }
            ConsoleCommand::Tap(direction) => {
                pad.tap(direction);
            }
            ConsoleCommand::Mode(_)
            | ConsoleCommand::Vibration(_)
            | ConsoleCommand::Map(..)
            | ConsoleCommand::Reset => {
                if let Some(patch) = command.settings_patch(&prefs.get()) {
                    if !prefs.save(patch) {
                        println!("Could not save settings");
                    }
                }
            }
            ConsoleCommand::Status => {
                match manager.connected_device() {
                    Some(device) if manager.is_connected() => {
                        println!("Connected to {} ({})", device.display_name(), device.address)
                    }
                    _ => println!("Disconnected"),
                }
                println!("Settings: {:?}", prefs.get());
                if let Some(active) = pad.active_toggle() {
                    println!("Active direction: {}", active);
                }
            }
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => break,
        }

        apply_ui_events(&rx, &mut pad);
    }

    manager.cleanup();
    println!("Bye");
    Ok(())
}

/// Drain queued events into the pad, like the screen re-rendering
fn apply_ui_events<S, H>(rx: &Receiver<UiEvent>, pad: &mut CommandDispatcher<S, H>)
where
    S: rc_remote::CommandSink,
    H: rc_remote::Haptics,
{
    for event in rx.try_iter() {
        match event {
            UiEvent::Connection(ConnectionEvent::Connected(device)) => {
                println!("Connected to {}", device.display_name());
                pad.set_enabled(true);
            }
            UiEvent::Connection(ConnectionEvent::Disconnected(name)) => {
                println!("Disconnected: {}", name);
                pad.set_enabled(false);
            }
            UiEvent::Connection(ConnectionEvent::Error(e)) => {
                println!("Bluetooth error: {}", e);
            }
            UiEvent::Settings(settings) => {
                pad.apply_settings(settings);
            }
        }
    }
}

/// Find a device from the last scan by list index or address
fn pick_device(devices: &[Device], target: &str) -> Option<Device> {
    if let Ok(index) = target.parse::<usize>() {
        return devices.get(index).cloned();
    }
    devices
        .iter()
        .find(|d| d.address.eq_ignore_ascii_case(target))
        .cloned()
}
