use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};

use colormatic::audio::{self, CaptureConfig};
use colormatic::config::{settings_path, Settings};
use colormatic::context::EngineContext;
use colormatic::control::{self, ControlSurface, NullSurface};
use colormatic::engine::TickEngine;
use colormatic::error::log_capture_error;
use colormatic::modes::LightMode;
use colormatic::output::{
    shared_sink, BeaconSink, HidRawSink, LedSink, NullBeaconSink, NullLedSink, UdpBeaconSink,
};
use colormatic::strobe::{self, StrobeCommand, StrobePreset};

#[derive(Parser, Debug)]
#[command(
    name = "colormatic",
    version,
    about = "Audio-reactive controller for a 10-cell RGB strip and an RGBY relay bank"
)]
struct Cli {
    /// Settings file path (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Case-insensitive substring selecting the audio input device
    #[arg(long)]
    device: Option<String>,

    /// List audio input devices and exit
    #[arg(long, default_value_t = false)]
    list_devices: bool,

    /// Lighting mode override, 1-7
    #[arg(long)]
    mode: Option<u8>,

    /// Beacon peer override as ip:port
    #[arg(long)]
    udp_target: Option<String>,

    /// Raw HID device node for the LED strip (e.g. /dev/hidraw0)
    #[arg(long)]
    led_device: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_devices {
        audio::list_input_devices()?;
        return Ok(());
    }

    let settings_file = cli.config.clone().or_else(settings_path);
    let mut settings = load_settings(settings_file.as_deref());
    apply_overrides(&mut settings, &cli)?;

    if LightMode::from_id(settings.mode).is_none() {
        warn!(
            "[Main] settings mode {} is unknown; using mode 1",
            settings.mode
        );
        settings.mode = 1;
    }

    let ctx = Arc::new(EngineContext::new(&settings));

    // LED strip: real device when configured and present, dark otherwise.
    let led_sink: Box<dyn LedSink> = match &cli.led_device {
        Some(path) => match HidRawSink::open(path) {
            Ok(sink) => Box::new(sink),
            Err(err) => {
                warn!("[Main] LED device unavailable ({}); strip output disabled", err);
                Box::new(NullLedSink)
            }
        },
        None => {
            info!("[Main] no LED device configured; strip output disabled");
            Box::new(NullLedSink)
        }
    };
    let led_sink = shared_sink(led_sink);

    let beacon_sink: Box<dyn BeaconSink> =
        match UdpBeaconSink::connect(&settings.udp.ip, settings.udp.port) {
            Ok(sink) => Box::new(sink),
            Err(err) => {
                warn!("[Main] beacon peer unavailable ({}); beacon output disabled", err);
                Box::new(NullBeaconSink)
            }
        };

    // A failed capture start degrades to a dark, silent pipeline.
    let capture = match audio::start_capture(
        Arc::clone(&ctx),
        &CaptureConfig {
            device: cli.device.clone(),
        },
    ) {
        Ok(handle) => Some(handle),
        Err(err) => {
            log_capture_error(&err, "startup");
            None
        }
    };

    let mut surface: Box<dyn ControlSurface> = Box::new(NullSurface);
    if let Err(err) = control::sync_surface(surface.as_mut(), ctx.controls.sensitivities()) {
        warn!("[Main] control surface sync failed: {}", err);
    }
    let control_handle = control::spawn_control_loop(Arc::clone(&ctx), surface);

    let (strobe_tx, strobe_rx) = mpsc::channel();
    let strobe_handle = strobe::spawn_strobe(strobe_rx, Arc::clone(&led_sink));

    let engine = TickEngine::new(Arc::clone(&ctx), led_sink, beacon_sink);
    let engine_handle = engine.spawn();

    console_loop(&ctx, &strobe_tx);

    // Cooperative shutdown: raise the flag, then reap every thread. The
    // engine sends the closing blackout and idle frames on its way out.
    ctx.request_stop();
    let _ = strobe_tx.send(StrobeCommand::Shutdown);
    if let Some(handle) = capture {
        handle.join();
    }
    let _ = strobe_handle.join();
    let _ = control_handle.join();
    let _ = engine_handle.join();

    settings.mode = ctx.controls.mode_id();
    settings.sensitivity = ctx.controls.sensitivities();
    save_settings(settings_file.as_deref(), &settings);

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Settings {
    let Some(path) = path else {
        info!("[Main] no settings location available; using defaults");
        return Settings::default();
    };
    match Settings::load(path) {
        Ok(settings) => settings,
        Err(err) => {
            // Surfaced but not fatal: the pipeline still runs on defaults.
            error!("[Main] {}", err);
            eprintln!("Settings error: {err}");
            Settings::default()
        }
    }
}

fn save_settings(path: Option<&Path>, settings: &Settings) {
    let Some(path) = path else {
        return;
    };
    if let Err(err) = settings.save(path) {
        error!("[Main] {}", err);
        eprintln!("Settings error: {err}");
    }
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) -> Result<()> {
    if let Some(mode) = cli.mode {
        if LightMode::from_id(mode).is_none() {
            bail!("mode must be between 1 and 7 (got {mode})");
        }
        settings.mode = mode;
    }
    if let Some(target) = &cli.udp_target {
        let (ip, port) = target
            .rsplit_once(':')
            .with_context(|| format!("invalid UDP target '{target}': expected ip:port"))?;
        settings.udp.ip = ip.to_string();
        settings.udp.port = port
            .parse()
            .with_context(|| format!("invalid UDP port '{port}'"))?;
    }
    Ok(())
}

fn console_loop(ctx: &Arc<EngineContext>, strobe: &Sender<StrobeCommand>) {
    println!(
        "commands: mode <1-7> | strobe <1-5|off> | gain | comp | burst <+|-> | sens <1-3> <0-127> | quit"
    );

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if !handle_command(line.trim(), ctx, strobe) {
            break;
        }
        if ctx.should_stop() {
            break;
        }
    }
}

/// Apply one console command. Returns false when the session should end.
fn handle_command(line: &str, ctx: &Arc<EngineContext>, strobe: &Sender<StrobeCommand>) -> bool {
    let mut words = line.split_whitespace();
    match words.next() {
        None => true,
        Some("quit") | Some("exit") => false,
        Some("mode") => {
            match words
                .next()
                .and_then(|w| w.parse::<u8>().ok())
                .and_then(LightMode::from_id)
            {
                Some(mode) => {
                    ctx.controls.set_mode_id(mode.id());
                    println!("mode {}", mode.id());
                }
                None => println!("usage: mode <1-7>"),
            }
            true
        }
        Some("strobe") => {
            match words.next() {
                Some("off") => {
                    let _ = strobe.send(StrobeCommand::Stop);
                    println!("strobe off");
                }
                Some(word) => match word
                    .parse::<usize>()
                    .ok()
                    .and_then(StrobePreset::from_index)
                {
                    Some(preset) => {
                        let _ = strobe.send(StrobeCommand::Start(preset));
                        println!("strobe {} BPM", preset.bpm());
                    }
                    None => println!("usage: strobe <1-5|off>"),
                },
                None => println!("usage: strobe <1-5|off>"),
            }
            true
        }
        Some("gain") => {
            let enabled = ctx.controls.toggle_auto_gain();
            println!("auto gain {}", if enabled { "on" } else { "off" });
            true
        }
        Some("comp") => {
            let enabled = ctx.controls.toggle_compressor();
            println!("compressor {}", if enabled { "on" } else { "off" });
            true
        }
        Some("burst") => {
            match words.next() {
                Some("+") => println!("burst {}%", ctx.controls.adjust_burst(true)),
                Some("-") => println!("burst {}%", ctx.controls.adjust_burst(false)),
                _ => println!("usage: burst <+|->"),
            }
            true
        }
        Some("sens") => {
            let lamp = words.next().and_then(|w| w.parse::<usize>().ok());
            let value = words.next().and_then(|w| w.parse::<u8>().ok());
            match (lamp, value) {
                (Some(lamp @ 1..=3), Some(value)) if value <= 127 => {
                    ctx.controls.set_sensitivity(lamp - 1, value);
                    println!("sensitivity {} = {}", lamp, value);
                }
                _ => println!("usage: sens <1-3> <0-127>"),
            }
            true
        }
        Some(other) => {
            println!("unknown command: {other}");
            true
        }
    }
}
