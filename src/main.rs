//! fanscript simulator: main entry point.
//!
//! Runs the policy engine end to end against simulated hardware.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimHardware       LogEventSink   SettingsAdapter              │
//! │  (HardwarePort)    (EventSink)    (Settings+Config)            │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              EngineService (pure logic)                │    │
//! │  │  Registry · Execution loop · Supervisor                │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use fanscript::adapters::log_sink::LogEventSink;
use fanscript::adapters::settings::{CONFIG_KEY, SettingsAdapter};
use fanscript::adapters::sim_hardware::{self, SimHardware};
use fanscript::app::commands::AppCommand;
use fanscript::app::ports::{ConfigPort, SettingsStore};
use fanscript::app::service::EngineService;
use fanscript::config::EngineConfig;
use fanscript::hardware::Identifier;
use fanscript::policy::Binding;
use fanscript::registry::PolicyRegistry;
use fanscript::script::ScriptCompiler;

/// Attached to the simulated fan when the settings hold no binding for it.
const DEMO_POLICY: &str = r#"# Simulated CPU fan curve
let t = smooth(sensor("/intelcpu/0/temperature/0"), 5);
if t < 40 { return default("idle at " + round(t) + "C"); }
return software(curve(t, 40, 30, 60, 60, 80, 100), "cpu at " + round(t, 1) + "C");
"#;

/// Log a status line every this many ticks.
const STATUS_EVERY: u64 = 10;

/// Run the fan policy engine against simulated hardware.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (created on first save).  In-memory when omitted.
    settings: Option<PathBuf>,

    /// Number of ticks to run.  Runs until killed when omitted.
    ticks: Option<u64>,

    /// Simulated CPU load in percent.
    #[arg(long, default_value_t = 75.0)]
    load: f32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("fanscript-sim v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Settings + config ──────────────────────────────────
    let mut store = match &args.settings {
        Some(path) => SettingsAdapter::open(path)
            .with_context(|| format!("opening settings file {}", path.display()))?,
        None => SettingsAdapter::in_memory(),
    };
    let config = match store.load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Stored config rejected ({e}), running with defaults");
            EngineConfig::default()
        }
    };
    if !store.contains(CONFIG_KEY) {
        store.save(&config)?;
    }

    // ── 3. Engine ─────────────────────────────────────────────
    let registry = Arc::new(PolicyRegistry::new(ScriptCompiler::new(&config)));
    let mut app = EngineService::new(config.clone(), registry);
    let mut hw = SimHardware::new();
    hw.set_load(args.load);
    let mut sink = LogEventSink::new();

    app.start(&mut hw, &store, &mut sink);
    if app.registry().is_empty() {
        info!("No stored bindings, attaching demo policy to {}", sim_hardware::FAN_CONTROL);
        app.handle_command(
            AppCommand::Attach {
                identifier: sim_hardware::FAN_CONTROL.into(),
                binding: Binding::new(DEMO_POLICY, true),
            },
            &mut sink,
        )
        .context("demo policy failed to compile")?;
    }

    // ── 4. Tick loop ──────────────────────────────────────────
    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || stop_handler.store(true, Ordering::SeqCst))
        .context("installing Ctrl-C handler")?;

    let interval = Duration::from_millis(u64::from(config.control_loop_interval_ms));
    let fan = Identifier::new(sim_hardware::FAN_CONTROL);
    while keep_running(args.ticks, app.tick_count(), &stop) {
        app.tick(&mut hw, &mut sink);
        app.auto_save_if_needed(&mut store, &mut sink);

        if app.tick_count() % STATUS_EVERY == 0 {
            info!(
                "STATUS | tick={} | T={:.1}C | fan={:.0}% | {}",
                app.tick_count(),
                hw.temperature(),
                hw.fan().effective_percent(),
                app.registry().reason(&fan),
            );
        }
        thread::sleep(interval);
    }

    // ── 5. Shutdown ───────────────────────────────────────────
    if stop.load(Ordering::SeqCst) {
        info!("Interrupted, shutting down");
    }
    app.shutdown(&mut hw, &mut store, &mut sink);
    store.flush().context("flushing settings")?;
    Ok(())
}

/// Another tick runs unless Ctrl-C was pressed or the tick limit is reached.
fn keep_running(limit: Option<u64>, ticks: u64, stop: &AtomicBool) -> bool {
    !stop.load(Ordering::SeqCst) && limit.is_none_or(|limit| ticks < limit)
}
