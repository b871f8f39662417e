//! doorwatch: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │  SqliteStore    SysfsGpio / SimGpio    SmtpAlertTransport    │
//! │  (Log+Flags)    (PinDriver)            LogAlertTransport     │
//! │  SystemClock    FileConfigAdapter                            │
//! │  ──────────────── Port Trait Boundary ───────────────────    │
//! │  Controller · StatusCell · MonitorService                    │
//! │  MonitorHub ──▶ watch-gpioN threads ──▶ Dispatcher thread    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `doorwatch [settings-file]` (default `doorwatch.cfg`).  Commands
//! are read from stdin; Ctrl-C / SIGTERM shuts down cleanly.

use std::io::BufRead;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tracing_subscriber::EnvFilter;

use doorwatch::adapters::config_file::FileConfigAdapter;
use doorwatch::adapters::log_sink::LogAlertTransport;
use doorwatch::adapters::sim_gpio::SimGpio;
use doorwatch::adapters::smtp::SmtpAlertTransport;
use doorwatch::adapters::sqlite_store::SqliteStore;
use doorwatch::adapters::sysfs_gpio::SysfsGpio;
use doorwatch::adapters::time::SystemClock;
use doorwatch::app::commands::Command;
use doorwatch::app::controller::Controller;
use doorwatch::app::ports::{Clock, ConfigPort};
use doorwatch::app::service::MonitorService;
use doorwatch::app::status::StatusCell;
use doorwatch::config::{GpioBackend, SystemConfig};
use doorwatch::dispatch::{Dispatcher, RetryPolicy};
use doorwatch::error::ConfigError;
use doorwatch::sensors::{MonitorHub, SensorState};
use doorwatch::sensors::watcher::{WatchContext, WatchTiming};
use doorwatch::worker::{self, CONSOLE_STACK_KB};

const DEFAULT_CONFIG_PATH: &str = "doorwatch.cfg";

/// How long startup waits for every watcher to take its first sample.
const READY_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("doorwatch v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)?;

    // ── 3. Storage + status ───────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let store = Arc::new(
        SqliteStore::open(&config.db_path, Arc::clone(&clock))
            .with_context(|| format!("opening {}", config.db_path.display()))?,
    );
    let status = Arc::new(StatusCell::new());
    let controller = Arc::new(Controller::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        Arc::clone(&status),
    ));
    let restored = controller.restore(config.missing_flag_policy);
    info!("Status: {:?}", restored.status);

    // ── 4. Alert dispatcher ───────────────────────────────────
    let dispatcher = spawn_dispatcher(&config)?;

    // ── 5. Sensor watchers ────────────────────────────────────
    let ctx = WatchContext {
        log: store.clone(),
        status,
        alerts: Arc::new(dispatcher.sink()),
        clock,
    };
    let timing = WatchTiming::new(
        config.debounce_ms,
        Duration::from_millis(u64::from(config.poll_interval_ms)),
    );
    let (hub, sim) = match config.gpio_backend {
        GpioBackend::Sysfs => {
            let driver = Arc::new(SysfsGpio::new(&config.gpio_root, timing.poll_interval));
            (MonitorHub::start(&config.sensors, driver, timing, ctx), None)
        }
        GpioBackend::Sim => {
            warn!("GPIO backend is simulated; drive pins with 'set <pin> open|closed'");
            let sim = SimGpio::new();
            let hub = MonitorHub::start(&config.sensors, Arc::new(sim.clone()), timing, ctx);
            (hub, Some(sim))
        }
    };

    if !hub.wait_ready(READY_TIMEOUT) {
        warn!("Some watchers did not report within {:?}", READY_TIMEOUT);
    }
    for s in hub.snapshot() {
        if s.state == SensorState::Unmonitored {
            error!("Sensor '{}' (GPIO{}) is NOT monitored", s.name, s.pin);
        } else {
            info!("Sensor '{}' (GPIO{}): {}", s.name, s.pin, s.state);
        }
    }

    // ── 6. Operator console + signals ─────────────────────────
    let service = Arc::new(MonitorService::new(
        controller,
        store,
        hub.sensors().to_vec(),
    ));
    spawn_console(Arc::clone(&service), sim)?;

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("installing signal handler")?;

    info!("Monitoring {} sensor(s); Ctrl-C to stop", config.sensors.len());
    let _ = stop_rx.recv();

    // ── 7. Shutdown: watchers first so no alert is queued late ──
    info!("Shutting down");
    hub.shutdown();
    dispatcher.shutdown();
    info!("Bye");
    Ok(())
}

fn load_config(path: &str) -> Result<SystemConfig> {
    match FileConfigAdapter::new(path).load() {
        Ok(settings) => SystemConfig::from_settings(&settings)
            .with_context(|| format!("invalid settings in {path}")),
        Err(ConfigError::NotFound) => {
            warn!("{} not found, running with defaults", path);
            Ok(SystemConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("reading {path}")),
    }
}

fn spawn_dispatcher(config: &SystemConfig) -> Result<Dispatcher> {
    let policy = RetryPolicy {
        attempts: config.notify_retries,
        backoff: Duration::from_millis(u64::from(config.notify_backoff_ms)),
    };
    if config.notify.smtp_enabled() {
        match SmtpAlertTransport::from_config(&config.notify) {
            Ok(smtp) => {
                return Dispatcher::spawn(smtp, policy).context("starting dispatcher");
            }
            Err(e) => warn!("SMTP unusable ({}); alerts go to the log only", e),
        }
    } else {
        info!("No SMTP relay configured; alerts go to the log only");
    }
    Dispatcher::spawn(LogAlertTransport::new(), policy).context("starting dispatcher")
}

/// Read commands from stdin until EOF.  The thread is detached: a blocked
/// stdin read must not hold up shutdown.
fn spawn_console(service: Arc<MonitorService<SqliteStore>>, sim: Option<SimGpio>) -> Result<()> {
    worker::spawn_named("console", CONSOLE_STACK_KB, move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!("console: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let reply = match Command::parse(&line) {
                Ok(Command::SetPin { pin, open }) => match &sim {
                    Some(sim) => {
                        sim.set_level(pin, open);
                        format!("GPIO{pin} -> {}", if open { "HIGH" } else { "LOW" })
                    }
                    None => service.execute(&Command::SetPin { pin, open }),
                },
                Ok(cmd) => service.execute(&cmd),
                Err(e) => format!("{e}\n{}", doorwatch::app::commands::HELP),
            };
            println!("{reply}");
        }
        info!("console: stdin closed");
    })
    .context("starting console")?;
    Ok(())
}
