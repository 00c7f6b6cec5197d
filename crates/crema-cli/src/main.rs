//! `crema` – espresso boiler controller command line.
//!
//! `crema run` drives the simulated boiler with the full controller stack:
//! hybrid control loop, telemetry gate, link scheduler and remote commands.
//! `crema config` prints (or writes) the effective configuration.
//!
//! Ctrl-C ends the current window, switches the heater off and exits.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use clap::{Parser, Subcommand};
use colored::Colorize;
use crema_control::{ControlHardware, ControlLoop};
use crema_hal::sim::SimBoiler;
use crema_hal::{Clock, NullIndicator, SimClock, SystemClock};
use crema_middleware::bus::TopicReceiver;
use crema_middleware::{
    BrokerHandle, BusTransport, EventBus, RandomClientId, TcpTransport, Topic, Transport,
};
use crema_runtime::{Supervisor, init_tracing};
use crema_types::{CremaError, EventPayload, TransportKind};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "crema")]
#[command(about = "Espresso boiler temperature controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller against the simulated boiler
    Run {
        /// Configuration file (defaults to ~/.crema/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Simulated time: every window completes instantly
        #[arg(long)]
        fast: bool,
        /// Stop after this many control cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Configuration file (defaults to ~/.crema/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write the effective configuration to the file if it does not exist
        #[arg(long)]
        init: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing("crema");

    let result = match cli.command {
        Commands::Run {
            config,
            fast,
            cycles,
        } => run(config.unwrap_or_else(config::config_path), fast, cycles),
        Commands::Config { config, init } => {
            show_config(config.unwrap_or_else(config::config_path), init)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(path: PathBuf, fast: bool, cycles: Option<u64>) -> Result<(), CremaError> {
    let cfg = config::resolve(&path)?;
    print_banner();
    println!(
        "  Target {}  window {}  telemetry {} ({})",
        format!("{:.1} °C", cfg.control.setpoint).bold(),
        format!("{} ms", cfg.control.window_ms).bold(),
        cfg.telemetry.transport.to_string().bold(),
        cfg.telemetry.broker.dimmed(),
    );
    if fast {
        println!("  {}", "Simulated time: windows complete instantly.".dimmed());
    }
    println!();

    // ── Shutdown flag ─────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – finishing this window, heater going off …"
                .yellow()
                .bold()
        );
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    // ── Hardware ──────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock> = if fast {
        Arc::new(SimClock::new())
    } else {
        Arc::new(SystemClock::new())
    };
    let boiler = SimBoiler::new(
        cfg.simulation.model(),
        cfg.simulation.initial_celsius,
        clock.clone(),
    );
    let hardware = ControlHardware {
        sensor: boiler.sensor("boiler_probe"),
        relay: boiler.relay("boiler_ssr"),
        indicator: Box::new(NullIndicator),
        clock: clock.clone(),
    };
    let control = ControlLoop::new(cfg.control.clone(), cfg.sensor.clone(), hardware)?;

    // ── Telemetry link ────────────────────────────────────────────────────
    let transport: Box<dyn Transport> = match cfg.telemetry.transport {
        TransportKind::Bus => {
            let bus = EventBus::default();
            spawn_console_sink(bus.subscribe_to(Topic::Telemetry));
            Box::new(BusTransport::new(BrokerHandle::new(bus)))
        }
        TransportKind::Tcp => Box::new(TcpTransport::new(&cfg.telemetry)?),
    };

    let mut supervisor = Supervisor::new(
        control,
        cfg.sensor.clone(),
        &cfg.telemetry,
        transport,
        Box::new(RandomClientId::new(cfg.telemetry.client_id_prefix.clone())),
        clock.clone(),
    );
    let ran = supervisor.run(&shutdown, cycles);

    println!(
        "  {} {} cycles, boiler at {}, heater off.",
        "✓".green().bold(),
        ran,
        format!("{:.2} °C", boiler.temperature()).bold()
    );
    Ok(())
}

fn show_config(path: PathBuf, init: bool) -> Result<(), CremaError> {
    let cfg = config::resolve(&path)?;
    if init {
        if path.exists() {
            println!("  {} already exists, left untouched.", path.display());
        } else {
            config::save_to(&cfg, &path)?;
            println!("  {} Config saved to {}", "✓".green().bold(), path.display());
        }
    }
    print!("{}", config::to_toml(&cfg)?);
    Ok(())
}

/// Log every telemetry record published on the in-process bus.
fn spawn_console_sink(receiver: TopicReceiver) {
    thread::spawn(move || {
        let mut receiver = receiver;
        while let Some(event) = receiver.blocking_next() {
            if let EventPayload::Telemetry(record) = event.payload {
                info!(
                    target: "crema::telemetry",
                    client = %event.source,
                    topic = %record.topic,
                    payload = %record.payload,
                    "published"
                );
            }
        }
    });
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___________  ___  __ _  ___ _"#.bold().yellow());
    println!("{}", r#"  / __/ __/ -_)/ _ `/  ' \/ _ `/"#.bold().yellow());
    println!("{}", r#"  \__/_/  \__/ \_,_/_/_/_/\_,_/ "#.bold().yellow());
    println!();
    println!(
        "  {} {}",
        "crema".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Espresso boiler temperature controller");
    println!();
}
