//! Reminisce daemon for scheduled video generation.
//!
//! Fires the midnight trigger for every configured patient at local
//! midnight, and a background top-up for each of them every poll interval
//! so a day that was cut short by failures still reaches its quota.
//!
//! ## Usage
//!
//! ```bash
//! reminisce-daemon              # Run in foreground
//! reminisce-daemon --once       # One background pass, then exit
//! ```
//!
//! ## systemd Service
//!
//! Install the service file and enable:
//! ```bash
//! sudo cp reminisce.service /etc/systemd/system/
//! sudo systemctl enable --now reminisce
//! ```

use anyhow::{bail, Result};
use chrono::Local;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use reminisce::clock::until_next_midnight;
use reminisce::config::Config;
use reminisce::logging;
use reminisce::scheduler::Trigger;
use reminisce::services::{poll_interval, Services};

/// Command line options
#[derive(Debug, Default)]
struct DaemonArgs {
    /// Run once and exit
    once: bool,
    /// Poll interval override (seconds)
    interval: Option<u64>,
    /// Config path override
    config_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    let _ = logging::init(None);
    info!("Reminisce daemon starting...");

    let mut config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(interval) = args.interval {
        config.daemon.poll_interval_secs = interval;
    }
    if config.daemon.patients.is_empty() {
        bail!("No patients configured under [daemon]");
    }
    info!("Config loaded, {} patient(s)", config.daemon.patients.len());

    let services = Services::build(config)?;

    if args.once {
        info!("Running in single-shot mode");
        run_trigger(&services, Trigger::Background).await;
    } else {
        run_daemon_loop(&services).await;
    }

    info!("Reminisce daemon stopped");
    Ok(())
}

fn parse_args() -> DaemonArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = DaemonArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" | "-1" => {
                parsed.once = true;
            }
            "--interval" | "-i" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse() {
                        Ok(interval) => parsed.interval = Some(interval),
                        Err(_) => eprintln!("Ignoring invalid interval: {}", args[i + 1]),
                    }
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("reminisce-daemon {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"reminisce-daemon - Scheduled video generation for Reminisce

USAGE:
    reminisce-daemon [OPTIONS]

OPTIONS:
    --once, -1          Run one background top-up for every patient and exit
    --interval, -i N    Background poll interval in seconds (default: 3600)
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    REMINISCE_CONFIG    Path to config file (overrides default location)
    REMINISCE_LOG       Log level (trace, debug, info, warn, error)

Patients are listed in the [daemon] section of the config file. At local
midnight each one gets a fresh day of videos; every poll interval any
videos still owed for today are generated.

Install as systemd service:
    sudo cp reminisce.service /etc/systemd/system/
    sudo systemctl enable --now reminisce
"#
    );
}

async fn run_daemon_loop(services: &Services) {
    let shutdown = Arc::new(Notify::new());
    let cancel = services.scheduler.cancel_flag();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            warn!("Shutdown requested, finishing the current video");
            cancel.store(true, Ordering::SeqCst);
            // Stores a permit if the loop is busy generating
            shutdown.notify_one();
        });
    }

    let interval = poll_interval(&services.config);
    info!("Running in daemon mode, top-up every {} seconds", interval.as_secs());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Recomputed each pass so DST changes and long batches are honoured
        let until_midnight = until_next_midnight(Local::now());

        tokio::select! {
            _ = shutdown.notified() => break,
            _ = tokio::time::sleep(until_midnight) => {
                run_trigger(services, Trigger::Midnight).await;
                // Leave the midnight instant before recomputing
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            _ = ticker.tick() => {
                run_trigger(services, Trigger::Background).await;
            }
        }
    }
}

async fn run_trigger(services: &Services, trigger: Trigger) {
    for patient_id in &services.config.daemon.patients {
        if services.scheduler.cancel_flag().load(Ordering::SeqCst) {
            break;
        }
        let report = services.scheduler.handle(patient_id, trigger).await;
        match &report.error {
            Some(e) => warn!("{} trigger for {} did not run: {}", trigger, patient_id, e),
            None => info!(
                "{} trigger for {}: {}/{} generated",
                trigger,
                patient_id,
                report.generated.len(),
                report.owed
            ),
        }
    }
}
