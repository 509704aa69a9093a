//! Command-line front end.
//!
//! The interesting machinery lives in the library; this binary is the
//! minimal controlling process: parse the two inputs, gate them through
//! the lifecycle state machine, fork the collector, and narrate its update
//! stream until the operator interrupts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};

use wardrift::collect::{Collector, ErrorKind, Update};
use wardrift::config::{Config, ConnectMode};
use wardrift::lifecycle::Lifecycle;
use wardrift::radio::{Controller, Nl80211Control};

/// How long setup may take before the collector is declared stuck.
const SETUP_DEADLINE: Duration = Duration::from_secs(30);

/// How long a commanded teardown may take before the collector is killed.
const QUIT_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(version, about = "Map the access points and stations of a wireless network")]
struct Args {
    /// Wireless device to capture on.
    #[arg(short = 'i', long)]
    interface: String,

    /// Target network name.
    #[arg(short = 's', long)]
    ssid: String,

    /// What downstream consumers should do with a viable station.
    #[arg(long, value_enum, default_value_t = ConnectMode::Auto)]
    connect: ConnectMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !nix::unistd::Uid::effective().is_root() {
        bail!("monitor mode and packet sockets need root; re-run with sudo");
    }

    // Preflight the device before touching anything: it must exist, speak
    // nl80211 and support monitor mode, or Configure is refused outright.
    let radio = Nl80211Control::new().context("nl80211 unavailable")?;
    Controller::new(radio)
        .probe(&args.interface)
        .with_context(|| format!("{} is not usable for capture", args.interface))?;

    let config = Config::new(args.ssid.as_bytes(), args.interface.clone(), args.connect);
    let mut lifecycle = Lifecycle::new();
    lifecycle.configured()?;
    info!(
        "configured: ssid \"{}\" on {} ({:?})",
        args.ssid, args.interface, args.connect
    );

    let quit = Arc::new(AtomicBool::new(false));
    let quit_handler = Arc::clone(&quit);
    ctrlc::set_handler(move || {
        quit_handler.store(true, Ordering::Relaxed);
    })
    .context("signal handler")?;

    let mut collector = Collector::spawn(&config)?;

    // Setup outcome arrives as the first update; the lifecycle only moves
    // to scanning once the supervisor says so.
    let setup_started = Instant::now();
    loop {
        match collector.next_event() {
            Ok(Some(Update::ScanStarted { scan_entries })) => {
                lifecycle.scan_started()?;
                info!("scanning {} frequency/width combinations", scan_entries);
                break;
            }
            Ok(Some(Update::Error { kind, message }))
                if kind == ErrorKind::Setup || kind == ErrorKind::NonPrivileged =>
            {
                error!("collector setup failed: {}", message);
                let _ = collector.wait(QUIT_DEADLINE);
                bail!("run aborted; configuration kept");
            }
            Ok(Some(update)) => display(&update),
            Ok(None) => {
                if quit.load(Ordering::Relaxed) || setup_started.elapsed() > SETUP_DEADLINE {
                    let _ = collector.quit();
                    let _ = collector.wait(QUIT_DEADLINE);
                    bail!("collector did not come up");
                }
            }
            Err(e) => {
                let _ = collector.wait(QUIT_DEADLINE);
                return Err(e).context("collector died during setup");
            }
        }
    }

    info!("ctrl-c to stop");
    while !quit.load(Ordering::Relaxed) {
        match collector.next_event() {
            Ok(Some(update)) => display(&update),
            Ok(None) => {}
            Err(e) => {
                warn!("update stream ended: {}", e);
                break;
            }
        }
    }

    info!("stopping");
    let _ = collector.quit();
    // Drain teardown reports (restore errors, hung workers) until the
    // stream closes.
    let drain_started = Instant::now();
    loop {
        match collector.next_event() {
            Ok(Some(update)) => display(&update),
            Ok(None) => {
                if drain_started.elapsed() > QUIT_DEADLINE {
                    break;
                }
            }
            Err(_) => break,
        }
    }

    let clean = collector.wait(QUIT_DEADLINE)?;
    if clean {
        lifecycle.scan_stopped()?;
        info!("adapter restored");
    } else {
        warn!("collector exit was not clean; the adapter may need manual recovery");
    }
    lifecycle.quitting()?;
    Ok(())
}

fn display(update: &Update) {
    match update {
        Update::ScanStarted { scan_entries } => {
            info!("scanning {} frequency/width combinations", scan_entries);
        }
        Update::ApNew { bssid, rss } => {
            info!("AP  + {} {}", bssid, fmt_rss(*rss));
        }
        Update::ApUpdated { bssid, rss } => {
            info!("AP    {} {}", bssid, fmt_rss(*rss));
        }
        Update::StaNew { sta, record } => {
            info!(
                "STA + {} via {} ch {} {}",
                sta,
                record.bssid,
                record
                    .channel
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "?".into()),
                fmt_rss(record.rss),
            );
        }
        Update::StaUpdated { sta, record } => {
            info!(
                "STA   {} via {} ch {} {}",
                sta,
                record.bssid,
                record
                    .channel
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "?".into()),
                fmt_rss(record.rss),
            );
        }
        Update::Error { kind, message } => {
            warn!("collector: {:?}: {}", kind, message);
        }
    }
}

fn fmt_rss(rss: Option<i8>) -> String {
    match rss {
        Some(dbm) => format!("{} dBm", dbm),
        None => "? dBm".into(),
    }
}
