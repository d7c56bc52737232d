//! Haptic: Raspberry Pi host
//!
//! Loads the haptic and GPIO shutdown plugins from the device config, then
//! feeds them lifecycle events read as NDJSON from stdin. Status replies go
//! to stdout; logs go to stderr. Closing stdin unloads every plugin and
//! releases the GPIO lines.

mod config;
mod gpio;

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use haptic::comm::{self, LineReader, Outcome};
use haptic::defaults::{PLUGIN_NAME, SHUTDOWN_PLUGIN_NAME};
use haptic::display::MemoryDisplay;
use haptic::gpio::mock::MockGpio;
use haptic::gpio::{Gpio, GpioBackend};
use haptic::haptic::Haptic;
use haptic::plugin::Plugin;
use haptic::protocol::{HostCommand, VERSION};
use haptic::shutdown::GpioShutdown;

use crate::gpio::RppalGpio;

#[derive(Parser, Debug)]
#[command(name = "haptic-rpi")]
#[command(about = "Haptic feedback host for Raspberry Pi companion devices", long_about = None)]
struct Args {
    /// Device configuration file
    #[arg(short, long, default_value = "/etc/pwnagotchi/config.toml")]
    config: PathBuf,

    /// Status display width in pixels
    #[arg(long, default_value_t = 250)]
    ui_width: u32,

    /// Use an in-memory GPIO backend instead of the real pins
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("haptic=info,haptic_rpi=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    log::info!("haptic-rpi v{}", VERSION);

    let config = config::load(&args.config)?;

    let backend: Arc<dyn GpioBackend> = if args.dry_run {
        log::info!("dry run: GPIO writes are not sent to hardware");
        Arc::new(MockGpio::new())
    } else {
        Arc::new(RppalGpio::new()?)
    };
    let gpio = Gpio::new(backend);
    let display = Arc::new(MemoryDisplay::new(args.ui_width));

    let mut others: Vec<Box<dyn Plugin>> = Vec::new();
    if let Some(options) = config::plugin_options(&config, SHUTDOWN_PLUGIN_NAME)? {
        let dry_run = args.dry_run;
        let mut shutdown = GpioShutdown::new(gpio.clone(), move || power_off(dry_run));
        shutdown.on_loaded(&options);
        others.push(Box::new(shutdown));
    }

    let mut haptic = Haptic::new(gpio);
    if let Some(options) = config::plugin_options(&config, PLUGIN_NAME)? {
        haptic.on_loaded(&options);
    }
    haptic.on_ui_setup(display.clone());
    for plugin in others.iter_mut() {
        plugin.on_ui_setup(display.clone());
    }

    event_loop(&mut haptic, &mut others)
}

/// Read host events until `unload` or end of input.
fn event_loop(haptic: &mut Haptic, others: &mut [Box<dyn Plugin>]) -> anyhow::Result<()> {
    let mut stdin = io::stdin().lock();
    let mut reader = LineReader::new();
    let mut chunk = [0u8; 64];

    loop {
        let n = match stdin.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        for &byte in &chunk[..n] {
            let Some(line) = reader.feed(byte) else {
                continue;
            };
            let Some(cmd) = comm::parse_command(line) else {
                log::warn!("ignoring host line: {}", String::from_utf8_lossy(line));
                continue;
            };
            match comm::handle_command(cmd, haptic, others) {
                Outcome::Continue => {}
                Outcome::Reply(msg) => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(&msg)?;
                    stdout.flush()?;
                }
                Outcome::Exit => return Ok(()),
            }
        }
    }

    log::info!("host input closed, unloading plugins");
    comm::handle_command(HostCommand::Unload, haptic, others);
    Ok(())
}

fn power_off(dry_run: bool) {
    if dry_run {
        log::warn!("dry run: not shutting down");
        return;
    }
    match Command::new("shutdown").args(["-h", "now"]).spawn() {
        Ok(_) => {}
        Err(e) => log::error!("shutdown command failed: {}", e),
    }
}
