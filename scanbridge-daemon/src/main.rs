//! Scanbridge daemon — entry point.
//!
//! ```text
//! scanbridge-daemon                  Run the demo in the foreground
//! scanbridge-daemon --config <path>  Load a custom config TOML
//! scanbridge-daemon --gen-config     Write default config to stdout
//! scanbridge-daemon --duration <s>   Stop after this many seconds
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scanbridge_daemon::config::DaemonConfig;
use scanbridge_daemon::demo;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "scanbridge-daemon", about = "Scanbridge demo capture daemon")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "scanbridge.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Stop automatically after this many seconds.
    #[arg(long)]
    duration: Option<u64>,
}

// ── Main ─────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&DaemonConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = DaemonConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("scanbridge-daemon v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "surface: {}x{}, scan {} rows x {} tiles, {}-{} sweeps/s",
        config.display.width,
        config.display.height,
        config.scan.rows,
        config.scan.tiles_per_row,
        config.scan.min_fps,
        config.scan.max_fps,
    );

    let running = Arc::new(AtomicBool::new(true));

    // Stop from the keyboard: a reader thread flips the flag when
    // stdin closes or a line arrives. --duration works unattended.
    let stop = Arc::clone(&running);
    std::thread::Builder::new()
        .name("scanbridge-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            // EOF means no terminal is attached; leave the run loop
            // to --duration or an external kill in that case.
            if matches!(std::io::stdin().read_line(&mut line), Ok(n) if n > 0) {
                info!("stop requested, shutting down");
                stop.store(false, Ordering::SeqCst);
            }
        })?;

    demo::run(&config, running, cli.duration.map(Duration::from_secs))?;
    Ok(())
}
