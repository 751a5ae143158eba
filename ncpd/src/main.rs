//! ncpd — entry point.
//!
//! ```text
//! ncpd                       Run in the foreground
//! ncpd --config <path>       Load a custom config TOML
//! ncpd --socket <host:port>  Override the NCP socket address
//! ncpd --gen-config          Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ncpd::config::DaemonConfig;
use ncpd::service::NcpService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ncpd", about = "Spinel network co-processor host daemon")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "ncpd.toml")]
    config: PathBuf,

    /// NCP socket address, overriding the configuration file.
    #[arg(short, long)]
    socket: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&DaemonConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = DaemonConfig::load(&cli.config);
    if let Some(socket) = cli.socket {
        config.link.socket = socket;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("ncpd v{}", env!("CARGO_PKG_VERSION"));
    info!("ncp socket: {}", config.link.socket);
    info!(
        "enabled: {}, auto deep sleep: {}",
        config.ncp.enabled, config.ncp.auto_deep_sleep
    );

    let service = NcpService::new(config);
    let stop = service.stop_handle();

    let stop_clone = stop.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop_clone.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    service.run().await?;

    Ok(())
}
