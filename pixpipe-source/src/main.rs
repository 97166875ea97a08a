//! pixpipe source: entry point.
//!
//! ```text
//! pixpipe-source                    Serve with defaults
//! pixpipe-source --config <path>    Load a custom config TOML
//! pixpipe-source --gen-config       Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pixpipe_source::config::SourceConfig;
use pixpipe_source::pattern::Pattern;
use pixpipe_source::service::SourceService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pixpipe-source", about = "pixpipe synthetic frame source")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "pixpipe-source.toml")]
    config: PathBuf,

    /// Listen address (overrides config). Example: 0.0.0.0:7420
    #[arg(short, long)]
    listen: Option<String>,

    /// Frame width in pixels (overrides config).
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels (overrides config).
    #[arg(long)]
    height: Option<u32>,

    /// Send whole frames instead of deltas.
    #[arg(long)]
    no_delta: bool,

    /// Send payloads uncompressed.
    #[arg(long)]
    no_compression: bool,

    /// Test pattern: gradient, bars or still.
    #[arg(long)]
    pattern: Option<Pattern>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut SourceConfig) {
        if let Some(addr) = &self.listen {
            config.network.listen_address = addr.clone();
        }
        if let Some(width) = self.width {
            config.session.width = width;
        }
        if let Some(height) = self.height {
            config.session.height = height;
        }
        if self.no_delta {
            config.session.delta_enabled = false;
        }
        if self.no_compression {
            config.session.compression_enabled = false;
        }
        if let Some(pattern) = self.pattern {
            config.stream.pattern = pattern;
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SourceConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = SourceConfig::load(&cli.config);
    cli.apply(&mut config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("pixpipe-source v{}", env!("CARGO_PKG_VERSION"));
    info!("listen: {}", config.network.listen_address);
    info!(
        "session: {}x{} mode={}",
        config.session.width,
        config.session.height,
        config.session.mode()
    );
    info!("pattern: {}", config.stream.pattern);
    info!("max FPS: {}", config.stream.max_fps);

    let service = SourceService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    let stop_clone = stop.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop_clone.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    service.run().await?;

    Ok(())
}
