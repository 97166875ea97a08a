//! pixpipe viewer: entry point.
//!
//! ```text
//! pixpipe-viewer                      Connect with defaults
//! pixpipe-viewer --config <path>      Use custom config TOML
//! pixpipe-viewer --producer <addr>    Override the producer address
//! pixpipe-viewer --gen-config         Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pixpipe_core::PresentationSink;
use pixpipe_viewer::config::ViewerConfig;
use pixpipe_viewer::connection::Viewer;
use pixpipe_viewer::snapshot::{NullSink, SnapshotSink};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pixpipe-viewer", about = "pixpipe frame stream viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "pixpipe-viewer.toml")]
    config: PathBuf,

    /// Producer address (overrides config). Example: 127.0.0.1:7420
    #[arg(short, long)]
    producer: Option<String>,

    /// Frame width in pixels (overrides config).
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels (overrides config).
    #[arg(long)]
    height: Option<u32>,

    /// Frames are sent whole rather than as deltas.
    #[arg(long)]
    no_delta: bool,

    /// Payloads are not LZ4 compressed.
    #[arg(long)]
    no_compression: bool,

    /// Write PPM snapshots into this directory (overrides config).
    #[arg(long)]
    snapshot_dir: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut ViewerConfig) {
        if let Some(addr) = &self.producer {
            config.network.producer_address = addr.clone();
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
        if let Some(dir) = &self.snapshot_dir {
            config.output.snapshot_dir = dir.clone();
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    cli.apply(&mut config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("pixpipe-viewer v{}", env!("CARGO_PKG_VERSION"));
    info!("producer: {}", config.network.producer_address);
    info!(
        "session: {}x{} mode={}",
        config.session.width,
        config.session.height,
        config.session.mode()
    );

    let sink: Box<dyn PresentationSink> = match config.snapshot_dir() {
        Some(dir) => {
            info!(
                "writing every {} frame(s) to {}",
                config.output.snapshot_every,
                dir.display()
            );
            Box::new(SnapshotSink::new(dir, config.output.snapshot_every)?)
        }
        None => Box::new(NullSink),
    };

    let mut viewer = Viewer::new(config, sink);
    let stop = viewer.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    match viewer.run().await {
        Ok(summary) => {
            info!(
                "done: {} frame(s) over {} session(s)",
                summary.frames, summary.sessions
            );
            Ok(())
        }
        Err(e) => {
            error!("viewer error: {e}");
            Err(e.into())
        }
    }
}
