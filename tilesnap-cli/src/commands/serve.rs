//! `tilesnap serve`: run the tile server.

use clap::Args;
use std::sync::Arc;
use tracing::info;
use tilesnap::service::{ServiceError, TileService};
use tilesnap::snapshot::{SliceDate, StoreError};

use crate::error::CliError;
use crate::runner::CliRunner;
use crate::server::{self, AppState};

/// Arguments of `tilesnap serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on (defaults to the configured port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Snapshot to load on startup
    #[arg(long, value_name = "NAME")]
    pub load: Option<String>,

    /// With --load, start from the earliest change at or after this date
    #[arg(long, value_name = "DATE", requires = "load")]
    pub after: Option<String>,
}

/// Run `tilesnap serve` until Ctrl+C.
pub fn run(runner: &CliRunner, args: ServeArgs) -> Result<(), CliError> {
    runner.log_startup("serve");

    let config = runner.config();
    let port = args.port.unwrap_or(config.server.port);
    let after = args.after.as_deref().map(SliceDate::parse_loose).transpose()?;

    let store = Arc::new(runner.store());
    let service = Arc::new(TileService::new(store, &config.service_config()));
    let state = AppState::new(
        Arc::clone(&service),
        runner.downloader()?,
        config.slice_options(),
    )
    .with_cache_control(config.cache_control_header());

    runner.block_on(async {
        if let Some(name) = &args.load {
            match service.load(name, after).await {
                Ok(slice) => println!(
                    "Snapshot was successfully loaded. The current snapshot is {}",
                    slice
                ),
                Err(ServiceError::Store(StoreError::NotFound(_))) => {
                    println!("Snapshot not found.");
                }
                Err(e) if e.is_not_found() => println!("{}", e),
                Err(e) => return Err(CliError::Service(e)),
            }
        }

        println!("Tile server on :{}", port);
        info!(port = port, workers = service.scheduler().workers(), "Starting tile server");
        server::serve(Arc::new(state), port)
            .await
            .map_err(CliError::Serve)
    })
}
