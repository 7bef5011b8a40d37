//! pgraster-streamer - read windows of tiled PostGIS rasters.
//!
//! This binary wires a PostGIS tile index to a fetcher and runs one command.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pgraster_streamer::{
    config::{Cli, Command, ConnectionArgs, ReadArgs},
    DatasetConfig, PostgisTileIndex, RasterSource, TiledRasterFetcher,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.connection.verbose);

    if let Err(e) = cli.connection.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let dataset = match DatasetConfig::load(&cli.connection.dataset) {
        Ok(dataset) => dataset,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let index = match PostgisTileIndex::connect(
        &cli.connection.database_url,
        cli.connection.max_connections,
    )
    .await
    {
        Ok(index) => index,
        Err(e) => {
            error!("Failed to connect to the database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Read(args) => run_read(&cli.connection, index, dataset, args).await,
        Command::Describe => run_describe(index, dataset),
        Command::Levels => run_levels(index, dataset).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pgraster_streamer=debug,sqlx=info"
    } else {
        "pgraster_streamer=info,sqlx=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Read Command
// =============================================================================

async fn run_read(
    connection: &ConnectionArgs,
    index: PostgisTileIndex,
    mut dataset: DatasetConfig,
    args: ReadArgs,
) -> ExitCode {
    if args.discover_overviews {
        match index.discover_levels(&dataset.table).await {
            Ok(overviews) => {
                info!("Discovered {} overview level(s)", overviews.len());
                dataset = dataset.with_overviews(overviews);
            }
            Err(e) => {
                error!("Overview lookup failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let spec = match args.output_spec(dataset.sample_type()) {
        Ok(spec) => spec,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let fetcher = match TiledRasterFetcher::new(index, dataset) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let window = args.window();
    info!(
        dataset = %connection.dataset.display(),
        "Reading {}x{} at ({}, {}) into a {}x{} {} buffer",
        window.width,
        window.height,
        window.x_offset,
        window.y_offset,
        spec.width,
        spec.height,
        spec.pixel_type
    );

    let result = match args.level {
        Some(level) => fetcher.read_level(level, window, spec).await,
        None => fetcher.read(window, spec).await,
    };
    let read = match result {
        Ok(read) => read,
        Err(e) => {
            error!("Read failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::fs::write(&args.output, &read.data).await {
        error!("Failed to write {}: {}", args.output.display(), e);
        return ExitCode::FAILURE;
    }

    println!("Level:            {}", read.report.level);
    println!("Tiles fetched:    {}", read.report.tiles_fetched);
    println!("Tiles composited: {}", read.report.tiles_composited);
    println!("Tiles skipped:    {}", read.report.skipped.len());
    for skipped in &read.report.skipped {
        println!(
            "  ({}, {}): {}",
            skipped.upper_left_x, skipped.upper_left_y, skipped.reason
        );
    }
    println!("Wrote {} bytes to {}", read.data.len(), args.output.display());

    ExitCode::SUCCESS
}

// =============================================================================
// Describe Command
// =============================================================================

fn run_describe(index: PostgisTileIndex, dataset: DatasetConfig) -> ExitCode {
    let fetcher = match TiledRasterFetcher::new(index, dataset) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&fetcher.describe()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize description: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Levels Command
// =============================================================================

async fn run_levels(index: PostgisTileIndex, dataset: DatasetConfig) -> ExitCode {
    let overviews = match index.discover_levels(&dataset.table).await {
        Ok(overviews) => overviews,
        Err(e) => {
            error!("Overview lookup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Levels of {}", dataset.table);
    println!("─────────────────");
    println!(
        "  0  factor 1   {}x{}  {}",
        dataset.width, dataset.height, dataset.table
    );
    for (i, overview) in overviews.iter().enumerate() {
        println!(
            "  {}  factor {:<3} {}x{}  {}",
            i + 1,
            overview.factor,
            dataset.width / overview.factor.max(1),
            dataset.height / overview.factor.max(1),
            overview.table
        );
    }

    ExitCode::SUCCESS
}
