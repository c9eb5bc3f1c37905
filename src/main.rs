//! dataformat - streaming export of search results
//!
//! Loads an NDJSON data set into the bundled in-memory backend and exports
//! it page by page into one output file.
//!
//! # Usage
//!
//! ```bash
//! # CSV download written to ./dataset0-<timestamp>.csv
//! dataformat export -i data.ndjson -f csv
//!
//! # GeoJSON into a named file
//! dataformat export -i places.ndjson -f geojson -o places.geojson \
//!     -p geometry.lon_field=location.lon -p geometry.lat_field=location.lat
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};

use dataformat::backend::MemoryBackend;
use dataformat::cli::{CliInterface, Commands};
use dataformat::error::{DataFormatError, Result};
use dataformat::export::{ExportResponse, ExportSession};
use dataformat::utils::convert::format_bytes;
use dataformat::utils::time::format_duration;

/// Exit status after Ctrl+C
const EXIT_CANCELLED: i32 = 130;

/// Application entry point
#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Main application logic
///
/// # Returns
/// * `Result<i32>` - Process exit status or error
async fn run() -> Result<i32> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(0);
    }

    let Commands::Export {
        input,
        index,
        progress,
        ..
    } = &cli.args().command
    else {
        return Ok(0);
    };

    let params = cli.export_params()?;
    let export_config = cli.config().export.clone();

    let backend = MemoryBackend::new(export_config.page_size);
    let loaded = backend.load_ndjson(input, index).await?;
    info!("Loaded {} documents into index {}", loaded, index);

    let session = ExportSession::new(Arc::new(backend), export_config)
        .with_progress(*progress && !cli.args().quiet);

    // Ctrl+C stands in for a client disconnect
    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel_token_clone.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    let started = Instant::now();
    let response = session.execute(&params, Arc::new(cancel_token)).await;
    ctrl_c_handle.abort();

    match response {
        ExportResponse::Attachment { file_name, body, .. } => {
            let path = download_path(&file_name);
            tokio::fs::write(&path, &body).await?;
            println!(
                "Exported {} to {} in {}",
                format_bytes(body.len() as u64),
                path.display(),
                format_duration(started.elapsed())
            );
            Ok(0)
        }
        ExportResponse::Acknowledged { file } => {
            println!("Exported to {} in {}", file.display(), format_duration(started.elapsed()));
            Ok(0)
        }
        ExportResponse::Disconnected => {
            eprintln!("Export cancelled");
            Ok(EXIT_CANCELLED)
        }
        error @ ExportResponse::Error { .. } => Err(DataFormatError::Generic(
            String::from_utf8_lossy(&error.body()).into_owned(),
        )),
    }
}

/// Timestamped local file for an attachment named `file_name`
fn download_path(file_name: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => PathBuf::from(format!("{stem}-{timestamp}.{ext}")),
        None => PathBuf::from(format!("{file_name}-{timestamp}")),
    }
}

/// Initialize logging system based on verbosity level
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
