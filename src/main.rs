mod cli;

use lyrebird::{
    config::{self, Config},
    events::EventBus,
    extract::{self, FfprobeExtractor},
    providers,
    sync::{LibrarySync, ScanStatus},
};
use lyrebird_common::EntityKind;
use lyrebird_db::pool::{get_conn, init_pool, DbPool};
use lyrebird_db::queries::{catalog, indexes, scans};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "lyrebird=trace,lyrebird_db=debug,lyrebird_common=debug".to_string()
        } else {
            "lyrebird=info,lyrebird_db=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan { json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(scan(cli.config.as_deref(), json))
        }
        Commands::Status { json } => status(cli.config.as_deref(), json),
        Commands::Artwork {
            kind,
            id,
            size,
            output,
        } => write_artwork(cli.config.as_deref(), kind, &id, size, output.as_deref()),
        Commands::Genres => genres(cli.config.as_deref()),
        Commands::Search { query, limit } => search(cli.config.as_deref(), &query.join(" "), limit),
        Commands::CheckTools => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("lyrebird {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Load the config and open the database under its data directory.
fn open_store(config_path: Option<&Path>) -> Result<(Config, DbPool)> {
    let config = config::load_config_or_default(config_path)?;

    std::fs::create_dir_all(&config.data.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.data.data_dir.display()
        )
    })?;

    let db_path = config.data.database_path();
    let db_path_str = db_path.to_string_lossy();
    tracing::debug!(path = %db_path_str, "Opening database");
    let pool = init_pool(&db_path_str)?;

    Ok((config, pool))
}

async fn scan(config_path: Option<&Path>, json: bool) -> Result<()> {
    let (config, pool) = open_store(config_path)?;

    let extractor = Arc::new(FfprobeExtractor::discover(
        &config.tools,
        &config.library.audio_extensions,
    ));
    let registry = Arc::new(providers::build_registry(&config.providers)?);
    let events = Arc::new(EventBus::default());

    let sync = LibrarySync::new(config, pool, extractor, registry, events)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling scan");
            ctrl_c.cancel();
        }
    });

    let result = sync.run(cancel).await;

    // Let queued thumbnails land before the runtime shuts down.
    sync.resolver().thumbnails().wait_idle().await;

    let report = result?;
    let status = sync.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
        println!("Files seen: {}", report.files_seen);
        println!("Files skipped: {}", report.files_skipped);
        println!("Removed: {}", report.removed);
        println!("Artwork updated: {}", report.artwork_updated);
    }

    Ok(())
}

fn print_status(status: &ScanStatus) {
    println!("Status: {}", status.status);
    println!("Running: {}", status.running);
    println!("Files processed: {}", status.files_processed);
    println!("Folders processed: {}", status.folders_processed);
    if let Some(started) = status.started_at {
        println!("Started: {}", started.to_rfc3339());
    }
    if let Some(completed) = status.completed_at {
        println!("Completed: {}", completed.to_rfc3339());
    }
}

fn status(config_path: Option<&Path>, json: bool) -> Result<()> {
    let (_config, pool) = open_store(config_path)?;
    let conn = get_conn(&pool)?;

    let latest = scans::latest_run(&conn)?;
    let totals = catalog::counts(&conn)?;
    let status = latest
        .as_ref()
        .map(ScanStatus::from_run)
        .unwrap_or_else(ScanStatus::idle);

    if json {
        let value = serde_json::json!({
            "scan": status,
            "error": latest.as_ref().and_then(|run| run.error.clone()),
            "catalog": totals,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_status(&status);
    if let Some(error) = latest.as_ref().and_then(|run| run.error.as_deref()) {
        println!("Error: {}", error);
    }
    println!();
    println!("Catalog: {} files in {} folders", totals.files, totals.folders);
    Ok(())
}

fn write_artwork(
    config_path: Option<&Path>,
    kind: EntityKind,
    id: &str,
    size: Option<u32>,
    output: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let storage = lyrebird::artwork::ArtworkStorage::new(
        config.data.artwork_dir(),
        config.artwork.jpeg_quality,
    );

    let Some(artwork) = storage.read_artwork(kind, id, size)? else {
        anyhow::bail!("No artwork stored for {} {}", kind, id);
    };

    match output {
        Some(path) => {
            std::fs::write(path, &artwork.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Wrote {} bytes to {} (modified {})",
                artwork.bytes.len(),
                path.display(),
                artwork.modified.to_rfc3339()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&artwork.bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn genres(config_path: Option<&Path>) -> Result<()> {
    let (_config, pool) = open_store(config_path)?;
    let conn = get_conn(&pool)?;

    let counts = indexes::genre_counts(&conn)?;
    if counts.is_empty() {
        println!("No genres in the catalog.");
    }
    for genre in counts {
        println!("{:>6}  {}", genre.track_count, genre.genre);
    }
    Ok(())
}

fn search(config_path: Option<&Path>, query: &str, limit: usize) -> Result<()> {
    let (_config, pool) = open_store(config_path)?;
    let conn = get_conn(&pool)?;

    let paths = indexes::search_tracks(&conn, query, limit)?;
    if paths.is_empty() {
        println!("No matches for {:?}", query);
    }
    for path in paths {
        println!("{}", path);
    }
    Ok(())
}

async fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = extract::check_tools(&config.tools).await;
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            config::validate_config(&config)?;
            print_config_summary(&config);
        }
    }

    Ok(())
}

fn print_config_summary(config: &Config) {
    println!("  Music dirs: {}", config.library.music_dirs.len());
    for dir in &config.library.music_dirs {
        println!("    {}", dir.display());
    }
    println!("  Extensions: {}", config.library.audio_extensions.join(", "));
    println!("  Data dir: {}", config.data.data_dir.display());
    println!("  Concurrency: {}", config.scan.concurrency);
    println!(
        "  Thumbnails: {}px, quality {}",
        config.artwork.thumbnail_size, config.artwork.jpeg_quality
    );
    println!("  MusicBrainz enabled: {}", config.providers.musicbrainz.enabled);
    println!("  Deezer enabled: {}", config.providers.deezer.enabled);
}
