//! ClassLens: natural-language analytics server over a course catalog.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use classlens_core::ClassLensConfig;
use classlens_resolve::{build_context, ResolutionService, TermResolution};
use classlens_server::{build_router, refresh, AppState};
use classlens_store::SqliteStore;

fn resolve_data_dir() -> PathBuf {
    std::env::var("CLASSLENS_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn print_help() {
    println!("ClassLens: natural-language analytics over a course catalog");
    println!();
    println!("Usage: classlens [command]");
    println!();
    println!("Commands:");
    println!("  (none) | serve           Start the server");
    println!("  import [seed.json]       Load a seed file into the store");
    println!("  resolve <term>...        Resolve terms and print the outcomes as JSON");
    println!("  help                     Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let data_dir = resolve_data_dir();

    match args.get(1).map(String::as_str) {
        None | Some("serve") => serve(&data_dir).await,
        Some("import") => import(&data_dir, args.get(2).map(PathBuf::from)),
        Some("resolve") => resolve(&data_dir, &args[2..]),
        Some("--help" | "-h" | "help") => {
            print_help();
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {}. Use 'classlens help' for usage.", other);
            std::process::exit(1);
        }
    }
}

fn open_store(config: &ClassLensConfig) -> anyhow::Result<SqliteStore> {
    SqliteStore::open(&config.data_paths.db_dir)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))
}

async fn serve(data_dir: &Path) -> anyhow::Result<()> {
    info!("Data directory: {}", data_dir.display());

    let config = ClassLensConfig::from_env(data_dir)?;
    let port = config.port;
    let store = open_store(&config)?;

    let state = Arc::new(AppState::new(config, store));

    refresh::spawn_warm_up(state.clone());
    refresh::start_refresh_timer(state.clone());

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("ClassLens server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn import(data_dir: &Path, file: Option<PathBuf>) -> anyhow::Result<()> {
    let config = ClassLensConfig::from_env(data_dir)?;
    let path = file.unwrap_or_else(|| config.data_paths.seed_file.clone());
    let store = open_store(&config)?;

    let report = store
        .import_seed_file(&path)
        .with_context(|| format!("importing {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn resolve(data_dir: &Path, terms: &[String]) -> anyhow::Result<()> {
    if terms.is_empty() {
        eprintln!("Usage: classlens resolve <term>...");
        std::process::exit(1);
    }

    let config = ClassLensConfig::from_env(data_dir)?;
    let store = open_store(&config)?;
    let service = ResolutionService::new(config.policy);
    service.warm_up(&store);

    let outcomes = service.resolve_all(terms);
    let resolutions: Vec<TermResolution> = outcomes
        .iter()
        .map(|(term, outcome)| TermResolution::new(term, outcome))
        .collect();
    let output = serde_json::json!({
        "resolutions": resolutions,
        "directives": build_context(&outcomes),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
