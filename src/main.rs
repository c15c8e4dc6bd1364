//! creator-search: run one creator search from the command line
//!
//! The query is a JSON `SearchQuery`, given as the first argument or on stdin;
//! the normalized result is printed as JSON.

use anyhow::{Context, Result};
use creator_search::{
    config::{SearchConfig, Settings},
    network::HttpClient,
    providers::ProviderFactory,
    query::SearchQuery,
    search::SearchService,
};
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let raw_query = match args.next().as_deref() {
        Some("-h") | Some("--help") => {
            print_usage();
            return Ok(());
        }
        Some("-V") | Some("--version") => {
            println!("creator-search {}", creator_search::VERSION);
            return Ok(());
        }
        Some(arg) => arg.to_string(),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read query from stdin")?;
            buf
        }
    };

    let query: SearchQuery = if raw_query.trim().is_empty() {
        SearchQuery::default()
    } else {
        serde_json::from_str(&raw_query).context("query is not a valid SearchQuery JSON object")?
    };

    info!("Starting creator-search v{}", creator_search::VERSION);

    let settings = load_settings()?;
    settings.validate()?;
    info!(
        "Loaded {} provider configs (strategy: {})",
        settings.providers.len(),
        settings.aggregation_strategy
    );

    let client = HttpClient::with_settings(&settings.outgoing)?;
    let factory = ProviderFactory::with_builtin(client);
    let service = SearchService::start(SearchConfig::new(settings), factory).await?;

    let result = service.search(&query).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

/// Load settings from file or use defaults
fn load_settings() -> Result<Settings> {
    let paths = [
        PathBuf::from("settings.yml"),
        PathBuf::from("config/settings.yml"),
        dirs::config_dir()
            .map(|p| p.join("creator-search/settings.yml"))
            .unwrap_or_default(),
    ];

    // Check environment variable first
    if let Ok(path) = std::env::var("CREATOR_SEARCH_SETTINGS_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Loading settings from: {}", path.display());
            let mut settings = Settings::from_file(&path)?;
            settings.merge_env();
            return Ok(settings);
        }
    }

    for path in paths.iter() {
        if path.exists() {
            info!("Loading settings from: {}", path.display());
            let mut settings = Settings::from_file(path)?;
            settings.merge_env();
            return Ok(settings);
        }
    }

    info!("No settings file found, using defaults");
    let mut settings = Settings::default();
    settings.merge_env();
    Ok(settings)
}

fn print_usage() {
    println!(
        r#"
creator-search v{}
Search creator profiles across discovery providers

USAGE:
    creator-search [QUERY_JSON]

    QUERY_JSON is read from stdin when omitted, e.g.
    creator-search '{{"platform":"instagram","isVerified":true}}'

OPTIONS:
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    CREATOR_SEARCH_SETTINGS_PATH     Path to settings.yml
    CREATOR_SEARCH_STRATEGY          all | highest_priority | specified_with_fallback
    CREATOR_SEARCH_DEFAULT_PROVIDER  Provider tried first with specified_with_fallback
    CREATOR_SEARCH_TIMEOUT_MS        Per-provider timeout
    CREATOR_SEARCH_PARALLEL          Run providers concurrently (true/false)
    IMPULZE_ACCESS_TOKEN             Impulze API token
    MODASH_COOKIE                    Modash session cookie
    RUST_LOG                         Log filter (default: info)
"#,
        creator_search::VERSION
    );
}
