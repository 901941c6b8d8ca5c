use anyhow::{Context, Result};
use fedtrack::{
    fetch::{fetch_index_table, DEFAULT_TICKER_URL},
    issuers::build_directory,
};
use reqwest::Client;
use std::{env, fs, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Scrape the index constituents page and write the normalized issuer
/// directory as JSON (to the given path, or stdout).
#[tokio::main]
async fn main() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let url = env::var("FEDTRACK_TICKER_URL").unwrap_or_else(|_| DEFAULT_TICKER_URL.to_string());
    let out: Option<PathBuf> = env::args_os().nth(1).map(PathBuf::from);

    let client = Client::new();
    let rows = fetch_index_table(&client, &url).await?;
    let directory = build_directory(&rows);
    let json = serde_json::to_string_pretty(&directory)?;

    match out {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("writing {:?}", path))?;
            info!(entries = directory.len(), path = %path.display(), "wrote issuer directory");
        }
        None => println!("{}", json),
    }
    Ok(())
}
