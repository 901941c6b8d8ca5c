use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::errors::{FedTrackError, FedTrackResult};

pub const DEFAULT_TICKER_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// One row of the index constituents table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerRow {
    pub symbol: String,
    pub name: String,
}

/// Fetch the constituents page and parse its sortable table.
pub async fn fetch_index_table(client: &Client, url: &str) -> Result<Vec<TickerRow>> {
    let url = Url::parse(url).with_context(|| format!("parsing ticker URL {}", url))?;
    let mut attempt = 0;

    // retry loop
    let html = loop {
        attempt += 1;

        match client.get(url.clone()).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => break body,
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(attempt, "reading body from {} failed: {}", url, e);
                    sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("reading body from {}", url));
                }
            },
            Err(e) if attempt < MAX_RETRIES => {
                warn!(attempt, "GET {} failed: {}", url, e);
                sleep(RETRY_DELAY).await;
            }
            Ok(resp) => return Err(anyhow!("HTTP error from {}: {}", url, resp.status())),
            Err(e) => return Err(e).with_context(|| format!("GET {}", url)),
        }
    };

    let rows = parse_index_table(&html)?;
    info!(rows = rows.len(), "parsed index table from {}", url);
    Ok(rows)
}

/// Locate `table.wikitable.sortable` and read symbol + name from each body row.
///
/// A page without that table, or with a table holding no data rows, means
/// the page layout moved under us; an empty directory is never returned.
pub fn parse_index_table(html: &str) -> FedTrackResult<Vec<TickerRow>> {
    let document = Html::parse_document(html);
    let table_sel =
        Selector::parse("table.wikitable.sortable").expect("table selector should parse");
    let row_sel = Selector::parse("tr").expect("row selector should parse");
    let cell_sel = Selector::parse("td").expect("cell selector should parse");

    let table = document.select(&table_sel).next().ok_or_else(|| {
        FedTrackError::UpstreamStructureChanged("no `wikitable sortable` table on page".into())
    })?;

    let mut rows = Vec::new();
    for tr in table.select(&row_sel).skip(1) {
        let cells: Vec<ElementRef> = tr.select(&cell_sel).collect();
        if cells.len() < 2 {
            continue;
        }
        let symbol = cell_text(&cells[0]);
        let name = cell_text(&cells[1]);
        if symbol.is_empty() {
            continue;
        }
        rows.push(TickerRow { symbol, name });
    }

    if rows.is_empty() {
        return Err(FedTrackError::UpstreamStructureChanged(
            "index table has no symbol/name rows".into(),
        ));
    }
    Ok(rows)
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().replace('\n', "").trim().to_string()
}
