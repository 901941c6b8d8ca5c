// src/fetch/mod.rs
pub mod tickers;

pub use tickers::{fetch_index_table, parse_index_table, TickerRow, DEFAULT_TICKER_URL};
