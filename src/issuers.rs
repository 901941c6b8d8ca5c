//! Lookup table of index constituents with names normalized for later
//! matching against program entity names.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fetch::TickerRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerEntry {
    pub symbol: String,
    pub normalized_name: String,
}

/// Removal rules, applied top to bottom on the uppercased name.
///
/// Corporate suffixes only match as whole words, so "INCYTE" and
/// "ABC INCOME FUND" keep their letters.
static NOISE_RULES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("ampersand", r"&"),
        ("punctuation", r"[^\w\s]"),
        ("inc", r"\s+INC\b"),
        ("plc", r"\s+PLC\b"),
    ]
    .into_iter()
    .map(|(name, pat)| (name, Regex::new(pat).expect("noise pattern should compile")))
    .collect()
});

pub fn normalize_issuer_name(name: &str) -> String {
    let mut out = name.to_uppercase();
    for (_, re) in NOISE_RULES.iter() {
        out = re.replace_all(&out, "").into_owned();
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize every row, keeping input order.
pub fn build_directory(rows: &[TickerRow]) -> Vec<IssuerEntry> {
    rows.iter()
        .map(|r| IssuerEntry {
            symbol: r.symbol.trim().to_string(),
            normalized_name: normalize_issuer_name(&r.name),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_noise_in_order() {
        assert_eq!(normalize_issuer_name("AT&T Inc."), "ATT");
        assert_eq!(normalize_issuer_name("Linde plc"), "LINDE");
        assert_eq!(normalize_issuer_name("Alphabet Inc. (Class A)"), "ALPHABET CLASS A");
        assert_eq!(normalize_issuer_name("Johnson & Johnson"), "JOHNSON JOHNSON");
        assert_eq!(normalize_issuer_name("Brown-Forman Corp."), "BROWNFORMAN CORP");
    }

    #[test]
    fn suffixes_only_match_whole_words() {
        assert_eq!(normalize_issuer_name("Incyte"), "INCYTE");
        assert_eq!(normalize_issuer_name("ABC Income Fund"), "ABC INCOME FUND");
        assert_eq!(normalize_issuer_name("Aptiv PLC"), "APTIV");
    }

    #[test]
    fn directory_keeps_order_and_symbols() {
        let rows = vec![
            TickerRow {
                symbol: " MMM".into(),
                name: "3M Company".into(),
            },
            TickerRow {
                symbol: "T".into(),
                name: "AT&T Inc.".into(),
            },
        ];
        let dir = build_directory(&rows);
        assert_eq!(dir[0].symbol, "MMM");
        assert_eq!(dir[0].normalized_name, "3M COMPANY");
        assert_eq!(dir[1].normalized_name, "ATT");
    }

    #[test]
    fn rules_run_in_declared_order() {
        let names: Vec<&str> = NOISE_RULES.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["ampersand", "punctuation", "inc", "plc"]);
    }
}
