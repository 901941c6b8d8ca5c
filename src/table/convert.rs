use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::raw_table::Cell;
use super::utils::clean_str;

static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<sign>-)?\$\s*(?P<num>\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)$")
        .expect("currency pattern should compile")
});

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<num>-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?|-?\.\d+)\s*%$")
        .expect("percentage pattern should compile")
});

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?$|^-?\.\d+$")
        .expect("number pattern should compile")
});

/// Coerce one raw spreadsheet value into a typed [`Cell`].
///
/// Accounting negatives such as `($1,200.00)` are accepted for every numeric
/// kind. Anything that is not blank and not numeric stays text.
pub fn coerce_cell(raw: &str) -> Cell {
    let v = clean_str(raw);
    if v.is_empty() {
        return Cell::Empty;
    }

    if v.len() > 2 && v.starts_with('(') && v.ends_with(')') {
        return match coerce_numeric(&v[1..v.len() - 1]) {
            Some(cell) => negate(cell),
            None => Cell::Text(v),
        };
    }

    coerce_numeric(&v).unwrap_or(Cell::Text(v))
}

fn coerce_numeric(v: &str) -> Option<Cell> {
    let v = v.trim();

    if let Some(caps) = CURRENCY_RE.captures(v) {
        let amount = parse_plain(&caps["num"])?;
        return Some(Cell::Currency(if caps.name("sign").is_some() {
            -amount
        } else {
            amount
        }));
    }

    if let Some(caps) = PERCENT_RE.captures(v) {
        let pct = parse_plain(&caps["num"])?;
        return Some(Cell::Percentage(pct / Decimal::ONE_HUNDRED));
    }

    if NUMBER_RE.is_match(v) {
        return parse_plain(v).map(Cell::Number);
    }

    // spreadsheet exports write very large or small numbers as 1.5E+09
    if v.contains(['e', 'E']) {
        return Decimal::from_scientific(v).ok().map(Cell::Number);
    }

    None
}

fn parse_plain(s: &str) -> Option<Decimal> {
    Decimal::from_str(&s.replace(',', "")).ok()
}

fn negate(cell: Cell) -> Cell {
    match cell {
        Cell::Number(d) => Cell::Number(-d),
        Cell::Currency(d) => Cell::Currency(-d),
        Cell::Percentage(d) => Cell::Percentage(-d),
        other => other,
    }
}
