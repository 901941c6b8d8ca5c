use rust_decimal::Decimal;
use std::fmt;

use super::convert::coerce_cell;

/// One spreadsheet cell after coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Blank in the source. Kept so positional access stays aligned.
    Empty,
    Text(String),
    Number(Decimal),
    /// A currency amount with symbol and separators stripped.
    Currency(Decimal),
    /// Stored as a fraction: "12.3%" is 0.123.
    Percentage(Decimal),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Numeric value of the cell, if it has one.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Cell::Number(d) | Cell::Currency(d) | Cell::Percentage(d) => Some(*d),
            Cell::Empty | Cell::Text(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(d) | Cell::Currency(d) => write!(f, "{}", d),
            Cell::Percentage(d) => write!(f, "{}%", d * Decimal::ONE_HUNDRED),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Name of the sheet inside its workbook.
    pub sheet_name: String,
    /// Every row of the sheet in source order, header and footer rows included.
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(sheet_name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            rows,
        }
    }

    /// Build a table from raw string records, coercing every field.
    pub fn from_records<I, R, S>(sheet_name: impl Into<String>, records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = records
            .into_iter()
            .map(|r| r.into_iter().map(|s| coerce_cell(s.as_ref())).collect())
            .collect();
        Self::new(sheet_name, rows)
    }

    /// Width of the header row (row 0), if the sheet has any rows.
    pub fn header_width(&self) -> Option<usize> {
        self.rows.first().map(Vec::len)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
