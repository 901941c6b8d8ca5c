use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::errors::{FedTrackError, FedTrackResult};
use crate::registry::ProgramId;
use crate::shape::{ColumnRole, SheetShapeSpec};
use crate::table::{Cell, RawTable};

/// One disclosed record projected onto semantic columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleanRow {
    values: BTreeMap<ColumnRole, Cell>,
}

impl CleanRow {
    pub fn new(values: BTreeMap<ColumnRole, Cell>) -> Self {
        Self { values }
    }

    /// Cell for `role`; [`Cell::Empty`] when the sheet declares no such column.
    pub fn get(&self, role: ColumnRole) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.values.get(&role).unwrap_or(&EMPTY)
    }

    pub fn entity_name(&self) -> String {
        self.get(ColumnRole::EntityName).to_string()
    }

    /// Identifier for distinct counting. Falls back to the entity name when the
    /// sheet has no identifier column or the identifier cell is blank.
    pub fn group_key(&self) -> String {
        match self.get(ColumnRole::GroupKey) {
            Cell::Empty => self.entity_name(),
            key => key.to_string(),
        }
    }

    /// Amount of the record; `None` for a blank cell.
    pub fn amount(&self) -> Option<Decimal> {
        self.get(ColumnRole::Amount).as_decimal()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanTable {
    pub program_id: ProgramId,
    pub sheet: String,
    pub rows: Vec<CleanRow>,
}

impl CleanTable {
    pub fn new(program_id: ProgramId, sheet: impl Into<String>, rows: Vec<CleanRow>) -> Self {
        Self {
            program_id,
            sheet: sheet.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Apply `spec` to `raw`.
///
/// Header and footer rows are cut, dropped columns removed and the remaining
/// columns projected onto the roles of the spec. Any row whose width differs
/// from the header row fails the whole sheet: positional access is only
/// meaningful while the published layout holds.
#[instrument(level = "debug", skip(raw, spec), fields(sheet = %spec.sheet, rows = raw.len()))]
pub fn normalize(
    program_id: &ProgramId,
    raw: &RawTable,
    spec: &SheetShapeSpec,
) -> FedTrackResult<CleanTable> {
    let width = raw.header_width().unwrap_or(0);

    // 1) every row must keep the header's shape, footers included
    for (i, row) in raw.rows.iter().enumerate() {
        if row.len() != width {
            return Err(FedTrackError::RowShapeMismatch {
                sheet: spec.sheet.clone(),
                row: i,
                expected: width,
                found: row.len(),
            });
        }
    }

    // 2) columns that survive the drop, and where each role lands among them
    let kept: Vec<usize> = (0..width)
        .filter(|c| !spec.dropped_columns.contains(c))
        .collect();

    for role in &spec.required {
        if !spec.roles.contains_key(role) {
            return Err(missing(spec, *role));
        }
    }

    let mut positions: Vec<(ColumnRole, usize)> = Vec::with_capacity(spec.roles.len());
    for (role, binding) in &spec.roles {
        let pos = kept
            .iter()
            .position(|&c| c == binding.index)
            .ok_or_else(|| missing(spec, *role))?;

        if let Some(expected) = &binding.header {
            let found = raw.rows[0][binding.index].to_string();
            if !same_header(expected, &found) {
                return Err(FedTrackError::HeaderMismatch {
                    sheet: spec.sheet.clone(),
                    column: binding.index,
                    expected: expected.clone(),
                    found,
                });
            }
        }
        positions.push((*role, pos));
    }

    // 3) cut header + footer rows
    let start = spec.leading_header_rows.min(raw.len());
    let end = raw.len().saturating_sub(spec.trailing_footer_rows).max(start);

    // 4) project
    let mut rows = Vec::with_capacity(end - start);
    for (offset, row) in raw.rows[start..end].iter().enumerate() {
        let projected: Vec<&Cell> = kept.iter().map(|&c| &row[c]).collect();
        let mut values = BTreeMap::new();
        for &(role, pos) in &positions {
            let cell = projected[pos];
            if role.is_numeric() && !is_valid_amount(cell) {
                return Err(FedTrackError::InvalidAmount {
                    sheet: spec.sheet.clone(),
                    row: start + offset,
                    column: kept[pos],
                    value: cell.to_string(),
                });
            }
            values.insert(role, cell.clone());
        }
        rows.push(CleanRow::new(values));
    }

    debug!(kept = rows.len(), "normalized");
    Ok(CleanTable::new(program_id.clone(), spec.sheet.clone(), rows))
}

fn missing(spec: &SheetShapeSpec, role: ColumnRole) -> FedTrackError {
    FedTrackError::MissingRole {
        sheet: spec.sheet.clone(),
        role,
    }
}

fn is_valid_amount(cell: &Cell) -> bool {
    match cell {
        Cell::Empty => true,
        Cell::Text(_) => false,
        other => other.as_decimal().map_or(false, |d| !d.is_sign_negative()),
    }
}

fn same_header(expected: &str, found: &str) -> bool {
    let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    squash(expected) == squash(found)
}
