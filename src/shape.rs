//! Declarative descriptions of how to cut a raw sheet down to the cells that matter.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Semantic meaning of a projected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnRole {
    /// Display name of the issuer, fund or institution.
    EntityName,
    /// Identifier used only for counting distinct entities.
    GroupKey,
    /// Dollar amount summed into the program total.
    Amount,
    /// Alternative dollar basis (par or face value) carried alongside Amount.
    PctBasisAmount,
    /// Category name of a composition slice.
    Label,
    /// Weight of a composition slice.
    Share,
}

impl ColumnRole {
    /// Roles whose cells must be blank or a non-negative number.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ColumnRole::Amount | ColumnRole::PctBasisAmount | ColumnRole::Share
        )
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnRole::EntityName => "EntityName",
            ColumnRole::GroupKey => "GroupKey",
            ColumnRole::Amount => "Amount",
            ColumnRole::PctBasisAmount => "PctBasisAmount",
            ColumnRole::Label => "Label",
            ColumnRole::Share => "Share",
        };
        f.write_str(name)
    }
}

/// Where a role lives in the source sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    /// Column index in the sheet as published, before any drops.
    pub index: usize,
    /// Header text expected at `index` in the header row, if it should be checked.
    pub header: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetShapeSpec {
    pub sheet: String,
    pub dropped_columns: BTreeSet<usize>,
    pub leading_header_rows: usize,
    pub trailing_footer_rows: usize,
    pub roles: BTreeMap<ColumnRole, ColumnBinding>,
    /// Roles the consumer of the clean table cannot do without.
    pub required: Vec<ColumnRole>,
}

impl SheetShapeSpec {
    /// Shape for a position book: rows are holdings, loans or transactions.
    pub fn book(sheet: impl Into<String>) -> Self {
        Self::with_required(sheet, vec![ColumnRole::EntityName, ColumnRole::Amount])
    }

    /// Shape for a composition breakdown feeding a pie chart.
    pub fn composition(sheet: impl Into<String>) -> Self {
        Self::with_required(sheet, vec![ColumnRole::Label, ColumnRole::Share])
    }

    fn with_required(sheet: impl Into<String>, required: Vec<ColumnRole>) -> Self {
        Self {
            sheet: sheet.into(),
            dropped_columns: BTreeSet::new(),
            leading_header_rows: 1,
            trailing_footer_rows: 0,
            roles: BTreeMap::new(),
            required,
        }
    }

    pub fn header_rows(mut self, n: usize) -> Self {
        self.leading_header_rows = n;
        self
    }

    pub fn footer_rows(mut self, n: usize) -> Self {
        self.trailing_footer_rows = n;
        self
    }

    pub fn drop_columns(mut self, cols: impl IntoIterator<Item = usize>) -> Self {
        self.dropped_columns.extend(cols);
        self
    }

    pub fn role(mut self, role: ColumnRole, index: usize) -> Self {
        self.roles.insert(role, ColumnBinding { index, header: None });
        self
    }

    /// Bind a role and pin the header text expected above it.
    pub fn role_headed(mut self, role: ColumnRole, index: usize, header: &str) -> Self {
        self.roles.insert(
            role,
            ColumnBinding {
                index,
                header: Some(header.to_string()),
            },
        );
        self
    }
}
