pub mod render;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::warn;

use crate::aggregate::ProgramMetrics;
use crate::registry::ProgramId;

pub use render::{
    format_currency, format_fraction, render_summary, Reporter, StdoutReporter,
};

/// Metrics of one book (one sheet) of a disclosure-driven program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMetrics {
    pub sheet: String,
    pub metrics: ProgramMetrics,
}

/// How a program's outstanding amount was obtained in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Disclosed {
        metrics: ProgramMetrics,
        books: Vec<BookMetrics>,
    },
    Manual {
        amount: Decimal,
    },
    Failed {
        error: String,
    },
}

impl Resolution {
    /// Amount the program contributes to a total; `None` when it failed.
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Resolution::Disclosed { metrics, .. } => Some(metrics.total_amount),
            Resolution::Manual { amount } => Some(*amount),
            Resolution::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Every program of the run, in registry order.
    pub per_program: IndexMap<ProgramId, Resolution>,
    pub grand_total: Decimal,
    /// Programs whose amount went into `grand_total`.
    pub totaled: BTreeSet<ProgramId>,
    /// Programs that should have counted toward the total but failed.
    pub missing_from_total: Vec<ProgramId>,
}

impl Summary {
    pub fn disclosed_count(&self) -> usize {
        self.per_program
            .values()
            .filter(|r| matches!(r, Resolution::Disclosed { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.per_program
            .values()
            .filter(|r| matches!(r, Resolution::Failed { .. }))
            .count()
    }
}

/// Assembles per-program resolutions into a [`Summary`].
///
/// The inclusion set is always explicit: not every configured program
/// counts toward the published balance-sheet figure.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    inclusion: BTreeSet<ProgramId>,
}

impl ReportBuilder {
    pub fn new(inclusion: BTreeSet<ProgramId>) -> Self {
        Self { inclusion }
    }

    pub fn build<I>(&self, resolutions: I) -> Summary
    where
        I: IntoIterator<Item = (ProgramId, Resolution)>,
    {
        let per_program: IndexMap<ProgramId, Resolution> = resolutions.into_iter().collect();

        let mut grand_total = Decimal::ZERO;
        let mut totaled = BTreeSet::new();
        let mut missing_from_total = Vec::new();

        for (id, resolution) in &per_program {
            if !self.inclusion.contains(id) {
                continue;
            }
            match resolution.amount() {
                Some(amount) => match grand_total.checked_add(amount) {
                    Some(total) => {
                        grand_total = total;
                        totaled.insert(id.clone());
                    }
                    None => {
                        warn!(program = %id, "grand total would leave the decimal range; left out");
                        missing_from_total.push(id.clone());
                    }
                },
                None => {
                    warn!(program = %id, "failed program left out of the grand total");
                    missing_from_total.push(id.clone());
                }
            }
        }

        for id in &self.inclusion {
            if !per_program.contains_key(id) {
                warn!(program = %id, "included program has no result in this run");
                missing_from_total.push(id.clone());
            }
        }

        Summary {
            per_program,
            grand_total,
            totaled,
            missing_from_total,
        }
    }
}
