use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::errors::{FedTrackError, FedTrackResult};
use crate::normalize::CleanTable;
use crate::registry::ProgramId;

/// Share of a program's allocation ceiling in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationFraction {
    Defined(Decimal),
    /// The program has no ceiling to divide by. Rendered as "N/A".
    Undefined,
}

impl AllocationFraction {
    pub fn of(amount: Decimal, ceiling: Decimal) -> Self {
        if ceiling <= Decimal::ZERO {
            return AllocationFraction::Undefined;
        }
        amount
            .checked_div(ceiling)
            .map_or(AllocationFraction::Undefined, AllocationFraction::Defined)
    }

    pub fn value(self) -> Option<Decimal> {
        match self {
            AllocationFraction::Defined(d) => Some(d),
            AllocationFraction::Undefined => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramMetrics {
    pub program_id: ProgramId,
    pub total_amount: Decimal,
    pub distinct_entity_count: usize,
    pub record_count: usize,
    pub allocation_used_fraction: AllocationFraction,
}

/// Compute the metrics of one clean table against `ceiling`.
///
/// Blank amounts count as records but add nothing to the total. Blank
/// grouping keys are not counted as an entity. A total past the decimal
/// range fails with [`FedTrackError::AmountOverflow`].
pub fn aggregate(
    program_id: &ProgramId,
    clean: &CleanTable,
    ceiling: Decimal,
) -> FedTrackResult<ProgramMetrics> {
    aggregate_books(program_id, std::slice::from_ref(clean), ceiling)
}

/// Metrics over several books of one program.
///
/// Entity keys are counted per sheet: a bond issuer and an ETF that happen
/// to share a name are two entities.
pub fn aggregate_books(
    program_id: &ProgramId,
    books: &[CleanTable],
    ceiling: Decimal,
) -> FedTrackResult<ProgramMetrics> {
    let rows = || books.iter().flat_map(|b| b.rows.iter().map(move |r| (b, r)));

    let total_amount = checked_total(rows().filter_map(|(_, r)| r.amount())).ok_or_else(|| {
        FedTrackError::AmountOverflow {
            sheet: books
                .iter()
                .map(|b| b.sheet.as_str())
                .collect::<Vec<_>>()
                .join("+"),
        }
    })?;

    let keys: HashSet<(&str, String)> = rows()
        .map(|(b, r)| (b.sheet.as_str(), r.group_key()))
        .filter(|(_, k)| !k.is_empty())
        .collect();

    Ok(ProgramMetrics {
        program_id: program_id.clone(),
        total_amount,
        distinct_entity_count: keys.len(),
        record_count: books.iter().map(CleanTable::len).sum(),
        allocation_used_fraction: AllocationFraction::of(total_amount, ceiling),
    })
}

/// Sum without panicking; `None` once the running total leaves the decimal range.
pub fn checked_total(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(a))
}
