use rust_decimal::{Decimal, RoundingStrategy};

use super::{BookMetrics, Resolution, Summary};
use crate::aggregate::{AllocationFraction, ProgramMetrics};
use crate::registry::{BookTemplate, CountBasis, Program, ProgramRegistry, ProgramSource};

/// Receives finished report lines.
pub trait Reporter {
    fn emit(&mut self, line: &str);
}

/// Prints each line to stdout.
#[derive(Debug, Default)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn emit(&mut self, line: &str) {
        println!("{}", line);
    }
}

impl Reporter for Vec<String> {
    fn emit(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// `$1,234,567.89`: two decimals, comma thousands separators.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((&text, "00"));
    format!("{}${}.{}", sign, group_thousands(int_part), frac_part)
}

/// `12.34%`, or `N/A` when there is no ceiling to measure against.
pub fn format_fraction(fraction: AllocationFraction) -> String {
    match fraction {
        AllocationFraction::Defined(f) => {
            let pct = (f * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            format!("{:.2}%", pct)
        }
        AllocationFraction::Undefined => "N/A".to_string(),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Render every program of `summary` in order, then the grand total.
pub fn render_summary(summary: &Summary, registry: &ProgramRegistry, reporter: &mut dyn Reporter) {
    for (id, resolution) in &summary.per_program {
        let program = registry.get(id);
        match resolution {
            Resolution::Disclosed { books, .. } => {
                for book in books {
                    let template = program.and_then(|p| template_for(p, &book.sheet));
                    render_book(id.as_str(), program, book, template, reporter);
                }
            }
            Resolution::Manual { amount } => {
                let title = program.map_or("", |p| p.title.as_str());
                let status = match program {
                    Some(p) if !p.is_operational() => ", Not Yet Operational",
                    _ => "",
                };
                reporter.emit(&format!(
                    "{}: {} Outstanding ({}{})",
                    id,
                    format_currency(*amount),
                    title,
                    status
                ));
            }
            Resolution::Failed { error } => {
                reporter.emit(&format!("{}: FAILED ({})", id, error));
            }
        }
    }

    reporter.emit(&format!(
        "TOTAL: {} in Total COVID-Related Fed Balance Sheet Expansion",
        format_currency(summary.grand_total)
    ));
}

fn template_for<'a>(program: &'a Program, sheet: &str) -> Option<&'a BookTemplate> {
    match &program.source {
        ProgramSource::Disclosure { books, .. } => books
            .iter()
            .find(|b| b.shape.sheet == sheet)
            .map(|b| &b.template),
        ProgramSource::Manual { .. } => None,
    }
}

fn render_book(
    id: &str,
    program: Option<&Program>,
    book: &BookMetrics,
    template: Option<&BookTemplate>,
    reporter: &mut dyn Reporter,
) {
    let m: &ProgramMetrics = &book.metrics;
    let default = BookTemplate {
        entity_prefix: None,
        amount_prefix: None,
        amount_phrase: "Invested in",
        count_basis: CountBasis::DistinctEntities,
        count_noun: "Entities",
        allocation_verb: "Invested",
        allocation_qualifier: None,
    };
    let t = template.unwrap_or(&default);
    let count = match t.count_basis {
        CountBasis::DistinctEntities => m.distinct_entity_count,
        CountBasis::Records => m.record_count,
    };
    let label = program.map_or(id, |p| p.ceiling_label.as_str());

    let mut line = format!("{}: ", id);
    if let Some(prefix) = t.entity_prefix {
        line.push_str(&format!("{} {} ", m.distinct_entity_count, prefix));
    }
    if let Some(prefix) = t.amount_prefix {
        line.push_str(prefix);
        line.push(' ');
    }
    line.push_str(&format!(
        "{} {} {} {}",
        format_currency(m.total_amount),
        t.amount_phrase,
        count,
        t.count_noun
    ));
    reporter.emit(&line);

    let mut line = format!(
        "{}: {} of {} Allocation {}",
        id,
        format_fraction(m.allocation_used_fraction),
        label,
        t.allocation_verb
    );
    if let Some(q) = t.allocation_qualifier {
        line.push(' ');
        line.push_str(q);
    }
    reporter.emit(&line);
}
