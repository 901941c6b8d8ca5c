//! The lending facilities tracked by a run, and how each one is measured.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::errors::{FedTrackError, FedTrackResult};
use crate::shape::{ColumnRole, SheetShapeSpec};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(String);

impl ProgramId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProgramId {
    fn from(s: &str) -> Self {
        ProgramId(s.to_string())
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the entity count of a book counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountBasis {
    DistinctEntities,
    Records,
}

/// Wording of the two report lines for one book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookTemplate {
    /// Leads the amount line with the distinct entity count, e.g.
    /// "12 PPP Lenders Backed Via $X ...".
    pub entity_prefix: Option<&'static str>,
    /// "Roughly" where the amount is market value rather than cost.
    pub amount_prefix: Option<&'static str>,
    /// "Invested in" or "Across".
    pub amount_phrase: &'static str,
    pub count_basis: CountBasis,
    /// "Issuers", "Unique ETFs", "Loans", ...
    pub count_noun: &'static str,
    /// "Invested" or "Backed".
    pub allocation_verb: &'static str,
    /// Trailing qualifier of the allocation line, e.g. "in Bond ETFs".
    pub allocation_qualifier: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub shape: SheetShapeSpec,
    pub template: BookTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartShape {
    pub title: String,
    pub shape: SheetShapeSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramSource {
    /// Outstanding amount known up front; no spreadsheet.
    Manual { outstanding: Decimal },
    /// Amount computed from the program's disclosure workbook.
    Disclosure {
        books: Vec<Book>,
        charts: Vec<ChartShape>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub id: ProgramId,
    pub title: String,
    /// Zero when the program has no allocation yet.
    pub allocation_ceiling: Decimal,
    /// How the ceiling is named in report lines, e.g. "PMCCF/SMCCF".
    pub ceiling_label: String,
    pub source: ProgramSource,
    /// Counts toward the grand total unless a run overrides the inclusion set.
    pub in_default_total: bool,
    operational: Option<bool>,
}

impl Program {
    pub fn manual(id: &str, title: &str, outstanding: Decimal) -> Self {
        Self {
            id: ProgramId::from(id),
            title: title.to_string(),
            allocation_ceiling: Decimal::ZERO,
            ceiling_label: id.to_string(),
            source: ProgramSource::Manual { outstanding },
            in_default_total: false,
            operational: None,
        }
    }

    pub fn disclosure(id: &str, title: &str, ceiling: Decimal, books: Vec<Book>) -> Self {
        Self {
            id: ProgramId::from(id),
            title: title.to_string(),
            allocation_ceiling: ceiling,
            ceiling_label: id.to_string(),
            source: ProgramSource::Disclosure {
                books,
                charts: Vec::new(),
            },
            in_default_total: true,
            operational: None,
        }
    }

    pub fn with_ceiling(mut self, ceiling: Decimal, label: &str) -> Self {
        self.allocation_ceiling = ceiling;
        self.ceiling_label = label.to_string();
        self
    }

    pub fn with_charts(mut self, extra: Vec<ChartShape>) -> Self {
        if let ProgramSource::Disclosure { charts, .. } = &mut self.source {
            charts.extend(extra);
        }
        self
    }

    pub fn operational(mut self, flag: bool) -> Self {
        self.operational = Some(flag);
        self
    }

    pub fn counted_in_total(mut self, flag: bool) -> Self {
        self.in_default_total = flag;
        self
    }

    /// Explicit flag if one was set, else whether the program has a ceiling.
    pub fn is_operational(&self) -> bool {
        self.operational
            .unwrap_or(self.allocation_ceiling > Decimal::ZERO)
    }

    pub fn is_disclosure_driven(&self) -> bool {
        matches!(self.source, ProgramSource::Disclosure { .. })
    }
}

/// Immutable, ordered set of programs. Report output follows this order.
#[derive(Debug, Clone)]
pub struct ProgramRegistry {
    programs: Vec<Program>,
}

impl ProgramRegistry {
    pub fn new(programs: Vec<Program>) -> FedTrackResult<Self> {
        let mut seen = HashSet::new();
        for p in &programs {
            if !seen.insert(p.id.clone()) {
                return Err(FedTrackError::DuplicateProgram(p.id.to_string()));
            }
        }
        Ok(Self { programs })
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn get(&self, id: &ProgramId) -> Option<&Program> {
        self.programs.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &ProgramId) -> bool {
        self.get(id).is_some()
    }

    /// Programs that count toward the grand total by default.
    pub fn default_inclusion(&self) -> BTreeSet<ProgramId> {
        self.programs
            .iter()
            .filter(|p| p.in_default_total)
            .map(|p| p.id.clone())
            .collect()
    }

    /// The Federal Reserve's COVID-19 emergency lending facilities as of mid-2020.
    pub fn covid_facilities() -> Self {
        let billion = |n: i64| Decimal::from(n) * Decimal::from(1_000_000_000i64);
        let corporate_ceiling = billion(750);

        let programs = vec![
            Program::manual("PDCF", "Primary Dealer Credit Facility", Decimal::ZERO),
            Program::manual("CPFF", "Commercial Paper Funding Facility", Decimal::ZERO),
            Program::manual(
                "MMLF",
                "Money Market Mutual Fund Liquidity Facility",
                Decimal::ZERO,
            ),
            Program::manual(
                "TALF",
                "Term Asset-Backed Securities Loan Facility",
                Decimal::ZERO,
            ),
            Program::disclosure(
                "SMCCF",
                "Secondary Market Corporate Credit Facility",
                corporate_ceiling,
                vec![smccf_bond_book(), smccf_etf_book()],
            )
            .with_ceiling(corporate_ceiling, "PMCCF/SMCCF")
            .with_charts(smccf_charts()),
            Program::manual("PMCCF", "Primary Market Corporate Credit Facility", Decimal::ZERO)
                .with_ceiling(corporate_ceiling, "PMCCF/SMCCF")
                .operational(false),
            Program::disclosure(
                "MLF",
                "Municipal Liquidity Facility",
                billion(500),
                vec![mlf_book()],
            ),
            Program::disclosure(
                "PPPLF",
                "Paycheck Protection Program Liquidity Facility",
                billion(669),
                vec![ppplf_book()],
            )
            .with_ceiling(billion(669), "PPP ($669B)"),
            Program::manual("MSELF", "Main Street Expanded Loan Facility", Decimal::ZERO),
            Program::manual("MSNLF", "Main Street New Loan Facility", Decimal::ZERO),
            Program::manual("MSPLF", "Main Street Priority Loan Facility", Decimal::ZERO),
        ];

        Self { programs }
    }
}

fn smccf_bond_book() -> Book {
    Book {
        // amortized cost, not par value
        shape: SheetShapeSpec::book("Position Summary-Bond")
            .footer_rows(2)
            .drop_columns([2, 3, 4, 5])
            .role_headed(ColumnRole::EntityName, 0, "Issuer")
            .role(ColumnRole::GroupKey, 0)
            .role(ColumnRole::Amount, 6),
        template: BookTemplate {
            entity_prefix: None,
            amount_prefix: None,
            amount_phrase: "Invested in",
            count_basis: CountBasis::DistinctEntities,
            count_noun: "Issuers",
            allocation_verb: "Invested",
            allocation_qualifier: Some("in Individual Bonds"),
        },
    }
}

fn smccf_etf_book() -> Book {
    Book {
        // market value is the best proxy for cost
        shape: SheetShapeSpec::book("Position Summary-ETF")
            .footer_rows(2)
            .role_headed(ColumnRole::EntityName, 0, "Fund Name")
            .role(ColumnRole::GroupKey, 1)
            .role(ColumnRole::Amount, 3),
        template: BookTemplate {
            entity_prefix: None,
            amount_prefix: Some("Roughly"),
            amount_phrase: "Invested in",
            count_basis: CountBasis::DistinctEntities,
            count_noun: "Unique ETFs",
            allocation_verb: "Invested",
            allocation_qualifier: Some("in Bond ETFs"),
        },
    }
}

fn smccf_charts() -> Vec<ChartShape> {
    vec![
        ChartShape {
            title: "SMCCF Sector Composition".to_string(),
            shape: SheetShapeSpec::composition("Sector Summary-Bond")
                .footer_rows(3)
                .drop_columns([1, 2])
                .role(ColumnRole::Label, 0)
                .role(ColumnRole::Share, 3),
        },
        ChartShape {
            title: "SMCCF Credit Composition".to_string(),
            // second row is a sub-header; the footer includes the WAM block
            shape: SheetShapeSpec::composition("Rating&WAM-Bond")
                .header_rows(2)
                .footer_rows(5)
                .role(ColumnRole::Label, 0)
                .role(ColumnRole::Share, 1),
        },
    ]
}

fn mlf_book() -> Book {
    Book {
        shape: SheetShapeSpec::book("MLF")
            .role_headed(ColumnRole::EntityName, 1, "Issuer name")
            .role(ColumnRole::Amount, 6),
        template: BookTemplate {
            entity_prefix: None,
            amount_prefix: None,
            amount_phrase: "Invested in",
            count_basis: CountBasis::DistinctEntities,
            count_noun: "Governments",
            allocation_verb: "Invested",
            allocation_qualifier: None,
        },
    }
}

fn ppplf_book() -> Book {
    Book {
        shape: SheetShapeSpec::book("Detailed Report")
            .drop_columns([0, 1, 2, 4, 5, 6, 7, 9, 10, 11])
            .role_headed(ColumnRole::EntityName, 3, "Institution Name")
            .role(ColumnRole::Amount, 8),
        template: BookTemplate {
            entity_prefix: Some("PPP Lenders Backed Via"),
            amount_prefix: None,
            amount_phrase: "Across",
            count_basis: CountBasis::Records,
            count_noun: "Loans",
            allocation_verb: "Backed",
            allocation_qualifier: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covid_registry_shape() {
        let reg = ProgramRegistry::covid_facilities();
        let ids: Vec<&str> = reg.programs().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "PDCF", "CPFF", "MMLF", "TALF", "SMCCF", "PMCCF", "MLF", "PPPLF", "MSELF",
                "MSNLF", "MSPLF"
            ]
        );

        let expected: BTreeSet<ProgramId> =
            ["SMCCF", "MLF", "PPPLF"].into_iter().map(ProgramId::from).collect();
        assert_eq!(reg.default_inclusion(), expected);
    }

    #[test]
    fn operational_flag_derives_from_ceiling_unless_explicit() {
        let reg = ProgramRegistry::covid_facilities();
        let get = |id: &str| reg.get(&ProgramId::from(id)).unwrap();

        assert!(!get("PDCF").is_operational());
        assert!(get("MLF").is_operational());
        // shares the corporate ceiling but has not started buying
        assert!(!get("PMCCF").is_operational());
        assert_eq!(
            get("PMCCF").allocation_ceiling,
            get("SMCCF").allocation_ceiling
        );
    }

    #[test]
    fn disclosure_programs_carry_shapes() {
        let reg = ProgramRegistry::covid_facilities();
        let smccf = reg.get(&ProgramId::from("SMCCF")).unwrap();
        match &smccf.source {
            ProgramSource::Disclosure { books, charts } => {
                assert_eq!(books.len(), 2);
                assert_eq!(charts.len(), 2);
                // par is not read, so it is cut rather than validated
                let bonds = &books[0].shape;
                assert!(bonds.dropped_columns.contains(&4));
                assert!(!bonds.roles.contains_key(&ColumnRole::PctBasisAmount));
            }
            ProgramSource::Manual { .. } => panic!("SMCCF should be disclosure-driven"),
        }
        assert!(!reg.get(&ProgramId::from("CPFF")).unwrap().is_disclosure_driven());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = ProgramRegistry::new(vec![
            Program::manual("PDCF", "a", Decimal::ZERO),
            Program::manual("PDCF", "b", Decimal::ZERO),
        ])
        .unwrap_err();
        assert!(matches!(err, FedTrackError::DuplicateProgram(id) if id == "PDCF"));
    }
}
