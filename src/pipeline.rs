//! One batch run: load, normalize and aggregate every program, then build the summary.

use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::aggregate::{aggregate, aggregate_books};
use crate::chart::{ChartSink, Composition};
use crate::errors::FedTrackResult;
use crate::input_set::InputSet;
use crate::normalize::normalize;
use crate::registry::{Book, ChartShape, Program, ProgramId, ProgramRegistry, ProgramSource};
use crate::report::{BookMetrics, ReportBuilder, Resolution, Summary};
use crate::table::TabularReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub summary: Summary,
    /// Charts of successfully processed programs, in registry order.
    pub compositions: Vec<(ProgramId, Composition)>,
}

impl RunOutput {
    /// A run fails only when no disclosure-driven program produced metrics.
    pub fn any_disclosure_succeeded(&self) -> bool {
        self.summary.disclosed_count() > 0
    }

    pub fn draw_charts(&self, sink: &mut dyn ChartSink) {
        for (_, c) in &self.compositions {
            if !c.slices.is_empty() {
                sink.render_pie(&c.title, &c.slices);
            }
        }
    }
}

struct ProgramRun {
    id: ProgramId,
    resolution: Resolution,
    compositions: Vec<Composition>,
}

/// Process every program of `registry` against `inputs`.
///
/// Programs are independent, so they fan out over the rayon pool; results are
/// joined back in registry order. A failing program is recorded in the
/// summary and never stops the others.
#[instrument(level = "info", skip_all, fields(programs = registry.programs().len()))]
pub fn run<R: TabularReader>(registry: &ProgramRegistry, inputs: &InputSet, reader: &R) -> RunOutput {
    let start = Instant::now();

    let runs: Vec<ProgramRun> = registry
        .programs()
        .par_iter()
        .map(|program| run_program(program, inputs, reader))
        .collect();

    let mut compositions = Vec::new();
    let mut resolutions = Vec::with_capacity(runs.len());
    for run in runs {
        compositions.extend(run.compositions.into_iter().map(|c| (run.id.clone(), c)));
        resolutions.push((run.id, run.resolution));
    }

    let summary = ReportBuilder::new(inputs.inclusion(registry)).build(resolutions);
    info!(
        disclosed = summary.disclosed_count(),
        failed = summary.failed_count(),
        elapsed = ?start.elapsed(),
        "run complete"
    );

    RunOutput {
        summary,
        compositions,
    }
}

fn run_program<R: TabularReader>(program: &Program, inputs: &InputSet, reader: &R) -> ProgramRun {
    let id = program.id.clone();
    match &program.source {
        ProgramSource::Manual { outstanding } => ProgramRun {
            id,
            resolution: Resolution::Manual {
                amount: *outstanding,
            },
            compositions: Vec::new(),
        },
        ProgramSource::Disclosure { books, charts } => {
            let Some(workbook) = inputs.workbook(&id) else {
                warn!(program = %id, "no workbook in the input set");
                return ProgramRun {
                    resolution: Resolution::Failed {
                        error: format!("no workbook configured for {}", id),
                    },
                    id,
                    compositions: Vec::new(),
                };
            };

            match process_books(program, books, workbook, reader) {
                Ok(resolution) => ProgramRun {
                    compositions: process_charts(&id, charts, workbook, reader),
                    id,
                    resolution,
                },
                Err(e) => {
                    error!(program = %id, workbook = %workbook.display(), "{}", e);
                    ProgramRun {
                        id,
                        resolution: Resolution::Failed {
                            error: e.to_string(),
                        },
                        compositions: Vec::new(),
                    }
                }
            }
        }
    }
}

/// Normalize and aggregate every book; the program-level metrics run over
/// all books together.
fn process_books<R: TabularReader>(
    program: &Program,
    books: &[Book],
    workbook: &Path,
    reader: &R,
) -> FedTrackResult<Resolution> {
    let ceiling = program.allocation_ceiling;
    let mut tables = Vec::with_capacity(books.len());
    let mut book_metrics = Vec::with_capacity(books.len());

    for book in books {
        let raw = reader.load(workbook, &book.shape.sheet)?;
        let clean = normalize(&program.id, &raw, &book.shape)?;
        book_metrics.push(BookMetrics {
            sheet: book.shape.sheet.clone(),
            metrics: aggregate(&program.id, &clean, ceiling)?,
        });
        tables.push(clean);
    }

    let metrics = aggregate_books(&program.id, &tables, ceiling)?;
    info!(
        program = %program.id,
        total = %metrics.total_amount,
        entities = metrics.distinct_entity_count,
        records = metrics.record_count,
        "aggregated"
    );

    Ok(Resolution::Disclosed {
        metrics,
        books: book_metrics,
    })
}

fn process_charts<R: TabularReader>(
    id: &ProgramId,
    charts: &[ChartShape],
    workbook: &Path,
    reader: &R,
) -> Vec<Composition> {
    let mut out = Vec::with_capacity(charts.len());
    for chart in charts {
        let result = reader
            .load(workbook, &chart.shape.sheet)
            .and_then(|raw| normalize(id, &raw, &chart.shape))
            .and_then(|clean| Composition::from_table(chart.title.clone(), &clean));
        match result {
            Ok(composition) => out.push(composition),
            Err(e) => warn!(program = %id, chart = %chart.title, "skipping chart: {}", e),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AllocationFraction;
    use crate::errors::FedTrackError;
    use crate::table::{CsvWorkbookReader, RawTable};
    use rust_decimal::Decimal;
    use std::collections::{BTreeMap, HashMap};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,fedtrack=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    /// In-memory workbooks keyed by (source path, sheet name).
    #[derive(Default)]
    struct MemReader {
        sheets: HashMap<(PathBuf, String), Vec<Vec<String>>>,
    }

    impl MemReader {
        fn add(&mut self, source: &str, sheet: &str, rows: Vec<Vec<&str>>) {
            let rows = rows
                .into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect();
            self.sheets
                .insert((PathBuf::from(source), sheet.to_string()), rows);
        }
    }

    impl TabularReader for MemReader {
        fn load(&self, source: &Path, sheet: &str) -> FedTrackResult<RawTable> {
            self.sheets
                .get(&(source.to_path_buf(), sheet.to_string()))
                .map(|rows| RawTable::from_records(sheet, rows.clone()))
                .ok_or_else(|| FedTrackError::SheetNotFound {
                    path: source.to_path_buf(),
                    sheet: sheet.to_string(),
                })
        }
    }

    fn padded(cells: &[&'static str], width: usize) -> Vec<&'static str> {
        let mut row = cells.to_vec();
        row.resize(width, "");
        row
    }

    fn fixture() -> MemReader {
        let mut r = MemReader::default();
        r.add(
            "smccf",
            "Position Summary-Bond",
            vec![
                vec!["Issuer", "Sector", "CUSIP", "Coupon", "Par", "Maturity", "Amortized Cost"],
                vec!["ACME", "Ind", "1", "3%", "$100", "2025", "$100.00"],
                vec!["ACME", "Ind", "2", "3%", "$50", "2026", "$50.00"],
                vec!["GLOBEX", "Tech", "3", "2%", "$25", "2027", "$25.50"],
                vec!["Total", "", "", "", "", "", "$175.50"],
                vec!["Source: Federal Reserve", "", "", "", "", "", ""],
            ],
        );
        r.add(
            "smccf",
            "Position Summary-ETF",
            vec![
                vec!["Fund Name", "Ticker", "Shares", "Market Value"],
                vec!["iShares iBoxx", "LQD", "10", "$1,000.00"],
                vec!["Vanguard Short", "VCSH", "5", "$500.00"],
                vec!["Total", "", "", "$1,500.00"],
                vec!["", "", "", ""],
            ],
        );
        r.add(
            "smccf",
            "Sector Summary-Bond",
            vec![
                vec!["Sector", "Par", "Count", "Cost"],
                vec!["Industrials", "$150", "2", "$150"],
                vec!["Technology", "$50", "1", "$50"],
                vec!["Total", "$200", "3", "$200"],
                vec!["", "", "", ""],
                vec!["Note", "", "", ""],
            ],
        );
        r.add(
            "mlf",
            "MLF",
            vec![
                padded(&["Date", "Issuer name", "Type", "Rating", "Maturity", "Rate", "Principal"], 7),
                padded(&["6/1", "State of Illinois", "GO", "BBB", "2023", "3.82%", "$1,200,000,000"], 7),
                padded(&["6/9", "State of Illinois", "GO", "BBB", "2024", "3.9%", "$800,000,000"], 7),
            ],
        );
        r.add(
            "ppplf",
            "Detailed Report",
            vec![
                padded(&["a", "b", "c", "Institution Name", "e", "f", "g", "h", "Advance", "j", "k", "l"], 12),
                padded(&["", "", "", "Bank A", "", "", "", "", "$10", "", "", ""], 12),
                padded(&["", "", "", "Bank A", "", "", "", "", "$20", "", "", ""], 12),
                padded(&["", "", "", "Bank B", "", "", "", "", "$30", "", "", ""], 12),
            ],
        );
        r
    }

    fn inputs() -> InputSet {
        InputSet {
            workbooks: BTreeMap::from([
                (ProgramId::from("SMCCF"), PathBuf::from("smccf")),
                (ProgramId::from("MLF"), PathBuf::from("mlf")),
                (ProgramId::from("PPPLF"), PathBuf::from("ppplf")),
            ]),
            ..InputSet::default()
        }
    }

    fn disclosed(out: &RunOutput, id: &str) -> (crate::aggregate::ProgramMetrics, Vec<BookMetrics>) {
        match &out.summary.per_program[&ProgramId::from(id)] {
            Resolution::Disclosed { metrics, books } => (metrics.clone(), books.clone()),
            other => panic!("{} not disclosed: {:?}", id, other),
        }
    }

    #[test]
    fn full_registry_run() {
        init_test_logging();
        let registry = ProgramRegistry::covid_facilities();
        let out = run(&registry, &inputs(), &fixture());

        let order: Vec<&str> = out.summary.per_program.keys().map(|k| k.as_str()).collect();
        let expected: Vec<&str> = registry.programs().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(order, expected);

        let (smccf, books) = disclosed(&out, "SMCCF");
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].metrics.total_amount, Decimal::new(17550, 2));
        assert_eq!(books[0].metrics.distinct_entity_count, 2);
        assert_eq!(books[0].metrics.record_count, 3);
        assert_eq!(books[1].metrics.total_amount, Decimal::from(1500));
        assert_eq!(books[1].metrics.distinct_entity_count, 2);
        assert_eq!(smccf.total_amount, Decimal::new(167550, 2));
        assert_eq!(smccf.distinct_entity_count, 4);
        assert_eq!(smccf.record_count, 5);

        let (mlf, _) = disclosed(&out, "MLF");
        assert_eq!(mlf.total_amount, Decimal::from(2_000_000_000i64));
        assert_eq!(mlf.distinct_entity_count, 1);
        assert_eq!(
            mlf.allocation_used_fraction,
            AllocationFraction::Defined(Decimal::new(4, 3))
        );

        let (ppplf, _) = disclosed(&out, "PPPLF");
        assert_eq!(ppplf.total_amount, Decimal::from(60));
        assert_eq!(ppplf.distinct_entity_count, 2);
        assert_eq!(ppplf.record_count, 3);

        // dollars, not the loan count, go into the total
        assert_eq!(
            out.summary.grand_total,
            smccf.total_amount + mlf.total_amount + ppplf.total_amount
        );

        // the credit sheet is absent from the fixture; only the sector chart is drawn
        assert_eq!(out.compositions.len(), 1);
        assert_eq!(out.compositions[0].1.title, "SMCCF Sector Composition");
        assert_eq!(out.compositions[0].1.slices[0].proportion, Decimal::new(75, 2));
        assert!(out.any_disclosure_succeeded());
    }

    #[test]
    fn shape_drift_fails_one_program_only() {
        let mut reader = fixture();
        reader.add(
            "mlf",
            "MLF",
            vec![
                padded(&["Date", "Issuer name", "Type", "Rating", "Maturity", "Rate", "Principal"], 7),
                padded(&["6/1", "State of Illinois", "GO", "BBB", "2023", "3.82%", "$1,200,000,000", "x"], 8),
            ],
        );
        let registry = ProgramRegistry::covid_facilities();
        let out = run(&registry, &inputs(), &reader);

        match &out.summary.per_program[&ProgramId::from("MLF")] {
            Resolution::Failed { error } => assert!(error.contains("has 8 cells"), "{}", error),
            other => panic!("MLF should have failed: {:?}", other),
        }
        disclosed(&out, "SMCCF");
        disclosed(&out, "PPPLF");
        assert_eq!(out.summary.missing_from_total, vec![ProgramId::from("MLF")]);
        assert!(out.any_disclosure_succeeded());
    }

    #[test]
    fn missing_workbooks_fail_but_manual_programs_remain() {
        let registry = ProgramRegistry::covid_facilities();
        let out = run(&registry, &InputSet::default(), &fixture());
        assert_eq!(out.summary.failed_count(), 3);
        assert!(!out.any_disclosure_succeeded());
        assert!(matches!(
            out.summary.per_program[&ProgramId::from("PDCF")],
            Resolution::Manual { .. }
        ));
        assert_eq!(out.summary.grand_total, Decimal::ZERO);
    }

    #[test]
    fn rerun_is_identical() {
        let registry = ProgramRegistry::covid_facilities();
        let reader = fixture();
        let first = run(&registry, &inputs(), &reader);
        let second = run(&registry, &inputs(), &reader);
        assert_eq!(first, second);

        let first_order: Vec<&ProgramId> = first.summary.per_program.keys().collect();
        let second_order: Vec<&ProgramId> = second.summary.per_program.keys().collect();
        assert_eq!(first_order, second_order);
    }

    #[test]
    fn amount_overflow_fails_one_program_only() {
        let mut reader = fixture();
        let max = "$79,228,162,514,264,337,593,543,950,335";
        reader.add(
            "ppplf",
            "Detailed Report",
            vec![
                padded(&["a", "b", "c", "Institution Name", "e", "f", "g", "h", "Advance", "j", "k", "l"], 12),
                padded(&["", "", "", "Bank A", "", "", "", "", max, "", "", ""], 12),
                padded(&["", "", "", "Bank B", "", "", "", "", max, "", "", ""], 12),
            ],
        );
        let registry = ProgramRegistry::covid_facilities();
        let out = run(&registry, &inputs(), &reader);

        match &out.summary.per_program[&ProgramId::from("PPPLF")] {
            Resolution::Failed { error } => {
                assert!(error.contains("decimal range"), "{}", error)
            }
            other => panic!("PPPLF should have failed: {:?}", other),
        }
        disclosed(&out, "SMCCF");
        disclosed(&out, "MLF");
        assert_eq!(out.summary.missing_from_total, vec![ProgramId::from("PPPLF")]);
    }

    #[test]
    fn text_in_unused_par_column_is_ignored() {
        let mut reader = fixture();
        reader.add(
            "smccf",
            "Position Summary-Bond",
            vec![
                vec!["Issuer", "Sector", "CUSIP", "Coupon", "Par", "Maturity", "Amortized Cost"],
                vec!["ACME", "Ind", "1", "3%", "n/a", "2025", "$100.00"],
                vec!["Total", "", "", "", "", "", "$100.00"],
                vec!["Source: Federal Reserve", "", "", "", "", "", ""],
            ],
        );
        let registry = ProgramRegistry::covid_facilities();
        let out = run(&registry, &inputs(), &reader);

        let (_, books) = disclosed(&out, "SMCCF");
        assert_eq!(books[0].metrics.total_amount, Decimal::from(100));
    }

    #[test]
    fn draw_charts_skips_empty_compositions() {
        let out = RunOutput {
            summary: ReportBuilder::new(Default::default()).build(Vec::<(ProgramId, Resolution)>::new()),
            compositions: vec![
                (
                    ProgramId::from("SMCCF"),
                    Composition {
                        title: "empty".into(),
                        slices: vec![],
                    },
                ),
                (
                    ProgramId::from("SMCCF"),
                    Composition {
                        title: "full".into(),
                        slices: vec![crate::chart::Slice {
                            label: "A".into(),
                            proportion: Decimal::ONE,
                        }],
                    },
                ),
            ],
        };
        let mut drawn: Vec<Composition> = Vec::new();
        out.draw_charts(&mut drawn);
        assert_eq!(drawn.len(), 1);
        assert_eq!(drawn[0].title, "full");
    }

    #[test]
    fn reads_csv_workbooks_from_disk() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mlf_dir = dir.path().join("MLF-6-15-2020");
        fs::create_dir_all(&mlf_dir)?;
        fs::write(
            mlf_dir.join("MLF.csv"),
            "Date,Issuer name,Type,Rating,Maturity,Rate,Principal\n\
             6/1/2020,State of Illinois,GO,BBB-,6/1/2023,3.82%,\"$1,200,000,000.00\"\n",
        )?;
        let manifest = dir.path().join("june.yaml");
        fs::write(
            &manifest,
            "workbooks:\n  MLF: MLF-6-15-2020\ninclude_in_total: [MLF]\n",
        )?;

        let registry = ProgramRegistry::covid_facilities();
        let inputs = InputSet::load(&manifest)?;
        let out = run(&registry, &inputs, &CsvWorkbookReader);

        let (mlf, _) = disclosed(&out, "MLF");
        assert_eq!(mlf.total_amount, Decimal::from(1_200_000_000i64));
        assert_eq!(out.summary.grand_total, mlf.total_amount);
        Ok(())
    }
}
