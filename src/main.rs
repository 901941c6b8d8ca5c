use anyhow::{bail, Context, Result};
use fedtrack::{
    chart::{JsonChartSink, LogChartSink},
    input_set::InputSet,
    pipeline,
    registry::ProgramRegistry,
    report::{render_summary, StdoutReporter},
    table::CsvWorkbookReader,
};
use std::{env, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) select the dated input set ───────────────────────────────
    let manifest: PathBuf = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: fedtrack <input-set.yaml>")?;

    let registry = ProgramRegistry::covid_facilities();
    let inputs = InputSet::load(&manifest)?;
    inputs.validate(&registry)?;
    match inputs.reporting_date() {
        Some(date) => info!(%date, manifest = %manifest.display(), "loaded input set"),
        None => warn!(manifest = %manifest.display(), "no reporting date given or found in file names"),
    }

    // ─── 3) normalize + aggregate every program ──────────────────────
    let output = pipeline::run(&registry, &inputs, &CsvWorkbookReader);

    // ─── 4) report + charts ──────────────────────────────────────────
    render_summary(&output.summary, &registry, &mut StdoutReporter);
    match &inputs.chart_dir {
        Some(dir) => output.draw_charts(&mut JsonChartSink::new(dir)),
        None => output.draw_charts(&mut LogChartSink),
    }

    if !output.any_disclosure_succeeded() {
        bail!(
            "no disclosure-driven program produced metrics ({} failed)",
            output.summary.failed_count()
        );
    }

    info!("all done");
    Ok(())
}
