use rust_decimal::Decimal;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{error, info, warn};

use crate::aggregate::checked_total;
use crate::errors::{FedTrackError, FedTrackResult};
use crate::normalize::CleanTable;
use crate::shape::ColumnRole;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slice {
    pub label: String,
    /// Fraction of the whole; all slices of a chart add up to one.
    pub proportion: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Composition {
    pub title: String,
    pub slices: Vec<Slice>,
}

impl Composition {
    /// Turn a `Label`/`Share` table into proportions.
    ///
    /// Rows with a blank share are skipped. A table whose shares add up to
    /// zero yields no slices. Shares adding up past the decimal range fail
    /// with [`FedTrackError::AmountOverflow`].
    pub fn from_table(title: impl Into<String>, clean: &CleanTable) -> FedTrackResult<Self> {
        let title = title.into();
        let weighted: Vec<(String, Decimal)> = clean
            .rows
            .iter()
            .filter_map(|r| {
                let share = r.get(ColumnRole::Share).as_decimal()?;
                Some((r.get(ColumnRole::Label).to_string(), share))
            })
            .collect();

        let total = checked_total(weighted.iter().map(|(_, s)| *s)).ok_or_else(|| {
            FedTrackError::AmountOverflow {
                sheet: clean.sheet.clone(),
            }
        })?;
        if total.is_zero() {
            warn!(chart = %title, "composition has no weight; nothing to draw");
            return Ok(Self {
                title,
                slices: Vec::new(),
            });
        }

        let slices = weighted
            .into_iter()
            .map(|(label, share)| Slice {
                label,
                proportion: share / total,
            })
            .collect();
        Ok(Self { title, slices })
    }
}

/// Draws labeled proportions somewhere.
pub trait ChartSink {
    fn render_pie(&mut self, title: &str, slices: &[Slice]);
}

/// Writes each chart as `<dir>/<slug>.json` for an external plotting step.
#[derive(Debug, Clone)]
pub struct JsonChartSink {
    dir: PathBuf,
}

impl JsonChartSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write(&self, title: &str, slices: &[Slice]) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.json", slug(title)));
        let chart = Composition {
            title: title.to_string(),
            slices: slices.to_vec(),
        };
        fs::write(&path, serde_json::to_vec_pretty(&chart)?)?;
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ChartSink for JsonChartSink {
    fn render_pie(&mut self, title: &str, slices: &[Slice]) {
        match self.write(title, slices) {
            Ok(path) => info!(chart = title, path = %path.display(), "wrote chart"),
            Err(e) => error!(chart = title, "failed to write chart: {:#}", e),
        }
    }
}

/// Logs each slice at info level; used when no chart directory is configured.
#[derive(Debug, Default)]
pub struct LogChartSink;

impl ChartSink for LogChartSink {
    fn render_pie(&mut self, title: &str, slices: &[Slice]) {
        for s in slices {
            let pct = (s.proportion * Decimal::ONE_HUNDRED).round_dp(1);
            info!(chart = title, label = %s.label, "{}%", pct);
        }
    }
}

impl ChartSink for Vec<Composition> {
    fn render_pie(&mut self, title: &str, slices: &[Slice]) {
        self.push(Composition {
            title: title.to_string(),
            slices: slices.to_vec(),
        });
    }
}

fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_us = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_us = false;
        } else if !last_us {
            out.push('_');
            last_us = true;
        }
    }
    let out = out.trim_matches('_').to_string();
    if out.is_empty() {
        "chart".to_string()
    } else {
        out
    }
}
