//! The dated set of disclosure workbooks a run processes.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

use crate::registry::{ProgramId, ProgramRegistry};
use crate::table::utils::extract_date_from_filename;

/// Parsed form of a manifest such as:
///
/// ```yaml
/// reporting_date: 2020-06-28
/// workbooks:
///   SMCCF: smccf-6-28-20.zip
///   MLF: MLF-6-15-2020
///   PPPLF: PPPLF-6-10-20.zip
/// include_in_total: [SMCCF, MLF, PPPLF]
/// chart_dir: charts
/// ```
///
/// Relative paths resolve against the manifest's directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSet {
    #[serde(default)]
    pub reporting_date: Option<NaiveDate>,
    #[serde(default)]
    pub workbooks: BTreeMap<ProgramId, PathBuf>,
    #[serde(default)]
    pub include_in_total: Option<Vec<ProgramId>>,
    #[serde(default)]
    pub chart_dir: Option<PathBuf>,
}

impl InputSet {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading manifest {:?}", path))?;
        let mut set: InputSet =
            serde_yaml::from_str(&text).with_context(|| format!("parsing manifest {:?}", path))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for wb in set.workbooks.values_mut() {
            if wb.is_relative() {
                *wb = base.join(&*wb);
            }
        }
        if let Some(dir) = set.chart_dir.as_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        Ok(set)
    }

    /// Check the manifest against the registry it will run with.
    pub fn validate(&self, registry: &ProgramRegistry) -> Result<()> {
        for id in self.workbooks.keys() {
            match registry.get(id) {
                None => warn!(program = %id, "workbook given for an unknown program"),
                Some(p) if !p.is_disclosure_driven() => {
                    warn!(program = %id, "workbook given for a manual program; ignored")
                }
                Some(_) => {}
            }
        }
        if let Some(list) = &self.include_in_total {
            for id in list {
                if !registry.contains(id) {
                    bail!("include_in_total names unknown program `{}`", id);
                }
            }
        }
        Ok(())
    }

    pub fn workbook(&self, id: &ProgramId) -> Option<&Path> {
        self.workbooks.get(id).map(PathBuf::as_path)
    }

    /// Programs counted in the grand total: the manifest's list if it has
    /// one, otherwise the registry defaults.
    pub fn inclusion(&self, registry: &ProgramRegistry) -> BTreeSet<ProgramId> {
        match &self.include_in_total {
            Some(list) => list.iter().cloned().collect(),
            None => registry.default_inclusion(),
        }
    }

    /// The explicit date, else the first date found in a workbook file name.
    pub fn reporting_date(&self) -> Option<NaiveDate> {
        self.reporting_date.or_else(|| {
            self.workbooks.values().find_map(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(extract_date_from_filename)
            })
        })
    }
}
