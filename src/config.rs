// src/config.rs

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{ExtractError, Result};

/// Format used by the interim sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

/// Pipeline settings. Every field has a default matching the published
/// NHS Digital archive layout, so an empty YAML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the downloaded zip archives.
    pub raw_dir: PathBuf,
    /// Directory the interim sink writes to.
    pub interim_dir: PathBuf,
    pub output_format: OutputFormat,

    /// Monthly appointment archives, newest first. Order decides which
    /// archive wins when two of them carry the same member.
    pub monthly_periods: Vec<String>,
    pub monthly_prefix: String,
    pub monthly_suffix: String,

    /// QOF range codes in chronological order; iterated newest first.
    pub qof_ranges: Vec<String>,
    pub qof_suffix: String,

    pub fact_table: String,
    pub reference_table: String,
    pub join_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            interim_dir: PathBuf::from("data/interim"),
            output_format: OutputFormat::Csv,
            monthly_periods: vec!["Mar_23".into(), "Sep_22".into()],
            monthly_prefix: "SUB_ICB_LOCATION_CSV_".into(),
            monthly_suffix: ".csv".into(),
            qof_ranges: vec!["1920".into(), "2021".into(), "2122".into()],
            qof_suffix: ".csv".into(),
            fact_table: "PREVALENCE".into(),
            reference_table: "MAPPING_NHS_GEOGRAPHIES".into(),
            join_key: "PRACTICE_CODE".into(),
        }
    }
}

impl Config {
    /// Load from a YAML file; missing keys fall back to the defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        serde_yaml::from_str(&text).map_err(|source| ExtractError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `{raw_dir}/Appointments_GP_Daily_CSV_{period}.zip`
    pub fn monthly_archive_path(&self, period: &str) -> PathBuf {
        self.raw_dir
            .join(format!("Appointments_GP_Daily_CSV_{}.zip", period))
    }

    /// `{raw_dir}/QOF_{range}.zip`
    pub fn ranged_archive_path(&self, range: &str) -> PathBuf {
        self.raw_dir.join(format!("QOF_{}.zip", range))
    }
}
