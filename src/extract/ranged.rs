// src/extract/ranged.rs

use arrow::record_batch::RecordBatch;
use encoding_rs::WINDOWS_1252;
use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

use crate::archive::{self, naming};
use crate::config::Config;
use crate::error::{ExtractError, Result};
use crate::table::{self, text_tag, with_column};

/// Column holding the range token of the archive a row came from.
pub const RANGE_COLUMN: &str = "DATE_RANGE";

/// Table key → table, for one date-ranged archive.
pub type TableMapping = BTreeMap<String, RecordBatch>;

#[derive(Debug, Clone)]
pub struct RangedExtract {
    pub range: String,
    pub tables: TableMapping,
    /// Members whose name lacks the range token; their keys are degenerate.
    pub unresolved: Vec<String>,
}

/// One period of a multi-period load.
#[derive(Debug, Clone)]
pub struct PeriodEntry {
    pub period: String,
    pub tables: TableMapping,
    pub unresolved: Vec<String>,
}

/// Periods in iteration order, newest first. Reconciliation precedence
/// follows this order.
pub type PeriodTables = Vec<PeriodEntry>;

/// Extract every member ending with `suffix` from one date-ranged archive,
/// keyed by the filename part before the archive's range token.
///
/// Members are read as Windows-1252. Two members mapping to the same key:
/// the later one replaces the earlier.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_ranged_archive(path: impl AsRef<Path>, suffix: &str) -> Result<RangedExtract> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();
    let range = naming::range_token(&path_str).ok_or_else(|| ExtractError::RangeToken {
        path: path_str.to_string(),
    })?;

    let buffers = {
        let mut archive = archive::open(path)?;
        let members = archive::member_names(&mut archive, path)?;
        let mut buffers = Vec::new();
        for name in archive::scan(&members, "", suffix, &HashSet::new()) {
            buffers.push((name.to_string(), archive::read_member(&mut archive, path, name)?));
        }
        buffers
    };

    let mut tables = TableMapping::new();
    let mut unresolved = Vec::new();
    for (name, bytes) in buffers {
        let key = naming::table_key(&name, &range);
        if key.is_degenerate() {
            warn!(member = %name, key = key.as_str(), range = %range, "range token not in member name; key is degenerate");
            unresolved.push(name.clone());
        }

        let raw = table::read_csv(&bytes, WINDOWS_1252, &name)?;
        let tagged = with_column(&raw, RANGE_COLUMN, text_tag(&range, raw.num_rows()))?;
        debug!(member = %name, key = key.as_str(), rows = tagged.num_rows(), "read member");

        if tables.insert(key.into_string(), tagged).is_some() {
            debug!(member = %name, "replaced earlier member with the same key");
        }
    }

    info!(range = %range, tables = tables.len(), unresolved = unresolved.len(), "extracted ranged archive");
    Ok(RangedExtract {
        range,
        tables,
        unresolved,
    })
}

/// Load each range in `ranges` (given oldest first) iterating newest
/// first. `archive_path` maps a range to its archive.
pub fn load_periods<F>(ranges: &[String], archive_path: F, suffix: &str) -> Result<PeriodTables>
where
    F: Fn(&str) -> PathBuf,
{
    let mut periods = Vec::with_capacity(ranges.len());
    for range in ranges.iter().rev() {
        let extract = load_ranged_archive(archive_path(range.as_str()), suffix)?;
        periods.push(PeriodEntry {
            period: range.clone(),
            tables: extract.tables,
            unresolved: extract.unresolved,
        });
    }
    Ok(periods)
}

/// QOF archives named by `config.qof_ranges`, newest first.
pub fn load_period_datasets(config: &Config) -> Result<PeriodTables> {
    load_periods(
        &config.qof_ranges,
        |range| config.ranged_archive_path(range),
        &config.qof_suffix,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::testutil::{init_test_logging, write_zip};
    use crate::table::string_column;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn keys_members_by_range_token() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let path = dir.path().join("QOF_2122.zip");
        write_zip(
            &path,
            &[
                ("ACHIEVEMENT_2122.csv", &b"PRACTICE_CODE,VALUE\nA01,1\nA02,2\n"[..]),
                ("PREVALENCE_2122.csv", &b"PRACTICE_CODE,REGISTER\nA01,10\n"[..]),
                ("README_2122.txt", &b"ignored"[..]),
            ],
        )?;

        let out = load_ranged_archive(&path, ".csv")?;
        assert_eq!(out.range, "2122");
        assert!(out.unresolved.is_empty());
        assert_eq!(
            out.tables.keys().collect::<Vec<_>>(),
            vec!["ACHIEVEMENT", "PREVALENCE"]
        );

        let achievement = &out.tables["ACHIEVEMENT"];
        assert_eq!(achievement.num_rows(), 2);
        let tags = string_column(achievement, RANGE_COLUMN)?;
        assert!(tags.iter().all(|t| t == Some("2122")));
        Ok(())
    }

    #[test]
    fn degenerate_key_is_kept_and_flagged() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("QOF_2021.zip");
        write_zip(&path, &[("PREVALENCE.csv", &b"PRACTICE_CODE\nA01\n"[..])])?;

        let out = load_ranged_archive(&path, ".csv")?;
        assert_eq!(out.unresolved, vec!["PREVALENCE.csv"]);
        assert!(out.tables.contains_key("PREVALENCE.cs"));
        Ok(())
    }

    #[test]
    fn later_member_with_same_key_wins() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("QOF_2122.zip");
        write_zip(
            &path,
            &[
                ("PREVALENCE_2122.csv", &b"PRACTICE_CODE\nfirst\n"[..]),
                ("PREVALENCE_2122_v2.csv", &b"PRACTICE_CODE\nsecond\n"[..]),
            ],
        )?;

        let out = load_ranged_archive(&path, ".csv")?;
        assert_eq!(out.tables.len(), 1);
        let codes = string_column(&out.tables["PREVALENCE"], "PRACTICE_CODE")?;
        assert_eq!(codes.value(0), "second");
        Ok(())
    }

    #[test]
    fn reads_legacy_codepage() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("QOF_2122.zip");
        write_zip(
            &path,
            &[("MAPPING_NHS_GEOGRAPHIES_2122.csv", &b"PRACTICE_NAME\nSt Ren\xe9 Surgery\n"[..])],
        )?;

        let out = load_ranged_archive(&path, ".csv")?;
        let names = string_column(&out.tables["MAPPING_NHS_GEOGRAPHIES"], "PRACTICE_NAME")?;
        assert_eq!(names.value(0), "St René Surgery");
        Ok(())
    }

    #[test]
    fn periods_iterate_newest_first() -> Result<()> {
        let dir = tempdir()?;
        let config = Config {
            raw_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        for range in &config.qof_ranges {
            let member = format!("PREVALENCE_{}.csv", range);
            write_zip(
                &config.ranged_archive_path(range),
                &[(member.as_str(), &b"PRACTICE_CODE\nA01\n"[..])],
            )?;
        }

        let periods = load_period_datasets(&config)?;
        let order: Vec<&str> = periods.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(order, vec!["2122", "2021", "1920"]);
        assert!(periods.iter().all(|p| p.tables.contains_key("PREVALENCE")));
        Ok(())
    }

    #[test]
    fn missing_period_archive_aborts() -> Result<()> {
        let dir = tempdir()?;
        let config = Config {
            raw_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let err = load_period_datasets(&config).unwrap_err();
        assert!(matches!(err, ExtractError::ArchiveNotFound { .. }));
        Ok(())
    }
}
