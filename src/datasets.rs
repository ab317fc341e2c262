// src/datasets.rs
//
// The two analysis tables built from the raw archives.

use arrow::record_batch::RecordBatch;
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::extract::{collect_monthly, load_period_datasets, MemberFilter};
use crate::reconcile::{reconcile, ReconcileSpec, Reconciled};
use crate::table::{
    join::{left_join, Joined},
    parse_date_column, select,
};

pub const APPOINTMENT_DATE_COLUMN: &str = "Appointment_Date";
/// e.g. `01MAR2023`
pub const APPOINTMENT_DATE_FORMAT: &str = "%d%b%Y";

/// Sub-ICB daily appointment rows from every configured monthly archive,
/// untyped apart from the period tag.
pub fn raw_appointments_gp_daily(config: &Config) -> Result<RecordBatch> {
    let paths: Vec<PathBuf> = config
        .monthly_periods
        .iter()
        .map(|p| config.monthly_archive_path(p))
        .collect();
    let filter = MemberFilter::new(&config.monthly_prefix, &config.monthly_suffix);
    collect_monthly(&paths, &filter)
}

/// Raw appointments with `Appointment_Date` parsed to a date, optionally
/// narrowed to `subset` columns.
pub fn sub_icb_daily(config: &Config, subset: Option<&[&str]>) -> Result<RecordBatch> {
    let raw = raw_appointments_gp_daily(config)?;
    let typed = parse_date_column(&raw, APPOINTMENT_DATE_COLUMN, APPOINTMENT_DATE_FORMAT)?;
    info!(rows = typed.num_rows(), "built sub-ICB daily table");
    match subset {
        Some(columns) => select(&typed, columns),
        None => Ok(typed),
    }
}

/// Prevalence rows from every QOF period joined onto the reconciled
/// geography mapping.
///
/// Fails with `SchemaMismatch` when the periods' column names differ,
/// which the published QOF extracts currently do between years.
pub fn mapped_practice_prevalence(config: &Config, subset: Option<&[&str]>) -> Result<Joined> {
    let periods = load_period_datasets(config)?;
    let Reconciled { fact, reference } = reconcile(&periods, &ReconcileSpec::from_config(config))?;
    let mut joined = left_join(&fact, &reference, &config.join_key)?;
    if let Some(columns) = subset {
        joined.table = select(&joined.table, columns)?;
    }
    Ok(joined)
}
