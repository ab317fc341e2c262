// src/extract/monthly.rs

use arrow::record_batch::RecordBatch;
use encoding_rs::UTF_8;
use std::{collections::HashSet, path::Path};
use tracing::{debug, info, instrument};

use crate::archive::{self, naming};
use crate::error::{ExtractError, Result};
use crate::table::{self, concat, date_tag, with_column};

/// Column holding the first day of the month a member covers.
pub const PERIOD_COLUMN: &str = "date";

/// Member name filter for monthly archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFilter {
    pub prefix: String,
    pub suffix: String,
}

impl MemberFilter {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonthlyExtract {
    /// All matched members stacked in archive order, each row tagged with
    /// its member's month.
    pub table: RecordBatch,
    /// Complete, unfiltered member listing of the archive.
    pub members: Vec<String>,
}

/// Extract every member of one monthly archive passing `filter` and not in
/// `exclude`.
#[instrument(level = "info", skip(path, filter, exclude), fields(path = %path.as_ref().display(), excluded = exclude.len()))]
pub fn load_monthly_archive(
    path: impl AsRef<Path>,
    filter: &MemberFilter,
    exclude: &HashSet<String>,
) -> Result<MonthlyExtract> {
    let path = path.as_ref();

    // buffer what we need, then let the archive go before parsing
    let (members, buffers) = {
        let mut archive = archive::open(path)?;
        let members = archive::member_names(&mut archive, path)?;
        let mut buffers = Vec::new();
        for name in archive::scan(&members, &filter.prefix, &filter.suffix, exclude) {
            buffers.push((name.to_string(), archive::read_member(&mut archive, path, name)?));
        }
        (members, buffers)
    };

    if buffers.is_empty() {
        return Err(ExtractError::NoMatchingMembers {
            path: path.to_path_buf(),
            prefix: filter.prefix.clone(),
            suffix: filter.suffix.clone(),
        });
    }

    let mut tables = Vec::with_capacity(buffers.len());
    for (name, bytes) in buffers {
        let token = naming::period_token(&name);
        let month = naming::parse_period_token(token).ok_or_else(|| ExtractError::PeriodParse {
            member: name.clone(),
            token: token.to_string(),
        })?;
        let raw = table::read_csv(&bytes, UTF_8, &name)?;
        debug!(member = %name, %month, rows = raw.num_rows(), "read member");
        tables.push(with_column(&raw, PERIOD_COLUMN, date_tag(month, raw.num_rows()))?);
    }

    let table = concat(&tables, &path.display().to_string())?;
    info!(
        matched = tables.len(),
        listed = members.len(),
        rows = table.num_rows(),
        "extracted monthly archive"
    );
    Ok(MonthlyExtract { table, members })
}

/// Extract a run of monthly archives given newest first.
///
/// After each archive the exclusion set becomes that archive's full
/// listing, so an older archive never re-supplies a member name the
/// previous (newer) one carried. Reversing `paths` reverses who wins.
pub fn collect_monthly<P: AsRef<Path>>(paths: &[P], filter: &MemberFilter) -> Result<RecordBatch> {
    let mut exclude: HashSet<String> = HashSet::new();
    let mut tables = Vec::with_capacity(paths.len());

    for path in paths {
        let MonthlyExtract { table, members } = load_monthly_archive(path, filter, &exclude)?;
        tables.push(table);
        exclude = members.into_iter().collect();
    }

    concat(&tables, "monthly archives")
}
