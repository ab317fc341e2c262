// src/table/join.rs

use arrow::{
    array::{Array, ArrayRef, UInt32Array},
    compute::take,
    datatypes::{Field, Schema},
    record_batch::RecordBatch,
};
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::{info, warn};

use super::{column_index, string_column};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnNulls {
    pub column: String,
    pub nulls: usize,
}

/// Diagnostics of a left join. Unmatched rows are expected and never an
/// error; callers decide whether the counts are acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinReport {
    pub rows: usize,
    pub unmatched_rows: usize,
    pub null_counts: Vec<ColumnNulls>,
}

#[derive(Debug, Clone)]
pub struct Joined {
    pub table: RecordBatch,
    pub report: JoinReport,
}

/// Relational left join of `left` onto `right` on the Utf8 column `key`.
///
/// Left rows keep their order; each is followed by every matching right row
/// in right order, or emitted once with null right columns if none match.
/// Null keys deliberately never match, not even each other, so a null-key
/// reference row is never attached. Non-key columns present on both sides get `_x`
/// (left) and `_y` (right) suffixes; the right key column is dropped.
pub fn left_join(left: &RecordBatch, right: &RecordBatch, key: &str) -> Result<Joined> {
    let left_keys = string_column(left, key)?;
    let right_keys = string_column(right, key)?;
    let right_key_idx = column_index(right, key)?;

    let mut lookup: HashMap<&str, Vec<u32>> = HashMap::new();
    for (i, k) in right_keys.iter().enumerate() {
        if let Some(k) = k {
            lookup.entry(k).or_default().push(i as u32);
        }
    }

    let mut left_idx: Vec<u32> = Vec::with_capacity(left.num_rows());
    let mut right_idx: Vec<Option<u32>> = Vec::with_capacity(left.num_rows());
    let mut unmatched_rows = 0;
    for (i, k) in left_keys.iter().enumerate() {
        match k.and_then(|k| lookup.get(k)) {
            Some(hits) => {
                for &r in hits {
                    left_idx.push(i as u32);
                    right_idx.push(Some(r));
                }
            }
            None => {
                unmatched_rows += 1;
                left_idx.push(i as u32);
                right_idx.push(None);
            }
        }
    }
    let left_idx = UInt32Array::from(left_idx);
    let right_idx = UInt32Array::from(right_idx);

    let left_schema = left.schema();
    let right_schema = right.schema();
    let left_names: HashSet<&str> = left_schema.fields().iter().map(|f| f.name().as_str()).collect();
    let right_names: HashSet<&str> = right_schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != right_key_idx)
        .map(|(_, f)| f.name().as_str())
        .collect();

    let width = left.num_columns() + right.num_columns();
    let mut fields: Vec<Field> = Vec::with_capacity(width);
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(width);

    for (f, col) in left_schema.fields().iter().zip(left.columns()) {
        let name = if f.name() != key && right_names.contains(f.name().as_str()) {
            format!("{}_x", f.name())
        } else {
            f.name().clone()
        };
        fields.push(Field::new(name, f.data_type().clone(), f.is_nullable()));
        arrays.push(take(col.as_ref(), &left_idx, None)?);
    }
    for (i, (f, col)) in right_schema.fields().iter().zip(right.columns()).enumerate() {
        if i == right_key_idx {
            continue;
        }
        let name = if left_names.contains(f.name().as_str()) {
            format!("{}_y", f.name())
        } else {
            f.name().clone()
        };
        fields.push(Field::new(name, f.data_type().clone(), true));
        arrays.push(take(col.as_ref(), &right_idx, None)?);
    }

    let table = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    let null_counts = table
        .schema()
        .fields()
        .iter()
        .zip(table.columns())
        .map(|(f, a)| ColumnNulls {
            column: f.name().clone(),
            nulls: a.null_count(),
        })
        .collect();
    let report = JoinReport {
        rows: table.num_rows(),
        unmatched_rows,
        null_counts,
    };

    if unmatched_rows > 0 {
        warn!(key, unmatched_rows, rows = report.rows, "left join left rows without reference data");
    }
    if report.rows > left.num_rows() {
        warn!(
            key,
            extra = report.rows - left.num_rows(),
            "duplicate reference keys multiplied joined rows"
        );
    }
    info!(key, rows = report.rows, "joined");

    Ok(Joined { table, report })
}
