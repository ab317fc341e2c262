// src/table/mod.rs
//
// Table primitives over Arrow record batches. Member CSVs are read with
// every column as nullable Utf8; typing is left to the dataset builders.

pub mod join;

use arrow::{
    array::{Array, ArrayRef, AsArray, Date32Array, StringArray},
    compute::concat_batches,
    datatypes::{DataType, Field, FieldRef, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use csv::ReaderBuilder;
use encoding_rs::Encoding;
use std::sync::Arc;

use crate::error::{ExtractError, Result};

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn date32_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Parse CSV `bytes` (header row first) decoded with `encoding`.
///
/// Empty fields become nulls. A row with the wrong number of fields is a
/// `MalformedRow`; invalid bytes for the encoding are a `Decode` error.
pub fn read_csv(bytes: &[u8], encoding: &'static Encoding, member: &str) -> Result<RecordBatch> {
    let text = encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| ExtractError::Decode {
            member: member.to_string(),
            encoding: encoding.name(),
        })?;
    let body: &str = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let malformed = |e: csv::Error| ExtractError::MalformedRow {
        member: member.to_string(),
        line: e.position().map(|p| p.line()).unwrap_or(0),
        message: e.to_string(),
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .map_err(malformed)?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        return Err(ExtractError::MalformedRow {
            member: member.to_string(),
            line: 1,
            message: "no header row".into(),
        });
    }

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for result in rdr.records() {
        let record = result.map_err(malformed)?;
        for (col, field) in columns.iter_mut().zip(record.iter()) {
            col.push((!field.is_empty()).then(|| field.to_string()));
        }
    }

    let fields: Vec<Field> = headers
        .iter()
        .map(|h| Field::new(h, DataType::Utf8, true))
        .collect();
    let arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|c| Arc::new(StringArray::from(c)) as ArrayRef)
        .collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Constant `Date32` column for a period tag.
pub fn date_tag(date: NaiveDate, rows: usize) -> ArrayRef {
    Arc::new(Date32Array::from(vec![date32_days(date); rows]))
}

/// Constant `Utf8` column for a range tag.
pub fn text_tag(value: &str, rows: usize) -> ArrayRef {
    Arc::new(StringArray::from(vec![value; rows]))
}

/// New batch with `values` appended as column `name`.
pub fn with_column(batch: &RecordBatch, name: &str, values: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    fields.push(Arc::new(Field::new(
        name,
        values.data_type().clone(),
        values.null_count() > 0,
    )));
    let mut arrays = batch.columns().to_vec();
    arrays.push(values);
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

fn describe(schema: &Schema) -> String {
    schema
        .fields()
        .iter()
        .map(|f| format!("{}:{}", f.name(), f.data_type()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Positions in `b` of each column of `a`, matched by name and type.
/// `None` when the two do not carry the same set of columns.
fn aligned_indices(a: &Schema, b: &Schema) -> Option<Vec<usize>> {
    if a.fields().len() != b.fields().len() {
        return None;
    }
    let mut taken = vec![false; b.fields().len()];
    let mut indices = Vec::with_capacity(a.fields().len());
    for field in a.fields() {
        let idx = b
            .fields()
            .iter()
            .enumerate()
            .position(|(i, f)| !taken[i] && f.name() == field.name())?;
        if b.field(idx).data_type() != field.data_type() {
            return None;
        }
        taken[idx] = true;
        indices.push(idx);
    }
    Some(indices)
}

/// Stack `tables` in order. Columns are matched by name, so a table whose
/// columns are merely reordered is aligned to the first one. Differing
/// names or types are reported as `SchemaMismatch`, never reconciled.
pub fn concat(tables: &[RecordBatch], context: &str) -> Result<RecordBatch> {
    let first = tables.first().ok_or_else(|| {
        ArrowError::InvalidArgumentError(format!("{}: nothing to concatenate", context))
    })?;
    let schema = first.schema();
    let mut aligned = Vec::with_capacity(tables.len());
    aligned.push(first.clone());
    for t in &tables[1..] {
        let indices =
            aligned_indices(&schema, &t.schema()).ok_or_else(|| ExtractError::SchemaMismatch {
                context: context.to_string(),
                expected: describe(&schema),
                found: describe(&t.schema()),
            })?;
        if indices.iter().enumerate().all(|(i, &j)| i == j) {
            aligned.push(t.clone());
        } else {
            aligned.push(t.project(&indices)?);
        }
    }
    Ok(concat_batches(&schema, &aligned)?)
}

pub fn column_index(batch: &RecordBatch, column: &str) -> Result<usize> {
    batch
        .schema()
        .index_of(column)
        .map_err(|_| ExtractError::MissingColumn {
            column: column.to_string(),
        })
}

/// Borrow `column` as a string array.
pub fn string_column<'a>(batch: &'a RecordBatch, column: &str) -> Result<&'a StringArray> {
    let idx = column_index(batch, column)?;
    batch.column(idx).as_string_opt::<i32>().ok_or_else(|| {
        ExtractError::Arrow(ArrowError::SchemaError(format!(
            "column {} is {}, expected Utf8",
            column,
            batch.column(idx).data_type()
        )))
    })
}

/// Keep only `columns`, in the given order.
pub fn select(batch: &RecordBatch, columns: &[&str]) -> Result<RecordBatch> {
    let indices = columns
        .iter()
        .map(|c| column_index(batch, c))
        .collect::<Result<Vec<_>>>()?;
    Ok(batch.project(&indices)?)
}

/// Replace the Utf8 `column` with a `Date32` column parsed using the
/// chrono `format`. Nulls stay null; any other unparseable value fails.
pub fn parse_date_column(batch: &RecordBatch, column: &str, format: &str) -> Result<RecordBatch> {
    let idx = column_index(batch, column)?;
    let values = string_column(batch, column)?;

    let mut days = Vec::with_capacity(values.len());
    for v in values.iter() {
        let parsed = match v {
            Some(s) => Some(date32_days(NaiveDate::parse_from_str(s.trim(), format).map_err(
                |_| ExtractError::DateParse {
                    column: column.to_string(),
                    value: s.to_string(),
                    format: format.to_string(),
                },
            )?)),
            None => None,
        };
        days.push(parsed);
    }

    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    fields[idx] = Arc::new(Field::new(column, DataType::Date32, true));
    let mut arrays = batch.columns().to_vec();
    arrays[idx] = Arc::new(Date32Array::from(days));
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}
