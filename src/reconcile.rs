// src/reconcile.rs

use arrow::{array::BooleanArray, compute::filter_record_batch, record_batch::RecordBatch};
use std::collections::HashSet;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::{ExtractError, Result};
use crate::extract::PeriodEntry;
use crate::table::{concat, string_column};

/// Which tables to stack and reconcile, and the key shared by both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSpec {
    pub fact_table: String,
    pub reference_table: String,
    pub key_column: String,
}

impl ReconcileSpec {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fact_table: config.fact_table.clone(),
            reference_table: config.reference_table.clone(),
            key_column: config.join_key.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Every period's fact rows, in period order.
    pub fact: RecordBatch,
    /// Reference rows, each key taken from the first period that has it.
    pub reference: RecordBatch,
}

fn table_of<'a>(entry: &'a PeriodEntry, table: &str) -> Result<&'a RecordBatch> {
    entry.tables.get(table).ok_or_else(|| ExtractError::MissingTable {
        period: entry.period.clone(),
        table: table.to_string(),
    })
}

/// Walk `periods` in order (newest first), stacking the fact table and
/// building the reference table with first-period-wins per key.
///
/// The first period's reference table is taken whole. Each later period
/// only contributes rows whose key is not yet in the accumulated table;
/// rows with a null key are always kept. Periods whose columns differ fail
/// with `SchemaMismatch`.
#[instrument(level = "info", skip_all, fields(fact = %spec.fact_table, reference = %spec.reference_table, periods = periods.len()))]
pub fn reconcile(periods: &[PeriodEntry], spec: &ReconcileSpec) -> Result<Reconciled> {
    let key = spec.key_column.as_str();
    let mut facts = Vec::with_capacity(periods.len());
    let mut references = Vec::with_capacity(periods.len());
    let mut index: HashSet<String> = HashSet::new();
    let mut reference_rows = 0;

    for entry in periods {
        facts.push(table_of(entry, &spec.fact_table)?.clone());

        let reference = table_of(entry, &spec.reference_table)?;
        let keys = string_column(reference, key)?;
        let fresh = if references.is_empty() {
            reference.clone()
        } else {
            let mask = BooleanArray::from(
                keys.iter()
                    .map(|k| k.map_or(true, |k| !index.contains(k)))
                    .collect::<Vec<bool>>(),
            );
            filter_record_batch(reference, &mask)?
        };

        let fresh_keys = string_column(&fresh, key)?;
        index.extend(fresh_keys.iter().flatten().map(str::to_string));
        reference_rows += fresh.num_rows();
        info!(
            period = %entry.period,
            added = fresh.num_rows(),
            reference_rows,
            "reconciled period"
        );
        references.push(fresh);
    }

    Ok(Reconciled {
        fact: concat(&facts, &format!("{} across periods", spec.fact_table))?,
        reference: concat(&references, &format!("{} across periods", spec.reference_table))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::TableMapping;
    use crate::table::read_csv;
    use anyhow::Result;
    use encoding_rs::UTF_8;

    fn spec() -> ReconcileSpec {
        ReconcileSpec::from_config(&Config::default())
    }

    fn period(name: &str, prevalence: &str, mapping: &str) -> Result<PeriodEntry> {
        let mut tables = TableMapping::new();
        tables.insert(
            "PREVALENCE".into(),
            read_csv(prevalence.as_bytes(), UTF_8, "prevalence")?,
        );
        tables.insert(
            "MAPPING_NHS_GEOGRAPHIES".into(),
            read_csv(mapping.as_bytes(), UTF_8, "mapping")?,
        );
        Ok(PeriodEntry {
            period: name.into(),
            tables,
            unresolved: Vec::new(),
        })
    }

    fn rows(t: &RecordBatch, col: &str) -> Vec<String> {
        string_column(t, col)
            .map(|c| c.iter().map(|v| v.unwrap_or("<null>").to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn newest_period_wins_and_older_fills_gaps() -> Result<()> {
        let periods = vec![
            period(
                "2122",
                "PRACTICE_CODE,REGISTER\nK1,10\nK3,30\n",
                "PRACTICE_CODE,REGION\nK1,North-new\nK3,East\n",
            )?,
            period(
                "2021",
                "PRACTICE_CODE,REGISTER\nK1,11\nK2,21\n",
                "PRACTICE_CODE,REGION\nK1,North-old\nK2,South\n",
            )?,
            period(
                "1920",
                "PRACTICE_CODE,REGISTER\nK2,22\nK4,40\n",
                "PRACTICE_CODE,REGION\nK2,South-oldest\nK4,West\n,Nowhere\n",
            )?,
        ];

        let out = reconcile(&periods, &spec())?;

        assert_eq!(out.fact.num_rows(), 6);
        assert_eq!(rows(&out.fact, "REGISTER"), vec!["10", "30", "11", "21", "22", "40"]);

        assert_eq!(
            rows(&out.reference, "PRACTICE_CODE"),
            vec!["K1", "K3", "K2", "K4", "<null>"]
        );
        assert_eq!(
            rows(&out.reference, "REGION"),
            vec!["North-new", "East", "South", "West", "Nowhere"]
        );
        Ok(())
    }

    #[test]
    fn missing_reference_table_names_the_period() -> Result<()> {
        let mut entry = period("2021", "PRACTICE_CODE\nK1\n", "PRACTICE_CODE\nK1\n")?;
        entry.tables.remove("MAPPING_NHS_GEOGRAPHIES");

        match reconcile(&[entry], &spec()) {
            Err(ExtractError::MissingTable { period, table }) => {
                assert_eq!(period, "2021");
                assert_eq!(table, "MAPPING_NHS_GEOGRAPHIES");
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn renamed_columns_across_periods_are_not_reconciled() -> Result<()> {
        let periods = vec![
            period("2122", "PRACTICE_CODE,REGISTER\nK1,1\n", "PRACTICE_CODE,REGION\nK1,N\n")?,
            period("2021", "PRACTICE_CODE,LIST_SIZE\nK2,2\n", "PRACTICE_CODE,REGION\nK2,S\n")?,
        ];
        assert!(matches!(
            reconcile(&periods, &spec()),
            Err(ExtractError::SchemaMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn reordered_fact_columns_still_stack() -> Result<()> {
        let periods = vec![
            period("2122", "PRACTICE_CODE,REGISTER\nK1,1\n", "PRACTICE_CODE,REGION\nK1,N\n")?,
            period("2021", "REGISTER,PRACTICE_CODE\n2,K2\n", "PRACTICE_CODE,REGION\nK2,S\n")?,
        ];

        let out = reconcile(&periods, &spec())?;
        assert_eq!(rows(&out.fact, "PRACTICE_CODE"), vec!["K1", "K2"]);
        assert_eq!(rows(&out.fact, "REGISTER"), vec!["1", "2"]);
        Ok(())
    }

    #[test]
    fn reference_without_key_column_fails() -> Result<()> {
        let periods = vec![period(
            "2122",
            "PRACTICE_CODE,REGISTER\nK1,1\n",
            "ORG_CODE,REGION\nK1,N\n",
        )?];

        match reconcile(&periods, &spec()) {
            Err(ExtractError::MissingColumn { column }) => assert_eq!(column, "PRACTICE_CODE"),
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn missing_fact_table_names_the_period() -> Result<()> {
        let newest = period("2122", "PRACTICE_CODE\nK1\n", "PRACTICE_CODE\nK1\n")?;
        let mut older = period("2021", "PRACTICE_CODE\nK2\n", "PRACTICE_CODE\nK2\n")?;
        older.tables.remove("PREVALENCE");

        match reconcile(&[newest, older], &spec()) {
            Err(ExtractError::MissingTable { period, table }) => {
                assert_eq!(period, "2021");
                assert_eq!(table, "PREVALENCE");
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }
}
