// src/extract/mod.rs

pub mod monthly;
pub mod ranged;

pub use monthly::{collect_monthly, load_monthly_archive, MemberFilter, MonthlyExtract};
pub use ranged::{
    load_period_datasets, load_periods, load_ranged_archive, PeriodEntry, PeriodTables,
    RangedExtract, TableMapping,
};
