// src/archive/naming.rs
//
// Filename conventions of the published archives. Pure string handling,
// no I/O, so a convention can be swapped without touching extraction.

use chrono::NaiveDate;

/// Length of the month token at the end of a monthly member's base name.
const PERIOD_TOKEN_LEN: usize = 6;

/// Trailing month token of a monthly member, e.g. `"Mar_23"` for
/// `"SUB_ICB_LOCATION_CSV_Data_Mar_23.csv"`.
///
/// The base name ends at the first `.`; if it is shorter than six
/// characters the whole base name is returned.
pub fn period_token(member: &str) -> &str {
    let base = member.split('.').next().unwrap_or(member);
    let start = base
        .char_indices()
        .rev()
        .nth(PERIOD_TOKEN_LEN - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &base[start..]
}

/// Two-digit years below this land in 20xx, the rest in 19xx (POSIX
/// `strptime` `%y`).
const CENTURY_PIVOT: i32 = 69;

/// Parse an abbreviated-month + two-digit-year token (`%b_%y`) into the
/// first day of that month. Years 00–68 land in 20xx, 69–99 in 19xx.
pub fn parse_period_token(token: &str) -> Option<NaiveDate> {
    let (month, yy) = token.rsplit_once('_')?;
    if yy.len() != 2 || !yy.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let yy: i32 = yy.parse().ok()?;
    let year = if yy < CENTURY_PIVOT { 2000 + yy } else { 1900 + yy };
    NaiveDate::parse_from_str(&format!("01_{}_{}", month, year), "%d_%b_%Y").ok()
}

/// The four characters right before the extension of a date-ranged
/// archive path: `".../QOF_2122.zip"` → `"2122"`.
pub fn range_token(path: &str) -> Option<String> {
    let chars: Vec<char> = path.chars().collect();
    let n = chars.len();
    if n < 8 {
        return None;
    }
    Some(chars[n - 8..n - 4].iter().collect())
}

/// Table key derived from a member of a date-ranged archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKey {
    /// Range token found; key is the filename before it, minus the
    /// separator.
    Resolved(String),
    /// Range token absent; key is the whole filename minus its last
    /// character. Kept as observed in the published workflow, callers
    /// should flag it.
    Degenerate(String),
}

impl TableKey {
    pub fn as_str(&self) -> &str {
        match self {
            TableKey::Resolved(k) | TableKey::Degenerate(k) => k,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            TableKey::Resolved(k) | TableKey::Degenerate(k) => k,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, TableKey::Degenerate(_))
    }
}

/// `"ACHIEVEMENT_2122.csv"` with range `"2122"` → `Resolved("ACHIEVEMENT")`.
pub fn table_key(member: &str, range: &str) -> TableKey {
    match member.find(range) {
        Some(idx) => TableKey::Resolved(drop_last_char(&member[..idx]).to_string()),
        None => TableKey::Degenerate(drop_last_char(member).to_string()),
    }
}

fn drop_last_char(s: &str) -> &str {
    let mut chars = s.chars();
    chars.next_back();
    chars.as_str()
}
