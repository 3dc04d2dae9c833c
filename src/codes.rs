//! Sequential, zero padded record codes (`AYK000000042`, `G000000007`).
//!
//! The last issued code only lives in the table. A new code is derived from
//! the greatest existing one inside the caller's `BEGIN IMMEDIATE`
//! transaction, so two writers never observe the same maximum. Ordering by
//! the text column is only sound because every code has the same width.

use anyhow::Context;
use rusqlite::{OptionalExtension, Transaction};

pub const CODE_DIGITS: usize = 9;

/// Which family of codes to issue and where they are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Cargo,
    Volunteer,
}

impl CodeKind {
    pub fn prefix(self) -> &'static str {
        match self {
            CodeKind::Cargo => "AYK",
            CodeKind::Volunteer => "G",
        }
    }

    fn table(self) -> &'static str {
        match self {
            CodeKind::Cargo => "kargo",
            CodeKind::Volunteer => "volunteers",
        }
    }

    fn column(self) -> &'static str {
        match self {
            CodeKind::Cargo => "kargo_no",
            CodeKind::Volunteer => "gonulluluk_no",
        }
    }

    pub fn code_len(self) -> usize {
        self.prefix().len() + CODE_DIGITS
    }
}

pub fn format_code(kind: CodeKind, n: u64) -> String {
    format!("{}{:0width$}", kind.prefix(), n, width = CODE_DIGITS)
}

/// Numeric suffix of a well formed code.
pub fn parse_suffix(kind: CodeKind, code: &str) -> Option<u64> {
    let digits = code.strip_prefix(kind.prefix())?;
    if digits.len() != CODE_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// The code that follows `last`, or the first code when there is none.
pub fn next_after(kind: CodeKind, last: Option<&str>) -> anyhow::Result<String> {
    let next = match last {
        None => 0,
        Some(code) => {
            let n = parse_suffix(kind, code)
                .with_context(|| format!("stored {} code is malformed: {code}", kind.prefix()))?;
            n.checked_add(1).context("code space exhausted")?
        }
    };
    if next >= 10u64.pow(CODE_DIGITS as u32) {
        anyhow::bail!("{} code space exhausted", kind.prefix());
    }
    Ok(format_code(kind, next))
}

/// Reads the current maximum and returns the next code.
///
/// Must run inside an immediate transaction that also performs the insert.
pub fn next_code(tx: &Transaction<'_>, kind: CodeKind) -> anyhow::Result<String> {
    let sql = format!(
        "SELECT {col} FROM {table} WHERE substr({col}, 1, ?1) = ?2 AND length({col}) = ?3 \
         ORDER BY {col} DESC LIMIT 1",
        col = kind.column(),
        table = kind.table(),
    );
    let last: Option<String> = tx
        .query_row(
            &sql,
            rusqlite::params![kind.prefix().len() as i64, kind.prefix(), kind.code_len() as i64],
            |row| row.get(0),
        )
        .optional()?;
    next_after(kind, last.as_deref())
}

/// Checks a tracking code before it reaches the database.
pub fn validate_cargo_number(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        return Err("Kargo numarası boş olamaz");
    }
    if !code.starts_with(CodeKind::Cargo.prefix()) {
        return Err("Kargo numarası AYK ile başlamalıdır");
    }
    if code.len() != CodeKind::Cargo.code_len() {
        return Err("Kargo numarası 12 karakter olmalıdır (AYK + 9 rakam)");
    }
    if !code[CodeKind::Cargo.prefix().len()..].bytes().all(|b| b.is_ascii_digit()) {
        return Err("Kargo numarasının son 9 karakteri rakam olmalıdır");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_code_is_zero() {
        assert_eq!(next_after(CodeKind::Cargo, None).unwrap(), "AYK000000000");
        assert_eq!(next_after(CodeKind::Volunteer, None).unwrap(), "G000000000");
    }

    #[test]
    fn increments_suffix() {
        assert_eq!(next_after(CodeKind::Cargo, Some("AYK000000041")).unwrap(), "AYK000000042");
        assert_eq!(next_after(CodeKind::Volunteer, Some("G000000999")).unwrap(), "G000001000");
    }

    #[test]
    fn refuses_malformed_or_exhausted() {
        assert!(next_after(CodeKind::Cargo, Some("AYK12")).is_err());
        assert!(next_after(CodeKind::Cargo, Some("AYK999999999")).is_err());
    }

    #[test]
    fn cargo_number_messages_are_distinct() {
        let cases = ["", "XYZ000000001", "AYK0001", "AYK00000000A"];
        let messages: Vec<_> = cases.iter().map(|c| validate_cargo_number(c).unwrap_err()).collect();
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(validate_cargo_number("AYK000000123").is_ok());
    }

    #[test]
    fn non_ascii_suffix_is_rejected_without_panicking() {
        assert!(validate_cargo_number("AYKçç0000000").is_err());
    }
}
