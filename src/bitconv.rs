//! Human readable byte sizes.
//!
//! `format(31323) == "30.59KB"`, `parse("6GB") == 6 * 1024^3`. Units are powers of
//! 1024; the trailing `B` of a unit is optional (`6G` == `6GB`) and case is ignored.

use thiserror::Error;

pub const B: i64 = 1;
pub const KB: i64 = B << 10;
pub const MB: i64 = KB << 10;
pub const GB: i64 = MB << 10;
pub const TB: i64 = GB << 10;
pub const PB: i64 = TB << 10;
pub const EB: i64 = PB << 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitConvError {
    #[error("error parsing value={0}")]
    Invalid(String),
    #[error("value {0} overflows a 64-bit byte count")]
    Overflow(String),
}

/// Byte size converter. Stateless; the free functions [`format`] and [`parse`]
/// delegate to a shared instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitConv;

impl BitConv {
    pub fn new() -> Self {
        BitConv
    }

    /// Formats a byte count with two decimals and the largest fitting unit.
    pub fn format(&self, b: i64) -> String {
        let (divisor, unit) = match b {
            b if b < KB => return format!("{}B", b),
            b if b < MB => (KB, "KB"),
            b if b < GB => (MB, "MB"),
            b if b < TB => (GB, "GB"),
            b if b < PB => (TB, "TB"),
            b if b < EB => (PB, "PB"),
            _ => (EB, "EB"),
        };
        format!("{:.2}{}", b as f64 / divisor as f64, unit)
    }

    /// Parses `-?\d+` followed by one of `B`, `K`, `KB`, `M`, `MB`, `G`, `GB`, `T`,
    /// `TB`, `P`, `PB`.
    pub fn parse(&self, value: &str) -> Result<i64, BitConvError> {
        let invalid = || BitConvError::Invalid(value.to_string());

        let digits_start = usize::from(value.starts_with('-'));
        let digits_end = value[digits_start..]
            .find(|c: char| !c.is_ascii_digit())
            .map(|i| i + digits_start)
            .ok_or_else(invalid)?;
        if digits_end == digits_start {
            return Err(invalid());
        }

        let multiple = match value[digits_end..].to_ascii_uppercase().as_str() {
            "B" => B,
            "K" | "KB" => KB,
            "M" | "MB" => MB,
            "G" | "GB" => GB,
            "T" | "TB" => TB,
            "P" | "PB" => PB,
            _ => return Err(invalid()),
        };

        let bytes: i64 = value[..digits_end]
            .parse()
            .map_err(|_| BitConvError::Overflow(value.to_string()))?;
        bytes.checked_mul(multiple).ok_or_else(|| BitConvError::Overflow(value.to_string()))
    }
}

/// Formats bytes to a human readable string, e.g. `31323` -> `30.59KB`.
pub fn format(b: i64) -> String {
    BitConv.format(b)
}

/// Parses a human readable byte size, e.g. `6GB` (or `6G`) -> `6442450944`.
pub fn parse(value: &str) -> Result<i64, BitConvError> {
    BitConv.parse(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(format(0), "0B");
        assert_eq!(format(1023), "1023B");
        assert_eq!(format(1024), "1.00KB");
        assert_eq!(format(31323), "30.59KB");
        assert_eq!(format(13231323), "12.62MB");
        assert_eq!(format(7323232398), "6.82GB");
        assert_eq!(format(7 * TB), "7.00TB");
        assert_eq!(format(9 * PB + PB / 2), "9.50PB");
        assert_eq!(format(2 * EB), "2.00EB");
        assert_eq!(format(-5), "-5B");
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse("6GB"), Ok(6 * GB));
        assert_eq!(parse("6G"), Ok(6442450944));
        assert_eq!(parse("6gb"), Ok(6 * GB));
        assert_eq!(parse("10B"), Ok(10));
        assert_eq!(parse("4K"), Ok(4096));
        assert_eq!(parse("4KB"), Ok(4096));
        assert_eq!(parse("2M"), Ok(2 * MB));
        assert_eq!(parse("3TB"), Ok(3 * TB));
        assert_eq!(parse("1P"), Ok(PB));
        assert_eq!(parse("-1K"), Ok(-1024));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse(""), Err(BitConvError::Invalid(_))));
        assert!(matches!(parse("123"), Err(BitConvError::Invalid(_))));
        assert!(matches!(parse("KB"), Err(BitConvError::Invalid(_))));
        assert!(matches!(parse("1.5GB"), Err(BitConvError::Invalid(_))));
        assert!(matches!(parse("12 MB"), Err(BitConvError::Invalid(_))));
        assert!(matches!(parse("5E"), Err(BitConvError::Invalid(_))));
        assert!(matches!(parse("-"), Err(BitConvError::Invalid(_))));
    }

    #[test]
    fn test_parse_overflow() {
        assert!(matches!(parse("9999999P"), Err(BitConvError::Overflow(_))));
        assert!(matches!(parse("99999999999999999999B"), Err(BitConvError::Overflow(_))));
    }

    #[test]
    fn test_format_parse_agree_on_whole_units() {
        for (text, bytes) in [("1KB", KB), ("5MB", 5 * MB), ("6GB", 6 * GB)] {
            assert_eq!(parse(text).unwrap(), bytes);
            assert!(format(bytes).ends_with(&text[1..]));
        }
    }
}
