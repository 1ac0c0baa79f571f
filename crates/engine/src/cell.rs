use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};

/// A single cell of a source table.
///
/// `Empty` is the absent value: missing cells in the source, padding added
/// when a result column is shorter than the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Text cell, or `Empty` for an empty string.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Integral numbers below 1e15 render without a fractional part.
    pub fn format_number(n: f64) -> String {
        if n.fract() == 0.0 && n.abs() < 1e15 {
            format!("{}", n as i64)
        } else {
            format!("{}", n)
        }
    }

    /// Date-only values drop the midnight time component.
    pub fn format_datetime(dt: &NaiveDateTime) -> String {
        if dt.num_seconds_from_midnight() == 0 {
            dt.format("%Y-%m-%d").to_string()
        } else {
            dt.format("%Y-%m-%d %H:%M:%S").to_string()
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => f.write_str(&Self::format_number(*n)),
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::DateTime(dt) => f.write_str(&Self::format_datetime(dt)),
        }
    }
}

// JSON previews: absent cells are null, integral numbers stay integers.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_none(),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::DateTime(dt) => serializer.serialize_str(&Self::format_datetime(dt)),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_empty_string_is_empty_cell() {
        assert_eq!(CellValue::text(""), CellValue::Empty);
        assert_eq!(CellValue::from("x"), CellValue::Text("x".to_string()));
    }

    #[test]
    fn test_number_display() {
        assert_eq!(CellValue::Number(42.0).to_string(), "42");
        assert_eq!(CellValue::Number(-3.5).to_string(), "-3.5");
        assert_eq!(CellValue::Number(0.1).to_string(), "0.1");
    }

    #[test]
    fn test_datetime_display() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let midnight = date.and_hms_opt(0, 0, 0).unwrap();
        let afternoon = date.and_hms_opt(14, 5, 0).unwrap();
        assert_eq!(CellValue::DateTime(midnight).to_string(), "2024-03-09");
        assert_eq!(CellValue::DateTime(afternoon).to_string(), "2024-03-09 14:05:00");
    }

    #[test]
    fn test_serialize_json_scalars() {
        let row = vec![
            CellValue::Empty,
            CellValue::Number(7.0),
            CellValue::Number(1.25),
            CellValue::Bool(true),
            CellValue::text("Acme"),
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[null,7,1.25,true,"Acme"]"#);
    }
}
