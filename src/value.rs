//! Uniform result value model (spec §3: Field, Row, Value).
//!
//! `Value` is a tagged union rather than a class hierarchy (spec §9 calls
//! out the source's `Value` subtype hierarchy for redesign); conversions
//! are plain functions over the tag, not virtual dispatch.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;

/// Abstract JDBC-ish type tag carried on every `Field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JdbcType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Char,
    Varchar,
    Binary,
    Date,
    Time,
    Timestamp,
    TimestampWithTimeZone,
    Array,
    Json,
    Other,
    Null,
}

/// Rounding mode used when narrowing decimals/temporal scales (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMode {
    #[default]
    Down,
    Up,
    HalfUp,
    HalfEven,
    Ceiling,
    Floor,
}

fn round_fraction(value: i128, from_scale: u8, to_scale: u8, mode: RoundingMode) -> i128 {
    if to_scale >= from_scale {
        return value * 10i128.pow((to_scale - from_scale) as u32);
    }
    let drop = (from_scale - to_scale) as u32;
    let divisor = 10i128.pow(drop);
    let truncated = value / divisor;
    let remainder = value % divisor;
    if remainder == 0 {
        return truncated;
    }
    let neg = value < 0;
    let rem_abs = remainder.abs();
    match mode {
        RoundingMode::Down => truncated,
        RoundingMode::Up => {
            if neg {
                truncated - 1
            } else {
                truncated + 1
            }
        }
        RoundingMode::Ceiling => {
            if neg {
                truncated
            } else {
                truncated + 1
            }
        }
        RoundingMode::Floor => {
            if neg {
                truncated - 1
            } else {
                truncated
            }
        }
        RoundingMode::HalfUp => {
            if rem_abs * 2 >= divisor {
                if neg {
                    truncated - 1
                } else {
                    truncated + 1
                }
            } else {
                truncated
            }
        }
        RoundingMode::HalfEven => {
            if rem_abs * 2 > divisor || (rem_abs * 2 == divisor && truncated % 2 != 0) {
                if neg {
                    truncated - 1
                } else {
                    truncated + 1
                }
            } else {
                truncated
            }
        }
    }
}

/// A single column descriptor. Names are uniquified within a `Row` set by
/// the caller (see `uniquify_field_names`).
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub jdbc_type: JdbcType,
    pub nullable: bool,
    pub signed: bool,
    pub precision: u32,
    pub scale: u8,
    pub database_type: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, jdbc_type: JdbcType) -> Self {
        Field {
            name: name.into(),
            jdbc_type,
            nullable: true,
            signed: true,
            precision: 0,
            scale: 0,
            database_type: None,
        }
    }
}

/// Suffix duplicate field names with `_N` (spec §3: "collisions resolve by
/// suffixing `_N`").
pub fn uniquify_field_names(fields: &mut [Field]) {
    use std::collections::HashMap;
    let mut seen: HashMap<String, u32> = HashMap::new();
    for field in fields.iter_mut() {
        let count = seen.entry(field.name.clone()).or_insert(0);
        if *count > 0 {
            field.name = format!("{}_{}", field.name, *count);
        }
        *count += 1;
    }
}

pub type Row = Vec<Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integral { width: u8, signed: bool, value: i64 },
    Float(f64),
    Decimal { unscaled: i128, scale: u8, precision: u32 },
    Str(String),
    Binary(Vec<u8>),
    Date(i32), // days since epoch
    Time { nanos_of_day: i64, scale: u8 },
    Timestamp { epoch_nanos: i128, scale: u8, zoned: bool },
    Json(serde_json::Value),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integral { value, .. } => Some(*value != 0),
            Value::Str(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" => Some(true),
                "false" | "f" | "0" | "no" => Some(false),
                _ => None,
            },
            Value::Null => None,
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integral { value, .. } => Some(*value),
            Value::Bool(b) => Some(*b as i64),
            Value::Float(f) => Some(*f as i64),
            Value::Decimal { unscaled, scale, .. } => {
                Some((unscaled / 10i128.pow(*scale as u32)) as i64)
            }
            Value::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integral { value, .. } => Some(*value as f64),
            Value::Decimal { unscaled, scale, .. } => {
                Some(*unscaled as f64 / 10f64.powi(*scale as i32))
            }
            Value::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// `asBigDecimal(scale)`: convert to a decimal at the given scale,
    /// rounding with `mode` (default `Down` per spec §4.4).
    pub fn as_big_decimal(&self, target_scale: u8, mode: RoundingMode) -> Option<(i128, u8)> {
        match self {
            Value::Decimal { unscaled, scale, .. } => {
                Some((round_fraction(*unscaled, *scale, target_scale, mode), target_scale))
            }
            Value::Integral { value, .. } => {
                Some((round_fraction(*value as i128, 0, target_scale, mode), target_scale))
            }
            Value::Float(f) => {
                let scaled = (*f * 10f64.powi(target_scale as i32)).round() as i128;
                Some((scaled, target_scale))
            }
            Value::Str(s) => {
                let f: f64 = s.parse().ok()?;
                let scaled = (f * 10f64.powi(target_scale as i32)).round() as i128;
                Some((scaled, target_scale))
            }
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Str(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Integral { value, .. } => Some(value.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Decimal { unscaled, scale, .. } => Some(format_decimal(*unscaled, *scale)),
            Value::Binary(b) => Some(hex_encode(b)),
            Value::Date(d) => Some(format!("epoch+{d}d")),
            Value::Time { nanos_of_day, .. } => Some(nanos_of_day.to_string()),
            Value::Timestamp { epoch_nanos, .. } => Some(epoch_nanos.to_string()),
            Value::Json(j) => Some(j.to_string()),
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integral { value, .. } => serde_json::json!(value),
            Value::Float(f) => serde_json::json!(f),
            Value::Decimal { unscaled, scale, .. } => {
                serde_json::Value::String(format_decimal(*unscaled, *scale))
            }
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Binary(b) => serde_json::Value::String(hex_encode(b)),
            Value::Date(d) => serde_json::json!(d),
            Value::Time { nanos_of_day, .. } => serde_json::json!(nanos_of_day),
            Value::Timestamp { epoch_nanos, .. } => {
                serde_json::Value::String(epoch_nanos.to_string())
            }
            Value::Json(j) => j.clone(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.as_json().serialize(serializer)
    }
}

pub fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

fn format_decimal(unscaled: i128, scale: u8) -> String {
    if scale == 0 {
        return unscaled.to_string();
    }
    let neg = unscaled < 0;
    let abs = unscaled.unsigned_abs();
    let s = abs.to_string();
    let scale = scale as usize;
    let s = if s.len() <= scale {
        format!("{}{}", "0".repeat(scale - s.len() + 1), s)
    } else {
        s
    };
    let (int_part, frac_part) = s.split_at(s.len() - scale);
    format!("{}{}.{}", if neg { "-" } else { "" }, int_part, frac_part)
}

/// Integer widening order used for numeric coercion (spec §4.4): int8 -> int16
/// -> int32 -> int64 -> bigint -> decimal.
pub fn widen_rank(jdbc_type: JdbcType) -> u8 {
    match jdbc_type {
        JdbcType::TinyInt => 0,
        JdbcType::SmallInt => 1,
        JdbcType::Integer => 2,
        JdbcType::BigInt => 3,
        JdbcType::Decimal => 4,
        _ => 5,
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniquify_appends_suffix_on_collision() {
        let mut fields = vec![
            Field::new("a", JdbcType::Integer),
            Field::new("a", JdbcType::Integer),
            Field::new("a", JdbcType::Integer),
        ];
        uniquify_field_names(&mut fields);
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a_1", "a_2"]);
    }

    #[test]
    fn decimal_rounding_down_truncates() {
        let v = Value::Decimal { unscaled: 1234, scale: 2, precision: 10 }; // 12.34
        let (unscaled, scale) = v.as_big_decimal(1, RoundingMode::Down).unwrap();
        assert_eq!(scale, 1);
        assert_eq!(unscaled, 123); // 12.3
    }

    #[test]
    fn decimal_rounding_half_up() {
        let v = Value::Decimal { unscaled: 1235, scale: 2, precision: 10 }; // 12.35
        let (unscaled, _) = v.as_big_decimal(1, RoundingMode::HalfUp).unwrap();
        assert_eq!(unscaled, 124); // 12.4
    }

    #[test]
    fn format_decimal_handles_small_values() {
        assert_eq!(format_decimal(5, 2), "0.05");
        assert_eq!(format_decimal(-5, 2), "-0.05");
        assert_eq!(format_decimal(1234, 2), "12.34");
    }
}
