//! `BSON` (spec §4.4): one BSON document per row, length-prefixed and
//! concatenated, via the `bson` crate.

use super::{Format, Serializer};
use crate::error::{Error, Result};
use crate::value::{Field, Row, Value};
use std::collections::HashMap;

pub struct BsonSerializer;

impl Serializer for BsonSerializer {
    fn format(&self) -> Format {
        Format::Bson
    }

    fn encode(&self, fields: &[Field], rows: &[Row], _options: &HashMap<String, String>) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for row in rows {
            let mut doc = ::bson::Document::new();
            for (field, value) in fields.iter().zip(row.iter()) {
                doc.insert(field.name.clone(), value_to_bson(value));
            }
            doc.to_writer(&mut out)
                .map_err(|e| Error::execution("serialize", format!("bson encode failed: {e}")))?;
        }
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<(Vec<Field>, Vec<Row>)> {
        let mut cursor = std::io::Cursor::new(bytes);
        let mut rows = Vec::new();
        let mut field_names: Vec<String> = Vec::new();
        while (cursor.position() as usize) < bytes.len() {
            let doc = ::bson::Document::from_reader(&mut cursor)
                .map_err(|e| Error::execution("serialize", format!("bson decode failed: {e}")))?;
            if field_names.is_empty() {
                field_names = doc.keys().map(|k| k.to_string()).collect();
            }
            let row: Row = field_names.iter().map(|k| bson_to_value(doc.get(k))).collect();
            rows.push(row);
        }
        let fields = field_names.into_iter().map(|n| Field::new(n, crate::value::JdbcType::Other)).collect();
        Ok((fields, rows))
    }
}

fn value_to_bson(value: &Value) -> ::bson::Bson {
    match value {
        Value::Null => ::bson::Bson::Null,
        Value::Bool(b) => ::bson::Bson::Boolean(*b),
        Value::Integral { value, .. } => ::bson::Bson::Int64(*value),
        Value::Float(f) => ::bson::Bson::Double(*f),
        Value::Decimal { .. } => ::bson::Bson::String(value.as_string().unwrap_or_default()),
        Value::Str(s) => ::bson::Bson::String(s.clone()),
        Value::Binary(b) => ::bson::Bson::Binary(::bson::Binary { subtype: ::bson::spec::BinarySubtype::Generic, bytes: b.clone() }),
        Value::Date(_) | Value::Time { .. } | Value::Timestamp { .. } => {
            ::bson::Bson::String(value.as_string().unwrap_or_default())
        }
        Value::Json(j) => ::bson::Bson::String(j.to_string()),
    }
}

fn bson_to_value(bson: Option<&::bson::Bson>) -> Value {
    match bson {
        None | Some(::bson::Bson::Null) => Value::Null,
        Some(::bson::Bson::Boolean(b)) => Value::Bool(*b),
        Some(::bson::Bson::Int32(i)) => Value::Integral { width: 32, signed: true, value: *i as i64 },
        Some(::bson::Bson::Int64(i)) => Value::Integral { width: 64, signed: true, value: *i },
        Some(::bson::Bson::Double(d)) => Value::Float(*d),
        Some(::bson::Bson::String(s)) => Value::Str(s.clone()),
        Some(::bson::Bson::Binary(b)) => Value::Binary(b.bytes.clone()),
        other => Value::Str(other.map(|b| b.to_string()).unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::JdbcType;

    #[test]
    fn round_trips_a_single_row() {
        let fields = vec![Field::new("a", JdbcType::Varchar), Field::new("b", JdbcType::BigInt)];
        let rows = vec![vec![Value::Str("x".into()), Value::Integral { width: 64, signed: true, value: 5 }]];
        let ser = BsonSerializer;
        let bytes = ser.encode(&fields, &rows, &HashMap::new()).unwrap();
        let (decoded_fields, decoded_rows) = ser.decode(&bytes).unwrap();
        assert_eq!(decoded_fields.len(), 2);
        assert_eq!(decoded_rows[0][0], Value::Str("x".into()));
        assert_eq!(decoded_rows[0][1], Value::Integral { width: 64, signed: true, value: 5 });
    }
}
