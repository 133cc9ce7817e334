//! Hand-written text formats (spec §4.4): no crate covers NDJSON's
//! `0x1E`-record-separator framing or SQL-literal `VALUES` rendering, so
//! these match the teacher's own hand-rolled `server/encode.rs` text
//! formatter instead of reaching for a crate that doesn't exist for this.

use super::{Format, Serializer};
use crate::error::Result;
use crate::value::{Field, Row, Value};
use std::collections::HashMap;

/// `JSONL`: one JSON value per line, object-mode keyed by field name.
pub struct JsonLinesSerializer {
    array_mode: bool,
}

impl JsonLinesSerializer {
    pub fn object_mode() -> Self {
        JsonLinesSerializer { array_mode: false }
    }
}

impl Serializer for JsonLinesSerializer {
    fn format(&self) -> Format {
        Format::Jsonl
    }

    fn encode(&self, fields: &[Field], rows: &[Row], options: &HashMap<String, String>) -> Result<Vec<u8>> {
        let null_value = options.get("null.value").map(|s| s.as_str()).unwrap_or("null");
        let mut out = Vec::new();
        for row in rows {
            let line = row_to_json(fields, row, self.array_mode, null_value)?;
            out.extend_from_slice(serde_json::to_string(&line)?.as_bytes());
            out.push(b'\n');
        }
        Ok(out)
    }
}

/// `NDJSON` (RFC 7464): identical encoding to JSONL, but each record is
/// prefixed by the ASCII record-separator byte `0x1E`.
pub struct NdjsonSerializer;

impl Serializer for NdjsonSerializer {
    fn format(&self) -> Format {
        Format::Ndjson
    }

    fn encode(&self, fields: &[Field], rows: &[Row], options: &HashMap<String, String>) -> Result<Vec<u8>> {
        let null_value = options.get("null.value").map(|s| s.as_str()).unwrap_or("null");
        let mut out = Vec::new();
        for row in rows {
            let line = row_to_json(fields, row, false, null_value)?;
            out.push(0x1E);
            out.extend_from_slice(serde_json::to_string(&line)?.as_bytes());
            out.push(b'\n');
        }
        Ok(out)
    }
}

fn row_to_json(fields: &[Field], row: &Row, array_mode: bool, null_value: &str) -> Result<serde_json::Value> {
    if array_mode {
        Ok(serde_json::Value::Array(row.iter().map(|v| value_to_json(v, null_value)).collect()))
    } else {
        let mut map = serde_json::Map::new();
        for (field, value) in fields.iter().zip(row.iter()) {
            map.insert(field.name.clone(), value_to_json(value, null_value));
        }
        Ok(serde_json::Value::Object(map))
    }
}

fn value_to_json(value: &Value, null_value: &str) -> serde_json::Value {
    if value.is_null() {
        if null_value == "null" {
            serde_json::Value::Null
        } else {
            serde_json::Value::String(null_value.to_string())
        }
    } else {
        value.as_json()
    }
}

/// `VALUES`: SQL `INSERT ... VALUES (...), (...)` literal rendering.
pub struct ValuesSerializer;

impl Serializer for ValuesSerializer {
    fn format(&self) -> Format {
        Format::Values
    }

    fn encode(&self, fields: &[Field], rows: &[Row], options: &HashMap<String, String>) -> Result<Vec<u8>> {
        let table = options.get("table.name").map(|s| s.as_str()).unwrap_or("t");
        let null_value = options.get("null.value").map(|s| s.as_str()).unwrap_or("NULL");
        let mut out = format!(
            "INSERT INTO {table} ({}) VALUES\n",
            fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        let tuples: Vec<String> = rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = row
                    .iter()
                    .map(|v| {
                        if v.is_null() {
                            null_value.to_string()
                        } else {
                            sql_literal(v)
                        }
                    })
                    .collect();
                format!("({})", cells.join(", "))
            })
            .collect();
        out.push_str(&tuples.join(",\n"));
        out.push(';');
        out.push('\n');
        Ok(out.into_bytes())
    }
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Binary(b) => format!("X'{}'", crate::value::hex_encode(b)),
        other => other.as_string().unwrap_or_default(),
    }
}

/// `TXT`: pretty-printed fixed-width table, grounded on the teacher's
/// per-type-tag cell formatting in `server/types.rs`/`server/encode.rs`.
pub struct TxtSerializer;

impl Serializer for TxtSerializer {
    fn format(&self) -> Format {
        Format::Txt
    }

    fn encode(&self, fields: &[Field], rows: &[Row], options: &HashMap<String, String>) -> Result<Vec<u8>> {
        let null_value = options.get("null.value").map(|s| s.as_str()).unwrap_or("NULL");
        let headers: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| if v.is_null() { null_value.to_string() } else { v.as_string().unwrap_or_default() })
                    .collect()
            })
            .collect();

        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        let mut out = String::new();
        render_row(&mut out, &headers, &widths);
        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        render_row(&mut out, &separator, &widths);
        for row in &cells {
            render_row(&mut out, row, &widths);
        }
        Ok(out.into_bytes())
    }
}

fn render_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
        .collect();
    out.push_str(&padded.join(" | "));
    out.push('\n');
}

/// `BINARY`/Arrow/Parquet passthrough: opaque bytes, no re-encoding (spec
/// §4.4's passthrough rule). Arrow/Parquet encoders live in their own
/// modules; this stands in only for the pure `BINARY` identity format.
pub struct BinaryPassthroughSerializer;

impl Serializer for BinaryPassthroughSerializer {
    fn format(&self) -> Format {
        Format::Binary
    }

    fn encode(&self, fields: &[Field], rows: &[Row], _options: &HashMap<String, String>) -> Result<Vec<u8>> {
        // A row result has no natural "opaque bytes" unless the block body
        // already produced a Stream; when asked to encode rows as BINARY,
        // fall back to the single binary/scalar cell verbatim.
        if fields.len() == 1 && rows.len() == 1 {
            if let Value::Binary(b) = &rows[0][0] {
                return Ok(b.clone());
            }
        }
        Err(crate::error::Error::Unsupported("BINARY format only applies to a single binary value".into()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<(Vec<Field>, Vec<Row>)> {
        let field = Field::new("result", crate::value::JdbcType::Binary);
        Ok((vec![field], vec![vec![Value::Binary(bytes.to_vec())]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::JdbcType;

    fn fields() -> Vec<Field> {
        vec![Field::new("a", JdbcType::Varchar), Field::new("b", JdbcType::Integer)]
    }

    fn rows() -> Vec<Row> {
        vec![vec![Value::Str("x".into()), Value::Integral { width: 32, signed: true, value: 1 }]]
    }

    #[test]
    fn jsonl_emits_one_object_per_line() {
        let ser = JsonLinesSerializer::object_mode();
        let bytes = ser.encode(&fields(), &rows(), &HashMap::new()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "{\"a\":\"x\",\"b\":1}\n");
    }

    #[test]
    fn ndjson_prefixes_each_record_with_record_separator() {
        let ser = NdjsonSerializer;
        let bytes = ser.encode(&fields(), &rows(), &HashMap::new()).unwrap();
        assert_eq!(bytes[0], 0x1E);
    }

    #[test]
    fn values_renders_insert_statement_with_quoted_strings() {
        let ser = ValuesSerializer;
        let bytes = ser.encode(&fields(), &rows(), &HashMap::new()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "INSERT INTO t (a, b) VALUES\n('x', 1);\n");
    }

    #[test]
    fn txt_pads_columns_to_the_widest_cell() {
        let ser = TxtSerializer;
        let bytes = ser.encode(&fields(), &rows(), &HashMap::new()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.lines().next().unwrap().starts_with("a | b"));
    }

    #[test]
    fn binary_passthrough_round_trips_a_single_blob() {
        let ser = BinaryPassthroughSerializer;
        let field = vec![Field::new("x", JdbcType::Binary)];
        let row = vec![vec![Value::Binary(vec![1, 2, 3])]];
        let bytes = ser.encode(&field, &row, &HashMap::new()).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        let (_, decoded) = ser.decode(&bytes).unwrap();
        assert_eq!(decoded[0][0], Value::Binary(vec![1, 2, 3]));
    }
}
