//! `CSV`/`TSV` (spec §4.4): RFC 4180 quoting via the `csv` crate,
//! `TSV` is `CSV` with `delimiter = b'\t'`, header optional.

use super::{Format, Serializer};
use crate::error::Result;
use crate::value::{Field, Row};
use std::collections::HashMap;

pub struct CsvSerializer {
    delimiter: u8,
}

impl CsvSerializer {
    pub fn new(delimiter: u8) -> Self {
        CsvSerializer { delimiter }
    }

    fn format(&self) -> Format {
        if self.delimiter == b'\t' {
            Format::Tsv
        } else {
            Format::Csv
        }
    }
}

impl Serializer for CsvSerializer {
    fn format(&self) -> Format {
        CsvSerializer::format(self)
    }

    fn encode(&self, fields: &[Field], rows: &[Row], options: &HashMap<String, String>) -> Result<Vec<u8>> {
        let header = options.get("header").map(|s| s != "false").unwrap_or(true);
        let null_value = options.get("null.value").map(|s| s.as_str()).unwrap_or("");

        let mut writer = ::csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());

        if header {
            writer.write_record(fields.iter().map(|f| f.name.as_str()))?;
        }
        for row in rows {
            let cells: Vec<String> = row
                .iter()
                .map(|v| if v.is_null() { null_value.to_string() } else { v.as_string().unwrap_or_default() })
                .collect();
            writer.write_record(&cells)?;
        }
        writer.flush()?;
        Ok(writer.into_inner().map_err(|e| crate::error::Error::execution("serialize", e.to_string()))?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<(Vec<Field>, Vec<Row>)> {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(bytes);
        let headers: Vec<Field> = reader
            .headers()?
            .iter()
            .map(|name| Field::new(name, crate::value::JdbcType::Varchar))
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|cell| crate::value::Value::Str(cell.to_string())).collect());
        }
        Ok((headers, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{JdbcType, Value};

    #[test]
    fn csv_round_trips_a_simple_table() {
        let fields = vec![Field::new("a", JdbcType::Varchar), Field::new("b", JdbcType::Integer)];
        let rows = vec![vec![Value::Str("x".into()), Value::Integral { width: 32, signed: true, value: 1 }]];
        let ser = CsvSerializer::new(b',');
        let bytes = ser.encode(&fields, &rows, &HashMap::new()).unwrap();
        assert_eq!(String::from_utf8(bytes.clone()).unwrap(), "a,b\nx,1\n");
        let (decoded_fields, decoded_rows) = ser.decode(&bytes).unwrap();
        assert_eq!(decoded_fields.len(), 2);
        assert_eq!(decoded_rows[0][0], Value::Str("x".into()));
    }

    #[test]
    fn tsv_uses_tab_delimiter() {
        let fields = vec![Field::new("a", JdbcType::Varchar)];
        let rows = vec![vec![Value::Str("x".into())]];
        let ser = CsvSerializer::new(b'\t');
        let bytes = ser.encode(&fields, &rows, &HashMap::new()).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a\nx\n");
    }

    #[test]
    fn null_value_option_controls_null_rendering() {
        let fields = vec![Field::new("a", JdbcType::Varchar)];
        let rows = vec![vec![Value::Null]];
        let mut opts = HashMap::new();
        opts.insert("null.value".to_string(), "NULL".to_string());
        let ser = CsvSerializer::new(b',');
        let bytes = ser.encode(&fields, &rows, &opts).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a\nNULL\n");
    }
}
