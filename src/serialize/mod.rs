//! C4: Result Model & Serialization (spec §4.4).
//!
//! A `Serializer` encodes a materialized `(Vec<Field>, Vec<Row>)` into
//! bytes for one registered wire format. Compression (spec §4.4's
//! `Codec` registry) is layered independently in `crate::compress`.

mod arrow_ipc;
mod avro;
mod bson;
mod csv;
mod parquet_file;
mod text;

use crate::error::{Error, Result};
use crate::value::{Field, Row};
use std::collections::HashMap;

/// Registered result formats (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Csv,
    Tsv,
    Jsonl,
    Ndjson,
    Values,
    AvroBinary,
    AvroJson,
    Bson,
    ArrowIpc,
    ArrowStream,
    Parquet,
    Txt,
    Binary,
}

impl Format {
    /// Parse a path-extension/`f` param/`Accept`-derived token (spec §6:
    /// "path conventions ... .format is a known extension").
    pub fn parse(token: &str) -> Result<Self> {
        match token.to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "tsv" => Ok(Format::Tsv),
            "jsonl" => Ok(Format::Jsonl),
            "ndjson" => Ok(Format::Ndjson),
            "values" => Ok(Format::Values),
            "avro" | "avro_binary" => Ok(Format::AvroBinary),
            "avro_json" => Ok(Format::AvroJson),
            "bson" => Ok(Format::Bson),
            "arrow" | "arrow_ipc" => Ok(Format::ArrowIpc),
            "arrow_stream" => Ok(Format::ArrowStream),
            "parquet" => Ok(Format::Parquet),
            "txt" => Ok(Format::Txt),
            "bin" | "binary" => Ok(Format::Binary),
            other => Err(Error::Parse(format!("unknown format '{other}'"))),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Format::Csv => "text/csv",
            Format::Tsv => "text/tab-separated-values",
            Format::Jsonl | Format::Ndjson => "application/x-ndjson",
            Format::Values => "text/plain",
            Format::AvroBinary => "avro/binary",
            Format::AvroJson => "avro/json",
            Format::Bson => "application/bson",
            Format::ArrowIpc | Format::ArrowStream => "application/vnd.apache.arrow.stream",
            Format::Parquet => "application/vnd.apache.parquet",
            Format::Txt => "text/plain",
            Format::Binary => "application/octet-stream",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Tsv => "tsv",
            Format::Jsonl => "jsonl",
            Format::Ndjson => "ndjson",
            Format::Values => "values",
            Format::AvroBinary => "avro",
            Format::AvroJson => "avro_json",
            Format::Bson => "bson",
            Format::ArrowIpc => "arrow",
            Format::ArrowStream => "arrow_stream",
            Format::Parquet => "parquet",
            Format::Txt => "txt",
            Format::Binary => "bin",
        }
    }

    /// Whether a late-subscribing single-flight reader can be replayed the
    /// already-buffered prefix, or only the live suffix (spec §5: "they
    /// either (a) receive the already-buffered prefix ... or (b) receive
    /// only the suffix ... documented per format"). Formats that this
    /// crate's serializers encode incrementally, row-by-row, don't retain
    /// a full prefix buffer; formats that buffer the whole result before
    /// emitting do.
    pub fn retains_prefix(&self) -> bool {
        !matches!(self, Format::Csv | Format::Tsv | Format::Jsonl | Format::Ndjson)
    }
}

/// Encodes a materialized result into one registered format. Decoding
/// (spec's round-trip invariant 5) is implemented per-format where the
/// underlying crate supports it; formats with no natural decode path
/// (`VALUES`, `TXT`) are encode-only, matching the source's own one-way
/// presentation formats.
pub trait Serializer: Send + Sync {
    fn format(&self) -> Format;
    fn encode(&self, fields: &[Field], rows: &[Row], options: &HashMap<String, String>) -> Result<Vec<u8>>;
    fn decode(&self, _bytes: &[u8]) -> Result<(Vec<Field>, Vec<Row>)> {
        Err(Error::Unsupported(format!("{:?} has no decoder", self.format())))
    }
}

pub fn serializer_for(format: Format) -> Box<dyn Serializer> {
    match format {
        Format::Csv => Box::new(csv::CsvSerializer::new(b',')),
        Format::Tsv => Box::new(csv::CsvSerializer::new(b'\t')),
        Format::Jsonl => Box::new(text::JsonLinesSerializer::object_mode()),
        Format::Ndjson => Box::new(text::NdjsonSerializer),
        Format::Values => Box::new(text::ValuesSerializer),
        Format::Txt => Box::new(text::TxtSerializer),
        Format::AvroBinary => Box::new(avro::AvroSerializer::binary()),
        Format::AvroJson => Box::new(avro::AvroSerializer::json()),
        Format::Bson => Box::new(bson::BsonSerializer),
        Format::ArrowIpc => Box::new(arrow_ipc::ArrowSerializer::file()),
        Format::ArrowStream => Box::new(arrow_ipc::ArrowSerializer::stream()),
        Format::Parquet => Box::new(parquet_file::ParquetSerializer),
        Format::Binary => Box::new(text::BinaryPassthroughSerializer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_extensions_case_insensitively() {
        assert_eq!(Format::parse("CSV").unwrap(), Format::Csv);
        assert_eq!(Format::parse("avro").unwrap(), Format::AvroBinary);
        assert!(Format::parse("bogus").is_err());
    }

    #[test]
    fn retains_prefix_distinguishes_streaming_from_buffered_formats() {
        assert!(!Format::Csv.retains_prefix());
        assert!(!Format::Ndjson.retains_prefix());
        assert!(Format::Bson.retains_prefix());
        assert!(Format::Values.retains_prefix());
    }
}
