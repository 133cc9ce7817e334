//! Content negotiation (spec §4.5): "Format from path extension, else
//! `accept`, else `f` param, else default CSV. Compression from path
//! extension, else `accept-encoding`, else `c` param, else `identity`."

use crate::compress::Compression;
use crate::serialize::Format;

/// Pieces pulled from a request that feed negotiation, gathered by the
/// caller (axum extractors) so this module stays framework-agnostic.
#[derive(Debug, Default, Clone)]
pub struct NegotiationInput<'a> {
    pub path_format_ext: Option<&'a str>,
    pub path_compression_ext: Option<&'a str>,
    pub accept_header: Option<&'a str>,
    pub accept_encoding_header: Option<&'a str>,
    pub f_param: Option<&'a str>,
    pub c_param: Option<&'a str>,
}

pub fn negotiate_format(input: &NegotiationInput) -> Format {
    if let Some(ext) = input.path_format_ext {
        if let Ok(fmt) = Format::parse(ext) {
            return fmt;
        }
    }
    if let Some(accept) = input.accept_header {
        if let Some(fmt) = format_from_mime(accept) {
            return fmt;
        }
    }
    if let Some(f) = input.f_param {
        if let Ok(fmt) = Format::parse(f) {
            return fmt;
        }
    }
    Format::Csv
}

pub fn negotiate_compression(input: &NegotiationInput) -> Compression {
    if let Some(ext) = input.path_compression_ext {
        if let Ok(c) = Compression::parse(ext) {
            return c;
        }
    }
    if let Some(accept_encoding) = input.accept_encoding_header {
        if let Some(token) = accept_encoding.split(',').next() {
            if let Ok(c) = Compression::parse(token.trim()) {
                return c;
            }
        }
    }
    if let Some(c) = input.c_param {
        if let Ok(c) = Compression::parse(c) {
            return c;
        }
    }
    Compression::None
}

/// Map a (possibly multi-value, quality-weighted) `Accept` header to a
/// format by matching each offered MIME type against `Format::mime()`;
/// first match wins since `Accept` lists preference order.
fn format_from_mime(accept: &str) -> Option<Format> {
    const CANDIDATES: &[Format] = &[
        Format::Csv,
        Format::Tsv,
        Format::Jsonl,
        Format::Ndjson,
        Format::Values,
        Format::AvroBinary,
        Format::AvroJson,
        Format::Bson,
        Format::ArrowIpc,
        Format::ArrowStream,
        Format::Parquet,
        Format::Txt,
        Format::Binary,
    ];
    for offered in accept.split(',') {
        let mime = offered.split(';').next().unwrap_or("").trim();
        if mime == "*/*" {
            continue;
        }
        if let Some(fmt) = CANDIDATES.iter().find(|f| f.mime() == mime) {
            return Some(*fmt);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_extension_wins_over_everything_else() {
        let input = NegotiationInput {
            path_format_ext: Some("parquet"),
            accept_header: Some("text/csv"),
            f_param: Some("bson"),
            ..Default::default()
        };
        assert_eq!(negotiate_format(&input), Format::Parquet);
    }

    #[test]
    fn accept_header_wins_over_f_param() {
        let input = NegotiationInput {
            accept_header: Some("text/csv"),
            f_param: Some("bson"),
            ..Default::default()
        };
        assert_eq!(negotiate_format(&input), Format::Csv);
    }

    #[test]
    fn falls_back_to_f_param_then_default_csv() {
        let input = NegotiationInput {
            f_param: Some("bson"),
            ..Default::default()
        };
        assert_eq!(negotiate_format(&input), Format::Bson);
        assert_eq!(negotiate_format(&NegotiationInput::default()), Format::Csv);
    }

    #[test]
    fn compression_follows_the_same_fallback_chain() {
        let input = NegotiationInput {
            accept_encoding_header: Some("gzip, deflate"),
            ..Default::default()
        };
        assert_eq!(negotiate_compression(&input), Compression::Gzip);
        assert_eq!(negotiate_compression(&NegotiationInput::default()), Compression::None);
    }

    #[test]
    fn s3_scenario_accept_text_csv_with_no_path_extension() {
        let input = NegotiationInput {
            accept_header: Some("text/csv"),
            ..Default::default()
        };
        assert_eq!(negotiate_format(&input), Format::Csv);
        assert_eq!(negotiate_compression(&NegotiationInput::default()), Compression::None);
    }
}
