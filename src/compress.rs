//! C4 companion: `Codec` registry (spec §4.4). Compression is layered
//! independently of `Serializer`: a `Compression` wraps already-serialized
//! bytes.

use crate::error::{Error, Result};
use async_compression::tokio::bufread::{
    BrotliDecoder, BrotliEncoder, BzDecoder, BzEncoder, DeflateDecoder, DeflateEncoder, GzipDecoder, GzipEncoder,
    XzDecoder, XzEncoder, ZstdDecoder, ZstdEncoder,
};
use tokio::io::{AsyncReadExt, BufReader};

/// Registered compressions (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Gzip,
    Deflate,
    Brotli,
    Zstd,
    Bzip2,
    Xz,
    Lz4,
    Snappy,
}

/// Magic-byte prefixes used for sniff-based auto-detection (spec §4.4:
/// "Detection tries `Content-Encoding` -> explicit option -> magic-number
/// sniff -> default").
const MAGIC_TABLE: &[(Compression, &[u8])] = &[
    (Compression::Gzip, &[0x1f, 0x8b]),
    (Compression::Zstd, &[0x28, 0xb5, 0x2f, 0xfd]),
    (Compression::Bzip2, &[0x42, 0x5a, 0x68]),
    (Compression::Xz, &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]),
    (Compression::Lz4, &[0x04, 0x22, 0x4d, 0x18]),
    (Compression::Snappy, &[0xff, 0x06, 0x00, 0x00]),
];

impl Compression {
    pub fn parse(token: &str) -> Result<Self> {
        match token.to_ascii_lowercase().as_str() {
            "" | "none" | "identity" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "deflate" => Ok(Compression::Deflate),
            "br" | "brotli" => Ok(Compression::Brotli),
            "zstd" => Ok(Compression::Zstd),
            "bzip2" | "bz2" => Ok(Compression::Bzip2),
            "xz" => Ok(Compression::Xz),
            "lz4" => Ok(Compression::Lz4),
            "snappy" | "snz" => Ok(Compression::Snappy),
            other => Err(Error::Parse(format!("unknown compression '{other}'"))),
        }
    }

    /// `Content-Encoding` token, `""` for `None` (identity).
    pub fn http_encoding(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => "gzip",
            Compression::Deflate => "deflate",
            Compression::Brotli => "br",
            Compression::Zstd => "zstd",
            Compression::Bzip2 => "bzip2",
            Compression::Xz => "xz",
            Compression::Lz4 => "lz4",
            Compression::Snappy => "snappy",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => "gz",
            Compression::Deflate => "deflate",
            Compression::Brotli => "br",
            Compression::Zstd => "zst",
            Compression::Bzip2 => "bz2",
            Compression::Xz => "xz",
            Compression::Lz4 => "lz4",
            Compression::Snappy => "snz",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Compression::None => "identity",
            Compression::Gzip => "application/gzip",
            Compression::Deflate => "application/deflate",
            Compression::Brotli => "application/x-brotli",
            Compression::Zstd => "application/zstd",
            Compression::Bzip2 => "application/x-bzip2",
            Compression::Xz => "application/x-xz",
            Compression::Lz4 => "application/x-lz4",
            Compression::Snappy => "application/x-snappy-framed",
        }
    }

    /// Sniff a compression from its magic bytes; `None` (identity) is the
    /// fallback when nothing matches, since it has no signature of its own.
    pub fn sniff(bytes: &[u8]) -> Compression {
        for (compression, magic) in MAGIC_TABLE {
            if bytes.starts_with(magic) {
                return *compression;
            }
        }
        Compression::None
    }
}

pub async fn compress(compression: Compression, bytes: &[u8]) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(bytes.to_vec()),
        Compression::Lz4 => Ok(lz4_flex::compress_prepend_size(bytes)),
        Compression::Snappy => {
            let mut encoder = snap::raw::Encoder::new();
            encoder
                .compress_vec(bytes)
                .map_err(|e| Error::execution("compress", format!("snappy compress failed: {e}")))
        }
        _ => {
            let reader = BufReader::new(std::io::Cursor::new(bytes));
            let mut out = Vec::new();
            match compression {
                Compression::Gzip => GzipEncoder::new(reader).read_to_end(&mut out).await,
                Compression::Deflate => DeflateEncoder::new(reader).read_to_end(&mut out).await,
                Compression::Brotli => BrotliEncoder::new(reader).read_to_end(&mut out).await,
                Compression::Zstd => ZstdEncoder::new(reader).read_to_end(&mut out).await,
                Compression::Bzip2 => BzEncoder::new(reader).read_to_end(&mut out).await,
                Compression::Xz => XzEncoder::new(reader).read_to_end(&mut out).await,
                _ => unreachable!("handled above"),
            }
            .map_err(|e| Error::execution("compress", format!("compression failed: {e}")))?;
            Ok(out)
        }
    }
}

pub async fn decompress(compression: Compression, bytes: &[u8]) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(bytes.to_vec()),
        Compression::Lz4 => lz4_flex::decompress_size_prepended(bytes)
            .map_err(|e| Error::execution("compress", format!("lz4 decompress failed: {e}"))),
        Compression::Snappy => {
            let mut decoder = snap::raw::Decoder::new();
            decoder
                .decompress_vec(bytes)
                .map_err(|e| Error::execution("compress", format!("snappy decompress failed: {e}")))
        }
        _ => {
            let reader = BufReader::new(std::io::Cursor::new(bytes));
            let mut out = Vec::new();
            match compression {
                Compression::Gzip => GzipDecoder::new(reader).read_to_end(&mut out).await,
                Compression::Deflate => DeflateDecoder::new(reader).read_to_end(&mut out).await,
                Compression::Brotli => BrotliDecoder::new(reader).read_to_end(&mut out).await,
                Compression::Zstd => ZstdDecoder::new(reader).read_to_end(&mut out).await,
                Compression::Bzip2 => BzDecoder::new(reader).read_to_end(&mut out).await,
                Compression::Xz => XzDecoder::new(reader).read_to_end(&mut out).await,
                _ => unreachable!("handled above"),
            }
            .map_err(|e| Error::execution("compress", format!("decompression failed: {e}")))?;
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_common_aliases() {
        assert_eq!(Compression::parse("gz").unwrap(), Compression::Gzip);
        assert_eq!(Compression::parse("").unwrap(), Compression::None);
        assert_eq!(Compression::parse("identity").unwrap(), Compression::None);
        assert!(Compression::parse("bogus").is_err());
    }

    #[test]
    fn sniff_detects_gzip_magic_bytes() {
        assert_eq!(Compression::sniff(&[0x1f, 0x8b, 0x08, 0x00]), Compression::Gzip);
        assert_eq!(Compression::sniff(&[0x00, 0x01]), Compression::None);
    }

    #[tokio::test]
    async fn lz4_round_trips() {
        let original = b"hello jdbcx bridge".to_vec();
        let compressed = compress(Compression::Lz4, &original).await.unwrap();
        let restored = decompress(Compression::Lz4, &compressed).await.unwrap();
        assert_eq!(restored, original);
    }

    #[tokio::test]
    async fn gzip_round_trips() {
        let original = b"hello jdbcx bridge, with more repeated repeated repeated text".to_vec();
        let compressed = compress(Compression::Gzip, &original).await.unwrap();
        assert_ne!(compressed, original);
        let restored = decompress(Compression::Gzip, &compressed).await.unwrap();
        assert_eq!(restored, original);
    }

    #[tokio::test]
    async fn none_is_identity() {
        let original = b"raw bytes".to_vec();
        let out = compress(Compression::None, &original).await.unwrap();
        assert_eq!(out, original);
    }
}
