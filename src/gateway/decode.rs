use async_compression::tokio::bufread::{BrotliDecoder, GzipDecoder, ZlibDecoder};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{AppError, Result};

/// Undoes the response's `content-encoding`.
///
/// `deflate` is the zlib-wrapped stream HTTP servers send. A missing header or
/// `identity` passes the bytes through.
pub async fn decode_body(content_encoding: Option<&str>, raw: &[u8]) -> Result<Vec<u8>> {
    let encoding = content_encoding
        .map(|e| e.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match encoding.as_str() {
        "" | "identity" => Ok(raw.to_vec()),
        "gzip" | "x-gzip" => read_all(&encoding, GzipDecoder::new(raw)).await,
        "deflate" => read_all(&encoding, ZlibDecoder::new(raw)).await,
        "br" => read_all(&encoding, BrotliDecoder::new(raw)).await,
        other => Err(AppError::Decode {
            encoding: other.to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unsupported content-encoding",
            ),
        }),
    }
}

async fn read_all<R: AsyncRead + Unpin>(encoding: &str, mut decoder: R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .await
        .map_err(|source| AppError::Decode {
            encoding: encoding.to_string(),
            source,
        })?;
    Ok(out)
}
