//! File attachments: encoding uploads as inline data URLs and back.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};

use crate::model::task::{FileData, new_id};
use crate::ops::import::DEFAULT_CONTENT_TYPE;

/// Error type for attachment encoding and decoding
#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    #[error("file \"{name}\" is too large ({size} bytes, limit {limit} bytes)")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error("not a data URL")]
    NotDataUrl,
    #[error("data URL payload is not valid base64: {0}")]
    BadPayload(#[from] base64::DecodeError),
}

/// Build an attachment record for `bytes`, refusing anything over `limit`.
pub fn encode_file(
    name: &str,
    bytes: &[u8],
    limit: u64,
    uploaded_at: DateTime<Utc>,
) -> Result<FileData, AttachError> {
    let size = bytes.len() as u64;
    if size > limit {
        return Err(AttachError::TooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    let content_type = guess_content_type(name);
    let data_url = format!("data:{};base64,{}", content_type, STANDARD.encode(bytes));
    Ok(FileData {
        id: new_id(),
        name: name.to_string(),
        content_type: content_type.to_string(),
        size,
        data_url,
        uploaded_at,
    })
}

/// Split a `data:` URL into its declared content type and decoded bytes.
///
/// A URL without `;base64` yields its payload text unchanged.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), AttachError> {
    let rest = url.strip_prefix("data:").ok_or(AttachError::NotDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(AttachError::NotDataUrl)?;
    match meta.strip_suffix(";base64") {
        Some(content_type) => Ok((content_type.to_string(), STANDARD.decode(payload)?)),
        None => Ok((meta.to_string(), payload.as_bytes().to_vec())),
    }
}

/// Content type from a file extension, falling back to octet-stream.
pub fn guess_content_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") | Some("log") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
