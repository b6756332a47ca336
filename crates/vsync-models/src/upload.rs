//! Uploaded media files.

use std::fmt;
use std::path::Path;

const FALLBACK_NAME: &str = "upload";
/// Leaves room for the `synced_` prefix under the usual 255-byte name limit.
const MAX_FILENAME_BYTES: usize = 200;
/// Longer suffixes are treated as part of the stem when truncating.
const MAX_EXTENSION_BYTES: usize = 16;

/// A file received from the client, held in memory until the worker
/// writes it to scratch storage.
#[derive(Clone)]
pub struct UploadedFile {
    filename: String,
    data: Vec<u8>,
}

impl UploadedFile {
    /// Wrap upload bytes. The client-supplied name is reduced to a safe
    /// base name.
    pub fn new(filename: Option<&str>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: sanitize_filename(filename.unwrap_or_default()),
            data: data.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Extension of the original name including the dot, or empty.
    pub fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default()
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("filename", &self.filename)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Reduce a client-supplied filename to its last path component without
/// quotes or control characters, capped at 200 bytes with the extension kept.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_NAME.to_string()
    } else {
        truncate_filename(cleaned)
    }
}

fn truncate_filename(name: &str) -> String {
    if name.len() <= MAX_FILENAME_BYTES {
        return name.to_string();
    }

    let ext = match name.rfind('.') {
        Some(i) if i > 0 && name.len() - i <= MAX_EXTENSION_BYTES => &name[i..],
        _ => "",
    };
    let mut end = MAX_FILENAME_BYTES - ext.len();
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", name[..end].trim_end(), ext)
}
