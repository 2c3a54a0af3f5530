//! Public locators for stored objects.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Maximum length of a file extension, excluding the leading dot.
pub const MAX_EXTENSION_LEN: usize = 16;

/// Maximum length of a bucket or alias name.
pub const MAX_NAME_LEN: usize = 128;

/// How a client refers to a stored object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// Short code plus an optional cosmetic extension, e.g. `1c.png`.
    ShortCode {
        code: String,
        extension: Option<String>,
    },
    /// Caller-chosen `(bucket, alias)` pair.
    Alias { bucket: String, alias: String },
}

impl Locator {
    pub fn short_code(code: impl Into<String>, extension: Option<String>) -> Self {
        Self::ShortCode {
            code: code.into(),
            extension,
        }
    }

    pub fn alias(bucket: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Alias {
            bucket: bucket.into(),
            alias: alias.into(),
        }
    }

    /// Parse a short-code locator such as `1c` or `1c.tar.gz`.
    ///
    /// Everything from the first `.` is the extension; it plays no part in
    /// resolution.
    pub fn parse_short(raw: &str) -> Result<Self> {
        let (code, extension) = match raw.split_once('.') {
            Some((code, rest)) => (code, sanitize_extension(&format!(".{rest}"))),
            None => (raw, None),
        };
        if code.is_empty() {
            return Err(Error::InvalidLocator(format!("missing short code in {raw:?}")));
        }
        Ok(Self::short_code(code, extension))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortCode { code, extension } => {
                write!(f, "{code}{}", extension.as_deref().unwrap_or(""))
            }
            Self::Alias { bucket, alias } => write!(f, "{bucket}/{alias}"),
        }
    }
}

/// Normalise a file extension (with leading dot) for use in a blob name.
///
/// Returns `None` for anything that is not a dot followed by a short run of
/// ASCII alphanumerics. Accepted extensions are lower-cased.
pub fn sanitize_extension(ext: &str) -> Option<String> {
    let body = ext.strip_prefix('.')?;
    if body.is_empty()
        || body.len() > MAX_EXTENSION_LEN
        || !body.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(format!(".{}", body.to_ascii_lowercase()))
}

/// Take the extension of an uploaded file name, if it has a usable one.
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| sanitize_extension(&format!(".{ext}")))
}

/// Validate a bucket or alias name.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidLocator(format!(
            "{kind} must be between 1 and {MAX_NAME_LEN} characters"
        )));
    }
    if name.contains('/') || name.chars().any(char::is_control) {
        return Err(Error::InvalidLocator(format!(
            "{kind} contains forbidden characters: {name:?}"
        )));
    }
    Ok(())
}
