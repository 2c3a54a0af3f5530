//! Content-type detection from leading bytes.
//!
//! Follows the shape of the WHATWG MIME sniffing algorithm: a table of
//! signatures checked in order, then a text/binary fallback. Only the first
//! [`SNIFF_LEN`] bytes are consulted.

/// Number of leading bytes consulted.
pub const SNIFF_LEN: usize = 512;

/// Fallback for content that looks binary.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Fallback for content that looks like text.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

enum Signature {
    /// Exact prefix match.
    Prefix(&'static [u8], &'static str),
    /// Prefix match where `mask` is ANDed with the data before comparison.
    Masked {
        mask: &'static [u8],
        pattern: &'static [u8],
        content_type: &'static str,
    },
}

/// Case-insensitive HTML tags, matched after optional leading whitespace.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const SIGNATURES: &[Signature] = &[
    Signature::Prefix(b"<?xml", "text/xml; charset=utf-8"),
    Signature::Prefix(b"%PDF-", "application/pdf"),
    Signature::Prefix(b"%!PS-Adobe-", "application/postscript"),
    Signature::Prefix(b"\x89PNG\r\n\x1a\n", "image/png"),
    Signature::Prefix(b"\xff\xd8\xff", "image/jpeg"),
    Signature::Prefix(b"GIF87a", "image/gif"),
    Signature::Prefix(b"GIF89a", "image/gif"),
    Signature::Masked {
        mask: b"\xff\xff\xff\xff\x00\x00\x00\x00\xff\xff\xff\xff\xff\xff",
        pattern: b"RIFF\x00\x00\x00\x00WEBPVP",
        content_type: "image/webp",
    },
    Signature::Prefix(b"BM", "image/bmp"),
    Signature::Prefix(b"\x00\x00\x01\x00", "image/x-icon"),
    Signature::Prefix(b"\x00\x00\x02\x00", "image/x-icon"),
    Signature::Masked {
        mask: b"\xff\xff\xff\xff\x00\x00\x00\x00\xff\xff\xff\xff",
        pattern: b"RIFF\x00\x00\x00\x00WAVE",
        content_type: "audio/wave",
    },
    Signature::Masked {
        mask: b"\xff\xff\xff\xff\x00\x00\x00\x00\xff\xff\xff\xff",
        pattern: b"FORM\x00\x00\x00\x00AIFF",
        content_type: "audio/aiff",
    },
    Signature::Prefix(b"ID3", "audio/mpeg"),
    Signature::Prefix(b"OggS\x00", "application/ogg"),
    Signature::Prefix(b"fLaC", "audio/flac"),
    Signature::Prefix(b"MThd\x00\x00\x00\x06", "audio/midi"),
    Signature::Prefix(b"\x1a\x45\xdf\xa3", "video/webm"),
    Signature::Prefix(b"wOFF", "font/woff"),
    Signature::Prefix(b"wOF2", "font/woff2"),
    Signature::Prefix(b"\x00\x01\x00\x00", "font/ttf"),
    Signature::Prefix(b"OTTO", "font/otf"),
    Signature::Prefix(b"\x1f\x8b\x08", "application/x-gzip"),
    Signature::Prefix(b"PK\x03\x04", "application/zip"),
    Signature::Prefix(b"Rar!\x1a\x07\x00", "application/x-rar-compressed"),
    Signature::Prefix(b"Rar!\x1a\x07\x01\x00", "application/x-rar-compressed"),
    Signature::Prefix(b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    Signature::Prefix(b"\x00asm", "application/wasm"),
];

/// Detect the content type of a payload from its leading bytes.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    let first_non_ws = data
        .iter()
        .position(|b| !is_whitespace(*b))
        .unwrap_or(data.len());
    let trimmed = &data[first_non_ws..];

    for tag in HTML_TAGS {
        if matches_html_tag(trimmed, tag) {
            return "text/html; charset=utf-8";
        }
    }

    for signature in SIGNATURES {
        match signature {
            Signature::Prefix(prefix, content_type) => {
                if data.starts_with(prefix) {
                    return *content_type;
                }
            }
            Signature::Masked {
                mask,
                pattern,
                content_type,
            } => {
                if data.len() >= pattern.len()
                    && data
                        .iter()
                        .zip(mask.iter())
                        .zip(pattern.iter())
                        .all(|((d, m), p)| d & m == *p)
                {
                    return *content_type;
                }
            }
        }
    }

    if is_mp4(data) {
        return "video/mp4";
    }

    if looks_like_text(data) {
        TEXT_PLAIN
    } else {
        OCTET_STREAM
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

/// `<TAG` followed by a space or `>`, compared case-insensitively.
fn matches_html_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() < tag.len() + 1 {
        return false;
    }
    if !data[..tag.len()].eq_ignore_ascii_case(tag) {
        return false;
    }
    matches!(data[tag.len()], b' ' | b'>')
}

/// ISO base media file: a box of declared size whose type is `ftyp` and whose
/// brands include an mp4 brand.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size % 4 != 0 || data.len() < box_size || &data[4..8] != b"ftyp" {
        return false;
    }
    let mut offset = 8;
    while offset + 3 <= box_size {
        if offset != 12 && &data[offset..offset + 3] == b"mp4" {
            return true;
        }
        offset += 4;
    }
    false
}

fn looks_like_text(data: &[u8]) -> bool {
    // A UTF-8 sequence cut at the sniff boundary is still text.
    let valid = match std::str::from_utf8(data) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };
    valid
        && !data
            .iter()
            .any(|b| matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f))
}
