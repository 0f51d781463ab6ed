//! Content sniffing over the first bytes of a file
//!
//! Signatures are checked in the order browsers use (WHATWG MIME sniffing),
//! so the answer matches what a client would infer on its own.

/// Number of leading bytes considered
pub const SNIFF_LEN: usize = 512;

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

/// Exact prefix signatures, in priority order
const PREFIX_SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", "text/plain; charset=utf-8"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"BM", "image/bmp"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"ID3", "audio/mpeg"),
    (b"OggS\x00", "application/ogg"),
    (b"MThd\x00\x00\x00\x06", "audio/midi"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"\x00\x01\x00\x00", "font/ttf"),
    (b"OTTO", "font/otf"),
    (b"ttcf", "font/collection"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    (b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    (b"\x00asm", "application/wasm"),
];

/// RIFF containers: (form type at offset 8, MIME type)
const RIFF_FORMS: &[(&[u8], &str)] = &[
    (b"WEBPVP", "image/webp"),
    (b"AVI ", "video/avi"),
    (b"WAVE", "audio/wave"),
];

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn matches_html(data: &[u8]) -> bool {
    HTML_TAGS.iter().any(|tag| {
        if data.len() < tag.len() + 1 {
            return false;
        }
        let head_matches = data[..tag.len()]
            .iter()
            .zip(tag.iter())
            .all(|(d, t)| d.to_ascii_uppercase() == *t);
        let terminator = data[tag.len()];
        head_matches && (terminator == b' ' || terminator == b'>')
    })
}

fn matches_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size < 12 || box_size % 4 != 0 || data.len() < box_size {
        return false;
    }
    if &data[4..8] != b"ftyp" {
        return false;
    }
    // major brand, then compatible brands after the minor version
    let brands = std::iter::once(8).chain((16..box_size).step_by(4));
    for start in brands {
        if start + 3 > box_size {
            break;
        }
        if &data[start..start + 3] == b"mp4" {
            return true;
        }
    }
    false
}

/// Returns true if the data starts with a gzip member header
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(b"\x1F\x8B\x08")
}

/// Guess the MIME type of `data` from its first [`SNIFF_LEN`] bytes.
///
/// Always returns a type; `application/octet-stream` when nothing matched and
/// the data looks binary.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    let first_non_ws = data.iter().position(|b| !is_whitespace(*b)).unwrap_or(data.len());
    let trimmed = &data[first_non_ws..];

    if matches_html(trimmed) {
        return "text/html; charset=utf-8";
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if let Some((_, mime)) = PREFIX_SIGNATURES.iter().find(|(sig, _)| data.starts_with(sig)) {
        return mime;
    }

    if data.len() >= 12 && data.starts_with(b"RIFF") {
        let form = &data[8..];
        if let Some((_, mime)) = RIFF_FORMS.iter().find(|(sig, _)| form.starts_with(sig)) {
            return mime;
        }
    }

    if data.len() >= 12 && data.starts_with(b"FORM") && &data[8..12] == b"AIFF" {
        return "audio/aiff";
    }

    if matches_mp4(data) {
        return "video/mp4";
    }

    if !data.iter().any(|b| is_binary_byte(*b)) {
        return "text/plain; charset=utf-8";
    }

    "application/octet-stream"
}
