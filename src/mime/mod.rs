//! MIME type lookup by extension and by content.
//!
//! The extension table covers what ends up in web game and music uploads.
//! Text types carry an explicit utf-8 charset so browsers do not guess.

mod sniff;

pub use sniff::{detect_content_type, is_gzip, SNIFF_LEN};

/// Extension (with leading dot, lowercase) to MIME type
const EXTENSION_TYPES: &[(&str, &str)] = &[
    // Web documents
    (".htm", "text/html; charset=utf-8"),
    (".html", "text/html; charset=utf-8"),
    (".xhtml", "application/xhtml+xml"),
    (".css", "text/css; charset=utf-8"),
    (".js", "text/javascript; charset=utf-8"),
    (".mjs", "text/javascript; charset=utf-8"),
    (".json", "application/json"),
    (".map", "application/json"),
    (".webmanifest", "application/manifest+json"),
    (".xml", "text/xml; charset=utf-8"),
    (".txt", "text/plain; charset=utf-8"),
    (".md", "text/markdown; charset=utf-8"),
    (".csv", "text/csv; charset=utf-8"),
    (".tsv", "text/tab-separated-values; charset=utf-8"),
    (".vtt", "text/vtt; charset=utf-8"),
    (".wasm", "application/wasm"),
    (".pdf", "application/pdf"),
    (".swf", "application/x-shockwave-flash"),
    // Images
    (".apng", "image/apng"),
    (".avif", "image/avif"),
    (".bmp", "image/bmp"),
    (".gif", "image/gif"),
    (".ico", "image/vnd.microsoft.icon"),
    (".jpeg", "image/jpeg"),
    (".jpg", "image/jpeg"),
    (".png", "image/png"),
    (".svg", "image/svg+xml"),
    (".webp", "image/webp"),
    // Audio / video
    (".aac", "audio/aac"),
    (".flac", "audio/flac"),
    (".m4a", "audio/mp4"),
    (".mid", "audio/midi"),
    (".midi", "audio/midi"),
    (".mp3", "audio/mpeg"),
    (".oga", "audio/ogg"),
    (".ogg", "audio/ogg"),
    (".opus", "audio/ogg"),
    (".wav", "audio/wav"),
    (".mp4", "video/mp4"),
    (".ogv", "video/ogg"),
    (".webm", "video/webm"),
    // Fonts
    (".otf", "font/otf"),
    (".ttf", "font/ttf"),
    (".woff", "font/woff"),
    (".woff2", "font/woff2"),
    // Archives and binaries
    (".7z", "application/x-7z-compressed"),
    (".bin", "application/octet-stream"),
    (".gz", "application/gzip"),
    (".jar", "application/java-archive"),
    (".rar", "application/vnd.rar"),
    (".tar", "application/x-tar"),
    (".zip", "application/zip"),
];

/// Look up a MIME type by extension (`.png`, case-insensitive)
pub fn type_by_extension(extension: &str) -> Option<&'static str> {
    if extension.is_empty() {
        return None;
    }
    let lower = extension.to_lowercase();
    EXTENSION_TYPES
        .iter()
        .find(|(ext, _)| *ext == lower)
        .map(|(_, mime)| *mime)
}
