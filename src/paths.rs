//! Zip entry path handling
//!
//! Zip entry names are untrusted. This module handles:
//! - Converting `\` to `/` so Windows-built archives behave like the rest
//! - Dropping `.` and empty segments
//! - Rejecting absolute paths and `..` segments that climb out of the root
//! - Ignoring archive-tool metadata directories (`__MACOSX/`)

/// Directory prefixes ignored by default
pub const DEFAULT_IGNORE_PREFIXES: &[&str] = &["__MACOSX/"];

/// Why an entry was left out of the extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Directory,
    Absolute,
    Traversal,
    IgnoredPrefix,
    Empty,
}

/// Outcome of sanitizing one entry name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPath {
    /// Safe relative key, `/`-separated
    Accept(String),
    Ignore(IgnoreReason),
}

/// Convert Windows path separators to `/`
/// `Build\\game.data` -> `Build/game.data`
pub fn to_linux_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Get the filename from a `/`-separated key
pub fn file_name(path: &str) -> &str {
    path.rfind('/').map(|idx| &path[idx + 1..]).unwrap_or(path)
}

/// Get the extension of the final path element, including the dot
///
/// `game/data.unity3dgz` -> `.unity3dgz`, `README` -> ``
pub fn extension(path: &str) -> &str {
    let name = file_name(path);
    name.rfind('.').map(|idx| &name[idx..]).unwrap_or("")
}

/// Replace the trailing `old_ext` of `key` with `new_ext`
pub fn replace_extension(key: &str, old_ext: &str, new_ext: &str) -> String {
    let stem = key.strip_suffix(old_ext).unwrap_or(key);
    format!("{}{}", stem, new_ext)
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Sanitize a raw zip entry name into a relative object key
pub fn sanitize_entry_name(raw: &str, ignore_prefixes: &[String]) -> EntryPath {
    let path = to_linux_path(raw);

    if path.ends_with('/') {
        return EntryPath::Ignore(IgnoreReason::Directory);
    }
    if path.starts_with('/') || has_drive_prefix(&path) || path.contains('\0') {
        return EntryPath::Ignore(IgnoreReason::Absolute);
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return EntryPath::Ignore(IgnoreReason::Traversal);
                }
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return EntryPath::Ignore(IgnoreReason::Empty);
    }

    let key = segments.join("/");
    if ignore_prefixes
        .iter()
        .any(|prefix| key.starts_with(prefix.as_str()) || path.starts_with(prefix.as_str()))
    {
        return EntryPath::Ignore(IgnoreReason::IgnoredPrefix);
    }

    EntryPath::Accept(key)
}

/// Join a destination prefix and a relative key with a single `/`
pub fn join_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}
