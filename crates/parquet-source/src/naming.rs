//! Table naming from object keys.
//!
//! Every object key maps to exactly one table name. Objects in the same
//! directory share a name; a root-level object is named after its file.

/// Derive the table name for an object key.
///
/// The result only contains `[A-Za-z0-9_]`, has no leading, trailing or
/// repeated underscores, and is empty when the key has no alphanumeric
/// content. Empty names are excluded from discovery.
pub fn normalize(key: &str) -> String {
    let segments = clean_segments(key);

    let raw = if key.ends_with('/') {
        segments.join("/")
    } else {
        match segments.split_last() {
            None => String::new(),
            Some((file, [])) => strip_extension(file).to_string(),
            Some((_, dirs)) => dirs.join("/"),
        }
    };

    sanitize(&raw)
}

/// Cleaned directory part of a key with a trailing `/`, or `""` at the root.
///
/// A key ending in `/` is a directory and is its own prefix.
pub fn key_prefix(key: &str) -> String {
    let segments = clean_segments(key);
    let dirs = if key.ends_with('/') {
        &segments[..]
    } else {
        segments.split_last().map_or(&[][..], |(_, dirs)| dirs)
    };

    if dirs.is_empty() {
        String::new()
    } else {
        format!("{}/", dirs.join("/"))
    }
}

/// Path segments with empty and `.` segments dropped and `..` resolved
/// against the segment before it. Unresolvable `..` segments are kept.
fn clean_segments(key: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    segments
}

fn strip_extension(file: &str) -> &str {
    match file.rfind('.') {
        Some(idx) => &file[..idx],
        None => file,
    }
}

fn sanitize(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && (name.is_empty() || name.ends_with('_')) {
            continue;
        }
        name.push(c);
    }
    while name.ends_with('_') {
        name.pop();
    }
    name
}
