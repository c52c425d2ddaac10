//! Conversions between LUIDs and resource paths, and between ETags and
//! revision strings.

use crate::webdav::uri::{DavUri, escape, normalize_path, unescape};

/// LUID of the resource at `path`.
///
/// Resources inside `collection` are named by their unescaped path relative
/// to it; anything else keeps its full, normalized path.
pub fn path_to_luid(collection: &DavUri, path: &str) -> String {
    let path = normalize_path(path, false);
    match path.strip_prefix(collection.path.as_str()) {
        Some(relative) => unescape(relative),
        None => path,
    }
}

/// Resource path of `luid`. LUIDs that already are absolute paths are used
/// as they are.
///
/// `.` and `..` segments are percent-encoded so that the path stays inside
/// the collection.
pub fn luid_to_path(collection: &DavUri, luid: &str) -> String {
    if luid.starts_with('/') {
        return luid.to_string();
    }
    let relative: Vec<String> = luid
        .split('/')
        .map(|segment| match segment {
            "." | ".." => segment.replace('.', "%2E"),
            other => escape(other),
        })
        .collect();
    collection.resolve(&relative.join("/")).path
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2
        && value.starts_with('"')
        && value.ends_with('"')
        && !value[1..value.len() - 1].contains('"')
}

/// Revision string for an ETag: the weak marker and one pair of quotes
/// are removed.
///
/// The weak marker is only recognized in front of a quoted tag, which keeps
/// the conversion idempotent: an unquoted `W/x` comes back unchanged.
pub fn etag_to_revision(etag: &str) -> String {
    let tag = match etag.strip_prefix("W/") {
        Some(rest) if is_quoted(rest) => rest,
        _ => etag,
    };
    if is_quoted(tag) {
        tag[1..tag.len() - 1].to_string()
    } else {
        tag.to_string()
    }
}
