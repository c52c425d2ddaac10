//! Reading and writing the `UID` property of iCalendar/vCard payloads.
//!
//! Only the identifier is touched; everything else in the payload is passed
//! through byte for byte.

use std::borrow::Cow;
use std::ops::Range;
use uuid::Uuid;

use crate::content::ContentKind;

const UID_MARKER: &str = "\nUID:";

/// Value of the `UID` property and the byte range of that value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidValue {
    pub value: String,
    pub span: Range<usize>,
}

/// Find the `UID` property, unfolding continuation lines.
///
/// Returns `None` when the property is missing or its last line is not
/// terminated.
pub fn extract_uid(item: &str) -> Option<UidValue> {
    let start = item.find(UID_MARKER)? + UID_MARKER.len();
    let mut end = start + item[start..].find('\n')?;
    let mut value = item[start..end].trim_end_matches('\r').to_string();

    while item.as_bytes().get(end + 1) == Some(&b' ') {
        let line_start = end + 2;
        end = line_start + item.get(line_start..)?.find('\n')?;
        value.push_str(item[line_start..end].trim_end_matches('\r'));
    }

    let span_end = if item.as_bytes()[end - 1] == b'\r' {
        end - 1
    } else {
        end
    };
    Some(UidValue {
        value,
        span: start..span_end.max(start),
    })
}

fn insert_before_end(kind: ContentKind, item: &str, line: &str) -> String {
    let marker = format!("\nEND:{}", kind.component());
    let mut buffer = item.to_string();
    if let Some(pos) = buffer.find(&marker) {
        buffer.insert_str(pos + 1, line);
    }
    buffer
}

/// Whether `uid` can name a resource directly inside the collection.
fn usable_as_name(uid: &str) -> bool {
    !uid.is_empty() && !uid.contains(['/', '\\'])
}

/// Pick the resource name for a new item.
///
/// Items with a UID are stored as `<uid><suffix>`. Items without one get a
/// fresh UUID, which is also written into the payload. A UID that would
/// leave the collection (it contains a path separator) keeps its place in
/// the payload, but the resource is named after a fresh UUID.
pub fn create_resource_name(kind: ContentKind, item: &str) -> (String, Cow<'_, str>) {
    match extract_uid(item).filter(|uid| !uid.value.is_empty()) {
        Some(uid) if usable_as_name(&uid.value) => {
            (format!("{}{}", uid.value, kind.suffix()), Cow::Borrowed(item))
        }
        Some(_) => (
            format!("{}{}", Uuid::new_v4(), kind.suffix()),
            Cow::Borrowed(item),
        ),
        None => {
            let uid = Uuid::new_v4().to_string();
            let buffer = insert_before_end(kind, item, &format!("UID:{uid}\r\n"));
            (format!("{uid}{}", kind.suffix()), Cow::Owned(buffer))
        }
    }
}

/// Make sure an item written to `luid` carries a UID.
///
/// An existing non-empty UID is trusted even when it differs from the
/// resource name, because servers and other clients pick names freely.
pub fn set_resource_name<'a>(kind: ContentKind, item: &'a str, luid: &str) -> Cow<'a, str> {
    let uid = luid.strip_suffix(kind.suffix()).unwrap_or(luid);
    match extract_uid(item) {
        Some(existing) if !existing.value.is_empty() => Cow::Borrowed(item),
        Some(existing) => {
            let mut buffer = item.to_string();
            buffer.replace_range(existing.span, uid);
            Cow::Owned(buffer)
        }
        None => Cow::Owned(insert_before_end(kind, item, &format!("UID:{uid}\r\n"))),
    }
}
