//! Page-level extraction: locate candidate entries and the next cursor.
//!
//! Upstream payloads drift between providers and over time, so both halves are an
//! ordered list of pure matchers tried in sequence. The first page shape that is
//! structurally present wins; the first cursor location holding a non-empty token
//! wins. A payload no matcher recognises yields an empty page, never a failed run.
use super::error::IngestError;
use super::html;
use super::types::{Page, RawPage};
use serde_json::Value;

/// Timeline entries in order, plus entries pinned out of order.
#[derive(Default)]
struct Matched {
    entries: Vec<Value>,
    pinned: Vec<Value>,
}

impl From<Vec<Value>> for Matched {
    fn from(entries: Vec<Value>) -> Self {
        Self {
            entries,
            pinned: Vec::new(),
        }
    }
}

type EntryMatcher = fn(&Value) -> Option<Matched>;
type CursorLocator = fn(&Value) -> Option<String>;

const ENTRY_SHAPES: &[(&str, EntryMatcher)] = &[
    ("instructions", instruction_entries),
    ("flat_timeline", flat_timeline_entries),
    ("direct_list", direct_list_entries),
];

const CURSOR_LOCATIONS: &[CursorLocator] = &[top_level_cursor, marker_cursor, alternate_root_cursor];

/// Instruction arrays seen across GraphQL-style providers.
const INSTRUCTION_PATHS: &[&str] = &[
    "/data/user/result/timeline_v2/timeline/instructions",
    "/data/user/result/timeline/timeline/instructions",
    "/result/timeline/instructions",
    "/timeline/instructions",
];

/// Extract entries and cursor, failing when no known page shape matches.
pub fn extract_strict(raw: &RawPage) -> Result<Page, IngestError> {
    match raw {
        RawPage::Html(body) => Ok(html::parse_timeline(body)),
        RawPage::Json(value) => {
            let (shape, matched) = ENTRY_SHAPES
                .iter()
                .find_map(|(name, matcher)| matcher(value).map(|found| (*name, found)))
                .ok_or_else(|| IngestError::ShapeMismatch(describe(value)))?;

            let total = matched.entries.len();
            let entries: Vec<Value> = matched.entries.into_iter().filter(|e| !is_marker(e)).collect();
            let pinned: Vec<Value> = matched.pinned.into_iter().filter(|e| !is_marker(e)).collect();
            let next_cursor = CURSOR_LOCATIONS.iter().find_map(|locate| locate(value));

            tracing::trace!(
                shape,
                entries = entries.len(),
                pinned = pinned.len(),
                markers = total - entries.len(),
                has_cursor = next_cursor.is_some(),
                "extract.page"
            );
            Ok(Page {
                entries,
                pinned,
                next_cursor,
            })
        }
    }
}

/// Lenient extraction: an unrecognised payload degrades to an empty page.
pub fn extract(raw: &RawPage) -> Page {
    match extract_strict(raw) {
        Ok(page) => page,
        Err(err) => {
            tracing::warn!(error = %err, "extract.shape_mismatch");
            Page::default()
        }
    }
}

fn instructions(value: &Value) -> Option<&Vec<Value>> {
    INSTRUCTION_PATHS
        .iter()
        .find_map(|path| value.pointer(path).and_then(Value::as_array))
}

fn instruction_entries(value: &Value) -> Option<Matched> {
    let instructions = instructions(value)?;
    let mut out = Matched::default();
    for instruction in instructions {
        if let Some(entries) = instruction.get("entries").and_then(Value::as_array) {
            for entry in entries {
                push_entry(entry, &mut out.entries);
            }
        }
        if let Some(items) = instruction.get("moduleItems").and_then(Value::as_array) {
            out.entries.extend(items.iter().cloned());
        }
        // Pinned posts arrive as a single `entry` at any position; replaced entries are cursors only.
        if instruction.get("type").and_then(Value::as_str) == Some("TimelinePinEntry") {
            if let Some(entry) = instruction.get("entry") {
                push_entry(entry, &mut out.pinned);
            }
        }
    }
    Some(out)
}

/// Module entries (media grids, conversations) carry their posts under `content.items`.
fn push_entry(entry: &Value, out: &mut Vec<Value>) {
    match entry.pointer("/content/items").and_then(Value::as_array) {
        Some(items) => out.extend(items.iter().cloned()),
        None => out.push(entry.clone()),
    }
}

fn flat_timeline_entries(value: &Value) -> Option<Matched> {
    value
        .get("timeline")
        .and_then(Value::as_array)
        .cloned()
        .map(Matched::from)
}

fn direct_list_entries(value: &Value) -> Option<Matched> {
    if let Some(list) = value.as_array() {
        return Some(list.clone().into());
    }
    ["tweets", "results", "data"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_array).cloned())
        .map(Matched::from)
}

fn is_marker(entry: &Value) -> bool {
    let entry_id = entry
        .get("entryId")
        .or_else(|| entry.get("entry_id"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if entry_id.starts_with("cursor-") {
        return true;
    }
    let entry_type = entry
        .pointer("/content/entryType")
        .or_else(|| entry.pointer("/content/__typename"))
        .or_else(|| entry.get("type"))
        .and_then(Value::as_str);
    matches!(entry_type, Some("TimelineTimelineCursor") | Some("cursor"))
}

fn non_empty(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn top_level_cursor(value: &Value) -> Option<String> {
    non_empty(value.get("next_cursor"))
        .or_else(|| non_empty(value.pointer("/cursor/bottom")))
        .or_else(|| non_empty(value.get("cursor")))
        .or_else(|| non_empty(value.pointer("/meta/next_token")))
}

fn marker_cursor(value: &Value) -> Option<String> {
    let instructions = instructions(value)?;
    let bottom = |entry: &Value| -> Option<String> {
        let id = entry.get("entryId").and_then(Value::as_str)?;
        let is_bottom = id.starts_with("cursor-bottom")
            || entry.pointer("/content/cursorType").and_then(Value::as_str) == Some("Bottom");
        if is_bottom {
            non_empty(entry.pointer("/content/value"))
        } else {
            None
        }
    };
    instructions.iter().find_map(|instruction| {
        let from_entries = instruction
            .get("entries")
            .and_then(Value::as_array)
            .and_then(|entries| entries.iter().find_map(bottom));
        from_entries.or_else(|| instruction.get("entry").and_then(bottom))
    })
}

fn alternate_root_cursor(value: &Value) -> Option<String> {
    ["data", "result"].iter().find_map(|root| {
        let inner = value.get(*root)?;
        non_empty(inner.get("next_cursor")).or_else(|| non_empty(inner.pointer("/cursor/bottom")))
    })
}

fn describe(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).take(8).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        Value::Null => "null".into(),
        other => format!("unexpected {}", json_kind(other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Null => "null",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str) -> Value {
        json!({ "tweet_id": id, "text": format!("post {id}") })
    }

    fn graphql_page(entries: Vec<Value>, cursor: &str) -> Value {
        let mut all: Vec<Value> = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| json!({ "entryId": format!("tweet-{i}"), "content": e }))
            .collect();
        all.push(json!({
            "entryId": "cursor-top-1",
            "content": { "entryType": "TimelineTimelineCursor", "value": "TOP", "cursorType": "Top" }
        }));
        all.push(json!({
            "entryId": "cursor-bottom-1",
            "content": { "entryType": "TimelineTimelineCursor", "value": cursor, "cursorType": "Bottom" }
        }));
        json!({
            "data": { "user": { "result": { "timeline_v2": { "timeline": {
                "instructions": [
                    { "type": "TimelineClearCache" },
                    { "type": "TimelineAddEntries", "entries": all }
                ]
            }}}}}
        })
    }

    #[test]
    fn nested_instructions_exclude_markers_and_read_bottom_cursor() {
        let raw = RawPage::Json(graphql_page(vec![entry("2"), entry("1")], "NEXT"));
        let page = extract(&raw);
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("NEXT"));
        assert!(page.entries.iter().all(|e| !is_marker(e)));
    }

    #[test]
    fn flat_timeline_with_next_cursor() {
        let raw = RawPage::Json(json!({
            "timeline": [entry("2"), entry("1")],
            "next_cursor": "C2"
        }));
        let page = extract_strict(&raw).unwrap();
        assert_eq!(page.entries, vec![entry("2"), entry("1")]);
        assert_eq!(page.next_cursor.as_deref(), Some("C2"));
    }

    #[test]
    fn shape_tolerance_yields_same_entries() {
        let logical = vec![entry("30"), entry("20"), entry("10")];
        let nested = json!({
            "data": { "user": { "result": { "timeline": { "timeline": {
                "instructions": [{ "type": "TimelineAddEntries", "entries": logical.clone() }]
            }}}}}
        });
        let flat = json!({ "timeline": logical.clone() });
        let direct = json!({ "tweets": logical.clone() });

        for payload in [nested, flat, direct] {
            let page = extract(&RawPage::Json(payload));
            assert_eq!(page.entries, logical);
        }
    }

    #[test]
    fn cursor_from_alternate_root() {
        let raw = RawPage::Json(json!({
            "tweets": [entry("1")],
            "data": { "cursor": { "bottom": "ALT" } }
        }));
        assert_eq!(extract(&raw).next_cursor.as_deref(), Some("ALT"));
    }

    #[test]
    fn cursor_from_replace_entry_instruction() {
        let raw = RawPage::Json(json!({
            "data": { "user": { "result": { "timeline_v2": { "timeline": {
                "instructions": [
                    { "type": "TimelineAddEntries", "entries": [
                        { "entryId": "tweet-1", "content": entry("1") }
                    ]},
                    { "type": "TimelineReplaceEntry",
                      "entry_id_to_replace": "cursor-bottom-0",
                      "entry": { "entryId": "cursor-bottom-0",
                                 "content": { "value": "REPLACED", "cursorType": "Bottom" } } }
                ]
            }}}}}
        }));
        let page = extract(&raw);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("REPLACED"));
    }

    #[test]
    fn empty_cursor_strings_are_ignored() {
        let raw = RawPage::Json(json!({ "timeline": [entry("1")], "next_cursor": "  " }));
        assert_eq!(extract(&raw).next_cursor, None);
    }

    #[test]
    fn module_items_are_flattened() {
        let raw = RawPage::Json(json!({
            "timeline": { "instructions": [
                { "type": "TimelineAddEntries", "entries": [
                    { "entryId": "profile-grid-0", "content": { "items": [
                        { "entryId": "profile-grid-0-tweet-5", "item": entry("5") },
                        { "entryId": "profile-grid-0-tweet-4", "item": entry("4") }
                    ]}}
                ]},
                { "type": "TimelineAddToModule", "moduleItems": [
                    { "entryId": "profile-grid-0-tweet-3", "item": entry("3") }
                ]}
            ]}
        }));
        let page = extract(&raw);
        assert_eq!(page.entries.len(), 3);
    }

    #[test]
    fn pinned_entry_is_kept_out_of_timeline_order() {
        let raw = RawPage::Json(json!({
            "data": { "user": { "result": { "timeline_v2": { "timeline": {
                "instructions": [
                    { "type": "TimelineClearCache" },
                    { "type": "TimelinePinEntry",
                      "entry": { "entryId": "tweet-50", "content": entry("50") } },
                    { "type": "TimelineAddEntries", "entries": [
                        { "entryId": "tweet-105", "content": entry("105") },
                        { "entryId": "tweet-104", "content": entry("104") }
                    ]}
                ]
            }}}}}
        }));
        let page = extract(&raw);
        let ids: Vec<&str> = page
            .entries
            .iter()
            .filter_map(|e| e.pointer("/content/tweet_id").and_then(Value::as_str))
            .collect();
        assert_eq!(ids, vec!["105", "104"]);
        assert_eq!(page.pinned.len(), 1);
        assert_eq!(page.pinned[0]["entryId"], "tweet-50");
    }

    #[test]
    fn unknown_shape_degrades_to_empty_page() {
        let raw = RawPage::Json(json!({ "errors": [{ "message": "rate limited" }] }));
        assert!(matches!(
            extract_strict(&raw),
            Err(IngestError::ShapeMismatch(_))
        ));
        let page = extract(&raw);
        assert!(page.is_empty());
        assert_eq!(page.next_cursor, None);
    }
}
