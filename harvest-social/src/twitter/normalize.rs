//! Entry → [`Post`] normalization.
//!
//! Steps short-circuit on the first failure: locate the result payload, check core
//! content and repost flags, then id, text, photos, timestamp and author. Only
//! image-bearing original posts survive.
use super::error::Rejection;
use super::timestamp::parse_created_at;
use super::types::{Post, PostId};
use chrono::Utc;
use serde_json::Value;
use url::Url;

type ResultLocator = fn(&Value) -> Option<&Value>;

/// Ordered nesting shapes for the per-entry result payload.
const RESULT_SHAPES: &[ResultLocator] = &[direct_result, wrapped_result];

const WRAPPED_PATHS: &[&str] = &[
    "/content/itemContent/tweet_results/result",
    "/item/itemContent/tweet_results/result",
    "/itemContent/tweet_results/result",
    "/tweet_results/result",
    "/result",
];

const REPOST_KEYS: &[&str] = &[
    "retweeted_status_result",
    "retweeted_status",
    "retweeted_tweet",
];

const AUTHOR_PATHS: &[&str] = &[
    "/core/user_results/result/legacy/screen_name",
    "/core/user_results/result/core/screen_name",
];

/// Normalize one raw entry, reporting why it was rejected.
pub fn try_normalize(entry: &Value, requested_handle: &str) -> Result<Post, Rejection> {
    let result = RESULT_SHAPES
        .iter()
        .find_map(|locate| locate(entry))
        .map(unwrap_visibility)
        .ok_or(Rejection::NoResult)?;

    let core = core_content(result).ok_or(Rejection::NoContent)?;
    if is_repost(result, core) {
        return Err(Rejection::Repost);
    }

    let id = post_id(result, core).ok_or(Rejection::MissingId)?;
    let text = post_text(result, core);

    let media_urls = photo_urls(core);
    if media_urls.is_empty() {
        return Err(Rejection::NoPhotos);
    }

    let parsed = core.get("created_at").and_then(|v| match v {
        Value::String(s) => parse_created_at(s),
        Value::Number(n) => parse_created_at(&n.to_string()),
        _ => None,
    });
    let (created_at, estimated) = match parsed {
        Some(ts) => (ts, false),
        None => (Utc::now(), true),
    };

    let author = author_handle(result, core).unwrap_or(requested_handle);

    Post::new(id, author, text, media_urls, created_at, estimated).ok_or(Rejection::NoPhotos)
}

/// Normalize one raw entry; rejected entries are dropped without error.
pub fn normalize(entry: &Value, requested_handle: &str) -> Option<Post> {
    match try_normalize(entry, requested_handle) {
        Ok(post) => Some(post),
        Err(reason) => {
            tracing::trace!(author = requested_handle, %reason, "normalize.rejected");
            None
        }
    }
}

fn direct_result(entry: &Value) -> Option<&Value> {
    let direct = ["tweet_id", "rest_id", "legacy", "id_str"]
        .iter()
        .any(|k| entry.get(*k).is_some());
    direct.then_some(entry)
}

fn wrapped_result(entry: &Value) -> Option<&Value> {
    WRAPPED_PATHS
        .iter()
        .find_map(|path| entry.pointer(path))
        .filter(|v| v.is_object())
}

/// Visibility-filtered results nest the real payload one level deeper.
fn unwrap_visibility(result: &Value) -> &Value {
    let limited = result.get("__typename").and_then(Value::as_str)
        == Some("TweetWithVisibilityResults");
    match result.get("tweet") {
        Some(inner) if limited || inner.get("legacy").is_some() => inner,
        _ => result,
    }
}

/// `legacy` for GraphQL payloads, the entry itself for flat ones.
fn core_content(result: &Value) -> Option<&Value> {
    if let Some(legacy) = result.get("legacy").filter(|v| v.is_object()) {
        return Some(legacy);
    }
    let flat = ["tweet_id", "id_str", "text", "full_text"]
        .iter()
        .any(|k| result.get(*k).is_some());
    flat.then_some(result)
}

fn is_repost(result: &Value, core: &Value) -> bool {
    let embedded = REPOST_KEYS.iter().any(|k| {
        [result, core]
            .iter()
            .any(|v| v.get(*k).is_some_and(|inner| !inner.is_null()))
    });
    // In GraphQL `legacy.retweeted` is viewer state; only flat payloads use it as a repost flag.
    let flat = std::ptr::eq(result, core);
    embedded || (flat && core.get("retweeted").and_then(Value::as_bool) == Some(true))
}

fn as_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn post_id(result: &Value, core: &Value) -> Option<PostId> {
    result
        .get("rest_id")
        .and_then(as_id)
        .or_else(|| core.get("id_str").and_then(as_id))
        .or_else(|| core.get("tweet_id").and_then(as_id))
        .or_else(|| core.get("id").and_then(as_id))
        .map(PostId::from)
}

fn post_text(result: &Value, core: &Value) -> String {
    let long_form = result
        .pointer("/note_tweet/note_tweet_results/result/text")
        .and_then(Value::as_str);
    long_form
        .or_else(|| core.get("full_text").and_then(Value::as_str))
        .or_else(|| core.get("text").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn photo_urls(core: &Value) -> Vec<String> {
    let attached = core
        .pointer("/extended_entities/media")
        .or_else(|| core.pointer("/entities/media"))
        .and_then(Value::as_array);
    let typed = attached
        .into_iter()
        .flatten()
        .filter(|m| m.get("type").and_then(Value::as_str) == Some("photo"));
    let flat = core
        .pointer("/media/photo")
        .and_then(Value::as_array)
        .into_iter()
        .flatten();

    let mut urls: Vec<String> = Vec::new();
    for media in typed.chain(flat) {
        let Some(src) = media.get("media_url_https").and_then(Value::as_str) else {
            continue;
        };
        if let Some(url) = large_rendition(src) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

/// `https://pbs.twimg.com/media/X.png` → `https://pbs.twimg.com/media/X?format=png&name=large`
fn large_rendition(src: &str) -> Option<String> {
    let mut url = Url::parse(src.trim()).ok()?;
    let existing_format = url
        .query_pairs()
        .find(|(k, _)| k == "format")
        .map(|(_, v)| v.into_owned());

    let path = url.path().to_string();
    let (stem, ext) = match path.rsplit_once('/') {
        Some((dir, file)) => match file.rsplit_once('.') {
            Some((name, ext)) if !name.is_empty() && !ext.is_empty() => {
                (format!("{dir}/{name}"), Some(ext.to_string()))
            }
            _ => (path.clone(), None),
        },
        None => (path.clone(), None),
    };
    let ext = ext.or(existing_format).unwrap_or_else(|| "jpg".into());

    url.set_path(&stem);
    url.query_pairs_mut()
        .clear()
        .append_pair("format", &ext)
        .append_pair("name", "large");
    Some(url.to_string())
}

fn author_handle<'a>(result: &'a Value, core: &'a Value) -> Option<&'a str> {
    AUTHOR_PATHS
        .iter()
        .find_map(|path| result.pointer(path))
        .or_else(|| core.pointer("/author/screen_name"))
        .or_else(|| core.pointer("/user/screen_name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat(id: &str) -> Value {
        json!({
            "tweet_id": id,
            "text": "a castle in the clouds --ar 16:9",
            "created_at": "Tue Jan 06 14:54:38 +0000 2026",
            "retweeted": false,
            "author": { "screen_name": "alice" },
            "media": { "photo": [{ "media_url_https": "https://pbs.twimg.com/media/Gabc.jpg" }] }
        })
    }

    fn graphql(id: &str) -> Value {
        json!({
            "entryId": format!("tweet-{id}"),
            "content": { "itemContent": { "tweet_results": { "result": {
                "__typename": "Tweet",
                "rest_id": id,
                "core": { "user_results": { "result": { "legacy": { "screen_name": "Alice_Renamed" } } } },
                "legacy": {
                    "full_text": "full prompt text",
                    "text": "truncated…",
                    "created_at": "Tue Jan 06 14:54:38 +0000 2026",
                    "extended_entities": { "media": [
                        { "type": "photo", "media_url_https": "https://pbs.twimg.com/media/P1.jpg" },
                        { "type": "video", "media_url_https": "https://pbs.twimg.com/ext_tw_video_thumb/V.jpg" },
                        { "type": "photo", "media_url_https": "https://pbs.twimg.com/media/P2.png" }
                    ]}
                }
            }}}}
        })
    }

    #[test]
    fn flat_entry_normalizes() {
        let post = try_normalize(&flat("105"), "alice").unwrap();
        assert_eq!(post.id().as_str(), "105");
        assert_eq!(post.author_handle(), "alice");
        assert_eq!(
            post.media_urls(),
            &["https://pbs.twimg.com/media/Gabc?format=jpg&name=large".to_string()]
        );
        assert!(!post.created_at_estimated());
        assert_eq!(post.permalink(), "https://twitter.com/alice/status/105");
    }

    #[test]
    fn graphql_entry_keeps_photos_only_and_prefers_full_text() {
        let post = try_normalize(&graphql("200"), "alice").unwrap();
        assert_eq!(post.text(), "full prompt text");
        assert_eq!(post.author_handle(), "Alice_Renamed");
        assert_eq!(
            post.media_urls(),
            &[
                "https://pbs.twimg.com/media/P1?format=jpg&name=large".to_string(),
                "https://pbs.twimg.com/media/P2?format=png&name=large".to_string(),
            ]
        );
    }

    #[test]
    fn visibility_wrapper_is_unwrapped() {
        let inner = graphql("300")["content"]["itemContent"]["tweet_results"]["result"].clone();
        let entry = json!({ "content": { "itemContent": { "tweet_results": { "result": {
            "__typename": "TweetWithVisibilityResults",
            "tweet": inner
        }}}}});
        let post = try_normalize(&entry, "alice").unwrap();
        assert_eq!(post.id().as_str(), "300");
    }

    #[test]
    fn reposts_are_rejected_even_with_photos() {
        let mut entry = flat("1");
        entry["retweeted"] = json!(true);
        assert_eq!(try_normalize(&entry, "alice"), Err(Rejection::Repost));

        let mut gql = graphql("2");
        gql["content"]["itemContent"]["tweet_results"]["result"]["legacy"]["retweeted_status_result"] =
            json!({ "result": { "rest_id": "1" } });
        assert_eq!(try_normalize(&gql, "alice"), Err(Rejection::Repost));
    }

    #[test]
    fn viewer_retweet_flag_on_graphql_is_not_a_repost() {
        let mut gql = graphql("3");
        gql["content"]["itemContent"]["tweet_results"]["result"]["legacy"]["retweeted"] = json!(true);
        assert!(try_normalize(&gql, "alice").is_ok());
    }

    #[test]
    fn entries_without_photos_are_rejected() {
        let mut entry = flat("1");
        entry["media"] = json!({ "video": [{ "media_url_https": "https://video.twimg.com/v.mp4" }] });
        assert_eq!(try_normalize(&entry, "alice"), Err(Rejection::NoPhotos));

        let mut entry = flat("1");
        entry.as_object_mut().unwrap().remove("media");
        assert!(normalize(&entry, "alice").is_none());
    }

    #[test]
    fn missing_id_and_missing_result_are_rejected() {
        let mut entry = flat("");
        entry["tweet_id"] = json!("");
        assert_eq!(try_normalize(&entry, "alice"), Err(Rejection::MissingId));
        assert_eq!(
            try_normalize(&json!({ "entryId": "who-to-follow-1" }), "alice"),
            Err(Rejection::NoResult)
        );
        assert_eq!(
            try_normalize(&json!({ "result": { "__typename": "TweetTombstone" } }), "alice"),
            Err(Rejection::NoContent)
        );
    }

    #[test]
    fn unparsable_timestamp_falls_back_to_now() {
        let mut entry = flat("7");
        entry["created_at"] = json!("sometime");
        let before = Utc::now();
        let post = try_normalize(&entry, "alice").unwrap();
        assert!(post.created_at_estimated());
        assert!(post.created_at() >= before);
    }

    #[test]
    fn author_falls_back_to_requested_handle() {
        let mut entry = flat("8");
        entry.as_object_mut().unwrap().remove("author");
        let post = try_normalize(&entry, "requested").unwrap();
        assert_eq!(post.author_handle(), "requested");
    }

    #[test]
    fn duplicate_media_urls_collapse() {
        let mut entry = flat("9");
        entry["media"]["photo"] = json!([
            { "media_url_https": "https://pbs.twimg.com/media/Gabc.jpg" },
            { "media_url_https": "https://pbs.twimg.com/media/Gabc?format=jpg&name=small" }
        ]);
        let post = try_normalize(&entry, "alice").unwrap();
        assert_eq!(post.media_urls().len(), 1);
    }
}
