//! Nitter timeline markup → flat JSON entries.
//!
//! Items are emitted in the same flat shape the RapidAPI timeline uses
//! (`tweet_id`, `text`, `created_at`, `retweeted`, `author.screen_name`,
//! `media.photo[].media_url_https`) so normalization needs no HTML knowledge.
use super::types::Page;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Value, json};
use std::sync::LazyLock;

struct Selectors {
    item: Selector,
    link: Selector,
    content: Selector,
    image: Selector,
    date: Selector,
    retweet: Selector,
    username: Selector,
    show_more: Selector,
}

static SELECTORS: LazyLock<Selectors> = LazyLock::new(|| Selectors {
    item: Selector::parse(".timeline-item:not(.show-more)").expect("item selector"),
    link: Selector::parse("a.tweet-link").expect("link selector"),
    content: Selector::parse(".tweet-content").expect("content selector"),
    image: Selector::parse(".attachment.image img").expect("image selector"),
    date: Selector::parse(".tweet-date a").expect("date selector"),
    retweet: Selector::parse(".retweet-header").expect("retweet selector"),
    username: Selector::parse(".username").expect("username selector"),
    show_more: Selector::parse(".show-more a").expect("show-more selector"),
});

pub(crate) fn parse_timeline(body: &str) -> Page {
    let document = Html::parse_document(body);
    let sel = &*SELECTORS;

    let entries: Vec<Value> = document.select(&sel.item).filter_map(parse_item).collect();

    let next_cursor = document
        .select(&sel.show_more)
        .filter_map(|a| a.value().attr("href"))
        .find_map(cursor_from_href);

    tracing::trace!(
        entries = entries.len(),
        has_cursor = next_cursor.is_some(),
        "extract.html_page"
    );
    Page {
        entries,
        pinned: Vec::new(),
        next_cursor,
    }
}

fn parse_item(item: ElementRef<'_>) -> Option<Value> {
    let sel = &*SELECTORS;
    let href = item.select(&sel.link).next()?.value().attr("href")?;
    let id = status_id(href)?;

    let text = item
        .select(&sel.content)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let photos: Vec<Value> = item
        .select(&sel.image)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(proxied_to_origin)
        .map(|url| json!({ "media_url_https": url }))
        .collect();

    let created_at = item
        .select(&sel.date)
        .next()
        .and_then(|a| a.value().attr("title"))
        .map(str::to_string);

    let retweeted = item.select(&sel.retweet).next().is_some();

    let author = item
        .select(&sel.username)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|s| s.trim().trim_start_matches('@').to_string())
        .filter(|s| !s.is_empty());

    let mut entry = json!({
        "tweet_id": id,
        "text": text,
        "retweeted": retweeted,
        "media": { "photo": photos },
    });
    if let Some(ts) = created_at {
        entry["created_at"] = Value::String(ts);
    }
    if let Some(handle) = author {
        entry["author"] = json!({ "screen_name": handle });
    }
    Some(entry)
}

/// `/alice/status/123#m` → `123`
fn status_id(href: &str) -> Option<String> {
    let path = href.split(['#', '?']).next()?;
    let id = path.trim_end_matches('/').rsplit('/').next()?;
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then(|| id.to_string())
}

/// `/pic/media%2FGabc.png` → `https://pbs.twimg.com/media/Gabc?format=png&name=large`
fn proxied_to_origin(src: &str) -> Option<String> {
    let (_, encoded) = src.split_once("/pic/")?;
    let decoded = percent_decode(encoded);
    let (_, media) = decoded.split_once("media/")?;
    let media = media.split('?').next().unwrap_or(media);
    let (name, ext) = match media.rsplit_once('.') {
        Some((name, ext)) if !ext.is_empty() => (name, ext),
        _ => (media, "jpg"),
    };
    if name.is_empty() {
        return None;
    }
    Some(format!(
        "https://pbs.twimg.com/media/{name}?format={ext}&name=large"
    ))
}

fn cursor_from_href(href: &str) -> Option<String> {
    let (_, query) = href.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "cursor")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

fn percent_decode(s: &str) -> String {
    // form_urlencoded also maps '+' to ' ', which never appears in media names.
    let pair = format!("v={s}");
    url::form_urlencoded::parse(pair.as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| s.to_string())
}
