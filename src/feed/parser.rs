use feed_rs::model::{Entry, Link};
use feed_rs::parser::{self, ParseFeedError};

use super::types::{RawItem, SourceFeed};

/// Parses an RSS/Atom/JSON feed document into a [`SourceFeed`].
///
/// Items are returned in document order with no filtering. The feed title
/// falls back to `url` when the document does not carry one, since it is
/// used as the author of every merged item.
pub fn parse_feed(url: &str, bytes: &[u8]) -> Result<SourceFeed, ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| url.to_string());

    let items = feed.entries.into_iter().map(into_raw_item).collect();

    Ok(SourceFeed {
        url: url.to_string(),
        title,
        items,
    })
}

fn into_raw_item(entry: Entry) -> RawItem {
    let link = pick_link(&entry.links)
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default();
    let title = entry.title.map(|t| t.content).unwrap_or_default();
    let author = entry
        .authors
        .into_iter()
        .map(|p| p.name)
        .find(|name| !name.trim().is_empty());

    RawItem {
        title,
        link,
        author,
        published: entry.published,
        updated: entry.updated,
    }
}

/// Atom entries can list several links; prefer the alternate (article) link
/// over self/edit/replies links.
fn pick_link(links: &[Link]) -> Option<&Link> {
    links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| links.first())
}
