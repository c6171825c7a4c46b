use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::write_atomically;
use crate::digest::MergedFeed;
use crate::util::strip_control_chars;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Maps a category type to a safe file stem.
///
/// Letters and digits (any script), `-`, `_` and `.` are kept; every other
/// character becomes `_`. A leading `.` is replaced too, so the result is
/// never hidden and never a path component like `..`.
pub fn category_file_stem(kind: &str) -> String {
    let mut stem: String = kind
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() || stem.starts_with('.') {
        stem.insert(0, '_');
    }
    stem
}

/// File name of a category's Atom output: `<type>.xml`, with the type
/// passed through [`category_file_stem`].
pub fn atom_file_name(feed: &MergedFeed) -> String {
    format!("{}.xml", category_file_stem(&feed.kind))
}

/// Renders a merged feed as an Atom 1.0 document.
///
/// Entries keep the merged order. With `hide_author_in_title` unset, entry
/// titles are prefixed with the source feed title (`[Source] Title`).
/// Characters XML cannot carry are stripped from all text.
pub fn render_atom(feed: &MergedFeed, hide_author_in_title: bool) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut root = BytesStart::new("feed");
    root.push_attribute(("xmlns", ATOM_NS));
    writer
        .write_event(Event::Start(root))
        .context("Failed to write feed element")?;

    write_text_element(&mut writer, "title", &feed.kind)?;
    write_text_element(&mut writer, "subtitle", &feed.description)?;
    write_text_element(&mut writer, "id", &format!("urn:feed-digest:{}", feed.kind))?;
    write_text_element(&mut writer, "updated", &feed.created_at.to_rfc3339())?;

    for (index, item) in feed.items.iter().enumerate() {
        writer
            .write_event(Event::Start(BytesStart::new("entry")))
            .context("Failed to write entry element")?;

        write_text_element(&mut writer, "title", &item.display_title(hide_author_in_title))?;

        if !item.link.is_empty() {
            let link = strip_control_chars(&item.link);
            let mut link_el = BytesStart::new("link");
            link_el.push_attribute(("href", &*link));
            writer
                .write_event(Event::Empty(link_el))
                .context("Failed to write link element")?;
        }

        // Links are unique within a merged feed, so they double as entry ids
        let id = if item.link.is_empty() {
            format!("urn:feed-digest:{}:{}", feed.kind, index)
        } else {
            item.link.clone()
        };
        write_text_element(&mut writer, "id", &id)?;
        write_text_element(&mut writer, "updated", &item.created_at.to_rfc3339())?;

        writer
            .write_event(Event::Start(BytesStart::new("author")))
            .context("Failed to write author element")?;
        write_text_element(&mut writer, "name", &item.author)?;
        writer
            .write_event(Event::End(BytesEnd::new("author")))
            .context("Failed to write author end")?;

        writer
            .write_event(Event::End(BytesEnd::new("entry")))
            .context("Failed to write entry end")?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("feed")))
        .context("Failed to write feed end")?;

    let result = writer.into_inner().into_inner();
    String::from_utf8(result).context("Generated Atom contains invalid UTF-8")
}

fn write_text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .with_context(|| format!("Failed to write {name} element"))?;
    writer
        .write_event(Event::Text(BytesText::new(&strip_control_chars(text))))
        .with_context(|| format!("Failed to write {name} text"))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("Failed to write {name} end"))?;
    Ok(())
}

/// Renders `feed` and writes it to `<dir>/<type>.xml`, returning the path.
pub fn write_atom_file(feed: &MergedFeed, dir: &Path, hide_author_in_title: bool) -> Result<PathBuf> {
    let content = render_atom(feed, hide_author_in_title)?;
    let path = dir.join(atom_file_name(feed));
    write_atomically(&path, content.as_bytes())?;
    tracing::info!(
        category = %feed.kind,
        path = %path.display(),
        items = feed.items.len(),
        "Wrote Atom feed"
    );
    Ok(path)
}
