//! RSS 2.0 parser.
//!
//! Streams the document with `quick-xml` and keeps only what the tracker
//! needs: the channel's title/link and each item's title, link, description
//! and `pubDate`. Prefixed elements (`atom:link`, `dc:date`) are ignored.

use quick_xml::Reader;
use quick_xml::events::Event;

use lawwatch_shared::{FeedEntry, FeedSnapshot, LawWatchError, Result};

/// Parse an RSS document into a [`FeedSnapshot`].
pub(crate) fn parse_feed(xml: &str) -> Result<FeedSnapshot> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<String> = Vec::new();
    let mut snapshot = FeedSnapshot::default();
    let mut saw_channel = false;
    let mut current: Option<FeedEntry> = None;
    // Stack depth of the channel or item field whose text is being collected.
    let mut field: Option<usize> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if field.is_none() {
                    let parent = stack.last().map(String::as_str);
                    match (parent, name.as_str()) {
                        (_, "channel") => saw_channel = true,
                        (Some("channel"), "item") => current = Some(FeedEntry::default()),
                        (Some("channel" | "item"), _) => field = Some(stack.len()),
                        _ => {}
                    }
                    text.clear();
                }
                stack.push(name);
            }
            Ok(Event::Text(t)) => {
                let unescaped = t.unescape().map_err(|e| {
                    LawWatchError::parse(format!(
                        "feed text at byte {}: {e}",
                        reader.buffer_position()
                    ))
                })?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(c)) => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::End(_)) => {
                let name = stack.pop().unwrap_or_default();
                match field {
                    // Inline markup inside a field: keep collecting its text.
                    Some(depth) if stack.len() > depth => continue,
                    Some(_) => field = None,
                    None => {}
                }
                let parent = stack.last().map(String::as_str);
                let value = text.trim();

                match (parent, name.as_str()) {
                    (Some("item"), tag) => {
                        if let Some(entry) = current.as_mut() {
                            match tag {
                                "title" => entry.title = value.to_string(),
                                "link" => entry.link = value.to_string(),
                                "description" => entry.description = value.to_string(),
                                "pubDate" => entry.pub_date = value.to_string(),
                                _ => {}
                            }
                        }
                    }
                    (Some("channel"), "item") => {
                        if let Some(entry) = current.take() {
                            snapshot.items.push(entry);
                        }
                    }
                    (Some("channel"), "title") => snapshot.title = value.to_string(),
                    (Some("channel"), "link") => snapshot.link = value.to_string(),
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(LawWatchError::parse(format!(
                    "malformed feed at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if !stack.is_empty() {
        return Err(LawWatchError::parse(format!(
            "feed ended inside <{}>",
            stack.join("><")
        )));
    }
    if !saw_channel {
        return Err(LawWatchError::parse("feed has no <channel> element"));
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Проекты нормативных правовых актов</title>
    <link>https://regulation.gov.ru</link>
    <atom:link href="https://regulation.gov.ru/api/public/Rss/" rel="self" />
    <description>Лента проектов</description>
    <item>
      <title>О внесении изменений в закон о транспорте</title>
      <link>https://regulation.gov.ru/projects/160001</link>
      <description><![CDATA[Проект <b>федерального</b> закона]]></description>
      <pubDate>Mon, 06 Oct 2025 10:00:00 +0300</pubDate>
    </item>
    <item>
      <title>Об охране окружающей среды &amp; экологии</title>
      <link>https://regulation.gov.ru/projects/160002</link>
      <description>Проект постановления</description>
      <pubDate>Tue, 07 Oct 2025 11:30:00 +0300</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_channel_and_items() {
        let feed = parse_feed(FEED).unwrap();
        assert_eq!(feed.title, "Проекты нормативных правовых актов");
        assert_eq!(feed.link, "https://regulation.gov.ru");
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.link, "https://regulation.gov.ru/projects/160001");
        assert_eq!(first.description, "Проект <b>федерального</b> закона");
        assert_eq!(first.pub_date, "Mon, 06 Oct 2025 10:00:00 +0300");

        assert_eq!(feed.items[1].title, "Об охране окружающей среды & экологии");
    }

    #[test]
    fn inline_markup_in_description_keeps_all_text() {
        let xml = "<rss><channel><title>t</title><item>\
                   <title>Проект</title><link>https://regulation.gov.ru/projects/1</link>\
                   <description>Проект <b>федерального</b> закона</description>\
                   </item></channel></rss>";
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.items[0].description, "Проект федерального закона");
        assert_eq!(feed.items[0].link, "https://regulation.gov.ru/projects/1");
    }

    #[test]
    fn empty_channel_is_valid() {
        let feed = parse_feed("<rss><channel><title>t</title></channel></rss>").unwrap();
        assert!(feed.items.is_empty());
        assert_eq!(feed.title, "t");
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        let err = parse_feed("<rss><channel><item><title>x</link></item></channel></rss>")
            .unwrap_err();
        assert!(matches!(err, LawWatchError::Parse { .. }));
    }

    #[test]
    fn truncated_document_is_rejected() {
        let err = parse_feed("<rss><channel><item><title>x</title>").unwrap_err();
        assert!(err.to_string().contains("feed ended inside"));
    }

    #[test]
    fn document_without_channel_is_rejected() {
        let err = parse_feed("<html><body>maintenance</body></html>").unwrap_err();
        assert!(err.to_string().contains("no <channel>"));
    }
}
