//! HTML rendering of a match for chat delivery.

use lawwatch_shared::Match;

/// Extensions that identify an attachment URL as a document.
const DOCUMENT_EXTENSIONS: &[&str] = &[".docx", ".doc", ".pdf", ".rtf", ".txt", ".odt"];

/// Longest caption Telegram accepts on a document.
pub(crate) const CAPTION_LIMIT: usize = 1024;

/// Render `matched` as a Telegram HTML message.
///
/// The description is cut to `description_limit` characters.
pub fn render_html(matched: &Match, description_limit: usize) -> String {
    let mut out = summary(matched, description_limit);

    if matched.is_page_level() {
        out.push_str(&format!(
            "<a href=\"{}\">Страница проекта</a>",
            escape(&matched.project_url)
        ));
    } else {
        out.push_str(&format!(
            "<a href=\"{}\">Документ</a> · <a href=\"{}\">Проект</a>",
            escape(&matched.file_url),
            escape(&matched.project_url)
        ));
        if !has_document_extension(&matched.file_url) {
            out.push_str("\nФайл скачивается без расширения: добавьте <code>.docx</code> к имени.");
        }
    }

    out
}

/// Caption for a match delivered as an attached document.
///
/// Drops the description when the full caption would exceed [`CAPTION_LIMIT`].
pub fn render_caption(matched: &Match, description_limit: usize) -> String {
    let caption = |limit| {
        let mut out = summary(matched, limit);
        out.push_str(&format!(
            "<a href=\"{}\">Проект</a>",
            escape(&matched.project_url)
        ));
        out
    };

    let full = caption(description_limit);
    if full.chars().count() <= CAPTION_LIMIT {
        full
    } else {
        caption(0)
    }
}

/// Title, description, keywords and date, each followed by a line break.
fn summary(matched: &Match, description_limit: usize) -> String {
    let mut out = String::new();

    if !matched.meta.title.is_empty() {
        out.push_str(&format!("<b>{}</b>\n\n", escape(&matched.meta.title)));
    }

    let description = truncate(&matched.meta.description, description_limit);
    if !description.is_empty() {
        out.push_str(&escape(&description));
        out.push_str("\n\n");
    }

    out.push_str(&format!(
        "Ключевые слова: <i>{}</i>\n",
        escape(&matched.keywords.join(", "))
    ));
    if !matched.meta.pub_date.is_empty() {
        out.push_str(&format!("Опубликовано: {}\n", escape(&matched.meta.pub_date)));
    }

    out
}

fn truncate(text: &str, limit: usize) -> String {
    let text = text.trim();
    if limit == 0 {
        return String::new();
    }
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

pub(crate) fn has_document_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    DOCUMENT_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lawwatch_shared::EntryMeta;

    fn attachment_match(file_url: &str, description: &str) -> Match {
        Match {
            project_url: "https://regulation.gov.ru/projects/160001".into(),
            file_url: file_url.into(),
            keywords: vec!["транспорт".into(), "связь".into()],
            meta: EntryMeta {
                title: "О транспорте <и> связи".into(),
                description: description.into(),
                pub_date: "Mon, 06 Oct 2025 10:00:00 +0300".into(),
            },
        }
    }

    #[test]
    fn attachment_message_has_links_and_hint() {
        let m = attachment_match(
            "https://regulation.gov.ru/api/public/Files/GetFile/3f2504e0-4f89-41d3-9a0c-0305e82c3301",
            "Проект",
        );
        let html = render_html(&m, 500);
        assert!(html.starts_with("<b>О транспорте &lt;и&gt; связи</b>"));
        assert!(html.contains("Ключевые слова: <i>транспорт, связь</i>"));
        assert!(html.contains("Опубликовано: Mon, 06 Oct 2025"));
        assert!(html.contains(">Документ</a>"));
        assert!(html.contains(".docx</code>"));
    }

    #[test]
    fn document_urls_get_no_hint() {
        let m = attachment_match("https://example.org/files/draft.DOCX?v=2", "");
        assert!(!render_html(&m, 500).contains("<code>"));
    }

    #[test]
    fn page_level_message_links_the_project() {
        let mut m = attachment_match("", "");
        m.file_url = m.project_url.clone();
        let html = render_html(&m, 500);
        assert!(html.contains(">Страница проекта</a>"));
        assert!(!html.contains("Документ"));
    }

    #[test]
    fn caption_links_the_project_without_hint() {
        let m = attachment_match("https://regulation.gov.ru/api/public/Files/GetFile/abc", "Проект");
        let caption = render_caption(&m, 500);
        assert!(caption.contains("Ключевые слова: <i>транспорт, связь</i>"));
        assert!(caption.ends_with(">Проект</a>"));
        assert!(!caption.contains("<code>"));
        assert!(!caption.contains("Документ"));
    }

    #[test]
    fn oversized_caption_drops_the_description() {
        let long = "слово ".repeat(300);
        let m = attachment_match("https://example.org/files/draft.docx", &long);
        assert!(render_html(&m, 2000).chars().count() > CAPTION_LIMIT);

        let caption = render_caption(&m, 2000);
        assert!(caption.chars().count() <= CAPTION_LIMIT);
        assert!(!caption.contains("слово"));
        assert!(caption.contains("Ключевые слова"));
    }

    #[test]
    fn description_is_truncated_by_characters() {
        assert_eq!(truncate("Экология", 0), "");
        assert_eq!(truncate("Экология", 3), "Эко…");
        assert_eq!(truncate("  связь  ", 10), "связь");
        assert_eq!(truncate("", 5), "");
    }
}
