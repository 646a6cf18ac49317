//! Keyword containment.

use lawwatch_shared::KeywordSet;

/// Keywords contained in `text`, in keyword order.
///
/// Matching is case-insensitive plain substring containment; empty keywords
/// never match.
pub fn match_keywords(text: &str, keywords: &KeywordSet) -> Vec<String> {
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .filter(|k| haystack.contains(k.to_lowercase().as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_and_ordered() {
        let keywords = KeywordSet::new(["транспорт", "связь"]);
        assert_eq!(
            match_keywords("Обсуждение ТРАНСПОРТА", &keywords),
            vec!["транспорт"]
        );
    }

    #[test]
    fn output_follows_keyword_order() {
        let keywords = KeywordSet::new(["связь", "экология", "транспорт"]);
        let text = "транспорт, транспорт и снова связь";
        assert_eq!(match_keywords(text, &keywords), vec!["связь", "транспорт"]);
    }

    #[test]
    fn substring_inside_markup_matches() {
        let keywords = KeywordSet::new(["экология"]);
        let page = "<div class=\"title\">Об Экологии и охране</div>";
        // Inflected forms do not contain the keyword literally.
        assert!(match_keywords(page, &keywords).is_empty());

        let page = "<h1>Экология: новые правила</h1>";
        assert_eq!(match_keywords(page, &keywords), vec!["экология"]);
    }

    #[test]
    fn nothing_matches_empty_text() {
        let keywords = KeywordSet::from_csv("экология,связь");
        assert!(match_keywords("", &keywords).is_empty());
    }
}
