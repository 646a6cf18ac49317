//! Attachment text extraction and keyword matching.
//!
//! [`extract`] never fails: bytes that are not a `.docx` package fall back to
//! raw decoding (UTF-8, else windows-1251). The result is always lower-cased.

mod decode;
mod docx;
mod matcher;

use tracing::debug;

pub use matcher::match_keywords;

/// Lower-cased text of an attachment body.
pub fn extract(bytes: &[u8]) -> String {
    match docx::document_text(bytes) {
        Ok(text) if !text.trim().is_empty() => return text.to_lowercase(),
        Ok(_) => debug!("document package has no text runs, decoding raw bytes"),
        Err(e) => debug!(error = %e, "not a document package, decoding raw bytes"),
    }
    decode::decode_text(bytes).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::tests::{body, docx};
    use encoding_rs::WINDOWS_1251;
    use lawwatch_shared::KeywordSet;

    #[test]
    fn docx_text_is_lower_cased() {
        let bytes = docx(&body(&["О ТРАНСПОРТЕ", "и Связи"]));
        assert_eq!(extract(&bytes), "о транспорте и связи ");
    }

    #[test]
    fn empty_docx_falls_back_to_raw_decoding() {
        let bytes = docx(&body(&[]));
        // Raw zip bytes decode to noise, but never to an error.
        let text = extract(&bytes);
        assert!(!text.contains("транспорт"));
    }

    #[test]
    fn plain_utf8_text() {
        assert_eq!(extract("Пояснительная ЗАПИСКА".as_bytes()), "пояснительная записка");
    }

    #[test]
    fn legacy_cyrillic_text() {
        let (bytes, _, _) = WINDOWS_1251.encode("ПРОЕКТ о Транспорте");
        assert_eq!(extract(&bytes), "проект о транспорте");
    }

    #[test]
    fn extracted_text_feeds_the_matcher() {
        let keywords = KeywordSet::from_csv("транспорт,экология");
        let bytes = docx(&body(&["Изменения в сфере", "ТРАНСПОРТА"]));
        assert_eq!(match_keywords(&extract(&bytes), &keywords), vec!["транспорт"]);
    }
}
