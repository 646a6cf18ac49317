//! Raw byte decoding for attachments that are not document packages.

use encoding_rs::WINDOWS_1251;

/// Valid UTF-8 is kept as is; anything else is read as windows-1251.
///
/// Bytes without a Cyrillic mapping are dropped rather than replaced.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => decode_cp1251(bytes),
    }
}

fn decode_cp1251(bytes: &[u8]) -> String {
    let (text, _) = WINDOWS_1251.decode_without_bom_handling(bytes);
    text.chars().filter(|c| !is_unmapped(*c)).collect()
}

/// Replacement characters and C1 controls mark bytes with no letter behind them.
fn is_unmapped(c: char) -> bool {
    c == char::REPLACEMENT_CHARACTER || ('\u{80}'..='\u{9f}').contains(&c)
}
