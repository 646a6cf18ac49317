//! Text runs from an Office Open XML (`.docx`) package.

use std::io::{BufReader, Cursor};

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

use lawwatch_shared::{LawWatchError, Result};

/// Main document part inside the package.
const DOCUMENT_PART: &str = "word/document.xml";

/// Concatenate every `<w:t>` run of the main document part.
///
/// A space is appended after each run, self-closing ones included, so words
/// split across runs stay apart.
pub(crate) fn document_text(bytes: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| LawWatchError::Extract(format!("not a zip package: {e}")))?;
    let part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| LawWatchError::Extract(format!("{DOCUMENT_PART}: {e}")))?;

    let mut reader = Reader::from_reader(BufReader::new(part));
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_run = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => {
                in_run = false;
                out.push(' ');
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"t" => out.push(' '),
            Ok(Event::Text(t)) if in_run => {
                let text = t
                    .unescape()
                    .map_err(|e| LawWatchError::Extract(format!("{DOCUMENT_PART}: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::CData(c)) if in_run => out.push_str(&String::from_utf8_lossy(&c)),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(LawWatchError::Extract(format!(
                    "{DOCUMENT_PART} at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
        buf.clear();
    }

    Ok(out)
}
