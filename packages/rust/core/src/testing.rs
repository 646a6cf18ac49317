//! Test doubles shared by the crate's unit tests.

use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use lawwatch_notify::Notifier;
use lawwatch_shared::{LawWatchError, Match, Result};
use lawwatch_storage::Storage;

pub(crate) async fn test_storage() -> Storage {
    let root = std::env::temp_dir().join(format!("lw_core_test_{}", Uuid::now_v7()));
    Storage::open(&root).await.expect("open storage")
}

/// Minimal `.docx` package with one paragraph per run.
pub(crate) fn docx(runs: &[&str]) -> Vec<u8> {
    let body: String = runs
        .iter()
        .map(|r| format!("<w:p><w:r><w:t>{r}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        "<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    );

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        zip.start_file("word/document.xml", zip::write::FileOptions::default())
            .expect("start docx part");
        zip.write_all(xml.as_bytes()).expect("write docx part");
        zip.finish().expect("finish docx");
    }
    cursor.into_inner()
}

/// Records every delivery; optionally rejects them all.
#[derive(Default)]
pub(crate) struct CountingNotifier {
    calls: AtomicUsize,
    seen: Mutex<Vec<Match>>,
    fail: bool,
}

impl CountingNotifier {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen(&self) -> Vec<Match> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, matched: &Match) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(matched.clone());
        if self.fail {
            return Err(LawWatchError::Notify("sink unavailable".into()));
        }
        Ok(())
    }
}
