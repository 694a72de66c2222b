//! Recording `ArchiveLog`.

use dbarchive_core::ArchiveLog;
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Info(String),
    Error(String),
}

#[derive(Debug, Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<Entry>>,
}

impl RecordingLog {
    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter_map(|entry| match entry {
                Entry::Info(message) => Some(message.clone()),
                Entry::Error(_) => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter_map(|entry| match entry {
                Entry::Error(message) => Some(message.clone()),
                Entry::Info(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl ArchiveLog for RecordingLog {
    fn info(&self, message: &str) {
        self.entries.lock().push(Entry::Info(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.entries.lock().push(Entry::Error(message.to_string()));
    }
}
