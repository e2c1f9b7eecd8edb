use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use super::HistoryStore;
use crate::error::StoreError;
use crate::workflow::HistoryEvent;

const EXTENSION: &str = "jsonl";

/// Filesystem store writing one JSON line per event to `<root>/<instance>.jsonl`.
///
/// Appends are synced before returning. A final line without its newline is
/// the trace of a write interrupted by a crash and is dropped on read.
pub struct FileStore {
    root: PathBuf,
    // Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn path(&self, instance: &str) -> Result<PathBuf, StoreError> {
        let valid = !instance.is_empty()
            && instance
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !instance.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidId(instance.to_string()));
        }
        Ok(self.root.join(format!("{instance}.{EXTENSION}")))
    }

    fn write_events(file: File, events: &[HistoryEvent]) -> Result<(), StoreError> {
        let mut writer = BufWriter::new(file);
        for event in events {
            serde_json::to_writer(&mut writer, event)?;
            writer.write_all(b"\n")?;
        }
        let file = writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))?;
        file.sync_data()?;
        Ok(())
    }
}

impl HistoryStore for FileStore {
    fn create(&self, instance: &str, first: &HistoryEvent) -> Result<(), StoreError> {
        let path = self.path(instance)?;
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(instance.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::write_events(file, std::slice::from_ref(first))
    }

    fn append(&self, instance: &str, events: &[HistoryEvent]) -> Result<(), StoreError> {
        let path = self.path(instance)?;
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let file = match OpenOptions::new().append(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::UnknownInstance(instance.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::write_events(file, events)
    }

    fn read(&self, instance: &str) -> Result<Vec<HistoryEvent>, StoreError> {
        let path = self.path(instance)?;
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::UnknownInstance(instance.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let complete = data.ends_with('\n');
        let lines: Vec<&str> = data.lines().collect();
        let mut events = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEvent>(line) {
                Ok(event) => events.push(event),
                Err(_) if !complete && idx + 1 == lines.len() => {
                    warn!(instance, line = idx + 1, "dropping torn journal tail");
                }
                Err(source) => {
                    return Err(StoreError::Corrupt {
                        instance: instance.to_string(),
                        line: idx + 1,
                        source,
                    });
                }
            }
        }
        Ok(events)
    }

    fn instances(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{ApplicationRecord, ApplicationStatus};
    use tempfile::TempDir;

    fn started() -> HistoryEvent {
        HistoryEvent::Started {
            record: ApplicationRecord::new("Acme", "Dev", "", "", "a@b.c", 1),
            at: chrono::Utc::now(),
        }
    }

    #[test]
    fn roundtrip_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.create("job-app-1", &started()).unwrap();
            store
                .append(
                    "job-app-1",
                    &[HistoryEvent::SignalApplied {
                        status: ApplicationStatus::Interview,
                    }],
                )
                .unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        let events = store.read("job-app-1").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            HistoryEvent::SignalApplied {
                status: ApplicationStatus::Interview
            }
        );
        assert_eq!(store.instances().unwrap(), ["job-app-1"]);
    }

    #[test]
    fn torn_tail_is_dropped() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.create("job-app-2", &started()).unwrap();
        let path = dir.path().join("job-app-2.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"event":"archi"#).unwrap();

        let events = store.read("job-app-2").unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn corrupt_middle_line_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.create("job-app-3", &started()).unwrap();
        let path = dir.path().join("job-app-3.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"garbage\n").unwrap();

        let err = store.read("job-app-3").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 2, .. }));
    }

    #[test]
    fn rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.create("../escape", &started()),
            Err(StoreError::InvalidId(_))
        ));
        assert!(matches!(
            store.read("missing"),
            Err(StoreError::UnknownInstance(_))
        ));
    }
}
