//! Durable storage for pending reminders: a single JSON file written via
//! write-to-temp + atomic rename, per the single-writer discipline the
//! scheduler owns the file under.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::types::PersistenceFile;

pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persistence file, or an empty v1 file if it doesn't exist
    /// yet. Entries are trusted as-is; callers tolerate unknown fields via
    /// serde's default behavior of ignoring them.
    pub fn load(&self) -> Result<PersistenceFile> {
        if !self.path.exists() {
            return Ok(PersistenceFile::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(PersistenceFile::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist `file` atomically: write to a sibling temp file, fsync isn't
    /// attempted (not exposed portably via std without extra deps), then
    /// rename over the target so a reader never observes a half-written
    /// file.
    pub fn save(&self, file: &PersistenceFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = temp_path(&self.path);
        let serialized = serde_json::to_string_pretty(file)?;
        std::fs::write(&tmp_path, serialized)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reminders.json".to_string());
    let tmp_name = format!(".{file_name}.tmp-{}", std::process::id());
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(tmp_name),
        _ => PathBuf::from(tmp_name),
    }
}

/// Best-effort removal of a stray temp file left over from a crashed write;
/// logged but never fatal since the scheduler falls back to the last good
/// persisted state either way.
pub fn cleanup_stray_temp(target: &Path) {
    let tmp = temp_path(target);
    if tmp.exists() {
        if let Err(e) = std::fs::remove_file(&tmp) {
            warn!(path = %tmp.display(), error = %e, "failed to clean up stray temp persistence file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PersistedEvent;
    use chrono::Utc;

    fn tmp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("conductor-scheduler-test-{}-{name}", std::process::id()))
    }

    #[test]
    fn missing_file_loads_as_empty_default() {
        let store = Store::new(tmp_file("missing.json"));
        let loaded = store.load().unwrap();
        assert_eq!(loaded.version, 1);
        assert!(loaded.events.is_empty());
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let path = tmp_file("roundtrip.json");
        let store = Store::new(&path);
        let mut file = PersistenceFile::default();
        file.events.push(PersistedEvent {
            id: "e1".into(),
            content: "stretch".into(),
            fire_at: Utc::now(),
            channel_ref: "chan".into(),
            user_ref: "user".into(),
            created_at: Utc::now(),
            terminal: false,
        });
        store.save(&file).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.events.len(), 1);
        assert_eq!(loaded.events[0].id, "e1");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn temp_path_is_a_sibling_dotfile() {
        let target = PathBuf::from("/tmp/example/reminders.json");
        let tmp = temp_path(&target);
        assert_eq!(tmp.parent(), target.parent());
        assert!(tmp.file_name().unwrap().to_string_lossy().starts_with('.'));
    }
}
