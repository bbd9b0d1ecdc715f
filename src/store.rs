//! Persisted session history
//!
//! Sessions live in a JSON array on disk. Writes go to a sibling temp file
//! that is synced and renamed over the target, so a crash never leaves a
//! truncated store. A missing file is an empty store; a file that fails to
//! parse is logged and treated as empty. Persistence failures never discard
//! the in-memory history.

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::phase::SessionDraft;
use crate::types::{Emotion, EmotionSession};

/// Aggregate view of the stored sessions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub total: usize,
    pub logged: usize,
    pub per_emotion: BTreeMap<Emotion, usize>,
    /// Mean stabilization time in seconds; `None` for an empty store
    pub mean_stabilization_sec: Option<f64>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    path: Option<PathBuf>,
    sessions: Vec<EmotionSession>,
    /// Emotions already recorded in the current exploration
    explored: HashSet<Emotion>,
}

impl SessionStore {
    /// Store without a backing file
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the store at `path`, falling back to empty on absence or corruption
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sessions = match read_sessions(&path) {
            Ok(sessions) => {
                debug!(path = %path.display(), count = sessions.len(), "session store loaded");
                sessions
            }
            Err(EngineError::Io(e)) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session store unreadable, starting empty");
                Vec::new()
            }
        };
        Self {
            path: Some(path),
            sessions,
            explored: HashSet::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn sessions(&self) -> &[EmotionSession] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Start a new exploration; each emotion may be recorded once more
    pub fn begin_exploration(&mut self) {
        self.explored.clear();
    }

    /// Whether `emotion` was already recorded in this exploration
    pub fn is_explored(&self, emotion: Emotion) -> bool {
        self.explored.contains(&emotion)
    }

    /// Append a session unless this emotion was already recorded in the
    /// current exploration. A failed write is logged; the record is kept.
    pub fn record(&mut self, draft: &SessionDraft) -> Option<&EmotionSession> {
        if !self.explored.insert(draft.emotion) {
            debug!(emotion = %draft.emotion, "session already recorded this exploration");
            return None;
        }

        let session = EmotionSession {
            id: Uuid::new_v4().to_string(),
            emotion: draft.emotion,
            timestamp: Utc::now(),
            stabilization_duration: draft.stabilization_duration,
            breathing_quality: draft.breathing_quality,
            is_logged: draft.is_logged,
        };
        info!(
            emotion = %session.emotion,
            duration_sec = session.stabilization_duration,
            breathing = session.breathing_quality.as_str(),
            "session recorded"
        );
        self.sessions.push(session);

        if let Err(e) = self.save() {
            warn!(error = %e, "failed to persist session store");
        }
        self.sessions.last()
    }

    /// Write the store atomically; no-op for in-memory stores
    pub fn save(&self) -> Result<(), EngineError> {
        match &self.path {
            Some(path) => write_sessions(path, &self.sessions),
            None => Ok(()),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let mut per_emotion = BTreeMap::new();
        for session in &self.sessions {
            *per_emotion.entry(session.emotion).or_insert(0) += 1;
        }
        let total = self.sessions.len();
        let mean_stabilization_sec = (total > 0).then(|| {
            self.sessions
                .iter()
                .map(|s| s.stabilization_duration)
                .sum::<f64>()
                / total as f64
        });
        SessionSummary {
            total,
            logged: self.sessions.iter().filter(|s| s.is_logged).count(),
            per_emotion,
            mean_stabilization_sec,
        }
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(&self.sessions)?)
    }
}

/// Parse a store file
pub fn read_sessions(path: &Path) -> Result<Vec<EmotionSession>, EngineError> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| EngineError::Persistence(format!("{}: {e}", path.display())))
}

/// Write-temp, sync, then rename over `path`
pub fn write_sessions(path: &Path, sessions: &[EmotionSession]) -> Result<(), EngineError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(sessions)?;
    {
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.flush()?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BreathingQuality;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn draft(emotion: Emotion, duration: f64, logged: bool) -> SessionDraft {
        SessionDraft {
            emotion,
            stabilization_duration: duration,
            breathing_quality: BreathingQuality::Calm,
            is_logged: logged,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("sessions.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        fs::write(&path, "[{\"id\": \"trunc").unwrap();
        let store = SessionStore::open(&path);
        assert!(store.is_empty());
        assert!(matches!(read_sessions(&path), Err(EngineError::Persistence(_))));
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.json");

        let mut store = SessionStore::open(&path);
        store.record(&draft(Emotion::Anxiety, 3.5, true));
        store.record(&draft(Emotion::Sadness, 12.25, false));
        store.record(&draft(Emotion::Angry, 4.0, true));

        let reloaded = SessionStore::open(&path);
        assert_eq!(reloaded.sessions(), store.sessions());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_one_record_per_emotion_per_exploration() {
        let mut store = SessionStore::in_memory();
        assert!(store.record(&draft(Emotion::Love, 3.0, true)).is_some());
        assert!(store.record(&draft(Emotion::Love, 5.0, false)).is_none());
        assert_eq!(store.len(), 1);
        assert!(store.is_explored(Emotion::Love));

        store.begin_exploration();
        assert!(store.record(&draft(Emotion::Love, 5.0, false)).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut store = SessionStore::in_memory();
        for emotion in Emotion::ALL {
            store.record(&draft(emotion, 3.0, false));
        }
        let ids: HashSet<_> = store.sessions().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_failed_write_keeps_memory_state() {
        let dir = tempdir().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("sessions.json");
        fs::create_dir_all(path.join("occupied")).unwrap();
        let mut store = SessionStore::open(&path);
        assert!(store.record(&draft(Emotion::Happy, 3.0, true)).is_some());
        assert_eq!(store.len(), 1);
        assert!(store.save().is_err());
    }

    #[test]
    fn test_summary() {
        let mut store = SessionStore::in_memory();
        assert_eq!(store.summary().mean_stabilization_sec, None);
        store.record(&draft(Emotion::Calm, 3.0, true));
        store.record(&draft(Emotion::Anxiety, 5.0, false));
        store.begin_exploration();
        store.record(&draft(Emotion::Anxiety, 4.0, true));

        let summary = store.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.logged, 2);
        assert_eq!(summary.per_emotion.get(&Emotion::Anxiety), Some(&2));
        assert_eq!(summary.mean_stabilization_sec, Some(4.0));
    }
}
