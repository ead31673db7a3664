//! [`ContinuationStore`] backed by one JSON file per session.
//!
//! State for session `s` lives at `<state_dir>/s.json`. Saves write a
//! sibling temp file and rename it over the target, so a crash mid-save
//! leaves either the old or the new state on disk.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tether_application::{ContinuationStore, StoreError};
use tether_domain::{PendingContinuation, SessionId};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct FileContinuationStore {
    dir: PathBuf,
}

impl FileContinuationStore {
    /// A store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", session.as_str()))
    }
}

impl ContinuationStore for FileContinuationStore {
    fn load(&self, session: &SessionId) -> Result<Option<PendingContinuation>, StoreError> {
        let path = self.path_for(session);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state = serde_json::from_str(&content)
            .map_err(|e| StoreError::Serialization(format!("{}: {}", path.display(), e)))?;
        trace!(session = %session, "Loaded continuation state");
        Ok(Some(state))
    }

    fn save(&self, session: &SessionId, state: &PendingContinuation) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let path = self.path_for(session);
        let tmp = self.dir.join(format!(".{}.json.tmp", session.as_str()));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        debug!(
            session = %session,
            iteration = state.iteration,
            max_iterations = state.max_iterations,
            "Saved continuation state"
        );
        Ok(())
    }

    fn clear(&self, session: &SessionId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(session)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> SessionId {
        SessionId::parse(id).unwrap()
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileContinuationStore::new(dir.path());
        assert!(store.load(&session("s-1")).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_survives_a_new_store() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("state");

        let mut state = PendingContinuation::new(5);
        state.advance("keep going");
        FileContinuationStore::new(&state_dir)
            .save(&session("s-1"), &state)
            .unwrap();

        let reopened = FileContinuationStore::new(&state_dir);
        assert_eq!(reopened.load(&session("s-1")).unwrap(), Some(state));
        assert!(state_dir.join("s-1.json").is_file());
        assert!(!state_dir.join(".s-1.json.tmp").exists());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileContinuationStore::new(dir.path());
        store
            .save(&session("a"), &PendingContinuation::new(1))
            .unwrap();
        assert!(store.load(&session("b")).unwrap().is_none());
    }

    #[test]
    fn test_clear_removes_state_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileContinuationStore::new(dir.path());
        store
            .save(&session("s-1"), &PendingContinuation::new(3))
            .unwrap();

        store.clear(&session("s-1")).unwrap();
        assert!(store.load(&session("s-1")).unwrap().is_none());
        store.clear(&session("s-1")).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("s-1.json"), "{not json").unwrap();
        let store = FileContinuationStore::new(dir.path());
        assert!(matches!(
            store.load(&session("s-1")),
            Err(StoreError::Serialization(_))
        ));
    }
}
