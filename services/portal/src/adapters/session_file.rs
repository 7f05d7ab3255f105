//! services/portal/src/adapters/session_file.rs
//!
//! A `SessionStore` backed by a JSON file, so a login survives between CLI runs.

use learning_plan_core::domain::AuthSession;
use learning_plan_core::ports::{PortError, PortResult, SessionStore};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    /// A missing or unreadable file means nobody is logged in.
    fn load(&self) -> Option<AuthSession> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read session file");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt session file");
                None
            }
        }
    }

    fn store(&self, session: AuthSession) -> PortResult<()> {
        let raw = serde_json::to_string_pretty(&session)
            .map_err(|e| PortError::Unexpected(format!("Failed to encode session: {}", e)))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PortError::Unexpected(format!("Failed to create session directory: {}", e)))?;
        }
        std::fs::write(&self.path, raw)
            .map_err(|e| PortError::Unexpected(format!("Failed to write session file: {}", e)))
    }

    fn clear(&self) -> PortResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(format!("Failed to remove session file: {}", e))),
        }
    }
}
