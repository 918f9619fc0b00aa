//! Session token persistence.
//!
//! Tokens survive restarts so the bot does not hit the login endpoint
//! on every start. Unlike the contact ledger, a broken session file is
//! harmless: the bot just logs in again.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::warn;
use wg_gesucht_client::Session;

/// Load saved session tokens. Returns `None` when the file is missing,
/// unreadable, or does not parse.
pub fn load(path: &Path) -> Option<Session> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read session file, logging in fresh");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to parse session file, logging in fresh");
            None
        }
    }
}

/// Persist session tokens for the next run.
pub fn save(path: &Path, session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(session)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write session file at {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_session() -> Session {
        Session {
            access_token: "at-1".to_string(),
            refresh_token: "rt-1".to_string(),
            user_id: "987654".to_string(),
            dev_ref_no: "dev-1".to_string(),
            php_session_id: "php-1".to_string(),
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wg_session.json");

        save(&path, &sample_session()).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.access_token, "at-1");
        assert_eq!(loaded.user_id, "987654");
        assert_eq!(loaded.php_session_id, "php-1");
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        assert!(load(&dir.path().join("wg_session.json")).is_none());
    }

    #[test]
    fn test_corrupt_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wg_session.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load(&path).is_none());
    }
}
