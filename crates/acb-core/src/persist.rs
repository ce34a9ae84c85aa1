use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{session::UserSession, Result};

/// On-disk backup of every session, including ring buffers. Written
/// best-effort after registration and moderation changes, read once at
/// startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: String,
    pub users: Vec<UserSession>,
}

impl Snapshot {
    pub fn capture(users: Vec<UserSession>) -> Self {
        Self {
            saved_at: Utc::now().to_rfc3339(),
            users,
        }
    }
}

/// Write the snapshot as pretty JSON. The temp-file-then-rename dance keeps
/// a crash mid-write from clobbering the previous backup.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a snapshot if the file exists. A missing file is a fresh start,
/// not an error.
pub fn load(path: &Path) -> Result<Option<Snapshot>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Gender, UserId};

    #[test]
    fn missing_file_is_a_fresh_start() {
        let path = std::path::PathBuf::from(format!(
            "/tmp/acb-persist-none-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        assert!(load(&path).unwrap().is_none());
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let path = std::path::PathBuf::from(format!(
            "/tmp/acb-persist-rt-{}.json",
            std::process::id()
        ));

        let mut user = UserSession::new(UserId(1), 20);
        user.gender = Some(Gender::Female);
        user.age = Some(23);
        let snapshot = Snapshot::capture(vec![user]);

        save(&path, &snapshot).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.saved_at, snapshot.saved_at);
        assert_eq!(loaded.users.len(), 1);
        assert_eq!(loaded.users[0].id, UserId(1));
        assert_eq!(loaded.users[0].age, Some(23));

        let _ = std::fs::remove_file(&path);
    }
}
