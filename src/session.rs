// Local session persistence: which room this client last had open and
// which participant it was in each room it has visited.
//
// The file lives in the platform data directory and is rewritten in
// full on every change. Identities are keyed by room code so a client
// rejoining a room it already played in picks up its old seat instead
// of creating a duplicate participant.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::game::room::ParticipantId;

const SESSION_FILE: &str = "session.json";

/// One remembered seat in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIdentity {
    /// `None` for an admin observing without a seat at the table.
    pub participant_id: Option<ParticipantId>,
    pub is_admin: bool,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionFile {
    /// Code of the room to reopen on next launch, if any.
    last_room: Option<String>,
    /// Room code -> identity, kept even after leaving so a later rejoin
    /// recovers the same seat.
    identities: HashMap<String, StoredIdentity>,
}

pub struct SessionManager {
    path: PathBuf,
    state: SessionFile,
}

impl SessionManager {
    /// Load the session file from the platform data directory, creating
    /// an empty session when none exists yet.
    pub fn load_default() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "gridpot")
            .context("could not determine a data directory for this platform")?;
        let dir = dirs.data_dir().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;
        Self::load_from(dir.join(SESSION_FILE))
    }

    /// Load from an explicit path. Tests point this at a temp file.
    pub fn load_from(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read session file {}", path.display()))?;
            match serde_json::from_str(&raw) {
                Ok(state) => state,
                Err(err) => {
                    // A mangled session file is not worth dying over.
                    warn!(path = %path.display(), %err, "discarding unreadable session file");
                    SessionFile::default()
                }
            }
        } else {
            SessionFile::default()
        };
        Ok(SessionManager { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Room code to reopen on launch, if one was left open.
    pub fn last_room(&self) -> Option<&str> {
        self.state.last_room.as_deref()
    }

    /// Remembered identity for a room, if this client has been there.
    pub fn identity_for(&self, code: &str) -> Option<&StoredIdentity> {
        self.state.identities.get(code)
    }

    /// Record a seat in a room and mark the room as current.
    pub fn establish(
        &mut self,
        code: &str,
        participant_id: Option<ParticipantId>,
        is_admin: bool,
    ) -> Result<()> {
        debug!(code, ?participant_id, is_admin, "saving session identity");
        self.state.identities.insert(
            code.to_string(),
            StoredIdentity {
                participant_id,
                is_admin,
                saved_at: Utc::now(),
            },
        );
        self.state.last_room = Some(code.to_string());
        self.persist()
    }

    /// Grant admin standing to the remembered identity for a room.
    pub fn elevate_to_admin(&mut self, code: &str) -> Result<()> {
        match self.state.identities.get_mut(code) {
            Some(identity) if identity.is_admin => Ok(()),
            Some(identity) => {
                warn!(code, "elevating stored identity to admin");
                identity.is_admin = true;
                identity.saved_at = Utc::now();
                self.persist()
            }
            None => {
                warn!(code, "elevating a room with no stored identity");
                self.establish(code, None, true)
            }
        }
    }

    /// Clear the current-room pointer. The identity stays so a future
    /// rejoin recovers the same seat.
    pub fn leave_room(&mut self) -> Result<()> {
        self.state.last_room = None;
        self.persist()
    }

    /// Drop everything remembered about a room. Used when the room no
    /// longer exists in the store.
    pub fn forget_room(&mut self, code: &str) -> Result<()> {
        self.state.identities.remove(code);
        if self.state.last_room.as_deref() == Some(code) {
            self.state.last_room = None;
        }
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.state)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write session file {}", self.path.display()))
    }
}
