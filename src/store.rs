// SQLite record store for rooms and participants.
//
// The store offers point lookups, field-scoped partial updates, and an
// in-process change-event feed. No transactions span rows: every write
// is last-write-wins per field, which is exactly the contract the sync
// engine is built to tolerate.

use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::game::room::{
    DraftRoundKind, LastWinner, Participant, ParticipantId, PendingCatchUp, Phase, Player, Room,
    RoomId, Side, SidePair, TeamInfo,
};

/// Capacity of the change-event broadcast channel. Slow subscribers fall
/// back to their next poll tick when they lag.
const CHANGE_FEED_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room code already in use")]
    CodeConflict,
    #[error("participant with that name already exists in the room")]
    DuplicateParticipant,
    #[error("record store busy")]
    Busy,
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// Classify a rusqlite failure, mapping busy-timeout expiry to
    /// [`StoreError::Busy`] and constraint violations to `conflict`.
    fn classify(err: rusqlite::Error, conflict: StoreError) -> StoreError {
        match &err {
            rusqlite::Error::SqliteFailure(f, _) => match f.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Busy,
                ErrorCode::ConstraintViolation => conflict,
                _ => StoreError::Sqlite(err),
            },
            _ => StoreError::Sqlite(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTable {
    Rooms,
    Participants,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventType {
    Insert,
    Update,
    Delete,
}

/// Change notification emitted after every successful write through this
/// process's store handle. Cross-process writers are observed by polling.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub table: StoreTable,
    pub event_type: StoreEventType,
    pub room_id: RoomId,
}

/// Partial update for a room row. `None` fields are left untouched so
/// concurrent writers only collide on the fields they both changed.
#[derive(Debug, Clone, Default)]
pub struct RoomPatch {
    pub phase: Option<Phase>,
    pub ante: Option<u32>,
    pub pot: Option<u32>,
    pub draft_phase: Option<Side>,
    pub draft_round_kind: Option<DraftRoundKind>,
    pub current_turn_index: Option<usize>,
    pub draft_order: Option<Vec<ParticipantId>>,
    pub available_players: Option<SidePair<Vec<Player>>>,
    pub original_roster: Option<SidePair<Vec<Player>>>,
    pub pending_catch_up: Option<Option<PendingCatchUp>>,
    pub last_winner: Option<Option<LastWinner>>,
}

impl RoomPatch {
    pub fn is_empty(&self) -> bool {
        self.phase.is_none()
            && self.ante.is_none()
            && self.pot.is_none()
            && self.draft_phase.is_none()
            && self.draft_round_kind.is_none()
            && self.current_turn_index.is_none()
            && self.draft_order.is_none()
            && self.available_players.is_none()
            && self.original_roster.is_none()
            && self.pending_catch_up.is_none()
            && self.last_winner.is_none()
    }
}

/// Partial update for a participant row.
#[derive(Debug, Clone, Default)]
pub struct ParticipantPatch {
    pub name: Option<String>,
    pub balance: Option<i64>,
    pub winnings: Option<u32>,
    pub is_admin: Option<bool>,
    pub roster_home: Option<Vec<Player>>,
    pub roster_away: Option<Vec<Player>>,
}

impl ParticipantPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.balance.is_none()
            && self.winnings.is_none()
            && self.is_admin.is_none()
            && self.roster_home.is_none()
            && self.roster_away.is_none()
    }
}

/// SQLite-backed store. A single connection behind a mutex, WAL mode so
/// independent client processes can share the database file.
pub struct RecordStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl RecordStore {
    /// Open (or create) the store at `path` and ensure the schema
    /// exists. Pass `":memory:"` for an ephemeral store in tests.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::open_with_timeout(path, 5_000)
    }

    /// Like [`RecordStore::open`], with an explicit busy timeout in
    /// milliseconds. A write that stays blocked past the timeout
    /// surfaces as [`StoreError::Busy`].
    pub fn open_with_timeout(path: &str, busy_timeout_ms: u64) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = {busy_timeout_ms};
             PRAGMA foreign_keys = ON;"
        ))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS rooms (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                code               TEXT NOT NULL UNIQUE,
                phase              TEXT NOT NULL,
                ante               INTEGER NOT NULL,
                pot                INTEGER NOT NULL,
                draft_phase        TEXT NOT NULL,
                draft_round_kind   TEXT NOT NULL,
                current_turn_index INTEGER NOT NULL,
                draft_order        TEXT NOT NULL,
                teams              TEXT NOT NULL,
                available_players  TEXT NOT NULL,
                original_roster    TEXT NOT NULL,
                pending_catch_up   TEXT,
                last_winner        TEXT,
                created_at         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS participants (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id     INTEGER NOT NULL REFERENCES rooms(id),
                name        TEXT NOT NULL,
                balance     INTEGER NOT NULL,
                winnings    INTEGER NOT NULL DEFAULT 0,
                is_admin    INTEGER NOT NULL DEFAULT 0,
                roster_home TEXT NOT NULL,
                roster_away TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(room_id, name)
            );

            CREATE INDEX IF NOT EXISTS idx_participants_room_id
                ON participants(room_id);
            ",
        )?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(RecordStore {
            conn: Mutex::new(conn),
            changes,
        })
    }

    /// Acquire the connection. Panics if the mutex is poisoned (another
    /// thread panicked while holding the lock), which should never
    /// happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("record store mutex poisoned")
    }

    /// Subscribe to the in-process change feed.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn emit(&self, table: StoreTable, event_type: StoreEventType, room_id: RoomId) {
        // A send error just means nobody is listening right now.
        let _ = self.changes.send(ChangeEvent {
            table,
            event_type,
            room_id,
        });
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    /// Insert a room, returning its assigned id. A code collision is
    /// reported as [`StoreError::CodeConflict`] so the caller can retry
    /// with a fresh code.
    pub fn insert_room(&self, room: &Room) -> Result<RoomId, StoreError> {
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO rooms
                    (code, phase, ante, pot, draft_phase, draft_round_kind,
                     current_turn_index, draft_order, teams, available_players,
                     original_roster, pending_catch_up, last_winner)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    room.code,
                    room.phase.as_str(),
                    room.ante,
                    room.pot,
                    room.draft_phase.as_str(),
                    serde_json::to_string(&room.draft_round_kind)?,
                    room.current_turn_index as i64,
                    serde_json::to_string(&room.draft_order)?,
                    serde_json::to_string(&room.teams)?,
                    serde_json::to_string(&room.available_players)?,
                    serde_json::to_string(&room.original_roster)?,
                    room.pending_catch_up
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    room.last_winner
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                ],
            )
            .map_err(|e| StoreError::classify(e, StoreError::CodeConflict))?;
            conn.last_insert_rowid()
        };
        self.emit(StoreTable::Rooms, StoreEventType::Insert, id);
        Ok(id)
    }

    pub fn fetch_room_by_code(&self, code: &str) -> Result<Option<Room>, StoreError> {
        self.fetch_room_where("code = ?1", params![code])
    }

    pub fn fetch_room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        self.fetch_room_where("id = ?1", params![id])
    }

    fn fetch_room_where(
        &self,
        filter: &str,
        filter_params: impl rusqlite::Params,
    ) -> Result<Option<Room>, StoreError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT id, code, phase, ante, pot, draft_phase, draft_round_kind,
                    current_turn_index, draft_order, teams, available_players,
                    original_roster, pending_catch_up, last_winner
             FROM rooms WHERE {filter}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(filter_params)?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let phase_str: String = row.get(2)?;
        let draft_phase_str: String = row.get(5)?;
        let kind_json: String = row.get(6)?;
        let order_json: String = row.get(8)?;
        let teams_json: String = row.get(9)?;
        let available_json: String = row.get(10)?;
        let original_json: String = row.get(11)?;
        let pending_json: Option<String> = row.get(12)?;
        let winner_json: Option<String> = row.get(13)?;

        let room = Room {
            id: row.get(0)?,
            code: row.get(1)?,
            phase: Phase::from_str_phase(&phase_str)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown phase {phase_str:?}")))?,
            ante: row.get(3)?,
            pot: row.get(4)?,
            draft_phase: Side::from_str_side(&draft_phase_str).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown side {draft_phase_str:?}"))
            })?,
            draft_round_kind: serde_json::from_str(&kind_json)?,
            current_turn_index: row.get::<_, i64>(7)? as usize,
            draft_order: serde_json::from_str(&order_json)?,
            teams: serde_json::from_str::<SidePair<TeamInfo>>(&teams_json)?,
            available_players: serde_json::from_str(&available_json)?,
            original_roster: serde_json::from_str(&original_json)?,
            pending_catch_up: pending_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            last_winner: winner_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
        };
        Ok(Some(room))
    }

    /// Apply a field-scoped partial update to a room row.
    pub fn update_room(&self, id: RoomId, patch: &RoomPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut fields: Vec<(&'static str, SqlValue)> = Vec::new();
        if let Some(phase) = patch.phase {
            fields.push(("phase", SqlValue::Text(phase.as_str().to_string())));
        }
        if let Some(ante) = patch.ante {
            fields.push(("ante", SqlValue::Integer(i64::from(ante))));
        }
        if let Some(pot) = patch.pot {
            fields.push(("pot", SqlValue::Integer(i64::from(pot))));
        }
        if let Some(side) = patch.draft_phase {
            fields.push(("draft_phase", SqlValue::Text(side.as_str().to_string())));
        }
        if let Some(kind) = patch.draft_round_kind {
            fields.push((
                "draft_round_kind",
                SqlValue::Text(serde_json::to_string(&kind)?),
            ));
        }
        if let Some(idx) = patch.current_turn_index {
            fields.push(("current_turn_index", SqlValue::Integer(idx as i64)));
        }
        if let Some(order) = &patch.draft_order {
            fields.push(("draft_order", SqlValue::Text(serde_json::to_string(order)?)));
        }
        if let Some(pool) = &patch.available_players {
            fields.push((
                "available_players",
                SqlValue::Text(serde_json::to_string(pool)?),
            ));
        }
        if let Some(original) = &patch.original_roster {
            fields.push((
                "original_roster",
                SqlValue::Text(serde_json::to_string(original)?),
            ));
        }
        if let Some(pending) = &patch.pending_catch_up {
            fields.push((
                "pending_catch_up",
                match pending {
                    Some(p) => SqlValue::Text(serde_json::to_string(p)?),
                    None => SqlValue::Null,
                },
            ));
        }
        if let Some(winner) = &patch.last_winner {
            fields.push((
                "last_winner",
                match winner {
                    Some(w) => SqlValue::Text(serde_json::to_string(w)?),
                    None => SqlValue::Null,
                },
            ));
        }

        self.execute_patch("rooms", id, fields)?;
        self.emit(StoreTable::Rooms, StoreEventType::Update, id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------------

    /// Insert a participant, returning the assigned id. A duplicate
    /// `(room, name)` pair is rejected, which makes double-submitted
    /// joins fail cleanly instead of creating ghosts.
    pub fn insert_participant(
        &self,
        room_id: RoomId,
        participant: &Participant,
    ) -> Result<ParticipantId, StoreError> {
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO participants
                    (room_id, name, balance, winnings, is_admin, roster_home, roster_away)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    room_id,
                    participant.name,
                    participant.balance,
                    participant.winnings,
                    participant.is_admin,
                    serde_json::to_string(&participant.roster.home)?,
                    serde_json::to_string(&participant.roster.away)?,
                ],
            )
            .map_err(|e| StoreError::classify(e, StoreError::DuplicateParticipant))?;
            conn.last_insert_rowid()
        };
        self.emit(StoreTable::Participants, StoreEventType::Insert, room_id);
        Ok(id)
    }

    /// All participants in a room, in join order.
    pub fn list_participants(&self, room_id: RoomId) -> Result<Vec<Participant>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, balance, winnings, is_admin, roster_home, roster_away
             FROM participants WHERE room_id = ?1 ORDER BY id",
        )?;
        let raw: Vec<(i64, String, i64, u32, bool, String, String)> = stmt
            .query_map(params![room_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<_, _>>()?;

        raw.into_iter()
            .map(|(id, name, balance, winnings, is_admin, home_json, away_json)| {
                Ok(Participant {
                    id,
                    name,
                    balance,
                    winnings,
                    is_admin,
                    roster: SidePair::new(
                        serde_json::from_str(&home_json)?,
                        serde_json::from_str(&away_json)?,
                    ),
                })
            })
            .collect()
    }

    /// Apply a field-scoped partial update to a participant row.
    pub fn update_participant(
        &self,
        room_id: RoomId,
        id: ParticipantId,
        patch: &ParticipantPatch,
    ) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut fields: Vec<(&'static str, SqlValue)> = Vec::new();
        if let Some(name) = &patch.name {
            fields.push(("name", SqlValue::Text(name.clone())));
        }
        if let Some(balance) = patch.balance {
            fields.push(("balance", SqlValue::Integer(balance)));
        }
        if let Some(winnings) = patch.winnings {
            fields.push(("winnings", SqlValue::Integer(i64::from(winnings))));
        }
        if let Some(is_admin) = patch.is_admin {
            fields.push(("is_admin", SqlValue::Integer(is_admin as i64)));
        }
        if let Some(home) = &patch.roster_home {
            fields.push(("roster_home", SqlValue::Text(serde_json::to_string(home)?)));
        }
        if let Some(away) = &patch.roster_away {
            fields.push(("roster_away", SqlValue::Text(serde_json::to_string(away)?)));
        }

        self.execute_patch("participants", id, fields)?;
        self.emit(StoreTable::Participants, StoreEventType::Update, room_id);
        Ok(())
    }

    pub fn delete_participant(
        &self,
        room_id: RoomId,
        id: ParticipantId,
    ) -> Result<(), StoreError> {
        {
            let conn = self.conn();
            conn.execute("DELETE FROM participants WHERE id = ?1", params![id])
                .map_err(|e| StoreError::classify(e, StoreError::DuplicateParticipant))?;
        }
        self.emit(StoreTable::Participants, StoreEventType::Delete, room_id);
        Ok(())
    }

    /// Build and run `UPDATE {table} SET f1 = ?, ... WHERE id = ?`.
    fn execute_patch(
        &self,
        table: &str,
        id: i64,
        fields: Vec<(&'static str, SqlValue)>,
    ) -> Result<(), StoreError> {
        let clause = fields
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{column} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {table} SET {clause} WHERE id = ?{}",
            fields.len() + 1
        );
        debug!(table, id, fields = fields.len(), "partial update");

        let mut values: Vec<SqlValue> = fields.into_iter().map(|(_, v)| v).collect();
        values.push(SqlValue::Integer(id));

        let conn = self.conn();
        conn.execute(&sql, params_from_iter(values))
            .map_err(|e| StoreError::classify(e, StoreError::DuplicateParticipant))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::create_room;
    use crate::game::room::Position;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn player(id: &str) -> Player {
        Player {
            id: id.to_string(),
            name: format!("Player {id}"),
            position: Position::WideReceiver,
            number: 7,
        }
    }

    fn team(abbrev: &str) -> TeamInfo {
        TeamInfo {
            id: abbrev.to_lowercase(),
            name: abbrev.to_string(),
            color: "#333333".into(),
            abbreviation: abbrev.into(),
        }
    }

    fn sample_room() -> Room {
        create_room(
            SidePair::new(team("DET"), team("GB")),
            SidePair::new(vec![player("h1"), player("h2")], vec![player("a1")]),
            2,
            &mut StdRng::seed_from_u64(7),
        )
        .unwrap()
    }

    #[test]
    fn insert_and_fetch_room_round_trips() {
        let store = RecordStore::open(":memory:").unwrap();
        let mut room = sample_room();
        room.id = store.insert_room(&room).unwrap();

        let fetched = store.fetch_room_by_code(&room.code).unwrap().unwrap();
        assert_eq!(fetched, room);
        assert_eq!(store.fetch_room(room.id).unwrap().unwrap().code, room.code);
        assert!(store.fetch_room_by_code("ZZZZ").unwrap().is_none());
    }

    #[test]
    fn duplicate_code_reports_conflict() {
        let store = RecordStore::open(":memory:").unwrap();
        let room = sample_room();
        store.insert_room(&room).unwrap();
        assert!(matches!(
            store.insert_room(&room).unwrap_err(),
            StoreError::CodeConflict
        ));
    }

    #[test]
    fn partial_update_leaves_other_fields_alone() {
        let store = RecordStore::open(":memory:").unwrap();
        let mut room = sample_room();
        room.id = store.insert_room(&room).unwrap();

        store
            .update_room(
                room.id,
                &RoomPatch {
                    phase: Some(Phase::Draft),
                    pot: Some(10),
                    draft_order: Some(vec![4, 5]),
                    ..Default::default()
                },
            )
            .unwrap();

        let fetched = store.fetch_room(room.id).unwrap().unwrap();
        assert_eq!(fetched.phase, Phase::Draft);
        assert_eq!(fetched.pot, 10);
        assert_eq!(fetched.draft_order, vec![4, 5]);
        assert_eq!(fetched.ante, room.ante);
        assert_eq!(fetched.available_players, room.available_players);
    }

    #[test]
    fn nullable_fields_can_be_set_and_cleared() {
        let store = RecordStore::open(":memory:").unwrap();
        let mut room = sample_room();
        room.id = store.insert_room(&room).unwrap();

        let pending = PendingCatchUp {
            participant_ids: vec![9],
            side: Side::Away,
        };
        store
            .update_room(
                room.id,
                &RoomPatch {
                    pending_catch_up: Some(Some(pending.clone())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            store.fetch_room(room.id).unwrap().unwrap().pending_catch_up,
            Some(pending)
        );

        store
            .update_room(
                room.id,
                &RoomPatch {
                    pending_catch_up: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            store.fetch_room(room.id).unwrap().unwrap().pending_catch_up,
            None
        );
    }

    #[test]
    fn participants_round_trip_in_join_order() {
        let store = RecordStore::open(":memory:").unwrap();
        let mut room = sample_room();
        room.id = store.insert_room(&room).unwrap();

        let mut alice = Participant::new("Alice", 50);
        alice.roster.home.push(player("h1"));
        let alice_id = store.insert_participant(room.id, &alice).unwrap();
        let bob_id = store
            .insert_participant(room.id, &Participant::new("Bob", 50))
            .unwrap();
        assert!(alice_id < bob_id);

        let listed = store.list_participants(room.id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Alice");
        assert_eq!(listed[0].roster.home, vec![player("h1")]);
        assert_eq!(listed[1].name, "Bob");
    }

    #[test]
    fn duplicate_participant_name_is_rejected() {
        let store = RecordStore::open(":memory:").unwrap();
        let mut room = sample_room();
        room.id = store.insert_room(&room).unwrap();
        store
            .insert_participant(room.id, &Participant::new("Alice", 50))
            .unwrap();
        assert!(matches!(
            store
                .insert_participant(room.id, &Participant::new("Alice", 50))
                .unwrap_err(),
            StoreError::DuplicateParticipant
        ));
    }

    #[test]
    fn participant_patch_and_delete() {
        let store = RecordStore::open(":memory:").unwrap();
        let mut room = sample_room();
        room.id = store.insert_room(&room).unwrap();
        let id = store
            .insert_participant(room.id, &Participant::new("Alice", 50))
            .unwrap();

        store
            .update_participant(
                room.id,
                id,
                &ParticipantPatch {
                    balance: Some(-4),
                    winnings: Some(2),
                    roster_away: Some(vec![player("a1")]),
                    ..Default::default()
                },
            )
            .unwrap();
        let p = &store.list_participants(room.id).unwrap()[0];
        assert_eq!(p.balance, -4);
        assert_eq!(p.winnings, 2);
        assert_eq!(p.roster.away.len(), 1);
        assert!(p.roster.home.is_empty());

        store.delete_participant(room.id, id).unwrap();
        assert!(store.list_participants(room.id).unwrap().is_empty());
    }

    #[test]
    fn change_feed_reports_writes() {
        let store = RecordStore::open(":memory:").unwrap();
        let mut rx = store.subscribe();

        let mut room = sample_room();
        room.id = store.insert_room(&room).unwrap();
        store
            .insert_participant(room.id, &Participant::new("Alice", 50))
            .unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.table, StoreTable::Rooms);
        assert_eq!(first.event_type, StoreEventType::Insert);
        assert_eq!(first.room_id, room.id);

        let second = rx.try_recv().unwrap();
        assert_eq!(second.table, StoreTable::Participants);
        assert_eq!(second.event_type, StoreEventType::Insert);
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let store = RecordStore::open(":memory:").unwrap();
        let mut room = sample_room();
        room.id = store.insert_room(&room).unwrap();
        let mut rx = store.subscribe();
        store.update_room(room.id, &RoomPatch::default()).unwrap();
        assert!(rx.try_recv().is_err());
    }
}
