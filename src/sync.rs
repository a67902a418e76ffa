// The sync engine: one per open room per client process.
//
// Every mutation follows the same path: refetch the authoritative
// snapshot, run the pure transition against it, adopt the result
// locally, then persist only the fields the transition changed. If
// persistence fails the local snapshot rolls back to the authoritative
// one, so the client never keeps state the store refused.
//
// Cross-client convergence is last-write-wins per field, which the
// field-scoped patches keep narrow. Pick races resolve at the refetch:
// whoever commits second sees the player already gone from the pool and
// gets `PlayerUnavailable` instead of a double assignment.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::game::engine::{self, Action, Actor, GameError};
use crate::game::room::{
    GameState, Participant, ParticipantId, Player, Room, RoomId, Side, SidePair, TeamInfo,
};
use crate::store::{ChangeEvent, ParticipantPatch, RecordStore, RoomPatch, StoreError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("the record store timed out")]
    StoreTimeout,
    #[error("write conflicted with a concurrent update")]
    StoreWriteConflict,
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Busy => SyncError::StoreTimeout,
            StoreError::CodeConflict | StoreError::DuplicateParticipant => {
                SyncError::StoreWriteConflict
            }
            other => SyncError::Store(other),
        }
    }
}

/// Client-side handle on one room.
pub struct SyncEngine {
    store: Arc<RecordStore>,
    actor: Actor,
    room_id: RoomId,
    /// What this client renders. Usually equal to `authoritative`; they
    /// diverge only inside a dispatch that later fails to persist.
    state: GameState,
    /// Last snapshot confirmed by the store. Rollback target.
    authoritative: GameState,
    rng: StdRng,
}

impl SyncEngine {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a new room from imported rosters and attach as its admin.
    ///
    /// Room codes are random, so a collision with an existing room is
    /// possible; the store's uniqueness constraint detects it and we
    /// retry with a fresh code up to `attempts` times.
    pub fn create_room(
        store: Arc<RecordStore>,
        teams: SidePair<TeamInfo>,
        rosters: SidePair<Vec<Player>>,
        default_ante: u32,
        attempts: u32,
    ) -> Result<Self, SyncError> {
        Self::create_room_with_rng(
            store,
            teams,
            rosters,
            default_ante,
            attempts,
            StdRng::from_entropy(),
        )
    }

    /// Deterministic variant for tests.
    pub fn create_room_with_rng(
        store: Arc<RecordStore>,
        teams: SidePair<TeamInfo>,
        rosters: SidePair<Vec<Player>>,
        default_ante: u32,
        attempts: u32,
        mut rng: StdRng,
    ) -> Result<Self, SyncError> {
        for attempt in 1..=attempts {
            let mut room =
                engine::create_room(teams.clone(), rosters.clone(), default_ante, &mut rng)?;
            match store.insert_room(&room) {
                Ok(id) => {
                    room.id = id;
                    info!(code = %room.code, id, "room created");
                    let state = GameState::new(room);
                    return Ok(SyncEngine {
                        store,
                        actor: Actor::admin(),
                        room_id: id,
                        authoritative: state.clone(),
                        state,
                        rng,
                    });
                }
                Err(StoreError::CodeConflict) => {
                    debug!(attempt, "room code collision, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }
        Err(SyncError::StoreWriteConflict)
    }

    /// Attach to an existing room as an admin observer, without taking a
    /// seat at the table.
    pub fn attach_admin(store: Arc<RecordStore>, code: &str) -> Result<Self, SyncError> {
        Self::attach(store, code, Actor::admin())
    }

    fn attach(store: Arc<RecordStore>, code: &str, actor: Actor) -> Result<Self, SyncError> {
        let room = store
            .fetch_room_by_code(code)?
            .ok_or(GameError::RoomNotFound)?;
        let room_id = room.id;
        let state = load_state(&store, room)?;
        Ok(SyncEngine {
            store,
            actor,
            room_id,
            authoritative: state.clone(),
            state,
            rng: StdRng::from_entropy(),
        })
    }

    /// Reattach to a seat this client already holds, without inserting
    /// anything. Fails with `ParticipantNotFound` when the seat is gone,
    /// so callers can tell a stale session apart from a missing room.
    pub fn resume_seat(
        store: Arc<RecordStore>,
        code: &str,
        id: ParticipantId,
        is_admin: bool,
    ) -> Result<Self, SyncError> {
        let room = store
            .fetch_room_by_code(code)?
            .ok_or(GameError::RoomNotFound)?;
        let room_id = room.id;
        let state = load_state(&store, room)?;
        if state.participant(id).is_none() {
            return Err(GameError::ParticipantNotFound.into());
        }
        debug!(code, id, "recovered existing seat");
        Ok(SyncEngine {
            store,
            actor: Actor {
                participant_id: Some(id),
                is_admin,
            },
            room_id,
            authoritative: state.clone(),
            state,
            rng: StdRng::from_entropy(),
        })
    }

    /// Join a room by code, taking (or recovering) a seat.
    ///
    /// `remembered_id` is the seat this client held on a previous visit,
    /// from the session file. If that participant still exists the seat
    /// is reused; otherwise the client joins fresh with
    /// `starting_balance`. A name collision with an existing participant
    /// also recovers that seat rather than erroring, since it is almost
    /// always the same person on a second device.
    pub fn join_room(
        store: Arc<RecordStore>,
        code: &str,
        name: &str,
        starting_balance: i64,
        remembered_id: Option<ParticipantId>,
        is_admin: bool,
    ) -> Result<Self, SyncError> {
        if let Some(id) = remembered_id {
            match Self::resume_seat(Arc::clone(&store), code, id, is_admin) {
                Ok(engine) => return Ok(engine),
                Err(SyncError::Game(GameError::ParticipantNotFound)) => {
                    warn!(code, id, "remembered seat no longer exists, joining fresh");
                }
                Err(other) => return Err(other),
            }
        }

        let room = store
            .fetch_room_by_code(code)?
            .ok_or(GameError::RoomNotFound)?;
        let room_id = room.id;
        let state = load_state(&store, room)?;

        let mut participant = Participant::new(name, starting_balance);
        let id = match store.insert_participant(room_id, &participant) {
            Ok(id) => id,
            Err(StoreError::DuplicateParticipant) => {
                let existing = state
                    .participants
                    .iter()
                    .find(|p| p.name == name)
                    .ok_or(SyncError::StoreWriteConflict)?;
                debug!(code, id = existing.id, "joined onto an existing seat by name");
                existing.id
            }
            Err(other) => return Err(other.into()),
        };
        participant.id = id;

        let actor = Actor {
            participant_id: Some(id),
            is_admin,
        };
        let mut engine = SyncEngine {
            store,
            actor,
            room_id,
            authoritative: state.clone(),
            state,
            rng: StdRng::from_entropy(),
        };
        engine.dispatch(Action::Join { participant })?;
        Ok(engine)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn room(&self) -> &Room {
        &self.state.room
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn subscribe_changes(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.store.subscribe()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Run one action through the state machine and persist the result.
    pub fn dispatch(&mut self, action: Action) -> Result<(), SyncError> {
        // Refetch so the transition runs against what everyone else has
        // already committed, not this client's possibly-stale view.
        self.refresh()?;

        let next = engine::apply(&self.authoritative, &self.actor, action, &mut self.rng)?;

        // Optimistic: adopt locally before the store confirms.
        self.state = next.clone();
        if let Err(err) = self.persist_diffs(&next) {
            warn!(%err, "persist failed, rolling back local state");
            self.state = self.authoritative.clone();
            return Err(err);
        }
        self.authoritative = next;
        Ok(())
    }

    /// Admin: add a participant without that person joining themselves.
    ///
    /// The store assigns the id, so the row has to exist before the
    /// transition runs. A trial application against the authoritative
    /// snapshot comes first, so a rejection (wrong phase, not admin)
    /// leaves no row behind.
    pub fn add_participant(&mut self, name: &str, balance: i64) -> Result<ParticipantId, SyncError> {
        self.refresh()?;
        engine::apply(
            &self.authoritative,
            &self.actor,
            Action::AddParticipant {
                participant: Participant::new(name, balance),
            },
            &mut self.rng,
        )?;

        let mut participant = Participant::new(name, balance);
        participant.id = self.store.insert_participant(self.room_id, &participant)?;
        let id = participant.id;
        self.dispatch(Action::AddParticipant { participant })?;
        Ok(id)
    }

    pub fn make_pick(
        &mut self,
        participant_id: ParticipantId,
        player_id: &str,
        side: Side,
    ) -> Result<(), SyncError> {
        self.dispatch(Action::MakePick {
            participant_id,
            player_id: player_id.to_string(),
            side,
        })
    }

    pub fn start_draft(&mut self) -> Result<(), SyncError> {
        self.dispatch(Action::StartDraft)
    }

    pub fn start_game(&mut self) -> Result<(), SyncError> {
        self.dispatch(Action::StartGame)
    }

    pub fn record_score(&mut self, player_id: &str, side: Side) -> Result<(), SyncError> {
        self.dispatch(Action::RecordScore {
            player_id: player_id.to_string(),
            side,
        })
    }

    pub fn start_next_round(&mut self) -> Result<(), SyncError> {
        self.dispatch(Action::StartNextRound)
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Pull the authoritative snapshot and adopt it. The store wins over
    /// anything this client thought it knew.
    pub fn refresh(&mut self) -> Result<(), SyncError> {
        let room = self
            .store
            .fetch_room(self.room_id)?
            .ok_or(GameError::RoomNotFound)?;
        let state = load_state(&self.store, room)?;
        self.authoritative = state.clone();
        self.state = state;
        Ok(())
    }

    /// Write the difference between the authoritative snapshot and
    /// `next`, field by field.
    fn persist_diffs(&self, next: &GameState) -> Result<(), SyncError> {
        let old = &self.authoritative;

        let room_patch = diff_room(&old.room, &next.room);
        self.store.update_room(self.room_id, &room_patch)?;

        for participant in &next.participants {
            match old.participants.iter().find(|p| p.id == participant.id) {
                Some(before) => {
                    let patch = diff_participant(before, participant);
                    self.store
                        .update_participant(self.room_id, participant.id, &patch)?;
                }
                None => {
                    // Row was inserted before the transition ran; write
                    // every field in case the transition touched it.
                    self.store.update_participant(
                        self.room_id,
                        participant.id,
                        &full_participant_patch(participant),
                    )?;
                }
            }
        }

        for removed in old
            .participants
            .iter()
            .filter(|p| !next.participants.iter().any(|n| n.id == p.id))
        {
            self.store.delete_participant(self.room_id, removed.id)?;
        }

        Ok(())
    }
}

fn load_state(store: &RecordStore, room: Room) -> Result<GameState, SyncError> {
    let participants = store.list_participants(room.id)?;
    Ok(GameState { room, participants })
}

fn diff_room(old: &Room, new: &Room) -> RoomPatch {
    let mut patch = RoomPatch::default();
    if old.phase != new.phase {
        patch.phase = Some(new.phase);
    }
    if old.ante != new.ante {
        patch.ante = Some(new.ante);
    }
    if old.pot != new.pot {
        patch.pot = Some(new.pot);
    }
    if old.draft_phase != new.draft_phase {
        patch.draft_phase = Some(new.draft_phase);
    }
    if old.draft_round_kind != new.draft_round_kind {
        patch.draft_round_kind = Some(new.draft_round_kind);
    }
    if old.current_turn_index != new.current_turn_index {
        patch.current_turn_index = Some(new.current_turn_index);
    }
    if old.draft_order != new.draft_order {
        patch.draft_order = Some(new.draft_order.clone());
    }
    if old.available_players != new.available_players {
        patch.available_players = Some(new.available_players.clone());
    }
    if old.original_roster != new.original_roster {
        patch.original_roster = Some(new.original_roster.clone());
    }
    if old.pending_catch_up != new.pending_catch_up {
        patch.pending_catch_up = Some(new.pending_catch_up.clone());
    }
    if old.last_winner != new.last_winner {
        patch.last_winner = Some(new.last_winner.clone());
    }
    patch
}

fn diff_participant(old: &Participant, new: &Participant) -> ParticipantPatch {
    let mut patch = ParticipantPatch::default();
    if old.name != new.name {
        patch.name = Some(new.name.clone());
    }
    if old.balance != new.balance {
        patch.balance = Some(new.balance);
    }
    if old.winnings != new.winnings {
        patch.winnings = Some(new.winnings);
    }
    if old.is_admin != new.is_admin {
        patch.is_admin = Some(new.is_admin);
    }
    if old.roster.home != new.roster.home {
        patch.roster_home = Some(new.roster.home.clone());
    }
    if old.roster.away != new.roster.away {
        patch.roster_away = Some(new.roster.away.clone());
    }
    patch
}

fn full_participant_patch(p: &Participant) -> ParticipantPatch {
    ParticipantPatch {
        name: Some(p.name.clone()),
        balance: Some(p.balance),
        winnings: Some(p.winnings),
        is_admin: Some(p.is_admin),
        roster_home: Some(p.roster.home.clone()),
        roster_away: Some(p.roster.away.clone()),
    }
}

/// Background reconciliation: refetch on every change event for this
/// room, and on a timer as a backstop for writers in other processes
/// that this process's change feed cannot see.
pub async fn run_poll_loop(engine: Arc<Mutex<SyncEngine>>, poll_interval: Duration) {
    let (room_id, mut changes) = {
        let engine = engine.lock().await;
        (engine.room_id(), engine.subscribe_changes())
    };

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            event = changes.recv() => match event {
                Ok(event) if event.room_id == room_id => {}
                Ok(_) => continue,
                // Dropped events just mean the next refetch covers more.
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "change feed lagged");
                }
                Err(RecvError::Closed) => continue,
            }
        }
        if let Err(err) = engine.lock().await.refresh() {
            warn!(%err, "background refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::room::{Phase, Position};
    use rand::SeedableRng;

    fn player(id: &str, position: Position) -> Player {
        Player {
            id: id.to_string(),
            name: format!("Player {id}"),
            position,
            number: 10,
        }
    }

    fn teams() -> SidePair<TeamInfo> {
        SidePair::new(
            TeamInfo {
                id: "det".into(),
                name: "Lions".into(),
                color: "#0076B6".into(),
                abbreviation: "DET".into(),
            },
            TeamInfo {
                id: "gb".into(),
                name: "Packers".into(),
                color: "#203731".into(),
                abbreviation: "GB".into(),
            },
        )
    }

    fn rosters() -> SidePair<Vec<Player>> {
        SidePair::new(
            vec![
                player("h1", Position::Quarterback),
                player("h2", Position::RunningBack),
                player("h3", Position::WideReceiver),
            ],
            vec![
                player("a1", Position::Quarterback),
                player("a2", Position::TightEnd),
                player("a3", Position::WideReceiver),
            ],
        )
    }

    fn new_room(store: &Arc<RecordStore>) -> SyncEngine {
        SyncEngine::create_room_with_rng(
            Arc::clone(store),
            teams(),
            rosters(),
            2,
            5,
            StdRng::seed_from_u64(11),
        )
        .unwrap()
    }

    #[test]
    fn create_join_and_observe() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let admin = new_room(&store);
        let code = admin.room().code.clone();

        let alice =
            SyncEngine::join_room(Arc::clone(&store), &code, "Alice", 50, None, false).unwrap();
        let bob =
            SyncEngine::join_room(Arc::clone(&store), &code, "Bob", 50, None, false).unwrap();
        assert_ne!(alice.actor().participant_id, bob.actor().participant_id);

        let mut admin = admin;
        admin.refresh().unwrap();
        let names: Vec<&str> = admin
            .state()
            .participants
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(admin.state().participants[0].balance, 50);
    }

    #[test]
    fn joining_an_unknown_code_fails() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let err = SyncEngine::join_room(store, "QQQQ", "Alice", 50, None, false)
            .err()
            .expect("joining an unknown code must fail");
        assert!(matches!(err, SyncError::Game(GameError::RoomNotFound)));
    }

    #[test]
    fn remembered_seat_is_recovered_without_a_new_row() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let admin = new_room(&store);
        let code = admin.room().code.clone();

        let alice =
            SyncEngine::join_room(Arc::clone(&store), &code, "Alice", 50, None, false).unwrap();
        let seat = alice.actor().participant_id;
        drop(alice);

        let again =
            SyncEngine::join_room(Arc::clone(&store), &code, "Alice", 50, seat, false).unwrap();
        assert_eq!(again.actor().participant_id, seat);
        assert_eq!(again.state().participants.len(), 1);
    }

    #[test]
    fn name_collision_recovers_the_existing_seat() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let admin = new_room(&store);
        let code = admin.room().code.clone();

        let first =
            SyncEngine::join_room(Arc::clone(&store), &code, "Alice", 50, None, false).unwrap();
        let second =
            SyncEngine::join_room(Arc::clone(&store), &code, "Alice", 50, None, false).unwrap();
        assert_eq!(
            first.actor().participant_id,
            second.actor().participant_id
        );
        assert_eq!(second.state().participants.len(), 1);
    }

    #[test]
    fn pick_race_rejects_the_second_client() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let mut admin = new_room(&store);
        let code = admin.room().code.clone();
        admin.add_participant("Alice", 50).unwrap();
        admin.add_participant("Bob", 50).unwrap();
        admin.start_draft().unwrap();

        let mut other = SyncEngine::attach_admin(Arc::clone(&store), &code).unwrap();

        let first_up = admin.room().on_the_clock().unwrap();
        admin.make_pick(first_up, "h1", Side::Home).unwrap();

        // The other client commits second; the refetch inside dispatch
        // sees the player already gone.
        let second_up = other.room().on_the_clock().unwrap_or(first_up);
        let err = other.make_pick(second_up, "h1", Side::Home).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Game(GameError::PlayerUnavailable)
        ));

        // And it is already resynced onto the winner's reality.
        assert!(!other.room().player_in_pool(Side::Home, "h1"));
    }

    #[test]
    fn rejected_add_leaves_no_row_behind() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let mut admin = new_room(&store);
        admin.add_participant("Alice", 50).unwrap();
        admin.add_participant("Bob", 50).unwrap();
        admin.start_draft().unwrap();

        // Adding is illegal mid-draft; the rejection must not leave a
        // ghost row for other clients to adopt on their next refresh.
        let err = admin.add_participant("Ghost", 50).err().expect("add must fail");
        assert!(matches!(err, SyncError::Game(GameError::Forbidden)));

        admin.refresh().unwrap();
        let names: Vec<&str> = admin
            .state()
            .participants
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(store.list_participants(admin.room_id()).unwrap().len(), 2);
    }

    #[test]
    fn resume_seat_reports_a_missing_seat() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let admin = new_room(&store);
        let code = admin.room().code.clone();

        let err = SyncEngine::resume_seat(Arc::clone(&store), &code, 99, false)
            .err()
            .expect("resuming a missing seat must fail");
        assert!(matches!(
            err,
            SyncError::Game(GameError::ParticipantNotFound)
        ));

        let alice =
            SyncEngine::join_room(Arc::clone(&store), &code, "Alice", 50, None, false).unwrap();
        let seat = alice.actor().participant_id.unwrap();
        drop(alice);

        let resumed = SyncEngine::resume_seat(Arc::clone(&store), &code, seat, false).unwrap();
        assert_eq!(resumed.actor().participant_id, Some(seat));
        assert_eq!(resumed.state().participants.len(), 1);
    }

    #[test]
    fn mid_draft_join_is_scheduled_and_queued_for_catch_up() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let mut admin = new_room(&store);
        let code = admin.room().code.clone();
        admin.add_participant("Alice", 50).unwrap();
        admin.add_participant("Bob", 50).unwrap();
        admin.start_draft().unwrap();

        // Finish the home segment so the away round is running.
        for _ in 0..2 {
            let up = admin.room().on_the_clock().unwrap();
            let player_id = admin.room().available_players.home[0].id.clone();
            admin.make_pick(up, &player_id, Side::Home).unwrap();
        }
        assert_eq!(admin.room().draft_phase, Side::Away);

        // The joiner's row reaches the store before the transition runs;
        // the draft bookkeeping must still schedule them.
        let carol =
            SyncEngine::join_room(Arc::clone(&store), &code, "Carol", 50, None, false).unwrap();
        let carol_id = carol.actor().participant_id.unwrap();

        admin.refresh().unwrap();
        assert_eq!(*admin.room().draft_order.last().unwrap(), carol_id);
        let pending = admin.room().pending_catch_up.as_ref().unwrap();
        assert_eq!(pending.side, Side::Home);
        assert_eq!(pending.participant_ids, vec![carol_id]);
    }

    #[test]
    fn rejected_action_leaves_local_state_untouched() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let admin = new_room(&store);
        let code = admin.room().code.clone();

        let mut alice =
            SyncEngine::join_room(Arc::clone(&store), &code, "Alice", 50, None, false).unwrap();
        let before = alice.state().clone();

        let err = alice.start_draft().unwrap_err();
        assert!(matches!(err, SyncError::Game(GameError::Forbidden)));
        assert_eq!(alice.state(), &before);
        assert_eq!(alice.room().phase, Phase::Setup);
    }

    #[test]
    fn refresh_adopts_external_writes() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let mut admin = new_room(&store);

        store
            .update_room(
                admin.room_id(),
                &RoomPatch {
                    pot: Some(42),
                    ..Default::default()
                },
            )
            .unwrap();

        admin.refresh().unwrap();
        assert_eq!(admin.room().pot, 42);
    }

    #[test]
    fn code_collision_retries_with_a_fresh_code() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        // Same seed produces the same first code; the second create must
        // retry past the collision.
        let first = SyncEngine::create_room_with_rng(
            Arc::clone(&store),
            teams(),
            rosters(),
            2,
            5,
            StdRng::seed_from_u64(3),
        )
        .unwrap();
        let second = SyncEngine::create_room_with_rng(
            Arc::clone(&store),
            teams(),
            rosters(),
            2,
            5,
            StdRng::seed_from_u64(3),
        )
        .unwrap();
        assert_ne!(first.room().code, second.room().code);
    }

    #[test]
    fn draft_progress_is_persisted_field_by_field() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let mut admin = new_room(&store);
        let alice = admin.add_participant("Alice", 50).unwrap();
        let bob = admin.add_participant("Bob", 50).unwrap();
        admin.start_draft().unwrap();

        let stored = store.fetch_room(admin.room_id()).unwrap().unwrap();
        assert_eq!(stored.phase, Phase::Draft);
        assert_eq!(stored.pot, 4);
        assert_eq!(stored.draft_order.len(), 2);

        let first_up = admin.room().on_the_clock().unwrap();
        admin.make_pick(first_up, "h2", Side::Home).unwrap();

        let stored = store.fetch_room(admin.room_id()).unwrap().unwrap();
        assert_eq!(stored.current_turn_index, 1);
        assert!(!stored.available_players.home.iter().any(|p| p.id == "h2"));

        let picked = store
            .list_participants(admin.room_id())
            .unwrap()
            .into_iter()
            .find(|p| p.id == first_up)
            .unwrap();
        assert_eq!(picked.roster.home.len(), 1);
        assert_eq!(picked.roster.home[0].id, "h2");

        // Balances were debited by the ante collection.
        for id in [alice, bob] {
            let p = store
                .list_participants(admin.room_id())
                .unwrap()
                .into_iter()
                .find(|p| p.id == id)
                .unwrap();
            assert_eq!(p.balance, 48);
        }
    }

    #[tokio::test]
    async fn poll_loop_refreshes_on_change_events() {
        let store = Arc::new(RecordStore::open(":memory:").unwrap());
        let admin = new_room(&store);
        let room_id = admin.room_id();
        let engine = Arc::new(Mutex::new(admin));

        let handle = tokio::spawn(run_poll_loop(
            Arc::clone(&engine),
            Duration::from_secs(60),
        ));

        store
            .update_room(
                room_id,
                &RoomPatch {
                    pot: Some(7),
                    ..Default::default()
                },
            )
            .unwrap();

        // Give the loop a few chances to observe the event.
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if engine.lock().await.room().pot == 7 {
                break;
            }
        }
        assert_eq!(engine.lock().await.room().pot, 7);
        handle.abort();
    }
}
