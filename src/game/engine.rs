// The game state machine: pure transition logic mapping
// (snapshot, actor, action) -> next snapshot.
//
// This module is the single source of truth for what is allowed and what
// happens next. It never performs I/O and never suspends; the sync engine
// decides when transitions are applied and how they are persisted. Every
// rejected action leaves the input snapshot untouched.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

use super::room::{
    DraftRoundKind, GameState, Participant, ParticipantId, PendingCatchUp, Phase, Player,
    PostDraft, Room, Side, SidePair, TeamInfo,
};

/// Minimum number of participants required to start a draft.
pub const MIN_PARTICIPANTS: usize = 2;

/// Length of a room join code.
pub const ROOM_CODE_LEN: usize = 4;

/// Validation failures. All of these are rejected synchronously, before
/// any persistence attempt, and leave no partial state behind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("no room with that code")]
    RoomNotFound,
    #[error("only the admin can do that")]
    Forbidden,
    #[error("need at least {MIN_PARTICIPANTS} participants to start a draft")]
    InsufficientParticipants,
    #[error("someone else just took that player")]
    PlayerUnavailable,
    #[error("it is not your turn to pick")]
    NotYourTurn,
    #[error("that side's roster slot is already filled")]
    RosterSlotFull,
    #[error("no participant rosters that player")]
    NoOwner,
    #[error("no such participant in this room")]
    ParticipantNotFound,
    #[error("{0}")]
    InvalidAction(String),
}

/// Who is requesting a transition. Identity comes from the session
/// manager, not from the snapshot: a host who never joined as a player
/// has `participant_id == None` but may still hold the admin flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Actor {
    pub participant_id: Option<ParticipantId>,
    pub is_admin: bool,
}

impl Actor {
    pub fn admin() -> Self {
        Actor {
            participant_id: None,
            is_admin: true,
        }
    }

    pub fn player(id: ParticipantId) -> Self {
        Actor {
            participant_id: Some(id),
            is_admin: false,
        }
    }
}

/// The complete verb set accepted by the state machine.
///
/// `Join` and `AddParticipant` carry an already-persisted [`Participant`]
/// because participant ids are assigned by the record store; the engine
/// merges the row into the snapshot and handles the draft bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A person joins via room code. Legal in every phase; joining during
    /// a draft is the catch-up entry point.
    Join { participant: Participant },
    /// Admin adds a participant from the setup/review screens.
    AddParticipant { participant: Participant },
    RemoveParticipant { id: ParticipantId },
    UpdateAnte { ante: u32 },
    UpdateParticipantName { id: ParticipantId, name: String },
    UpdatePlayerBalance { id: ParticipantId, balance: i64 },
    StartDraft,
    MakePick {
        participant_id: ParticipantId,
        player_id: String,
        side: Side,
    },
    /// Admin places a player on a target roster directly, bypassing turn
    /// order and slot caps.
    AdminAssignPlayer {
        target_id: ParticipantId,
        player_id: String,
        side: Side,
    },
    StartGame,
    RecordScore { player_id: String, side: Side },
    StartNextRound,
    RemovePlayerFromPool { player_id: String, side: Side },
    AddPlayerToPool { player: Player, side: Side },
}

/// Generate a four-uppercase-letter room code.
pub fn generate_room_code<R: Rng>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| rng.gen_range(b'A'..=b'Z') as char)
        .collect()
}

/// Build a fresh room in `SETUP` from imported rosters.
///
/// The store assigns the durable id on insert; `room.id` stays 0 here.
/// Code collisions are resolved by the store's uniqueness constraint and
/// a retry with a new code, so no collision handling happens here.
pub fn create_room<R: Rng>(
    teams: SidePair<TeamInfo>,
    rosters: SidePair<Vec<Player>>,
    default_ante: u32,
    rng: &mut R,
) -> Result<Room, GameError> {
    if rosters.home.is_empty() || rosters.away.is_empty() {
        return Err(GameError::InvalidAction(
            "cannot create a room with an empty player pool".into(),
        ));
    }
    if default_ante == 0 {
        return Err(GameError::InvalidAction("ante must be positive".into()));
    }
    Ok(Room {
        id: 0,
        code: generate_room_code(rng),
        phase: Phase::Setup,
        teams,
        available_players: rosters.clone(),
        original_roster: rosters,
        ante: default_ante,
        pot: 0,
        draft_phase: Side::Home,
        draft_round_kind: DraftRoundKind::Initial,
        draft_order: Vec::new(),
        current_turn_index: 0,
        pending_catch_up: None,
        last_winner: None,
    })
}

/// Apply one action to a snapshot, producing the next snapshot or a
/// rejection. The input is never mutated.
pub fn apply<R: Rng>(
    state: &GameState,
    actor: &Actor,
    action: Action,
    rng: &mut R,
) -> Result<GameState, GameError> {
    let mut next = state.clone();
    match action {
        Action::Join { participant } => join(&mut next, participant)?,
        Action::AddParticipant { participant } => {
            require_admin(actor)?;
            require_phase(
                &next.room,
                &[Phase::Setup, Phase::Ante, Phase::Paused, Phase::Review],
            )?;
            merge_participant(&mut next, participant);
        }
        Action::RemoveParticipant { id } => {
            require_admin(actor)?;
            require_phase(
                &next.room,
                &[Phase::Setup, Phase::Ante, Phase::Paused, Phase::Review],
            )?;
            remove_participant(&mut next, id)?;
        }
        Action::UpdateAnte { ante } => {
            require_admin(actor)?;
            if next.room.phase == Phase::Draft {
                return Err(GameError::Forbidden);
            }
            if ante == 0 {
                return Err(GameError::InvalidAction("ante must be positive".into()));
            }
            next.room.ante = ante;
        }
        Action::UpdateParticipantName { id, name } => {
            if !actor.is_admin && actor.participant_id != Some(id) {
                return Err(GameError::Forbidden);
            }
            if name.trim().is_empty() {
                return Err(GameError::InvalidAction("name cannot be empty".into()));
            }
            next.participant_mut(id)
                .ok_or(GameError::ParticipantNotFound)?
                .name = name;
        }
        Action::UpdatePlayerBalance { id, balance } => {
            require_admin(actor)?;
            next.participant_mut(id)
                .ok_or(GameError::ParticipantNotFound)?
                .balance = balance;
        }
        Action::StartDraft => {
            require_admin(actor)?;
            require_phase(&next.room, &[Phase::Setup, Phase::Ante])?;
            start_draft(&mut next, rng)?;
        }
        Action::MakePick {
            participant_id,
            player_id,
            side,
        } => make_pick(&mut next, actor, participant_id, &player_id, side)?,
        Action::AdminAssignPlayer {
            target_id,
            player_id,
            side,
        } => {
            require_admin(actor)?;
            admin_assign(&mut next, target_id, &player_id, side)?;
        }
        Action::StartGame => {
            require_admin(actor)?;
            require_phase(&next.room, &[Phase::Review])?;
            next.room.phase = Phase::Live;
            next.room.current_turn_index = 0;
        }
        Action::RecordScore { player_id, side } => {
            require_admin(actor)?;
            require_phase(&next.room, &[Phase::Live])?;
            record_score(&mut next, &player_id, side, rng)?;
        }
        Action::StartNextRound => {
            require_admin(actor)?;
            require_phase(&next.room, &[Phase::Paused])?;
            start_next_round(&mut next);
        }
        Action::RemovePlayerFromPool { player_id, side } => {
            require_admin(actor)?;
            require_phase(&next.room, &[Phase::Setup, Phase::Ante])?;
            let pool = next.room.available_players.get_mut(side);
            let idx = pool
                .iter()
                .position(|p| p.id == player_id)
                .ok_or(GameError::PlayerUnavailable)?;
            pool.remove(idx);
            next.room
                .original_roster
                .get_mut(side)
                .retain(|p| p.id != player_id);
        }
        Action::AddPlayerToPool { player, side } => {
            require_admin(actor)?;
            require_phase(&next.room, &[Phase::Setup, Phase::Ante])?;
            if next
                .room
                .original_roster
                .get(side)
                .iter()
                .any(|p| p.id == player.id)
            {
                return Err(GameError::InvalidAction(format!(
                    "player id {} is already in the {} pool",
                    player.id, side
                )));
            }
            next.room.available_players.get_mut(side).push(player.clone());
            next.room.original_roster.get_mut(side).push(player);
        }
    }
    Ok(next)
}

fn require_admin(actor: &Actor) -> Result<(), GameError> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(GameError::Forbidden)
    }
}

fn require_phase(room: &Room, allowed: &[Phase]) -> Result<(), GameError> {
    if allowed.contains(&room.phase) {
        Ok(())
    } else {
        Err(GameError::Forbidden)
    }
}

/// Merge a participant row into the snapshot. Re-merging an id that is
/// already present is a no-op, which makes double-submitted adds
/// idempotent.
fn merge_participant(state: &mut GameState, participant: Participant) {
    if state.participant(participant.id).is_some() {
        debug!(id = participant.id, "participant already present, merge skipped");
        return;
    }
    state.participants.push(participant);
}

fn join(state: &mut GameState, participant: Participant) -> Result<(), GameError> {
    let id = participant.id;
    if state.participant(id).is_none() {
        state.participants.push(participant);
    }

    if state.room.phase != Phase::Draft {
        return Ok(());
    }

    // The row can already be in the snapshot when this runs (the store
    // assigns ids, so it lands there first), so the draft bookkeeping
    // keys off the order: anyone not yet scheduled who still needs a
    // player on the running side picks last in the segment.
    let side = state.room.draft_phase;
    let already_scheduled = state.room.draft_order.contains(&id);
    let needs_pick = state
        .participant(id)
        .is_some_and(|p| p.roster.get(side).is_empty());
    if already_scheduled || !needs_pick {
        return Ok(());
    }

    // Joining mid-draft: the joiner picks last in the running segment,
    // and catches up later on any side whose main round they missed.
    state.room.draft_order.push(id);
    let missed = match state.room.draft_round_kind {
        // The away segment of the initial draft is still ahead and will
        // include the joiner via the snake reversal.
        DraftRoundKind::Initial if side == Side::Home => None,
        _ => Some(side.other()),
    };
    if let Some(side) = missed {
        queue_catch_up(&mut state.room, id, side);
    }
    Ok(())
}

/// Queue a participant into the pending catch-up segment for `side`.
///
/// Everyone queued during one segment missed the same side, so a single
/// pending entry is enough; a mismatched side would indicate a bug
/// upstream and the request is dropped.
fn queue_catch_up(room: &mut Room, id: ParticipantId, side: Side) {
    match &mut room.pending_catch_up {
        Some(pending) if pending.side == side => {
            if !pending.participant_ids.contains(&id) {
                pending.participant_ids.push(id);
            }
        }
        Some(pending) => {
            debug!(
                id,
                queued = %pending.side,
                requested = %side,
                "catch-up side mismatch, ignoring"
            );
        }
        None => {
            room.pending_catch_up = Some(PendingCatchUp {
                participant_ids: vec![id],
                side,
            });
        }
    }
}

fn remove_participant(state: &mut GameState, id: ParticipantId) -> Result<(), GameError> {
    let idx = state
        .participants
        .iter()
        .position(|p| p.id == id)
        .ok_or(GameError::ParticipantNotFound)?;
    let removed = state.participants.remove(idx);

    // Surrendered players go back to the pool so the pool/roster
    // partition keeps holding.
    for side in [Side::Home, Side::Away] {
        let players = removed.roster.get(side).clone();
        if !players.is_empty() {
            state.room.return_to_pool(side, players);
        }
    }
    state.room.draft_order.retain(|&p| p != id);
    if let Some(pending) = &mut state.room.pending_catch_up {
        pending.participant_ids.retain(|&p| p != id);
        if pending.participant_ids.is_empty() {
            state.room.pending_catch_up = None;
        }
    }
    Ok(())
}

fn start_draft<R: Rng>(state: &mut GameState, rng: &mut R) -> Result<(), GameError> {
    if state.participants.len() < MIN_PARTICIPANTS {
        return Err(GameError::InsufficientParticipants);
    }
    collect_antes(state);

    let mut order: Vec<ParticipantId> = state.participants.iter().map(|p| p.id).collect();
    order.shuffle(rng);

    let room = &mut state.room;
    room.phase = Phase::Draft;
    room.draft_phase = Side::Home;
    room.draft_round_kind = DraftRoundKind::Initial;
    room.draft_order = order;
    room.current_turn_index = 0;
    room.pending_catch_up = None;
    Ok(())
}

/// Deduct the ante from every participant (balances may go negative)
/// and move the sum into the pot.
fn collect_antes(state: &mut GameState) {
    let ante = state.room.ante;
    for p in &mut state.participants {
        p.balance -= i64::from(ante);
    }
    state.room.pot += state.participants.len() as u32 * ante;
}

fn make_pick(
    state: &mut GameState,
    actor: &Actor,
    participant_id: ParticipantId,
    player_id: &str,
    side: Side,
) -> Result<(), GameError> {
    if !actor.is_admin && actor.participant_id != Some(participant_id) {
        return Err(GameError::Forbidden);
    }
    if state.participant(participant_id).is_none() {
        return Err(GameError::ParticipantNotFound);
    }

    match state.room.phase {
        // Free-agent pickup: no turn or slot bookkeeping.
        Phase::Live => {
            let player = state
                .room
                .take_from_pool(side, player_id)
                .ok_or(GameError::PlayerUnavailable)?;
            state
                .participant_mut(participant_id)
                .ok_or(GameError::ParticipantNotFound)?
                .roster
                .get_mut(side)
                .push(player);
            Ok(())
        }
        Phase::Draft => {
            if side != state.room.draft_phase {
                return Err(GameError::InvalidAction(format!(
                    "the draft is currently on the {} side",
                    state.room.draft_phase
                )));
            }
            if !state.room.player_in_pool(side, player_id) {
                return Err(GameError::PlayerUnavailable);
            }
            if state.room.on_the_clock() != Some(participant_id) && !actor.is_admin {
                return Err(GameError::NotYourTurn);
            }
            if let Some(p) = state.participant(participant_id) {
                if !p.roster.get(side).is_empty() {
                    return Err(GameError::RosterSlotFull);
                }
            }

            let player = state
                .room
                .take_from_pool(side, player_id)
                .ok_or(GameError::PlayerUnavailable)?;
            state
                .participant_mut(participant_id)
                .ok_or(GameError::ParticipantNotFound)?
                .roster
                .get_mut(side)
                .push(player);

            // Turn consumed, admin override included.
            state.room.current_turn_index += 1;
            if state.room.current_turn_index >= state.room.draft_order.len() {
                complete_round(&mut state.room, &state.participants);
            }
            Ok(())
        }
        _ => Err(GameError::Forbidden),
    }
}

/// Round-complete transition, dispatched on the explicit round kind
/// rather than re-derived from roster shape.
fn complete_round(room: &mut Room, participants: &[Participant]) {
    match room.draft_round_kind {
        // Snake: the away order is the exact reverse of the home order,
        // including anyone who joined mid-segment.
        DraftRoundKind::Initial if room.draft_phase == Side::Home => {
            room.draft_phase = Side::Away;
            room.draft_order.reverse();
            room.current_turn_index = 0;
        }
        DraftRoundKind::Initial => {
            if !enter_catch_up(room, participants, PostDraft::Review) {
                finish_drafting(room, PostDraft::Review);
            }
        }
        DraftRoundKind::Redraft => {
            if !enter_catch_up(room, participants, PostDraft::Live) {
                finish_drafting(room, PostDraft::Live);
            }
        }
        DraftRoundKind::CatchUp { resume } => {
            if !enter_catch_up(room, participants, resume) {
                finish_drafting(room, resume);
            }
        }
    }
}

/// Consume the pending catch-up segment, if any of its members still
/// need a player on its side. Returns whether a segment was entered.
fn enter_catch_up(room: &mut Room, participants: &[Participant], resume: PostDraft) -> bool {
    let Some(pending) = room.pending_catch_up.take() else {
        return false;
    };
    let ids: Vec<ParticipantId> = pending
        .participant_ids
        .iter()
        .copied()
        .filter(|&id| {
            participants
                .iter()
                .any(|p| p.id == id && p.roster.get(pending.side).is_empty())
        })
        .collect();
    if ids.is_empty() {
        return false;
    }
    debug!(side = %pending.side, picks = ids.len(), "entering catch-up segment");
    room.draft_phase = pending.side;
    room.draft_order = ids;
    room.current_turn_index = 0;
    room.draft_round_kind = DraftRoundKind::CatchUp { resume };
    true
}

fn finish_drafting(room: &mut Room, resume: PostDraft) {
    room.phase = match resume {
        PostDraft::Review => Phase::Review,
        PostDraft::Live => Phase::Live,
    };
    room.current_turn_index = 0;
}

fn admin_assign(
    state: &mut GameState,
    target_id: ParticipantId,
    player_id: &str,
    side: Side,
) -> Result<(), GameError> {
    if state.participant(target_id).is_none() {
        return Err(GameError::ParticipantNotFound);
    }
    let player = state
        .room
        .take_from_pool(side, player_id)
        .ok_or(GameError::PlayerUnavailable)?;
    state
        .participant_mut(target_id)
        .ok_or(GameError::ParticipantNotFound)?
        .roster
        .get_mut(side)
        .push(player);
    Ok(())
}

fn record_score<R: Rng>(
    state: &mut GameState,
    player_id: &str,
    side: Side,
    rng: &mut R,
) -> Result<(), GameError> {
    let winner_idx = state
        .participants
        .iter()
        .position(|p| p.holds(side, player_id))
        .ok_or(GameError::NoOwner)?;

    let pot_won = state.room.pot;
    let (winner_id, winner_name, scoring_player_name) = {
        let winner = &mut state.participants[winner_idx];
        winner.balance += i64::from(pot_won);
        winner.winnings += 1;
        let player_name = winner
            .roster
            .get(side)
            .iter()
            .find(|p| p.id == player_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        (winner.id, winner.name.clone(), player_name)
    };

    // The whole scoring side returns to eligibility, not just the
    // winner's player.
    for p in &mut state.participants {
        p.roster.get_mut(side).clear();
    }

    let room = &mut state.room;
    *room.available_players.get_mut(side) = room.original_roster.get(side).clone();
    room.pot = 0;
    room.phase = Phase::Paused;
    room.draft_phase = side;

    // Losers shuffled first, winner picks last.
    let mut order: Vec<ParticipantId> = state
        .participants
        .iter()
        .map(|p| p.id)
        .filter(|&id| id != winner_id)
        .collect();
    order.shuffle(rng);
    order.push(winner_id);
    room.draft_order = order;
    room.current_turn_index = 0;
    room.last_winner = Some(super::room::LastWinner {
        participant_id: winner_id,
        participant_name: winner_name,
        scoring_player_name,
        pot_won,
        timestamp: chrono::Utc::now(),
    });
    Ok(())
}

fn start_next_round(state: &mut GameState) {
    // Anyone who joined while paused slots in ahead of the winner, who
    // keeps the last pick.
    let missing: Vec<ParticipantId> = state
        .participants
        .iter()
        .map(|p| p.id)
        .filter(|id| !state.room.draft_order.contains(id))
        .collect();
    let insert_at = state.room.draft_order.len().saturating_sub(1);
    for (i, id) in missing.into_iter().enumerate() {
        state.room.draft_order.insert(insert_at + i, id);
    }

    collect_antes(state);

    let side = state.room.draft_phase;
    for p in &mut state.participants {
        p.roster.get_mut(side).clear(); // already empty after record_score
    }
    *state.room.available_players.get_mut(side) =
        state.room.original_roster.get(side).clone();

    // Late joiners who never drafted the held side catch up after the
    // redraft completes.
    let other = side.other();
    let catch_up_ids: Vec<ParticipantId> = state
        .room
        .draft_order
        .iter()
        .copied()
        .filter(|&id| {
            state
                .participants
                .iter()
                .any(|p| p.id == id && p.roster.get(other).is_empty())
        })
        .collect();
    state.room.pending_catch_up = if catch_up_ids.is_empty() {
        None
    } else {
        Some(PendingCatchUp {
            participant_ids: catch_up_ids,
            side: other,
        })
    };

    state.room.draft_round_kind = DraftRoundKind::Redraft;
    state.room.phase = Phase::Draft;
    state.room.current_turn_index = 0;
    state.room.last_winner = None;
}
