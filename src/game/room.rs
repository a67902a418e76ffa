// Core domain types: rooms, participants, players, sides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable identifier for a room, assigned by the record store.
pub type RoomId = i64;

/// Durable identifier for a participant, unique within a room.
pub type ParticipantId = i64;

/// One of the two competing teams being drafted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    /// The opposite side.
    pub fn other(&self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }

    pub fn from_str_side(s: &str) -> Option<Side> {
        match s {
            "home" => Some(Side::Home),
            "away" => Some(Side::Away),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pair of values, one per side. Used for rosters, pools, and team info
/// so side-keyed lookups are total and cannot miss.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidePair<T> {
    pub home: T,
    pub away: T,
}

impl<T> SidePair<T> {
    pub fn new(home: T, away: T) -> Self {
        SidePair { home, away }
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }
}

/// Football positions kept by the roster import (skill positions plus a
/// synthesized team defense). Unknown position strings from manual pools
/// are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Quarterback,
    RunningBack,
    WideReceiver,
    TightEnd,
    Defense,
    Other(String),
}

impl Position {
    /// Parse a position abbreviation (e.g. "QB", "RB", "DST").
    pub fn from_str_pos(s: &str) -> Position {
        match s.to_uppercase().as_str() {
            "QB" => Position::Quarterback,
            "RB" => Position::RunningBack,
            "WR" => Position::WideReceiver,
            "TE" => Position::TightEnd,
            "DST" | "D/ST" | "DEF" => Position::Defense,
            other => Position::Other(other.to_string()),
        }
    }

    /// Display abbreviation for this position.
    pub fn display_str(&self) -> &str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Defense => "DST",
            Position::Other(s) => s,
        }
    }

    /// Ordering used when presenting a pool: QB first, defense last,
    /// anything unknown after that.
    pub fn sort_order(&self) -> u8 {
        match self {
            Position::Quarterback => 1,
            Position::RunningBack => 2,
            Position::WideReceiver => 3,
            Position::TightEnd => 4,
            Position::Defense => 5,
            Position::Other(_) => 99,
        }
    }
}

/// A draftable player as supplied by the roster import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Stable identifier, e.g. "det-12345" or "det-dst".
    pub id: String,
    pub name: String,
    pub position: Position,
    /// Jersey number; 0 for team defenses.
    pub number: u32,
}

/// Descriptor for one of the two teams in the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamInfo {
    /// Provider identifier (ESPN team id), or a caller-chosen id for
    /// custom games.
    pub id: String,
    pub name: String,
    /// Display color as a hex string, e.g. "#0076B6".
    pub color: String,
    pub abbreviation: String,
}

/// Which screen of the game the room is on. Gates which actions are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Setup,
    Ante,
    Draft,
    Review,
    Live,
    Paused,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "SETUP",
            Phase::Ante => "ANTE",
            Phase::Draft => "DRAFT",
            Phase::Review => "REVIEW",
            Phase::Live => "LIVE",
            Phase::Paused => "PAUSED",
        }
    }

    pub fn from_str_phase(s: &str) -> Option<Phase> {
        match s {
            "SETUP" => Some(Phase::Setup),
            "ANTE" => Some(Phase::Ante),
            "DRAFT" => Some(Phase::Draft),
            "REVIEW" => Some(Phase::Review),
            "LIVE" => Some(Phase::Live),
            "PAUSED" => Some(Phase::Paused),
            _ => None,
        }
    }
}

/// Where play resumes once a catch-up segment finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostDraft {
    /// Initial draft: admin reviews rosters before going live.
    Review,
    /// Mid-game redraft: straight back to live play.
    Live,
}

/// What kind of draft round is running. Computed once when the round
/// starts and consumed verbatim at round completion, never re-derived
/// from roster shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftRoundKind {
    /// First draft of the game: home side, then snake to away, then review.
    Initial,
    /// Re-draft of a side whose players returned to the pool after a score.
    Redraft,
    /// Supplementary segment for participants who missed a side's main round.
    CatchUp { resume: PostDraft },
}

/// A deferred draft segment for participants who joined after a side's
/// main round already concluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCatchUp {
    pub participant_ids: Vec<ParticipantId>,
    pub side: Side,
}

/// Transient notification payload describing the most recent pot award.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastWinner {
    pub participant_id: ParticipantId,
    pub participant_name: String,
    pub scoring_player_name: String,
    pub pot_won: u32,
    pub timestamp: DateTime<Utc>,
}

/// The shared game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Record store identifier. 0 until the room has been persisted.
    pub id: RoomId,
    /// Four-uppercase-letter join token. Immutable after creation.
    pub code: String,
    pub phase: Phase,
    pub teams: SidePair<TeamInfo>,
    /// Undrafted players per side. Shrinks as picks are made; replenished
    /// from `original_roster` when a side's players return to the pool.
    pub available_players: SidePair<Vec<Player>>,
    /// Full initial player list per side, captured at creation.
    pub original_roster: SidePair<Vec<Player>>,
    /// Tokens deducted from every participant at the start of each round.
    pub ante: u32,
    pub pot: u32,
    /// Which side is currently being drafted.
    pub draft_phase: Side,
    pub draft_round_kind: DraftRoundKind,
    /// Pick sequence for the current draft segment.
    pub draft_order: Vec<ParticipantId>,
    /// Index into `draft_order` identifying whose turn it is. Always less
    /// than `draft_order.len()` while `phase == Draft`.
    pub current_turn_index: usize,
    pub pending_catch_up: Option<PendingCatchUp>,
    pub last_winner: Option<LastWinner>,
}

impl Room {
    /// The participant whose turn it is, if a draft segment is running.
    pub fn on_the_clock(&self) -> Option<ParticipantId> {
        if self.phase == Phase::Draft {
            self.draft_order.get(self.current_turn_index).copied()
        } else {
            None
        }
    }

    /// Whether `player_id` is currently undrafted on `side`.
    pub fn player_in_pool(&self, side: Side, player_id: &str) -> bool {
        self.available_players
            .get(side)
            .iter()
            .any(|p| p.id == player_id)
    }

    /// Remove a player from a side's pool, returning it if present.
    pub fn take_from_pool(&mut self, side: Side, player_id: &str) -> Option<Player> {
        let pool = self.available_players.get_mut(side);
        let idx = pool.iter().position(|p| p.id == player_id)?;
        Some(pool.remove(idx))
    }

    /// Return players to a side's pool, restoring original roster order.
    pub fn return_to_pool(&mut self, side: Side, players: Vec<Player>) {
        let pool = self.available_players.get_mut(side);
        pool.extend(players);
        let original = self.original_roster.get(side);
        pool.sort_by_key(|p| {
            original
                .iter()
                .position(|o| o.id == p.id)
                .unwrap_or(usize::MAX)
        });
    }
}

/// A person in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Record store identifier. 0 until persisted.
    pub id: ParticipantId,
    pub name: String,
    /// Token balance. May go negative; antes are collected regardless.
    pub balance: i64,
    /// Rounds won. Monotonically non-decreasing.
    pub winnings: u32,
    /// Drafted players per side: at most one during normal play,
    /// unrestricted for free-agent pickups while live.
    pub roster: SidePair<Vec<Player>>,
    pub is_admin: bool,
}

impl Participant {
    pub fn new(name: impl Into<String>, balance: i64) -> Self {
        Participant {
            id: 0,
            name: name.into(),
            balance,
            winnings: 0,
            roster: SidePair::default(),
            is_admin: false,
        }
    }

    /// Whether this participant rosters `player_id` on `side`.
    pub fn holds(&self, side: Side, player_id: &str) -> bool {
        self.roster.get(side).iter().any(|p| p.id == player_id)
    }
}

/// Snapshot of everything the state machine operates on: the room row
/// plus every participant row in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub room: Room,
    pub participants: Vec<Participant>,
}

impl GameState {
    pub fn new(room: Room) -> Self {
        GameState {
            room,
            participants: Vec::new(),
        }
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, name: &str, pos: &str, num: u32) -> Player {
        Player {
            id: id.to_string(),
            name: name.to_string(),
            position: Position::from_str_pos(pos),
            number: num,
        }
    }

    fn two_player_room() -> Room {
        let roster = vec![
            player("h1", "Home QB", "QB", 16),
            player("h2", "Home RB", "RB", 26),
        ];
        Room {
            id: 1,
            code: "ABCD".to_string(),
            phase: Phase::Setup,
            teams: SidePair::new(
                TeamInfo {
                    id: "8".into(),
                    name: "Lions".into(),
                    color: "#0076B6".into(),
                    abbreviation: "DET".into(),
                },
                TeamInfo {
                    id: "9".into(),
                    name: "Packers".into(),
                    color: "#203731".into(),
                    abbreviation: "GB".into(),
                },
            ),
            available_players: SidePair::new(roster.clone(), vec![]),
            original_roster: SidePair::new(roster, vec![]),
            ante: 2,
            pot: 0,
            draft_phase: Side::Home,
            draft_round_kind: DraftRoundKind::Initial,
            draft_order: vec![],
            current_turn_index: 0,
            pending_catch_up: None,
            last_winner: None,
        }
    }

    #[test]
    fn side_other_flips() {
        assert_eq!(Side::Home.other(), Side::Away);
        assert_eq!(Side::Away.other(), Side::Home);
    }

    #[test]
    fn position_parsing_round_trips() {
        assert_eq!(Position::from_str_pos("qb"), Position::Quarterback);
        assert_eq!(Position::from_str_pos("D/ST"), Position::Defense);
        let odd = Position::from_str_pos("LS");
        assert_eq!(odd.display_str(), "LS");
        assert_eq!(odd.sort_order(), 99);
    }

    #[test]
    fn take_from_pool_removes_exactly_one() {
        let mut room = two_player_room();
        let taken = room.take_from_pool(Side::Home, "h1").unwrap();
        assert_eq!(taken.name, "Home QB");
        assert!(!room.player_in_pool(Side::Home, "h1"));
        assert!(room.player_in_pool(Side::Home, "h2"));
        assert!(room.take_from_pool(Side::Home, "h1").is_none());
    }

    #[test]
    fn return_to_pool_restores_original_order() {
        let mut room = two_player_room();
        let first = room.take_from_pool(Side::Home, "h1").unwrap();
        room.return_to_pool(Side::Home, vec![first]);
        let ids: Vec<&str> = room
            .available_players
            .get(Side::Home)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["h1", "h2"]);
    }

    #[test]
    fn on_the_clock_only_during_draft() {
        let mut room = two_player_room();
        room.draft_order = vec![10, 11];
        assert_eq!(room.on_the_clock(), None);
        room.phase = Phase::Draft;
        assert_eq!(room.on_the_clock(), Some(10));
        room.current_turn_index = 1;
        assert_eq!(room.on_the_clock(), Some(11));
    }

    #[test]
    fn phase_string_round_trip() {
        for phase in [
            Phase::Setup,
            Phase::Ante,
            Phase::Draft,
            Phase::Review,
            Phase::Live,
            Phase::Paused,
        ] {
            assert_eq!(Phase::from_str_phase(phase.as_str()), Some(phase));
        }
    }
}
