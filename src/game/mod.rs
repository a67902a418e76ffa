// Game domain: room/participant types and the pure state machine.

pub mod engine;
pub mod room;

pub use engine::{apply, create_room, Action, Actor, GameError};
pub use room::{GameState, Participant, ParticipantId, Phase, Player, Room, RoomId, Side};
