// Player identity and the opaque handle games use to reach a player's
// outbound queue without ever touching the registry that owns them.

use crate::interface_adapters::protocol::ServerMessage;
use tokio::sync::mpsc;

pub type PlayerId = u64;
pub type GameId = u64;

/// Fixed cosmetic pools the Hub cycles through round-robin as each player
/// registers (spec.md §4.3: "round-robin over a fixed pool, wraps on
/// exhaustion"), in the same plain-const-array style as
/// `domain::lobby`'s game catalogue.
const DISPLAY_NAME_POOL: &[&str] = &[
    "Falcon", "Comet", "Nova", "Orbit", "Vertex", "Quasar", "Zenith", "Drift",
    "Ember", "Halo", "Rogue", "Glider",
];

const AVATAR_REF_POOL: &[&str] = &[
    "avatar-falcon",
    "avatar-comet",
    "avatar-nova",
    "avatar-orbit",
    "avatar-vertex",
    "avatar-quasar",
    "avatar-zenith",
    "avatar-drift",
    "avatar-ember",
    "avatar-halo",
    "avatar-rogue",
    "avatar-glider",
];

/// Picks the `cursor`-th entry of each pool, wrapping on exhaustion. `cursor`
/// is a counter the Hub owns and advances once per registered player; it is
/// independent of `PlayerId` so identity allocation never has to agree with
/// display-name allocation.
pub fn identity_for(cursor: usize) -> (String, String) {
    let name = DISPLAY_NAME_POOL[cursor % DISPLAY_NAME_POOL.len()];
    let avatar = AVATAR_REF_POOL[cursor % AVATAR_REF_POOL.len()];
    (name.to_string(), avatar.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Lobby,
    InGame(GameId),
}

/// A lightweight, cloneable reference to a connected player's outbound
/// channel. Games hold these instead of a `Player` so they can never reach
/// into the registry the Hub owns.
#[derive(Clone)]
pub struct PlayerHandle {
    id: PlayerId,
    outbound: mpsc::Sender<ServerMessage>,
}

impl PlayerHandle {
    pub fn new(id: PlayerId, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self { id, outbound }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Non-blocking. Drops the frame and logs a warning if the player's
    /// outbound queue is saturated; never closes the connection itself.
    pub fn send(&self, message: ServerMessage) {
        if self.outbound.try_send(message).is_err() {
            tracing::warn!(player_id = self.id, "outbound queue full, dropping frame");
        }
    }
}

pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub avatar_ref: String,
    pub cumulative_score: i64,
    pub location: Location,
    pub pending_vote: Option<String>,
    pub handle: PlayerHandle,
}

impl Player {
    pub fn new(id: PlayerId, display_name: String, avatar_ref: String, handle: PlayerHandle) -> Self {
        Self {
            id,
            display_name,
            avatar_ref,
            cumulative_score: 0,
            location: Location::Lobby,
            pending_vote: None,
            handle,
        }
    }

    pub fn in_game(&self) -> bool {
        matches!(self.location, Location::InGame(_))
    }
}
