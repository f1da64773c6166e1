// The contract every pluggable game must satisfy. Modeled on the
// BreakpointGame trait (id/add-remove-player/handle-input/serialize-state
// split), adapted to a non-blocking, Hub-callback shape: `start` spawns its
// own tick-loop task and reports back through a `HubHandle` rather than
// returning a value the Hub would have to await.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::player::{GameId, PlayerHandle, PlayerId};
use crate::interface_adapters::protocol::ClientMessage;
use crate::use_cases::hub::HubHandle;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AddPlayerError {
    #[error("game is full")]
    Full,
    #[error("player already joined")]
    Duplicate,
}

/// Final outcome of a finished game, reported to the Hub exactly once.
#[derive(Debug, Clone, Default)]
pub struct GameResult {
    pub winner: Option<PlayerId>,
    pub score_deltas: HashMap<PlayerId, i64>,
}

/// Everything the Hub needs from a game instance. Implementations own their
/// own simulation state behind an internal mutex; none of these methods may
/// block for more than a handful of microseconds, since they are all called
/// directly from the Hub's single-writer loop.
pub trait Game: Send + Sync {
    fn id(&self) -> GameId;

    fn name(&self) -> &'static str;

    /// Called once per participant when the game is created, and also when
    /// the Hub can't find room in an already-running game (should not
    /// normally happen for the reference games, which start with a fixed
    /// roster, but the contract allows late joins for future games).
    fn add_player(&self, player: PlayerHandle) -> Result<(), AddPlayerError>;

    /// Idempotent. If the resulting participant count falls below the
    /// game's minimum, the implementation must initiate its own shutdown,
    /// which eventually calls `HubHandle::game_finished` exactly once.
    fn remove_player(&self, player_id: PlayerId);

    /// Dispatch one inbound client frame addressed to this game.
    fn handle_message(&self, player_id: PlayerId, message: ClientMessage);

    /// Spawn the game's simulation loop. Must return immediately; the loop
    /// itself runs on its own tokio task and reports completion via `hub`.
    /// The returned handle lets the Hub notice a task that died without ever
    /// calling `game_finished` (see `use_cases::hub`'s reaper).
    fn start(self: Arc<Self>, hub: HubHandle) -> tokio::task::JoinHandle<()>;

    /// Request early termination. Idempotent; must eventually result in
    /// exactly one `HubHandle::game_finished` call.
    fn stop(&self);
}
