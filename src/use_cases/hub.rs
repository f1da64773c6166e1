// The Hub: a single-writer event loop owning all lobby state. Modeled on the
// teacher's `use_cases/lobby.rs::LobbyRegistry` (registry owns lifecycle,
// never exposes its map for external locking) and `use_cases/game.rs`'s
// `tokio::select!`-driven task shape, generalized from one hardcoded
// simulation into a dispatcher over pluggable `Game` trait objects.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::game::{Game, GameResult};
use crate::domain::lobby;
use crate::domain::player::{GameId, Location, Player, PlayerHandle, PlayerId};
use crate::interface_adapters::protocol::{
    ClientMessage, ErrorPayload, GameCatalogueEntry, GameSelectedPayload, LobbyPlayerView,
    SelectGamePayload, ServerMessage, UpdateLobbyPayload, WelcomePayload,
};
use crate::use_cases::games;

const HUB_CHANNEL_CAPACITY: usize = 256;
const VOTE_RECHECK_DELAY: Duration = Duration::from_millis(500);
const REAPER_INTERVAL: Duration = Duration::from_secs(30);

struct ActiveGame {
    game: Arc<dyn Game>,
    runtime: JoinHandle<()>,
}

/// Everything the Hub needs to admit a newly-upgraded connection as a player.
/// Built by `interface_adapters::net` once a socket handshake completes.
/// Cosmetic identity (display name, avatar) is deliberately absent here: the
/// Hub owns the round-robin pool cursor (spec.md §4.3) and assigns it itself
/// during `handle_register`, not the connection that happens to register.
pub struct PendingPlayer {
    pub id: PlayerId,
    pub outbound: mpsc::Sender<ServerMessage>,
}

enum HubEvent {
    Register(PendingPlayer),
    Unregister(PlayerId),
    Incoming(PlayerId, ClientMessage),
    GameFinished(GameId, GameResult),
    Recheck,
    Reap,
    Shutdown,
}

/// Cheap, cloneable reference to the Hub's event channel. This is the only
/// way anything outside the Hub loop touches lobby state.
#[derive(Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    pub async fn register(&self, pending: PendingPlayer) {
        let _ = self.events.send(HubEvent::Register(pending)).await;
    }

    pub async fn unregister(&self, player_id: PlayerId) {
        let _ = self.events.send(HubEvent::Unregister(player_id)).await;
    }

    pub async fn incoming(&self, player_id: PlayerId, message: ClientMessage) {
        let _ = self.events.send(HubEvent::Incoming(player_id, message)).await;
    }

    /// Called by a `Game` runtime exactly once, after it has released its
    /// own internal mutex, never while the Hub holds anything of the game's.
    pub async fn game_finished(&self, game_id: GameId, result: GameResult) {
        let _ = self
            .events
            .send(HubEvent::GameFinished(game_id, result))
            .await;
    }

    async fn recheck(&self) {
        let _ = self.events.send(HubEvent::Recheck).await;
    }

    async fn reap(&self) {
        let _ = self.events.send(HubEvent::Reap).await;
    }

    /// Tell every active game to stop. Best-effort: the Hub loop cannot block
    /// waiting on game-runtime tasks without stalling every other player, so
    /// this only requests the stop and returns once the request is queued.
    pub async fn shutdown(&self) {
        let _ = self.events.send(HubEvent::Shutdown).await;
    }

    /// A `HubHandle` backed by a channel nothing ever reads from a bounded
    /// queue, for unit tests elsewhere in the crate (e.g. the Connection's
    /// frame-dispatch tests) that need a handle to satisfy a signature but
    /// never assert on what the Hub itself does with it.
    #[cfg(test)]
    pub(crate) fn sink_for_test() -> Self {
        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        Self { events: tx }
    }
}

struct Hub {
    players: HashMap<PlayerId, Player>,
    votes: HashMap<PlayerId, String>,
    active_games: HashMap<GameId, ActiveGame>,
    player_to_game: HashMap<PlayerId, GameId>,
    available_games: Vec<lobby::GameDescriptor>,
    next_game_id: GameId,
    next_identity: usize,
    suspected_dead: HashSet<GameId>,
    events_rx: mpsc::Receiver<HubEvent>,
    handle: HubHandle,
}

/// Spawn the Hub loop and return a handle to it. There is exactly one Hub
/// per process (spec.md §1: no horizontal scaling across processes).
pub fn spawn() -> HubHandle {
    let (tx, rx) = mpsc::channel(HUB_CHANNEL_CAPACITY);
    let handle = HubHandle { events: tx };
    let hub = Hub {
        players: HashMap::new(),
        votes: HashMap::new(),
        active_games: HashMap::new(),
        player_to_game: HashMap::new(),
        available_games: lobby::catalogue(),
        next_game_id: 1,
        next_identity: 0,
        suspected_dead: HashSet::new(),
        events_rx: rx,
        handle: handle.clone(),
    };
    tokio::spawn(hub.run());

    let reaper_handle = handle.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REAPER_INTERVAL);
        loop {
            ticker.tick().await;
            reaper_handle.reap().await;
        }
    });

    handle
}

impl Hub {
    async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            match event {
                HubEvent::Register(pending) => self.handle_register(pending),
                HubEvent::Unregister(player_id) => self.handle_unregister(player_id),
                HubEvent::Incoming(player_id, message) => self.handle_incoming(player_id, message),
                HubEvent::GameFinished(game_id, result) => self.handle_game_finished(game_id, result),
                HubEvent::Recheck => self.check_vote_close(),
                HubEvent::Reap => self.handle_reap(),
                HubEvent::Shutdown => self.handle_shutdown(),
            }
        }
        tracing::warn!("hub event loop exiting: every HubHandle has been dropped");
    }

    fn handle_register(&mut self, pending: PendingPlayer) {
        let handle = PlayerHandle::new(pending.id, pending.outbound);
        handle.send(ServerMessage::Welcome(WelcomePayload {
            client_id: pending.id,
            current_games: self
                .available_games
                .iter()
                .map(|g| GameCatalogueEntry {
                    name: g.name.to_string(),
                    description: g.description.to_string(),
                })
                .collect(),
        }));
        let (display_name, avatar_ref) = crate::domain::identity_for(self.next_identity);
        self.next_identity += 1;
        let player = Player::new(pending.id, display_name, avatar_ref, handle);
        self.players.insert(pending.id, player);
        tracing::info!(player_id = pending.id, "player registered");
        self.broadcast_lobby();
    }

    fn handle_unregister(&mut self, player_id: PlayerId) {
        let Some(player) = self.players.get(&player_id) else {
            return; // idempotent: already removed
        };
        if let Location::InGame(game_id) = player.location {
            if let Some(active) = self.active_games.get(&game_id) {
                active.game.remove_player(player_id);
            }
        }
        self.votes.remove(&player_id);
        self.player_to_game.remove(&player_id);
        self.players.remove(&player_id);
        tracing::info!(player_id, "player unregistered");
        self.broadcast_lobby();
        self.check_vote_close();
    }

    fn handle_incoming(&mut self, player_id: PlayerId, message: ClientMessage) {
        let Some(location) = self.players.get(&player_id).map(|p| p.location) else {
            return; // late message from a connection already torn down
        };
        if let Location::InGame(game_id) = location {
            if let Some(active) = self.active_games.get(&game_id) {
                active.game.handle_message(player_id, message);
            }
            return;
        }
        match message {
            ClientMessage::SelectGame(SelectGamePayload { game }) => {
                if lobby::find(&game).is_none() {
                    if let Some(player) = self.players.get(&player_id) {
                        player.handle.send(ServerMessage::Error(ErrorPayload {
                            message: format!("unknown game '{game}'"),
                        }));
                    }
                    return;
                }
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.pending_vote = Some(game.clone());
                }
                self.votes.insert(player_id, game);
                self.broadcast_lobby();
                self.check_vote_close();
            }
            _ => tracing::debug!(
                player_id,
                "dropping game-addressed message from a lobby player"
            ),
        }
    }

    /// Uniform-random tally over the raw vote list (no de-duplication: a
    /// game with more voters is proportionally more likely to be picked).
    fn check_vote_close(&mut self) {
        let lobby_players: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|(_, p)| !p.in_game())
            .map(|(id, _)| *id)
            .collect();

        if lobby_players.len() < 2 {
            return;
        }
        if !lobby_players.iter().all(|id| self.votes.contains_key(id)) {
            return;
        }

        let ballot: Vec<&String> = lobby_players
            .iter()
            .filter_map(|id| self.votes.get(id))
            .collect();
        let Some(winner_name) = ballot.choose(&mut rand::thread_rng()) else {
            return;
        };
        let winner_name = (*winner_name).clone();
        let Some(descriptor) = lobby::find(&winner_name) else {
            return;
        };

        let mut participants = lobby_players;
        participants.sort_unstable();
        if participants.len() < descriptor.min_players {
            return; // not enough lobby players for this game yet; wait
        }
        if participants.len() > descriptor.max_players {
            participants.truncate(descriptor.max_players);
        }

        let game_id = self.next_game_id;
        self.next_game_id += 1;
        let game = games::instantiate(descriptor.name, game_id);

        let mut joined = Vec::new();
        for player_id in &participants {
            let Some(player) = self.players.get(player_id) else {
                continue;
            };
            match game.add_player(player.handle.clone()) {
                Ok(()) => joined.push(*player_id),
                Err(error) => {
                    tracing::warn!(
                        player_id,
                        game = descriptor.name,
                        %error,
                        "failed to add player to newly created game"
                    );
                }
            }
        }

        if joined.is_empty() {
            return;
        }

        for player_id in &joined {
            self.votes.remove(player_id);
            self.player_to_game.insert(*player_id, game_id);
            if let Some(player) = self.players.get_mut(player_id) {
                player.location = Location::InGame(game_id);
                player.pending_vote = None;
                player.handle.send(ServerMessage::GameSelected(GameSelectedPayload {
                    selected_game: descriptor.name.to_string(),
                    game_id,
                }));
            }
        }

        tracing::info!(
            game_id,
            game = descriptor.name,
            players = joined.len(),
            "game started"
        );
        let runtime = game.clone().start(self.handle.clone());
        self.active_games.insert(game_id, ActiveGame { game, runtime });
        self.broadcast_lobby();
    }

    fn handle_game_finished(&mut self, game_id: GameId, result: GameResult) {
        if self.active_games.remove(&game_id).is_none() {
            return; // already handled; a game must call this exactly once
        }
        self.suspected_dead.remove(&game_id);
        self.finish_game_bookkeeping(game_id, result);
    }

    /// A game-runtime task that exited without ever calling `game_finished`
    /// (panic, logic bug) leaves its participants stranded in
    /// `Location::InGame` forever. An active game whose `JoinHandle` reports
    /// finished on two consecutive reaper ticks is treated as dead and
    /// cleaned up with a zeroed `GameResult`; the two-tick requirement avoids
    /// racing the ordinary `GameFinished` event that the task sends as the
    /// very last thing it does before returning.
    fn handle_reap(&mut self) {
        let finished: Vec<GameId> = self
            .active_games
            .iter()
            .filter(|(_, active)| active.runtime.is_finished())
            .map(|(game_id, _)| *game_id)
            .collect();

        for game_id in finished {
            if self.suspected_dead.remove(&game_id) {
                if self.active_games.remove(&game_id).is_some() {
                    tracing::error!(
                        game_id,
                        "game runtime task exited without reporting game_finished; reaping"
                    );
                    self.finish_game_bookkeeping(game_id, GameResult::default());
                }
            } else {
                self.suspected_dead.insert(game_id);
            }
        }

        self.suspected_dead.retain(|game_id| self.active_games.contains_key(game_id));
    }

    /// Process shutdown: ask every still-active game to stop. Fire and
    /// forget -- each game's own `stop()` eventually drives one more
    /// `GameFinished` event through this same loop.
    fn handle_shutdown(&mut self) {
        tracing::info!(active_games = self.active_games.len(), "shutdown requested");
        for active in self.active_games.values() {
            active.game.stop();
        }
    }

    fn finish_game_bookkeeping(&mut self, game_id: GameId, result: GameResult) {
        let participants: Vec<PlayerId> = self
            .player_to_game
            .iter()
            .filter(|(_, gid)| **gid == game_id)
            .map(|(player_id, _)| *player_id)
            .collect();

        for player_id in participants {
            self.player_to_game.remove(&player_id);
            if let Some(player) = self.players.get_mut(&player_id) {
                player.location = Location::Lobby;
                if let Some(delta) = result.score_deltas.get(&player_id) {
                    player.cumulative_score += delta;
                }
                player.handle.send(ServerMessage::BackToLobby);
            }
        }

        tracing::info!(game_id, winner = ?result.winner, "game finished");
        self.broadcast_lobby();

        // Debounce: give ex-participants a moment to submit fresh votes
        // before the remaining lobby auto-starts another round around them.
        let handle = self.handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(VOTE_RECHECK_DELAY).await;
            handle.recheck().await;
        });
    }

    fn broadcast_lobby(&self) {
        let players: HashMap<PlayerId, LobbyPlayerView> = self
            .players
            .iter()
            .map(|(id, p)| {
                (
                    *id,
                    LobbyPlayerView {
                        score: p.cumulative_score,
                        in_game: p.in_game(),
                        selected_game: p.pending_vote.clone().unwrap_or_default(),
                        name: p.display_name.clone(),
                        avatar_url: p.avatar_ref.clone(),
                    },
                )
            })
            .collect();
        let message = ServerMessage::UpdateLobby(UpdateLobbyPayload { players });
        for player in self.players.values() {
            player.handle.send(message.clone());
        }
    }
}
