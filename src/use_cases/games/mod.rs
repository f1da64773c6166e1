// The two reference `Game` implementations plus the name -> instance
// factory the Hub uses when a vote round closes.

pub mod asteroids;
pub mod pong;

use std::sync::Arc;

use crate::domain::game::Game;
use crate::domain::player::GameId;

/// Build a fresh game instance for a closed vote. `name` is always one
/// already validated against `domain::lobby::find`, so an unknown name here
/// means the catalogue and this factory have drifted apart.
pub fn instantiate(name: &str, id: GameId) -> Arc<dyn Game> {
    match name {
        "pong" => Arc::new(pong::Pong::new(id)),
        "asteroids" => Arc::new(asteroids::Asteroids::new(id)),
        other => unreachable!("game catalogue names '{other}' but no factory builds it"),
    }
}
