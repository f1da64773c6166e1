// Domain layer: core types shared by the Hub and every Game implementation.

pub mod game;
pub mod lobby;
pub mod player;

pub use game::{AddPlayerError, Game, GameResult};
pub use lobby::GameDescriptor;
pub use player::{identity_for, GameId, Location, Player, PlayerHandle, PlayerId};
