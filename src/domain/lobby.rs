// Static catalogue of games the lobby can offer a vote on.

#[derive(Debug, Clone, Copy)]
pub struct GameDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub min_players: usize,
    pub max_players: usize,
}

pub const PONG: GameDescriptor = GameDescriptor {
    name: "pong",
    description: "Two-player paddle and ball",
    min_players: 2,
    max_players: 2,
};

pub const ASTEROIDS: GameDescriptor = GameDescriptor {
    name: "asteroids",
    description: "Free-for-all asteroid shooter, 2-4 players",
    min_players: 2,
    max_players: 4,
};

pub fn catalogue() -> Vec<GameDescriptor> {
    vec![PONG, ASTEROIDS]
}

pub fn find(name: &str) -> Option<GameDescriptor> {
    catalogue().into_iter().find(|g| g.name == name)
}
