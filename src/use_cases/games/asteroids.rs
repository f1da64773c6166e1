// Reference N-player (2-4) Asteroids. Spawn/integrate/collide/despawn shape
// grounded in the teacher's `systems/projectiles.rs::tick_projectiles`
// (naive O(P*E) collision sweep, cooldown-gated spawn, ttl-based despawn)
// and `domain/state.rs::{SimEntity, SimProjectile}` field sets, generalized
// to a toroidal multi-player world with size-class splitting asteroids.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Notify;
use tokio::time::interval;

use crate::domain::game::{AddPlayerError, Game, GameResult};
use crate::domain::player::{GameId, PlayerHandle, PlayerId};
use crate::interface_adapters::protocol::{
    AsteroidPayload, AsteroidsInputPayload, AsteroidsPlayerView, AsteroidsStatePayload,
    ClientMessage, GameOverPayload, ProjectilePayload, ServerMessage,
};
use crate::use_cases::hub::HubHandle;

const WORLD_SIZE: f32 = 1000.0;
const MAX_PLAYERS: usize = 4;
const MIN_PLAYERS: usize = 2;
const PLAYER_SPEED: f32 = 160.0;
const TURN_SPEED: f32 = 3.0; // radians/sec
const PLAYER_RADIUS: f32 = 18.0;
const MAX_HEALTH: i32 = 3;
const INVINCIBLE_DURATION: f32 = 2.0;
const PROJECTILE_SPEED: f32 = 420.0;
const PROJECTILE_TTL: f32 = 1.5;
const SHOOT_COOLDOWN: f32 = 0.35;
const INITIAL_ASTEROID_COUNT: usize = 6;
const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);

const ASTEROID_POINTS_LARGE: i64 = 20;
const ASTEROID_POINTS_MEDIUM: i64 = 50;
const ASTEROID_POINTS_SMALL: i64 = 100;

#[derive(Clone, Copy, PartialEq, Eq)]
enum AsteroidSize {
    Large,
    Medium,
    Small,
}

impl AsteroidSize {
    fn radius(self) -> f32 {
        match self {
            AsteroidSize::Large => 40.0,
            AsteroidSize::Medium => 22.0,
            AsteroidSize::Small => 12.0,
        }
    }

    fn points(self) -> i64 {
        match self {
            AsteroidSize::Large => ASTEROID_POINTS_LARGE,
            AsteroidSize::Medium => ASTEROID_POINTS_MEDIUM,
            AsteroidSize::Small => ASTEROID_POINTS_SMALL,
        }
    }

    fn split(self) -> Option<AsteroidSize> {
        match self {
            AsteroidSize::Large => Some(AsteroidSize::Medium),
            AsteroidSize::Medium => Some(AsteroidSize::Small),
            AsteroidSize::Small => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            AsteroidSize::Large => "large",
            AsteroidSize::Medium => "medium",
            AsteroidSize::Small => "small",
        }
    }
}

struct Asteroid {
    id: u64,
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    size: AsteroidSize,
}

struct Projectile {
    id: u64,
    owner: PlayerId,
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    ttl: f32,
}

struct PlayerSlot {
    handle: Option<PlayerHandle>,
    x: f32,
    y: f32,
    heading: f32,
    health: i32,
    alive: bool,
    connected: bool,
    invincible_for: f32,
    shoot_cooldown: f32,
    input: AsteroidsInputPayload,
    score: i64,
}

impl PlayerSlot {
    fn spawn(handle: PlayerHandle, x: f32, y: f32) -> Self {
        Self {
            handle: Some(handle),
            x,
            y,
            heading: 0.0,
            health: MAX_HEALTH,
            alive: true,
            connected: true,
            invincible_for: INVINCIBLE_DURATION,
            shoot_cooldown: 0.0,
            input: AsteroidsInputPayload::default(),
            score: 0,
        }
    }
}

struct AsteroidsWorld {
    players: HashMap<PlayerId, PlayerSlot>,
    asteroids: Vec<Asteroid>,
    projectiles: Vec<Projectile>,
    next_entity_id: u64,
    started_with: usize,
    started: bool,
    finished: bool,
}

impl AsteroidsWorld {
    fn new() -> Self {
        Self {
            players: HashMap::new(),
            asteroids: Vec::new(),
            projectiles: Vec::new(),
            next_entity_id: 1,
            started_with: 0,
            started: false,
            finished: false,
        }
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    fn seed_asteroids(&mut self, rng: &mut impl Rng) {
        for _ in 0..INITIAL_ASTEROID_COUNT {
            self.spawn_asteroid(rng, AsteroidSize::Large, None);
        }
    }

    fn spawn_asteroid(&mut self, rng: &mut impl Rng, size: AsteroidSize, near: Option<(f32, f32)>) {
        let (x, y) = near.unwrap_or_else(|| (rng.gen_range(0.0..WORLD_SIZE), rng.gen_range(0.0..WORLD_SIZE)));
        let angle: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
        let speed = rng.gen_range(20.0..70.0);
        let id = self.fresh_id();
        self.asteroids.push(Asteroid {
            id,
            x,
            y,
            vx: angle.cos() * speed,
            vy: angle.sin() * speed,
            size,
        });
    }
}

fn wrap(v: f32, max: f32) -> f32 {
    if v < 0.0 {
        v + max
    } else if v >= max {
        v - max
    } else {
        v
    }
}

fn distance(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
}

pub struct Asteroids {
    id: GameId,
    state: Mutex<AsteroidsWorld>,
    stop: Arc<Notify>,
}

impl Asteroids {
    pub fn new(id: GameId) -> Self {
        Self {
            id,
            state: Mutex::new(AsteroidsWorld::new()),
            stop: Arc::new(Notify::new()),
        }
    }

    fn tick(&self, dt: f32) -> bool {
        let mut rng = rand::thread_rng();
        let mut world = self.state.lock().unwrap();
        if world.finished {
            return true;
        }
        if !world.started {
            world.started = true;
            world.started_with = world.players.values().filter(|p| p.connected).count();
            world.seed_asteroids(&mut rng);
        }

        // Player movement and shooting.
        let mut spawns: Vec<(PlayerId, f32, f32, f32)> = Vec::new();
        for slot in world.players.values_mut() {
            if !slot.alive || !slot.connected {
                continue;
            }
            slot.invincible_for = (slot.invincible_for - dt).max(0.0);
            slot.shoot_cooldown = (slot.shoot_cooldown - dt).max(0.0);

            let turn = (slot.input.right as i32 - slot.input.left as i32) as f32;
            slot.heading += turn * TURN_SPEED * dt;

            if slot.input.up {
                slot.x = wrap(slot.x + slot.heading.cos() * PLAYER_SPEED * dt, WORLD_SIZE);
                slot.y = wrap(slot.y + slot.heading.sin() * PLAYER_SPEED * dt, WORLD_SIZE);
            }

            if slot.input.shoot && slot.shoot_cooldown <= 0.0 {
                slot.shoot_cooldown = SHOOT_COOLDOWN;
                if let Some(handle) = &slot.handle {
                    spawns.push((handle.id(), slot.x, slot.y, slot.heading));
                }
            }
        }
        for (owner, x, y, heading) in spawns {
            let id = world.fresh_id();
            world.projectiles.push(Projectile {
                id,
                owner,
                x,
                y,
                vx: heading.cos() * PROJECTILE_SPEED,
                vy: heading.sin() * PROJECTILE_SPEED,
                ttl: PROJECTILE_TTL,
            });
        }

        // Asteroid drift.
        for asteroid in world.asteroids.iter_mut() {
            asteroid.x = wrap(asteroid.x + asteroid.vx * dt, WORLD_SIZE);
            asteroid.y = wrap(asteroid.y + asteroid.vy * dt, WORLD_SIZE);
        }

        // Projectile integration and expiry.
        for projectile in world.projectiles.iter_mut() {
            projectile.x = wrap(projectile.x + projectile.vx * dt, WORLD_SIZE);
            projectile.y = wrap(projectile.y + projectile.vy * dt, WORLD_SIZE);
            projectile.ttl -= dt;
        }
        world.projectiles.retain(|p| p.ttl > 0.0);

        // Projectile vs asteroid collisions.
        let mut hit_asteroids: Vec<usize> = Vec::new();
        let mut hit_projectiles: Vec<usize> = Vec::new();
        let mut awards: Vec<(PlayerId, i64)> = Vec::new();
        let mut spawn_children: Vec<(AsteroidSize, f32, f32)> = Vec::new();

        for (ai, asteroid) in world.asteroids.iter().enumerate() {
            if hit_asteroids.contains(&ai) {
                continue;
            }
            for (pi, projectile) in world.projectiles.iter().enumerate() {
                if hit_projectiles.contains(&pi) {
                    continue;
                }
                if distance(asteroid.x, asteroid.y, projectile.x, projectile.y) <= asteroid.size.radius() {
                    hit_asteroids.push(ai);
                    hit_projectiles.push(pi);
                    awards.push((projectile.owner, asteroid.size.points()));
                    if let Some(child) = asteroid.size.split() {
                        spawn_children.push((child, asteroid.x, asteroid.y));
                        spawn_children.push((child, asteroid.x, asteroid.y));
                    }
                    break;
                }
            }
        }
        hit_asteroids.sort_unstable();
        for &ai in hit_asteroids.iter().rev() {
            world.asteroids.remove(ai);
        }
        hit_projectiles.sort_unstable();
        for &pi in hit_projectiles.iter().rev() {
            world.projectiles.remove(pi);
        }
        for (owner, points) in awards {
            if let Some(slot) = world.players.get_mut(&owner) {
                slot.score += points;
            }
        }
        for (size, x, y) in spawn_children {
            let angle: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
            let speed = rng.gen_range(30.0..90.0);
            let id = world.fresh_id();
            world.asteroids.push(Asteroid {
                id,
                x,
                y,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                size,
            });
        }

        // Player vs asteroid collisions.
        let player_ids: Vec<PlayerId> = world.players.keys().copied().collect();
        for player_id in player_ids {
            let (px, py, invincible, alive, connected) = {
                let slot = &world.players[&player_id];
                (slot.x, slot.y, slot.invincible_for > 0.0, slot.alive, slot.connected)
            };
            if !alive || !connected || invincible {
                continue;
            }
            let hit = world
                .asteroids
                .iter()
                .any(|a| distance(a.x, a.y, px, py) <= a.size.radius() + PLAYER_RADIUS);
            if hit {
                let slot = world.players.get_mut(&player_id).unwrap();
                slot.health -= 1;
                if slot.health <= 0 {
                    slot.alive = false;
                } else {
                    slot.x = WORLD_SIZE / 2.0;
                    slot.y = WORLD_SIZE / 2.0;
                    slot.invincible_for = INVINCIBLE_DURATION;
                }
            }
        }

        // Replenish asteroids when the field thins out.
        if world.asteroids.len() < INITIAL_ASTEROID_COUNT / 2 {
            world.spawn_asteroid(&mut rng, AsteroidSize::Large, None);
        }

        let alive_count = world
            .players
            .values()
            .filter(|p| p.alive && p.connected)
            .count();
        let finished = world.started_with >= MIN_PLAYERS && alive_count <= 1;
        if finished {
            world.finished = true;
        }

        broadcast(&world);
        finished
    }

    async fn finish(&self, hub: HubHandle) {
        let (winner, score_deltas) = {
            let mut world = self.state.lock().unwrap();
            world.finished = true;

            let score_deltas: HashMap<PlayerId, i64> =
                world.players.iter().map(|(id, slot)| (*id, slot.score)).collect();

            let alive: Vec<PlayerId> = world
                .players
                .iter()
                .filter(|(_, p)| p.alive && p.connected)
                .map(|(id, _)| *id)
                .collect();
            let winner = if alive.len() == 1 {
                Some(alive[0])
            } else {
                let top_score = score_deltas.values().copied().max();
                top_score.and_then(|top| {
                    let mut leaders = score_deltas.iter().filter(|(_, score)| **score == top);
                    let leader = leaders.next().map(|(id, _)| *id);
                    if leaders.next().is_some() {
                        None
                    } else {
                        leader
                    }
                })
            };

            let message = ServerMessage::AsteroidsGameOver(GameOverPayload {
                winner,
                scores: score_deltas.clone(),
            });
            for slot in world.players.values() {
                if let Some(handle) = &slot.handle {
                    handle.send(message.clone());
                }
            }

            (winner, score_deltas)
        };

        hub.game_finished(self.id, GameResult { winner, score_deltas }).await;
    }
}

fn broadcast(world: &AsteroidsWorld) {
    let players: HashMap<PlayerId, AsteroidsPlayerView> = world
        .players
        .iter()
        .map(|(id, slot)| {
            (
                *id,
                AsteroidsPlayerView {
                    x: slot.x,
                    y: slot.y,
                    heading: slot.heading,
                    health: slot.health,
                    alive: slot.alive,
                    is_invincible: slot.invincible_for > 0.0,
                    score: slot.score,
                },
            )
        })
        .collect();
    let asteroids = world
        .asteroids
        .iter()
        .map(|a| AsteroidPayload {
            id: a.id,
            x: a.x,
            y: a.y,
            size: a.size.label().to_string(),
        })
        .collect();
    let projectiles = world
        .projectiles
        .iter()
        .map(|p| ProjectilePayload {
            id: p.id,
            owner: p.owner,
            x: p.x,
            y: p.y,
        })
        .collect();
    let message = ServerMessage::AsteroidsState(AsteroidsStatePayload {
        players,
        asteroids,
        projectiles,
    });
    for slot in world.players.values() {
        if let Some(handle) = &slot.handle {
            handle.send(message.clone());
        }
    }
}

impl Game for Asteroids {
    fn id(&self) -> GameId {
        self.id
    }

    fn name(&self) -> &'static str {
        "asteroids"
    }

    fn add_player(&self, player: PlayerHandle) -> Result<(), AddPlayerError> {
        let mut world = self.state.lock().unwrap();
        if world.players.contains_key(&player.id()) {
            return Err(AddPlayerError::Duplicate);
        }
        if world.players.len() >= MAX_PLAYERS {
            return Err(AddPlayerError::Full);
        }
        let mut rng = rand::thread_rng();
        let x = rng.gen_range(WORLD_SIZE * 0.25..WORLD_SIZE * 0.75);
        let y = rng.gen_range(WORLD_SIZE * 0.25..WORLD_SIZE * 0.75);
        world.players.insert(player.id(), PlayerSlot::spawn(player, x, y));
        Ok(())
    }

    fn remove_player(&self, player_id: PlayerId) {
        let alive_count = {
            let mut world = self.state.lock().unwrap();
            if let Some(slot) = world.players.get_mut(&player_id) {
                slot.connected = false;
                slot.alive = false;
                slot.handle = None;
            }
            world
                .players
                .values()
                .filter(|p| p.alive && p.connected)
                .count()
        };
        if alive_count <= 1 {
            self.stop.notify_waiters();
        }
    }

    fn handle_message(&self, player_id: PlayerId, message: ClientMessage) {
        if let ClientMessage::AsteroidsInput(payload) = message {
            let mut world = self.state.lock().unwrap();
            if let Some(slot) = world.players.get_mut(&player_id) {
                slot.input = payload;
            }
        }
    }

    fn start(self: Arc<Self>, hub: HubHandle) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(TICK_INTERVAL);
            let mut last = Instant::now();
            loop {
                tokio::select! {
                    _ = self.stop.notified() => break,
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let dt = (now - last).as_secs_f32().max(0.0001);
                        last = now;
                        if self.tick(dt) {
                            break;
                        }
                    }
                }
            }
            self.finish(hub).await;
        })
    }

    fn stop(&self) {
        self.stop.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_handle(id: PlayerId) -> (PlayerHandle, tokio::sync::mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        (PlayerHandle::new(id, tx), rx)
    }

    #[test]
    fn add_player_rejects_fifth_and_duplicate() {
        let game = Asteroids::new(1);
        for i in 1..=4 {
            let (h, _rx) = new_handle(i);
            assert!(game.add_player(h).is_ok());
        }
        let (h5, _rx) = new_handle(5);
        assert!(matches!(game.add_player(h5), Err(AddPlayerError::Full)));
        let (h1, _rx) = new_handle(1);
        assert!(matches!(game.add_player(h1), Err(AddPlayerError::Duplicate)));
    }

    #[test]
    fn asteroid_split_awards_points_and_produces_two_children() {
        let mut world = AsteroidsWorld::new();
        let mut rng = rand::thread_rng();
        let (h1, _rx) = new_handle(1);
        world.players.insert(1, PlayerSlot::spawn(h1, 500.0, 500.0));
        world.started = true;
        world.started_with = 2;
        let id = world.fresh_id();
        world.asteroids.push(Asteroid {
            id,
            x: 500.0,
            y: 500.0,
            vx: 0.0,
            vy: 0.0,
            size: AsteroidSize::Large,
        });
        let pid = world.fresh_id();
        world.projectiles.push(Projectile {
            id: pid,
            owner: 1,
            x: 500.0,
            y: 500.0,
            vx: 0.0,
            vy: 0.0,
            ttl: 1.0,
        });
        let _ = &mut rng;
        let game = Asteroids {
            id: 1,
            state: Mutex::new(world),
            stop: Arc::new(Notify::new()),
        };
        game.tick(0.016);
        let state = game.state.lock().unwrap();
        assert_eq!(state.asteroids.len(), 2);
        assert!(state.asteroids.iter().all(|a| a.size == AsteroidSize::Medium));
        assert_eq!(state.players[&1].score, ASTEROID_POINTS_LARGE);
    }
}
