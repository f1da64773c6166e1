// Reference two-player Pong. Tick-loop shape grounded in the teacher's
// `use_cases/game.rs::world_task` (fixed ticker driven by `tokio::select!`
// over a stop signal and the interval); field naming grounded in
// `examples/other_examples/66eda010_arcnid-pong-mqtt__src-network.rs.rs`
// (`p1_score`/`p2_score`, ball `x`/`y`/`vx`/`vy`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Notify;
use tokio::time::interval;

use crate::domain::game::{AddPlayerError, Game, GameResult};
use crate::domain::player::{GameId, PlayerHandle, PlayerId};
use crate::interface_adapters::protocol::{
    ClientMessage, Direction, GameOverPayload, PongStatePayload, ServerMessage,
};
use crate::use_cases::hub::HubHandle;

const WIDTH: f32 = 800.0;
const HEIGHT: f32 = 600.0;
const PADDLE_HEIGHT: f32 = 80.0;
const PADDLE_SPEED: f32 = 300.0; // units/sec
const PADDLE_X_MARGIN: f32 = 30.0;
const BALL_RADIUS: f32 = 8.0;
const BASE_BALL_SPEED: f32 = 260.0; // units/sec
const SPEEDUP_FACTOR: f32 = 1.05;
const MAX_BALL_SPEED: f32 = 640.0;
const TARGET_SCORE: u32 = 5;
const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);

struct Slot {
    handle: PlayerHandle,
    input: Option<Direction>,
}

struct PongState {
    ball_x: f32,
    ball_y: f32,
    ball_vx: f32,
    ball_vy: f32,
    paddle1_y: f32,
    paddle2_y: f32,
    score1: u32,
    score2: u32,
    slots: [Option<Slot>; 2],
    finished: bool,
}

impl PongState {
    fn new() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            ball_x: WIDTH / 2.0,
            ball_y: HEIGHT / 2.0,
            ball_vx: random_serve(&mut rng),
            ball_vy: rng.gen_range(-0.4..0.4) * BASE_BALL_SPEED,
            paddle1_y: HEIGHT / 2.0,
            paddle2_y: HEIGHT / 2.0,
            score1: 0,
            score2: 0,
            slots: [None, None],
            finished: false,
        }
    }
}

fn random_serve(rng: &mut impl Rng) -> f32 {
    if rng.gen_bool(0.5) { BASE_BALL_SPEED } else { -BASE_BALL_SPEED }
}

pub struct Pong {
    id: GameId,
    state: Mutex<PongState>,
    stop: Arc<Notify>,
}

impl Pong {
    pub fn new(id: GameId) -> Self {
        Self {
            id,
            state: Mutex::new(PongState::new()),
            stop: Arc::new(Notify::new()),
        }
    }

    fn tick(&self, dt: f32) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.finished {
            return true;
        }

        for idx in 0..2 {
            let delta = match state.slots[idx].as_ref().and_then(|s| s.input.clone()) {
                Some(Direction::Up) => -PADDLE_SPEED * dt,
                Some(Direction::Down) => PADDLE_SPEED * dt,
                None => 0.0,
            };
            let y = if idx == 0 { &mut state.paddle1_y } else { &mut state.paddle2_y };
            *y = (*y + delta).clamp(PADDLE_HEIGHT / 2.0, HEIGHT - PADDLE_HEIGHT / 2.0);
        }

        state.ball_x += state.ball_vx * dt;
        state.ball_y += state.ball_vy * dt;

        if state.ball_y <= BALL_RADIUS || state.ball_y >= HEIGHT - BALL_RADIUS {
            state.ball_vy = -state.ball_vy;
            state.ball_y = state.ball_y.clamp(BALL_RADIUS, HEIGHT - BALL_RADIUS);
        }

        let left_x = PADDLE_X_MARGIN;
        let right_x = WIDTH - PADDLE_X_MARGIN;
        if state.ball_vx < 0.0
            && state.ball_x <= left_x + BALL_RADIUS
            && (state.ball_y - state.paddle1_y).abs() <= PADDLE_HEIGHT / 2.0
        {
            state.ball_vx = (-state.ball_vx * SPEEDUP_FACTOR).min(MAX_BALL_SPEED);
            state.ball_x = left_x + BALL_RADIUS;
        } else if state.ball_vx > 0.0
            && state.ball_x >= right_x - BALL_RADIUS
            && (state.ball_y - state.paddle2_y).abs() <= PADDLE_HEIGHT / 2.0
        {
            state.ball_vx = -(state.ball_vx * SPEEDUP_FACTOR).min(MAX_BALL_SPEED);
            state.ball_x = right_x - BALL_RADIUS;
        }

        let mut scored = false;
        if state.ball_x < 0.0 {
            state.score2 += 1;
            scored = true;
        } else if state.ball_x > WIDTH {
            state.score1 += 1;
            scored = true;
        }
        if scored {
            let mut rng = rand::thread_rng();
            state.ball_x = WIDTH / 2.0;
            state.ball_y = HEIGHT / 2.0;
            state.ball_vx = random_serve(&mut rng);
            state.ball_vy = rng.gen_range(-0.4..0.4) * BASE_BALL_SPEED;
        }

        // A point is only ever awarded once per tick against a single ball
        // position, so both players reaching TARGET_SCORE on the same tick
        // cannot happen; no tie-break is needed (see DESIGN.md).
        let finished = state.score1 >= TARGET_SCORE || state.score2 >= TARGET_SCORE;
        if finished {
            state.finished = true;
        }

        broadcast(&state);
        finished
    }

    async fn finish(&self, hub: HubHandle) {
        let (winner, score_deltas) = {
            let mut state = self.state.lock().unwrap();
            state.finished = true;

            let mut score_deltas = HashMap::new();
            if let Some(slot) = &state.slots[0] {
                score_deltas.insert(slot.handle.id(), if state.score1 > state.score2 { 1 } else { 0 });
            }
            if let Some(slot) = &state.slots[1] {
                score_deltas.insert(slot.handle.id(), if state.score2 > state.score1 { 1 } else { 0 });
            }
            let winner = if state.score1 != state.score2 {
                let winning_slot = if state.score1 > state.score2 { 0 } else { 1 };
                state.slots[winning_slot].as_ref().map(|s| s.handle.id())
            } else {
                None
            };

            let message = ServerMessage::PongGameOver(GameOverPayload {
                winner,
                scores: score_deltas.clone(),
            });
            for slot in state.slots.iter().flatten() {
                slot.handle.send(message.clone());
            }

            (winner, score_deltas)
        };

        hub.game_finished(self.id, GameResult { winner, score_deltas }).await;
    }
}

fn broadcast(state: &PongState) {
    let player_1 = state.slots[0].as_ref().map(|s| s.handle.id()).unwrap_or(0);
    let player_2 = state.slots[1].as_ref().map(|s| s.handle.id()).unwrap_or(0);
    let message = ServerMessage::PongState(PongStatePayload {
        ball_x: state.ball_x,
        ball_y: state.ball_y,
        paddle_1_y: state.paddle1_y,
        paddle_2_y: state.paddle2_y,
        score_1: state.score1,
        score_2: state.score2,
        player_1,
        player_2,
    });
    for slot in state.slots.iter().flatten() {
        slot.handle.send(message.clone());
    }
}

impl Game for Pong {
    fn id(&self) -> GameId {
        self.id
    }

    fn name(&self) -> &'static str {
        "pong"
    }

    fn add_player(&self, player: PlayerHandle) -> Result<(), AddPlayerError> {
        let mut state = self.state.lock().unwrap();
        for slot in state.slots.iter() {
            if matches!(slot, Some(s) if s.handle.id() == player.id()) {
                return Err(AddPlayerError::Duplicate);
            }
        }
        for slot in state.slots.iter_mut() {
            if slot.is_none() {
                *slot = Some(Slot { handle: player, input: None });
                return Ok(());
            }
        }
        Err(AddPlayerError::Full)
    }

    fn remove_player(&self, player_id: PlayerId) {
        let remaining = {
            let mut state = self.state.lock().unwrap();
            for slot in state.slots.iter_mut() {
                if matches!(slot, Some(s) if s.handle.id() == player_id) {
                    *slot = None;
                }
            }
            state.slots.iter().filter(|s| s.is_some()).count()
        };
        if remaining < 2 {
            self.stop.notify_waiters();
        }
    }

    fn handle_message(&self, player_id: PlayerId, message: ClientMessage) {
        if let ClientMessage::PongInput(payload) = message {
            let mut state = self.state.lock().unwrap();
            for slot in state.slots.iter_mut().flatten() {
                if slot.handle.id() == player_id {
                    slot.input = payload.direction.clone();
                }
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

    fn handle_pair() -> ((PlayerHandle, tokio::sync::mpsc::Receiver<ServerMessage>), (PlayerHandle, tokio::sync::mpsc::Receiver<ServerMessage>)) {
        let (tx1, rx1) = tokio::sync::mpsc::channel(16);
        let (tx2, rx2) = tokio::sync::mpsc::channel(16);
        ((PlayerHandle::new(1, tx1), rx1), (PlayerHandle::new(2, tx2), rx2))
    }

    #[test]
    fn add_player_fills_slots_then_rejects() {
        let pong = Pong::new(1);
        let ((h1, _r1), (h2, _r2)) = handle_pair();
        assert!(pong.add_player(h1.clone()).is_ok());
        assert!(pong.add_player(h2).is_ok());
        let (tx3, _rx3) = tokio::sync::mpsc::channel(16);
        let h3 = PlayerHandle::new(3, tx3);
        assert!(matches!(pong.add_player(h3), Err(AddPlayerError::Full)));
        assert!(matches!(pong.add_player(h1), Err(AddPlayerError::Duplicate)));
    }

    #[test]
    fn paddle_moves_up_and_stays_clamped() {
        let pong = Pong::new(1);
        let ((h1, _r1), (h2, _r2)) = handle_pair();
        pong.add_player(h1.clone()).unwrap();
        pong.add_player(h2).unwrap();
        pong.handle_message(h1.id(), ClientMessage::PongInput(crate::interface_adapters::protocol::PongInputPayload {
            direction: Some(Direction::Up),
        }));
        for _ in 0..1000 {
            pong.tick(1.0 / 60.0);
        }
        let state = pong.state.lock().unwrap();
        assert!(state.paddle1_y >= PADDLE_HEIGHT / 2.0);
    }

    #[test]
    fn losing_a_player_ends_the_game_below_minimum() {
        let pong = Pong::new(1);
        let ((h1, _r1), (h2, _r2)) = handle_pair();
        pong.add_player(h1.clone()).unwrap();
        pong.add_player(h2).unwrap();
        pong.remove_player(h1.id());
        // Below the 2-player minimum: the stop notify should have fired.
        // We can't easily observe the Notify directly, but a second
        // remove_player call must stay a no-op (idempotence).
        pong.remove_player(h1.id());
    }
}
