// Wire protocol: `{ "type": ..., "payload": ... }` envelopes, modeled on the
// teacher's `#[serde(tag = "type", content = "data")]` DTO pattern but
// renamed to match this system's `payload` field and its own message set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::player::PlayerId;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome(WelcomePayload),
    UpdateLobby(UpdateLobbyPayload),
    GameSelected(GameSelectedPayload),
    BackToLobby,
    Error(ErrorPayload),
    #[serde(rename = "pong_state")]
    PongState(PongStatePayload),
    #[serde(rename = "pong_game_over")]
    PongGameOver(GameOverPayload),
    #[serde(rename = "asteroids_state")]
    AsteroidsState(AsteroidsStatePayload),
    #[serde(rename = "asteroids_game_over")]
    AsteroidsGameOver(GameOverPayload),
}

/// The wire carries ids as strings even though `PlayerId`/`GameId` are
/// plain integers internally (spec.md §6: `clientId: string`, `gameId:
/// string`); this is the `serialize_with` that bridges the two.
fn id_as_string<S, T>(id: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: std::fmt::Display,
{
    serializer.collect_str(id)
}

#[derive(Debug, Clone, Serialize)]
pub struct GameCatalogueEntry {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    #[serde(serialize_with = "id_as_string")]
    pub client_id: PlayerId,
    pub current_games: Vec<GameCatalogueEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayerView {
    pub score: i64,
    pub in_game: bool,
    pub selected_game: String,
    pub name: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateLobbyPayload {
    pub players: HashMap<PlayerId, LobbyPlayerView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSelectedPayload {
    pub selected_game: String,
    #[serde(serialize_with = "id_as_string")]
    pub game_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PongStatePayload {
    pub ball_x: f32,
    pub ball_y: f32,
    pub paddle_1_y: f32,
    pub paddle_2_y: f32,
    pub score_1: u32,
    pub score_2: u32,
    pub player_1: PlayerId,
    pub player_2: PlayerId,
}

#[derive(Debug, Clone, Serialize)]
pub struct AsteroidPayload {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub size: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectilePayload {
    pub id: u64,
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AsteroidsPlayerView {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    pub health: i32,
    pub alive: bool,
    pub is_invincible: bool,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AsteroidsStatePayload {
    pub players: HashMap<PlayerId, AsteroidsPlayerView>,
    pub asteroids: Vec<AsteroidPayload>,
    pub projectiles: Vec<ProjectilePayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameOverPayload {
    pub winner: Option<PlayerId>,
    pub scores: HashMap<PlayerId, i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AsteroidsInputPayload {
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub shoot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectGamePayload {
    pub game: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PongInputPayload {
    pub direction: Option<Direction>,
}

/// Inbound envelope. Decoding is tolerant of unknown `type` values (caught by
/// a fallback at the call site, not here) but strict on the `{type,
/// payload}` shape itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    SelectGame(SelectGamePayload),
    #[serde(rename = "pong_input")]
    PongInput(PongInputPayload),
    #[serde(rename = "asteroids_input")]
    AsteroidsInput(AsteroidsInputPayload),
}

impl ClientMessage {
    /// The closed set of `type` values this server understands. Used by the
    /// Connection to tell an unrecognized-but-structurally-valid `type`
    /// (logged and dropped, per spec.md §4.1) apart from a frame missing
    /// `type` entirely (a protocol violation that closes the connection).
    pub const KNOWN_TYPES: &'static [&'static str] =
        &["select_game", "pong_input", "asteroids_input"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_game_round_trips_through_json() {
        let raw = r#"{"type":"select_game","payload":{"game":"pong"}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).expect("valid envelope");
        match msg {
            ClientMessage::SelectGame(p) => assert_eq!(p.game, "pong"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn asteroids_input_defaults_missing_fields_to_false() {
        let raw = r#"{"type":"asteroids_input","payload":{"left":true}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).expect("valid envelope");
        match msg {
            ClientMessage::AsteroidsInput(p) => {
                assert!(p.left);
                assert!(!p.right);
                assert!(!p.up);
                assert!(!p.shoot);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn server_message_serializes_with_type_and_payload_fields() {
        let msg = ServerMessage::Error(ErrorPayload {
            message: "bad game name".into(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"]["message"], "bad game name");
    }

    #[test]
    fn malformed_envelope_missing_type_fails_to_parse() {
        let raw = r#"{"payload":{"game":"pong"}}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }
}
