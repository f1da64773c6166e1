mod support;

use serde_json::json;

// S1: a fresh connection receives a `welcome` naming both reference games,
// then an `update_lobby` that places it in the lobby with a zero score.
#[tokio::test]
async fn welcome_then_lobby_update_on_connect() {
    let mut client = support::connect().await;

    let welcome = support::recv_json(&mut client).await;
    assert_eq!(welcome["type"], "welcome");
    let games: Vec<String> = welcome["payload"]["currentGames"]
        .as_array()
        .expect("currentGames is an array")
        .iter()
        .map(|g| g["name"].as_str().unwrap().to_string())
        .collect();
    assert!(games.contains(&"pong".to_string()));
    assert!(games.contains(&"asteroids".to_string()));

    let client_id = welcome["payload"]["clientId"].as_str().expect("clientId").to_string();

    let lobby_update = support::recv_json(&mut client).await;
    assert_eq!(lobby_update["type"], "update_lobby");
    let player_entry = &lobby_update["payload"]["players"][client_id];
    assert_eq!(player_entry["score"], 0);
    assert_eq!(player_entry["inGame"], false);
}

// S5: selecting a game name outside the catalogue yields an `error` frame
// and does not otherwise disturb lobby state.
#[tokio::test]
async fn selecting_unknown_game_returns_error() {
    let mut client = support::connect().await;
    let _welcome = support::recv_json(&mut client).await;
    let _lobby_update = support::recv_json(&mut client).await;

    support::send_json(&mut client, &json!({"type": "select_game", "payload": {"game": "tetris"}})).await;

    let response = support::recv_json(&mut client).await;
    assert_eq!(response["type"], "error");
    assert!(response["payload"]["message"].as_str().unwrap().len() > 0);
}

// S2: two players voting for the same game both get routed into it and
// start receiving that game's state frames.
#[tokio::test]
async fn two_players_voting_pong_both_start_the_game() {
    let mut a = support::connect().await;
    let mut b = support::connect().await;

    let _ = support::recv_json(&mut a).await; // welcome
    let _ = support::recv_json(&mut a).await; // update_lobby (a only)
    let _ = support::recv_json(&mut b).await; // welcome
    // `b`'s connect fans out a second update_lobby to `a` too; drain it.
    let _ = support::recv_json(&mut a).await;
    let _ = support::recv_json(&mut b).await; // update_lobby (a+b)

    support::send_json(&mut a, &json!({"type": "select_game", "payload": {"game": "pong"}})).await;
    let _ = support::recv_json(&mut a).await; // update_lobby reflecting a's vote
    let _ = support::recv_json(&mut b).await; // same broadcast reaches b

    support::send_json(&mut b, &json!({"type": "select_game", "payload": {"game": "pong"}})).await;

    // Both should see a `game_selected` for "pong" (possibly preceded by one
    // more `update_lobby` broadcast before the vote closes).
    let mut saw_game_selected_a = false;
    for _ in 0..3 {
        let msg = support::recv_json(&mut a).await;
        if msg["type"] == "game_selected" {
            assert_eq!(msg["payload"]["selectedGame"], "pong");
            saw_game_selected_a = true;
            break;
        }
    }
    assert!(saw_game_selected_a, "player a should be routed into pong");

    let mut saw_game_selected_b = false;
    for _ in 0..3 {
        let msg = support::recv_json(&mut b).await;
        if msg["type"] == "game_selected" {
            assert_eq!(msg["payload"]["selectedGame"], "pong");
            saw_game_selected_b = true;
            break;
        }
    }
    assert!(saw_game_selected_b, "player b should be routed into pong");

    // The game runtime should follow up with periodic state frames.
    let mut saw_state = false;
    for _ in 0..5 {
        let msg = support::recv_json(&mut a).await;
        if msg["type"] == "pong_state" {
            saw_state = true;
            break;
        }
    }
    assert!(saw_state, "player a should receive pong_state frames");
}

// S4: one participant's transport drops mid-game; the remaining player gets
// `back_to_lobby` and the next `update_lobby` shows them alone, not in-game.
#[tokio::test]
async fn disconnect_mid_game_returns_survivor_to_lobby() {
    let mut a = support::connect().await;
    let mut b = support::connect().await;

    let _ = support::recv_json(&mut a).await; // welcome (a)
    let _ = support::recv_json(&mut a).await; // update_lobby (a only)
    let _ = support::recv_json(&mut b).await; // welcome (b)
    let _ = support::recv_json(&mut a).await; // update_lobby (a+b)
    let _ = support::recv_json(&mut b).await; // update_lobby (a+b)

    support::send_json(&mut a, &json!({"type": "select_game", "payload": {"game": "pong"}})).await;
    let _ = support::recv_json(&mut a).await; // update_lobby reflecting a's vote
    let _ = support::recv_json(&mut b).await;

    support::send_json(&mut b, &json!({"type": "select_game", "payload": {"game": "pong"}})).await;

    // Drain both streams until each has seen its own `game_selected`.
    for _ in 0..4 {
        let msg = support::recv_json(&mut a).await;
        if msg["type"] == "game_selected" {
            break;
        }
    }
    for _ in 0..4 {
        let msg = support::recv_json(&mut b).await;
        if msg["type"] == "game_selected" {
            break;
        }
    }

    // Dropping the stream closes the underlying TCP connection, which the
    // server observes as a read error -> the single authoritative
    // unregister trigger (spec.md §4.2).
    drop(b);

    // `a` should see `back_to_lobby` (possibly after a few more `pong_state`
    // frames already in flight), then an `update_lobby` with only itself,
    // not in-game.
    let mut saw_back_to_lobby = false;
    for _ in 0..200 {
        let msg = support::recv_json(&mut a).await;
        if msg["type"] == "back_to_lobby" {
            saw_back_to_lobby = true;
            break;
        }
    }
    assert!(saw_back_to_lobby, "the surviving player should be told to return to the lobby");

    let mut saw_solo_lobby = false;
    for _ in 0..10 {
        let msg = support::recv_json(&mut a).await;
        if msg["type"] == "update_lobby" {
            let players = msg["payload"]["players"].as_object().expect("players map");
            if players.len() == 1 {
                let (_, only_entry) = players.iter().next().unwrap();
                assert_eq!(only_entry["inGame"], false);
                saw_solo_lobby = true;
                break;
            }
        }
    }
    assert!(saw_solo_lobby, "lobby update should eventually show only the survivor, not in-game");
}
