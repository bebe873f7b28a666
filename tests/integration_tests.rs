//! Integration tests for the card game server and client
//!
//! These tests run a real server on a loopback port and drive it through the
//! client library, the way players would.

use client::network::{ClientError, GameClient};
use serde::de::DeserializeOwned;
use serde::Serialize;
use server::game::validate_play;
use server::network::{Server, ServerConfig};
use server::store::MemoryStore;
use shared::{Card, Color, Command, GameState, GameStatus, GameUpdate, PlayerView, Response, Verb};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(3);

async fn start_server() -> String {
    let server = Server::new("127.0.0.1:0", Arc::new(MemoryStore::new()), ServerConfig::default())
        .await
        .expect("server binds");
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(server.run());
    addr
}

async fn player(addr: &str) -> GameClient {
    let mut client = GameClient::connect(addr).await.expect("connects");
    client.open_session(None).await.expect("session opens");
    client
}

async fn next_update(client: &mut GameClient) -> GameStatus {
    timeout(WAIT, client.next_update())
        .await
        .expect("update arrives in time")
        .expect("connection open")
}

/// Waits out in-flight pushes and checks nothing else arrives
async fn assert_no_update(client: &mut GameClient) {
    sleep(Duration::from_millis(100)).await;
    assert!(client.try_update().is_none(), "unexpected push");
}

fn view(status: &GameStatus) -> &PlayerView {
    status.game.as_ref().expect("status carries a view")
}

/// Host "Nia" and guest "Eric" in a started game, start pushes consumed
async fn started_game(addr: &str) -> (GameClient, GameClient, String) {
    let mut host = player(addr).await;
    let mut guest = player(addr).await;

    let created = host.create_game("Nia").await.unwrap();
    let game_id = created.game_id.clone();
    guest.join_game(&game_id, "Eric").await.unwrap();
    next_update(&mut host).await;

    host.start_game().await.unwrap();
    next_update(&mut host).await;
    next_update(&mut guest).await;

    (host, guest, game_id)
}

fn roundtrip<T: Serialize + DeserializeOwned>(value: &T) -> T {
    let text = serde_json::to_string(value).unwrap();
    serde_json::from_str(&text).unwrap()
}

/// PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Envelope field names are part of the wire contract
    #[test]
    fn envelope_field_names() {
        let cmd = Command::new("9", Verb::JoinGame).with("gameId", "ABCD");
        let json: serde_json::Value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["reqId"], "9");
        assert_eq!(json["v"], "joinGame");
        assert_eq!(json["d"]["gameId"], "ABCD");

        let err = Response::error("9", "joinGame", "Game not found");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["err"], true);
        assert_eq!(json["d"]["message"], "Game not found");

        let push = GameUpdate::new(GameStatus::abandoned("ABCD", true));
        let json = serde_json::to_value(&push).unwrap();
        assert_eq!(json["v"], "gameState");
        assert_eq!(json["d"]["abandoned"], true);
        assert_eq!(json["d"]["gamePneumonic"], "");
        assert!(json["d"].get("game").is_none());
        assert_eq!(roundtrip(&push), push);
    }

    /// A command typed by hand with only the required fields is accepted
    #[tokio::test]
    async fn raw_json_lines() {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let addr = start_server().await;
        let stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer
            .write_all(b"{\"reqId\":\"a\",\"v\":\"openSession\"}\n{\"v\":\"dance\"}\n")
            .await
            .unwrap();

        let opened: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(opened.req_id, "a");
        assert!(!opened.error);

        let unknown: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(unknown.error);
        assert_eq!(unknown.message(), Some("Unrecognized command"));
    }
}

/// GAME FLOW TESTS
mod game_flow_tests {
    use super::*;

    /// Two players, a deal, a legal play and a rejected one
    #[tokio::test]
    async fn two_player_game_end_to_end() {
        let addr = start_server().await;
        let (mut host, mut guest, _) = started_game(&addr).await;

        let status = host.draw_card().await;
        let (mut active, mut waiting) = match status {
            Err(ClientError::Rejected(message)) => {
                assert_eq!(message, "It's not your turn");
                (guest, host)
            }
            Ok(_) => {
                // Host was active; that draw is pushed to both
                next_update(&mut host).await;
                next_update(&mut guest).await;
                (host, guest)
            }
            Err(e) => panic!("unexpected error: {}", e),
        };

        // Rejected moves change nothing and reach nobody else
        let bad = active.play_card(99, None).await;
        assert!(matches!(bad, Err(ClientError::Rejected(_))));
        let not_yours = waiting.draw_card().await;
        assert!(matches!(not_yours, Err(ClientError::Rejected(ref m)) if m == "It's not your turn"));
        assert_no_update(&mut waiting).await;
        assert_no_update(&mut active).await;

        // Draw until a card can be played
        let mut current = active.draw_card().await.unwrap();
        next_update(&mut waiting).await;
        let (index, card) = loop {
            let v = view(&current);
            let top = v.discard_pile_top.expect("discard seeded");
            let playable = v
                .you
                .cards
                .iter()
                .position(|c| validate_play(top, Some(v.wild_color), *c).is_ok());
            if let Some(index) = playable {
                break (index, v.you.cards[index]);
            }
            current = active.draw_card().await.unwrap();
            next_update(&mut waiting).await;
        };

        let hand_before = view(&current).you.cards.len();
        let wild = card.is_wild().then_some(Color::Green);
        let played = active.play_card(index, wild).await.unwrap();
        let after = view(&played);

        assert_eq!(after.you.cards.len(), hand_before - 1);
        assert_eq!(after.discard_pile_top, Some(card));
        assert_eq!(after.discard_pile_count, 2);

        let seen = next_update(&mut waiting).await;
        assert_eq!(view(&seen).discard_pile_top, Some(card));
        assert_eq!(
            view(&seen).other_players.iter().map(|s| s.num_cards).sum::<usize>()
                + view(&seen).draw_pile_count
                + view(&seen).discard_pile_count,
            108
        );
    }

    /// The deal puts 14 cards in hands, 1 on the discard pile and 93 in the draw pile
    #[tokio::test]
    async fn dealt_card_totals() {
        let addr = start_server().await;
        let (mut host, _guest, _) = started_game(&addr).await;

        // Restart and start again to look at a fresh deal from the response
        host.restart_game().await.unwrap();
        let status = host.start_game().await.unwrap();
        let v = view(&status);

        assert_eq!(v.state, GameState::Playing);
        assert_eq!(v.other_players.len(), 2);
        assert_eq!(v.other_players.iter().map(|s| s.num_cards).sum::<usize>(), 14);
        assert_eq!(v.discard_pile_count, 1);
        assert_eq!(v.draw_pile_count, 93);
        assert!(v.active_player < 2);
        assert_eq!(v.must_draw, 0);
    }

    /// Only the host may start, restart or end
    #[tokio::test]
    async fn host_controls() {
        let addr = start_server().await;
        let mut host = player(&addr).await;
        let mut guest = player(&addr).await;

        let created = host.create_game("Nia").await.unwrap();
        assert!(created.is_host);
        let joined = guest.join_game(&created.game_id, "Eric").await.unwrap();
        assert!(!joined.is_host);

        match guest.start_game().await {
            Err(ClientError::Rejected(m)) => assert_eq!(m, "Only the game host can start the game"),
            other => panic!("guest started the game: {:?}", other.map(|s| s.game_id)),
        }

        let ended = host.end_game().await.unwrap();
        assert!(ended.abandoned);
        assert!(next_update(&mut guest).await.abandoned);
    }

    /// Joining needs a real game and a free name
    #[tokio::test]
    async fn join_rules() {
        let addr = start_server().await;
        let mut host = player(&addr).await;
        let mut other = player(&addr).await;

        let created = host.create_game("Nia").await.unwrap();

        let missing = other.join_game("QQQQ", "Eric").await;
        assert!(matches!(missing, Err(ClientError::Rejected(ref m)) if m == "Game not found"));

        let duplicate = other.join_game(&created.game_id, "Nia").await;
        assert!(matches!(duplicate, Err(ClientError::Rejected(ref m)) if m == "Player already exists"));

        let lower = created.game_id.to_lowercase();
        tokio_test::assert_ok!(other.join_game(&lower, "Eric").await);
    }
}

/// SESSION TESTS
mod session_tests {
    use super::*;

    /// A reconnecting player gets their seat and the live view back
    #[tokio::test]
    async fn resume_after_reconnect() {
        let addr = start_server().await;
        let mut host = player(&addr).await;
        let mut guest = player(&addr).await;

        let created = host.create_game("Nia").await.unwrap();
        guest.join_game(&created.game_id, "Eric").await.unwrap();
        next_update(&mut host).await;

        let session_id = guest.session_id().unwrap().to_string();
        drop(guest);

        let mut back = GameClient::connect(&addr).await.unwrap();
        let resumed = back.open_session(Some(&session_id)).await.unwrap();
        assert_eq!(resumed, session_id);

        let restored = next_update(&mut back).await;
        assert_eq!(restored.game_id, created.game_id);
        assert_eq!(view(&restored).you.name, "Eric");

        host.start_game().await.unwrap();
        let live = next_update(&mut back).await;
        assert_eq!(view(&live).state, GameState::Playing);
        assert_eq!(view(&live).you.cards.len(), 7);
    }

    /// An unknown session id quietly becomes a new session
    #[tokio::test]
    async fn unknown_session_starts_fresh() {
        let addr = start_server().await;
        let mut client = GameClient::connect(&addr).await.unwrap();

        let id = client.open_session(Some("0123456789abcdef")).await.unwrap();
        assert_ne!(id, "0123456789abcdef");
        assert_eq!(client.session_id(), Some(id.as_str()));
    }

    /// Leaving mid-game with two players ends the game for the other
    #[tokio::test]
    async fn leaving_ends_two_player_game() {
        let addr = start_server().await;
        let (mut host, mut guest, game_id) = started_game(&addr).await;

        let left = guest.leave_game().await.unwrap();
        assert!(left.abandoned);
        assert_eq!(left.game_id, game_id);

        let seen = next_update(&mut host).await;
        assert!(seen.abandoned);

        let again = guest.leave_game().await;
        assert!(matches!(again, Err(ClientError::Rejected(ref m)) if m == "You are not in a game"));
    }

    /// Pushes only go to connections bound to the changed game
    #[tokio::test]
    async fn games_are_isolated() {
        let addr = start_server().await;
        let (mut host, mut guest, _) = started_game(&addr).await;

        let mut other_host = player(&addr).await;
        let mut other_guest = player(&addr).await;
        let other = other_host.create_game("Zed").await.unwrap();
        other_guest.join_game(&other.game_id, "Ann").await.unwrap();
        next_update(&mut other_host).await;

        other_host.end_game().await.unwrap();
        next_update(&mut other_host).await;
        next_update(&mut other_guest).await;

        assert_no_update(&mut host).await;
        assert_no_update(&mut guest).await;
    }
}

/// Card parsing at the boundary rejects what the server would never send
#[test]
fn card_strings_roundtrip_through_json() {
    let hand: Vec<Card> = ["R0", "G9", "Bskip", "Yrev", "R+2", "wild", "wild+4"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    assert_eq!(roundtrip(&hand), hand);
    assert!(serde_json::from_str::<Card>("\"P1\"").is_err());
}
