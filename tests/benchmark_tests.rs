//! Performance benchmarks for the engine, codecs and store

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use server::game::{validate_play, Game};
use server::repository::{GameRepository, DEFAULT_TTL};
use server::store::MemoryStore;
use shared::{Card, Color, GameState, GameUpdate};
use std::sync::Arc;
use std::time::Instant;

fn started_game(players: usize, seed: u64) -> (Game, StdRng) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut game = Game::create("BNCH", "Bench", &mut rng);
    for i in 0..players {
        game = game.add_player(&format!("P{}", i));
    }
    let game = game
        .deal_hands(&mut rng)
        .and_then(|dealt| dealt.start(&mut rng))
        .unwrap();
    (game, rng)
}

/// One turn: play the first legal card or draw one and pass
fn take_turn(game: &Game, rng: &mut StdRng) -> Game {
    // An exhausted deck just passes the turn
    if game.must_draw > 0 {
        return game.draw_card(rng).unwrap_or_else(|_| game.advance_turn());
    }

    let top = game.discard_top().unwrap();
    let hand = &game.active().unwrap().hand;
    let legal = hand
        .iter()
        .position(|card| validate_play(top, Some(game.wild_color), *card).is_ok());

    match legal {
        Some(index) => {
            let color = Color::ALL[rng.gen_range(0..4)];
            game.play_card(index, Some(color).filter(|_| hand[index].is_wild()))
                .unwrap()
        }
        None => match game.draw_card(rng) {
            Ok(drawn) => drawn.done_drawing().unwrap(),
            Err(_) => game.advance_turn(),
        },
    }
}

/// Benchmarks play validation
#[test]
fn benchmark_validate_play() {
    let deck = Card::deck();
    let iterations = 100;
    let start = Instant::now();

    let mut legal = 0usize;
    for _ in 0..iterations {
        for top in &deck {
            for candidate in &deck {
                if validate_play(*top, Some(Color::Red), *candidate).is_ok() {
                    legal += 1;
                }
            }
        }
    }

    let duration = start.elapsed();
    let checks = iterations * deck.len() * deck.len();
    println!(
        "Play validation: {} checks in {:?} ({:.2} ns/check)",
        checks,
        duration,
        duration.as_nanos() as f64 / checks as f64
    );

    assert!(legal > 0);
    // Should complete in under 2 seconds even in debug builds
    assert!(duration.as_millis() < 2000);
}

/// Plays whole games turn by turn
#[test]
fn benchmark_full_games() {
    let games = 50;
    let start = Instant::now();
    let mut turns = 0usize;

    for seed in 0..games {
        let (mut game, mut rng) = started_game(2 + (seed as usize % 5), seed);
        for _ in 0..5_000 {
            if game.state != GameState::Playing {
                break;
            }
            game = take_turn(&game, &mut rng);
            turns += 1;
            assert_eq!(game.card_count(), 108);
        }
    }

    let duration = start.elapsed();
    println!(
        "Full games: {} games, {} turns in {:?} ({:.2} μs/turn)",
        games,
        turns,
        duration,
        duration.as_micros() as f64 / turns as f64
    );

    assert!(duration.as_secs() < 10);
}

/// Benchmarks the stored record and the pushed view encodings
#[test]
fn benchmark_codecs() {
    let (game, _) = started_game(6, 42);
    let iterations = 10_000;

    let start = Instant::now();
    let mut bytes = 0;
    for _ in 0..iterations {
        let encoded = bincode::serialize(&game).unwrap();
        let decoded: Game = bincode::deserialize(&encoded).unwrap();
        bytes = encoded.len();
        assert_eq!(decoded.players.len(), 6);
    }
    let record = start.elapsed();

    let start = Instant::now();
    let mut text = String::new();
    for _ in 0..iterations {
        let update = GameUpdate::new(game.status_for("P0", true));
        text = serde_json::to_string(&update).unwrap();
    }
    let push = start.elapsed();

    println!(
        "Codecs: record {} bytes, {:?} per round trip; push {} bytes, {:?} per encode",
        bytes,
        record / iterations,
        text.len(),
        push / iterations
    );

    assert!(record.as_secs() < 5);
    assert!(push.as_secs() < 5);
}

/// Benchmarks versioned writes through the repository
#[test]
fn benchmark_repository_writes() {
    let store = Arc::new(MemoryStore::new());
    let games = GameRepository::new(store, DEFAULT_TTL);
    let (game, mut rng) = started_game(4, 7);
    let iterations = 2_000;

    let start = Instant::now();
    tokio_test::block_on(async {
        let mut current = games.save(&game).await.unwrap();
        for _ in 0..iterations {
            let next = take_turn(&current, &mut rng);
            if next.state != GameState::Playing {
                break;
            }
            current = games.save(&next).await.unwrap();
        }
        let stored = games.load("BNCH").await.unwrap().unwrap();
        assert_eq!(stored.version, current.version);
    });

    let duration = start.elapsed();
    println!("Repository: up to {} writes in {:?}", iterations, duration);

    assert!(duration.as_secs() < 5);
}
