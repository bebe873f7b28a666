//! Plain-text rendering of game state for the terminal

use shared::{Card, Color, Direction, GameState, GameStatus, PlayerView};
use std::fmt::Write;

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::Red => "red",
        Color::Green => "green",
        Color::Blue => "blue",
        Color::Yellow => "yellow",
    }
}

/// Human readable card name, e.g. "red 5" or "wild draw four"
pub fn card_name(card: Card) -> String {
    match card {
        Card::Number(color, n) => format!("{} {}", color_name(color), n),
        Card::Skip(color) => format!("{} skip", color_name(color)),
        Card::Reverse(color) => format!("{} reverse", color_name(color)),
        Card::DrawTwo(color) => format!("{} draw two", color_name(color)),
        Card::Wild => "wild".to_string(),
        Card::WildDrawFour => "wild draw four".to_string(),
    }
}

/// Renders everything a status push tells the player
pub fn render_status(status: &GameStatus) -> String {
    if status.abandoned {
        return format!("Game {} is over.\n", status.game_id);
    }

    let mut out = String::new();
    let _ = writeln!(out, "Game {} ({})", status.game_id, status.game_pneumonic);
    if let Some(view) = &status.game {
        out.push_str(&render_view(view, status.is_host));
    }
    out
}

pub fn render_view(view: &PlayerView, is_host: bool) -> String {
    let mut out = String::new();

    match view.state {
        GameState::Created => {
            let _ = writeln!(out, "Waiting in the lobby.");
            if is_host {
                let _ = writeln!(out, "Type 'start' once everyone has joined.");
            }
        }
        GameState::Complete => {
            let winner = view
                .other_players
                .iter()
                .find(|seat| seat.num_cards == 0)
                .map_or("Somebody", |seat| seat.name.as_str());
            let _ = writeln!(out, "{} won!", winner);
            if is_host {
                let _ = writeln!(out, "Type 'start' to play again or 'end' to finish.");
            }
        }
        GameState::Playing | GameState::Abandoned => {}
    }

    let _ = writeln!(out, "Players ({}):", direction_label(view.direction));
    for (i, seat) in view.other_players.iter().enumerate() {
        let marker = if i == view.active_player { ">" } else { " " };
        let you = if seat.name == view.you.name { " (you)" } else { "" };
        let _ = writeln!(out, " {} {}{}: {} cards", marker, seat.name, you, seat.num_cards);
    }

    if let Some(top) = view.discard_pile_top {
        let _ = write!(out, "Discard: {}", card_name(top));
        if top.is_wild() {
            let _ = write!(out, " (color {})", color_name(view.wild_color));
        }
        let _ = writeln!(
            out,
            " | discard pile {} | draw pile {}",
            view.discard_pile_count, view.draw_pile_count
        );
    }

    if view.must_draw > 0 {
        let _ = writeln!(out, "{} cards must be drawn.", view.must_draw);
    }

    let _ = writeln!(out, "Your hand:");
    for (i, card) in view.you.cards.iter().enumerate() {
        let _ = writeln!(out, "  [{}] {}", i, card_name(*card));
    }

    if view.state == GameState::Playing && is_your_turn(view) {
        let _ = writeln!(out, "It's your turn.");
    }
    out
}

pub fn is_your_turn(view: &PlayerView) -> bool {
    view.other_players
        .get(view.active_player)
        .is_some_and(|seat| seat.name == view.you.name)
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Clockwise => "clockwise",
        Direction::CounterClockwise => "counter-clockwise",
    }
}
