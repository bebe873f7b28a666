//! Parsing of the commands typed at the client prompt

use shared::Color;
use thiserror::Error;

/// Something the player asked for at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create { name: String },
    Join { game_id: String, name: String },
    Leave,
    Start,
    Restart,
    End,
    Play { index: usize, wild_color: Option<Color> },
    Draw,
    Done,
    Show,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Type a command, or 'help' to list them")]
    Empty,

    #[error("Unknown command '{0}'")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
Commands:
  create <name>          start a new game and host it
  join <code> <name>     join a game by its code
  start | restart | end  host controls
  play <n> [R|G|B|Y]     play card n from your hand, naming a color for wilds
  draw                   draw a card
  done                   finish drawing and pass the turn
  leave                  leave the current game
  show                   print the game again
  quit";

/// Parses one line typed by the player
pub fn parse_line(line: &str) -> Result<Action, InputError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Err(InputError::Empty);
    };
    let rest: Vec<&str> = words.collect();

    let action = match (command.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("create" | "new", [name @ ..]) if !name.is_empty() => Action::Create {
            name: name.join(" "),
        },
        ("create" | "new", _) => return Err(InputError::Usage("create <name>")),

        ("join", [code, name @ ..]) if !name.is_empty() => Action::Join {
            game_id: code.to_ascii_uppercase(),
            name: name.join(" "),
        },
        ("join", _) => return Err(InputError::Usage("join <code> <name>")),

        ("play" | "p", [index]) => Action::Play {
            index: parse_index(index)?,
            wild_color: None,
        },
        ("play" | "p", [index, color]) => Action::Play {
            index: parse_index(index)?,
            wild_color: Some(
                color
                    .to_ascii_uppercase()
                    .parse()
                    .map_err(|_| InputError::Usage("play <n> [R|G|B|Y]"))?,
            ),
        },
        ("play" | "p", _) => return Err(InputError::Usage("play <n> [R|G|B|Y]")),

        ("leave", []) => Action::Leave,
        ("start", []) => Action::Start,
        ("restart", []) => Action::Restart,
        ("end", []) => Action::End,
        ("draw" | "d", []) => Action::Draw,
        ("done", []) => Action::Done,
        ("show" | "s", []) => Action::Show,
        ("help" | "?", _) => Action::Help,
        ("quit" | "exit" | "q", _) => Action::Quit,
        (other, _) => return Err(InputError::Unknown(other.to_string())),
    };

    Ok(action)
}

fn parse_index(text: &str) -> Result<usize, InputError> {
    text.parse()
        .map_err(|_| InputError::Usage("play <n> [R|G|B|Y]"))
}
