//! Card values and their compact string encoding.
//!
//! Cards travel over the wire and into storage as short strings (`"R5"`,
//! `"Gskip"`, `"Brev"`, `"Y+2"`, `"wild"`, `"wild+4"`). Inside the engine they
//! are always the structured [`Card`] enum so rule checks never sniff strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the four suit colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
}

impl Color {
    pub const ALL: [Color; 4] = [Color::Red, Color::Green, Color::Blue, Color::Yellow];

    pub fn code(self) -> char {
        match self {
            Color::Red => 'R',
            Color::Green => 'G',
            Color::Blue => 'B',
            Color::Yellow => 'Y',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'R' => Some(Color::Red),
            'G' => Some(Color::Green),
            'B' => Some(Color::Blue),
            'Y' => Some(Color::Yellow),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Color {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(code), None) => {
                Color::from_code(code).ok_or_else(|| CardParseError::Color(s.to_string()))
            }
            _ => Err(CardParseError::Color(s.to_string())),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = CardParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// A single card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Card {
    Number(Color, u8),
    Skip(Color),
    Reverse(Color),
    DrawTwo(Color),
    Wild,
    WildDrawFour,
}

/// The action printed on a colored non-number card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Skip,
    Reverse,
    DrawTwo,
}

impl Card {
    pub fn color(&self) -> Option<Color> {
        match *self {
            Card::Number(color, _) | Card::Skip(color) | Card::Reverse(color) | Card::DrawTwo(color) => {
                Some(color)
            }
            Card::Wild | Card::WildDrawFour => None,
        }
    }

    pub fn is_wild(&self) -> bool {
        matches!(self, Card::Wild | Card::WildDrawFour)
    }

    pub fn number(&self) -> Option<u8> {
        match *self {
            Card::Number(_, n) => Some(n),
            _ => None,
        }
    }

    pub fn modifier(&self) -> Option<Modifier> {
        match self {
            Card::Skip(_) => Some(Modifier::Skip),
            Card::Reverse(_) => Some(Modifier::Reverse),
            Card::DrawTwo(_) => Some(Modifier::DrawTwo),
            _ => None,
        }
    }

    /// Cards the next player is forced to draw when this card is played
    pub fn draw_penalty(&self) -> u8 {
        match self {
            Card::DrawTwo(_) => 2,
            Card::WildDrawFour => 4,
            _ => 0,
        }
    }

    /// Full 108 card deck in a fixed order
    ///
    /// Per color: one 0, two each of 1-9, two each of skip, reverse and +2.
    /// Followed by four wilds and four wild +4s.
    pub fn deck() -> Vec<Card> {
        let mut cards = Vec::with_capacity(crate::DECK_SIZE);

        for color in Color::ALL {
            for n in 0..=9 {
                cards.push(Card::Number(color, n));
            }
            for n in 1..=9 {
                cards.push(Card::Number(color, n));
            }
            for _ in 0..2 {
                cards.push(Card::Reverse(color));
                cards.push(Card::DrawTwo(color));
                cards.push(Card::Skip(color));
            }
        }

        cards.extend(std::iter::repeat(Card::Wild).take(4));
        cards.extend(std::iter::repeat(Card::WildDrawFour).take(4));
        cards
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Card::Number(color, n) => write!(f, "{}{}", color, n),
            Card::Skip(color) => write!(f, "{}skip", color),
            Card::Reverse(color) => write!(f, "{}rev", color),
            Card::DrawTwo(color) => write!(f, "{}+2", color),
            Card::Wild => write!(f, "wild"),
            Card::WildDrawFour => write!(f, "wild+4"),
        }
    }
}

impl FromStr for Card {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wild" => return Ok(Card::Wild),
            "wild+4" => return Ok(Card::WildDrawFour),
            _ => {}
        }

        let mut chars = s.chars();
        let color = chars
            .next()
            .and_then(Color::from_code)
            .ok_or_else(|| CardParseError::Card(s.to_string()))?;

        match chars.as_str() {
            "skip" => Ok(Card::Skip(color)),
            "rev" => Ok(Card::Reverse(color)),
            "+2" => Ok(Card::DrawTwo(color)),
            rank => match rank.as_bytes() {
                [digit @ b'0'..=b'9'] => Ok(Card::Number(color, digit - b'0')),
                _ => Err(CardParseError::Card(s.to_string())),
            },
        }
    }
}

impl TryFrom<String> for Card {
    type Error = CardParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Card> for String {
    fn from(card: Card) -> Self {
        card.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardParseError {
    #[error("unknown card '{0}'")]
    Card(String),
    #[error("unknown color '{0}'")]
    Color(String),
}

/// Sorts a hand by the string encoding of each card
pub fn sort_hand(hand: &mut [Card]) {
    hand.sort_by_cached_key(|card| card.to_string());
}
