//! Authoritative game rules
//!
//! A [`Game`] is the aggregate for one match. Every engine operation borrows
//! the current aggregate and hands back a new one, so a rejected move can
//! never leave a half-applied state behind and the rules can be tested
//! without a store or a runtime. Randomness (shuffles, first player, the
//! initial wild color) comes from the caller's `Rng`.

use crate::error::GameError;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::{
    sort_hand, Card, Color, Direction, GameState, GameStatus, Modifier, OwnHand, PlayerView,
    Seat, HAND_SIZE, MAX_PLAYERS, MIN_PLAYERS,
};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub hand: Vec<Card>,
}

impl Player {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hand: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub mnemonic: String,
    pub state: GameState,
    pub players: Vec<Player>,
    pub active_player: usize,
    pub direction: Direction,
    /// Cards the active player has to draw before they may play again
    pub must_draw: u8,
    pub wild_color: Color,
    /// Front is the next card drawn
    pub draw_pile: VecDeque<Card>,
    /// Front is the top card
    pub discard_pile: VecDeque<Card>,
    /// Store version this copy was read at, zero for a game never stored
    #[serde(skip)]
    pub version: u64,
}

fn shuffled<R: Rng + ?Sized>(cards: impl IntoIterator<Item = Card>, rng: &mut R) -> Vec<Card> {
    let mut cards: Vec<Card> = cards.into_iter().collect();
    cards.shuffle(rng);
    cards
}

/// Checks whether `candidate` may be played on top of `top`
///
/// Wilds can always be played. On a wild only the declared color is
/// accepted. Otherwise the colors, the modifiers or the numbers must match.
pub fn validate_play(top: Card, wild_color: Option<Color>, candidate: Card) -> Result<(), GameError> {
    if candidate.is_wild() {
        return Ok(());
    }

    let legal = if top.is_wild() {
        wild_color.is_some() && candidate.color() == wild_color
    } else {
        candidate.color() == top.color()
            || (candidate.modifier().is_some() && candidate.modifier() == top.modifier())
            || (candidate.number().is_some() && candidate.number() == top.number())
    };

    if legal {
        Ok(())
    } else {
        Err(GameError::IllegalPlay {
            card: candidate,
            top,
        })
    }
}

impl Game {
    /// New game in the lobby with a freshly shuffled deck
    pub fn create<R: Rng + ?Sized>(id: &str, mnemonic: &str, rng: &mut R) -> Self {
        Self {
            id: id.to_string(),
            mnemonic: mnemonic.to_string(),
            state: GameState::Created,
            players: Vec::new(),
            active_player: 0,
            direction: Direction::Clockwise,
            must_draw: 0,
            wild_color: Color::Red,
            draw_pile: shuffled(Card::deck(), rng).into(),
            discard_pile: VecDeque::new(),
            version: 0,
        }
    }

    pub fn player_index(&self, name: &str) -> Option<usize> {
        self.players.iter().position(|player| player.name == name)
    }

    pub fn active(&self) -> Option<&Player> {
        self.players.get(self.active_player)
    }

    pub fn discard_top(&self) -> Option<Card> {
        self.discard_pile.front().copied()
    }

    /// The player who emptied their hand, once the game is complete
    pub fn winner(&self) -> Option<&Player> {
        if self.state != GameState::Complete {
            return None;
        }
        self.players.iter().find(|player| player.hand.is_empty())
    }

    /// Total number of cards across both piles and every hand
    pub fn card_count(&self) -> usize {
        self.draw_pile.len()
            + self.discard_pile.len()
            + self.players.iter().map(|p| p.hand.len()).sum::<usize>()
    }

    /// Validation a caller runs before [`Game::add_player`]
    pub fn check_joinable(&self, name: &str) -> Result<(), GameError> {
        if self.state != GameState::Created {
            return Err(GameError::AlreadyStarted);
        }
        if self.player_index(name).is_some() {
            return Err(GameError::PlayerExists);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::TableFull);
        }
        Ok(())
    }

    /// Seats a new player with an empty hand
    ///
    /// No uniqueness check happens here; see [`Game::check_joinable`].
    pub fn add_player(&self, name: &str) -> Game {
        let mut next = self.clone();
        next.players.push(Player::new(name));
        debug!("Game {}: added player {}", next.id, name);
        next
    }

    /// Removes a player and returns their cards to the bottom of the draw pile
    ///
    /// If the leaving player held the turn, it passes to the next player in
    /// the current direction. Unknown names leave the game unchanged.
    pub fn remove_player<R: Rng + ?Sized>(&self, name: &str, rng: &mut R) -> Game {
        let mut next = self.clone();
        let Some(index) = next.player_index(name) else {
            return next;
        };

        if next.active_player == index {
            next.advance();
        }

        let player = next.players.remove(index);
        next.draw_pile.extend(shuffled(player.hand, rng));

        if next.players.is_empty() {
            next.active_player = 0;
        } else {
            if next.active_player > index {
                next.active_player -= 1;
            }
            next.active_player %= next.players.len();
        }

        debug!("Game {}: removed player {}", next.id, name);
        next
    }

    /// Deals a fresh round: new shuffled deck, seven cards each, one card
    /// turned up on the discard pile and a random wild color
    pub fn deal_hands<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Game, GameError> {
        let mut next = self.clone();
        next.direction = Direction::Clockwise;
        next.must_draw = 0;
        next.draw_pile = shuffled(Card::deck(), rng).into();
        next.discard_pile.clear();
        for player in &mut next.players {
            player.hand.clear();
        }

        for i in 0..next.players.len() {
            let mut hand = next.take_cards(HAND_SIZE, rng)?;
            sort_hand(&mut hand);
            next.players[i].hand = hand;
        }

        next.discard_pile = next.take_cards(1, rng)?.into();
        next.wild_color = Color::ALL[rng.gen_range(0..Color::ALL.len())];
        Ok(next)
    }

    /// Moves a dealt game into play with a random first player
    pub fn start<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Game, GameError> {
        if !matches!(self.state, GameState::Created | GameState::Complete) {
            return Err(GameError::CannotStart(self.state));
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers {
                have: self.players.len(),
                need: MIN_PLAYERS,
            });
        }

        let mut next = self.clone();
        next.state = GameState::Playing;
        next.active_player = rng.gen_range(0..next.players.len());
        Ok(next)
    }

    /// Puts the game back in the lobby with a fresh deal
    ///
    /// An abandoned game stays abandoned.
    pub fn restart<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Game, GameError> {
        if self.state == GameState::Abandoned {
            return Err(GameError::GameOver);
        }
        let mut next = self.deal_hands(rng)?;
        next.state = GameState::Created;
        next.active_player = 0;
        Ok(next)
    }

    pub fn end(&self) -> Game {
        let mut next = self.clone();
        next.state = GameState::Abandoned;
        next
    }

    /// The active player plays the card at `index` of their hand
    ///
    /// A supplied `wild_color` becomes the declared color before the play is
    /// validated.
    pub fn play_card(&self, index: usize, wild_color: Option<Color>) -> Result<Game, GameError> {
        if self.state != GameState::Playing {
            return Err(GameError::NotPlaying);
        }
        if self.must_draw > 0 {
            return Err(GameError::MustDraw);
        }

        let mut next = self.clone();
        let seat = next.active_player;
        let hand = &next.players.get(seat).ok_or(GameError::NoPlayers)?.hand;
        let card = *hand.get(index).ok_or(GameError::InvalidCardIndex(index))?;

        if let Some(color) = wild_color {
            next.wild_color = color;
        }

        // Discard pile is seeded by the deal, so it is never empty while playing
        let top = next.discard_top().ok_or(GameError::NotPlaying)?;
        validate_play(top, Some(next.wild_color), card)?;

        next.players[seat].hand.remove(index);
        next.discard_pile.push_front(card);
        next.apply_modifiers(card);
        next.advance();
        next.check_for_winner();
        Ok(next)
    }

    /// Passes the turn one seat along in the current direction
    pub fn advance_turn(&self) -> Game {
        let mut next = self.clone();
        next.advance();
        next
    }

    /// Takes `count` cards off the draw pile without giving them to anyone
    pub fn draw<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<(Game, Vec<Card>), GameError> {
        let mut next = self.clone();
        let cards = next.take_cards(count, rng)?;
        Ok((next, cards))
    }

    /// The active player draws one card
    ///
    /// While a forced draw is pending each draw pays one card off it, and
    /// paying the last one passes the turn.
    pub fn draw_card<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Game, GameError> {
        if self.state != GameState::Playing {
            return Err(GameError::NotPlaying);
        }
        if self.active().is_none() {
            return Err(GameError::NoPlayers);
        }

        let mut next = self.clone();
        let drawn = next.take_cards(1, rng)?;
        let hand = &mut next.players[next.active_player].hand;
        hand.extend(drawn);
        sort_hand(hand);

        if next.must_draw > 0 {
            next.must_draw -= 1;
            if next.must_draw == 0 {
                next.advance();
            }
        }

        Ok(next)
    }

    /// The active player is finished drawing
    pub fn done_drawing(&self) -> Result<Game, GameError> {
        if self.state != GameState::Playing {
            return Err(GameError::NotPlaying);
        }
        Ok(self.advance_turn())
    }

    /// Projection of the game for the named player
    pub fn view_for(&self, name: &str) -> Option<PlayerView> {
        let you = &self.players[self.player_index(name)?];

        Some(PlayerView {
            state: self.state,
            active_player: self.active_player,
            direction: self.direction,
            you: OwnHand {
                name: you.name.clone(),
                cards: you.hand.clone(),
            },
            other_players: self
                .players
                .iter()
                .map(|player| Seat {
                    name: player.name.clone(),
                    num_cards: player.hand.len(),
                })
                .collect(),
            must_draw: self.must_draw,
            wild_color: self.wild_color,
            draw_pile_count: self.draw_pile.len(),
            discard_pile_top: self.discard_top(),
            discard_pile_count: self.discard_pile.len(),
        })
    }

    /// Status message for one seat, reported as abandoned once the game is
    /// over for good or the player no longer sits at the table
    pub fn status_for(&self, name: &str, is_host: bool) -> GameStatus {
        match self.view_for(name) {
            Some(view) if self.state != GameState::Abandoned => {
                GameStatus::active(&self.id, &self.mnemonic, is_host, view)
            }
            _ => GameStatus::abandoned(&self.id, is_host),
        }
    }

    fn advance(&mut self) {
        if self.players.is_empty() {
            return;
        }
        let seats = self.players.len() as i64;
        let next = (self.active_player as i64 + self.direction.step()).rem_euclid(seats);
        self.active_player = next as usize;
    }

    fn take_cards<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Result<Vec<Card>, GameError> {
        let mut cards = Vec::with_capacity(count);

        for _ in 0..count {
            if self.draw_pile.is_empty() {
                self.recycle_discards(rng);
            }
            cards.push(self.draw_pile.pop_front().ok_or(GameError::DeckExhausted)?);
        }

        Ok(cards)
    }

    /// Everything under the top discard becomes the new draw pile
    fn recycle_discards<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let Some(top) = self.discard_pile.pop_front() else {
            return;
        };
        let rest: Vec<Card> = self.discard_pile.drain(..).collect();
        self.draw_pile = shuffled(rest, rng).into();
        self.discard_pile.push_front(top);
    }

    fn apply_modifiers(&mut self, card: Card) {
        match card.draw_penalty() {
            0 => {}
            penalty => self.must_draw = penalty,
        }

        match card.modifier() {
            Some(Modifier::Skip) => self.advance(),
            Some(Modifier::Reverse) => {
                self.direction = self.direction.reversed();
                // With two players a reverse hands the turn straight back
                if self.players.len() == 2 {
                    self.advance();
                }
            }
            Some(Modifier::DrawTwo) | None => {}
        }
    }

    fn check_for_winner(&mut self) {
        if self.players.iter().any(|player| player.hand.is_empty()) {
            self.state = GameState::Complete;
        }
    }
}
