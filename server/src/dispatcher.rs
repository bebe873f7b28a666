//! Command routing for one client connection
//!
//! A [`Connection`] holds everything the server knows about one open socket:
//! the session it speaks for and the watcher mirroring its game. Each inbound
//! envelope is parsed, routed by verb and answered with exactly one
//! [`Response`]. Failures are answered to the sender only and never reach
//! other players.
//!
//! Game changes are read, transformed by the engine and written back
//! conditionally on the version that was read. A write that loses a race is
//! redone from a fresh read.

use crate::error::{CommandError, StoreError};
use crate::game::Game;
use crate::gamecode::CodeGenerator;
use crate::repository::{GameRepository, SessionRepository};
use crate::session::{Session, SessionManager};
use crate::store::Store;
use crate::watcher::{self, Viewer, WatchHandle};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Color, Command, GameState, GameStatus, Response, Verb};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Reads of a contended game before giving up
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// Fresh codes tried before game creation gives up
const MAX_CODE_ATTEMPTS: usize = 16;

/// State shared by every connection on the server
pub struct Services {
    pub games: GameRepository,
    pub sessions: SessionManager,
    pub codes: CodeGenerator,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, ttl: Duration, codes: CodeGenerator) -> Self {
        Self {
            games: GameRepository::new(store.clone(), ttl),
            sessions: SessionManager::new(SessionRepository::new(store, ttl)),
            codes,
        }
    }
}

/// The game seat a session is bound to
struct Membership {
    game_id: String,
    player_name: String,
    host: bool,
}

pub struct Connection {
    id: u32,
    services: Arc<Services>,
    session: Option<Session>,
    watch: Option<WatchHandle>,
    outbound: mpsc::UnboundedSender<String>,
    rng: StdRng,
}

impl Connection {
    pub fn new(id: u32, services: Arc<Services>, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self::with_rng(id, services, outbound, StdRng::from_entropy())
    }

    pub fn with_rng(
        id: u32,
        services: Arc<Services>,
        outbound: mpsc::UnboundedSender<String>,
        rng: StdRng,
    ) -> Self {
        Self {
            id,
            services,
            session: None,
            watch: None,
            outbound,
            rng,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Game currently mirrored to this connection
    pub fn watching(&self) -> Option<&str> {
        self.watch.as_ref().map(WatchHandle::game_id)
    }

    /// Parses one raw envelope and answers it
    pub async fn handle_message(&mut self, message: &str) -> Response {
        match serde_json::from_str::<Command>(message) {
            Ok(cmd) => self.dispatch(&cmd).await,
            Err(e) => {
                warn!("Connection {} sent a malformed command: {}", self.id, e);
                Response::error("", "", CommandError::Malformed(e).to_string())
            }
        }
    }

    pub async fn dispatch(&mut self, cmd: &Command) -> Response {
        debug!("Connection {} -> {} ({})", self.id, cmd.verb, cmd.req_id);

        match self.execute(cmd).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Connection {} {} failed: {:?}", self.id, cmd.verb, e);
                Response::error(&cmd.req_id, &cmd.verb, e.to_string())
            }
        }
    }

    async fn execute(&mut self, cmd: &Command) -> Result<Response, CommandError> {
        let verb: Verb = cmd.verb.parse().map_err(CommandError::UnknownVerb)?;

        match verb {
            Verb::OpenSession => self.open_session(cmd).await,
            Verb::CreateGame => self.create_game(cmd).await,
            Verb::JoinGame => self.join_game(cmd).await,
            Verb::LeaveGame => self.leave_game(cmd).await,
            Verb::StartGame => self.start_game(cmd).await,
            Verb::RestartGame => self.restart_game(cmd).await,
            Verb::EndGame => self.end_game(cmd).await,
            Verb::PlayCard => self.play_card(cmd).await,
            Verb::DrawCard => self.draw_card(cmd).await,
            Verb::DoneDrawing => self.done_drawing(cmd).await,
        }
    }

    /// Releases this connection's watcher and forgets it on the server
    ///
    /// The session itself stays stored so the player can come back.
    pub async fn close(&mut self) {
        self.unwatch().await;
        self.services.sessions.disconnect(self.id).await;
    }

    async fn open_session(&mut self, cmd: &Command) -> Result<Response, CommandError> {
        self.unwatch().await;

        let mut session = self.services.sessions.open(cmd.field("sessionId")).await?;
        self.services.sessions.attach(self.id, &session.id).await;

        if let Some(game_id) = session.active_game().map(str::to_string) {
            let game = match self.services.games.load(&game_id).await {
                Ok(game) => game,
                Err(e) => {
                    warn!("Could not reload game {} for session {}: {}", game_id, session.id, e);
                    None
                }
            };

            match game {
                Some(game)
                    if game.state != GameState::Abandoned
                        && game.player_index(&session.player_name).is_some() =>
                {
                    self.watch(&game_id, &session.player_name, session.host).await?;
                    watcher::push(
                        &self.outbound,
                        game.status_for(&session.player_name, session.host),
                    );
                }
                _ => {
                    debug!("Session {} lost its game {}", session.id, game_id);
                    session.detach();
                    self.services.sessions.save(&session).await?;
                }
            }
        }

        let mut data = HashMap::new();
        data.insert("sessionId".to_string(), session.id.clone());
        self.session = Some(session);
        Ok(Response::fields(cmd, data))
    }

    async fn create_game(&mut self, cmd: &Command) -> Result<Response, CommandError> {
        self.require_session()?;
        let player_name = required(cmd, "playerName")?.to_string();

        let mut created = None;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.services.codes.code(&mut self.rng);
            let mnemonic = self.services.codes.mnemonic(&code, &mut self.rng);
            let game = Game::create(&code, &mnemonic, &mut self.rng).add_player(&player_name);

            match self.services.games.save(&game).await {
                Ok(saved) => {
                    created = Some(saved);
                    break;
                }
                Err(StoreError::Conflict { .. }) => debug!("Game code {} is taken", code),
                Err(e) => return Err(e.into()),
            }
        }
        let game = created.ok_or(CommandError::Contention)?;

        info!("{} created game {} ({})", player_name, game.id, game.mnemonic);
        self.bind(&game.id, &player_name, true).await?;
        Ok(Response::game(cmd, game.status_for(&player_name, true)))
    }

    async fn join_game(&mut self, cmd: &Command) -> Result<Response, CommandError> {
        self.require_session()?;
        let game_id = required(cmd, "gameId")?.to_ascii_uppercase();
        let player_name = required(cmd, "playerName")?.to_string();

        let name = player_name.clone();
        let game = self
            .update_game(&game_id, move |game, _| {
                game.check_joinable(&name)?;
                Ok(game.add_player(&name))
            })
            .await?;

        info!("{} joined game {}", player_name, game.id);
        self.bind(&game.id, &player_name, false).await?;
        Ok(Response::game(cmd, game.status_for(&player_name, false)))
    }

    async fn leave_game(&mut self, cmd: &Command) -> Result<Response, CommandError> {
        let member = self.membership()?;

        let name = member.player_name.clone();
        let left = self
            .update_game(&member.game_id, move |game, rng| {
                let next = game.remove_player(&name, rng);
                if next.players.len() == 1 && next.state == GameState::Playing {
                    return Ok(next.end());
                }
                Ok(next)
            })
            .await;

        match left {
            Ok(game) if game.players.is_empty() => match self.services.games.remove(&game).await {
                Ok(_) => info!("Game {} is empty and was removed", game.id),
                Err(StoreError::Conflict { .. }) => {
                    debug!("Game {} was joined again before it could be removed", game.id);
                }
                Err(e) => return Err(e.into()),
            },
            Ok(game) => info!("{} left game {}", member.player_name, game.id),
            Err(CommandError::GameNotFound(_)) => {
                debug!("Game {} was already gone", member.game_id);
            }
            Err(e) => return Err(e),
        }

        self.unwatch().await;
        if let Some(session) = self.session.as_mut() {
            session.detach();
            self.services.sessions.save(session).await?;
        }

        Ok(Response::game(cmd, GameStatus::abandoned(&member.game_id, false)))
    }

    async fn start_game(&mut self, cmd: &Command) -> Result<Response, CommandError> {
        let member = self.host_membership("start")?;
        let game = self
            .update_game(&member.game_id, |game, rng| {
                Ok(game.deal_hands(rng)?.start(rng)?)
            })
            .await?;

        info!("Game {} started with {} players", game.id, game.players.len());
        Ok(Response::game(cmd, game.status_for(&member.player_name, true)))
    }

    async fn restart_game(&mut self, cmd: &Command) -> Result<Response, CommandError> {
        let member = self.host_membership("restart")?;
        let game = self
            .update_game(&member.game_id, |game, rng| Ok(game.restart(rng)?))
            .await?;

        info!("Game {} restarted", game.id);
        Ok(Response::game(cmd, game.status_for(&member.player_name, true)))
    }

    async fn end_game(&mut self, cmd: &Command) -> Result<Response, CommandError> {
        let member = self.host_membership("end")?;
        let game = self
            .update_game(&member.game_id, |game, _| Ok(game.end()))
            .await?;

        info!("Game {} ended by its host", game.id);
        Ok(Response::game(cmd, GameStatus::abandoned(&game.id, true)))
    }

    async fn play_card(&mut self, cmd: &Command) -> Result<Response, CommandError> {
        let member = self.membership()?;

        let raw_index = required(cmd, "cardIndex")?;
        let index: usize = raw_index.parse().map_err(|_| CommandError::InvalidField {
            field: "cardIndex",
            value: raw_index.to_string(),
        })?;

        let wild_color = match cmd.field("wildColor").map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Color>().map_err(|_| CommandError::InvalidField {
                field: "wildColor",
                value: raw.to_string(),
            })?),
        };

        let name = member.player_name.clone();
        let game = self
            .update_game(&member.game_id, move |game, _| {
                ensure_turn(game, &name)?;
                Ok(game.play_card(index, wild_color)?)
            })
            .await?;

        if let Some(winner) = game.winner() {
            info!("{} won game {}", winner.name, game.id);
        }
        Ok(Response::game(cmd, game.status_for(&member.player_name, member.host)))
    }

    async fn draw_card(&mut self, cmd: &Command) -> Result<Response, CommandError> {
        let member = self.membership()?;

        let name = member.player_name.clone();
        let game = self
            .update_game(&member.game_id, move |game, rng| {
                ensure_turn(game, &name)?;
                Ok(game.draw_card(rng)?)
            })
            .await?;

        Ok(Response::game(cmd, game.status_for(&member.player_name, member.host)))
    }

    async fn done_drawing(&mut self, cmd: &Command) -> Result<Response, CommandError> {
        let member = self.membership()?;

        let name = member.player_name.clone();
        let game = self
            .update_game(&member.game_id, move |game, _| {
                ensure_turn(game, &name)?;
                Ok(game.done_drawing()?)
            })
            .await?;

        Ok(Response::game(cmd, game.status_for(&member.player_name, member.host)))
    }

    /// Read, change and conditionally write one game
    ///
    /// `change` runs against a freshly loaded copy on every attempt. Rule
    /// violations end the command straight away; losing the write race
    /// retries up to [`MAX_WRITE_ATTEMPTS`] times.
    async fn update_game<F>(&mut self, game_id: &str, mut change: F) -> Result<Game, CommandError>
    where
        F: FnMut(&Game, &mut StdRng) -> Result<Game, CommandError>,
    {
        let games = self.services.games.clone();

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = games
                .load(game_id)
                .await?
                .ok_or_else(|| CommandError::GameNotFound(game_id.to_string()))?;

            let next = change(&current, &mut self.rng)?;

            match games.save(&next).await {
                Ok(saved) => return Ok(saved),
                Err(StoreError::Conflict { .. }) => {
                    debug!(
                        "Connection {} lost the race for game {} (attempt {})",
                        self.id, game_id, attempt
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!("Giving up on game {} after {} attempts", game_id, MAX_WRITE_ATTEMPTS);
        Err(CommandError::Contention)
    }

    /// Points the session at a game, persists it and starts mirroring
    async fn bind(&mut self, game_id: &str, player_name: &str, host: bool) -> Result<(), CommandError> {
        let session = self.session.as_mut().ok_or(CommandError::NoSession)?;
        session.bind(game_id, player_name, host);
        self.services.sessions.save(session).await?;
        self.watch(game_id, player_name, host).await
    }

    async fn watch(&mut self, game_id: &str, player_name: &str, host: bool) -> Result<(), CommandError> {
        self.unwatch().await;

        let viewer = Viewer {
            connection: self.id,
            player_name: player_name.to_string(),
            host,
        };
        let handle = watcher::watch(
            self.services.games.clone(),
            game_id,
            viewer,
            self.outbound.clone(),
        )
        .await?;

        self.watch = Some(handle);
        Ok(())
    }

    async fn unwatch(&mut self) {
        if let Some(handle) = self.watch.take() {
            handle.stop().await;
        }
    }

    fn require_session(&self) -> Result<&Session, CommandError> {
        self.session.as_ref().ok_or(CommandError::NoSession)
    }

    fn membership(&self) -> Result<Membership, CommandError> {
        let session = self.require_session()?;
        let game_id = session.active_game().ok_or(CommandError::NotInGame)?;
        Ok(Membership {
            game_id: game_id.to_string(),
            player_name: session.player_name.clone(),
            host: session.host,
        })
    }

    fn host_membership(&self, action: &'static str) -> Result<Membership, CommandError> {
        let member = self.membership()?;
        if !member.host {
            return Err(CommandError::NotHost(action));
        }
        Ok(member)
    }
}

fn required<'a>(cmd: &'a Command, key: &'static str) -> Result<&'a str, CommandError> {
    cmd.field(key)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(CommandError::MissingField(key))
}

fn ensure_turn(game: &Game, player_name: &str) -> Result<(), CommandError> {
    match game.player_index(player_name) {
        Some(index) if index == game.active_player => Ok(()),
        _ => Err(CommandError::NotYourTurn),
    }
}
