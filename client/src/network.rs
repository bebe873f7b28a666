//! Client side of the newline-delimited JSON protocol
//!
//! A [`GameClient`] sends one command at a time and waits for the response
//! carrying the same request id. Game pushes that arrive in between are
//! queued separately and read with [`GameClient::next_update`].

use log::{debug, info, warn};
use shared::{Color, Command, GameStatus, Response, ServerMessage, Verb};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

/// How long a command may wait for its response
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("{0}")]
    Rejected(String),

    #[error("Server closed the connection")]
    Disconnected,

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Unexpected response to {0}")]
    UnexpectedReply(&'static str),
}

/// Callers waiting on a response by request id, `None` once the server hung up
type Pending = Arc<Mutex<Option<HashMap<String, oneshot::Sender<Response>>>>>;

pub struct GameClient {
    writer: OwnedWriteHalf,
    pending: Pending,
    updates: mpsc::UnboundedReceiver<GameStatus>,
    reader_task: JoinHandle<()>,
    next_request: u64,
    session_id: Option<String>,
}

impl GameClient {
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", addr);

        let (reader, writer) = stream.into_split();
        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));
        let (update_tx, updates) = mpsc::unbounded_channel();

        let reader_task = {
            let pending = Arc::clone(&pending);
            tokio::spawn(async move {
                let mut lines = BufReader::new(reader).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => route(&line, &pending, &update_tx).await,
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Error reading from server: {}", e);
                            break;
                        }
                    }
                }
                // Wakes every caller still waiting on a response
                pending.lock().await.take();
                debug!("Server connection closed");
            })
        };

        Ok(Self {
            writer,
            pending,
            updates,
            reader_task,
            next_request: 0,
            session_id: None,
        })
    }

    /// Session id handed out by the server, once a session is open
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        !self.reader_task.is_finished()
    }

    /// Sends one command and waits for its response
    pub async fn request(&mut self, verb: Verb, fields: &[(&str, &str)]) -> Result<Response, ClientError> {
        self.next_request += 1;
        let mut cmd = Command::new(self.next_request.to_string(), verb);
        for (key, value) in fields {
            cmd = cmd.with(key, *value);
        }

        let (tx, rx) = oneshot::channel();
        match self.pending.lock().await.as_mut() {
            Some(waiting) => waiting.insert(cmd.req_id.clone(), tx),
            None => return Err(ClientError::Disconnected),
        };

        let mut line = serde_json::to_string(&cmd)?;
        line.push('\n');
        if let Err(e) = self.writer.write_all(line.as_bytes()).await {
            self.forget(&cmd.req_id).await;
            return Err(e.into());
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ClientError::Disconnected),
            Err(_) => {
                self.forget(&cmd.req_id).await;
                Err(ClientError::Timeout(REQUEST_TIMEOUT))
            }
        }
    }

    async fn forget(&self, req_id: &str) {
        if let Some(waiting) = self.pending.lock().await.as_mut() {
            waiting.remove(req_id);
        }
    }

    /// Opens a fresh session, or resumes `resume` if the server still has it
    pub async fn open_session(&mut self, resume: Option<&str>) -> Result<String, ClientError> {
        let fields: Vec<(&str, &str)> = resume.map(|id| ("sessionId", id)).into_iter().collect();
        let response = accepted(self.request(Verb::OpenSession, &fields).await?)?;

        let session_id = match &response.data {
            shared::ResponseData::Fields(data) => data.get("sessionId").cloned(),
            shared::ResponseData::Game(_) => None,
        }
        .ok_or(ClientError::UnexpectedReply("openSession"))?;

        if resume.is_some_and(|id| id != session_id) {
            info!("Session {} expired, started {}", resume.unwrap_or_default(), session_id);
        }
        self.session_id = Some(session_id.clone());
        Ok(session_id)
    }

    pub async fn create_game(&mut self, player_name: &str) -> Result<GameStatus, ClientError> {
        self.game_command(Verb::CreateGame, &[("playerName", player_name)])
            .await
    }

    pub async fn join_game(&mut self, game_id: &str, player_name: &str) -> Result<GameStatus, ClientError> {
        self.game_command(
            Verb::JoinGame,
            &[("gameId", game_id), ("playerName", player_name)],
        )
        .await
    }

    pub async fn leave_game(&mut self) -> Result<GameStatus, ClientError> {
        self.game_command(Verb::LeaveGame, &[]).await
    }

    pub async fn start_game(&mut self) -> Result<GameStatus, ClientError> {
        self.game_command(Verb::StartGame, &[]).await
    }

    pub async fn restart_game(&mut self) -> Result<GameStatus, ClientError> {
        self.game_command(Verb::RestartGame, &[]).await
    }

    pub async fn end_game(&mut self) -> Result<GameStatus, ClientError> {
        self.game_command(Verb::EndGame, &[]).await
    }

    pub async fn play_card(&mut self, index: usize, wild_color: Option<Color>) -> Result<GameStatus, ClientError> {
        let index = index.to_string();
        let color = wild_color.map(|c| c.to_string()).unwrap_or_default();
        self.game_command(
            Verb::PlayCard,
            &[("cardIndex", &index), ("wildColor", &color)],
        )
        .await
    }

    pub async fn draw_card(&mut self) -> Result<GameStatus, ClientError> {
        self.game_command(Verb::DrawCard, &[]).await
    }

    pub async fn done_drawing(&mut self) -> Result<GameStatus, ClientError> {
        self.game_command(Verb::DoneDrawing, &[]).await
    }

    /// Waits for the next game push, `None` once the connection is gone
    pub async fn next_update(&mut self) -> Option<GameStatus> {
        self.updates.recv().await
    }

    pub fn try_update(&mut self) -> Option<GameStatus> {
        self.updates.try_recv().ok()
    }

    async fn game_command(&mut self, verb: Verb, fields: &[(&str, &str)]) -> Result<GameStatus, ClientError> {
        let response = accepted(self.request(verb, fields).await?)?;
        response
            .status()
            .cloned()
            .ok_or(ClientError::UnexpectedReply(verb.as_str()))
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

fn accepted(response: Response) -> Result<Response, ClientError> {
    if response.error {
        let message = response.message().unwrap_or("Unknown error").to_string();
        return Err(ClientError::Rejected(message));
    }
    Ok(response)
}

async fn route(line: &str, pending: &Pending, updates: &mpsc::UnboundedSender<GameStatus>) {
    match serde_json::from_str::<ServerMessage>(line) {
        Ok(ServerMessage::Response(response)) => {
            let waiter = pending
                .lock()
                .await
                .as_mut()
                .and_then(|waiting| waiting.remove(&response.req_id));
            match waiter {
                Some(waiter) => {
                    let _ = waiter.send(response);
                }
                None => warn!(
                    "Dropping response to unknown request '{}': {:?}",
                    response.req_id,
                    response.message()
                ),
            }
        }
        Ok(ServerMessage::Update(update)) => {
            let _ = updates.send(update.status);
        }
        Err(e) => warn!("Ignoring unreadable server message: {}", e),
    }
}
