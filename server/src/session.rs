//! Player identity that outlives a single connection
//!
//! A [`Session`] is handed to a client on first contact and presented again
//! when it reconnects, which is how a player gets their seat back after a
//! dropped connection. The [`SessionManager`] issues and resumes sessions and
//! keeps a roster of the live connections on this server process.

use crate::error::StoreError;
use crate::repository::SessionRepository;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Durable identity of one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub player_name: String,
    /// Game the player currently sits in
    pub game_id: Option<String>,
    pub host: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            player_name: String::new(),
            game_id: None,
            host: false,
        }
    }

    pub fn bind(&mut self, game_id: &str, player_name: &str, host: bool) {
        self.game_id = Some(game_id.to_string());
        self.player_name = player_name.to_string();
        self.host = host;
    }

    /// Clears the game membership, returning the id of the game left
    pub fn detach(&mut self) -> Option<String> {
        self.host = false;
        self.game_id.take()
    }

    pub fn active_game(&self) -> Option<&str> {
        self.game_id.as_deref()
    }
}

/// A connection currently open against this server
#[derive(Debug, Clone)]
pub struct LiveConnection {
    pub id: u32,
    pub addr: SocketAddr,
    pub session_id: Option<String>,
    pub connected_at: Instant,
}

/// Issues, resumes and persists sessions
pub struct SessionManager {
    repository: SessionRepository,
    connections: Mutex<HashMap<u32, LiveConnection>>,
    next_connection_id: AtomicU32,
}

impl SessionManager {
    pub fn new(repository: SessionRepository) -> Self {
        Self {
            repository,
            connections: Mutex::new(HashMap::new()),
            next_connection_id: AtomicU32::new(1),
        }
    }

    /// Registers a new connection and returns its id
    pub async fn connect(&self, addr: SocketAddr) -> u32 {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().await.insert(
            id,
            LiveConnection {
                id,
                addr,
                session_id: None,
                connected_at: Instant::now(),
            },
        );
        info!("Connection {} opened from {}", id, addr);
        id
    }

    /// Forgets a connection. Its session record stays in the store so the
    /// player can resume later.
    pub async fn disconnect(&self, connection_id: u32) -> bool {
        match self.connections.lock().await.remove(&connection_id) {
            Some(connection) => {
                info!(
                    "Connection {} closed after {:?}",
                    connection_id,
                    connection.connected_at.elapsed()
                );
                true
            }
            None => false,
        }
    }

    /// Records which session a connection is speaking for
    pub async fn attach(&self, connection_id: u32, session_id: &str) {
        if let Some(connection) = self.connections.lock().await.get_mut(&connection_id) {
            connection.session_id = Some(session_id.to_string());
        }
    }

    /// Connections currently speaking for `session_id`
    pub async fn connections_for(&self, session_id: &str) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .connections
            .lock()
            .await
            .values()
            .filter(|connection| connection.session_id.as_deref() == Some(session_id))
            .map(|connection| connection.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Resumes the session with id `resume`, or starts a fresh one
    ///
    /// An unknown, expired or unreadable session silently becomes a new one.
    /// Either way the session is written back so its time-to-live restarts.
    pub async fn open(&self, resume: Option<&str>) -> Result<Session, StoreError> {
        let resumed = match resume.filter(|id| !id.is_empty()) {
            Some(id) => match self.repository.load(id).await {
                Ok(found) => found,
                Err(StoreError::Codec(e)) => {
                    warn!("Discarding unreadable session {}: {}", id, e);
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let session = match resumed {
            Some(session) => {
                debug!("Resumed session {}", session.id);
                session
            }
            None => {
                let session = Session::new();
                debug!("Created session {}", session.id);
                session
            }
        };

        self.repository.save(&session).await?;
        Ok(session)
    }

    pub async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.repository.save(session).await
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
