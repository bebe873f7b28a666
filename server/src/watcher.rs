//! Background tasks that mirror game changes to one connection
//!
//! Each connection bound to a game owns exactly one watcher. The watcher
//! listens for change notifications on the game's topic, reloads the game
//! and pushes the viewer's projection down the connection's outbound
//! channel. Dropping or stopping the [`WatchHandle`] cancels the task, and a
//! cancelled watcher never pushes again.

use crate::error::StoreError;
use crate::repository::GameRepository;
use log::{debug, warn};
use shared::{GameState, GameStatus, GameUpdate};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Who a watcher renders the game for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub connection: u32,
    pub player_name: String,
    pub host: bool,
}

/// Owning handle of a running watcher
#[derive(Debug)]
pub struct WatchHandle {
    game_id: String,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the watcher and waits for it to exit
    pub async fn stop(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("Watcher for game {} ended abnormally: {}", self.game_id, e);
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

/// Current status of `game_id` as `viewer` should see it
///
/// A game that is gone, unreadable or abandoned is reported as abandoned.
pub async fn current_status(games: &GameRepository, game_id: &str, viewer: &Viewer) -> GameStatus {
    match games.load(game_id).await {
        Ok(Some(game)) if game.state != GameState::Abandoned => {
            game.status_for(&viewer.player_name, viewer.host)
        }
        Ok(_) => GameStatus::abandoned(game_id, viewer.host),
        Err(e) => {
            warn!("Failed to reload game {}: {}", game_id, e);
            GameStatus::abandoned(game_id, viewer.host)
        }
    }
}

/// Serializes a state push onto a connection's outbound channel
///
/// Returns false once the connection has gone away.
pub fn push(outbound: &mpsc::UnboundedSender<String>, status: GameStatus) -> bool {
    match serde_json::to_string(&GameUpdate::new(status)) {
        Ok(line) => outbound.send(line).is_ok(),
        Err(e) => {
            warn!("Failed to encode game update: {}", e);
            true
        }
    }
}

/// Starts watching `game_id` on behalf of `viewer`
///
/// The subscription is in place before this returns, so any write that
/// happens afterwards reaches the viewer.
pub async fn watch(
    games: GameRepository,
    game_id: &str,
    viewer: Viewer,
    outbound: mpsc::UnboundedSender<String>,
) -> Result<WatchHandle, StoreError> {
    let mut updates = games.subscribe(game_id).await?;
    let (cancel, mut cancelled) = oneshot::channel::<()>();
    let id = game_id.to_string();

    debug!(
        "Connection {} watching game {} as {}",
        viewer.connection, id, viewer.player_name
    );

    let task = tokio::spawn({
        let id = id.clone();
        async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancelled => break,
                    received = updates.recv() => match received {
                        Ok(()) => {}
                        Err(RecvError::Lagged(missed)) => {
                            debug!("Watcher for {} skipped {} notifications", id, missed);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }

                let status = current_status(&games, &id, &viewer).await;

                // Cancellation may have arrived while the game was loading
                if !matches!(cancelled.try_recv(), Err(TryRecvError::Empty)) {
                    break;
                }
                if !push(&outbound, status) {
                    break;
                }
            }

            debug!(
                "Connection {} stopped watching game {}",
                viewer.connection, id
            );
        }
    });

    Ok(WatchHandle {
        game_id: id,
        cancel: Some(cancel),
        task,
    })
}
