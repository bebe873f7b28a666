//! Typed persistence for games and sessions on top of a [`Store`]
//!
//! Records are bincode encoded under `game:<id>` and `sessions:<id>`, each
//! written with the configured time-to-live. Game writes are conditional on
//! the version the game was read at and announce themselves on the
//! `game:<id>` topic once stored.

use crate::error::StoreError;
use crate::game::Game;
use crate::session::Session;
use crate::store::Store;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// How long records live after their last write
pub const DEFAULT_TTL: Duration = Duration::from_secs(12 * 60 * 60);

pub fn game_key(game_id: &str) -> String {
    format!("game:{}", game_id)
}

pub fn session_key(session_id: &str) -> String {
    format!("sessions:{}", session_id)
}

#[derive(Clone)]
pub struct GameRepository {
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl GameRepository {
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Loads a game, stamped with the version it was stored at
    pub async fn load(&self, game_id: &str) -> Result<Option<Game>, StoreError> {
        let Some(entry) = self.store.get(&game_key(game_id)).await? else {
            return Ok(None);
        };

        let mut game: Game = bincode::deserialize(&entry.value)?;
        game.version = entry.version;
        Ok(Some(game))
    }

    pub async fn exists(&self, game_id: &str) -> Result<bool, StoreError> {
        self.store.exists(&game_key(game_id)).await
    }

    /// Stores `game` if nobody else wrote it since it was loaded
    ///
    /// A game with version zero must not exist yet. On success watchers of
    /// the game are notified and the stored copy is returned with its new
    /// version. A failed notification is logged and otherwise ignored.
    pub async fn save(&self, game: &Game) -> Result<Game, StoreError> {
        let key = game_key(&game.id);
        let payload = bincode::serialize(game)?;
        let version = self
            .store
            .put(&key, payload, self.ttl, Some(game.version))
            .await?;

        match self.store.publish(&key).await {
            Ok(watchers) => debug!("Saved {} at version {}, {} watchers", key, version, watchers),
            Err(e) => warn!("Failed to announce update of {}: {}", key, e),
        }

        let mut saved = game.clone();
        saved.version = version;
        Ok(saved)
    }

    pub async fn delete(&self, game_id: &str) -> Result<bool, StoreError> {
        self.store.delete(&game_key(game_id), None).await
    }

    /// Deletes `game` if nobody else wrote it since it was loaded
    ///
    /// Watchers are notified the same way as for [`GameRepository::save`].
    pub async fn remove(&self, game: &Game) -> Result<bool, StoreError> {
        let key = game_key(&game.id);
        let removed = self.store.delete(&key, Some(game.version)).await?;

        if let Err(e) = self.store.publish(&key).await {
            warn!("Failed to announce removal of {}: {}", key, e);
        }
        Ok(removed)
    }

    /// Change notifications for one game
    pub async fn subscribe(&self, game_id: &str) -> Result<broadcast::Receiver<()>, StoreError> {
        self.store.subscribe(&game_key(game_id)).await
    }
}

#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn load(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        match self.store.get(&session_key(session_id)).await? {
            Some(entry) => Ok(Some(bincode::deserialize(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Writes the session unconditionally, refreshing its time-to-live
    pub async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let payload = bincode::serialize(session)?;
        self.store
            .put(&session_key(&session.id), payload, self.ttl, None)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        self.store.delete(&session_key(session_id), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn repositories() -> (Arc<MemoryStore>, GameRepository, SessionRepository) {
        let store = Arc::new(MemoryStore::new());
        let games = GameRepository::new(store.clone(), DEFAULT_TTL);
        let sessions = SessionRepository::new(store.clone(), DEFAULT_TTL);
        (store, games, sessions)
    }

    fn new_game() -> Game {
        let mut rng = StdRng::seed_from_u64(3);
        Game::create("ABCD", "Able Brave Cool Duck", &mut rng).add_player("Nia")
    }

    #[test]
    fn test_keys() {
        assert_eq!(game_key("ABCD"), "game:ABCD");
        assert_eq!(session_key("f00"), "sessions:f00");
    }

    #[tokio::test]
    async fn test_save_and_load_game() {
        let (store, games, _) = repositories();
        let game = new_game();

        let saved = games.save(&game).await.unwrap();
        assert!(saved.version > 0);
        assert!(store.exists("game:ABCD").await.unwrap());

        let loaded = games.load("ABCD").await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert!(games.exists("ABCD").await.unwrap());
        assert!(games.load("ZZZZ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_new_game_cannot_overwrite_existing_code() {
        let (_, games, _) = repositories();
        games.save(&new_game()).await.unwrap();

        let clash = games.save(&new_game()).await;
        assert!(matches!(clash, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_stale_write_is_rejected() {
        let (_, games, _) = repositories();
        games.save(&new_game()).await.unwrap();

        let first = games.load("ABCD").await.unwrap().unwrap();
        let second = games.load("ABCD").await.unwrap().unwrap();

        games.save(&first.add_player("Eric")).await.unwrap();
        let lost = games.save(&second.add_player("Zed")).await;
        assert!(matches!(lost, Err(StoreError::Conflict { .. })));

        let stored = games.load("ABCD").await.unwrap().unwrap();
        assert!(stored.player_index("Eric").is_some());
        assert!(stored.player_index("Zed").is_none());
    }

    #[tokio::test]
    async fn test_save_notifies_subscribers() {
        let (_, games, _) = repositories();
        let mut updates = games.subscribe("ABCD").await.unwrap();

        games.save(&new_game()).await.unwrap();
        assert_eq!(updates.recv().await, Ok(()));
    }

    #[tokio::test]
    async fn test_corrupt_game_record() {
        let (store, games, _) = repositories();
        store
            .put("game:BAD!", vec![0xff, 0x01], DEFAULT_TTL, None)
            .await
            .unwrap();

        assert!(matches!(
            games.load("BAD!").await,
            Err(StoreError::Codec(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_game() {
        let (_, games, _) = repositories();
        games.save(&new_game()).await.unwrap();
        assert!(games.delete("ABCD").await.unwrap());
        assert!(games.load("ABCD").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_skips_a_rewritten_game() {
        let (_, games, _) = repositories();
        let saved = games.save(&new_game()).await.unwrap();
        let joined = games.save(&saved.add_player("Zed")).await.unwrap();
        let mut updates = games.subscribe("ABCD").await.unwrap();

        let stale = games.remove(&saved).await;
        assert!(matches!(stale, Err(StoreError::Conflict { .. })));
        assert!(games.exists("ABCD").await.unwrap());

        assert!(games.remove(&joined).await.unwrap());
        assert!(!games.exists("ABCD").await.unwrap());
        assert_eq!(updates.recv().await, Ok(()));
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let (_, _, sessions) = repositories();
        let mut session = Session::new();
        session.bind("ABCD", "Nia", true);

        sessions.save(&session).await.unwrap();
        assert_eq!(sessions.load(&session.id).await.unwrap(), Some(session.clone()));

        assert!(sessions.delete(&session.id).await.unwrap());
        assert_eq!(sessions.load(&session.id).await.unwrap(), None);
    }
}
