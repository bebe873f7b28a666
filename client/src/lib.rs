//! # Card Game Client Library
//!
//! Terminal client for the card game server. The server is authoritative:
//! the client never applies a move itself, it sends the command, shows the
//! response and prints every state push that arrives for its game.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! TCP connection speaking newline-delimited JSON:
//! - Request ids pair each command with its response
//! - Game pushes are queued apart from responses
//! - The session id is kept so a restarted client can resume its seat
//!
//! ### Input Module (`input`)
//! Parses the commands typed at the prompt into actions.
//!
//! ### Rendering Module (`rendering`)
//! Formats a player's view of the game as text.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::GameClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = GameClient::connect("127.0.0.1:8080").await?;
//!     let session = client.open_session(None).await?;
//!     println!("Session {}", session);
//!
//!     let status = client.create_game("Nia").await?;
//!     println!("{}", client::rendering::render_status(&status));
//!
//!     while let Some(update) = client.next_update().await {
//!         println!("{}", client::rendering::render_status(&update));
//!     }
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod network;
pub mod rendering;
