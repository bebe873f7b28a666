//! # Card Game Server Library
//!
//! This library provides the authoritative server for the multiplayer card
//! game. It owns the rules, keeps every game in a shared store and mirrors
//! each change to every connection seated at that game.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rules
//! Every move is checked and applied on the server. Clients only ever see a
//! projection of a game made for their seat: their own hand in full, the
//! other players reduced to hand sizes.
//!
//! ### Player Identity
//! Players are identified by sessions rather than sockets. A session id
//! handed out on first contact can be presented again after a reconnect to
//! get the same seat back.
//!
//! ### State Fan-out
//! Each game write announces itself on the game's topic. Every connection
//! bound to the game runs a watcher that reloads the game on such a
//! notification and pushes the fresh view down its socket.
//!
//! ## Architecture Design
//!
//! ### Pure Engine
//! [`game::Game`] operations borrow the current aggregate and return a new
//! one. A rejected move cannot leave anything half applied, and the rules
//! are tested without a store or runtime.
//!
//! ### Versioned Store
//! [`store::Store`] writes may be conditional on the version that was read.
//! Commands run read, transform, write and redo the whole cycle when another
//! connection wrote first, so concurrent moves are never silently lost.
//!
//! ### Task Per Concern
//! Each socket gets a reader task and a writer task, and each game binding
//! a watcher task. Watchers block only on their subscription and their
//! cancellation signal, never on a command.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Rules state machine: dealing, turn order, modifiers, forced draws,
//! reshuffles and win detection.
//!
//! ### Store and Repository Modules (`store`, `repository`)
//! Expiring, versioned key-value storage with change notifications, and the
//! typed game and session records kept in it.
//!
//! ### Session Module (`session`)
//! Session records and the roster of live connections.
//!
//! ### Watcher Module (`watcher`)
//! Cancellable background tasks that mirror one game to one connection.
//!
//! ### Dispatcher Module (`dispatcher`)
//! Per-connection command routing.
//!
//! ### Network Module (`network`)
//! TCP listener speaking newline-delimited JSON.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use server::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let server = Server::new("127.0.0.1:8080", store, ServerConfig::default()).await?;
//!
//!     // Accepts clients until the listener fails
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod game;
pub mod gamecode;
pub mod network;
pub mod repository;
pub mod session;
pub mod store;
pub mod watcher;
