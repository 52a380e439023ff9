//! Versioned, compressed save-game serialization for Turnwire.
//!
//! A save is a gzip stream: engine-version token, a point-in-time state
//! snapshot taken under the state read lock, then a sequence of
//! delegate records closed by an end marker. Loading verifies the
//! version first (one legacy version is tolerated, through registered
//! migrations), then re-creates delegates through an explicit factory
//! registry — never by trusting a type name in the file.
//!
//! # Key types
//!
//! - [`GameDataManager`] — the save/load pipeline
//! - [`GameState`] / [`SharedState`] — the snapshot and its lock
//! - [`Delegate`] / [`DelegateRegistry`] — per-phase state owners and
//!   their factories
//! - [`MigrationSet`] — version-keyed patch rules
//! - [`SaveError`] — everything that can go wrong

mod delegate;
mod error;
pub mod format;
mod manager;
mod migrate;
mod state;
mod version;

pub use delegate::{Delegate, DelegateFactory, DelegateRegistry};
pub use error::SaveError;
pub use manager::{GameDataManager, LoadedGame, SAVE_EXTENSION};
pub use migrate::MigrationSet;
pub use state::{GameState, SharedState, shared};
pub use version::EngineVersion;
