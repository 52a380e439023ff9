//! The game-state snapshot a save stream captures.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// The full in-memory game state, as one serializable snapshot.
///
/// Turnwire doesn't know game rules; from its point of view the state
/// is an identified bag of named properties plus the turn counter. The
/// rules engine layers its own meaning on top through delegates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Human-facing name of the game ("Big World 1942").
    pub game_name: String,
    /// Unique id of this particular game instance; survives save/load
    /// and identifies the game across hosts.
    pub game_id: String,
    /// Current round number.
    pub round: u32,
    /// Named game properties (options, toggles, scenario values).
    pub properties: BTreeMap<String, String>,
}

impl GameState {
    pub fn new(game_name: impl Into<String>, game_id: impl Into<String>) -> Self {
        Self {
            game_name: game_name.into(),
            game_id: game_id.into(),
            round: 0,
            properties: BTreeMap::new(),
        }
    }
}

/// The state as the rest of the system holds it: shared by reference,
/// guarded by a read-write lock.
///
/// The owning game-loop thread is the only writer; readers (UI, save)
/// take the read lock. Saving under the read lock is what guarantees a
/// point-in-time consistent snapshot while game logic keeps running —
/// the lock discipline is the only defense against torn reads.
pub type SharedState = Arc<RwLock<GameState>>;

/// Wraps a state in the shared form.
pub fn shared(state: GameState) -> SharedState {
    Arc::new(RwLock::new(state))
}
