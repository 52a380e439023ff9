//! Delegates and the factory registry that re-creates them at load
//! time.
//!
//! A delegate owns one phase of gameplay logic and its serializable
//! state. The save stream stores, per delegate, its instance name,
//! display name, kind id, and an opaque state blob. Kinds resolve
//! through an explicit registry of constructors — a save can only ever
//! instantiate delegate kinds the host program registered, never an
//! arbitrary type named by the file.

use std::collections::HashMap;

use crate::SaveError;

/// One rules-engine component with serializable state.
///
/// `kind` is the stable id the save stream stores and the registry
/// resolves; `name`/`display_name` are per-instance (one kind may be
/// instantiated several times under different names, e.g. one battle
/// delegate per theater).
pub trait Delegate: Send {
    /// Stable kind id, the registry key. Must not change across
    /// releases or old saves stop loading.
    fn kind(&self) -> &str;

    /// Instance name.
    fn name(&self) -> &str;

    /// Human-facing name.
    fn display_name(&self) -> &str;

    /// Applies the identity stored in the save record. Called once,
    /// right after the factory builds the instance.
    fn initialize(&mut self, name: &str, display_name: &str);

    /// Serializes this delegate's state to an opaque blob.
    fn save_state(&self) -> Result<Vec<u8>, SaveError>;

    /// Restores state from a blob previously produced by
    /// [`save_state`](Self::save_state).
    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SaveError>;
}

/// Constructor for one delegate kind.
pub type DelegateFactory = Box<dyn Fn() -> Box<dyn Delegate> + Send + Sync>;

/// Maps kind ids to constructors.
#[derive(Default)]
pub struct DelegateRegistry {
    factories: HashMap<String, DelegateFactory>,
}

impl DelegateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for a kind, replacing any previous one.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Delegate> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    /// Builds a fresh, uninitialized delegate of the given kind.
    ///
    /// # Errors
    /// [`SaveError::UnknownDelegate`] if no factory is registered.
    pub fn create(&self, kind: &str) -> Result<Box<dyn Delegate>, SaveError> {
        self.factories
            .get(kind)
            .map(|factory| factory())
            .ok_or_else(|| SaveError::UnknownDelegate(kind.to_string()))
    }

    /// Whether a factory is registered for `kind`.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }
}

impl std::fmt::Debug for DelegateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
