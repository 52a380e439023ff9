//! # Turnwire
//!
//! Hub-and-spoke remote invocation and turn synchronization for
//! turn-based multiplayer games.
//!
//! A Turnwire hub is the one authoritative node in a game's network.
//! Spokes log in through a challenge-response handshake (with ban and
//! version enforcement), register the remote objects they host, and
//! invoke each other's objects through the hub — which routes calls to
//! the hosting node and results back to the invoker, and gates turn
//! advancement until every outstanding acknowledgment has arrived.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use turnwire::prelude::*;
//! use turnwire_session::memory::{
//!     MemoryAccessLog, MemoryBans, MemoryDirectory, MemoryWordFilter,
//! };
//!
//! # async fn run() -> Result<(), turnwire::TurnwireError> {
//! let validator = LoginValidator::new(
//!     MemoryDirectory::new(),
//!     MemoryBans::new(),
//!     MemoryWordFilter::default(),
//!     TracingAccessLog,
//!     LoginRules::default(),
//! );
//!
//! let hub = HubServer::<JsonCodec>::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(validator)
//!     .await?;
//! hub.run().await
//! # }
//! ```

mod error;
mod handler;
mod registry;
mod server;

pub use error::TurnwireError;
pub use registry::{
    DispatchError, PendingCall, PendingCalls, RemoteObject, RemoteRegistry,
    RouteTable,
};
pub use server::{HubConfig, HubServer, HubServerBuilder};

/// The types most embedders need, in one import.
pub mod prelude {
    pub use crate::{
        DispatchError, HubConfig, HubServer, HubServerBuilder, RemoteObject,
        TurnwireError,
    };
    pub use turnwire_protocol::{
        CallArg, CallId, Envelope, Invoke, InvokeResult, JsonCodec, Node,
        Payload, RemoteFailure, RemoteMethodCall, RemoteName, SpokeInvoke,
        SystemMessage,
    };
    pub use turnwire_session::{
        LoginKind, LoginRules, LoginValidator, TracingAccessLog,
    };
    pub use turnwire_sync::{CountUpAndDownLatch, PhaseGate};
}
