//! Wire protocol for Turnwire.
//!
//! This crate defines the "language" that a hub and its spokes speak:
//!
//! - **Types** ([`Envelope`], [`Invoke`], [`SpokeInvoke`],
//!   [`SystemMessage`], …) — the message structures that travel on the
//!   wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`], [`BincodeCodec`]) — how
//!   those messages become bytes and come back.
//! - **Errors** ([`ProtocolError`]) — what can go wrong in between.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the hub's
//! session/dispatch layers. It knows nothing about connections, logins,
//! or registered objects — only how one message is represented.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session / Dispatch
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "bincode")]
pub use codec::BincodeCodec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    CallArg, CallId, Envelope, Invoke, InvokeResult, Node, Payload,
    RemoteFailure, RemoteMethodCall, RemoteName, SpokeInvoke, SystemMessage,
};
