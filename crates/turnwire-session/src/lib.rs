//! Login validation and access control for Turnwire.
//!
//! This crate is the hub's gatekeeper:
//!
//! 1. **Challenge-response** — [`LoginValidator`] issues per-name salt
//!    challenges and checks the response properties.
//! 2. **Enforcement** — protocol version, blocked words, and bans by
//!    username, source address, and hashed hardware id, in a fixed
//!    order with the first failure terminal.
//! 3. **Audit** — every attempt lands in an [`AccessLog`].
//!
//! The stores behind the checks ([`AccountDirectory`], [`BanRegistry`],
//! [`WordFilter`], [`AccessLog`]) are contracts; in-memory
//! implementations for embedding and tests live in [`memory`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Hub handler (above)   ← runs the handshake over the wire
//!     ↕
//! Session layer (this crate)   ← decides who gets in, and logs it
//!     ↕
//! Stores (below)   ← accounts, bans, word list, audit sink
//! ```

mod directory;
mod error;
pub mod keys;
pub mod memory;
mod validator;

pub use directory::{
    AccessLog, Account, AccountDirectory, Ban, BanRegistry, LoginAttempt,
    LoginOutcome, TracingAccessLog, WordFilter,
};
pub use error::AuthError;
pub use validator::{LoginKind, LoginRules, LoginValidator};
