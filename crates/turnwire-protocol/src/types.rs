//! Core protocol types for Turnwire's wire format.
//!
//! Everything in this module travels on the wire between a hub and its
//! spokes: node identities, method-call envelopes, invocation results,
//! and the system messages that drive the login handshake and remote
//! registration. The hub never inspects argument payloads — they are
//! opaque codec-encoded bytes tagged with their declared type.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identity of one participant in the network: a display name plus the
/// address it connected from.
///
/// Nodes are immutable once created. Equality and hashing cover both
/// fields, so two sessions from the same host with different names (or
/// the same name re-used after a reconnect from a new port) are distinct
/// participants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    /// The participant's unique display name, assigned at login.
    pub name: String,
    /// The socket address the participant connected from.
    pub address: SocketAddr,
}

impl Node {
    /// Creates a node identity.
    pub fn new(name: impl Into<String>, address: SocketAddr) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.address)
    }
}

/// Name under which a remote object is registered for dispatch.
///
/// Newtype over `String` so a remote name can't be confused with a
/// method name or a player name in a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteName(pub String);

impl RemoteName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for RemoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation id matching an asynchronous reply to its invocation.
///
/// 128 random bits, generated caller-side, so ids are unique across all
/// nodes without coordination. Collisions are not a practical concern at
/// this width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u128);

impl CallId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{:032x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Method-call envelope
// ---------------------------------------------------------------------------

/// One argument of a remote call: the declared type name plus the
/// codec-encoded value.
///
/// Carrying the type name alongside the bytes preserves argument
/// identity through serialization — the dispatcher can check that what
/// arrived is what the caller declared before handing the bytes to the
/// target object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallArg {
    /// Declared type of the value, e.g. `"u32"` or `"PhaseChange"`.
    pub type_name: String,
    /// The codec-encoded value.
    pub bytes: Vec<u8>,
}

impl CallArg {
    pub fn new(type_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            bytes,
        }
    }
}

/// Descriptor of one cross-node method invocation, uniform regardless of
/// transport: which registered object, which method, which arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMethodCall {
    /// The registered object the call targets.
    pub target: RemoteName,
    /// Method name on the target.
    pub method: String,
    /// Encoded arguments, in declaration order.
    pub args: Vec<CallArg>,
}

impl RemoteMethodCall {
    pub fn new(
        target: RemoteName,
        method: impl Into<String>,
        args: Vec<CallArg>,
    ) -> Self {
        Self {
            target,
            method: method.into(),
            args,
        }
    }
}

/// A method call paired with its correlation id and whether the caller
/// blocks for a result.
///
/// Field order is part of the wire contract: `call_id`, `needs_return`,
/// `call`. [`SpokeInvoke`] extends this envelope and must keep these
/// fields first so both shapes share a common prefix on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoke {
    /// Unique id used to match the eventual [`InvokeResult`].
    pub call_id: CallId,
    /// Whether the caller is blocked waiting on a return value.
    pub needs_return: bool,
    /// The call itself.
    pub call: RemoteMethodCall,
}

impl Invoke {
    /// Wraps a call with a freshly generated id.
    pub fn new(call: RemoteMethodCall, needs_return: bool) -> Self {
        Self {
            call_id: CallId::generate(),
            needs_return,
            call,
        }
    }
}

/// An [`Invoke`] as sent by a spoke in a hub-and-spoke topology.
///
/// Carries the originating node so the hub can forward the call to the
/// peer hosting the target and route the eventual result back to the
/// invoker — spokes never talk to each other directly.
///
/// The base envelope serializes first, then the invoker; reader and
/// writer must agree on that order or every subsequent message on the
/// stream is corrupt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpokeInvoke {
    /// The base envelope (serialized first).
    pub invoke: Invoke,
    /// The node that originated the call.
    pub invoker: Node,
}

impl SpokeInvoke {
    pub fn new(invoke: Invoke, invoker: Node) -> Self {
        Self { invoke, invoker }
    }

    /// The correlation id of the wrapped envelope.
    pub fn call_id(&self) -> CallId {
        self.invoke.call_id
    }
}

// ---------------------------------------------------------------------------
// Invocation results
// ---------------------------------------------------------------------------

/// Why a dispatched call produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RemoteFailure {
    /// No object is registered under the target name.
    #[error("no remote object registered under '{0}'")]
    TargetNotFound(RemoteName),

    /// The target object rejected or failed the call.
    #[error("invocation failed: {0}")]
    Invocation(String),
}

/// Reply to an [`Invoke`] whose `needs_return` flag was set, routed back
/// to the invoker by `call_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeResult {
    /// Id of the invocation this result answers.
    pub call_id: CallId,
    /// The encoded return value (`None` for unit-returning methods), or
    /// the failure that prevented one.
    pub outcome: Result<Option<Vec<u8>>, RemoteFailure>,
}

// ---------------------------------------------------------------------------
// System messages
// ---------------------------------------------------------------------------

/// Framework-level messages: the login handshake and remote-object
/// registration. Game code never constructs these.
///
/// The login challenge and response are free-form property maps rather
/// than fixed fields; the key constants live in `turnwire-session` next
/// to the validator that interprets them. A `BTreeMap` keeps the encoded
/// form stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    // -- Login handshake --
    /// Client → Hub: "I want to log in under this name."
    LoginName { name: String },

    /// Hub → Client: challenge properties (salt et al.) for the name
    /// presented in `LoginName`.
    LoginChallenge {
        properties: BTreeMap<String, String>,
    },

    /// Client → Hub: response properties (version, credentials, hashed
    /// hardware id).
    LoginResponse {
        properties: BTreeMap<String, String>,
    },

    /// Hub → Client: outcome of the attempt. `error` is `None` on
    /// success, in which case `node` carries the identity the hub
    /// assigned (the requested name, deduplicated if taken).
    LoginResult {
        error: Option<String>,
        node: Option<Node>,
    },

    // -- Remote registration --
    /// Client → Hub: "I host the remote object with this name."
    RegisterRemote { name: RemoteName },

    /// Client → Hub: withdraw a previous registration.
    UnregisterRemote { name: RemoteName },

    // -- Lifecycle --
    /// Either direction: the sender is going away.
    Disconnect { reason: String },

    /// Hub → Client: a message was understood but could not be acted
    /// on (e.g. registering a remote name another node already holds).
    /// Informational — the connection stays up.
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// What an envelope carries: a system message, an invocation in one of
/// its two shapes, or an invocation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Framework plumbing (login, registration, disconnect).
    System(SystemMessage),

    /// A direct invocation of an object registered at the receiver.
    Invoke(Invoke),

    /// An invocation relayed through the hub on behalf of a spoke.
    SpokeInvoke(SpokeInvoke),

    /// A result routed back to a blocked caller.
    Reply(InvokeResult),
}

/// The top-level wire unit. Every message on a connection is one
/// envelope.
///
/// `seq` increments per sender per connection; receivers use it to
/// assert arrival-order processing within a connection (no ordering is
/// promised across connections).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-connection sequence number.
    pub seq: u64,
    /// The message content.
    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================
