//! `HubServer` builder and accept loop.
//!
//! This is the entry point for running a Turnwire hub — the one
//! authoritative node every spoke connects to. It ties the layers
//! together: transport → protocol → session → dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use turnwire_protocol::{Codec, JsonCodec, Node, Payload, RemoteName};
use turnwire_session::LoginValidator;
use turnwire_sync::PhaseGate;
use turnwire_transport::{Transport, WebSocketTransport};

use crate::TurnwireError;
use crate::handler::handle_connection;
use crate::registry::{PendingCalls, RemoteObject, RemoteRegistry, RouteTable};

/// Hub-level settings.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address the hub listens on.
    pub bind_addr: String,
    /// How long a freshly-accepted connection gets to finish the login
    /// handshake before it is dropped.
    pub handshake_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Outbound channel to one connected node's writer task.
pub(crate) type NodeSender = mpsc::UnboundedSender<Payload>;

/// Shared hub state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks; interior
/// mutability via `Mutex` where needed. The registries are plain maps —
/// these locks are their only guard.
pub(crate) struct HubState<C: Codec> {
    pub(crate) codec: C,
    pub(crate) config: HubConfig,
    pub(crate) validator: LoginValidator,
    pub(crate) registry: Mutex<RemoteRegistry>,
    pub(crate) routes: Mutex<RouteTable>,
    pub(crate) pending: Mutex<PendingCalls>,
    pub(crate) nodes: Mutex<HashMap<Node, NodeSender>>,
    /// Counts outstanding forwarded calls that expect a return value.
    /// The game-logic thread parks on this gate before advancing a
    /// phase; see [`HubServer::ack_gate`].
    pub(crate) gate: Arc<PhaseGate>,
}

/// Builder for configuring and starting a hub.
pub struct HubServerBuilder {
    config: HubConfig,
}

impl HubServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: HubConfig::default(),
        }
    }

    /// Sets the address to bind the hub to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the login-handshake timeout.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Builds the hub with the given login validator.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport` as defaults.
    pub async fn build(
        self,
        validator: LoginValidator,
    ) -> Result<HubServer<JsonCodec>, TurnwireError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(HubState {
            codec: JsonCodec,
            config: self.config,
            validator,
            registry: Mutex::new(RemoteRegistry::new()),
            routes: Mutex::new(RouteTable::new()),
            pending: Mutex::new(PendingCalls::new()),
            nodes: Mutex::new(HashMap::new()),
            gate: Arc::new(PhaseGate::new()),
        });

        Ok(HubServer { transport, state })
    }
}

impl Default for HubServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Turnwire hub.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct HubServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<HubState<C>>,
}

impl<C: Codec> HubServer<C> {
    /// Creates a new builder.
    pub fn builder() -> HubServerBuilder {
        HubServerBuilder::new()
    }

    /// Returns the local address the hub is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Registers an object hosted on the hub itself, dispatchable by
    /// every spoke. Usually done once at startup, before `run`.
    ///
    /// # Errors
    /// [`TurnwireError::Dispatch`] if the name is already taken.
    pub async fn register_remote(
        &self,
        name: RemoteName,
        object: Box<dyn RemoteObject>,
    ) -> Result<(), TurnwireError> {
        self.state.registry.lock().await.register(name, object)?;
        Ok(())
    }

    /// The acknowledgment gate: every forwarded invocation that expects
    /// a return value joins it, every routed (or failed) reply
    /// acknowledges it. A game-logic thread that must not advance the
    /// turn until all remote calls have come back parks on this gate.
    pub fn ack_gate(&self) -> Arc<PhaseGate> {
        Arc::clone(&self.state.gate)
    }

    /// Runs the hub accept loop.
    ///
    /// Accepts incoming connections, performs the login handshake, and
    /// spawns a handler task for each node. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), TurnwireError> {
        tracing::info!("Turnwire hub running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection::<C>(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
