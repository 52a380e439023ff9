//! Per-connection handler: login handshake, then the invoke dispatch
//! loop.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The flow is:
//!
//!   1. `LoginName` → challenge → `LoginResponse` → validate → `LoginResult`
//!   2. Register the node and spawn its outbound writer task
//!   3. Loop: receive envelopes → dispatch invocations, route spoke
//!      calls and replies, handle registrations
//!
//! Messages on one connection are processed in arrival order — this
//! task is the only reader of its socket. A frame that fails to decode
//! condemns only itself; the loop continues with the next frame.

use std::sync::Arc;

use tokio::sync::mpsc;
use turnwire_protocol::{
    Codec, Envelope, Invoke, InvokeResult, Node, Payload, ProtocolError,
    RemoteFailure, SpokeInvoke, SystemMessage,
};
use turnwire_transport::{Connection, WebSocketConnection};

use crate::TurnwireError;
use crate::server::{HubState, NodeSender};

/// Drop guard that cleans a node out of the hub when its handler
/// exits, however it exits. Since `Drop` is synchronous, the async
/// cleanup runs in a fire-and-forget task.
struct NodeGuard<C: Codec> {
    node: Node,
    state: Arc<HubState<C>>,
}

impl<C: Codec> Drop for NodeGuard<C> {
    fn drop(&mut self) {
        let node = self.node.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            cleanup_node(&state, &node).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<HubState<C>>,
) -> Result<(), TurnwireError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Login handshake ---
    let (requested_name, kind, mut seq) = perform_login(&conn, &state).await?;

    // --- Step 2: Reserve the identity, then answer ---
    // The node goes into the map *before* the success result is sent,
    // so a second login under the same name can never race past the
    // dedup check, and routing to this node works the instant the
    // client learns its identity.
    let (tx, rx) = mpsc::unbounded_channel::<Payload>();
    let node = {
        let mut nodes = state.nodes.lock().await;
        let taken = |candidate: &str| nodes.keys().any(|n| n.name == candidate);
        let mut assigned = requested_name.clone();
        let mut n = 1;
        while taken(&assigned) {
            assigned = format!("{requested_name} ({n})");
            n += 1;
        }
        let node = Node::new(assigned, conn.peer_addr());
        nodes.insert(node.clone(), tx);
        node
    };
    let _guard = NodeGuard {
        node: node.clone(),
        state: Arc::clone(&state),
    };

    send_envelope(
        &conn,
        &state,
        &mut seq,
        Payload::System(SystemMessage::LoginResult {
            error: None,
            node: Some(node.clone()),
        }),
    )
    .await?;
    tracing::info!(%conn_id, %node, ?kind, "node logged in");

    let conn = Arc::new(conn);
    spawn_writer(Arc::clone(&conn), Arc::clone(&state), rx, seq);

    // --- Step 3: Message loop ---
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%node, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%node, error = %e, "recv error");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                // The offending frame dies alone; the stream itself is
                // still framed, so keep reading.
                tracing::debug!(%node, error = %e, "failed to decode envelope");
                continue;
            }
        };

        match envelope.payload {
            Payload::System(msg) => {
                if handle_system_message(&state, &node, msg).await {
                    break;
                }
            }
            Payload::Invoke(invoke) => {
                handle_direct_invoke(&state, &node, invoke).await;
            }
            Payload::SpokeInvoke(spoke) => {
                handle_spoke_invoke(&state, &node, spoke).await;
            }
            Payload::Reply(result) => {
                handle_reply(&state, &node, result).await;
            }
        }
    }

    // _guard drops here → node cleanup fires, which also closes the
    // outbound channel and ends the writer task.
    Ok(())
}

// ---------------------------------------------------------------------------
// Login handshake
// ---------------------------------------------------------------------------

/// Runs the challenge-response login up to (but not including) the
/// success answer. Returns the validated requested name, the accepted
/// login kind, and the outbound sequence counter so far; the caller
/// reserves the final identity and sends the `LoginResult`. A rejected
/// attempt is answered here and returned as the error.
async fn perform_login<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<HubState<C>>,
) -> Result<(String, turnwire_session::LoginKind, u64), TurnwireError> {
    let mut seq: u64 = 0;

    // Step 1: the requested name.
    let envelope = recv_during_handshake(conn, state).await?;
    let name = match envelope.payload {
        Payload::System(SystemMessage::LoginName { name }) => name,
        _ => {
            return Err(TurnwireError::Protocol(ProtocolError::InvalidMessage(
                "first message must be LoginName".into(),
            )));
        }
    };

    // Step 2: the challenge (salt) for that name.
    let properties = state.validator.challenge(&name);
    send_envelope(
        conn,
        state,
        &mut seq,
        Payload::System(SystemMessage::LoginChallenge { properties }),
    )
    .await?;

    // Step 3: the response.
    let envelope = recv_during_handshake(conn, state).await?;
    let properties = match envelope.payload {
        Payload::System(SystemMessage::LoginResponse { properties }) => properties,
        _ => {
            return Err(TurnwireError::Protocol(ProtocolError::InvalidMessage(
                "expected LoginResponse".into(),
            )));
        }
    };

    // Step 4: validate and answer. The rejection message is the
    // validator error's display text, verbatim.
    let ip = conn.peer_addr().ip();
    match state.validator.validate(&name, ip, &properties) {
        Err(error) => {
            send_envelope(
                conn,
                state,
                &mut seq,
                Payload::System(SystemMessage::LoginResult {
                    error: Some(error.to_string()),
                    node: None,
                }),
            )
            .await?;
            Err(TurnwireError::Auth(error))
        }
        Ok(kind) => {
            tracing::debug!(%name, ?kind, "login validated");
            Ok((name, kind, seq))
        }
    }
}

async fn recv_during_handshake<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<HubState<C>>,
) -> Result<Envelope, TurnwireError> {
    let data = match tokio::time::timeout(state.config.handshake_timeout, conn.recv())
        .await
    {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(TurnwireError::Protocol(ProtocolError::InvalidMessage(
                "connection closed during login".into(),
            )));
        }
        Ok(Err(e)) => return Err(TurnwireError::Transport(e)),
        Err(_) => {
            return Err(TurnwireError::Protocol(ProtocolError::InvalidMessage(
                "login handshake timed out".into(),
            )));
        }
    };
    Ok(state.codec.decode(&data)?)
}

/// Encodes and sends one envelope directly on the connection. Used
/// during the handshake, before the writer task exists.
async fn send_envelope<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<HubState<C>>,
    seq: &mut u64,
    payload: Payload,
) -> Result<(), TurnwireError> {
    let envelope = Envelope {
        seq: {
            *seq += 1;
            *seq
        },
        payload,
    };
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(TurnwireError::Transport)
}

// ---------------------------------------------------------------------------
// Outbound writer
// ---------------------------------------------------------------------------

/// Spawns the task that owns this connection's outbound half: drains
/// the node's channel, stamps sequence numbers, encodes, sends. Ends
/// when the channel closes (node cleanup) or the socket breaks.
fn spawn_writer<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<HubState<C>>,
    mut rx: mpsc::UnboundedReceiver<Payload>,
    mut seq: u64,
) {
    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            seq += 1;
            let envelope = Envelope { seq, payload };
            let bytes = match state.codec.encode(&envelope) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode outbound envelope");
                    continue;
                }
            };
            if conn.send(&bytes).await.is_err() {
                break;
            }
        }
    });
}

/// Queues a payload for a node's writer. Returns `false` if the node
/// is no longer connected.
async fn send_to_node<C: Codec>(
    state: &Arc<HubState<C>>,
    node: &Node,
    payload: Payload,
) -> bool {
    let sender: Option<NodeSender> = state.nodes.lock().await.get(node).cloned();
    match sender {
        Some(sender) => sender.send(payload).is_ok(),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Handles a system message. Returns `true` if the connection should
/// close.
async fn handle_system_message<C: Codec>(
    state: &Arc<HubState<C>>,
    node: &Node,
    msg: SystemMessage,
) -> bool {
    match msg {
        SystemMessage::RegisterRemote { name } => {
            let result = state
                .routes
                .lock()
                .await
                .register(name.clone(), node.clone());
            if let Err(e) = result {
                send_to_node(
                    state,
                    node,
                    Payload::System(SystemMessage::Error {
                        message: e.to_string(),
                    }),
                )
                .await;
            }
        }

        SystemMessage::UnregisterRemote { name } => {
            if !state.routes.lock().await.unregister(&name, node) {
                tracing::debug!(%node, %name, "unregister of a route not held");
            }
        }

        SystemMessage::Disconnect { reason } => {
            tracing::info!(%node, %reason, "node disconnected");
            return true;
        }

        _ => {
            tracing::debug!(%node, "ignoring unexpected system message");
        }
    }
    false
}

/// An invocation addressed at the hub itself.
async fn handle_direct_invoke<C: Codec>(
    state: &Arc<HubState<C>>,
    node: &Node,
    invoke: Invoke,
) {
    let outcome = state.registry.lock().await.dispatch(&invoke.call);

    if invoke.needs_return {
        send_to_node(
            state,
            node,
            Payload::Reply(InvokeResult {
                call_id: invoke.call_id,
                outcome,
            }),
        )
        .await;
    } else if let Err(failure) = outcome {
        tracing::debug!(%node, %failure, "fire-and-forget invocation failed");
    }
}

/// A spoke's invocation: dispatch here if the hub hosts the target,
/// otherwise forward to the hosting node and remember where the reply
/// goes.
async fn handle_spoke_invoke<C: Codec>(
    state: &Arc<HubState<C>>,
    node: &Node,
    spoke: SpokeInvoke,
) {
    if spoke.invoker != *node {
        // The authenticated identity wins over whatever the envelope
        // claims; a client cannot redirect replies to a third party.
        tracing::warn!(
            %node,
            claimed = %spoke.invoker,
            "spoke invoke with mismatched invoker"
        );
    }
    let invoke = spoke.invoke;
    let target = invoke.call.target.clone();

    // Hub-hosted target: dispatch in place.
    {
        let registry = state.registry.lock().await;
        if registry.contains(&target) {
            let outcome = registry.dispatch(&invoke.call);
            drop(registry);
            if invoke.needs_return {
                send_to_node(
                    state,
                    node,
                    Payload::Reply(InvokeResult {
                        call_id: invoke.call_id,
                        outcome,
                    }),
                )
                .await;
            }
            return;
        }
    }

    // Spoke-hosted target: forward.
    let host = state.routes.lock().await.host_of(&target).cloned();
    match host {
        Some(host) => {
            if invoke.needs_return {
                state
                    .pending
                    .lock()
                    .await
                    .record(invoke.call_id, node.clone(), host.clone());
                state.gate.add_participant();
            }
            let call_id = invoke.call_id;
            let needs_return = invoke.needs_return;
            let delivered =
                send_to_node(state, &host, Payload::Invoke(invoke)).await;
            if !delivered {
                tracing::debug!(%host, %target, "forward failed, host gone");
                if needs_return {
                    if state.pending.lock().await.take(call_id).is_some() {
                        state.gate.acknowledge();
                    }
                    send_to_node(
                        state,
                        node,
                        Payload::Reply(InvokeResult {
                            call_id,
                            outcome: Err(RemoteFailure::TargetNotFound(target)),
                        }),
                    )
                    .await;
                }
            }
        }
        None => {
            tracing::debug!(%node, %target, "invoke on unknown target");
            if invoke.needs_return {
                send_to_node(
                    state,
                    node,
                    Payload::Reply(InvokeResult {
                        call_id: invoke.call_id,
                        outcome: Err(RemoteFailure::TargetNotFound(target)),
                    }),
                )
                .await;
            }
        }
    }
}

/// A reply from the node that executed a forwarded call: route it back
/// to the invoker and release its slot on the gate.
async fn handle_reply<C: Codec>(
    state: &Arc<HubState<C>>,
    node: &Node,
    result: InvokeResult,
) {
    let pending = state.pending.lock().await.take(result.call_id);
    match pending {
        Some(pending) => {
            if pending.host != *node {
                tracing::warn!(
                    %node,
                    expected = %pending.host,
                    call_id = %result.call_id,
                    "reply from unexpected node"
                );
            }
            state.gate.acknowledge();
            send_to_node(state, &pending.invoker, Payload::Reply(result)).await;
        }
        None => {
            tracing::debug!(%node, call_id = %result.call_id, "unmatched reply");
        }
    }
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

/// Removes every trace of a node: its outbound channel, its routes,
/// and its in-flight calls — failing calls it was hosting back to
/// their invokers so nobody waits on a reply that cannot come.
async fn cleanup_node<C: Codec>(state: &Arc<HubState<C>>, node: &Node) {
    state.nodes.lock().await.remove(node);

    let removed_routes = state.routes.lock().await.remove_node(node);
    if !removed_routes.is_empty() {
        tracing::debug!(
            %node,
            routes = removed_routes.len(),
            "dropped routes of disconnected node"
        );
    }

    let (failed, dropped) = {
        let mut pending = state.pending.lock().await;
        let failed = pending.fail_host(node);
        let dropped = pending.drop_invoker(node);
        (failed, dropped)
    };

    for (call_id, call) in failed {
        state.gate.acknowledge();
        send_to_node(
            state,
            &call.invoker,
            Payload::Reply(InvokeResult {
                call_id,
                outcome: Err(RemoteFailure::Invocation(
                    "host node disconnected".into(),
                )),
            }),
        )
        .await;
    }

    // Calls this node invoked have nobody left to answer to; release
    // their gate slots so the phase can still advance.
    if dropped > 0 {
        state.gate.retract(dropped as u64);
    }

    tracing::info!(%node, "node cleaned up");
}
