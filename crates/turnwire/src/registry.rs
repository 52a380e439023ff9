//! Dispatch bookkeeping: local objects, remote routes, and in-flight
//! calls.
//!
//! Three registries, one concern each:
//!
//! - [`RemoteRegistry`] — objects hosted *here* (on the hub), invoked
//!   directly.
//! - [`RouteTable`] — names hosted on *other* nodes, mapped to the node
//!   that registered them so the hub knows where to forward.
//! - [`PendingCalls`] — forwarded calls awaiting a reply, keyed by
//!   call id, remembering both the invoker (where the result goes) and
//!   the host (so a dead host's calls can be failed).
//!
//! # Concurrency note
//!
//! None of these are thread-safe by themselves — plain `HashMap`s,
//! guarded by the server state's locks at a higher level. Keeping them
//! simple here avoids hidden locking overhead.

use std::collections::HashMap;

use turnwire_protocol::{
    CallArg, CallId, Node, RemoteFailure, RemoteMethodCall, RemoteName,
};

/// Errors from registry operations, as opposed to failures of the
/// dispatched call itself (those are [`RemoteFailure`] and travel back
/// to the invoker on the wire).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// A remote object is already registered under this name.
    #[error("a remote object is already registered under '{0}'")]
    AlreadyRegistered(RemoteName),

    /// No remote object is registered under this name.
    #[error("no remote object registered under '{0}'")]
    TargetNotFound(RemoteName),
}

// ---------------------------------------------------------------------------
// RemoteRegistry — objects hosted on this node
// ---------------------------------------------------------------------------

/// An object invokable by name from remote nodes.
///
/// The implementation decodes its own argument bytes and encodes its
/// own return value — the dispatcher treats both as opaque.
pub trait RemoteObject: Send + Sync {
    /// Handles one method call.
    ///
    /// # Errors
    /// [`RemoteFailure::Invocation`] travels back to the invoker
    /// verbatim; it should say what a caller can act on, not leak
    /// internals.
    fn invoke(
        &self,
        method: &str,
        args: &[CallArg],
    ) -> Result<Option<Vec<u8>>, RemoteFailure>;
}

/// Objects registered for local dispatch.
#[derive(Default)]
pub struct RemoteRegistry {
    objects: HashMap<RemoteName, Box<dyn RemoteObject>>,
}

impl RemoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object under a name.
    ///
    /// # Errors
    /// [`DispatchError::AlreadyRegistered`] if the name is taken.
    pub fn register(
        &mut self,
        name: RemoteName,
        object: Box<dyn RemoteObject>,
    ) -> Result<(), DispatchError> {
        if self.objects.contains_key(&name) {
            return Err(DispatchError::AlreadyRegistered(name));
        }
        tracing::debug!(%name, "remote object registered");
        self.objects.insert(name, object);
        Ok(())
    }

    /// Removes a registration. Returns whether it existed.
    pub fn unregister(&mut self, name: &RemoteName) -> bool {
        self.objects.remove(name).is_some()
    }

    /// Whether an object is registered under `name`.
    pub fn contains(&self, name: &RemoteName) -> bool {
        self.objects.contains_key(name)
    }

    /// Dispatches a call to the registered object.
    ///
    /// An unknown target comes back as
    /// [`RemoteFailure::TargetNotFound`] — a result for the invoker,
    /// never a torn connection.
    pub fn dispatch(
        &self,
        call: &RemoteMethodCall,
    ) -> Result<Option<Vec<u8>>, RemoteFailure> {
        let object = self
            .objects
            .get(&call.target)
            .ok_or_else(|| RemoteFailure::TargetNotFound(call.target.clone()))?;
        object.invoke(&call.method, &call.args)
    }
}

impl std::fmt::Debug for RemoteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRegistry")
            .field("names", &self.objects.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RouteTable — names hosted on other nodes
// ---------------------------------------------------------------------------

/// Which node hosts which remotely-registered name.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<RemoteName, Node>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `node` hosts `name`.
    ///
    /// # Errors
    /// [`DispatchError::AlreadyRegistered`] if a *different* node
    /// already holds the name. Re-registration by the same node is a
    /// no-op.
    pub fn register(
        &mut self,
        name: RemoteName,
        node: Node,
    ) -> Result<(), DispatchError> {
        match self.routes.get(&name) {
            Some(holder) if *holder != node => {
                Err(DispatchError::AlreadyRegistered(name))
            }
            Some(_) => Ok(()),
            None => {
                tracing::debug!(%name, %node, "route registered");
                self.routes.insert(name, node);
                Ok(())
            }
        }
    }

    /// Removes `name` if it is held by `node`. Returns whether a route
    /// was removed.
    pub fn unregister(&mut self, name: &RemoteName, node: &Node) -> bool {
        match self.routes.get(name) {
            Some(holder) if holder == node => {
                self.routes.remove(name);
                true
            }
            _ => false,
        }
    }

    /// The node hosting `name`, if any.
    pub fn host_of(&self, name: &RemoteName) -> Option<&Node> {
        self.routes.get(name)
    }

    /// Drops every route held by `node` (on disconnect). Returns the
    /// names that were removed.
    pub fn remove_node(&mut self, node: &Node) -> Vec<RemoteName> {
        let removed: Vec<RemoteName> = self
            .routes
            .iter()
            .filter(|(_, holder)| *holder == node)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &removed {
            self.routes.remove(name);
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// PendingCalls — forwarded invocations awaiting replies
// ---------------------------------------------------------------------------

/// One forwarded call the hub is waiting to route a reply for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    /// Where the eventual result goes.
    pub invoker: Node,
    /// Which node is executing the call.
    pub host: Node,
}

/// In-flight forwarded calls, keyed by correlation id.
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: HashMap<CallId, PendingCall>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a forwarded call.
    pub fn record(&mut self, call_id: CallId, invoker: Node, host: Node) {
        self.calls.insert(call_id, PendingCall { invoker, host });
    }

    /// Takes the pending entry for a reply that just arrived. `None`
    /// for unmatched (late or duplicate) replies.
    pub fn take(&mut self, call_id: CallId) -> Option<PendingCall> {
        self.calls.remove(&call_id)
    }

    /// Removes and returns every call hosted by `node` (on its
    /// disconnect) so each can be failed back to its invoker.
    pub fn fail_host(&mut self, node: &Node) -> Vec<(CallId, PendingCall)> {
        let ids: Vec<CallId> = self
            .calls
            .iter()
            .filter(|(_, pending)| pending.host == *node)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.calls.remove(&id).map(|pending| (id, pending)))
            .collect()
    }

    /// Drops every call *invoked by* `node`; nobody is left to receive
    /// those replies.
    pub fn drop_invoker(&mut self, node: &Node) -> usize {
        let before = self.calls.len();
        self.calls.retain(|_, pending| pending.invoker != *node);
        before - self.calls.len()
    }

    /// Number of in-flight calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoObject;

    impl RemoteObject for EchoObject {
        fn invoke(
            &self,
            method: &str,
            args: &[CallArg],
        ) -> Result<Option<Vec<u8>>, RemoteFailure> {
            match method {
                "echo" => Ok(args.first().map(|arg| arg.bytes.clone())),
                other => Err(RemoteFailure::Invocation(format!(
                    "unknown method '{other}'"
                ))),
            }
        }
    }

    fn node(name: &str, port: u16) -> Node {
        Node::new(name, format!("127.0.0.1:{port}").parse().unwrap())
    }

    fn call(target: &str, method: &str) -> RemoteMethodCall {
        RemoteMethodCall::new(
            RemoteName::new(target),
            method,
            vec![CallArg::new("bytes", vec![1, 2, 3])],
        )
    }

    // -- RemoteRegistry ---------------------------------------------------

    #[test]
    fn test_dispatch_registered_object_returns_result() {
        let mut registry = RemoteRegistry::new();
        registry
            .register(RemoteName::new("game.echo"), Box::new(EchoObject))
            .unwrap();

        let result = registry.dispatch(&call("game.echo", "echo")).unwrap();
        assert_eq!(result, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_dispatch_unknown_target_is_target_not_found() {
        let registry = RemoteRegistry::new();
        let err = registry.dispatch(&call("game.ghost", "echo")).unwrap_err();
        assert!(matches!(err, RemoteFailure::TargetNotFound(name)
            if name == RemoteName::new("game.ghost")));
    }

    #[test]
    fn test_register_duplicate_name_rejected() {
        let mut registry = RemoteRegistry::new();
        registry
            .register(RemoteName::new("game.echo"), Box::new(EchoObject))
            .unwrap();
        let err = registry
            .register(RemoteName::new("game.echo"), Box::new(EchoObject))
            .unwrap_err();
        assert!(matches!(err, DispatchError::AlreadyRegistered(_)));
    }

    #[test]
    fn test_unregister_then_dispatch_fails() {
        let mut registry = RemoteRegistry::new();
        registry
            .register(RemoteName::new("game.echo"), Box::new(EchoObject))
            .unwrap();
        assert!(registry.unregister(&RemoteName::new("game.echo")));
        assert!(registry.dispatch(&call("game.echo", "echo")).is_err());
    }

    // -- RouteTable -------------------------------------------------------

    #[test]
    fn test_route_register_and_lookup() {
        let mut routes = RouteTable::new();
        let alice = node("alice", 4000);
        routes
            .register(RemoteName::new("game.host"), alice.clone())
            .unwrap();
        assert_eq!(routes.host_of(&RemoteName::new("game.host")), Some(&alice));
    }

    #[test]
    fn test_route_collision_with_other_node_rejected() {
        let mut routes = RouteTable::new();
        routes
            .register(RemoteName::new("game.host"), node("alice", 4000))
            .unwrap();
        let err = routes
            .register(RemoteName::new("game.host"), node("bob", 4001))
            .unwrap_err();
        assert!(matches!(err, DispatchError::AlreadyRegistered(_)));

        // Same node re-registering is harmless.
        routes
            .register(RemoteName::new("game.host"), node("alice", 4000))
            .unwrap();
    }

    #[test]
    fn test_remove_node_drops_only_its_routes() {
        let mut routes = RouteTable::new();
        let alice = node("alice", 4000);
        let bob = node("bob", 4001);
        routes
            .register(RemoteName::new("game.host"), alice.clone())
            .unwrap();
        routes
            .register(RemoteName::new("game.chat"), bob.clone())
            .unwrap();

        let removed = routes.remove_node(&alice);
        assert_eq!(removed, vec![RemoteName::new("game.host")]);
        assert!(routes.host_of(&RemoteName::new("game.host")).is_none());
        assert_eq!(routes.host_of(&RemoteName::new("game.chat")), Some(&bob));
    }

    // -- PendingCalls -----------------------------------------------------

    #[test]
    fn test_pending_take_matches_once() {
        let mut pending = PendingCalls::new();
        let id = CallId(7);
        pending.record(id, node("alice", 4000), node("bob", 4001));

        let taken = pending.take(id).unwrap();
        assert_eq!(taken.invoker, node("alice", 4000));
        assert!(pending.take(id).is_none(), "replies match at most once");
    }

    #[test]
    fn test_fail_host_returns_its_calls() {
        let mut pending = PendingCalls::new();
        let bob = node("bob", 4001);
        pending.record(CallId(1), node("alice", 4000), bob.clone());
        pending.record(CallId(2), node("carol", 4002), bob.clone());
        pending.record(CallId(3), node("alice", 4000), node("dave", 4003));

        let failed = pending.fail_host(&bob);
        assert_eq!(failed.len(), 2);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_drop_invoker_discards_its_calls() {
        let mut pending = PendingCalls::new();
        let alice = node("alice", 4000);
        pending.record(CallId(1), alice.clone(), node("bob", 4001));
        pending.record(CallId(2), node("carol", 4002), node("bob", 4001));

        assert_eq!(pending.drop_invoker(&alice), 1);
        assert_eq!(pending.len(), 1);
    }
}
