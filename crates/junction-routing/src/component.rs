//! The uniform chain interface.
//!
//! A [`Component`] is anything that can route a query downstream and receive
//! a reply back: the client session at the top, each filter link, the router,
//! and headless administrative clients. Components form a chain; queries
//! descend it and replies climb it.
//!
//! A whole chain lives on one worker thread and is never internally locked,
//! so components are wired with `Rc<RefCell<_>>`. The resulting `!Send`
//! types are deliberate: the compiler enforces the single-thread ownership
//! rule.

use std::cell::RefCell;
use std::rc::Rc;

use junction_core::{Packet, Reply, ReplyError, ReplyRoute, RouteError, TargetName};

/// Shared handle to a chain component.
pub type ComponentRef = Rc<RefCell<dyn Component>>;

/// An asynchronous backend fault climbing the chain.
///
/// Built when a backend connection errors or closes with work outstanding;
/// carries enough context for the session to log and to surface a
/// backend-error result to the client.
#[derive(Debug)]
pub struct ChainFault {
    /// The failing target, when the fault is attributable to one.
    pub target: Option<TargetName>,
    /// Human-readable diagnostic.
    pub message: String,
    /// Diagnostic reply context for the client.
    pub reply: Reply,
}

impl ChainFault {
    pub fn new(target: TargetName, message: impl Into<String>, reply: Reply) -> Self {
        Self {
            target: Some(target),
            message: message.into(),
            reply,
        }
    }
}

/// Something that can route a query downstream and receive a reply.
///
/// Contract:
/// - `route_query` failure triggers the caller's error path; the parent
///   decides whether to degrade or close. Never silently swallowed.
/// - `client_reply` failure is fatal to the session.
/// - `handle_error` delivers an asynchronous backend fault; returning
///   `false` marks this component as failed.
/// - `parent` returns `None` for chain roots, whose faults are not
///   re-delegated further up.
pub trait Component {
    /// Route a query packet downstream. Ownership of the packet transfers.
    fn route_query(&mut self, packet: Packet) -> Result<(), RouteError>;

    /// Receive a reply packet climbing upstream, annotated with the route
    /// it traveled and its decoded metadata.
    fn client_reply(
        &mut self,
        packet: Packet,
        route: &ReplyRoute,
        reply: &Reply,
    ) -> Result<(), ReplyError>;

    /// Deliver an asynchronous backend fault. Returns `true` when the
    /// fault was absorbed and the component can continue.
    fn handle_error(&mut self, fault: &ChainFault) -> bool;

    /// The component above this one, or `None` for a chain root.
    fn parent(&self) -> Option<ComponentRef>;
}
