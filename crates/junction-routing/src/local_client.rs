//! Headless administrative client.
//!
//! A [`LocalClient`] lets non-session code (health checks, administrative
//! commands) issue queries against a target without a real client
//! connection. It is a chain root: `parent()` is always `None`, so its
//! faults are never re-delegated upward. Replies and faults are forwarded
//! through a pair of callbacks that must be configured together before
//! first use.

use junction_core::{
    ConnectError, Packet, Reply, ReplyError, ReplyRoute, RouteError, SessionInfo, Target,
    TargetName,
};

use crate::component::{ChainFault, Component, ComponentRef};
use crate::endpoint::{Endpoint, EndpointEvent};

/// Invoked for each reply, with the packet, its route, and its metadata.
pub type ReplyNotify = Box<dyn FnMut(Packet, &ReplyRoute, &Reply)>;

/// Invoked for each backend fault, with the diagnostic message, the failing
/// target, and the reply context.
pub type ErrorNotify = Box<dyn FnMut(&str, &TargetName, &Reply)>;

struct Callbacks {
    on_reply: ReplyNotify,
    on_error: ErrorNotify,
}

/// An internal fire-and-forget client over one hidden backend connection.
pub struct LocalClient {
    endpoint: Option<Endpoint>,
    callbacks: Option<Callbacks>,
    failed: bool,
    max_pending: u32,
}

impl Default for LocalClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalClient {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            callbacks: None,
            failed: false,
            max_pending: 128,
        }
    }

    /// Register the reply and error callbacks.
    ///
    /// Both must be supplied together; a half-configured client could
    /// receive events it cannot process, so passing `None` for either is a
    /// contract violation and panics.
    pub fn set_notify(&mut self, on_reply: Option<ReplyNotify>, on_error: Option<ErrorNotify>) {
        let (on_reply, on_error) = match (on_reply, on_error) {
            (Some(r), Some(e)) => (r, e),
            _ => panic!("local client callbacks must be set together"),
        };
        self.callbacks = Some(Callbacks { on_reply, on_error });
    }

    /// Open the hidden backend connection.
    ///
    /// Fails synchronously when the target cannot supply a connection; the
    /// client must not be used further without a successful connect.
    pub fn connect(&mut self, target: &dyn Target) -> Result<(), ConnectError> {
        if self.endpoint.is_some() {
            return Err(ConnectError::AlreadyConnected);
        }
        let session = SessionInfo::internal();
        let conn = target
            .get_connection(&session)
            .ok_or_else(|| ConnectError::NoConnection {
                target: target.name().clone(),
            })?;
        tracing::debug!(
            backend = %target.name(),
            session = %session.session_id,
            "local client connected"
        );
        self.endpoint = Some(Endpoint::new(
            target.name().clone(),
            conn,
            self.max_pending,
        ));
        Ok(())
    }

    /// True while the hidden connection is live and the client has not
    /// failed.
    pub fn is_open(&self) -> bool {
        !self.failed
            && self
                .endpoint
                .as_ref()
                .map(Endpoint::is_open)
                .unwrap_or(false)
    }

    /// Queue a query for delivery.
    ///
    /// Fails without panicking, and without invoking any callback, when the
    /// client is not connected or already closed.
    pub fn queue_query(&mut self, packet: Packet) -> Result<(), RouteError> {
        if self.failed {
            return Err(RouteError::SessionClosed);
        }
        match self.endpoint.as_mut() {
            Some(endpoint) => endpoint.route_query(packet),
            None => Err(RouteError::NotConnected),
        }
    }

    /// Drain backend events, forwarding each to the registered callbacks.
    ///
    /// Each queued query triggers exactly one of {reply, error}, in queue
    /// order.
    pub fn pump(&mut self) {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };
        for event in endpoint.pump() {
            match event {
                EndpointEvent::Reply {
                    packet,
                    route,
                    reply,
                } => {
                    // Replies are informational and never rejected.
                    let _ = self.client_reply(packet, &route, &reply);
                }
                EndpointEvent::Fault(fault) => {
                    self.handle_error(&fault);
                }
            }
        }
    }

    fn callbacks(&mut self) -> &mut Callbacks {
        self.callbacks
            .as_mut()
            .expect("local client callbacks must be configured before use")
    }
}

impl Component for LocalClient {
    fn route_query(&mut self, packet: Packet) -> Result<(), RouteError> {
        self.queue_query(packet)
    }

    fn client_reply(
        &mut self,
        packet: Packet,
        route: &ReplyRoute,
        reply: &Reply,
    ) -> Result<(), ReplyError> {
        (self.callbacks().on_reply)(packet, route, reply);
        Ok(())
    }

    fn handle_error(&mut self, fault: &ChainFault) -> bool {
        let target = fault
            .target
            .clone()
            .unwrap_or_else(|| TargetName::new("unknown"));
        tracing::warn!(
            backend = %target,
            reason = %fault.message,
            "local client backend fault"
        );
        (self.callbacks().on_error)(&fault.message, &target, &fault.reply);
        self.failed = true;
        false
    }

    fn parent(&self) -> Option<ComponentRef> {
        // A local client is a chain root.
        None
    }
}
