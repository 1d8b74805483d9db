//! The directed edge from a component to one backend target.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use junction_core::{
    BackendConnection, ConnectionEvent, Packet, Reply, ReplyRoute, RouteError, TargetName,
};

use crate::component::{ChainFault, Component};

/// Shared handle to an endpoint, held by its owning router and by the
/// session's endpoint arena for event pumping.
pub type EndpointRef = Rc<RefCell<Endpoint>>;

/// An event produced by pumping an endpoint's backend connection.
#[derive(Debug)]
pub enum EndpointEvent {
    /// A decoded reply, annotated with the route it starts climbing from.
    Reply {
        packet: Packet,
        route: ReplyRoute,
        reply: Reply,
    },
    /// A backend fault for one outstanding query.
    Fault(ChainFault),
}

/// One directed connection step toward a single backend target.
///
/// Owns the live connection. `is_open` is a one-way transition: once the
/// connection is confirmed closed the endpoint never reports open again,
/// and further queuing fails cleanly instead of silently dropping.
pub struct Endpoint {
    target: TargetName,
    conn: Box<dyn BackendConnection>,
    up: Option<Weak<RefCell<dyn Component>>>,
    open: Cell<bool>,
    pending: u32,
    max_pending: u32,
}

impl Endpoint {
    pub fn new(target: TargetName, conn: Box<dyn BackendConnection>, max_pending: u32) -> Self {
        Self {
            target,
            conn,
            up: None,
            open: Cell::new(true),
            pending: 0,
            max_pending,
        }
    }

    pub fn target(&self) -> &TargetName {
        &self.target
    }

    /// Wire the component replies climb into. Set once during chain
    /// assembly; a dangling weak means the owner is gone and events are
    /// discarded.
    pub fn set_up(&mut self, up: Weak<RefCell<dyn Component>>) {
        self.up = Some(up);
    }

    pub fn up(&self) -> Option<crate::component::ComponentRef> {
        self.up.as_ref()?.upgrade()
    }

    /// True until the backend connection is confirmed closed; never
    /// returns true again after that.
    pub fn is_open(&self) -> bool {
        if self.open.get() && !self.conn.is_open() {
            self.open.set(false);
        }
        self.open.get()
    }

    /// Number of queries sent but not yet answered.
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Queue a query for delivery to the backend.
    pub fn route_query(&mut self, packet: Packet) -> Result<(), RouteError> {
        if !self.is_open() {
            return Err(RouteError::EndpointClosed {
                target: self.target.clone(),
            });
        }
        if self.pending >= self.max_pending {
            return Err(RouteError::Downstream {
                target: self.target.clone(),
                message: format!("pending query limit ({}) reached", self.max_pending),
            });
        }
        match self.conn.send(packet) {
            Ok(()) => {
                self.pending += 1;
                Ok(())
            }
            Err(err) => {
                // A failed send means the connection is gone.
                tracing::warn!(backend = %self.target, error = %err, "backend send failed");
                self.open.set(false);
                self.conn.close();
                Err(err)
            }
        }
    }

    /// Drain completed connection events.
    ///
    /// A terminal error or close synthesizes one fault per still-pending
    /// query, preserving the exactly-one-callback-per-query guarantee, then
    /// latches the endpoint closed. The latch may also flip outside this
    /// method (a failed send, or `is_open` observing a dead connection);
    /// pending queries still get their fault here on the next pump.
    pub fn pump(&mut self) -> Vec<EndpointEvent> {
        let mut events = Vec::new();
        if !self.is_open() {
            if self.pending > 0 {
                self.fail("backend connection lost", &mut events);
            }
            return events;
        }
        while let Some(event) = self.conn.poll() {
            match event {
                ConnectionEvent::Reply { packet, reply } => {
                    self.pending = self.pending.saturating_sub(1);
                    events.push(EndpointEvent::Reply {
                        packet,
                        route: ReplyRoute::starting_at(self.target.clone()),
                        reply,
                    });
                }
                ConnectionEvent::Error { message } => {
                    self.fail(&message, &mut events);
                    break;
                }
                ConnectionEvent::Closed => {
                    self.fail("connection closed by peer", &mut events);
                    break;
                }
            }
        }
        events
    }

    /// Stop accepting queues, discard pending work, release the connection.
    pub fn close(&mut self) {
        if self.open.get() {
            tracing::debug!(backend = %self.target, pending = self.pending, "closing endpoint");
        }
        self.open.set(false);
        self.pending = 0;
        self.conn.close();
    }

    fn fail(&mut self, message: &str, events: &mut Vec<EndpointEvent>) {
        tracing::warn!(
            backend = %self.target,
            pending = self.pending,
            reason = message,
            "backend connection failed"
        );
        for _ in 0..self.pending {
            events.push(EndpointEvent::Fault(ChainFault::new(
                self.target.clone(),
                message,
                Reply::error(2013, message),
            )));
        }
        self.pending = 0;
        self.open.set(false);
        self.conn.close();
    }
}
