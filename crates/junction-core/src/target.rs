//! Targets and backend connections.
//!
//! A target is a logical backend queries can be routed to. The actual
//! transport (sockets, TLS) lives behind [`BackendConnection`]; this crate
//! only defines the seam. Connections are event-driven: `send` enqueues and
//! returns immediately, and completed replies or faults surface later
//! through `poll`, in per-connection order.

use std::fmt;
use std::rc::Rc;

use crate::error::RouteError;
use crate::packet::Packet;
use crate::reply::Reply;

/// Cheap clonable identifier for a logical backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetName(Rc<str>);

impl TargetName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Rc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the session a connection is created for.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Unique id for log correlation.
    pub session_id: uuid::Uuid,
    /// Client address, when the session belongs to a real client.
    pub client_addr: Option<String>,
    /// Authenticated user name, when known.
    pub user: Option<String>,
}

impl SessionInfo {
    /// A session identity for internal (headless) clients.
    pub fn internal() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4(),
            client_addr: None,
            user: None,
        }
    }

    pub fn for_client(addr: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4(),
            client_addr: Some(addr.into()),
            user: Some(user.into()),
        }
    }
}

/// One completed event reported by a backend connection.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A decoded response: the raw packet plus its structured metadata.
    Reply { packet: Packet, reply: Reply },
    /// The connection failed; no further replies will arrive.
    Error { message: String },
    /// The peer closed the connection cleanly.
    Closed,
}

/// A live connection to one backend, owned by exactly one [`Endpoint`].
///
/// `poll` yields events in delivery order; after an `Error` or `Closed`
/// event the connection yields nothing further.
///
/// [`Endpoint`]: https://docs.rs/junction-routing
pub trait BackendConnection {
    /// True until the connection is confirmed closed.
    fn is_open(&self) -> bool;

    /// Enqueue a packet for delivery. Returns immediately; the reply (or
    /// fault) surfaces later through `poll`.
    fn send(&mut self, packet: Packet) -> Result<(), RouteError>;

    /// Take the next completed event, if one is ready.
    fn poll(&mut self) -> Option<ConnectionEvent>;

    /// Close the connection. Pending events may be discarded.
    fn close(&mut self);
}

/// A logical backend that can supply connections.
pub trait Target {
    fn name(&self) -> &TargetName;

    /// Create a live connection for the given session.
    ///
    /// Returns `None` when the target cannot supply one (down, at capacity,
    /// misconfigured); callers treat that as fatal for the construction
    /// attempt.
    fn get_connection(&self, session: &SessionInfo) -> Option<Box<dyn BackendConnection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_name_display_and_eq() {
        let a = TargetName::new("db1");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "db1");
    }

    #[test]
    fn test_internal_session_info() {
        let info = SessionInfo::internal();
        assert!(info.client_addr.is_none());
        assert!(info.user.is_none());
    }

    #[test]
    fn test_client_session_info() {
        let info = SessionInfo::for_client("10.0.0.1:52110", "app");
        assert_eq!(info.client_addr.as_deref(), Some("10.0.0.1:52110"));
        assert_eq!(info.user.as_deref(), Some("app"));
    }
}
