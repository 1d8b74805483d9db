//! Error types for the routing chain.
//!
//! Three families, matching the three data-dependent failure paths:
//! routing failures bubble to the parent component, reply failures are
//! fatal to the session, and connection faults are synchronous at
//! `connect` time. Contract violations (unbound endpoints, half-configured
//! callbacks) are panics, not variants here — they indicate a caller bug.

use thiserror::Error;

use crate::target::TargetName;

/// A downstream routing failure. The caller (the failing component's
/// parent) decides whether to degrade or close; this crate never retries.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The endpoint's backend connection is no longer open.
    #[error("endpoint to {target} is closed")]
    EndpointClosed { target: TargetName },

    /// The target could not supply a connection.
    #[error("target {target} unavailable")]
    TargetUnavailable { target: TargetName },

    /// The buffer carries a multi-statement batch the chain did not
    /// declare support for.
    #[error("multi-statement batch rejected: chain lacks MULTI_STMT capability")]
    MultiStatementUnsupported,

    /// A component below reported a failure.
    #[error("downstream failure at {target}: {message}")]
    Downstream { target: TargetName, message: String },

    /// The owning session is closing; no new queries are accepted.
    #[error("session closed")]
    SessionClosed,

    /// The client has no live connection to queue on.
    #[error("client not connected")]
    NotConnected,
}

/// A failure delivering a reply toward the client. Always fatal to the
/// session: the client may have already received part of the response.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply delivery failed: {message}")]
    Delivery { message: String },
}

/// A synchronous connection-establishment fault from `connect`.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The target refused or could not be reached.
    #[error("cannot connect to {target}: {message}")]
    Unreachable { target: TargetName, message: String },

    /// The target's factory returned no connection.
    #[error("target {target} supplied no connection")]
    NoConnection { target: TargetName },

    /// `connect` was called on an already-connected client.
    #[error("already connected")]
    AlreadyConnected,
}
