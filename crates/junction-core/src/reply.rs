//! Response metadata attached to packets traveling upstream.
//!
//! A [`Reply`] describes the semantic outcome of one backend interaction and
//! a [`ReplyRoute`] records the path the response traveled. Both are produced
//! by the lowest-level protocol decoder and are read-only to everything
//! above it.

use crate::target::TargetName;

/// Semantic outcome of a backend interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyState {
    /// The backend acknowledged the statement without a result set.
    Ok,
    /// The backend is returning a result set with this many columns.
    ResultSet { columns: u16 },
    /// The backend reported an error.
    Error { code: u16, message: String },
}

/// One session variable change observed in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStateChange {
    pub variable: String,
    pub value: String,
}

/// Structured metadata describing one backend response.
///
/// Immutable and request-scoped: built once by the protocol decoder, read by
/// filters and routers on the way up.
#[derive(Debug, Clone)]
pub struct Reply {
    state: ReplyState,
    complete: bool,
    session_changes: Vec<SessionStateChange>,
}

impl Reply {
    /// A complete OK reply with no session-state changes.
    pub fn ok() -> Self {
        Self {
            state: ReplyState::Ok,
            complete: true,
            session_changes: Vec::new(),
        }
    }

    /// An error reply with the given backend error code and message.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            state: ReplyState::Error {
                code,
                message: message.into(),
            },
            complete: true,
            session_changes: Vec::new(),
        }
    }

    /// A result-set reply; `complete` marks the final packet of the set.
    pub fn result_set(columns: u16, complete: bool) -> Self {
        Self {
            state: ReplyState::ResultSet { columns },
            complete,
            session_changes: Vec::new(),
        }
    }

    /// Attach session-state deltas observed in this reply.
    pub fn with_session_changes(mut self, changes: Vec<SessionStateChange>) -> Self {
        self.session_changes = changes;
        self
    }

    pub fn state(&self) -> &ReplyState {
        &self.state
    }

    pub fn is_ok(&self) -> bool {
        !self.is_error()
    }

    pub fn is_error(&self) -> bool {
        matches!(self.state, ReplyState::Error { .. })
    }

    /// The backend error code and message, if this reply is an error.
    pub fn error_info(&self) -> Option<(u16, &str)> {
        match &self.state {
            ReplyState::Error { code, message } => Some((*code, message.as_str())),
            _ => None,
        }
    }

    /// True once the final packet of the response has been decoded.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn session_changes(&self) -> &[SessionStateChange] {
        &self.session_changes
    }
}

/// The ordered path a response traveled, origin target first.
///
/// Each component a reply climbs through appends its hop, so the session at
/// the top sees the full route for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ReplyRoute {
    hops: Vec<TargetName>,
}

impl ReplyRoute {
    /// A route starting at the origin target.
    pub fn starting_at(origin: TargetName) -> Self {
        Self { hops: vec![origin] }
    }

    /// Append a hop as the reply climbs.
    pub fn push(&mut self, hop: TargetName) {
        self.hops.push(hop);
    }

    /// The target the response originated from, if any hop was recorded.
    pub fn origin(&self) -> Option<&TargetName> {
        self.hops.first()
    }

    pub fn hops(&self) -> &[TargetName] {
        &self.hops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_reply() {
        let reply = Reply::ok();
        assert!(reply.is_ok());
        assert!(reply.is_complete());
        assert!(reply.error_info().is_none());
    }

    #[test]
    fn test_error_reply() {
        let reply = Reply::error(1045, "access denied");
        assert!(reply.is_error());
        assert_eq!(reply.error_info(), Some((1045, "access denied")));
    }

    #[test]
    fn test_partial_result_set() {
        let reply = Reply::result_set(3, false);
        assert!(reply.is_ok());
        assert!(!reply.is_complete());
        assert_eq!(reply.state(), &ReplyState::ResultSet { columns: 3 });
    }

    #[test]
    fn test_session_changes() {
        let reply = Reply::ok().with_session_changes(vec![SessionStateChange {
            variable: "autocommit".into(),
            value: "0".into(),
        }]);
        assert_eq!(reply.session_changes().len(), 1);
        assert_eq!(reply.session_changes()[0].variable, "autocommit");
    }

    #[test]
    fn test_route_origin_and_hops() {
        let mut route = ReplyRoute::starting_at(TargetName::new("db1"));
        route.push(TargetName::new("rw-router"));
        assert_eq!(route.origin().unwrap().as_str(), "db1");
        assert_eq!(route.hops().len(), 2);
    }
}
