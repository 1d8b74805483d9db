//! The router at the bottom of the chain.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use junction_core::{
    ModuleInfo, ModuleKind, Packet, QueryClassifier, Reply, ReplyError, ReplyRoute, RouteError,
    RoutingCapabilities,
};

use crate::component::{ChainFault, Component, ComponentRef};
use crate::routable::Routable;

/// Routes every query to the single target its [`Routable`] is bound to.
///
/// Policy decisions beyond delivery (retry, failover, load distribution)
/// belong to richer routers; this one surfaces every fault to its parent
/// untouched.
pub struct TargetRouter {
    routable: Routable,
    up: Option<Weak<RefCell<dyn Component>>>,
    chain_capabilities: RoutingCapabilities,
    classifier: Option<Rc<dyn QueryClassifier>>,
}

impl TargetRouter {
    pub const MODULE_NAME: &'static str = "target-router";

    /// Registration record. The router correlates replies with requests
    /// and observes session-state changes.
    pub fn module_info() -> ModuleInfo {
        ModuleInfo {
            name: Self::MODULE_NAME,
            kind: ModuleKind::Router,
            capabilities: RoutingCapabilities::REQUEST_TRACKING
                | RoutingCapabilities::SESSION_STATE_TRACKING,
        }
    }

    /// Create a router session.
    ///
    /// `chain_capabilities` is the closed union for the whole chain,
    /// computed once at session setup; `classifier` gates multi-statement
    /// batches when present.
    pub fn new(
        chain_capabilities: RoutingCapabilities,
        classifier: Option<Rc<dyn QueryClassifier>>,
    ) -> Self {
        Self {
            routable: Routable::new(),
            up: None,
            chain_capabilities,
            classifier,
        }
    }

    pub fn routable(&self) -> &Routable {
        &self.routable
    }

    pub fn set_up(&mut self, up: Weak<RefCell<dyn Component>>) {
        self.up = Some(up);
    }
}

impl Component for TargetRouter {
    fn route_query(&mut self, packet: Packet) -> Result<(), RouteError> {
        if let Some(classifier) = &self.classifier {
            let classification = classifier.classify(&packet);
            if classification.multi_statement
                && !self
                    .chain_capabilities
                    .contains(RoutingCapabilities::MULTI_STMT)
            {
                return Err(RouteError::MultiStatementUnsupported);
            }
        }
        self.routable.endpoint().clone().borrow_mut().route_query(packet)
    }

    fn client_reply(
        &mut self,
        packet: Packet,
        route: &ReplyRoute,
        reply: &Reply,
    ) -> Result<(), ReplyError> {
        if self
            .chain_capabilities
            .contains(RoutingCapabilities::SESSION_STATE_TRACKING)
            && !reply.session_changes().is_empty()
        {
            tracing::debug!(
                changes = reply.session_changes().len(),
                "session state changed"
            );
        }
        match self.parent() {
            Some(parent) => parent.borrow_mut().client_reply(packet, route, reply),
            None => Ok(()),
        }
    }

    fn handle_error(&mut self, fault: &ChainFault) -> bool {
        // Retry is a policy decision this router does not make; the fault
        // goes to the parent untouched.
        match self.parent() {
            Some(parent) => parent.borrow_mut().handle_error(fault),
            None => false,
        }
    }

    fn parent(&self) -> Option<ComponentRef> {
        self.up.as_ref()?.upgrade()
    }
}
