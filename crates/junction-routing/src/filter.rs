//! Filter sessions and their chain links.
//!
//! A filter module supplies per-session state implementing
//! [`FilterSession`]: a pair of transformation hooks for queries going down
//! and replies coming up. [`FilterLink`] adapts one such session to the
//! [`Component`] contract, delegating to the next component below after the
//! query hook and to its parent above after the reply hook.

use std::cell::RefCell;
use std::rc::Weak;

use junction_core::{
    ModuleInfo, ModuleKind, Packet, Reply, ReplyError, ReplyRoute, RouteError,
    RoutingCapabilities,
};

use crate::component::{ChainFault, Component, ComponentRef};

/// Per-session filter state: transformation hooks around the chain.
pub trait FilterSession {
    /// Registered module name, for diagnostics and capability lookup.
    fn name(&self) -> &'static str;

    /// Transform a query on its way down. Returning `Err` is a routing
    /// failure handled by the parent.
    fn on_query(&mut self, packet: Packet) -> Result<Packet, RouteError>;

    /// Transform a reply on its way up. Returning `Err` is fatal to the
    /// session.
    fn on_reply(&mut self, packet: Packet, reply: &Reply) -> Result<Packet, ReplyError>;
}

/// Adapts a [`FilterSession`] to the [`Component`] chain contract.
pub struct FilterLink {
    filter: Box<dyn FilterSession>,
    up: Option<Weak<RefCell<dyn Component>>>,
    down: Option<ComponentRef>,
}

impl FilterLink {
    pub fn new(filter: Box<dyn FilterSession>) -> Self {
        Self {
            filter,
            up: None,
            down: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.filter.name()
    }

    /// Wire the link into a chain. Called once during session assembly.
    pub fn wire(&mut self, up: Weak<RefCell<dyn Component>>, down: ComponentRef) {
        self.up = Some(up);
        self.down = Some(down);
    }

    fn down(&self) -> &ComponentRef {
        self.down.as_ref().expect("filter link not wired")
    }
}

impl Component for FilterLink {
    fn route_query(&mut self, packet: Packet) -> Result<(), RouteError> {
        let packet = self.filter.on_query(packet)?;
        self.down().clone().borrow_mut().route_query(packet)
    }

    fn client_reply(
        &mut self,
        packet: Packet,
        route: &ReplyRoute,
        reply: &Reply,
    ) -> Result<(), ReplyError> {
        let packet = self.filter.on_reply(packet, reply)?;
        match self.parent() {
            Some(parent) => parent.borrow_mut().client_reply(packet, route, reply),
            None => Ok(()),
        }
    }

    fn handle_error(&mut self, fault: &ChainFault) -> bool {
        match self.parent() {
            Some(parent) => parent.borrow_mut().handle_error(fault),
            None => false,
        }
    }

    fn parent(&self) -> Option<ComponentRef> {
        self.up.as_ref()?.upgrade()
    }
}

/// The identity filter: forwards queries and replies untouched.
///
/// Useful as a chain placeholder and as the simplest module declaration.
#[derive(Debug, Default)]
pub struct PassthroughFilter;

impl PassthroughFilter {
    pub const MODULE_NAME: &'static str = "passthrough";

    /// Registration record: no capability requirements.
    pub fn module_info() -> ModuleInfo {
        ModuleInfo {
            name: Self::MODULE_NAME,
            kind: ModuleKind::Filter,
            capabilities: RoutingCapabilities::NONE,
        }
    }
}

impl FilterSession for PassthroughFilter {
    fn name(&self) -> &'static str {
        Self::MODULE_NAME
    }

    fn on_query(&mut self, packet: Packet) -> Result<Packet, RouteError> {
        Ok(packet)
    }

    fn on_reply(&mut self, packet: Packet, _reply: &Reply) -> Result<Packet, ReplyError> {
        Ok(packet)
    }
}
