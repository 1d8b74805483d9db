//! Client sessions and chain assembly.
//!
//! A [`SessionChain`] wires one client session, its filter stack, a router,
//! and the router's endpoint into a single component chain. Capabilities
//! and framing are negotiated once here, at session setup, never per
//! packet.

use std::cell::RefCell;
use std::rc::Rc;

use junction_core::{
    ConnectError, FramingMode, ModuleRegistry, Packet, QueryClassifier, Reply, ReplyError,
    ReplyRoute, RouteError, RoutingCapabilities, SessionConfig, SessionInfo, Target,
};

use crate::component::{ChainFault, Component, ComponentRef};
use crate::endpoint::{Endpoint, EndpointEvent, EndpointRef};
use crate::error::ChainError;
use crate::filter::{FilterLink, FilterSession};
use crate::router::TargetRouter;

/// Error code surfaced to the client when routing fails.
const ROUTING_FAILURE_CODE: u16 = 1927;

/// Delivers a reply packet toward the real client.
pub type ClientDeliver = Box<dyn FnMut(Packet, &Reply) -> Result<(), ReplyError>>;

/// The component at the top of a chain, owned by one client connection.
///
/// Reply delivery failure is fatal: the client may already hold part of a
/// response, so the session closes instead of retrying.
pub struct ClientSession {
    info: SessionInfo,
    deliver: ClientDeliver,
    down: Option<ComponentRef>,
    closed: bool,
}

impl ClientSession {
    pub fn new(info: SessionInfo, deliver: ClientDeliver) -> Self {
        Self {
            info,
            deliver,
            down: None,
            closed: false,
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn set_down(&mut self, down: ComponentRef) {
        self.down = Some(down);
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

impl Component for ClientSession {
    fn route_query(&mut self, packet: Packet) -> Result<(), RouteError> {
        if self.closed {
            return Err(RouteError::SessionClosed);
        }
        let down = self.down.clone().expect("session chain not wired");
        let mut down = down.borrow_mut();
        down.route_query(packet)
    }

    fn client_reply(
        &mut self,
        packet: Packet,
        _route: &ReplyRoute,
        reply: &Reply,
    ) -> Result<(), ReplyError> {
        if self.closed {
            // The session is gone; late replies are skipped, not errors.
            return Ok(());
        }
        if let Err(err) = (self.deliver)(packet, reply) {
            tracing::error!(
                session = %self.info.session_id,
                error = %err,
                "closing session: reply delivery failed"
            );
            self.closed = true;
            return Err(err);
        }
        Ok(())
    }

    fn handle_error(&mut self, fault: &ChainFault) -> bool {
        if self.closed {
            return false;
        }
        tracing::warn!(
            session = %self.info.session_id,
            backend = fault.target.as_ref().map(|t| t.as_str()),
            reason = %fault.message,
            "backend fault surfaced to client"
        );
        // The client sees the fault as a backend error result.
        if (self.deliver)(Packet::new(), &fault.reply).is_err() {
            self.closed = true;
            return false;
        }
        true
    }

    fn parent(&self) -> Option<ComponentRef> {
        None
    }
}

/// One client session's full routing chain.
pub struct SessionChain {
    // The session holds the chain alive: strong refs run downward
    // (session -> links -> router), up-refs are weak.
    session: Rc<RefCell<ClientSession>>,
    endpoints: Vec<EndpointRef>,
    capabilities: RoutingCapabilities,
    framing: FramingMode,
    closed: bool,
}

impl SessionChain {
    /// Assemble a chain: session on top, filters in order, router, and the
    /// router's endpoint against `target`.
    ///
    /// Every module must be declared in `registry`; the capability union
    /// over the chain, and the framing mode it implies, are computed here
    /// once. A target that cannot supply a connection fails construction.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        registry: &ModuleRegistry,
        filters: Vec<Box<dyn FilterSession>>,
        target: &dyn Target,
        classifier: Option<Rc<dyn QueryClassifier>>,
        config: &SessionConfig,
        info: SessionInfo,
        deliver: ClientDeliver,
    ) -> Result<Self, ChainError> {
        let mut names: Vec<&str> = Vec::with_capacity(filters.len() + 1);
        for filter in &filters {
            names.push(filter.name());
        }
        names.push(TargetRouter::MODULE_NAME);
        for name in &names {
            match registry.get(name) {
                Some(_) => {}
                None => {
                    return Err(ChainError::UnknownModule {
                        name: (*name).to_string(),
                    })
                }
            }
        }

        let capabilities = registry.chain_capabilities(names.iter().copied());
        let framing = capabilities.framing_mode();
        tracing::debug!(
            session = %info.session_id,
            capabilities = %capabilities,
            framing = ?framing,
            "chain capabilities negotiated"
        );

        let conn = target
            .get_connection(&info)
            .ok_or_else(|| ConnectError::NoConnection {
                target: target.name().clone(),
            })?;
        let endpoint: EndpointRef = Rc::new(RefCell::new(Endpoint::new(
            target.name().clone(),
            conn,
            config.max_pending_queries,
        )));

        let session = Rc::new(RefCell::new(ClientSession::new(info, deliver)));
        let router = Rc::new(RefCell::new(TargetRouter::new(capabilities, classifier)));
        router.borrow().routable().set_endpoint(endpoint.clone());

        let links: Vec<Rc<RefCell<FilterLink>>> = filters
            .into_iter()
            .map(|f| Rc::new(RefCell::new(FilterLink::new(f))))
            .collect();

        // Component view of the chain, top-down: session, links, router.
        let mut refs: Vec<ComponentRef> = Vec::with_capacity(links.len() + 2);
        refs.push(session.clone());
        for link in &links {
            refs.push(link.clone());
        }
        refs.push(router.clone());

        // Wire down-refs and up-refs: refs[i+1] sits below refs[i].
        session.borrow_mut().set_down(refs[1].clone());
        for (i, link) in links.iter().enumerate() {
            link.borrow_mut()
                .wire(Rc::downgrade(&refs[i]), refs[i + 2].clone());
        }
        router
            .borrow_mut()
            .set_up(Rc::downgrade(&refs[refs.len() - 2]));
        endpoint
            .borrow_mut()
            .set_up(Rc::downgrade(refs.last().expect("chain has a router")));

        Ok(Self {
            session,
            endpoints: vec![endpoint],
            capabilities,
            framing,
            closed: false,
        })
    }

    /// The closed capability union negotiated for this chain.
    pub fn capabilities(&self) -> RoutingCapabilities {
        self.capabilities
    }

    /// The framing mode the protocol layer must honor for this chain.
    pub fn framing(&self) -> FramingMode {
        self.framing
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.session.borrow().is_closed()
    }

    /// Route one client query down the chain.
    ///
    /// On failure the session's error handler runs (surfacing a
    /// backend-error result to the client) and the error is returned.
    pub fn route_query(&mut self, packet: Packet) -> Result<(), RouteError> {
        if self.is_closed() {
            return Err(RouteError::SessionClosed);
        }
        let result = self.session.borrow_mut().route_query(packet);
        if let Err(err) = &result {
            let fault = ChainFault {
                target: routing_error_target(err),
                message: err.to_string(),
                reply: Reply::error(ROUTING_FAILURE_CODE, err.to_string()),
            };
            self.session.borrow_mut().handle_error(&fault);
        }
        result
    }

    /// Drain backend events and dispatch them up the chain.
    ///
    /// Returns `Err` only on a fatal reply failure, after closing the
    /// session.
    pub fn pump(&mut self) -> Result<(), ReplyError> {
        let endpoints = self.endpoints.clone();
        for endpoint in endpoints {
            let events = endpoint.borrow_mut().pump();
            if events.is_empty() {
                continue;
            }
            let Some(up) = endpoint.borrow().up() else {
                // Owner gone; events die here rather than touch freed state.
                continue;
            };
            for event in events {
                if self.is_closed() {
                    break;
                }
                match event {
                    EndpointEvent::Reply {
                        packet,
                        route,
                        reply,
                    } => {
                        if let Err(err) = up.borrow_mut().client_reply(packet, &route, &reply) {
                            self.close();
                            return Err(err);
                        }
                    }
                    EndpointEvent::Fault(fault) => {
                        if !up.borrow_mut().handle_error(&fault) {
                            self.close();
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Close the session and every endpoint below it. The only
    /// cancellation primitive: in-flight queries are not individually
    /// cancelable, their callbacks are simply skipped once this runs.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.session.borrow_mut().close();
        for endpoint in &self.endpoints {
            endpoint.borrow_mut().close();
        }
        tracing::debug!(
            session = %self.session.borrow().info().session_id,
            "session chain closed"
        );
    }
}

fn routing_error_target(err: &RouteError) -> Option<junction_core::TargetName> {
    match err {
        RouteError::EndpointClosed { target }
        | RouteError::TargetUnavailable { target }
        | RouteError::Downstream { target, .. } => Some(target.clone()),
        _ => None,
    }
}
