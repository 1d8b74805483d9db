//! Integration tests for the routing chain.
//!
//! These run against a scripted in-memory backend: the test owns a handle
//! to the connection state and injects replies, faults, and closes between
//! pump calls, the same way a real event loop would observe them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use junction_core::{
    BackendConnection, ConnectionEvent, ModuleRegistry, Packet, Reply, ReplyError, RouteError,
    RoutingCapabilities, SessionConfig, SessionInfo, Target, TargetName,
};
use junction_routing::{
    ChainError, Component, LocalClient, PassthroughFilter, SessionChain, SessionWorker,
    TargetRouter,
};

/// Shared state between a test and the mock connection it handed out.
struct BackendState {
    open: bool,
    sent: Vec<Vec<u8>>,
    events: VecDeque<ConnectionEvent>,
}

impl BackendState {
    fn handle() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            open: true,
            sent: Vec::new(),
            events: VecDeque::new(),
        }))
    }
}

struct MockConnection {
    target: TargetName,
    state: Rc<RefCell<BackendState>>,
}

impl BackendConnection for MockConnection {
    fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    fn send(&mut self, packet: Packet) -> Result<(), RouteError> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(RouteError::EndpointClosed {
                target: self.target.clone(),
            });
        }
        state.sent.push(packet.into_contiguous().to_vec());
        Ok(())
    }

    fn poll(&mut self) -> Option<ConnectionEvent> {
        self.state.borrow_mut().events.pop_front()
    }

    fn close(&mut self) {
        self.state.borrow_mut().open = false;
    }
}

struct MockTarget {
    name: TargetName,
    reachable: bool,
    state: Rc<RefCell<BackendState>>,
}

impl MockTarget {
    fn new(name: &str) -> Self {
        Self {
            name: TargetName::new(name),
            reachable: true,
            state: BackendState::handle(),
        }
    }

    fn unreachable(name: &str) -> Self {
        Self {
            reachable: false,
            ..Self::new(name)
        }
    }

    fn push_reply(&self, body: &'static [u8], reply: Reply) {
        self.state
            .borrow_mut()
            .events
            .push_back(ConnectionEvent::Reply {
                packet: Packet::from(body),
                reply,
            });
    }

    fn push_error(&self, message: &str) {
        self.state
            .borrow_mut()
            .events
            .push_back(ConnectionEvent::Error {
                message: message.into(),
            });
    }
}

impl Target for MockTarget {
    fn name(&self) -> &TargetName {
        &self.name
    }

    fn get_connection(&self, _session: &SessionInfo) -> Option<Box<dyn BackendConnection>> {
        if !self.reachable {
            return None;
        }
        Some(Box::new(MockConnection {
            target: self.name.clone(),
            state: self.state.clone(),
        }))
    }
}

fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(PassthroughFilter::module_info());
    registry.register(TargetRouter::module_info());
    registry
}

fn query(text: &'static [u8]) -> Packet {
    Packet::from(text)
}

/// Replies delivered to the "client" side, recorded for assertions.
type Delivered = Rc<RefCell<Vec<(Vec<u8>, Reply)>>>;

fn recording_deliver(delivered: &Delivered) -> junction_routing::ClientDeliver {
    let delivered = delivered.clone();
    Box::new(move |packet, reply| {
        delivered
            .borrow_mut()
            .push((packet.into_contiguous().to_vec(), reply.clone()));
        Ok(())
    })
}

fn build_chain(target: &MockTarget, delivered: &Delivered) -> Result<SessionChain, ChainError> {
    SessionChain::build(
        &registry(),
        vec![Box::new(PassthroughFilter)],
        target,
        None,
        &SessionConfig::default(),
        SessionInfo::for_client("10.0.0.9:40000", "app"),
        recording_deliver(delivered),
    )
}

// --- local client ---------------------------------------------------------

struct LocalClientLog {
    replies: Rc<RefCell<Vec<Vec<u8>>>>,
    errors: Rc<RefCell<Vec<(String, String)>>>,
}

fn configured_client() -> (LocalClient, LocalClientLog) {
    let replies: Rc<RefCell<Vec<Vec<u8>>>> = Rc::new(RefCell::new(Vec::new()));
    let errors: Rc<RefCell<Vec<(String, String)>>> = Rc::new(RefCell::new(Vec::new()));
    let mut client = LocalClient::new();
    let replies_cb = replies.clone();
    let errors_cb = errors.clone();
    client.set_notify(
        Some(Box::new(move |packet, route, _reply| {
            assert!(route.origin().is_some());
            replies_cb.borrow_mut().push(packet.into_contiguous().to_vec());
        })),
        Some(Box::new(move |message, target, reply| {
            assert!(reply.is_error());
            errors_cb
                .borrow_mut()
                .push((message.to_string(), target.to_string()));
        })),
    );
    (client, LocalClientLog { replies, errors })
}

#[test]
fn test_local_client_connect_unreachable_target() {
    let target = MockTarget::unreachable("down-db");
    let (mut client, _log) = configured_client();

    let err = client.connect(&target).unwrap_err();
    assert!(err.to_string().contains("down-db"));
    assert!(!client.is_open());
}

#[test]
fn test_local_client_replies_arrive_in_queue_order() {
    let target = MockTarget::new("db1");
    let (mut client, log) = configured_client();
    client.connect(&target).unwrap();
    assert!(client.is_open());

    client.queue_query(query(b"q1")).unwrap();
    client.queue_query(query(b"q2")).unwrap();
    client.queue_query(query(b"q3")).unwrap();
    assert_eq!(target.state.borrow().sent.len(), 3);

    target.push_reply(b"r1", Reply::ok());
    target.push_reply(b"r2", Reply::result_set(1, true));
    target.push_reply(b"r3", Reply::ok());
    client.pump();

    let replies = log.replies.borrow();
    assert_eq!(*replies, vec![b"r1".to_vec(), b"r2".to_vec(), b"r3".to_vec()]);
    assert!(log.errors.borrow().is_empty());
}

#[test]
fn test_local_client_pending_query_faulted_on_close() {
    let target = MockTarget::new("db1");
    let (mut client, log) = configured_client();
    client.connect(&target).unwrap();

    client.queue_query(query(b"q1")).unwrap();
    client.queue_query(query(b"q2")).unwrap();

    // One reply lands, then the backend dies with one query still pending.
    target.push_reply(b"r1", Reply::ok());
    target.push_error("server has gone away");
    client.pump();

    assert_eq!(log.replies.borrow().len(), 1);
    let errors = log.errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].0.contains("gone away"));
    assert_eq!(errors[0].1, "db1");
    drop(errors);

    // Exactly one callback per query: one reply, one error, nothing more.
    client.pump();
    assert_eq!(log.replies.borrow().len(), 1);
    assert_eq!(log.errors.borrow().len(), 1);

    assert!(!client.is_open());
    let err = client.queue_query(query(b"q4")).unwrap_err();
    assert!(matches!(err, RouteError::SessionClosed));

    // Safe to tear down with the fault consumed.
    drop(client);
}

#[test]
fn test_local_client_fault_delivered_after_observed_close() {
    let target = MockTarget::new("db1");
    let (mut client, log) = configured_client();
    client.connect(&target).unwrap();
    client.queue_query(query(b"q1")).unwrap();

    // The backend dies and the closure is observed before any pump runs;
    // the pending query still gets its error callback.
    target.state.borrow_mut().open = false;
    assert!(!client.is_open());

    client.pump();
    assert!(log.replies.borrow().is_empty());
    let errors = log.errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].1, "db1");
}

#[test]
fn test_local_client_is_a_chain_root() {
    let (client, _log) = configured_client();
    assert!(client.parent().is_none());
}

// --- session chain --------------------------------------------------------

#[test]
fn test_chain_negotiates_framing_once() {
    let target = MockTarget::new("db1");
    let delivered: Delivered = Rc::new(RefCell::new(Vec::new()));
    let chain = build_chain(&target, &delivered).unwrap();

    // The router declares request tracking, which implies statement input,
    // so the whole chain runs single-packet framing.
    assert!(chain
        .capabilities()
        .contains(RoutingCapabilities::STMT_INPUT));
    assert_eq!(
        chain.framing(),
        junction_core::FramingMode::SinglePacket
    );
}

#[test]
fn test_chain_unknown_module_rejected() {
    struct UnregisteredFilter;
    impl junction_routing::FilterSession for UnregisteredFilter {
        fn name(&self) -> &'static str {
            "mystery"
        }
        fn on_query(&mut self, packet: Packet) -> Result<Packet, RouteError> {
            Ok(packet)
        }
        fn on_reply(&mut self, packet: Packet, _reply: &Reply) -> Result<Packet, ReplyError> {
            Ok(packet)
        }
    }

    let target = MockTarget::new("db1");
    let delivered: Delivered = Rc::new(RefCell::new(Vec::new()));
    let err = SessionChain::build(
        &registry(),
        vec![Box::new(UnregisteredFilter)],
        &target,
        None,
        &SessionConfig::default(),
        SessionInfo::for_client("10.0.0.9:40000", "app"),
        recording_deliver(&delivered),
    )
    .err()
    .expect("unregistered module must be rejected");
    assert!(matches!(err, ChainError::UnknownModule { .. }));
}

#[test]
fn test_chain_build_fails_when_target_has_no_connection() {
    let target = MockTarget::unreachable("db1");
    let delivered: Delivered = Rc::new(RefCell::new(Vec::new()));
    let err = build_chain(&target, &delivered)
        .err()
        .expect("build must fail without a connection");
    assert!(matches!(err, ChainError::Connect(_)));
}

#[test]
fn test_query_and_reply_traverse_the_chain() {
    let target = MockTarget::new("db1");
    let delivered: Delivered = Rc::new(RefCell::new(Vec::new()));
    let mut chain = build_chain(&target, &delivered).unwrap();

    chain.route_query(query(b"SELECT 1")).unwrap();
    assert_eq!(target.state.borrow().sent, vec![b"SELECT 1".to_vec()]);

    target.push_reply(b"one row", Reply::result_set(1, true));
    chain.pump().unwrap();

    let delivered = delivered.borrow();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, b"one row".to_vec());
    assert!(delivered[0].1.is_ok());
}

#[test]
fn test_routing_failure_surfaces_backend_error_to_client() {
    let target = MockTarget::new("db1");
    let delivered: Delivered = Rc::new(RefCell::new(Vec::new()));
    let mut chain = build_chain(&target, &delivered).unwrap();

    // Kill the backend before routing; the endpoint reports closed.
    target.state.borrow_mut().open = false;
    let err = chain.route_query(query(b"SELECT 1")).unwrap_err();
    assert!(matches!(err, RouteError::EndpointClosed { .. }));

    // The client got a diagnostic error result naming the target.
    let delivered = delivered.borrow();
    assert_eq!(delivered.len(), 1);
    let (code, message) = delivered[0].1.error_info().expect("error reply");
    assert_eq!(code, 1927);
    assert!(message.contains("db1"));
}

#[test]
fn test_backend_fault_mid_flight_reaches_client_and_session_survives() {
    let target = MockTarget::new("db1");
    let delivered: Delivered = Rc::new(RefCell::new(Vec::new()));
    let mut chain = build_chain(&target, &delivered).unwrap();

    chain.route_query(query(b"SELECT 1")).unwrap();
    target.push_error("deadlock");
    chain.pump().unwrap();

    {
        let delivered = delivered.borrow();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].1.is_error());
    }
    // A routing fault is not fatal; only reply-delivery failure closes the
    // session.
    assert!(!chain.is_closed());
}

#[test]
fn test_reply_delivery_failure_is_fatal() {
    let target = MockTarget::new("db1");
    let attempts = Rc::new(RefCell::new(0u32));
    let attempts_cb = attempts.clone();
    let deliver: junction_routing::ClientDeliver = Box::new(move |_packet, _reply| {
        *attempts_cb.borrow_mut() += 1;
        Err(ReplyError::Delivery {
            message: "client hung up".into(),
        })
    });
    let mut chain = SessionChain::build(
        &registry(),
        Vec::new(),
        &target,
        None,
        &SessionConfig::default(),
        SessionInfo::for_client("10.0.0.9:40000", "app"),
        deliver,
    )
    .unwrap();

    chain.route_query(query(b"SELECT 1")).unwrap();
    target.push_reply(b"row", Reply::ok());
    let err = chain.pump().unwrap_err();
    assert!(err.to_string().contains("client hung up"));
    assert!(chain.is_closed());
    assert_eq!(*attempts.borrow(), 1);

    // Closed means closed: further routing is refused.
    let err = chain.route_query(query(b"SELECT 2")).unwrap_err();
    assert!(matches!(err, RouteError::SessionClosed));
}

// --- worker ---------------------------------------------------------------

#[tokio::test(flavor = "current_thread")]
async fn test_worker_drives_a_session() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let target = MockTarget::new("db1");
            let delivered: Delivered = Rc::new(RefCell::new(Vec::new()));
            let chain = build_chain(&target, &delivered).unwrap();
            let (handle, worker) = SessionWorker::new(chain);
            let join = tokio::task::spawn_local(worker.run());

            handle.send(query(b"SELECT 1")).unwrap();
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            assert_eq!(target.state.borrow().sent.len(), 1);

            target.push_reply(b"row", Reply::ok());
            handle.wake();
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            assert_eq!(delivered.borrow().len(), 1);

            drop(handle);
            join.await.unwrap();
        })
        .await;
}
