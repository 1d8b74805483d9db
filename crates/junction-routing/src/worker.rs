//! Per-session worker loop.
//!
//! Each client session and its whole chain run on one worker thread; the
//! chain types are `!Send`, so the worker future must be driven on a
//! current-thread runtime (`tokio::task::spawn_local` or
//! `LocalSet::run_until`). The [`SessionHandle`] side is `Send` and is how
//! the transport layer feeds packets in and signals backend readiness.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Notify;

use junction_core::{Packet, RouteError};

use crate::session::SessionChain;

/// Cross-thread handle to a running session worker.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Packet>,
    wake: Arc<Notify>,
}

impl SessionHandle {
    /// Queue a client packet for routing.
    pub fn send(&self, packet: Packet) -> Result<(), RouteError> {
        self.tx
            .send(packet)
            .map_err(|_| RouteError::SessionClosed)
    }

    /// Signal that a backend connection has events ready.
    pub fn wake(&self) {
        self.wake.notify_one();
    }
}

/// Drives one [`SessionChain`]: routes inbound packets, pumps backend
/// events, and closes the chain on fatal errors or handle drop.
pub struct SessionWorker {
    chain: SessionChain,
    inbox: mpsc::UnboundedReceiver<Packet>,
    wake: Arc<Notify>,
}

impl SessionWorker {
    pub fn new(chain: SessionChain) -> (SessionHandle, Self) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let wake = Arc::new(Notify::new());
        (
            SessionHandle {
                tx,
                wake: wake.clone(),
            },
            Self { chain, inbox, wake },
        )
    }

    /// Run until the session closes or every handle is dropped.
    pub async fn run(mut self) {
        loop {
            if self.chain.is_closed() {
                break;
            }
            tokio::select! {
                inbound = self.inbox.recv() => {
                    match inbound {
                        Some(packet) => {
                            if let Err(err) = self.chain.route_query(packet) {
                                tracing::warn!(error = %err, "query routing failed");
                            }
                            if self.chain.pump().is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = self.wake.notified() => {
                    if self.chain.pump().is_err() {
                        break;
                    }
                }
            }
        }
        self.chain.close();
    }
}
