//! # junction-routing
//!
//! The request/response routing chain for the Junction database proxy.
//!
//! A client query enters at the top of a chain and descends through filter
//! links to a router, which delivers it to a backend endpoint; replies climb
//! the same chain in reverse, annotated with the route they traveled and
//! structured metadata about the response.
//!
//! ## Architecture
//!
//! ```text
//! client connection
//!       │ route_query                ▲ client_reply / handle_error
//!       ▼                            │
//! ┌──────────────┐             ┌───────────┐
//! │ ClientSession│ ──────────▶ │ FilterLink│ … (zero or more)
//! └──────────────┘             └─────┬─────┘
//!                                    ▼
//!                              ┌────────────┐      ┌──────────┐
//!                              │ TargetRouter│ ───▶ │ Endpoint │ ──▶ backend
//!                              └────────────┘      └──────────┘
//! ```
//!
//! Each chain runs on exactly one worker thread ([`SessionWorker`]); the
//! component graph is `Rc`-wired and never internally locked. Headless
//! administrative traffic goes through [`LocalClient`] instead of a real
//! client session.

pub mod component;
pub mod endpoint;
pub mod error;
pub mod filter;
pub mod local_client;
pub mod routable;
pub mod router;
pub mod session;
pub mod worker;

pub use component::{ChainFault, Component, ComponentRef};
pub use endpoint::{Endpoint, EndpointEvent, EndpointRef};
pub use error::ChainError;
pub use filter::{FilterLink, FilterSession, PassthroughFilter};
pub use local_client::{ErrorNotify, LocalClient, ReplyNotify};
pub use routable::Routable;
pub use router::TargetRouter;
pub use session::{ClientDeliver, ClientSession, SessionChain};
pub use worker::{SessionHandle, SessionWorker};
