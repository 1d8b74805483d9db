//! # junction-core
//!
//! Shared vocabulary for the Junction database-proxy routing chain:
//!
//! - [`Packet`]: opaque owned byte buffers crossing the chain
//! - [`Reply`] / [`ReplyRoute`]: response metadata traveling upstream
//! - [`Target`] / [`BackendConnection`]: the transport collaborator seam
//! - [`RoutingCapabilities`]: module capability flags and their closure
//! - [`QueryClassifier`]: the query-classification collaborator seam
//!
//! The chain itself lives in `junction-routing`; this crate holds the types
//! both sides of every seam agree on.

pub mod capabilities;
pub mod classify;
pub mod config;
pub mod error;
pub mod packet;
pub mod reply;
pub mod target;

pub use capabilities::{FramingMode, ModuleInfo, ModuleKind, ModuleRegistry, RoutingCapabilities};
pub use classify::{Classification, DefaultClassifier, QueryClassifier, StatementKind};
pub use config::{ChainConfig, SessionConfig, TargetConfig};
pub use error::{ConnectError, ReplyError, RouteError};
pub use packet::Packet;
pub use reply::{Reply, ReplyRoute, ReplyState, SessionStateChange};
pub use target::{BackendConnection, ConnectionEvent, SessionInfo, Target, TargetName};
