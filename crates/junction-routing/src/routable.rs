//! Endpoint binding for filter and router sessions.

use std::cell::OnceCell;

use crate::endpoint::EndpointRef;

/// The downstream binding a filter/router session delivers through.
///
/// Bound exactly once when the session chain is wired. Accessing the
/// endpoint before binding, or binding twice, is a programming error and
/// panics; this is a contract invariant, not a runtime condition to handle.
#[derive(Default)]
pub struct Routable {
    endpoint: OnceCell<EndpointRef>,
}

impl Routable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the downstream endpoint. Panics if already bound.
    pub fn set_endpoint(&self, endpoint: EndpointRef) {
        if self.endpoint.set(endpoint).is_err() {
            panic!("routable endpoint bound twice");
        }
    }

    /// The bound endpoint. Panics if `set_endpoint` has not been called.
    pub fn endpoint(&self) -> &EndpointRef {
        self.endpoint
            .get()
            .expect("routable endpoint accessed before binding")
    }

    pub fn is_bound(&self) -> bool {
        self.endpoint.get().is_some()
    }
}
