//! Routing capability flags and the module registry.
//!
//! Every router and filter module declares a constant capability bitset at
//! registration, telling the protocol layer which guarantees it needs:
//! packet framing granularity, request/response tracking, transaction and
//! session-state tracking, multi-statement support. The protocol layer
//! computes the union over a chain once per session setup and picks a
//! framing mode for the whole chain.
//!
//! The bits form a lattice of implications, e.g. a module that consumes
//! result sets necessarily tracks requests, which in turn requires
//! statement-granular input and packet-granular output. [`RoutingCapabilities::close`]
//! computes that closure.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A bitset of guarantees a router or filter needs from the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoutingCapabilities(u32);

impl RoutingCapabilities {
    /// No requirements; coalesced buffers are acceptable.
    pub const NONE: Self = Self(0);
    /// Queries must arrive one statement per `route_query` call.
    pub const STMT_INPUT: Self = Self(1 << 0);
    /// Replies must arrive one protocol packet per `client_reply` call.
    pub const PACKET_OUTPUT: Self = Self(1 << 1);
    /// Replies must arrive one statement-result per call.
    pub const STMT_OUTPUT: Self = Self(1 << 2);
    /// The module consumes assembled result sets.
    pub const RESULTSET_OUTPUT: Self = Self(1 << 3);
    /// The module correlates each reply with its request.
    pub const REQUEST_TRACKING: Self = Self(1 << 4);
    /// The module needs transaction boundaries tracked.
    pub const TRANSACTION_TRACKING: Self = Self(1 << 5);
    /// The module needs session-state changes tracked.
    pub const SESSION_STATE_TRACKING: Self = Self(1 << 6);
    /// The module understands multi-statement batches.
    pub const MULTI_STMT: Self = Self(1 << 7);

    /// Bits retired from older module ABIs. Still accepted in declarations
    /// and preserved through the closure, but carry no behavior.
    pub const RESERVED: Self = Self(0xffff_0000);

    /// Build from a raw declaration, e.g. one recorded by an older module.
    ///
    /// Unknown low bits are rejected; reserved high bits are kept as-is.
    pub fn from_bits(bits: u32) -> Option<Self> {
        const KNOWN: u32 = 0xff | 0xffff_0000;
        if bits & !KNOWN != 0 {
            return None;
        }
        Some(Self(bits))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Compute the implication closure of this bitset.
    ///
    /// Implications:
    /// - `RESULTSET_OUTPUT`, `TRANSACTION_TRACKING` and
    ///   `SESSION_STATE_TRACKING` each imply `REQUEST_TRACKING`
    /// - `REQUEST_TRACKING` implies `STMT_INPUT` and `PACKET_OUTPUT`
    /// - `STMT_OUTPUT` implies `PACKET_OUTPUT`
    pub fn close(self) -> Self {
        let mut caps = self;
        loop {
            let mut next = caps;
            if next.contains(Self::RESULTSET_OUTPUT)
                || next.contains(Self::TRANSACTION_TRACKING)
                || next.contains(Self::SESSION_STATE_TRACKING)
            {
                next |= Self::REQUEST_TRACKING;
            }
            if next.contains(Self::REQUEST_TRACKING) {
                next |= Self::STMT_INPUT;
                next |= Self::PACKET_OUTPUT;
            }
            if next.contains(Self::STMT_OUTPUT) {
                next |= Self::PACKET_OUTPUT;
            }
            if next == caps {
                return caps;
            }
            caps = next;
        }
    }

    /// The framing mode this capability set requires from the protocol
    /// layer. Computed once per session, on the closed chain union.
    pub fn framing_mode(self) -> FramingMode {
        if self.close().contains(Self::STMT_INPUT) {
            FramingMode::SinglePacket
        } else {
            FramingMode::Coalesced
        }
    }
}

impl BitOr for RoutingCapabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RoutingCapabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for RoutingCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// How the protocol layer frames buffers for a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// One protocol message per chain call.
    SinglePacket,
    /// Multiple messages may be coalesced into one buffer.
    Coalesced,
}

/// What kind of module a registration describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Router,
    Filter,
}

/// A module's registration record: constant for the process lifetime.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub kind: ModuleKind,
    pub capabilities: RoutingCapabilities,
}

/// Read-only registry of module declarations.
///
/// Built once at startup; the protocol layer reads it for the lifetime of
/// every session. Capabilities are never mutated per-request.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<&'static str, ModuleInfo>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module declaration. Re-registering a name replaces the
    /// previous record; callers do this only during startup.
    pub fn register(&mut self, info: ModuleInfo) {
        tracing::debug!(
            module = info.name,
            kind = ?info.kind,
            capabilities = %info.capabilities,
            "registered module"
        );
        self.modules.insert(info.name, info);
    }

    pub fn get(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.get(name)
    }

    /// The closed capability union over the named modules.
    ///
    /// Unknown names contribute nothing; chain construction validates names
    /// separately.
    pub fn chain_capabilities<'a, I>(&self, names: I) -> RoutingCapabilities
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut union = RoutingCapabilities::NONE;
        for name in names {
            if let Some(info) = self.modules.get(name) {
                union |= info.capabilities;
            }
        }
        union.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Caps = RoutingCapabilities;

    #[test]
    fn test_closure_of_stmt_output() {
        let closed = Caps::STMT_OUTPUT.close();
        assert!(closed.contains(Caps::STMT_OUTPUT));
        assert!(closed.contains(Caps::PACKET_OUTPUT));
        assert!(!closed.contains(Caps::STMT_INPUT));
    }

    #[test]
    fn test_closure_of_resultset_output() {
        let closed = Caps::RESULTSET_OUTPUT.close();
        assert!(closed.contains(Caps::REQUEST_TRACKING));
        assert!(closed.contains(Caps::STMT_INPUT));
        assert!(closed.contains(Caps::PACKET_OUTPUT));
    }

    #[test]
    fn test_union_closure_is_order_independent() {
        let expected = Caps::STMT_OUTPUT
            | Caps::PACKET_OUTPUT
            | Caps::RESULTSET_OUTPUT
            | Caps::REQUEST_TRACKING
            | Caps::STMT_INPUT;
        let a = (Caps::STMT_OUTPUT | Caps::RESULTSET_OUTPUT).close();
        let b = (Caps::RESULTSET_OUTPUT | Caps::STMT_OUTPUT).close();
        assert_eq!(a, expected);
        assert_eq!(b, expected);
    }

    #[test]
    fn test_framing_mode() {
        assert_eq!(Caps::NONE.framing_mode(), FramingMode::Coalesced);
        assert_eq!(Caps::STMT_OUTPUT.framing_mode(), FramingMode::Coalesced);
        assert_eq!(
            Caps::REQUEST_TRACKING.framing_mode(),
            FramingMode::SinglePacket
        );
    }

    #[test]
    fn test_reserved_bits_parse_and_are_inert() {
        let raw = Caps::STMT_OUTPUT.bits() | 0x0004_0000;
        let caps = Caps::from_bits(raw).unwrap();
        let closed = caps.close();
        // The reserved bit survives but adds nothing beyond the normal
        // closure of STMT_OUTPUT.
        assert!(closed.contains(Caps::from_bits(0x0004_0000).unwrap()));
        assert_eq!(closed.framing_mode(), FramingMode::Coalesced);
    }

    #[test]
    fn test_unknown_low_bits_rejected() {
        assert!(Caps::from_bits(1 << 12).is_none());
    }

    #[test]
    fn test_registry_chain_union() {
        let mut registry = ModuleRegistry::new();
        registry.register(ModuleInfo {
            name: "tee",
            kind: ModuleKind::Filter,
            capabilities: Caps::STMT_OUTPUT,
        });
        registry.register(ModuleInfo {
            name: "rw-split",
            kind: ModuleKind::Router,
            capabilities: Caps::RESULTSET_OUTPUT,
        });

        let caps = registry.chain_capabilities(["tee", "rw-split"]);
        assert!(caps.contains(Caps::STMT_INPUT));
        assert!(caps.contains(Caps::REQUEST_TRACKING));
        assert_eq!(caps.framing_mode(), FramingMode::SinglePacket);

        // Order does not matter.
        assert_eq!(caps, registry.chain_capabilities(["rw-split", "tee"]));
    }
}
