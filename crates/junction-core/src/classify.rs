//! Query classification seam.
//!
//! The SQL tokenizer/parser is an external collaborator. The chain only
//! needs a coarse classification of each query buffer to make framing
//! decisions, so it consumes this trait rather than a parser.

use crate::packet::Packet;

/// Coarse statement category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
    SessionCommand,
    TransactionControl,
    Other,
}

/// Classification of one query buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: StatementKind,
    /// True when the buffer carries more than one statement.
    pub multi_statement: bool,
}

impl Classification {
    pub fn single(kind: StatementKind) -> Self {
        Self {
            kind,
            multi_statement: false,
        }
    }
}

/// Classifies raw query buffers for routing decisions.
pub trait QueryClassifier {
    fn classify(&self, packet: &Packet) -> Classification;
}

/// Classifier for deployments without a parser: every buffer is a single
/// statement of unknown kind.
#[derive(Debug, Default)]
pub struct DefaultClassifier;

impl QueryClassifier for DefaultClassifier {
    fn classify(&self, _packet: &Packet) -> Classification {
        Classification::single(StatementKind::Other)
    }
}
