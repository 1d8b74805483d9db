//! Error types for chain assembly.

use thiserror::Error;

use junction_core::ConnectError;

/// A failure constructing a session chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A chain referenced a module the registry has no declaration for.
    #[error("unknown module: {name}")]
    UnknownModule { name: String },

    /// The target could not supply the chain's backend connection.
    #[error(transparent)]
    Connect(#[from] ConnectError),
}
