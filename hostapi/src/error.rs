//! Engine-side error type.
//!
//! `EngineError` is what a [`GuestInstance`](crate::GuestInstance) reports
//! when one of its primitives refuses or fails. The bridge turns these into
//! its own stage-tagged errors; the variants here describe the engine's view.

use crate::types::{FuncShape, InstanceId};

/// Failure reported by an engine backend primitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// An execution context could not be created.
    #[error("execution context unavailable: {0}")]
    ContextUnavailable(String),

    /// A handle issued by a different instance was passed in.
    #[error("handle for '{name}' belongs to {owner}, not to this instance")]
    ForeignHandle { name: String, owner: InstanceId },

    /// A context created against a different instance was passed in.
    #[error("execution context belongs to {owner}, not to this instance")]
    ForeignContext { owner: InstanceId },

    /// Argument or result slot counts do not match the export's shape.
    #[error("'{name}' expects {expected}, called with {args} args and {results} result slots")]
    ArityMismatch {
        name: String,
        expected: FuncShape,
        args: usize,
        results: usize,
    },

    /// The guest trapped.
    #[error("guest trapped: {0}")]
    Trap(String),

    /// The instance exposes no function table.
    #[error("instance has no function table")]
    NoTable,

    /// Table index past the end of the table.
    #[error("table index {index} out of bounds")]
    OutOfBounds { index: u32 },

    /// Table slot holds a null reference.
    #[error("uninitialized table element at index {index}")]
    NullEntry { index: u32 },

    /// Table slot holds something other than a function.
    #[error("table element at index {index} is not a function")]
    NotAFunction { index: u32 },

    /// Table slot holds a function of the wrong signature.
    #[error("indirect call type mismatch at index {index}: expected {expected}, found {found}")]
    SignatureMismatch {
        index: u32,
        expected: FuncShape,
        found: FuncShape,
    },

    /// The engine's instruction budget ran out.
    #[error("fuel exhausted")]
    FuelExhausted,

    /// Any other backend failure.
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True when the failure originated inside guest code rather than in a
    /// host-side check.
    pub fn is_guest_fault(&self) -> bool {
        matches!(self, Self::Trap(_) | Self::FuelExhausted)
    }
}
