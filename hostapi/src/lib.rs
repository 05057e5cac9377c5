//! `callshim-hostapi`: the engine contract behind the callshim bridge.
//!
//! The bridge never talks to a WASM engine directly. It talks to a
//! [`GuestInstance`], which this crate defines together with the pieces
//! every backend shares:
//!
//! - `GuestInstance` trait: context lifecycle, export lookup, direct and
//!   indirect calls, last error description
//! - `ExportHandle`, `InstanceId`, `FuncShape`: opaque handle types
//! - `EngineError`: what a backend primitive reports on failure
//! - `ContextLedger`: context creation/destruction accounting
//! - `MemInstance`: closure-backed `GuestInstance` for testing

pub mod error;
pub mod types;
pub mod ledger;
pub mod traits;
pub mod mem_instance;

pub use error::EngineError;
pub use types::{ExportHandle, FuncShape, InstanceId};
pub use ledger::{ContextLedger, LedgerSnapshot};
pub use traits::GuestInstance;
pub use mem_instance::{MemContext, MemFunc, MemInstance};
