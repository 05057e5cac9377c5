//! `callshim-bridge`: host-side indirect-call bridge for sandboxed WASM guests.
//!
//! The bridge asks a guest module which function-table slot holds its
//! callback, then calls that slot with a host-supplied argument:
//!
//! - **Context scope:** one execution context per invocation, released on
//!   every exit path
//! - **Export resolution:** exact-name lookup of the resolver export (`addr`)
//! - **Index extraction:** the resolver's return value, treated as untrusted
//! - **Indirect invocation:** through the engine's bounds- and
//!   signature-checked primitive, failures surfaced as [`BridgeError`]
//!
//! The bridge works against any [`callshim_hostapi::GuestInstance`].
//! [`WasmtimeInstance`] is the wasmtime-backed one.
//!
//! The primary entry point is [`call_callback_by_name`].

pub mod error;
pub mod config;
pub mod scope;
pub mod resolver;
pub mod extract;
pub mod invoke;
pub mod bridge;
pub mod memory;
pub mod host_impl;
pub mod validation;
pub mod linker;
pub mod runtime;

pub use error::{BridgeError, LoadError, Stage};
pub use config::{BridgeConfig, RESOLVER_EXPORT};
pub use scope::{acquire, ContextScope};
pub use resolver::resolve;
pub use extract::{extract_index, TableIndex};
pub use invoke::invoke_indirect;
pub use bridge::{call_callback, call_callback_by_export, call_callback_by_name, try_call_callback_by_name};
pub use runtime::{WasmtimeContext, WasmtimeInstance};
