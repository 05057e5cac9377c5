//! `GuestInstance`: the engine contract the bridge is written against.
//!
//! A module instance is created and destroyed by whoever loaded it; the
//! bridge only borrows it. The trait exposes exactly the primitives the
//! bridge needs: execution context lifecycle, export lookup, direct export
//! calls, the bounds- and signature-checked indirect call, and the engine's
//! last error description.

use crate::error::EngineError;
use crate::types::{ExportHandle, InstanceId};

/// A loaded, instantiated guest module.
///
/// All methods take `&self`: the instance is read-only from the bridge's
/// point of view, and any mutable engine state lives behind the context.
pub trait GuestInstance {
    /// Per-invocation execution context (call stack and engine resources).
    ///
    /// Borrows the instance, so a context can never outlive it.
    type Context<'a>
    where
        Self: 'a;

    /// Identity of this instance. Handles and contexts it issues carry it.
    fn id(&self) -> InstanceId;

    /// Create a context with the given stack-size budget in bytes.
    ///
    /// How the budget is enforced is up to the backend. Some only check it
    /// against an accepted range and apply their own fixed limit.
    fn create_execution_context(&self, stack_size: u32) -> Result<Self::Context<'_>, EngineError>;

    /// Tear a context down. Called exactly once per created context.
    fn destroy_execution_context<'a>(&'a self, context: Self::Context<'a>);

    /// Look an export up by exact, case-sensitive name.
    ///
    /// Pure: needs no context and has no side effects.
    fn lookup_export(&self, name: &str) -> Option<ExportHandle>;

    /// Call an export directly. `results` must have one slot per result.
    fn call_export<'a>(
        &'a self,
        context: &mut Self::Context<'a>,
        export: &ExportHandle,
        args: &[u32],
        results: &mut [u32],
    ) -> Result<(), EngineError>;

    /// Call through the instance's function table at `table_index`.
    ///
    /// This is the trust boundary for guest-supplied indices: the
    /// implementation must check bounds, null entries and the callee's
    /// signature against `args` before dispatching.
    fn call_indirect<'a>(
        &'a self,
        context: &mut Self::Context<'a>,
        table_index: u32,
        args: &[u32],
    ) -> Result<(), EngineError>;

    /// The engine's description of the most recent failure, if any.
    ///
    /// Backends keep one slot per instance, cleared when a context is
    /// created. A backend that allows concurrent contexts may report another
    /// invocation's failure here; treat it as a diagnostic only.
    fn last_error_description(&self) -> Option<String>;
}
