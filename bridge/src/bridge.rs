//! Bridge orchestrator: resolve by name, extract the index, call indirectly.
//!
//! Sequence for one invocation:
//!
//! 1. acquire an execution context
//! 2. resolve the resolver export (`"addr"` by default)
//! 3. call it to obtain a table index
//! 4. call the table entry at that index with the caller's argument
//! 5. release the context
//!
//! Any failing step ends the invocation. The context lives in a
//! [`ContextScope`], so it is released exactly once on every path.
//!
//! Precondition: the resolver export is expected to be free of side effects.
//! The bridge calls it on every invocation and does not cache the index, so
//! a guest that changes its answer between calls gets whatever it returns.

use callshim_hostapi::GuestInstance;

use crate::config::RESOLVER_EXPORT;
use crate::error::BridgeError;
use crate::extract::{extract_index, TableIndex};
use crate::invoke::invoke_indirect;
use crate::resolver::resolve;
use crate::scope::{acquire, ContextScope};

/// Resolve the callback through the `"addr"` export and call it with
/// `argument`.
///
/// Returns `true` only when every step succeeded. Failures are reported via
/// `tracing` at `warn` and otherwise collapse to `false`.
pub fn call_callback_by_name<I: GuestInstance>(instance: &I, stack_size: u32, argument: u32) -> bool {
    match try_call_callback_by_name(instance, stack_size, argument) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                instance = %instance.id(),
                stage = err.stage().as_str(),
                error = %err,
                "callback invocation failed"
            );
            false
        }
    }
}

/// [`call_callback_by_name`] with the failure kept.
pub fn try_call_callback_by_name<I: GuestInstance>(
    instance: &I,
    stack_size: u32,
    argument: u32,
) -> Result<(), BridgeError> {
    call_callback_by_export(instance, RESOLVER_EXPORT, stack_size, argument)
}

/// Same sequence with a caller-chosen resolver export.
pub fn call_callback_by_export<I: GuestInstance>(
    instance: &I,
    resolver_export: &str,
    stack_size: u32,
    argument: u32,
) -> Result<(), BridgeError> {
    let mut scope = acquire(instance, stack_size)?;
    let resolver = resolve(instance, resolver_export)?;
    let index = extract_index(&mut scope, &resolver)?;
    tracing::debug!(
        instance = %instance.id(),
        export = resolver_export,
        index = index.get(),
        "got function index from guest"
    );

    invoke_indirect(&mut scope, index, argument)?;
    scope.release();

    tracing::debug!(
        instance = %instance.id(),
        index = index.get(),
        argument,
        "indirect call succeeded"
    );
    Ok(())
}

/// Low-level call through an already acquired scope with a known index.
pub fn call_callback<I: GuestInstance>(
    scope: &mut ContextScope<'_, I>,
    table_index: u32,
    argument: u32,
) -> Result<(), BridgeError> {
    invoke_indirect(scope, TableIndex::new(table_index), argument)
}
