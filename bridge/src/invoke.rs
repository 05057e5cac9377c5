//! Indirect invoker.

use callshim_hostapi::GuestInstance;

use crate::error::BridgeError;
use crate::extract::{describe, TableIndex};
use crate::scope::ContextScope;

/// Call the table entry at `index` with `argument`, once.
///
/// The index is not checked here. The engine's `call_indirect` checks
/// bounds, null slots and the `(i32) -> ()` signature; any refusal or trap
/// comes back as [`BridgeError::IndirectCallFailed`].
pub fn invoke_indirect<I: GuestInstance>(
    scope: &mut ContextScope<'_, I>,
    index: TableIndex,
    argument: u32,
) -> Result<(), BridgeError> {
    let (instance, context) = scope
        .parts()
        .ok_or_else(|| BridgeError::IndirectCallFailed {
            index,
            reason: "execution context already released".into(),
        })?;

    instance
        .call_indirect(context, index.get(), &[argument])
        .map_err(|e| BridgeError::IndirectCallFailed {
            index,
            reason: describe(instance, &e),
        })
}
