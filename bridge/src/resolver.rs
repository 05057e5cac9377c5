//! Export resolver: name to [`ExportHandle`].

use callshim_hostapi::{ExportHandle, GuestInstance};

use crate::error::BridgeError;

/// Look up the export `name` on `instance`.
///
/// Exact, case-sensitive match. Needs no execution context.
pub fn resolve<I: GuestInstance>(instance: &I, name: &str) -> Result<ExportHandle, BridgeError> {
    instance
        .lookup_export(name)
        .ok_or_else(|| BridgeError::ExportNotFound(name.to_string()))
}
