//! Index extractor: run the resolver export and read back a table index.

use std::fmt;

use callshim_hostapi::{EngineError, ExportHandle, FuncShape, GuestInstance};

use crate::error::BridgeError;
use crate::scope::ContextScope;

/// A function-table index as returned by guest code.
///
/// Untrusted: the guest picked it. The only thing the bridge does with it is
/// hand it to the engine's checked indirect-call primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableIndex(u32);

impl TableIndex {
    /// Wrap a raw index, e.g. one the caller already holds.
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Call `export` with no arguments inside `scope` and return the 32-bit
/// value it produced.
pub fn extract_index<I: GuestInstance>(
    scope: &mut ContextScope<'_, I>,
    export: &ExportHandle,
) -> Result<TableIndex, BridgeError> {
    let failed = |reason: String| BridgeError::ExtractionFailed {
        export: export.name().to_string(),
        reason,
    };

    if export.shape() != FuncShape::RESOLVER {
        return Err(failed(format!(
            "expected signature {}, export has {}",
            FuncShape::RESOLVER,
            export.shape()
        )));
    }

    let (instance, context) = scope
        .parts()
        .ok_or_else(|| failed("execution context already released".into()))?;

    let mut results = [0u32; 1];
    instance
        .call_export(context, export, &[], &mut results)
        .map_err(|e| failed(describe(instance, &e)))?;

    Ok(TableIndex(results[0]))
}

/// Prefer the engine's own exception text; fall back to the error itself.
pub(crate) fn describe<I: GuestInstance>(instance: &I, err: &EngineError) -> String {
    instance
        .last_error_description()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| err.to_string())
}
