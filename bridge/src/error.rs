//! Bridge error types.

use callshim_hostapi::EngineError;

use crate::TableIndex;

/// The step of the resolve-extract-invoke sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AcquireContext,
    ResolveExport,
    ExtractIndex,
    IndirectCall,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AcquireContext => "acquire_context",
            Stage::ResolveExport => "resolve_export",
            Stage::ExtractIndex => "extract_index",
            Stage::IndirectCall => "indirect_call",
        }
    }
}

/// Failure of one bridge invocation. Every variant is terminal for that
/// invocation; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// The engine refused to create an execution context.
    #[error("failed to create execution context: {0}")]
    ContextCreationFailed(#[source] EngineError),

    /// No export with this exact name.
    #[error("export '{0}' not found")]
    ExportNotFound(String),

    /// The resolver export failed or has the wrong shape.
    #[error("failed to invoke '{export}': {reason}")]
    ExtractionFailed { export: String, reason: String },

    /// The indirect call was rejected by the engine or trapped.
    #[error("indirect call at table index {index} failed: {reason}")]
    IndirectCallFailed { index: TableIndex, reason: String },
}

impl BridgeError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::ContextCreationFailed(_) => Stage::AcquireContext,
            Self::ExportNotFound(_) => Stage::ResolveExport,
            Self::ExtractionFailed { .. } => Stage::ExtractIndex,
            Self::IndirectCallFailed { .. } => Stage::IndirectCall,
        }
    }
}

/// Errors from loading and instantiating a module in the wasmtime backend.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Wasmtime engine, compilation, or instantiation error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),

    /// Module imports something the host does not provide.
    #[error("validation error: {0}")]
    Validation(String),

    /// Module file could not be read.
    #[error("failed to read module: {0}")]
    Io(#[from] std::io::Error),
}
