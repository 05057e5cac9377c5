//! Bridge configuration.

/// Name of the zero-argument export that yields the callback's table index.
pub const RESOLVER_EXPORT: &str = "addr";

/// Import module name for the host functions the wasmtime backend provides.
pub const HOST_IMPORT_MODULE: &str = "host";

/// Smallest stack budget (bytes) accepted for an execution context.
pub const MIN_STACK_SIZE: u32 = 1024;

/// Configuration for the wasmtime backend.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Largest stack budget (bytes) a context may ask for. Also the
    /// engine's `max_wasm_stack`.
    /// Default: 512 KiB.
    pub max_stack_size: u32,

    /// Wasmtime fuel granted to each execution context. `None` disables
    /// fuel metering.
    pub fuel_limit: Option<u64>,

    /// Name of the exported function table used for indirect calls.
    /// `None` picks the first exported funcref table.
    pub table_export: Option<String>,

    /// Whether guest `host.log` messages are re-emitted through `tracing`.
    pub enable_guest_logs: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_stack_size: 512 * 1024,
            fuel_limit: Some(10_000_000),
            table_export: None,
            enable_guest_logs: false,
        }
    }
}
