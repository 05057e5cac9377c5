//! Shared test helpers for integration tests.
//!
//! WAT fixtures for the guest shapes the bridge has to cope with, plus
//! loaders and a `MemInstance` factory.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use callshim_bridge::{BridgeConfig, WasmtimeInstance};
use callshim_hostapi::{MemFunc, MemInstance};

/// Stack budget used throughout the tests.
pub const STACK_SIZE: u32 = 8192;

// ── WAT Fixtures ──

/// `addr() -> 0`; slot 0 holds `print_num(x)`, which reports `x` via
/// `host.trace`.
pub const CALLBACK_WAT: &str = r#"
    (module
        (import "host" "trace" (func $trace (param i32)))
        (memory (export "memory") 1)
        (table (export "__indirect_function_table") 1 funcref)
        (elem (i32.const 0) $print_num)
        (func $print_num (param i32)
            local.get 0
            call $trace)
        (func (export "addr") (result i32)
            i32.const 0)
    )
"#;

/// Layout a C toolchain produces: slot 0 reserved (null), the callback in
/// slot 1, and `addr` returning 1.
pub const TOOLCHAIN_LAYOUT_WAT: &str = r#"
    (module
        (import "host" "trace" (func $trace (param i32)))
        (memory (export "memory") 1)
        (table (export "__indirect_function_table") 2 2 funcref)
        (elem (i32.const 1) $print_num)
        (func $print_num (param i32)
            local.get 0
            call $trace)
        (func (export "addr") (result i32)
            i32.const 1)
    )
"#;

/// Callback table present, but nothing exported as `addr`.
pub const NO_ADDR_WAT: &str = r#"
    (module
        (import "host" "trace" (func $trace (param i32)))
        (table (export "__indirect_function_table") 1 funcref)
        (elem (i32.const 0) $print_num)
        (func $print_num (param i32)
            local.get 0
            call $trace)
        (func (export "address") (result i32)
            i32.const 0)
    )
"#;

/// `addr` traps.
pub const TRAPPING_ADDR_WAT: &str = r#"
    (module
        (import "host" "trace" (func $trace (param i32)))
        (table (export "__indirect_function_table") 1 funcref)
        (elem (i32.const 0) $print_num)
        (func $print_num (param i32)
            local.get 0
            call $trace)
        (func (export "addr") (result i32)
            unreachable)
    )
"#;

/// `addr` returns an index past the end of the table.
pub const OUT_OF_BOUNDS_WAT: &str = r#"
    (module
        (import "host" "trace" (func $trace (param i32)))
        (table (export "__indirect_function_table") 1 funcref)
        (elem (i32.const 0) $print_num)
        (func $print_num (param i32)
            local.get 0
            call $trace)
        (func (export "addr") (result i32)
            i32.const 99)
    )
"#;

/// `addr` points at a null slot.
pub const NULL_SLOT_WAT: &str = r#"
    (module
        (import "host" "trace" (func $trace (param i32)))
        (table (export "__indirect_function_table") 2 funcref)
        (elem (i32.const 0) $print_num)
        (func $print_num (param i32)
            local.get 0
            call $trace)
        (func (export "addr") (result i32)
            i32.const 1)
    )
"#;

/// `addr` points at a two-argument function.
pub const SIGNATURE_MISMATCH_WAT: &str = r#"
    (module
        (import "host" "trace" (func $trace (param i32)))
        (table (export "__indirect_function_table") 1 funcref)
        (elem (i32.const 0) $add)
        (func $add (param i32 i32)
            local.get 0
            local.get 1
            i32.add
            call $trace)
        (func (export "addr") (result i32)
            i32.const 0)
    )
"#;

/// The callback itself traps.
pub const TRAPPING_CALLBACK_WAT: &str = r#"
    (module
        (table (export "__indirect_function_table") 1 funcref)
        (elem (i32.const 0) $bad)
        (func $bad (param i32)
            unreachable)
        (func (export "addr") (result i32)
            i32.const 0)
    )
"#;

/// `addr` has the wrong signature: it takes a parameter.
pub const WRONG_ADDR_SHAPE_WAT: &str = r#"
    (module
        (table (export "__indirect_function_table") 1 funcref)
        (func (export "addr") (param i32) (result i32)
            local.get 0)
    )
"#;

/// No function table at all.
pub const NO_TABLE_WAT: &str = r#"
    (module
        (func (export "addr") (result i32)
            i32.const 0)
    )
"#;

/// `addr` never returns.
pub const SPINNING_ADDR_WAT: &str = r#"
    (module
        (table (export "__indirect_function_table") 1 funcref)
        (func (export "addr") (result i32)
            (loop $forever (br $forever))
            i32.const 0)
    )
"#;

/// The callback logs a message through `host.log` before tracing.
pub const LOGGING_CALLBACK_WAT: &str = r#"
    (module
        (import "host" "log" (func $log (param i32 i32 i32) (result i32)))
        (import "host" "trace" (func $trace (param i32)))
        (memory (export "memory") 1)
        (data (i32.const 16) "callback ran")
        (table (export "__indirect_function_table") 1 funcref)
        (elem (i32.const 0) $cb)
        (func $cb (param i32)
            (drop (call $log (i32.const 2) (i32.const 16) (i32.const 12)))
            local.get 0
            call $trace)
        (func (export "addr") (result i32)
            i32.const 0)
    )
"#;

/// `addr` advances a counter on every call: 0, 1, 0, 1, ...
/// Only slot 0 holds a callback.
pub const ALTERNATING_ADDR_WAT: &str = r#"
    (module
        (import "host" "trace" (func $trace (param i32)))
        (global $n (mut i32) (i32.const 0))
        (table (export "__indirect_function_table") 2 funcref)
        (elem (i32.const 0) $print_num)
        (func $print_num (param i32)
            local.get 0
            call $trace)
        (func (export "addr") (result i32)
            (local $cur i32)
            global.get $n
            local.set $cur
            global.get $n
            i32.const 1
            i32.xor
            global.set $n
            local.get $cur)
    )
"#;

// ── Logging ──

/// Route `tracing` output to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Loaders ──

/// Instantiate a WAT fixture with the default config.
pub fn load(wat: &str) -> WasmtimeInstance {
    load_with_config(wat, BridgeConfig::default())
}

pub fn load_with_config(wat: &str, config: BridgeConfig) -> WasmtimeInstance {
    WasmtimeInstance::new(wat.as_bytes(), config).expect("fixture should load")
}

/// Every fixture for which `call_callback_by_name` must fail, with a label.
pub fn failing_fixtures() -> Vec<(&'static str, &'static str)> {
    vec![
        ("no addr", NO_ADDR_WAT),
        ("trapping addr", TRAPPING_ADDR_WAT),
        ("out of bounds", OUT_OF_BOUNDS_WAT),
        ("null slot", NULL_SLOT_WAT),
        ("signature mismatch", SIGNATURE_MISMATCH_WAT),
        ("trapping callback", TRAPPING_CALLBACK_WAT),
        ("wrong addr shape", WRONG_ADDR_SHAPE_WAT),
        ("no table", NO_TABLE_WAT),
    ]
}

// ── MemInstance Builders ──

/// `MemInstance` with `addr() -> index` and a recording callback in slot 0.
pub fn recording_mem_instance(index: u32) -> (MemInstance, Arc<Mutex<Vec<u32>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let instance = MemInstance::new()
        .with_export("addr", MemFunc::constant(index))
        .with_table_entry(MemFunc::callback(move |x| sink.lock().unwrap().push(x)));
    (instance, calls)
}
