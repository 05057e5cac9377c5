//! In-memory module instance for testing.
//!
//! `MemInstance` implements [`GuestInstance`] with Rust closures standing in
//! for guest functions. It enforces the same checks a real engine does
//! (handle ownership, arity, table bounds, null slots, signatures) and counts
//! everything, so the bridge can be tested without compiling WASM.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::EngineError;
use crate::ledger::{ContextLedger, LedgerSnapshot};
use crate::traits::GuestInstance;
use crate::types::{ExportHandle, FuncShape, InstanceId};

/// Default largest stack budget a `MemInstance` accepts (64 KiB).
pub const MEM_MAX_STACK_SIZE: u32 = 64 * 1024;

type GuestFn = dyn Fn(&[u32]) -> Result<Vec<u32>, String> + Send + Sync;

/// A guest function simulated by a closure.
///
/// The closure returns the result values, or `Err(message)` to trap.
#[derive(Clone)]
pub struct MemFunc {
    shape: FuncShape,
    body: Arc<GuestFn>,
}

impl MemFunc {
    pub fn new<F>(shape: FuncShape, body: F) -> Self
    where
        F: Fn(&[u32]) -> Result<Vec<u32>, String> + Send + Sync + 'static,
    {
        Self {
            shape,
            body: Arc::new(body),
        }
    }

    /// `() -> i32` returning `value` every time.
    pub fn constant(value: u32) -> Self {
        Self::new(FuncShape::RESOLVER, move |_| Ok(vec![value]))
    }

    /// A function of the given shape that always traps with `message`.
    pub fn trapping(shape: FuncShape, message: &str) -> Self {
        let message = message.to_string();
        Self::new(shape, move |_| Err(message.clone()))
    }

    /// `(i32) -> ()` handing its argument to `sink`.
    pub fn callback<F>(sink: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        Self::new(FuncShape::CALLBACK, move |args| {
            sink(args[0]);
            Ok(Vec::new())
        })
    }

    pub fn shape(&self) -> FuncShape {
        self.shape
    }
}

impl fmt::Debug for MemFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemFunc").field("shape", &self.shape).finish()
    }
}

/// Execution context issued by a [`MemInstance`].
#[derive(Debug)]
pub struct MemContext<'a> {
    owner: InstanceId,
    stack_size: u32,
    _instance: PhantomData<&'a MemInstance>,
}

impl MemContext<'_> {
    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }
}

/// In-memory [`GuestInstance`].
#[derive(Debug)]
pub struct MemInstance {
    id: InstanceId,
    exports: Vec<(String, MemFunc)>,
    index: BTreeMap<String, u32>,
    table: Option<Vec<Option<MemFunc>>>,
    max_stack_size: u32,
    refuse_contexts: bool,
    ledger: ContextLedger,
    // One slot for all contexts; concurrent invocations may overwrite it.
    last_error: Mutex<Option<String>>,
    export_calls: AtomicU64,
    indirect_calls: AtomicU64,
}

impl Default for MemInstance {
    fn default() -> Self {
        Self::new()
    }
}

impl MemInstance {
    /// An instance with no exports and no table.
    pub fn new() -> Self {
        Self {
            id: InstanceId::fresh(),
            exports: Vec::new(),
            index: BTreeMap::new(),
            table: None,
            max_stack_size: MEM_MAX_STACK_SIZE,
            refuse_contexts: false,
            ledger: ContextLedger::new(),
            last_error: Mutex::new(None),
            export_calls: AtomicU64::new(0),
            indirect_calls: AtomicU64::new(0),
        }
    }

    /// Add (or replace) a named export.
    pub fn with_export(mut self, name: &str, func: MemFunc) -> Self {
        match self.index.get(name) {
            Some(&slot) => self.exports[slot as usize].1 = func,
            None => {
                self.index.insert(name.to_string(), self.exports.len() as u32);
                self.exports.push((name.to_string(), func));
            }
        }
        self
    }

    /// Append a function to the table, creating the table if needed.
    pub fn with_table_entry(mut self, func: MemFunc) -> Self {
        self.table.get_or_insert_with(Vec::new).push(Some(func));
        self
    }

    /// Append a null slot to the table, creating the table if needed.
    pub fn with_null_entry(mut self) -> Self {
        self.table.get_or_insert_with(Vec::new).push(None);
        self
    }

    /// Largest stack budget accepted by `create_execution_context`.
    pub fn with_max_stack_size(mut self, bytes: u32) -> Self {
        self.max_stack_size = bytes;
        self
    }

    /// Make every context creation attempt fail.
    pub fn refusing_contexts(mut self) -> Self {
        self.refuse_contexts = true;
        self
    }

    pub fn context_stats(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    /// Number of `call_export` invocations, failed ones included.
    pub fn export_calls(&self) -> u64 {
        self.export_calls.load(Ordering::Acquire)
    }

    /// Number of `call_indirect` invocations, rejected ones included.
    pub fn indirect_calls(&self) -> u64 {
        self.indirect_calls.load(Ordering::Acquire)
    }

    fn record_error(&self, err: EngineError) -> EngineError {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(format!("Exception: {}", err));
        }
        err
    }

    fn check_context(&self, context: &MemContext<'_>) -> Result<(), EngineError> {
        if context.owner != self.id {
            return Err(EngineError::ForeignContext {
                owner: context.owner,
            });
        }
        Ok(())
    }
}

impl GuestInstance for MemInstance {
    type Context<'a> = MemContext<'a>;

    fn id(&self) -> InstanceId {
        self.id
    }

    fn create_execution_context(&self, stack_size: u32) -> Result<MemContext<'_>, EngineError> {
        if self.refuse_contexts {
            self.ledger.record_refused();
            return Err(EngineError::ContextUnavailable(
                "context creation disabled".into(),
            ));
        }
        if stack_size == 0 || stack_size > self.max_stack_size {
            self.ledger.record_refused();
            return Err(EngineError::ContextUnavailable(format!(
                "stack size {} outside 1..={}",
                stack_size, self.max_stack_size
            )));
        }
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = None;
        }
        self.ledger.record_created();
        Ok(MemContext {
            owner: self.id,
            stack_size,
            _instance: PhantomData,
        })
    }

    fn destroy_execution_context<'a>(&'a self, context: MemContext<'a>) {
        debug_assert_eq!(context.owner, self.id);
        self.ledger.record_destroyed();
    }

    fn lookup_export(&self, name: &str) -> Option<ExportHandle> {
        let slot = *self.index.get(name)?;
        let (name, func) = &self.exports[slot as usize];
        Some(ExportHandle::issue(self.id, slot, name, func.shape()))
    }

    fn call_export<'a>(
        &'a self,
        context: &mut MemContext<'a>,
        export: &ExportHandle,
        args: &[u32],
        results: &mut [u32],
    ) -> Result<(), EngineError> {
        self.export_calls.fetch_add(1, Ordering::AcqRel);
        self.check_context(context).map_err(|e| self.record_error(e))?;
        if !export.is_owned_by(self.id) {
            return Err(self.record_error(EngineError::ForeignHandle {
                name: export.name().to_string(),
                owner: export.owner(),
            }));
        }
        let func = self
            .exports
            .get(export.slot() as usize)
            .map(|(_, f)| f)
            .ok_or_else(|| {
                self.record_error(EngineError::Internal(format!(
                    "export slot {} vanished",
                    export.slot()
                )))
            })?;

        let shape = func.shape();
        if args.len() != shape.params || results.len() != shape.results {
            return Err(self.record_error(EngineError::ArityMismatch {
                name: export.name().to_string(),
                expected: shape,
                args: args.len(),
                results: results.len(),
            }));
        }

        let values = (func.body)(args).map_err(|msg| self.record_error(EngineError::Trap(msg)))?;
        if values.len() != results.len() {
            return Err(self.record_error(EngineError::Internal(format!(
                "'{}' produced {} values for {} result slots",
                export.name(),
                values.len(),
                results.len()
            ))));
        }
        results.copy_from_slice(&values);
        Ok(())
    }

    fn call_indirect<'a>(
        &'a self,
        context: &mut MemContext<'a>,
        table_index: u32,
        args: &[u32],
    ) -> Result<(), EngineError> {
        self.indirect_calls.fetch_add(1, Ordering::AcqRel);
        self.check_context(context).map_err(|e| self.record_error(e))?;

        let table = self
            .table
            .as_ref()
            .ok_or_else(|| self.record_error(EngineError::NoTable))?;
        let slot = table
            .get(table_index as usize)
            .ok_or_else(|| self.record_error(EngineError::OutOfBounds { index: table_index }))?;
        let func = slot
            .as_ref()
            .ok_or_else(|| self.record_error(EngineError::NullEntry { index: table_index }))?;

        let expected = FuncShape::i32s(args.len(), 0);
        if func.shape() != expected {
            return Err(self.record_error(EngineError::SignatureMismatch {
                index: table_index,
                expected,
                found: func.shape(),
            }));
        }

        (func.body)(args).map_err(|msg| self.record_error(EngineError::Trap(msg)))?;
        Ok(())
    }

    fn last_error_description(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }
}
