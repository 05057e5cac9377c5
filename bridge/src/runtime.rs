//! Wasmtime-backed [`GuestInstance`].
//!
//! `WasmtimeInstance` loads a module, validates its imports, links the
//! `host` functions and instantiates it. The `Store` sits behind a mutex: an
//! execution context is the lock guard plus the stack budget it was created
//! with, so contexts are exclusive and concurrent invocations serialize.
//! A thread that already holds the store is refused a second context rather
//! than left waiting on itself.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use wasmtime::{Config, Engine, ExternType, Func, FuncType, Linker, Module, Ref, Store, Table, Trap, Val, ValType};

use callshim_hostapi::{
    ContextLedger, EngineError, ExportHandle, FuncShape, GuestInstance, InstanceId, LedgerSnapshot,
};

use crate::config::{BridgeConfig, MIN_STACK_SIZE};
use crate::error::LoadError;
use crate::host_impl::{GuestState, Journal};
use crate::linker::register_host_functions;
use crate::validation::{select_table, validate_module};

struct ExportEntry {
    name: String,
    shape: FuncShape,
    func: Func,
}

/// Execution context of a [`WasmtimeInstance`]: exclusive access to its
/// store for the duration of one invocation sequence.
pub struct WasmtimeContext<'a> {
    owner: InstanceId,
    stack_size: u32,
    holder: &'a Mutex<Option<ThreadId>>,
    store: MutexGuard<'a, Store<GuestState>>,
}

impl WasmtimeContext<'_> {
    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }

    /// Fuel left in this context, when metering is on.
    pub fn fuel_remaining(&self) -> Option<u64> {
        self.store.get_fuel().ok()
    }
}

impl Drop for WasmtimeContext<'_> {
    fn drop(&mut self) {
        // Runs before `store` is unlocked.
        *lock_holder(self.holder) = None;
    }
}

impl fmt::Debug for WasmtimeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WasmtimeContext")
            .field("owner", &self.owner)
            .field("stack_size", &self.stack_size)
            .finish()
    }
}

/// A module instantiated in its own wasmtime store.
pub struct WasmtimeInstance {
    id: InstanceId,
    digest: blake3::Hash,
    config: BridgeConfig,
    store: Mutex<Store<GuestState>>,
    holder: Mutex<Option<ThreadId>>,
    exports: Vec<ExportEntry>,
    index: BTreeMap<String, u32>,
    table: Option<Table>,
    journal: Arc<Journal>,
    ledger: ContextLedger,
    last_error: Mutex<Option<String>>,
}

impl WasmtimeInstance {
    /// Compile and instantiate a module from WASM binary or WAT text.
    pub fn new(wasm_bytes: &[u8], config: BridgeConfig) -> Result<Self, LoadError> {
        let engine = create_engine(&config)?;
        let module = Module::new(&engine, wasm_bytes)?;
        Self::instantiate(&engine, &module, blake3::hash(wasm_bytes), config)
    }

    /// Load from a `.wasm` or `.wat` file path.
    pub fn from_file(path: &Path, config: BridgeConfig) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path)?;
        Self::new(&bytes, config)
    }

    fn instantiate(
        engine: &Engine,
        module: &Module,
        digest: blake3::Hash,
        config: BridgeConfig,
    ) -> Result<Self, LoadError> {
        validate_module(module)?;
        let table_name = select_table(module, config.table_export.as_deref())?;

        let id = InstanceId::fresh();
        let journal = Arc::new(Journal::new());
        let state = GuestState::new(id, Arc::clone(&journal), config.enable_guest_logs);

        let mut store = Store::new(engine, state);
        // Start functions run during instantiation and need fuel too.
        if let Some(fuel) = config.fuel_limit {
            store.set_fuel(fuel)?;
        }

        let mut linker = Linker::new(engine);
        register_host_functions(&mut linker)?;
        let instance = linker.instantiate(&mut store, module)?;

        let mut exports = Vec::new();
        let mut index = BTreeMap::new();
        for export in module.exports() {
            let ExternType::Func(ty) = export.ty() else {
                continue;
            };
            let func = instance.get_func(&mut store, export.name()).ok_or_else(|| {
                LoadError::Validation(format!("export '{}' not found on instance", export.name()))
            })?;
            index.insert(export.name().to_string(), exports.len() as u32);
            exports.push(ExportEntry {
                name: export.name().to_string(),
                shape: shape_of(&ty),
                func,
            });
        }

        let table = match table_name {
            Some(name) => Some(instance.get_table(&mut store, &name).ok_or_else(|| {
                LoadError::Validation(format!("table '{}' not found on instance", name))
            })?),
            None => None,
        };

        tracing::debug!(
            instance = %id,
            module = %digest.to_hex(),
            exports = exports.len(),
            has_table = table.is_some(),
            "instantiated guest module"
        );

        Ok(Self {
            id,
            digest,
            config,
            store: Mutex::new(store),
            holder: Mutex::new(None),
            exports,
            index,
            table,
            journal,
            ledger: ContextLedger::new(),
            last_error: Mutex::new(None),
        })
    }

    /// BLAKE3 digest of the module bytes this instance was loaded from.
    pub fn module_digest(&self) -> &blake3::Hash {
        &self.digest
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// What the guest reported through `host.log` and `host.trace`.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn context_stats(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    pub fn has_table(&self) -> bool {
        self.table.is_some()
    }

    fn record_error(&self, err: EngineError) -> EngineError {
        tracing::debug!(
            instance = %self.id,
            guest_fault = err.is_guest_fault(),
            error = %err,
            "engine call failed"
        );
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(format!("Exception: {}", err));
        }
        err
    }

    fn refuse(&self, reason: String) -> EngineError {
        self.ledger.record_refused();
        EngineError::ContextUnavailable(reason)
    }

    fn check_context(&self, context: &WasmtimeContext<'_>) -> Result<(), EngineError> {
        if context.owner != self.id {
            return Err(self.record_error(EngineError::ForeignContext {
                owner: context.owner,
            }));
        }
        Ok(())
    }
}

impl fmt::Debug for WasmtimeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WasmtimeInstance")
            .field("id", &self.id)
            .field("module", &self.digest.to_hex())
            .field("exports", &self.index.keys().collect::<Vec<_>>())
            .field("has_table", &self.table.is_some())
            .finish()
    }
}

impl GuestInstance for WasmtimeInstance {
    type Context<'a> = WasmtimeContext<'a>;

    fn id(&self) -> InstanceId {
        self.id
    }

    /// `stack_size` is range-checked against
    /// `MIN_STACK_SIZE..=config.max_stack_size` only. Wasmtime has no
    /// per-store stack limit; the guest stack is capped engine-wide at
    /// `max_stack_size` through `max_wasm_stack`.
    ///
    /// Blocks while another thread holds a context. Refused if the calling
    /// thread already holds one.
    fn create_execution_context(&self, stack_size: u32) -> Result<WasmtimeContext<'_>, EngineError> {
        if stack_size < MIN_STACK_SIZE || stack_size > self.config.max_stack_size {
            return Err(self.refuse(format!(
                "stack size {} outside {}..={}",
                stack_size, MIN_STACK_SIZE, self.config.max_stack_size
            )));
        }

        let current = thread::current().id();
        if *lock_holder(&self.holder) == Some(current) {
            return Err(self.refuse(
                "this thread already holds an execution context on the instance".into(),
            ));
        }

        let mut store = self
            .store
            .lock()
            .map_err(|_| self.refuse("store lock poisoned".into()))?;
        if let Some(fuel) = self.config.fuel_limit {
            store
                .set_fuel(fuel)
                .map_err(|e| self.refuse(format!("set fuel: {}", e)))?;
        }
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = None;
        }

        *lock_holder(&self.holder) = Some(current);
        self.ledger.record_created();
        tracing::trace!(instance = %self.id, stack_size, "execution context created");
        Ok(WasmtimeContext {
            owner: self.id,
            stack_size,
            holder: &self.holder,
            store,
        })
    }

    fn destroy_execution_context<'a>(&'a self, context: WasmtimeContext<'a>) {
        debug_assert_eq!(context.owner, self.id);
        drop(context);
        self.ledger.record_destroyed();
        tracing::trace!(instance = %self.id, "execution context destroyed");
    }

    fn lookup_export(&self, name: &str) -> Option<ExportHandle> {
        let slot = *self.index.get(name)?;
        let entry = &self.exports[slot as usize];
        Some(ExportHandle::issue(self.id, slot, &entry.name, entry.shape))
    }

    fn call_export<'a>(
        &'a self,
        context: &mut WasmtimeContext<'a>,
        export: &ExportHandle,
        args: &[u32],
        results: &mut [u32],
    ) -> Result<(), EngineError> {
        self.check_context(context)?;
        if !export.is_owned_by(self.id) {
            return Err(self.record_error(EngineError::ForeignHandle {
                name: export.name().to_string(),
                owner: export.owner(),
            }));
        }
        let entry = self.exports.get(export.slot() as usize).ok_or_else(|| {
            self.record_error(EngineError::Internal(format!(
                "export slot {} vanished",
                export.slot()
            )))
        })?;

        if !entry.shape.all_i32 || args.len() != entry.shape.params || results.len() != entry.shape.results {
            return Err(self.record_error(EngineError::ArityMismatch {
                name: entry.name.clone(),
                expected: entry.shape,
                args: args.len(),
                results: results.len(),
            }));
        }

        let params = to_vals(args);
        let mut vals = vec![Val::I32(0); results.len()];
        entry
            .func
            .call(&mut *context.store, &params, &mut vals)
            .map_err(|e| self.record_error(classify_trap(e)))?;

        for (slot, val) in results.iter_mut().zip(&vals) {
            *slot = val.i32().ok_or_else(|| {
                self.record_error(EngineError::Internal(format!(
                    "'{}' returned a non-i32 value",
                    entry.name
                )))
            })? as u32;
        }
        Ok(())
    }

    fn call_indirect<'a>(
        &'a self,
        context: &mut WasmtimeContext<'a>,
        table_index: u32,
        args: &[u32],
    ) -> Result<(), EngineError> {
        self.check_context(context)?;
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| self.record_error(EngineError::NoTable))?;
        let store = &mut *context.store;

        let entry = table
            .get(&mut *store, table_index.into())
            .ok_or_else(|| self.record_error(EngineError::OutOfBounds { index: table_index }))?;
        let func = match entry {
            Ref::Func(Some(func)) => func,
            Ref::Func(None) => {
                return Err(self.record_error(EngineError::NullEntry { index: table_index }))
            }
            // `select_table` only admits funcref tables.
            _ => {
                return Err(self.record_error(EngineError::NotAFunction { index: table_index }))
            }
        };

        let expected = FuncShape::i32s(args.len(), 0);
        let found = shape_of(&func.ty(&*store));
        if found != expected {
            return Err(self.record_error(EngineError::SignatureMismatch {
                index: table_index,
                expected,
                found,
            }));
        }

        func.call(&mut *store, &to_vals(args), &mut [])
            .map_err(|e| self.record_error(classify_trap(e)))
    }

    fn last_error_description(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Create a wasmtime engine for guest modules.
fn create_engine(config: &BridgeConfig) -> Result<Engine, LoadError> {
    let mut wasm_config = Config::new();

    wasm_config.consume_fuel(config.fuel_limit.is_some());

    wasm_config.wasm_threads(false);
    wasm_config.wasm_simd(false);
    wasm_config.wasm_relaxed_simd(false);

    wasm_config.max_wasm_stack(config.max_stack_size as usize);

    Ok(Engine::new(&wasm_config)?)
}

fn lock_holder(holder: &Mutex<Option<ThreadId>>) -> MutexGuard<'_, Option<ThreadId>> {
    holder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn shape_of(ty: &FuncType) -> FuncShape {
    FuncShape {
        params: ty.params().len(),
        results: ty.results().len(),
        all_i32: ty
            .params()
            .chain(ty.results())
            .all(|t| matches!(t, ValType::I32)),
    }
}

fn to_vals(args: &[u32]) -> Vec<Val> {
    args.iter().map(|&a| Val::I32(a as i32)).collect()
}

/// Fuel exhaustion → `EngineError::FuelExhausted`; anything else → `Trap`.
fn classify_trap(err: anyhow::Error) -> EngineError {
    if matches!(err.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) {
        EngineError::FuelExhausted
    } else {
        EngineError::Trap(err.root_cause().to_string())
    }
}
