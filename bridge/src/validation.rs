//! Module checks run before instantiation.
//!
//! 1. Imports: functions from the `host` module only, and only the ones the
//!    linker provides. No WASI.
//! 2. Function table: pick the table indirect calls go through.
//!
//! A missing resolver export is deliberately not a load error; it surfaces
//! as `ExportNotFound` when a callback is invoked.

use wasmtime::{ExternType, HeapType, Module, TableType};

use crate::config::HOST_IMPORT_MODULE;
use crate::error::LoadError;
use crate::linker::HOST_FUNCTIONS;

/// Check that every import can be satisfied by the host linker.
pub fn validate_module(module: &Module) -> Result<(), LoadError> {
    for import in module.imports() {
        let module_name = import.module();

        if module_name.starts_with("wasi") {
            return Err(LoadError::Validation(format!(
                "WASI import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if module_name != HOST_IMPORT_MODULE {
            return Err(LoadError::Validation(format!(
                "import from unknown module '{}' (only '{}' allowed): {}",
                module_name,
                HOST_IMPORT_MODULE,
                import.name()
            )));
        }

        if !matches!(import.ty(), ExternType::Func(_)) {
            return Err(LoadError::Validation(format!(
                "non-function import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if !HOST_FUNCTIONS.contains(&import.name()) {
            return Err(LoadError::Validation(format!(
                "unknown host function: {}::{}",
                module_name,
                import.name()
            )));
        }
    }

    Ok(())
}

fn is_funcref_table(ty: &TableType) -> bool {
    matches!(
        ty.element().heap_type(),
        HeapType::Func | HeapType::ConcreteFunc(_) | HeapType::NoFunc
    )
}

/// Name of the exported funcref table to use for indirect calls.
///
/// With `requested` set, that export must exist and be a funcref table.
/// Otherwise the first exported funcref table wins; `None` if there is none.
pub fn select_table(module: &Module, requested: Option<&str>) -> Result<Option<String>, LoadError> {
    if let Some(name) = requested {
        let export = module.exports().find(|e| e.name() == name).ok_or_else(|| {
            LoadError::Validation(format!("table export '{}' not found", name))
        })?;
        return match export.ty() {
            ExternType::Table(ty) if is_funcref_table(&ty) => Ok(Some(name.to_string())),
            _ => Err(LoadError::Validation(format!(
                "export '{}' is not a funcref table",
                name
            ))),
        };
    }

    Ok(module.exports().find_map(|e| match e.ty() {
        ExternType::Table(ty) if is_funcref_table(&ty) => Some(e.name().to_string()),
        _ => None,
    }))
}
