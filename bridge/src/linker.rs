//! Host function registration via the wasmtime linker.
//!
//! The guest may import two functions from the `host` module:
//!
//! - `log(level, ptr, len) -> i32`: UTF-8 message from linear memory
//! - `trace(value)`: record a 32-bit value
//!
//! `log` returns a [`HostStatus`] code; it never traps the guest.

use wasmtime::{Caller, Linker, Memory};

use crate::config::HOST_IMPORT_MODULE;
use crate::error::LoadError;
use crate::host_impl::GuestState;
use crate::memory;

/// Function names provided under [`HOST_IMPORT_MODULE`].
pub const HOST_FUNCTIONS: &[&str] = &["log", "trace"];

/// Status codes returned to the guest by host imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum HostStatus {
    Ok = 0,
    BadPointer = 1,
    InvalidEncoding = 2,
    NoMemory = 3,
}

fn get_memory(caller: &mut Caller<'_, GuestState>) -> Option<Memory> {
    caller.get_export("memory").and_then(|e| e.into_memory())
}

/// Register every `host` function with the linker.
pub fn register_host_functions(linker: &mut Linker<GuestState>) -> Result<(), LoadError> {
    register_log(linker)?;
    register_trace(linker)?;
    Ok(())
}

fn register_log(linker: &mut Linker<GuestState>) -> Result<(), LoadError> {
    linker.func_wrap(
        HOST_IMPORT_MODULE,
        "log",
        |mut caller: Caller<'_, GuestState>, level: i32, msg_ptr: i32, msg_len: i32| -> i32 {
            let mem = match get_memory(&mut caller) {
                Some(m) => m,
                None => return HostStatus::NoMemory as i32,
            };

            let message = {
                let data = mem.data(&caller);
                if memory::validate_range(data.len(), msg_ptr, msg_len).is_none() {
                    return HostStatus::BadPointer as i32;
                }
                match memory::read_utf8(data, msg_ptr, msg_len) {
                    Some(s) => s,
                    None => return HostStatus::InvalidEncoding as i32,
                }
            };

            caller.data().add_log(level.max(0) as u32, message);
            HostStatus::Ok as i32
        },
    )?;
    Ok(())
}

fn register_trace(linker: &mut Linker<GuestState>) -> Result<(), LoadError> {
    linker.func_wrap(
        HOST_IMPORT_MODULE,
        "trace",
        |caller: Caller<'_, GuestState>, value: i32| {
            caller.data().add_trace(value as u32);
        },
    )?;
    Ok(())
}
