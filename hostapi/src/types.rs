//! Opaque handle types shared between the bridge and engine backends.
//!
//! Nothing here is a raw address. Handles carry the [`InstanceId`] of the
//! instance that produced them, and backends refuse handles they did not
//! issue.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a module instance.
///
/// Only obtainable through [`InstanceId::fresh`], so two live instances never
/// share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate a new, never-before-seen id.
    pub fn fresh() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// Signature shape of a guest function, reduced to what the bridge checks.
///
/// The bridge only ever passes and receives 32-bit integers, so a shape is
/// the param and result counts plus whether every value type is `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncShape {
    pub params: usize,
    pub results: usize,
    pub all_i32: bool,
}

impl FuncShape {
    /// An all-`i32` shape.
    pub const fn i32s(params: usize, results: usize) -> Self {
        Self {
            params,
            results,
            all_i32: true,
        }
    }

    /// `() -> i32`, the shape of a table-index resolver export.
    pub const RESOLVER: FuncShape = FuncShape::i32s(0, 1);

    /// `(i32) -> ()`, the shape of an indirect callback entry.
    pub const CALLBACK: FuncShape = FuncShape::i32s(1, 0);
}

impl fmt::Display for FuncShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = if self.all_i32 { "i32" } else { "mixed" };
        write!(f, "({} x {}) -> ({} x {})", self.params, ty, self.results, ty)
    }
}

/// A resolved reference to a guest-exported function.
///
/// Immutable once issued. Fields are private so a handle can only come from
/// a backend's `lookup_export`; the owning instance's id travels with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportHandle {
    owner: InstanceId,
    slot: u32,
    name: Arc<str>,
    shape: FuncShape,
}

impl ExportHandle {
    /// Issue a handle. Intended for engine backends only.
    pub fn issue(owner: InstanceId, slot: u32, name: &str, shape: FuncShape) -> Self {
        Self {
            owner,
            slot,
            name: Arc::from(name),
            shape,
        }
    }

    pub fn owner(&self) -> InstanceId {
        self.owner
    }

    /// Backend-private slot number of the export.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> FuncShape {
        self.shape
    }

    /// Whether this handle was issued by the instance with id `id`.
    pub fn is_owned_by(&self, id: InstanceId) -> bool {
        self.owner == id
    }
}
