//! Bounds-checked reads from guest linear memory.
//!
//! Host imports receive `(ptr, len)` pairs from the guest. Every range is
//! validated against the current memory size before it is touched.

/// Validate that `[ptr, ptr+len)` lies within a memory of `mem_size` bytes.
pub fn validate_range(mem_size: usize, ptr: i32, len: i32) -> Option<std::ops::Range<usize>> {
    if ptr < 0 || len < 0 {
        return None;
    }
    let start = ptr as usize;
    let end = start.checked_add(len as usize)?;
    if end > mem_size {
        return None;
    }
    Some(start..end)
}

/// Read a UTF-8 string out of guest memory. `None` on a bad range or
/// invalid UTF-8.
pub fn read_utf8(mem: &[u8], ptr: i32, len: i32) -> Option<String> {
    let range = validate_range(mem.len(), ptr, len)?;
    std::str::from_utf8(&mem[range]).ok().map(str::to_string)
}
