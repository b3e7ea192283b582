//! UTF-8 strings across the memory boundary.

use super::GuestMemoryOps;
use super::memory;
use crate::error::AbiError;

/// Lift `len` bytes at `ptr` as an owned UTF-8 string.
pub fn decode_utf8(mem: &[u8], ptr: i32, len: i32) -> Result<String, AbiError> {
    let bytes = memory::slice(mem, ptr, len as u32 as u64)?;
    Ok(std::str::from_utf8(bytes)?.to_owned())
}

/// Lower `value` into a fresh guest allocation, returning `(ptr, len)`.
pub fn encode_utf8(cx: &mut impl GuestMemoryOps, value: &str) -> Result<(i32, i32), AbiError> {
    let bytes = value.as_bytes();
    let len = guest_len(bytes.len())?;
    let ptr = cx.realloc(0, 0, 1, len)?;
    memory::slice_mut(cx.data_mut(), ptr, bytes.len() as u64)?.copy_from_slice(bytes);
    Ok((ptr, len))
}

/// Host length as a guest `i32` length.
pub(crate) fn guest_len(len: usize) -> Result<i32, AbiError> {
    i32::try_from(len).map_err(|_| AbiError::LengthOverflow(len as u64))
}
