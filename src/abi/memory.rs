//! Bounds-checked access to guest linear memory.
//!
//! Every guest address is computed here: a base pointer received from the
//! guest plus a static offset, wrapped into the 32-bit address space. All
//! reads and writes are checked against the memory's current length; nothing
//! grows memory implicitly. Functions take the memory as a plain byte slice,
//! borrowed from the store for the duration of one access only.

use std::ops::Range;

use crate::error::AbiError;

/// A fixed-size little-endian scalar that can live in guest memory.
pub trait Primitive: Copy {
    const SIZE: usize;
    const ALIGN: usize;

    /// Decode from exactly `SIZE` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Encode into exactly `SIZE` bytes.
    fn write_le(self, bytes: &mut [u8]);
}

macro_rules! primitive {
    ($($ty:ty),* $(,)?) => {$(
        impl Primitive for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();
            const ALIGN: usize = std::mem::align_of::<$ty>();

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_le_bytes(buf)
            }

            #[inline]
            fn write_le(self, bytes: &mut [u8]) {
                bytes.copy_from_slice(&self.to_le_bytes());
            }
        }
    )*};
}

primitive!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Normalize `base + offset` into the 32-bit guest address space.
#[inline]
pub fn guest_addr(base: i32, offset: u32) -> u32 {
    (base as u32).wrapping_add(offset)
}

/// Host index range for `len` bytes starting at guest address `addr`.
pub fn checked_range(memory_len: usize, addr: u32, len: u64) -> Result<Range<usize>, AbiError> {
    let end = addr as u64 + len;
    if end > memory_len as u64 {
        return Err(AbiError::OutOfBounds {
            addr,
            len,
            memory_len,
        });
    }
    Ok(addr as usize..end as usize)
}

/// Read a `T` at `(base + offset) mod 2^32`.
pub fn load<T: Primitive>(mem: &[u8], base: i32, offset: u32) -> Result<T, AbiError> {
    let range = checked_range(mem.len(), guest_addr(base, offset), T::SIZE as u64)?;
    Ok(T::read_le(&mem[range]))
}

/// Write a `T` at `(base + offset) mod 2^32`.
pub fn store<T: Primitive>(mem: &mut [u8], base: i32, offset: u32, value: T) -> Result<(), AbiError> {
    let range = checked_range(mem.len(), guest_addr(base, offset), T::SIZE as u64)?;
    value.write_le(&mut mem[range]);
    Ok(())
}

/// Borrow `len` bytes at guest pointer `ptr`.
pub fn slice(mem: &[u8], ptr: i32, len: u64) -> Result<&[u8], AbiError> {
    let range = checked_range(mem.len(), guest_addr(ptr, 0), len)?;
    Ok(&mem[range])
}

/// Mutably borrow `len` bytes at guest pointer `ptr`.
pub fn slice_mut(mem: &mut [u8], ptr: i32, len: u64) -> Result<&mut [u8], AbiError> {
    let range = checked_range(mem.len(), guest_addr(ptr, 0), len)?;
    Ok(&mut mem[range])
}
