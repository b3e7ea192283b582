//! Lists of fixed-size elements.
//!
//! Elements are laid out back to back at `T::SIZE` stride. Byte lists take a
//! raw-copy path and lift to an opaque buffer.

use super::GuestMemoryOps;
use super::memory::{self, Primitive};
use super::string::guest_len;
use crate::error::AbiError;

/// Lower `items` into a fresh guest allocation, returning `(ptr, count)`.
pub fn lower_list<T: Primitive>(cx: &mut impl GuestMemoryOps, items: &[T]) -> Result<(i32, i32), AbiError> {
    let count = guest_len(items.len())?;
    let total = byte_len::<T>(count)?;
    let ptr = cx.realloc(0, 0, T::ALIGN as i32, total as i32)?;
    let dest = memory::slice_mut(cx.data_mut(), ptr, total)?;
    for (chunk, item) in dest.chunks_exact_mut(T::SIZE).zip(items) {
        item.write_le(chunk);
    }
    Ok((ptr, count))
}

/// Lift `count` elements starting at `ptr`.
pub fn lift_list<T: Primitive>(mem: &[u8], ptr: i32, count: i32) -> Result<Vec<T>, AbiError> {
    let total = byte_len::<T>(count)?;
    let src = memory::slice(mem, ptr, total)?;
    Ok(src.chunks_exact(T::SIZE).map(T::read_le).collect())
}

/// Lower a byte buffer with a single copy.
pub fn lower_bytes(cx: &mut impl GuestMemoryOps, bytes: &[u8]) -> Result<(i32, i32), AbiError> {
    let len = guest_len(bytes.len())?;
    let ptr = cx.realloc(0, 0, 1, len)?;
    memory::slice_mut(cx.data_mut(), ptr, bytes.len() as u64)?.copy_from_slice(bytes);
    Ok((ptr, len))
}

/// Lift `len` bytes at `ptr` as an opaque buffer.
pub fn lift_bytes(mem: &[u8], ptr: i32, len: i32) -> Result<Vec<u8>, AbiError> {
    Ok(memory::slice(mem, ptr, len as u32 as u64)?.to_vec())
}

// Both sides agree on a 32-bit length, so the byte size must fit as well.
fn byte_len<T: Primitive>(count: i32) -> Result<u64, AbiError> {
    let total = count as u32 as u64 * T::SIZE as u64;
    if total > i32::MAX as u64 {
        return Err(AbiError::LengthOverflow(total));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::testing::BumpArena;
    use proptest::prelude::*;

    #[test]
    fn lower_respects_element_alignment() {
        let mut arena = BumpArena::new(128);
        arena.next = 17;
        let (ptr, count) = lower_list(&mut arena, &[1u64, 2, 3]).unwrap();
        assert_eq!(ptr % 8, 0);
        assert_eq!(count, 3);
        assert_eq!(arena.next, ptr as usize + 24);
        assert_eq!(lift_list::<u64>(&arena.mem, ptr, count).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn signed_and_float_elements_lift_back() {
        let mut arena = BumpArena::new(128);
        let (ptr, count) = lower_list(&mut arena, &[-1i16, 300, i16::MIN]).unwrap();
        assert_eq!(lift_list::<i16>(&arena.mem, ptr, count).unwrap(), vec![-1, 300, i16::MIN]);

        let (ptr, count) = lower_list(&mut arena, &[0.5f32, -2.0]).unwrap();
        assert_eq!(lift_list::<f32>(&arena.mem, ptr, count).unwrap(), vec![0.5, -2.0]);
    }

    #[test]
    fn lift_checks_whole_extent() {
        let mem = vec![0u8; 16];
        assert!(lift_list::<u32>(&mem, 0, 4).is_ok());
        assert!(matches!(lift_list::<u32>(&mem, 4, 4), Err(AbiError::OutOfBounds { len: 16, .. })));
        assert!(matches!(lift_list::<u64>(&mem, 0, i32::MAX), Err(AbiError::LengthOverflow(_))));
    }

    #[test]
    fn bytes_take_the_raw_copy_path() {
        let mut arena = BumpArena::new(64);
        let (ptr, len) = lower_bytes(&mut arena, b"\x01\x02").unwrap();
        assert_eq!(len, 2);
        assert_eq!(lift_bytes(&arena.mem, ptr, len).unwrap(), b"\x01\x02".to_vec());
        assert_eq!(lift_list::<u8>(&arena.mem, ptr, len).unwrap(), vec![1u8, 2]);
    }

    #[test]
    fn lower_rejects_allocation_outside_memory() {
        let mut arena = BumpArena::new(16);
        arena.forced_ptr = Some(12);
        assert!(matches!(lower_list(&mut arena, &[1u32, 2]), Err(AbiError::OutOfBounds { .. })));
        assert!(matches!(lower_bytes(&mut arena, &[0; 5]), Err(AbiError::OutOfBounds { .. })));
    }

    proptest! {
        #[test]
        fn any_byte_buffer_round_trips(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut arena = BumpArena::new(512);
            let (ptr, len) = lower_bytes(&mut arena, &bytes).unwrap();
            prop_assert_eq!(lift_bytes(&arena.mem, ptr, len).unwrap(), bytes);
        }
    }
}
