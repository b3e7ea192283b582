pub mod list;
pub mod memory;
pub mod string;
pub mod variant;

use wasmtime::{AsContextMut, Instance, Memory, TypedFunc, WasmParams, WasmResults};

use crate::config::AbiNames;
use crate::error::AbiError;

/// Guest-side operations the codecs need to lower and lift values.
///
/// Implemented over a live wasmtime store by [`GuestCx`]; the codecs only
/// see this trait so they stay independent of the store type `T`.
pub trait GuestMemoryOps {
    /// Current contents of linear memory. Re-borrow after every guest call.
    fn data(&self) -> &[u8];

    fn data_mut(&mut self) -> &mut [u8];

    /// Guest allocator: `(old_ptr, old_len, align, new_len) -> new_ptr`.
    fn realloc(&mut self, old_ptr: i32, old_len: i32, align: i32, new_len: i32) -> Result<i32, AbiError>;

    /// Guest deallocator: `(ptr, len, align)`.
    fn free(&mut self, ptr: i32, len: i32, align: i32) -> Result<(), AbiError>;
}

/// The canonical-ABI surface every guest exports, resolved once at
/// instantiation.
#[derive(Clone)]
pub struct CanonicalAbi {
    memory: Memory,
    realloc: TypedFunc<(i32, i32, i32, i32), i32>,
    free: TypedFunc<(i32, i32, i32), ()>,
}

impl CanonicalAbi {
    pub fn resolve(
        mut store: impl AsContextMut,
        instance: &Instance,
        names: &AbiNames,
    ) -> Result<Self, AbiError> {
        let memory = instance
            .get_memory(&mut store, &names.memory)
            .ok_or_else(|| AbiError::MissingExport(names.memory.clone()))?;
        let realloc = typed_export(&mut store, instance, &names.realloc)?;
        let free = typed_export(&mut store, instance, &names.free)?;
        Ok(Self {
            memory,
            realloc,
            free,
        })
    }

    pub fn memory(&self) -> Memory {
        self.memory
    }

    /// Bind this ABI table to a store for one lowering/lifting sequence.
    pub fn cx<S: AsContextMut>(&self, store: S) -> GuestCx<'_, S> {
        GuestCx { abi: self, store }
    }
}

/// [`GuestMemoryOps`] over a wasmtime store.
pub struct GuestCx<'a, S> {
    abi: &'a CanonicalAbi,
    store: S,
}

impl<S> GuestMemoryOps for GuestCx<'_, S>
where
    S: AsContextMut,
    S::Data: 'static,
{
    fn data(&self) -> &[u8] {
        self.abi.memory.data(self.store.as_context())
    }

    fn data_mut(&mut self) -> &mut [u8] {
        self.abi.memory.data_mut(self.store.as_context_mut())
    }

    fn realloc(&mut self, old_ptr: i32, old_len: i32, align: i32, new_len: i32) -> Result<i32, AbiError> {
        Ok(self
            .abi
            .realloc
            .call(&mut self.store, (old_ptr, old_len, align, new_len))?)
    }

    fn free(&mut self, ptr: i32, len: i32, align: i32) -> Result<(), AbiError> {
        Ok(self.abi.free.call(&mut self.store, (ptr, len, align))?)
    }
}

/// Resolve a function export by name and check its signature.
pub fn typed_export<P, R>(
    mut store: impl AsContextMut,
    instance: &Instance,
    name: &str,
) -> Result<TypedFunc<P, R>, AbiError>
where
    P: WasmParams,
    R: WasmResults,
{
    let func = instance
        .get_func(&mut store, name)
        .ok_or_else(|| AbiError::MissingExport(name.to_string()))?;
    func.typed::<P, R>(&store)
        .map_err(|e| AbiError::SignatureMismatch {
            name: name.to_string(),
            reason: format!("{e:#}"),
        })
}
