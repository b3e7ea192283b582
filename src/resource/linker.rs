use wasmtime::{Caller, Linker};

use super::{Resource, ResourceKind, ResourceView};
use crate::error::{AbiError, into_wasmtime_error};

fn table<'a, T, R>(caller: &'a mut Caller<'_, T>) -> &'a mut super::ResourceTable<R>
where
    T: ResourceView<R> + 'static,
    R: ResourceKind,
{
    <T as ResourceView<R>>::resource_table(caller.data_mut())
}

/// Register the four lifecycle imports for resource kind `R` under
/// `namespace`: `resource_{new,clone,get,drop}_<R::NAME>`.
///
/// Handles are indices into the store's [`ResourceTable`](super::ResourceTable);
/// every failure traps the calling guest.
pub fn add_to_linker<T, R>(linker: &mut Linker<T>, namespace: &str) -> Result<(), AbiError>
where
    T: ResourceView<R> + 'static,
    R: ResourceKind,
{
    linker.func_wrap(
        namespace,
        &format!("resource_new_{}", R::NAME),
        |mut caller: Caller<'_, T>, rep: i32| -> wasmtime::Result<i32> {
            let table = table::<T, R>(&mut caller);
            let dtor = table.destructor()?;
            let handle = table.insert(Resource::new(rep, dtor));
            tracing::trace!(resource = R::NAME, rep, handle, "resource-new");
            Ok(handle as i32)
        },
    )?;

    linker.func_wrap(
        namespace,
        &format!("resource_clone_{}", R::NAME),
        |mut caller: Caller<'_, T>, handle: i32| -> wasmtime::Result<i32> {
            let table = table::<T, R>(&mut caller);
            let clone = table.get(handle as u32)?.clone();
            let new_handle = table.insert(clone);
            tracing::trace!(resource = R::NAME, handle, new_handle, "resource-clone");
            Ok(new_handle as i32)
        },
    )?;

    linker.func_wrap(
        namespace,
        &format!("resource_get_{}", R::NAME),
        |mut caller: Caller<'_, T>, handle: i32| -> wasmtime::Result<i32> {
            let rep = table::<T, R>(&mut caller).get(handle as u32)?.rep();
            tracing::trace!(resource = R::NAME, handle, rep, "resource-get");
            Ok(rep)
        },
    )?;

    linker.func_wrap(
        namespace,
        &format!("resource_drop_{}", R::NAME),
        |mut caller: Caller<'_, T>, handle: i32| -> wasmtime::Result<()> {
            let owned = table::<T, R>(&mut caller).remove(handle as u32)?;
            tracing::trace!(resource = R::NAME, handle, rep = owned.rep(), "resource-drop");
            owned.release(&mut caller).map_err(into_wasmtime_error)
        },
    )?;

    Ok(())
}
