//! Guest resources tracked by the host.
//!
//! A [`Resource`] is one owning reference to a guest-side resource. Every
//! reference must be given back through [`Resource::release`]; the reference
//! that brings the shared count to zero runs the guest's drop entry point.
//! Handles handed to the guest are themselves owning references parked in
//! the instance's [`ResourceTable`], so the count always equals the number of
//! host references plus guest handles that can still trigger a drop.

mod linker;
pub mod slab;

pub use linker::add_to_linker;

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use wasmtime::{AsContextMut, TypedFunc};

use crate::error::{AbiError, ContractViolation};
use slab::Slab;

/// A resource type declared by the guest contract.
pub trait ResourceKind: Send + Sync + 'static {
    /// Name used in the import/export names, e.g. `resource_new_<NAME>`.
    const NAME: &'static str;
}

/// Store data (`T` in `Store<T>`) that holds the handle table for `R`.
///
/// Follows the same pattern as `wasmtime_wasi::WasiView`.
pub trait ResourceView<R: ResourceKind> {
    fn resource_table(&mut self) -> &mut ResourceTable<R>;
}

/// Guest drop entry point, `(rep) -> ()`.
pub type Destructor = TypedFunc<i32, ()>;

struct Shared {
    rep: i32,
    refs: AtomicUsize,
    destroyed: AtomicBool,
    dtor: Destructor,
}

impl Shared {
    // Returns true when this call destroyed the guest resource.
    fn release(&self, resource: &'static str, store: impl AsContextMut) -> Result<bool, AbiError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(ContractViolation::DoubleDrop {
                resource,
                rep: self.rep,
            }
            .into());
        }
        if self.refs.fetch_sub(1, Ordering::AcqRel) != 1 {
            return Ok(false);
        }
        self.destroyed.store(true, Ordering::Release);
        tracing::trace!(resource, rep = self.rep, "dropping guest resource");
        self.dtor.call(store, self.rep)?;
        Ok(true)
    }
}

/// One owning reference to a guest resource of kind `R`.
///
/// Cloning adds a reference to the same guest resource. Dropping without
/// [`release`](Resource::release) leaks the guest resource and is reported.
pub struct Resource<R: ResourceKind> {
    shared: Arc<Shared>,
    released: bool,
    _kind: PhantomData<fn() -> R>,
}

impl<R: ResourceKind> Resource<R> {
    /// Wrap a guest-assigned representation with a count of one.
    pub fn new(rep: i32, dtor: Destructor) -> Self {
        Self {
            shared: Arc::new(Shared {
                rep,
                refs: AtomicUsize::new(1),
                destroyed: AtomicBool::new(false),
                dtor,
            }),
            released: false,
            _kind: PhantomData,
        }
    }

    /// The guest-assigned representation.
    pub fn rep(&self) -> i32 {
        self.shared.rep
    }

    /// References currently sharing this guest resource.
    pub fn ref_count(&self) -> usize {
        self.shared.refs.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::Acquire)
    }

    /// Give this reference back. The last one runs the guest drop entry point.
    ///
    /// Consuming `self` makes releasing the same reference twice a compile
    /// error, so a host-side double drop cannot be expressed:
    ///
    /// ```compile_fail
    /// # use wasm_canonical_host::{Cloudevent, Resource, Session};
    /// # fn twice(session: &mut Session, event: Resource<Cloudevent>) {
    /// event.release(session.store_mut()).unwrap();
    /// event.release(session.store_mut()).unwrap();
    /// # }
    /// ```
    ///
    /// A guest dropping a handle it no longer holds fails with
    /// [`AbiError::InvalidHandle`] instead.
    pub fn release(mut self, store: impl AsContextMut) -> Result<(), AbiError> {
        self.released = true;
        self.shared.release(R::NAME, store).map(|_| ())
    }

    /// Park a new reference in the instance table and return the handle the
    /// guest sees. The guest owns that handle and drops it on its own.
    pub fn lower<T>(&self, mut store: impl AsContextMut<Data = T>) -> i32
    where
        T: ResourceView<R> + 'static,
    {
        let mut store = store.as_context_mut();
        store.data_mut().resource_table().insert(self.clone()) as i32
    }

    /// Take ownership of a handle returned by the guest.
    pub fn lift<T>(mut store: impl AsContextMut<Data = T>, handle: i32) -> Result<Self, AbiError>
    where
        T: ResourceView<R> + 'static,
    {
        let mut store = store.as_context_mut();
        store.data_mut().resource_table().remove(handle as u32)
    }
}

impl<R: ResourceKind> Clone for Resource<R> {
    fn clone(&self) -> Self {
        self.shared.refs.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: self.shared.clone(),
            released: false,
            _kind: PhantomData,
        }
    }
}

impl<R: ResourceKind> Drop for Resource<R> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        tracing::error!(
            resource = R::NAME,
            rep = self.shared.rep,
            "resource reference dropped without release, guest resource leaked"
        );
        if cfg!(debug_assertions) && !std::thread::panicking() {
            panic!("`{}` resource {} leaked", R::NAME, self.shared.rep);
        }
    }
}

impl<R: ResourceKind> std::fmt::Debug for Resource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &R::NAME)
            .field("rep", &self.shared.rep)
            .field("refs", &self.ref_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Per-instance handle table for resources of kind `R`.
pub struct ResourceTable<R: ResourceKind> {
    slab: Slab<Resource<R>>,
    dtor: Option<Destructor>,
}

impl<R: ResourceKind> Default for ResourceTable<R> {
    fn default() -> Self {
        Self {
            slab: Slab::new(),
            dtor: None,
        }
    }
}

impl<R: ResourceKind> ResourceTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the guest drop entry point once exports are resolved.
    pub fn bind_destructor(&mut self, dtor: Destructor) {
        self.dtor = Some(dtor);
    }

    pub fn destructor(&self) -> Result<Destructor, AbiError> {
        self.dtor
            .clone()
            .ok_or_else(|| AbiError::MissingExport(format!("drop entry point for `{}`", R::NAME)))
    }

    pub fn insert(&mut self, resource: Resource<R>) -> u32 {
        self.slab.insert(resource)
    }

    pub fn get(&self, handle: u32) -> Result<&Resource<R>, AbiError> {
        self.slab.get(handle)
    }

    pub fn remove(&mut self, handle: u32) -> Result<Resource<R>, AbiError> {
        self.slab.remove(handle)
    }

    /// Handles currently held by the guest or in flight.
    pub fn len(&self) -> usize {
        self.slab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }

    /// Take every outstanding reference, e.g. to release them before the
    /// instance is torn down.
    pub fn drain(&mut self) -> Vec<Resource<R>> {
        self.slab.drain()
    }
}
