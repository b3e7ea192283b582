//! Typed facade for guests implementing the `wasi-ce` contract: a
//! `cloudevent` resource with string attributes and a byte payload, and a
//! `ce-handler` function returning `result<cloudevent, error>`.

use thiserror::Error;
use wasmtime::{AsContextMut, Instance, Linker, Module, TypedFunc};

use crate::abi::variant::{self, ErrorCode, VariantLayout};
use crate::abi::{CanonicalAbi, GuestMemoryOps, list, memory, string, typed_export};
use crate::config::AbiNames;
use crate::error::AbiError;
use crate::resource::{self, Resource, ResourceKind, ResourceView};

/// The `cloudevent` resource.
#[derive(Debug)]
pub enum Cloudevent {}

impl ResourceKind for Cloudevent {
    const NAME: &'static str = "cloudevent";
}

/// General purpose error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CeError {
    #[error("success")]
    Success,
    #[error("event rejected by guest")]
    Error,
}

impl ErrorCode for CeError {
    const NAME: &'static str = "error";

    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(CeError::Success),
            1 => Some(CeError::Error),
            _ => None,
        }
    }

    fn code(&self) -> i32 {
        match self {
            CeError::Success => 0,
            CeError::Error => 1,
        }
    }
}

/// String attributes of a cloudevent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Id,
    Source,
    Specversion,
    Type,
    Datacontenttype,
    Dataschema,
    Subject,
    Time,
}

impl Attribute {
    pub const ALL: [Attribute; 8] = [
        Attribute::Id,
        Attribute::Source,
        Attribute::Specversion,
        Attribute::Type,
        Attribute::Datacontenttype,
        Attribute::Dataschema,
        Attribute::Subject,
        Attribute::Time,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Id => "id",
            Attribute::Source => "source",
            Attribute::Specversion => "specversion",
            Attribute::Type => "type",
            Attribute::Datacontenttype => "datacontenttype",
            Attribute::Dataschema => "dataschema",
            Attribute::Subject => "subject",
            Attribute::Time => "time",
        }
    }
}

// Getters return a pointer to `(ptr, len)` with `len` one word-pair later.
const RET_PAIR_OFFSET: u32 = 8;

#[derive(Clone)]
struct Accessors {
    get: TypedFunc<i32, i32>,
    set: TypedFunc<(i32, i32, i32), ()>,
}

impl Accessors {
    fn resolve(mut store: impl AsContextMut, instance: &Instance, field: &str) -> Result<Self, AbiError> {
        Ok(Self {
            get: typed_export(&mut store, instance, &format!("cloudevent::get-{field}"))?,
            set: typed_export(&mut store, instance, &format!("cloudevent::set-{field}"))?,
        })
    }
}

/// One instantiated `wasi-ce` guest.
pub struct WasiCe {
    instance: Instance,
    abi: CanonicalAbi,
    create: TypedFunc<(), i32>,
    attributes: Vec<Accessors>,
    data: Accessors,
    ce_handler: TypedFunc<i32, i32>,
}

macro_rules! attribute_accessors {
    ($($attr:ident => $get:ident, $set:ident;)*) => {$(
        pub fn $get<T>(&self, store: impl AsContextMut<Data = T>, event: &Resource<Cloudevent>) -> Result<String, AbiError>
        where
            T: ResourceView<Cloudevent> + 'static,
        {
            self.get(store, event, Attribute::$attr)
        }

        pub fn $set<T>(&self, store: impl AsContextMut<Data = T>, event: &Resource<Cloudevent>, value: &str) -> Result<(), AbiError>
        where
            T: ResourceView<Cloudevent> + 'static,
        {
            self.set(store, event, Attribute::$attr, value)
        }
    )*};
}

impl WasiCe {
    /// Register the host side of the contract (the `cloudevent` lifecycle
    /// imports) into `linker`.
    pub fn add_to_linker<T>(linker: &mut Linker<T>, names: &AbiNames) -> Result<(), AbiError>
    where
        T: ResourceView<Cloudevent> + 'static,
    {
        resource::add_to_linker::<T, Cloudevent>(linker, &names.import_namespace)
    }

    /// Register imports, instantiate `module` and resolve every export.
    /// The linker must not already define the lifecycle imports.
    pub fn instantiate<T>(
        mut store: impl AsContextMut<Data = T>,
        linker: &mut Linker<T>,
        module: &Module,
        names: &AbiNames,
    ) -> Result<Self, AbiError>
    where
        T: ResourceView<Cloudevent> + 'static,
    {
        Self::add_to_linker(linker, names)?;
        let instance = linker.instantiate(&mut store, module)?;
        Self::new(store, instance, names)
    }

    /// Resolve the contract's exports on an existing instance. Any missing
    /// export or signature mismatch fails the whole instance.
    pub fn new<T>(mut store: impl AsContextMut<Data = T>, instance: Instance, names: &AbiNames) -> Result<Self, AbiError>
    where
        T: ResourceView<Cloudevent> + 'static,
    {
        let mut store = store.as_context_mut();
        let abi = CanonicalAbi::resolve(&mut store, &instance, names)?;
        let create = typed_export(&mut store, &instance, "cloudevent::create")?;
        let attributes = Attribute::ALL
            .iter()
            .map(|attr| Accessors::resolve(&mut store, &instance, attr.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let data = Accessors::resolve(&mut store, &instance, "data")?;
        let ce_handler = typed_export(&mut store, &instance, "ce-handler")?;

        let dtor = typed_export(&mut store, &instance, &names.drop_export(Cloudevent::NAME))?;
        store.data_mut().resource_table().bind_destructor(dtor);
        tracing::debug!("resolved wasi-ce exports");

        Ok(Self {
            instance,
            abi,
            create,
            attributes,
            data,
            ce_handler,
        })
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn abi(&self) -> &CanonicalAbi {
        &self.abi
    }

    /// Construct a new guest-side cloudevent.
    pub fn create<T>(&self, mut store: impl AsContextMut<Data = T>) -> Result<Resource<Cloudevent>, AbiError>
    where
        T: ResourceView<Cloudevent> + 'static,
    {
        let mut store = store.as_context_mut();
        let handle = self.create.call(&mut store, ())?;
        Resource::lift(&mut store, handle)
    }

    pub fn set<T>(
        &self,
        mut store: impl AsContextMut<Data = T>,
        event: &Resource<Cloudevent>,
        attr: Attribute,
        value: &str,
    ) -> Result<(), AbiError>
    where
        T: ResourceView<Cloudevent> + 'static,
    {
        let mut store = store.as_context_mut();
        let (ptr, len) = string::encode_utf8(&mut self.abi.cx(&mut store), value)?;
        let handle = event.lower(&mut store);
        self.attributes[attr as usize].set.call(&mut store, (handle, ptr, len))?;
        Ok(())
    }

    pub fn get<T>(
        &self,
        mut store: impl AsContextMut<Data = T>,
        event: &Resource<Cloudevent>,
        attr: Attribute,
    ) -> Result<String, AbiError>
    where
        T: ResourceView<Cloudevent> + 'static,
    {
        let mut store = store.as_context_mut();
        let handle = event.lower(&mut store);
        let ret = self.attributes[attr as usize].get.call(&mut store, handle)?;
        let mut cx = self.abi.cx(&mut store);
        let (ptr, len) = ret_pair(cx.data(), ret)?;
        let value = string::decode_utf8(cx.data(), ptr, len)?;
        cx.free(ptr, len, 1)?;
        Ok(value)
    }

    pub fn set_data<T>(&self, mut store: impl AsContextMut<Data = T>, event: &Resource<Cloudevent>, data: &[u8]) -> Result<(), AbiError>
    where
        T: ResourceView<Cloudevent> + 'static,
    {
        let mut store = store.as_context_mut();
        let (ptr, len) = list::lower_bytes(&mut self.abi.cx(&mut store), data)?;
        let handle = event.lower(&mut store);
        self.data.set.call(&mut store, (handle, ptr, len))?;
        Ok(())
    }

    pub fn get_data<T>(&self, mut store: impl AsContextMut<Data = T>, event: &Resource<Cloudevent>) -> Result<Vec<u8>, AbiError>
    where
        T: ResourceView<Cloudevent> + 'static,
    {
        let mut store = store.as_context_mut();
        let handle = event.lower(&mut store);
        let ret = self.data.get.call(&mut store, handle)?;
        let mut cx = self.abi.cx(&mut store);
        let (ptr, len) = ret_pair(cx.data(), ret)?;
        let data = list::lift_bytes(cx.data(), ptr, len)?;
        cx.free(ptr, len, 1)?;
        Ok(data)
    }

    attribute_accessors! {
        Id => get_id, set_id;
        Source => get_source, set_source;
        Specversion => get_specversion, set_specversion;
        Type => get_type, set_type;
        Datacontenttype => get_datacontenttype, set_datacontenttype;
        Dataschema => get_dataschema, set_dataschema;
        Subject => get_subject, set_subject;
        Time => get_time, set_time;
    }

    /// Hand `event` to the guest's handler. The outer error is a host/guest
    /// protocol failure; the inner one is the guest rejecting the event.
    pub fn ce_handler<T>(
        &self,
        mut store: impl AsContextMut<Data = T>,
        event: &Resource<Cloudevent>,
    ) -> Result<Result<Resource<Cloudevent>, CeError>, AbiError>
    where
        T: ResourceView<Cloudevent> + 'static,
    {
        let mut store = store.as_context_mut();
        let handle = event.lower(&mut store);
        let ret = self.ce_handler.call(&mut store, handle)?;
        let raw = variant::load_variant(self.abi.memory().data(&store), ret, VariantLayout::RET_AREA)?;
        raw.into_result(|payload| Resource::lift(&mut store, payload))
    }
}

fn ret_pair(mem: &[u8], ret: i32) -> Result<(i32, i32), AbiError> {
    Ok((
        memory::load::<i32>(mem, ret, 0)?,
        memory::load::<i32>(mem, ret, RET_PAIR_OFFSET)?,
    ))
}
