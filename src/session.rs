use wasmtime::{Engine, Linker, Module, Store, StoreLimits, StoreLimitsBuilder};

use crate::bindings::{CeError, Cloudevent, WasiCe};
use crate::config::HostConfig;
use crate::error::AbiError;
use crate::resource::{Resource, ResourceTable, ResourceView};

/// Store data for one guest instance.
pub struct SessionState {
    cloudevents: ResourceTable<Cloudevent>,
    limits: StoreLimits,
    #[cfg(feature = "wasi")]
    wasi: wasmtime_wasi::p1::WasiP1Ctx,
}

impl SessionState {
    fn new(config: &HostConfig) -> Self {
        let mut limits = StoreLimitsBuilder::new();
        if let Some(max) = config.max_memory_size {
            limits = limits.memory_size(max);
        }
        Self {
            cloudevents: ResourceTable::new(),
            limits: limits.build(),
            #[cfg(feature = "wasi")]
            wasi: {
                let mut builder = wasmtime_wasi::WasiCtxBuilder::new();
                if config.inherit_stdio {
                    builder.inherit_stdio();
                }
                builder.build_p1()
            },
        }
    }
}

impl ResourceView<Cloudevent> for SessionState {
    fn resource_table(&mut self) -> &mut ResourceTable<Cloudevent> {
        &mut self.cloudevents
    }
}

/// One guest instance with its own store, handle table and facade.
///
/// A session is confined to one thread at a time; run several sessions to
/// use several threads. [`close`](Session::close) releases every handle the
/// guest still holds.
pub struct Session {
    store: Store<SessionState>,
    wasi_ce: WasiCe,
}

impl Session {
    pub fn new(engine: &Engine, module: &Module, config: &HostConfig) -> Result<Self, AbiError> {
        let mut store = Store::new(engine, SessionState::new(config));
        store.limiter(|state| &mut state.limits);

        let mut linker: Linker<SessionState> = Linker::new(engine);
        #[cfg(feature = "wasi")]
        wasmtime_wasi::p1::add_to_linker_sync(&mut linker, |state: &mut SessionState| &mut state.wasi)?;

        let wasi_ce = WasiCe::instantiate(&mut store, &mut linker, module, config.names())?;
        tracing::debug!(namespace = %config.names().import_namespace, "session ready");
        Ok(Self { store, wasi_ce })
    }

    pub fn wasi_ce(&self) -> &WasiCe {
        &self.wasi_ce
    }

    pub fn store(&self) -> &Store<SessionState> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<SessionState> {
        &mut self.store
    }

    /// Facade and store together, for calling facade methods directly.
    pub fn parts(&mut self) -> (&WasiCe, &mut Store<SessionState>) {
        (&self.wasi_ce, &mut self.store)
    }

    pub fn create_event(&mut self) -> Result<Resource<Cloudevent>, AbiError> {
        self.wasi_ce.create(&mut self.store)
    }

    pub fn handle_event(
        &mut self,
        event: &Resource<Cloudevent>,
    ) -> Result<Result<Resource<Cloudevent>, CeError>, AbiError> {
        self.wasi_ce.ce_handler(&mut self.store, event)
    }

    /// Give a host reference back to the guest.
    pub fn release(&mut self, event: Resource<Cloudevent>) -> Result<(), AbiError> {
        event.release(&mut self.store)
    }

    /// Handles currently held by the guest.
    pub fn outstanding_handles(&mut self) -> usize {
        self.store.data_mut().cloudevents.len()
    }

    /// Release every handle still parked in the table and tear the session
    /// down. All host references must have been released already.
    pub fn close(mut self) -> Result<(), AbiError> {
        let leftover = self.store.data_mut().cloudevents.drain();
        if !leftover.is_empty() {
            tracing::warn!(count = leftover.len(), "guest still held cloudevent handles at close");
        }
        let mut result = Ok(());
        for event in leftover {
            if let Err(e) = event.release(&mut self.store) {
                result = result.and(Err(e));
            }
        }
        result
    }
}
