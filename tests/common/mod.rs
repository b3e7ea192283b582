#![allow(dead_code)]

use tracing_subscriber::EnvFilter;
use wasm_canonical_host::wasmtime::{Engine, Module};
use wasm_canonical_host::{AbiError, HostConfig, Session};

pub const GUEST_WAT: &str = include_str!("../guests/cloudevent.wat");

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn engine() -> Engine {
    HostConfig::new().engine().unwrap()
}

pub fn module(engine: &Engine) -> Module {
    Module::new(engine, GUEST_WAT).unwrap()
}

/// Guest built from the reference WAT with one textual substitution.
pub fn patched_module(engine: &Engine, from: &str, to: &str) -> Module {
    assert!(GUEST_WAT.contains(from), "pattern `{from}` not in guest");
    Module::new(engine, GUEST_WAT.replacen(from, to, 1)).unwrap()
}

pub fn session() -> Session {
    init_tracing();
    let engine = engine();
    let module = module(&engine);
    Session::new(&engine, &module, &HostConfig::new()).unwrap()
}

fn counter(session: &mut Session, name: &str) -> i32 {
    let instance = *session.wasi_ce().instance();
    let store = session.store_mut();
    let f = instance.get_typed_func::<(), i32>(&mut *store, name).unwrap();
    f.call(&mut *store, ()).unwrap()
}

/// Times the guest destructor ran.
pub fn drop_count(session: &mut Session) -> i32 {
    counter(session, "drop-count")
}

/// Times the host released a guest buffer.
pub fn free_count(session: &mut Session) -> i32 {
    counter(session, "free-count")
}

/// Call one of the guest's `test::*` hooks.
pub fn call_hook(session: &mut Session, name: &str, handle: i32) -> Result<i32, AbiError> {
    let instance = *session.wasi_ce().instance();
    let store = session.store_mut();
    if name == "test::drop" {
        let f = instance.get_typed_func::<i32, ()>(&mut *store, name)?;
        f.call(&mut *store, handle)?;
        return Ok(0);
    }
    let f = instance.get_typed_func::<i32, i32>(&mut *store, name)?;
    Ok(f.call(&mut *store, handle)?)
}
