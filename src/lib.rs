pub mod abi;
pub mod bindings;
pub mod config;
pub mod error;
pub mod resource;
pub mod session;

pub use abi::{CanonicalAbi, GuestCx, GuestMemoryOps};
pub use bindings::{Attribute, CeError, Cloudevent, WasiCe};
pub use config::{AbiNames, HostConfig};
pub use error::{AbiError, ContractViolation};
pub use resource::{Resource, ResourceKind, ResourceTable, ResourceView};
pub use session::{Session, SessionState};

pub use wasmtime;
