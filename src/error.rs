use thiserror::Error;

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("out-of-bounds guest memory access: {len} bytes at {addr:#x}, memory is {memory_len} bytes")]
    OutOfBounds { addr: u32, len: u64, memory_len: usize },

    #[error("length {0} does not fit the 32-bit guest address space")]
    LengthOverflow(u64),

    #[error("invalid utf-8 in guest string: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid handle {0}")]
    InvalidHandle(u32),

    #[error("invalid discriminant {discriminant} for `{ty}`")]
    InvalidDiscriminant { ty: &'static str, discriminant: i32 },

    #[error("guest does not export '{0}'")]
    MissingExport(String),

    #[error("guest export '{name}' has an unexpected signature: {reason}")]
    SignatureMismatch { name: String, reason: String },

    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),

    #[error(transparent)]
    Runtime(wasmtime::Error),
}

/// Programming-contract violations between host and guest. These are bugs,
/// not conditions a caller is expected to recover from.
#[derive(Debug, Error)]
pub enum ContractViolation {
    #[error("`{resource}` resource {rep} dropped after it was destroyed")]
    DoubleDrop { resource: &'static str, rep: i32 },
}

// A host import that failed inside a guest call comes back as a trap; recover
// the original error so callers can match on it.
impl From<wasmtime::Error> for AbiError {
    fn from(e: wasmtime::Error) -> Self {
        match e.downcast::<AbiError>() {
            Ok(e) => e,
            Err(e) => AbiError::Runtime(e),
        }
    }
}

pub(crate) fn into_wasmtime_error(e: AbiError) -> wasmtime::Error {
    match e {
        AbiError::Runtime(e) => e,
        e => e.into(),
    }
}
