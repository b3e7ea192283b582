use wasmtime::{Config, Engine, WasmBacktraceDetails};

use crate::error::AbiError;

/// Names of the canonical-ABI imports and exports a guest is built against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiNames {
    /// Import namespace holding the resource lifecycle functions.
    pub import_namespace: String,
    pub memory: String,
    pub realloc: String,
    pub free: String,
    /// Prefix of the per-resource drop export, followed by the resource name.
    pub drop_prefix: String,
}

impl Default for AbiNames {
    fn default() -> Self {
        Self {
            import_namespace: "canonical_abi".to_string(),
            memory: "memory".to_string(),
            realloc: "canonical_abi_realloc".to_string(),
            free: "canonical_abi_free".to_string(),
            drop_prefix: "canonical_abi_drop_".to_string(),
        }
    }
}

impl AbiNames {
    pub fn drop_export(&self, resource: &str) -> String {
        format!("{}{}", self.drop_prefix, resource)
    }
}

/// Host-side settings for engines and sessions.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    pub(crate) names: AbiNames,
    pub(crate) max_memory_size: Option<usize>,
    pub(crate) backtrace_details: bool,
    #[cfg(feature = "wasi")]
    pub(crate) inherit_stdio: bool,
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import namespace the guest's lifecycle imports live in.
    pub fn with_import_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.names.import_namespace = namespace.into();
        self
    }

    /// Set all ABI names at once.
    pub fn with_names(mut self, names: AbiNames) -> Self {
        self.names = names;
        self
    }

    /// Cap linear memory growth, in bytes.
    pub fn with_max_memory_size(mut self, bytes: usize) -> Self {
        self.max_memory_size = Some(bytes);
        self
    }

    pub fn with_backtrace_details(mut self, enable: bool) -> Self {
        self.backtrace_details = enable;
        self
    }

    /// Let the guest write to the host's stdout/stderr.
    #[cfg(feature = "wasi")]
    pub fn with_inherit_stdio(mut self, inherit: bool) -> Self {
        self.inherit_stdio = inherit;
        self
    }

    pub fn names(&self) -> &AbiNames {
        &self.names
    }

    /// Build an engine for running guests under this configuration.
    pub fn engine(&self) -> Result<Engine, AbiError> {
        let mut config = Config::new();
        config.wasm_backtrace_details(if self.backtrace_details {
            WasmBacktraceDetails::Enable
        } else {
            WasmBacktraceDetails::Disable
        });
        Ok(Engine::new(&config)?)
    }
}
