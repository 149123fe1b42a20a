//! Dynamic Binding for Neuroshare Libraries
//!
//! Loads native Neuroshare implementations at runtime and dispatches calls
//! to them through small numeric handles.
//!
//! # Architecture
//!
//! ```text
//! Host adapter
//!       │
//!       ▼
//! registry.get_file_info(handle, ...)
//!       │
//!       ▼
//! Registry (validates handle, holds Arc<NativeModule>)
//!       │
//!       ▼
//! FunctionTable (17 typed extern "system" pointers)
//!       │
//!       ▼
//! Native library (libloading)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let registry = Registry::new();
//! let handle = registry.load_library("nsNEVLibrary")?;
//!
//! let mut info = LibraryInfo::default();
//! registry.get_library_info(handle, &mut info).into_result()?;
//!
//! registry.close_library(handle)?;
//! ```

mod facade;
mod loader;
mod platform;
mod registry;
mod version;

pub use facade::BoundLibrary;
pub use loader::{BindError, DlopenLoader, FunctionTable, ModuleLoader, NativeModule, SymbolSource};
pub use platform::{
    normalize_name, ExecutableDirSearch, HostFs, LoaderSearch, ResolveModulePath, SearchStrategy,
    SystemFs, NATIVE_SUFFIX,
};
pub use registry::{
    DllHandle, GlueError, Registry, RegistryBuilder, SlotInfo, DEFAULT_CAPACITY, MAX_CAPACITY,
};
pub use version::{ApiVersion, VersionPolicy};

#[cfg(test)]
pub(crate) mod tests;
