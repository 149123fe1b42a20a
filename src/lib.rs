//! Neuroshare Glue - Runtime binding for Neuroshare data-access libraries
//!
//! Neuroshare libraries each read one vendor's neurophysiology file format
//! and all export the same 17 entry points. This crate loads such libraries
//! at runtime, binds every entry point up front, and forwards calls to them
//! through small numeric handles.
//!
//! # Features
//!
//! - **All-or-nothing binding**: a library missing any entry point is closed and rejected
//! - **Shared loads**: loading the same name twice reuses one native module
//! - **Handle validation**: calls on a bad handle return `LIBERROR` and never reach native code
//! - **Platform search**: executable-directory lookup where the loader lacks it
//! - **Owned leases**: optional handles that close themselves on drop
//!
//! # Example
//!
//! ```no_run
//! use neuroshare_glue::{LibraryInfo, NsResult, Registry};
//!
//! let registry = Registry::new();
//! let handle = registry.load_library("nsNEVLibrary").unwrap();
//!
//! let mut info = LibraryInfo::default();
//! if registry.get_library_info(handle, &mut info) == NsResult::OK {
//!     println!("{} by {}", info.description(), info.creator());
//! }
//!
//! registry.close_library(handle).unwrap();
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Host adapter   │  MATLAB/Python bindings, ns-glue CLI
//! └────────┬────────┘
//!          │  handle + arguments
//!          ▼
//! ┌─────────────────┐
//! │    Registry     │  32 slots, refcounted, mutex-guarded
//! └────────┬────────┘
//!          │  Arc<NativeModule>
//!          ▼
//! ┌─────────────────┐
//! │  FunctionTable  │  17 extern "system" pointers
//! └────────┬────────┘
//!          ▼
//!   vendor library (.dll / .so / .dylib)
//! ```

pub mod api;
pub mod config;
pub mod ffi;
pub mod session;

pub use api::{
    AnalogInfo, EntityInfo, EntityType, EventInfo, EventType, FileDesc, FileInfo, LibraryInfo,
    NeuralInfo, NeuroshareApi, NsResult, Operation, SegSourceInfo, SegmentInfo, TimeSearch,
    OPERATIONS,
};
pub use config::{ConfigError, GlueConfig};
pub use ffi::{
    ApiVersion, BoundLibrary, DllHandle, GlueError, Registry, RegistryBuilder, SearchStrategy,
    SlotInfo, VersionPolicy,
};
pub use session::{LibraryLease, Session};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
