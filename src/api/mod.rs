//! Neuroshare API Contract
//!
//! Types, status codes and the operation trait shared by the binding layer
//! and any host adapter sitting on top of it.

mod ops;
mod result;
mod types;

pub(crate) use ops::{abi_byte_len, abi_len};
pub use ops::{NeuroshareApi, Operation, OPERATIONS};
pub use result::NsResult;
pub use types::{
    set_text_field, text_field, AnalogInfo, EntityInfo, EntityType, EventInfo, EventType,
    FileDesc, FileInfo, LibraryInfo, NeuralInfo, SegSourceInfo, SegmentInfo, TimeSearch,
    UnknownValue, LIBRARY_DEBUG, LIBRARY_MODIFIED, LIBRARY_MULTITHREADED, LIBRARY_PRERELEASE,
    LIBRARY_SPECIALBUILD, MAX_FILE_DESCS,
};
