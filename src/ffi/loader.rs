//! Dynamic Library Binding
//!
//! Opens a native Neuroshare library and binds the whole Operation Table
//! into typed function pointers. Binding is all-or-nothing: either every
//! entry point resolves and a [`NativeModule`] is produced, or the module
//! is dropped (closing it) and the first missing symbol is reported.

use std::ffi::{c_void, CStr, CString};
use std::fmt;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::{Library, Symbol};

use crate::api::{
    abi_byte_len, abi_len, AnalogInfo, EntityInfo, EventInfo, FileInfo, LibraryInfo,
    NeuralInfo, NeuroshareApi, NsResult, Operation, SegSourceInfo, SegmentInfo,
};

/// An opened native module. Dropping it closes the module.
///
/// # Safety
///
/// Every address returned for an [`Operation`] symbol must be a function
/// with the Neuroshare 1.3 signature for that name, and must stay callable
/// until the source is dropped. The registry calls through these addresses
/// from safe code.
pub unsafe trait SymbolSource: Send + Sync {
    /// Address of an exported symbol
    fn symbol(&self, name: &str) -> Result<NonNull<c_void>, String>;
}

/// Opens native modules by path
///
/// # Safety
///
/// Every source returned by `open` must uphold the [`SymbolSource`] contract.
pub unsafe trait ModuleLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn SymbolSource>, String>;
}

/// Production loader backed by the platform's dynamic linker
#[derive(Debug, Clone, Copy, Default)]
pub struct DlopenLoader;

// Safety: a module exporting the `ns_*` names is taken to be a Neuroshare
// library. The registry only loads names the host asked for.
unsafe impl ModuleLoader for DlopenLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn SymbolSource>, String> {
        // Safety: loading a library runs its initializers. The caller chose
        // this library; we can only trust that it is a Neuroshare module.
        let library = unsafe { Library::new(path) }.map_err(|e| e.to_string())?;
        Ok(Box::new(DlopenModule {
            path: path.to_path_buf(),
            library,
        }))
    }
}

struct DlopenModule {
    path: PathBuf,
    library: Library,
}

// Safety: addresses come from `library`, which is owned and closed on drop.
unsafe impl SymbolSource for DlopenModule {
    fn symbol(&self, name: &str) -> Result<NonNull<c_void>, String> {
        let c_name = CString::new(name).map_err(|_| format!("invalid symbol name: {}", name))?;

        // Safety: the symbol is only read as an address here; it is given a
        // type in `FunctionTable::bind`.
        let symbol: Symbol<*mut c_void> = unsafe {
            self.library
                .get(c_name.as_bytes_with_nul())
                .map_err(|e| e.to_string())?
        };

        NonNull::new(*symbol)
            .ok_or_else(|| format!("symbol '{}' in '{}' is null", name, self.path.display()))
    }
}

impl Drop for DlopenModule {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "closing native module");
    }
}

// Neuroshare libraries use __stdcall on 32-bit Windows and the C convention
// everywhere else, which is exactly what "system" selects.
type GetLibraryInfoFn = unsafe extern "system" fn(*mut LibraryInfo, u32) -> NsResult;
type OpenFileFn = unsafe extern "system" fn(*const c_char, *mut u32) -> NsResult;
type GetFileInfoFn = unsafe extern "system" fn(u32, *mut FileInfo, u32) -> NsResult;
type CloseFileFn = unsafe extern "system" fn(u32) -> NsResult;
type GetEntityInfoFn = unsafe extern "system" fn(u32, u32, *mut EntityInfo, u32) -> NsResult;
type GetEventInfoFn = unsafe extern "system" fn(u32, u32, *mut EventInfo, u32) -> NsResult;
type GetEventDataFn =
    unsafe extern "system" fn(u32, u32, u32, *mut f64, *mut c_void, u32, *mut u32) -> NsResult;
type GetAnalogInfoFn = unsafe extern "system" fn(u32, u32, *mut AnalogInfo, u32) -> NsResult;
type GetAnalogDataFn =
    unsafe extern "system" fn(u32, u32, u32, u32, *mut u32, *mut f64) -> NsResult;
type GetSegmentInfoFn = unsafe extern "system" fn(u32, u32, *mut SegmentInfo, u32) -> NsResult;
type GetSegmentSourceInfoFn =
    unsafe extern "system" fn(u32, u32, u32, *mut SegSourceInfo, u32) -> NsResult;
type GetSegmentDataFn = unsafe extern "system" fn(
    u32,
    u32,
    i32,
    *mut f64,
    *mut f64,
    u32,
    *mut u32,
    *mut u32,
) -> NsResult;
type GetNeuralInfoFn = unsafe extern "system" fn(u32, u32, *mut NeuralInfo, u32) -> NsResult;
type GetNeuralDataFn = unsafe extern "system" fn(u32, u32, u32, u32, *mut f64) -> NsResult;
type GetIndexByTimeFn = unsafe extern "system" fn(u32, u32, f64, i32, *mut u32) -> NsResult;
type GetTimeByIndexFn = unsafe extern "system" fn(u32, u32, u32, *mut f64) -> NsResult;
type GetLastErrorMsgFn = unsafe extern "system" fn(*mut c_char, u32) -> NsResult;

/// A required symbol that could not be resolved
#[derive(Debug, Clone)]
pub struct BindError {
    pub operation: Operation,
    pub reason: String,
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unable to bind {}: {}", self.operation, self.reason)
    }
}

impl std::error::Error for BindError {}

/// Every Operation Table entry, resolved
#[derive(Clone, Copy)]
pub struct FunctionTable {
    get_library_info: GetLibraryInfoFn,
    open_file: OpenFileFn,
    get_file_info: GetFileInfoFn,
    close_file: CloseFileFn,
    get_entity_info: GetEntityInfoFn,
    get_event_info: GetEventInfoFn,
    get_event_data: GetEventDataFn,
    get_analog_info: GetAnalogInfoFn,
    get_analog_data: GetAnalogDataFn,
    get_segment_info: GetSegmentInfoFn,
    get_segment_source_info: GetSegmentSourceInfoFn,
    get_segment_data: GetSegmentDataFn,
    get_neural_info: GetNeuralInfoFn,
    get_neural_data: GetNeuralDataFn,
    get_index_by_time: GetIndexByTimeFn,
    get_time_by_index: GetTimeByIndexFn,
    get_last_error_msg: GetLastErrorMsgFn,
}

impl FunctionTable {
    /// Resolve the full table, in `Operation::ALL` order.
    ///
    /// # Safety
    ///
    /// Every resolved symbol must be a function with the Neuroshare 1.3
    /// signature for its name.
    pub unsafe fn bind(source: &dyn SymbolSource) -> Result<Self, BindError> {
        macro_rules! bind {
            ($op:expr) => {{
                let op: Operation = $op;
                let addr = source.symbol(op.symbol()).map_err(|reason| BindError {
                    operation: op,
                    reason,
                })?;
                std::mem::transmute::<*mut c_void, _>(addr.as_ptr())
            }};
        }

        // Struct fields are evaluated in source order, which is table order.
        Ok(Self {
            get_library_info: bind!(Operation::GetLibraryInfo),
            open_file: bind!(Operation::OpenFile),
            get_file_info: bind!(Operation::GetFileInfo),
            close_file: bind!(Operation::CloseFile),
            get_entity_info: bind!(Operation::GetEntityInfo),
            get_event_info: bind!(Operation::GetEventInfo),
            get_event_data: bind!(Operation::GetEventData),
            get_analog_info: bind!(Operation::GetAnalogInfo),
            get_analog_data: bind!(Operation::GetAnalogData),
            get_segment_info: bind!(Operation::GetSegmentInfo),
            get_segment_source_info: bind!(Operation::GetSegmentSourceInfo),
            get_segment_data: bind!(Operation::GetSegmentData),
            get_neural_info: bind!(Operation::GetNeuralInfo),
            get_neural_data: bind!(Operation::GetNeuralData),
            get_index_by_time: bind!(Operation::GetIndexByTime),
            get_time_by_index: bind!(Operation::GetTimeByIndex),
            get_last_error_msg: bind!(Operation::GetLastErrorMsg),
        })
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable")
            .field("entries", &Operation::ALL.len())
            .finish()
    }
}

fn size_of_u32<T>() -> u32 {
    std::mem::size_of::<T>() as u32
}

/// A bound Neuroshare library.
///
/// Owns the open module; the function table is only valid while `source`
/// is alive, and field order guarantees the table is dropped first.
pub struct NativeModule {
    name: String,
    table: FunctionTable,
    _source: Box<dyn SymbolSource>,
}

impl NativeModule {
    /// Bind every operation from an opened module.
    ///
    /// On failure the module is dropped, which closes it.
    ///
    /// # Safety
    ///
    /// See [`FunctionTable::bind`].
    pub unsafe fn bind(
        name: impl Into<String>,
        source: Box<dyn SymbolSource>,
    ) -> Result<Self, BindError> {
        let table = FunctionTable::bind(source.as_ref())?;
        Ok(Self {
            name: name.into(),
            table,
            _source: source,
        })
    }

    /// Normalized identifier this module was loaded under
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// Safety for every call below: the table was bound against the module held
// in `_source`, every pointer handed over refers to live memory owned by the
// caller, and every size or count is derived from that memory.
impl NeuroshareApi for NativeModule {
    fn get_library_info(&self, info: &mut LibraryInfo) -> NsResult {
        unsafe { (self.table.get_library_info)(info, size_of_u32::<LibraryInfo>()) }
    }

    fn open_file(&self, filename: &CStr, file: &mut u32) -> NsResult {
        unsafe { (self.table.open_file)(filename.as_ptr(), file) }
    }

    fn get_file_info(&self, file: u32, info: &mut FileInfo) -> NsResult {
        unsafe { (self.table.get_file_info)(file, info, size_of_u32::<FileInfo>()) }
    }

    fn close_file(&self, file: u32) -> NsResult {
        unsafe { (self.table.close_file)(file) }
    }

    fn get_entity_info(&self, file: u32, entity: u32, info: &mut EntityInfo) -> NsResult {
        unsafe { (self.table.get_entity_info)(file, entity, info, size_of_u32::<EntityInfo>()) }
    }

    fn get_event_info(&self, file: u32, entity: u32, info: &mut EventInfo) -> NsResult {
        unsafe { (self.table.get_event_info)(file, entity, info, size_of_u32::<EventInfo>()) }
    }

    fn get_event_data(
        &self,
        file: u32,
        entity: u32,
        index: u32,
        timestamp: &mut f64,
        data: &mut [u8],
        data_ret_size: &mut u32,
    ) -> NsResult {
        unsafe {
            (self.table.get_event_data)(
                file,
                entity,
                index,
                timestamp,
                data.as_mut_ptr() as *mut c_void,
                abi_len(data.len()),
                data_ret_size,
            )
        }
    }

    fn get_analog_info(&self, file: u32, entity: u32, info: &mut AnalogInfo) -> NsResult {
        unsafe { (self.table.get_analog_info)(file, entity, info, size_of_u32::<AnalogInfo>()) }
    }

    fn get_analog_data(
        &self,
        file: u32,
        entity: u32,
        start_index: u32,
        cont_count: &mut u32,
        data: &mut [f64],
    ) -> NsResult {
        unsafe {
            (self.table.get_analog_data)(
                file,
                entity,
                start_index,
                abi_len(data.len()),
                cont_count,
                data.as_mut_ptr(),
            )
        }
    }

    fn get_segment_info(&self, file: u32, entity: u32, info: &mut SegmentInfo) -> NsResult {
        unsafe {
            (self.table.get_segment_info)(file, entity, info, size_of_u32::<SegmentInfo>())
        }
    }

    fn get_segment_source_info(
        &self,
        file: u32,
        entity: u32,
        source: u32,
        info: &mut SegSourceInfo,
    ) -> NsResult {
        unsafe {
            (self.table.get_segment_source_info)(
                file,
                entity,
                source,
                info,
                size_of_u32::<SegSourceInfo>(),
            )
        }
    }

    fn get_segment_data(
        &self,
        file: u32,
        entity: u32,
        index: i32,
        timestamp: &mut f64,
        data: &mut [f64],
        sample_count: &mut u32,
        unit_id: &mut u32,
    ) -> NsResult {
        unsafe {
            (self.table.get_segment_data)(
                file,
                entity,
                index,
                timestamp,
                data.as_mut_ptr(),
                abi_byte_len(data),
                sample_count,
                unit_id,
            )
        }
    }

    fn get_neural_info(&self, file: u32, entity: u32, info: &mut NeuralInfo) -> NsResult {
        unsafe { (self.table.get_neural_info)(file, entity, info, size_of_u32::<NeuralInfo>()) }
    }

    fn get_neural_data(
        &self,
        file: u32,
        entity: u32,
        start_index: u32,
        data: &mut [f64],
    ) -> NsResult {
        unsafe {
            (self.table.get_neural_data)(
                file,
                entity,
                start_index,
                abi_len(data.len()),
                data.as_mut_ptr(),
            )
        }
    }

    fn get_index_by_time(
        &self,
        file: u32,
        entity: u32,
        time: f64,
        flag: i32,
        index: &mut u32,
    ) -> NsResult {
        unsafe { (self.table.get_index_by_time)(file, entity, time, flag, index) }
    }

    fn get_time_by_index(&self, file: u32, entity: u32, index: u32, time: &mut f64) -> NsResult {
        unsafe { (self.table.get_time_by_index)(file, entity, index, time) }
    }

    fn get_last_error_msg(&self, buffer: &mut [c_char]) -> NsResult {
        unsafe { (self.table.get_last_error_msg)(buffer.as_mut_ptr(), abi_len(buffer.len())) }
    }
}
