//! The Neuroshare Operation Table
//!
//! The closed set of entry points every Neuroshare library exports, and the
//! safe trait the rest of the crate (and any host adapter) programs against.

use std::ffi::CStr;
use std::fmt;
use std::os::raw::c_char;

use super::result::NsResult;
use super::types::{
    AnalogInfo, EntityInfo, EventInfo, FileInfo, LibraryInfo, NeuralInfo, SegSourceInfo,
    SegmentInfo,
};

/// One entry of the Operation Table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetLibraryInfo,
    OpenFile,
    GetFileInfo,
    CloseFile,
    GetEntityInfo,
    GetEventInfo,
    GetEventData,
    GetAnalogInfo,
    GetAnalogData,
    GetSegmentInfo,
    GetSegmentSourceInfo,
    GetSegmentData,
    GetNeuralInfo,
    GetNeuralData,
    GetIndexByTime,
    GetTimeByIndex,
    GetLastErrorMsg,
}

impl Operation {
    /// Every operation, in binding order. Library info comes first.
    pub const ALL: [Operation; 17] = [
        Operation::GetLibraryInfo,
        Operation::OpenFile,
        Operation::GetFileInfo,
        Operation::CloseFile,
        Operation::GetEntityInfo,
        Operation::GetEventInfo,
        Operation::GetEventData,
        Operation::GetAnalogInfo,
        Operation::GetAnalogData,
        Operation::GetSegmentInfo,
        Operation::GetSegmentSourceInfo,
        Operation::GetSegmentData,
        Operation::GetNeuralInfo,
        Operation::GetNeuralData,
        Operation::GetIndexByTime,
        Operation::GetTimeByIndex,
        Operation::GetLastErrorMsg,
    ];

    /// Exported symbol name
    pub fn symbol(self) -> &'static str {
        match self {
            Operation::GetLibraryInfo => "ns_GetLibraryInfo",
            Operation::OpenFile => "ns_OpenFile",
            Operation::GetFileInfo => "ns_GetFileInfo",
            Operation::CloseFile => "ns_CloseFile",
            Operation::GetEntityInfo => "ns_GetEntityInfo",
            Operation::GetEventInfo => "ns_GetEventInfo",
            Operation::GetEventData => "ns_GetEventData",
            Operation::GetAnalogInfo => "ns_GetAnalogInfo",
            Operation::GetAnalogData => "ns_GetAnalogData",
            Operation::GetSegmentInfo => "ns_GetSegmentInfo",
            Operation::GetSegmentSourceInfo => "ns_GetSegmentSourceInfo",
            Operation::GetSegmentData => "ns_GetSegmentData",
            Operation::GetNeuralInfo => "ns_GetNeuralInfo",
            Operation::GetNeuralData => "ns_GetNeuralData",
            Operation::GetIndexByTime => "ns_GetIndexByTime",
            Operation::GetTimeByIndex => "ns_GetTimeByIndex",
            Operation::GetLastErrorMsg => "ns_GetLastErrorMsg",
        }
    }
}

/// The Operation Table, in binding order
pub const OPERATIONS: [Operation; 17] = Operation::ALL;

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Clamp a buffer length to the `u32` the ABI carries.
///
/// Saturating keeps the advertised size at or below the real one.
pub(crate) fn abi_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Byte size of an `f64` buffer, clamped the same way
pub(crate) fn abi_byte_len(values: &[f64]) -> u32 {
    abi_len(values.len().saturating_mul(std::mem::size_of::<f64>()))
}

/// A Neuroshare implementation.
///
/// Every method maps one-to-one onto an Operation Table entry. Sizes and
/// counts that the C API takes next to a buffer are derived from the slice
/// passed here, so an implementation is never told a buffer is larger than
/// it is.
pub trait NeuroshareApi: Send + Sync {
    fn get_library_info(&self, info: &mut LibraryInfo) -> NsResult;

    fn open_file(&self, filename: &CStr, file: &mut u32) -> NsResult;

    fn get_file_info(&self, file: u32, info: &mut FileInfo) -> NsResult;

    fn close_file(&self, file: u32) -> NsResult;

    fn get_entity_info(&self, file: u32, entity: u32, info: &mut EntityInfo) -> NsResult;

    fn get_event_info(&self, file: u32, entity: u32, info: &mut EventInfo) -> NsResult;

    /// Read one event; `data_ret_size` receives the bytes written
    fn get_event_data(
        &self,
        file: u32,
        entity: u32,
        index: u32,
        timestamp: &mut f64,
        data: &mut [u8],
        data_ret_size: &mut u32,
    ) -> NsResult;

    fn get_analog_info(&self, file: u32, entity: u32, info: &mut AnalogInfo) -> NsResult;

    /// Read `data.len()` samples starting at `start_index`; `cont_count`
    /// receives the number of contiguous samples returned
    fn get_analog_data(
        &self,
        file: u32,
        entity: u32,
        start_index: u32,
        cont_count: &mut u32,
        data: &mut [f64],
    ) -> NsResult;

    fn get_segment_info(&self, file: u32, entity: u32, info: &mut SegmentInfo) -> NsResult;

    fn get_segment_source_info(
        &self,
        file: u32,
        entity: u32,
        source: u32,
        info: &mut SegSourceInfo,
    ) -> NsResult;

    #[allow(clippy::too_many_arguments)]
    fn get_segment_data(
        &self,
        file: u32,
        entity: u32,
        index: i32,
        timestamp: &mut f64,
        data: &mut [f64],
        sample_count: &mut u32,
        unit_id: &mut u32,
    ) -> NsResult;

    fn get_neural_info(&self, file: u32, entity: u32, info: &mut NeuralInfo) -> NsResult;

    /// Read `data.len()` timestamps starting at `start_index`
    fn get_neural_data(&self, file: u32, entity: u32, start_index: u32, data: &mut [f64])
        -> NsResult;

    /// `flag` is a raw [`TimeSearch`](super::TimeSearch) value
    fn get_index_by_time(
        &self,
        file: u32,
        entity: u32,
        time: f64,
        flag: i32,
        index: &mut u32,
    ) -> NsResult;

    fn get_time_by_index(&self, file: u32, entity: u32, index: u32, time: &mut f64) -> NsResult;

    fn get_last_error_msg(&self, buffer: &mut [c_char]) -> NsResult;

    /// Fetch the last error message as an owned string
    fn last_error_message(&self) -> Result<String, NsResult> {
        let mut buffer = [0 as c_char; 256];
        let result = self.get_last_error_msg(&mut buffer);
        if result.is_ok() {
            Ok(super::types::text_field(&buffer).into_owned())
        } else {
            Err(result)
        }
    }
}
