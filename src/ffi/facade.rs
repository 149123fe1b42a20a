//! Binding Facade
//!
//! One forwarding method per Operation Table entry, addressed by handle.
//! An invalid handle yields `LIBERROR` without touching any native code;
//! a valid one forwards the call verbatim and returns the native result.

use std::ffi::CStr;
use std::os::raw::c_char;

use super::loader::NativeModule;
use super::registry::{DllHandle, Registry};
use crate::api::{
    AnalogInfo, EntityInfo, EventInfo, FileInfo, LibraryInfo, NeuralInfo, NeuroshareApi,
    NsResult, Operation, SegSourceInfo, SegmentInfo,
};

impl Registry {
    /// Run `call` against the module behind `handle`.
    ///
    /// The module stays alive for the duration of the call even if another
    /// thread closes the last reference meanwhile.
    fn dispatch(
        &self,
        handle: DllHandle,
        op: Operation,
        call: impl FnOnce(&NativeModule) -> NsResult,
    ) -> NsResult {
        match self.module(handle) {
            Ok(module) => call(module.as_ref()),
            Err(_) => {
                tracing::trace!(%handle, operation = op.symbol(), "rejected call on invalid handle");
                NsResult::LIBERROR
            }
        }
    }

    /// View of one handle as a [`NeuroshareApi`]
    pub fn bind(&self, handle: DllHandle) -> BoundLibrary<'_> {
        BoundLibrary {
            registry: self,
            handle,
        }
    }

    pub fn get_library_info(&self, handle: DllHandle, info: &mut LibraryInfo) -> NsResult {
        self.dispatch(handle, Operation::GetLibraryInfo, |m| m.get_library_info(info))
    }

    pub fn open_file(&self, handle: DllHandle, filename: &CStr, file: &mut u32) -> NsResult {
        self.dispatch(handle, Operation::OpenFile, |m| m.open_file(filename, file))
    }

    pub fn get_file_info(&self, handle: DllHandle, file: u32, info: &mut FileInfo) -> NsResult {
        self.dispatch(handle, Operation::GetFileInfo, |m| m.get_file_info(file, info))
    }

    pub fn close_file(&self, handle: DllHandle, file: u32) -> NsResult {
        self.dispatch(handle, Operation::CloseFile, |m| m.close_file(file))
    }

    pub fn get_entity_info(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        info: &mut EntityInfo,
    ) -> NsResult {
        self.dispatch(handle, Operation::GetEntityInfo, |m| {
            m.get_entity_info(file, entity, info)
        })
    }

    pub fn get_event_info(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        info: &mut EventInfo,
    ) -> NsResult {
        self.dispatch(handle, Operation::GetEventInfo, |m| {
            m.get_event_info(file, entity, info)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_event_data(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        index: u32,
        timestamp: &mut f64,
        data: &mut [u8],
        data_ret_size: &mut u32,
    ) -> NsResult {
        self.dispatch(handle, Operation::GetEventData, |m| {
            m.get_event_data(file, entity, index, timestamp, data, data_ret_size)
        })
    }

    pub fn get_analog_info(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        info: &mut AnalogInfo,
    ) -> NsResult {
        self.dispatch(handle, Operation::GetAnalogInfo, |m| {
            m.get_analog_info(file, entity, info)
        })
    }

    pub fn get_analog_data(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        start_index: u32,
        cont_count: &mut u32,
        data: &mut [f64],
    ) -> NsResult {
        self.dispatch(handle, Operation::GetAnalogData, |m| {
            m.get_analog_data(file, entity, start_index, cont_count, data)
        })
    }

    pub fn get_segment_info(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        info: &mut SegmentInfo,
    ) -> NsResult {
        self.dispatch(handle, Operation::GetSegmentInfo, |m| {
            m.get_segment_info(file, entity, info)
        })
    }

    pub fn get_segment_source_info(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        source: u32,
        info: &mut SegSourceInfo,
    ) -> NsResult {
        self.dispatch(handle, Operation::GetSegmentSourceInfo, |m| {
            m.get_segment_source_info(file, entity, source, info)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_segment_data(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        index: i32,
        timestamp: &mut f64,
        data: &mut [f64],
        sample_count: &mut u32,
        unit_id: &mut u32,
    ) -> NsResult {
        self.dispatch(handle, Operation::GetSegmentData, |m| {
            m.get_segment_data(file, entity, index, timestamp, data, sample_count, unit_id)
        })
    }

    pub fn get_neural_info(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        info: &mut NeuralInfo,
    ) -> NsResult {
        self.dispatch(handle, Operation::GetNeuralInfo, |m| {
            m.get_neural_info(file, entity, info)
        })
    }

    pub fn get_neural_data(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        start_index: u32,
        data: &mut [f64],
    ) -> NsResult {
        self.dispatch(handle, Operation::GetNeuralData, |m| {
            m.get_neural_data(file, entity, start_index, data)
        })
    }

    pub fn get_index_by_time(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        time: f64,
        flag: i32,
        index: &mut u32,
    ) -> NsResult {
        self.dispatch(handle, Operation::GetIndexByTime, |m| {
            m.get_index_by_time(file, entity, time, flag, index)
        })
    }

    pub fn get_time_by_index(
        &self,
        handle: DllHandle,
        file: u32,
        entity: u32,
        index: u32,
        time: &mut f64,
    ) -> NsResult {
        self.dispatch(handle, Operation::GetTimeByIndex, |m| {
            m.get_time_by_index(file, entity, index, time)
        })
    }

    pub fn get_last_error_msg(&self, handle: DllHandle, buffer: &mut [c_char]) -> NsResult {
        self.dispatch(handle, Operation::GetLastErrorMsg, |m| {
            m.get_last_error_msg(buffer)
        })
    }
}

/// A handle paired with its registry.
///
/// Every call is validated against the registry, so a view outliving its
/// library just returns `LIBERROR`.
#[derive(Debug, Clone, Copy)]
pub struct BoundLibrary<'a> {
    registry: &'a Registry,
    handle: DllHandle,
}

impl BoundLibrary<'_> {
    pub fn handle(&self) -> DllHandle {
        self.handle
    }
}

impl NeuroshareApi for BoundLibrary<'_> {
    fn get_library_info(&self, info: &mut LibraryInfo) -> NsResult {
        self.registry.get_library_info(self.handle, info)
    }

    fn open_file(&self, filename: &CStr, file: &mut u32) -> NsResult {
        self.registry.open_file(self.handle, filename, file)
    }

    fn get_file_info(&self, file: u32, info: &mut FileInfo) -> NsResult {
        self.registry.get_file_info(self.handle, file, info)
    }

    fn close_file(&self, file: u32) -> NsResult {
        self.registry.close_file(self.handle, file)
    }

    fn get_entity_info(&self, file: u32, entity: u32, info: &mut EntityInfo) -> NsResult {
        self.registry.get_entity_info(self.handle, file, entity, info)
    }

    fn get_event_info(&self, file: u32, entity: u32, info: &mut EventInfo) -> NsResult {
        self.registry.get_event_info(self.handle, file, entity, info)
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
        self.registry
            .get_event_data(self.handle, file, entity, index, timestamp, data, data_ret_size)
    }

    fn get_analog_info(&self, file: u32, entity: u32, info: &mut AnalogInfo) -> NsResult {
        self.registry.get_analog_info(self.handle, file, entity, info)
    }

    fn get_analog_data(
        &self,
        file: u32,
        entity: u32,
        start_index: u32,
        cont_count: &mut u32,
        data: &mut [f64],
    ) -> NsResult {
        self.registry
            .get_analog_data(self.handle, file, entity, start_index, cont_count, data)
    }

    fn get_segment_info(&self, file: u32, entity: u32, info: &mut SegmentInfo) -> NsResult {
        self.registry.get_segment_info(self.handle, file, entity, info)
    }

    fn get_segment_source_info(
        &self,
        file: u32,
        entity: u32,
        source: u32,
        info: &mut SegSourceInfo,
    ) -> NsResult {
        self.registry
            .get_segment_source_info(self.handle, file, entity, source, info)
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
        self.registry.get_segment_data(
            self.handle,
            file,
            entity,
            index,
            timestamp,
            data,
            sample_count,
            unit_id,
        )
    }

    fn get_neural_info(&self, file: u32, entity: u32, info: &mut NeuralInfo) -> NsResult {
        self.registry.get_neural_info(self.handle, file, entity, info)
    }

    fn get_neural_data(
        &self,
        file: u32,
        entity: u32,
        start_index: u32,
        data: &mut [f64],
    ) -> NsResult {
        self.registry
            .get_neural_data(self.handle, file, entity, start_index, data)
    }

    fn get_index_by_time(
        &self,
        file: u32,
        entity: u32,
        time: f64,
        flag: i32,
        index: &mut u32,
    ) -> NsResult {
        self.registry
            .get_index_by_time(self.handle, file, entity, time, flag, index)
    }

    fn get_time_by_index(&self, file: u32, entity: u32, index: u32, time: &mut f64) -> NsResult {
        self.registry
            .get_time_by_index(self.handle, file, entity, index, time)
    }

    fn get_last_error_msg(&self, buffer: &mut [c_char]) -> NsResult {
        self.registry.get_last_error_msg(self.handle, buffer)
    }
}
