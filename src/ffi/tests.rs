//! Registry and Binding Tests
//!
//! Native libraries are replaced by `extern "system"` functions in this
//! module, served through an in-memory loader that counts opens and closes.

use super::*;
use crate::api::{
    set_text_field, AnalogInfo, EntityInfo, EntityType, EventInfo, FileInfo, LibraryInfo,
    NeuralInfo, NeuroshareApi, NsResult, Operation, SegSourceInfo, SegmentInfo,
};
use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

thread_local! {
    static NATIVE_CALLS: Cell<usize> = const { Cell::new(0) };
    static LAST_BUFFER_SIZE: Cell<u32> = const { Cell::new(0) };
}

fn note_call() {
    NATIVE_CALLS.with(|c| c.set(c.get() + 1));
}

/// Native invocations made on this thread
pub(crate) fn native_calls() -> usize {
    NATIVE_CALLS.with(Cell::get)
}

pub(crate) fn reset_native_calls() {
    NATIVE_CALLS.with(|c| c.set(0));
}

fn last_buffer_size() -> u32 {
    LAST_BUFFER_SIZE.with(Cell::get)
}

const STUB_FILE: u32 = 7;
const STUB_ENTITIES: u32 = 3;

unsafe extern "system" fn stub_library_info(info: *mut LibraryInfo, _size: u32) -> NsResult {
    note_call();
    let info = &mut *info;
    info.lib_version_maj = 2;
    info.lib_version_min = 5;
    info.api_version_maj = 1;
    info.api_version_min = 3;
    set_text_field(&mut info.creator, "stub labs");
    set_text_field(&mut info.description, "in-memory test library");
    NsResult::OK
}

unsafe extern "system" fn stub_library_info_old(info: *mut LibraryInfo, _size: u32) -> NsResult {
    note_call();
    let info = &mut *info;
    info.api_version_maj = 1;
    info.api_version_min = 2;
    NsResult::OK
}

unsafe extern "system" fn stub_open_file(name: *const c_char, file: *mut u32) -> NsResult {
    note_call();
    if CStr::from_ptr(name).to_bytes() == b"missing.nev" {
        return NsResult::FILEERROR;
    }
    *file = STUB_FILE;
    NsResult::OK
}

unsafe extern "system" fn stub_file_info(file: u32, info: *mut FileInfo, _size: u32) -> NsResult {
    note_call();
    if file != STUB_FILE {
        return NsResult::BADFILE;
    }
    (*info).entity_count = STUB_ENTITIES;
    set_text_field(&mut (*info).file_type, "stub");
    NsResult::OK
}

unsafe extern "system" fn stub_close_file(file: u32) -> NsResult {
    note_call();
    if file == STUB_FILE {
        NsResult::OK
    } else {
        NsResult::BADFILE
    }
}

unsafe extern "system" fn stub_entity_info(
    _file: u32,
    entity: u32,
    info: *mut EntityInfo,
    _size: u32,
) -> NsResult {
    note_call();
    if entity >= STUB_ENTITIES {
        return NsResult::BADENTITY;
    }
    let info = &mut *info;
    set_text_field(&mut info.label, &format!("chan{}", entity));
    info.entity_type = 2;
    info.item_count = 100;
    NsResult::OK
}

unsafe extern "system" fn stub_event_info(
    _file: u32,
    _entity: u32,
    _info: *mut EventInfo,
    _size: u32,
) -> NsResult {
    note_call();
    NsResult::OK
}

unsafe extern "system" fn stub_event_data(
    _file: u32,
    _entity: u32,
    _index: u32,
    timestamp: *mut f64,
    _data: *mut c_void,
    data_size: u32,
    data_ret_size: *mut u32,
) -> NsResult {
    note_call();
    LAST_BUFFER_SIZE.with(|s| s.set(data_size));
    *timestamp = 0.5;
    *data_ret_size = 0;
    NsResult::OK
}

unsafe extern "system" fn stub_analog_info(
    _file: u32,
    _entity: u32,
    _info: *mut AnalogInfo,
    _size: u32,
) -> NsResult {
    note_call();
    NsResult::OK
}

unsafe extern "system" fn stub_analog_data(
    _file: u32,
    _entity: u32,
    start_index: u32,
    index_count: u32,
    cont_count: *mut u32,
    data: *mut f64,
) -> NsResult {
    note_call();
    LAST_BUFFER_SIZE.with(|s| s.set(index_count));
    let data = std::slice::from_raw_parts_mut(data, index_count as usize);
    for (i, sample) in data.iter_mut().enumerate() {
        *sample = (start_index as usize + i) as f64;
    }
    *cont_count = index_count;
    NsResult::OK
}

unsafe extern "system" fn stub_segment_info(
    _file: u32,
    _entity: u32,
    _info: *mut SegmentInfo,
    _size: u32,
) -> NsResult {
    note_call();
    NsResult::OK
}

unsafe extern "system" fn stub_segment_source_info(
    _file: u32,
    _entity: u32,
    source: u32,
    _info: *mut SegSourceInfo,
    _size: u32,
) -> NsResult {
    note_call();
    if source == 0 {
        NsResult::OK
    } else {
        NsResult::BADSOURCE
    }
}

unsafe extern "system" fn stub_segment_data(
    _file: u32,
    _entity: u32,
    _index: i32,
    _timestamp: *mut f64,
    _data: *mut f64,
    data_size: u32,
    sample_count: *mut u32,
    unit_id: *mut u32,
) -> NsResult {
    note_call();
    LAST_BUFFER_SIZE.with(|s| s.set(data_size));
    *sample_count = data_size / 8;
    *unit_id = 4;
    NsResult::OK
}

unsafe extern "system" fn stub_neural_info(
    _file: u32,
    _entity: u32,
    _info: *mut NeuralInfo,
    _size: u32,
) -> NsResult {
    note_call();
    NsResult::OK
}

unsafe extern "system" fn stub_neural_data(
    _file: u32,
    _entity: u32,
    _start_index: u32,
    index_count: u32,
    _data: *mut f64,
) -> NsResult {
    note_call();
    LAST_BUFFER_SIZE.with(|s| s.set(index_count));
    NsResult::OK
}

unsafe extern "system" fn stub_index_by_time(
    _file: u32,
    _entity: u32,
    _time: f64,
    _flag: i32,
    _index: *mut u32,
) -> NsResult {
    note_call();
    NsResult::BADINDEX
}

unsafe extern "system" fn stub_time_by_index(
    _file: u32,
    _entity: u32,
    index: u32,
    time: *mut f64,
) -> NsResult {
    note_call();
    *time = index as f64 / 1000.0;
    NsResult::OK
}

unsafe extern "system" fn stub_last_error_msg(buffer: *mut c_char, size: u32) -> NsResult {
    note_call();
    let buffer = std::slice::from_raw_parts_mut(buffer, size as usize);
    set_text_field(buffer, "stub error");
    NsResult::OK
}

fn stub_symbols() -> HashMap<&'static str, usize> {
    [
        ("ns_GetLibraryInfo", stub_library_info as usize),
        ("ns_OpenFile", stub_open_file as usize),
        ("ns_GetFileInfo", stub_file_info as usize),
        ("ns_CloseFile", stub_close_file as usize),
        ("ns_GetEntityInfo", stub_entity_info as usize),
        ("ns_GetEventInfo", stub_event_info as usize),
        ("ns_GetEventData", stub_event_data as usize),
        ("ns_GetAnalogInfo", stub_analog_info as usize),
        ("ns_GetAnalogData", stub_analog_data as usize),
        ("ns_GetSegmentInfo", stub_segment_info as usize),
        ("ns_GetSegmentSourceInfo", stub_segment_source_info as usize),
        ("ns_GetSegmentData", stub_segment_data as usize),
        ("ns_GetNeuralInfo", stub_neural_info as usize),
        ("ns_GetNeuralData", stub_neural_data as usize),
        ("ns_GetIndexByTime", stub_index_by_time as usize),
        ("ns_GetTimeByIndex", stub_time_by_index as usize),
        ("ns_GetLastErrorMsg", stub_last_error_msg as usize),
    ]
    .into_iter()
    .collect()
}

#[derive(Default)]
pub(crate) struct StubCounters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
}

/// Loader serving stub modules.
///
/// The file name picks the behaviour: `missing*` fails to open, `nosym*`
/// lacks `ns_GetLastErrorMsg`, `old*` reports API 1.2.
#[derive(Clone, Default)]
pub(crate) struct StubLoader {
    pub counters: Arc<StubCounters>,
}

impl StubLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

// Safety: every stub is an `extern "system"` fn with the signature of its name.
unsafe impl ModuleLoader for StubLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn SymbolSource>, String> {
        let file = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or_default()
            .to_string();
        if file.starts_with("missing") {
            return Err(format!("{}: cannot open shared object file", path.display()));
        }

        let mut symbols = stub_symbols();
        if file.starts_with("nosym") {
            symbols.remove("ns_GetLastErrorMsg");
        }
        if file.starts_with("old") {
            symbols.insert("ns_GetLibraryInfo", stub_library_info_old as usize);
        }

        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubModule {
            symbols,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct StubModule {
    symbols: HashMap<&'static str, usize>,
    counters: Arc<StubCounters>,
}

unsafe impl SymbolSource for StubModule {
    fn symbol(&self, name: &str) -> Result<NonNull<c_void>, String> {
        self.symbols
            .get(name)
            .and_then(|&addr| NonNull::new(addr as *mut c_void))
            .ok_or_else(|| format!("undefined symbol: {}", name))
    }
}

impl Drop for StubModule {
    fn drop(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn stub_registry(loader: &StubLoader) -> Registry {
    Registry::builder()
        .loader(loader.clone())
        .resolver(LoaderSearch)
        .suffix(".so")
        .build()
}

/// Call every facade operation once, collecting the results
fn call_every_operation(registry: &Registry, handle: DllHandle) -> Vec<NsResult> {
    let mut lib = LibraryInfo::default();
    let mut file_info = FileInfo::default();
    let mut entity = EntityInfo::default();
    let mut event = EventInfo::default();
    let mut analog = AnalogInfo::default();
    let mut segment = SegmentInfo::default();
    let mut source = SegSourceInfo::default();
    let mut neural = NeuralInfo::default();
    let mut file = 0u32;
    let mut count = 0u32;
    let mut unit = 0u32;
    let mut stamp = 0.0f64;
    let mut bytes = [0u8; 16];
    let mut samples = [0.0f64; 4];
    let mut message = [0 as c_char; 64];

    vec![
        registry.get_library_info(handle, &mut lib),
        registry.open_file(handle, c"data.nev", &mut file),
        registry.get_file_info(handle, STUB_FILE, &mut file_info),
        registry.close_file(handle, STUB_FILE),
        registry.get_entity_info(handle, STUB_FILE, 0, &mut entity),
        registry.get_event_info(handle, STUB_FILE, 0, &mut event),
        registry.get_event_data(handle, STUB_FILE, 0, 0, &mut stamp, &mut bytes, &mut count),
        registry.get_analog_info(handle, STUB_FILE, 0, &mut analog),
        registry.get_analog_data(handle, STUB_FILE, 0, 0, &mut count, &mut samples),
        registry.get_segment_info(handle, STUB_FILE, 0, &mut segment),
        registry.get_segment_source_info(handle, STUB_FILE, 0, 0, &mut source),
        registry.get_segment_data(
            handle,
            STUB_FILE,
            0,
            0,
            &mut stamp,
            &mut samples,
            &mut count,
            &mut unit,
        ),
        registry.get_neural_info(handle, STUB_FILE, 0, &mut neural),
        registry.get_neural_data(handle, STUB_FILE, 0, 0, &mut samples),
        registry.get_index_by_time(handle, STUB_FILE, 0, 1.0, 0, &mut count),
        registry.get_time_by_index(handle, STUB_FILE, 0, 5, &mut stamp),
        registry.get_last_error_msg(handle, &mut message),
    ]
}

#[test]
fn test_load_and_share_scenario() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);

    let a = registry.load_library("nsStub").unwrap();
    assert_eq!(a, DllHandle(1));
    assert_eq!(registry.slot_info(a).unwrap().ref_count, 1);

    let again = registry.load_library("nsStub").unwrap();
    assert_eq!(again, a);
    assert_eq!(registry.slot_info(a).unwrap().ref_count, 2);
    assert_eq!(loader.opens(), 1);

    registry.close_library(a).unwrap();
    assert_eq!(registry.slot_info(a).unwrap().ref_count, 1);
    assert_eq!(loader.closes(), 0);

    let mut info = FileInfo::default();
    assert_eq!(registry.get_file_info(a, STUB_FILE, &mut info), NsResult::OK);
    assert_eq!(info.entity_count, STUB_ENTITIES);

    registry.close_library(a).unwrap();
    assert_eq!(loader.closes(), 1);
    assert!(registry.slot_info(a).is_none());
    assert_eq!(
        registry.get_file_info(a, STUB_FILE, &mut info),
        NsResult::LIBERROR
    );
}

#[test]
fn test_suffixed_and_bare_names_share_a_slot() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);

    let bare = registry.load_library("foo").unwrap();
    let suffixed = registry.load_library("foo.so").unwrap();
    assert_eq!(bare, suffixed);

    let slot = registry.slot_info(bare).unwrap();
    assert_eq!(slot.name, "foo.so");
    assert_eq!(slot.ref_count, 2);
    assert_eq!(loader.opens(), 1);
}

#[test]
fn test_capacity_overflow_leaves_slots_untouched() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);
    assert_eq!(registry.capacity(), DEFAULT_CAPACITY);

    for i in 0..32 {
        let handle = registry.load_library(&format!("lib{}", i)).unwrap();
        assert_eq!(handle, DllHandle(i + 1));
    }
    let before = registry.loaded();

    let err = registry.load_library("lib32").unwrap_err();
    assert!(matches!(err, GlueError::RegistryFull { capacity: 32 }));
    assert_eq!(err.status(), NsResult::LIBERROR);
    assert_eq!(registry.loaded(), before);
    assert_eq!(loader.opens(), 32);

    // Sharing an existing entry still works when the table is full.
    assert_eq!(registry.load_library("lib5").unwrap(), DllHandle(6));
    assert_eq!(registry.slot_info(DllHandle(6)).unwrap().ref_count, 2);
}

#[test]
fn test_freed_slot_is_reused() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);

    let a = registry.load_library("a").unwrap();
    let b = registry.load_library("b").unwrap();
    registry.close_library(a).unwrap();

    let c = registry.load_library("c").unwrap();
    assert_eq!(c, a);
    assert_eq!(registry.slot_info(c).unwrap().name, "c.so");
    assert_eq!(registry.slot_info(b).unwrap().name, "b.so");
}

#[test]
fn test_missing_symbol_rolls_back() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);
    registry.load_library("good").unwrap();

    let err = registry.load_library("nosym").unwrap_err();
    match err {
        GlueError::SymbolResolutionFailed { name, symbol, .. } => {
            assert_eq!(name, "nosym.so");
            assert_eq!(symbol, "ns_GetLastErrorMsg");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(loader.opens(), 2);
    assert_eq!(loader.closes(), 1);
    assert_eq!(registry.valid_count(), 1);
    assert!(registry.slot_info(DllHandle(2)).is_none());
}

#[test]
fn test_missing_module_mutates_nothing() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);

    let err = registry.load_library("missing").unwrap_err();
    assert!(matches!(err, GlueError::ModuleNotFound { ref name, .. } if name == "missing.so"));
    assert!(err.to_string().contains("cannot open shared object file"));
    assert_eq!(registry.valid_count(), 0);
    assert_eq!(loader.opens(), 0);
}

#[test]
fn test_invalid_names_rejected() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);

    assert!(matches!(
        registry.load_library(""),
        Err(GlueError::InvalidName(_))
    ));
    assert!(matches!(
        registry.load_library("bad\0name"),
        Err(GlueError::InvalidName(_))
    ));
    assert_eq!(loader.opens(), 0);
}

#[test]
fn test_invalid_handles_make_no_native_call() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);
    let live = registry.load_library("live").unwrap();
    let closed = registry.load_library("closed").unwrap();
    registry.close_library(closed).unwrap();

    reset_native_calls();
    let bad = [
        DllHandle::NONE,
        DllHandle(-1i32 as u32),
        DllHandle(33),
        DllHandle(999),
        DllHandle(u32::MAX),
        closed,
    ];
    for handle in bad {
        let results = call_every_operation(&registry, handle);
        assert_eq!(results.len(), Operation::ALL.len());
        assert!(results.iter().all(|r| *r == NsResult::LIBERROR));
    }
    assert_eq!(native_calls(), 0);

    let results = call_every_operation(&registry, live);
    assert_eq!(native_calls(), Operation::ALL.len());
    assert_eq!(results[14], NsResult::BADINDEX);
}

#[test]
fn test_close_invalid_handle() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);
    let handle = registry.load_library("keep").unwrap();
    let before = registry.loaded();

    for bad in [DllHandle(0), DllHandle(999), DllHandle(2)] {
        let err = registry.close_library(bad).unwrap_err();
        assert!(matches!(err, GlueError::InvalidHandle(h) if h == bad));
        assert_eq!(err.status(), NsResult::LIBERROR);
    }
    assert_eq!(registry.loaded(), before);
    assert!(registry.is_valid(handle));
}

#[test]
fn test_native_results_pass_through() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);
    let handle = registry.load_library("pass").unwrap();

    let mut entity = EntityInfo::default();
    assert_eq!(
        registry.get_entity_info(handle, STUB_FILE, 1, &mut entity),
        NsResult::OK
    );
    assert_eq!(entity.label(), "chan1");
    assert_eq!(entity.kind(), Some(EntityType::Analog));
    assert_eq!(entity.item_count, 100);

    let result = registry.get_entity_info(handle, STUB_FILE, 9, &mut entity);
    assert_eq!(result, NsResult::BADENTITY);
    let err = result.into_result().unwrap_err();
    assert_eq!(err.status(), NsResult::BADENTITY);

    let mut file = 0;
    assert_eq!(
        registry.open_file(handle, c"missing.nev", &mut file),
        NsResult::FILEERROR
    );
}

#[test]
fn test_buffer_sizes_come_from_slices() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);
    let handle = registry.load_library("sizes").unwrap();

    let mut stamp = 0.0;
    let mut count = 0;
    let mut unit = 0;

    let mut samples = [0.0f64; 5];
    registry.get_segment_data(
        handle,
        STUB_FILE,
        0,
        0,
        &mut stamp,
        &mut samples,
        &mut count,
        &mut unit,
    );
    assert_eq!(last_buffer_size(), 40);
    assert_eq!(count, 5);
    assert_eq!(unit, 4);

    let mut analog = [0.0f64; 6];
    registry.get_analog_data(handle, STUB_FILE, 0, 10, &mut count, &mut analog);
    assert_eq!(last_buffer_size(), 6);
    assert_eq!(count, 6);
    assert_eq!(analog, [10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);

    let mut bytes = [0u8; 12];
    registry.get_event_data(handle, STUB_FILE, 0, 0, &mut stamp, &mut bytes, &mut count);
    assert_eq!(last_buffer_size(), 12);

    let mut spikes = [0.0f64; 3];
    registry.get_neural_data(handle, STUB_FILE, 0, 0, &mut spikes);
    assert_eq!(last_buffer_size(), 3);
}

#[test]
fn test_bound_library_forwards() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);
    let handle = registry.load_library("bound").unwrap();
    let lib = registry.bind(handle);

    let mut info = LibraryInfo::default();
    assert_eq!(lib.get_library_info(&mut info), NsResult::OK);
    assert_eq!(info.creator(), "stub labs");
    assert_eq!(lib.last_error_message().unwrap(), "stub error");

    let mut time = 0.0;
    assert_eq!(lib.get_time_by_index(STUB_FILE, 0, 250, &mut time), NsResult::OK);
    assert!((time - 0.25).abs() < 1e-12);

    registry.close_library(handle).unwrap();
    assert_eq!(lib.get_library_info(&mut info), NsResult::LIBERROR);
    assert_eq!(lib.last_error_message(), Err(NsResult::LIBERROR));
}

#[test]
fn test_in_flight_module_outlives_slot() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);
    let handle = registry.load_library("busy").unwrap();

    let module = registry.module(handle).unwrap();
    registry.close_library(handle).unwrap();

    assert!(!registry.is_valid(handle));
    assert_eq!(loader.closes(), 0);

    let mut info = LibraryInfo::default();
    assert_eq!(module.get_library_info(&mut info), NsResult::OK);
    assert_eq!(module.name(), "busy.so");

    drop(module);
    assert_eq!(loader.closes(), 1);
}

#[test]
fn test_version_gate() {
    let loader = StubLoader::new();
    let registry = Registry::builder()
        .loader(loader.clone())
        .resolver(LoaderSearch)
        .suffix(".so")
        .version_policy(VersionPolicy::current())
        .build();

    let err = registry.load_library("old").unwrap_err();
    match err {
        GlueError::IncompatibleVersion { found, min, max, .. } => {
            assert_eq!(found, ApiVersion::new(1, 2));
            assert_eq!(min, ApiVersion::CURRENT);
            assert_eq!(max, ApiVersion::CURRENT);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(loader.closes(), 1);
    assert_eq!(registry.valid_count(), 0);

    assert!(registry.load_library("current").is_ok());
}

#[test]
fn test_version_gate_disabled_by_default() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);

    reset_native_calls();
    let handle = registry.load_library("old").unwrap();
    // Library info is queried once during load.
    assert_eq!(native_calls(), 1);
    assert!(registry.is_valid(handle));
}

#[test]
fn test_resolver_sees_normalized_name() {
    struct Prefix(PathBuf);

    impl ResolveModulePath for Prefix {
        fn resolve_module_path(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }
    }

    let loader = StubLoader::new();
    let registry = Registry::builder()
        .loader(loader)
        .resolver(Prefix(PathBuf::from("/opt/neuroshare")))
        .suffix(".dll")
        .build();

    let handle = registry.load_library("nsNEV").unwrap();
    let slot = registry.slot_info(handle).unwrap();
    assert_eq!(slot.name, "nsNEV.dll");
    assert_eq!(slot.path, PathBuf::from("/opt/neuroshare/nsNEV.dll"));
    assert_eq!(
        registry.resolve("nsNEV.DLL"),
        (
            "nsNEV.DLL".to_string(),
            PathBuf::from("/opt/neuroshare/nsNEV.DLL")
        )
    );
}

#[test]
fn test_custom_capacity() {
    let loader = StubLoader::new();
    let registry = Registry::builder()
        .loader(loader)
        .resolver(LoaderSearch)
        .capacity(2)
        .build();

    registry.load_library("one").unwrap();
    registry.load_library("two").unwrap();
    assert!(matches!(
        registry.load_library("three"),
        Err(GlueError::RegistryFull { capacity: 2 })
    ));
    assert!(matches!(
        registry.close_library(DllHandle(3)),
        Err(GlueError::InvalidHandle(_))
    ));
}

#[test]
fn test_capacity_is_clamped() {
    let registry = Registry::builder()
        .loader(StubLoader::new())
        .resolver(LoaderSearch)
        .capacity(usize::MAX)
        .build();
    assert_eq!(registry.capacity(), MAX_CAPACITY);
}

#[test]
fn test_generations_distinguish_occupants() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);

    let first = registry.load_library("gen").unwrap();
    let g1 = registry.slot_info(first).unwrap().generation;
    registry.close_library(first).unwrap();

    let second = registry.load_library("gen").unwrap();
    assert_eq!(first, second);
    let g2 = registry.slot_info(second).unwrap().generation;
    assert_ne!(g1, g2);

    assert!(matches!(
        registry.close_generation(second, g1),
        Err(GlueError::InvalidHandle(_))
    ));
    assert!(registry.is_valid(second));
    registry.close_generation(second, g2).unwrap();
    assert!(!registry.is_valid(second));
}

#[test]
fn test_load_reports_occupant_generation() {
    let loader = StubLoader::new();
    let registry = stub_registry(&loader);

    let (handle, fresh) = registry.load_with_generation("gen").unwrap();
    assert_eq!(registry.slot_info(handle).unwrap().generation, fresh);

    let (shared, again) = registry.load_with_generation("gen.so").unwrap();
    assert_eq!(shared, handle);
    assert_eq!(again, fresh);
    assert_eq!(registry.slot_info(handle).unwrap().ref_count, 2);

    assert!(registry.load_with_generation("missing").is_err());
    assert_eq!(registry.valid_count(), 1);
}

#[test]
fn test_concurrent_load_and_close() {
    let loader = StubLoader::new();
    let registry = Arc::new(stub_registry(&loader));
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let workers: Vec<_> = (0..threads)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..200 {
                    let shared = registry.load_library("shared").unwrap();
                    let own = registry.load_library(&format!("own{}", t)).unwrap();
                    assert_ne!(shared, own);

                    let mut info = LibraryInfo::default();
                    assert_eq!(registry.get_library_info(own, &mut info), NsResult::OK);

                    registry.close_library(own).unwrap();
                    registry.close_library(shared).unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(registry.valid_count(), 0);
    assert_eq!(loader.opens(), loader.closes());
}

#[test]
fn test_glue_error_status() {
    assert_eq!(
        GlueError::InvalidHandle(DllHandle(4)).status(),
        NsResult::LIBERROR
    );
    assert_eq!(
        GlueError::NativeOperationFailed(NsResult::BADINDEX).status(),
        NsResult::BADINDEX
    );
    assert_eq!(
        GlueError::InvalidHandle(DllHandle(4)).to_string(),
        "invalid library handle 4"
    );
}

#[test]
fn test_function_table_binds_in_order() {
    struct Recording {
        seen: parking_lot::Mutex<Vec<String>>,
        symbols: HashMap<&'static str, usize>,
    }

    unsafe impl SymbolSource for Recording {
        fn symbol(&self, name: &str) -> Result<NonNull<c_void>, String> {
            self.seen.lock().push(name.to_string());
            self.symbols
                .get(name)
                .and_then(|&addr| NonNull::new(addr as *mut c_void))
                .ok_or_else(|| "absent".to_string())
        }
    }

    let source = Recording {
        seen: parking_lot::Mutex::new(Vec::new()),
        symbols: stub_symbols(),
    };
    unsafe { FunctionTable::bind(&source) }.unwrap();
    let expected: Vec<String> = Operation::ALL.iter().map(|op| op.symbol().to_string()).collect();
    assert_eq!(*source.seen.lock(), expected);

    let mut partial = stub_symbols();
    partial.remove("ns_GetAnalogInfo");
    let source = Recording {
        seen: parking_lot::Mutex::new(Vec::new()),
        symbols: partial,
    };
    let err = unsafe { FunctionTable::bind(&source) }.unwrap_err();
    assert_eq!(err.operation, Operation::GetAnalogInfo);
    // Resolution stops at the first failure.
    assert_eq!(source.seen.lock().len(), 8);
}
