//! Neuroshare ABI Records
//!
//! `#[repr(C)]` mirrors of the structures exchanged with a native
//! Neuroshare library (API revision 1.3). Text fields are fixed-size,
//! NUL-terminated byte arrays; use the accessor methods to read them.

use std::borrow::Cow;
use std::fmt;
use std::os::raw::c_char;

/// Library flag: debug build
pub const LIBRARY_DEBUG: u32 = 0x0001;
/// Library flag: modified build
pub const LIBRARY_MODIFIED: u32 = 0x0002;
/// Library flag: pre-release build
pub const LIBRARY_PRERELEASE: u32 = 0x0004;
/// Library flag: special build
pub const LIBRARY_SPECIALBUILD: u32 = 0x0008;
/// Library flag: safe to call from multiple threads
pub const LIBRARY_MULTITHREADED: u32 = 0x0010;

/// Maximum number of file descriptors a library can advertise
pub const MAX_FILE_DESCS: usize = 16;

/// Read a NUL-terminated text field
pub fn text_field(buf: &[c_char]) -> Cow<'_, str> {
    // SAFETY: c_char and u8 have identical size and alignment.
    let bytes = unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const u8, buf.len()) };
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
}

/// Write `text` into a fixed-size field, truncating and always terminating
pub fn set_text_field(buf: &mut [c_char], text: &str) {
    if buf.is_empty() {
        return;
    }
    let len = text.len().min(buf.len() - 1);
    for (dst, &src) in buf.iter_mut().zip(&text.as_bytes()[..len]) {
        *dst = src as c_char;
    }
    for dst in &mut buf[len..] {
        *dst = 0;
    }
}

macro_rules! zeroed_default {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Default for $ty {
                fn default() -> Self {
                    // SAFETY: plain-old-data record of integers, floats and
                    // byte arrays; all-zero is a valid empty value.
                    unsafe { std::mem::zeroed() }
                }
            }
        )*
    };
}

/// One file type a library can read
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FileDesc {
    pub description: [c_char; 32],
    pub extension: [c_char; 8],
    pub mac_codes: [c_char; 8],
    pub magic_code: [c_char; 16],
}

impl FileDesc {
    pub fn description(&self) -> Cow<'_, str> {
        text_field(&self.description)
    }

    pub fn extension(&self) -> Cow<'_, str> {
        text_field(&self.extension)
    }

    pub fn mac_codes(&self) -> Cow<'_, str> {
        text_field(&self.mac_codes)
    }

    pub fn magic_code(&self) -> Cow<'_, str> {
        text_field(&self.magic_code)
    }
}

/// `ns_LIBRARYINFO`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LibraryInfo {
    pub lib_version_maj: u32,
    pub lib_version_min: u32,
    pub api_version_maj: u32,
    pub api_version_min: u32,
    pub description: [c_char; 64],
    pub creator: [c_char; 64],
    pub time_year: u32,
    pub time_month: u32,
    pub time_day: u32,
    pub flags: u32,
    pub max_files: u32,
    pub file_desc_count: u32,
    pub file_desc: [FileDesc; MAX_FILE_DESCS],
}

impl LibraryInfo {
    pub fn description(&self) -> Cow<'_, str> {
        text_field(&self.description)
    }

    pub fn creator(&self) -> Cow<'_, str> {
        text_field(&self.creator)
    }

    /// API version packed as `(major << 8) | minor`
    pub fn api_version(&self) -> u16 {
        (((self.api_version_maj << 8) & 0xff00) | (self.api_version_min & 0x00ff)) as u16
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Advertised file descriptors, clamped to the array size
    pub fn file_descs(&self) -> &[FileDesc] {
        let count = (self.file_desc_count as usize).min(MAX_FILE_DESCS);
        &self.file_desc[..count]
    }
}

/// `ns_FILEINFO`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FileInfo {
    pub file_type: [c_char; 32],
    pub entity_count: u32,
    pub timestamp_resolution: f64,
    pub time_span: f64,
    pub app_name: [c_char; 64],
    pub time_year: u32,
    pub time_month: u32,
    pub time_day_of_week: u32,
    pub time_day: u32,
    pub time_hour: u32,
    pub time_min: u32,
    pub time_sec: u32,
    pub time_millisec: u32,
    pub file_comment: [c_char; 256],
}

impl FileInfo {
    pub fn file_type(&self) -> Cow<'_, str> {
        text_field(&self.file_type)
    }

    pub fn app_name(&self) -> Cow<'_, str> {
        text_field(&self.app_name)
    }

    pub fn file_comment(&self) -> Cow<'_, str> {
        text_field(&self.file_comment)
    }
}

/// `ns_ENTITYINFO`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EntityInfo {
    pub label: [c_char; 32],
    pub entity_type: u32,
    pub item_count: u32,
}

impl EntityInfo {
    pub fn label(&self) -> Cow<'_, str> {
        text_field(&self.label)
    }

    pub fn kind(&self) -> Option<EntityType> {
        EntityType::try_from(self.entity_type).ok()
    }
}

/// `ns_EVENTINFO`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EventInfo {
    pub event_type: u32,
    pub min_data_length: u32,
    pub max_data_length: u32,
    pub csv_desc: [c_char; 128],
}

impl EventInfo {
    pub fn csv_desc(&self) -> Cow<'_, str> {
        text_field(&self.csv_desc)
    }

    pub fn kind(&self) -> Option<EventType> {
        EventType::try_from(self.event_type).ok()
    }
}

/// `ns_ANALOGINFO`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AnalogInfo {
    pub sample_rate: f64,
    pub min_val: f64,
    pub max_val: f64,
    pub units: [c_char; 16],
    pub resolution: f64,
    pub location_x: f64,
    pub location_y: f64,
    pub location_z: f64,
    pub location_user: f64,
    pub high_freq_corner: f64,
    pub high_freq_order: u32,
    pub high_filter_type: [c_char; 16],
    pub low_freq_corner: f64,
    pub low_freq_order: u32,
    pub low_filter_type: [c_char; 16],
    pub electrode_info: [c_char; 128],
}

impl AnalogInfo {
    pub fn units(&self) -> Cow<'_, str> {
        text_field(&self.units)
    }

    pub fn electrode_info(&self) -> Cow<'_, str> {
        text_field(&self.electrode_info)
    }
}

/// `ns_SEGMENTINFO`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SegmentInfo {
    pub source_count: u32,
    pub min_sample_count: u32,
    pub max_sample_count: u32,
    pub sample_rate: f64,
    pub units: [c_char; 32],
}

impl SegmentInfo {
    pub fn units(&self) -> Cow<'_, str> {
        text_field(&self.units)
    }
}

/// `ns_SEGSOURCEINFO`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SegSourceInfo {
    pub min_val: f64,
    pub max_val: f64,
    pub resolution: f64,
    pub sub_sample_shift: f64,
    pub location_x: f64,
    pub location_y: f64,
    pub location_z: f64,
    pub location_user: f64,
    pub high_freq_corner: f64,
    pub high_freq_order: u32,
    pub high_filter_type: [c_char; 16],
    pub low_freq_corner: f64,
    pub low_freq_order: u32,
    pub low_filter_type: [c_char; 16],
    pub electrode_info: [c_char; 128],
}

impl SegSourceInfo {
    pub fn electrode_info(&self) -> Cow<'_, str> {
        text_field(&self.electrode_info)
    }
}

/// `ns_NEURALINFO`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NeuralInfo {
    pub source_entity_id: u32,
    pub source_unit_id: u32,
    pub electrode_info: [c_char; 128],
}

impl NeuralInfo {
    pub fn electrode_info(&self) -> Cow<'_, str> {
        text_field(&self.electrode_info)
    }
}

zeroed_default!(
    FileDesc,
    LibraryInfo,
    FileInfo,
    EntityInfo,
    EventInfo,
    AnalogInfo,
    SegmentInfo,
    SegSourceInfo,
    NeuralInfo,
);

/// Error for raw values outside a closed enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownValue(pub i64);

impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value {}", self.0)
    }
}

impl std::error::Error for UnknownValue {}

/// Kind of data an entity carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EntityType {
    Unknown = 0,
    Event = 1,
    Analog = 2,
    Segment = 3,
    Neural = 4,
}

impl TryFrom<u32> for EntityType {
    type Error = UnknownValue;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EntityType::Unknown),
            1 => Ok(EntityType::Event),
            2 => Ok(EntityType::Analog),
            3 => Ok(EntityType::Segment),
            4 => Ok(EntityType::Neural),
            other => Err(UnknownValue(other as i64)),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Unknown => write!(f, "unknown"),
            EntityType::Event => write!(f, "event"),
            EntityType::Analog => write!(f, "analog"),
            EntityType::Segment => write!(f, "segment"),
            EntityType::Neural => write!(f, "neural"),
        }
    }
}

/// Payload type of an event entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EventType {
    Text = 0,
    Csv = 1,
    Byte = 2,
    Word = 3,
    Dword = 4,
}

impl TryFrom<u32> for EventType {
    type Error = UnknownValue;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventType::Text),
            1 => Ok(EventType::Csv),
            2 => Ok(EventType::Byte),
            3 => Ok(EventType::Word),
            4 => Ok(EventType::Dword),
            other => Err(UnknownValue(other as i64)),
        }
    }
}

/// Direction for `get_index_by_time`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TimeSearch {
    /// Last index at or before the time
    Before = -1,
    /// Index closest to the time
    Closest = 0,
    /// First index at or after the time
    After = 1,
}

impl TryFrom<i32> for TimeSearch {
    type Error = UnknownValue;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(TimeSearch::Before),
            0 => Ok(TimeSearch::Closest),
            1 => Ok(TimeSearch::After),
            other => Err(UnknownValue(other as i64)),
        }
    }
}
