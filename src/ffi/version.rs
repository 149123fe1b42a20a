//! API Version Gate
//!
//! Libraries report their API revision through `ns_GetLibraryInfo`. The
//! gate is off by default: every revision is accepted unless a range is
//! configured.

use std::fmt;
use std::str::FromStr;

use crate::api::LibraryInfo;

/// API revision packed the way the glue compares it: `(major << 8) | minor`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion(pub u16);

impl ApiVersion {
    /// Revision this glue was written against (1.03)
    pub const CURRENT: ApiVersion = ApiVersion(0x0103);

    pub fn new(major: u8, minor: u8) -> Self {
        ApiVersion(((major as u16) << 8) | minor as u16)
    }

    pub fn major(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn minor(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub fn from_info(info: &LibraryInfo) -> Self {
        ApiVersion(info.api_version())
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{:02}", self.major(), self.minor())
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    /// Parse `"1.3"` or `"1.03"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('v');
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| format!("expected MAJOR.MINOR, got '{}'", s))?;
        let major = major
            .parse::<u8>()
            .map_err(|e| format!("bad major version '{}': {}", major, e))?;
        let minor = minor
            .parse::<u8>()
            .map_err(|e| format!("bad minor version '{}': {}", minor, e))?;
        Ok(ApiVersion::new(major, minor))
    }
}

/// Whether and how to reject libraries by reported API revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    /// Accept every library
    #[default]
    Disabled,
    /// Accept `min..=max` only
    Range { min: ApiVersion, max: ApiVersion },
}

impl VersionPolicy {
    /// The range the glue itself supports
    pub fn current() -> Self {
        VersionPolicy::Range {
            min: ApiVersion::CURRENT,
            max: ApiVersion::CURRENT,
        }
    }

    pub fn accepts(&self, version: ApiVersion) -> bool {
        match self {
            VersionPolicy::Disabled => true,
            VersionPolicy::Range { min, max } => *min <= version && version <= *max,
        }
    }
}
