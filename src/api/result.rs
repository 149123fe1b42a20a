//! Neuroshare Result Codes
//!
//! The closed set of status codes every Neuroshare entry point returns.
//! Values are part of the binary contract and must not change.

use std::fmt;

use crate::ffi::GlueError;

/// Status code returned by every Neuroshare operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NsResult(pub i32);

impl NsResult {
    /// Success
    pub const OK: NsResult = NsResult(0);
    /// Generic library error (also returned for an invalid library handle)
    pub const LIBERROR: NsResult = NsResult(-1);
    /// Library unable to open file type
    pub const TYPEERROR: NsResult = NsResult(-2);
    /// File access or read error
    pub const FILEERROR: NsResult = NsResult(-3);
    /// Invalid file handle passed to function
    pub const BADFILE: NsResult = NsResult(-4);
    /// Invalid or inappropriate entity identifier
    pub const BADENTITY: NsResult = NsResult(-5);
    /// Invalid source identifier
    pub const BADSOURCE: NsResult = NsResult(-6);
    /// Invalid entity index specified
    pub const BADINDEX: NsResult = NsResult(-7);

    /// Raw integer value
    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// Convert into a `Result`, keeping the native code verbatim on failure
    pub fn into_result(self) -> Result<(), GlueError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(GlueError::NativeOperationFailed(self))
        }
    }

    /// Symbolic name of a known code
    pub fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("ns_OK"),
            -1 => Some("ns_LIBERROR"),
            -2 => Some("ns_TYPEERROR"),
            -3 => Some("ns_FILEERROR"),
            -4 => Some("ns_BADFILE"),
            -5 => Some("ns_BADENTITY"),
            -6 => Some("ns_BADSOURCE"),
            -7 => Some("ns_BADINDEX"),
            _ => None,
        }
    }
}

impl From<i32> for NsResult {
    fn from(code: i32) -> Self {
        NsResult(code)
    }
}

impl From<NsResult> for i32 {
    fn from(result: NsResult) -> Self {
        result.0
    }
}

impl fmt::Display for NsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "unknown result code {}", self.0),
        }
    }
}
