//! Platform Resolution
//!
//! Turns a library identifier into something the dynamic loader can open.
//! Windows and macOS loaders already search the application directory, so
//! their strategy is the identity. Other Unix loaders do not, so the
//! binary directory and then the working directory are searched first.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Shared-library suffix for this platform (`.so`, `.dylib`, `.dll`)
pub const NATIVE_SUFFIX: &str = std::env::consts::DLL_SUFFIX;

/// Append `suffix` unless `name` already ends with it (ASCII case-insensitive)
pub fn normalize_name(name: &str, suffix: &str) -> String {
    let bytes = name.as_bytes();
    let has_suffix = bytes.len() >= suffix.len()
        && bytes[bytes.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes());
    if has_suffix {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

/// Host filesystem queries used during resolution
pub trait HostFs: Send + Sync {
    /// Whether `path` names a file that can be opened for reading
    fn is_readable(&self, path: &Path) -> bool;

    /// Directory holding the running executable
    fn executable_dir(&self) -> Option<PathBuf>;

    /// Current working directory
    fn current_dir(&self) -> Option<PathBuf>;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFs;

impl HostFs for SystemFs {
    fn is_readable(&self, path: &Path) -> bool {
        path.is_file() && File::open(path).is_ok()
    }

    fn executable_dir(&self) -> Option<PathBuf> {
        let exe = std::env::current_exe().ok()?;
        match exe.parent() {
            Some(dir) if dir.as_os_str().is_empty() => Some(PathBuf::from("/")),
            Some(dir) => Some(dir.to_path_buf()),
            None => Some(PathBuf::from("/")),
        }
    }

    fn current_dir(&self) -> Option<PathBuf> {
        std::env::current_dir().ok()
    }
}

/// Strategy for locating a module file before it is opened
pub trait ResolveModulePath: Send + Sync {
    /// Map a normalized identifier to the path handed to the loader
    fn resolve_module_path(&self, name: &str) -> PathBuf;
}

/// Leave the name alone; the platform loader already searches well
#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderSearch;

impl ResolveModulePath for LoaderSearch {
    fn resolve_module_path(&self, name: &str) -> PathBuf {
        PathBuf::from(name)
    }
}

/// Search the executable directory, then the working directory.
///
/// Absolute names are returned untouched. If no candidate is readable the
/// name is returned unchanged and the loader's own search (for example
/// `LD_LIBRARY_PATH`) gets the final say.
#[derive(Debug, Clone, Default)]
pub struct ExecutableDirSearch<F = SystemFs> {
    fs: F,
}

impl ExecutableDirSearch<SystemFs> {
    pub fn new() -> Self {
        Self { fs: SystemFs }
    }
}

impl<F: HostFs> ExecutableDirSearch<F> {
    pub fn with_fs(fs: F) -> Self {
        Self { fs }
    }

    fn readable_in(&self, dir: &Path, name: &str) -> Option<PathBuf> {
        let candidate = dir.join(name);
        if self.fs.is_readable(&candidate) {
            Some(candidate)
        } else {
            None
        }
    }
}

impl<F: HostFs> ResolveModulePath for ExecutableDirSearch<F> {
    fn resolve_module_path(&self, name: &str) -> PathBuf {
        if Path::new(name).is_absolute() {
            return PathBuf::from(name);
        }

        let found = self
            .fs
            .executable_dir()
            .and_then(|dir| self.readable_in(&dir, name))
            .or_else(|| self.fs.current_dir().and_then(|dir| self.readable_in(&dir, name)));

        match found {
            Some(path) => {
                tracing::debug!(name, path = %path.display(), "resolved module path");
                path
            }
            None => PathBuf::from(name),
        }
    }
}

/// Which resolution strategy to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStrategy {
    /// Pick per platform
    #[default]
    Auto,
    /// Identity; defer entirely to the loader
    Loader,
    /// Executable directory, then working directory
    ExecutableDir,
}

impl SearchStrategy {
    /// Concrete strategy for the platform this crate was built for
    pub fn for_current_platform() -> Self {
        if cfg!(any(windows, target_os = "macos", target_os = "ios")) {
            SearchStrategy::Loader
        } else {
            SearchStrategy::ExecutableDir
        }
    }

    pub fn resolver(self) -> Box<dyn ResolveModulePath> {
        match self {
            SearchStrategy::Auto => Self::for_current_platform().resolver(),
            SearchStrategy::Loader => Box::new(LoaderSearch),
            SearchStrategy::ExecutableDir => Box::new(ExecutableDirSearch::new()),
        }
    }
}
