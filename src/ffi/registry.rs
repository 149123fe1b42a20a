//! Library Registry
//!
//! Fixed-capacity table of loaded Neuroshare libraries, addressed by small
//! 1-based numeric handles. Loading the same normalized name twice shares
//! one native module and bumps its reference count; the module is closed
//! when the count returns to zero and the slot becomes reusable.
//!
//! A single mutex guards the table, so load, close and handle validation
//! are each atomic with respect to one another.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use super::loader::{DlopenLoader, ModuleLoader, NativeModule};
use super::platform::{normalize_name, ResolveModulePath, SearchStrategy, NATIVE_SUFFIX};
use super::version::{ApiVersion, VersionPolicy};
use crate::api::{LibraryInfo, NeuroshareApi, NsResult};

/// Slot count of the reference glue
pub const DEFAULT_CAPACITY: usize = 32;

/// Largest table a registry will allocate
pub const MAX_CAPACITY: usize = 4096;

/// Errors raised by the glue itself
#[derive(Debug, Clone, Error)]
pub enum GlueError {
    #[error("invalid library handle {0}")]
    InvalidHandle(DllHandle),

    #[error("library table full ({capacity} slots in use)")]
    RegistryFull { capacity: usize },

    #[error("unable to load {name}: {reason}")]
    ModuleNotFound { name: String, reason: String },

    #[error("unable to bind {name} {symbol} function: {reason}")]
    SymbolResolutionFailed {
        name: String,
        symbol: &'static str,
        reason: String,
    },

    #[error("incompatible library {name}: API {found}, glue accepts {min} through {max}")]
    IncompatibleVersion {
        name: String,
        found: ApiVersion,
        min: ApiVersion,
        max: ApiVersion,
    },

    #[error("invalid library name {0:?}")]
    InvalidName(String),

    #[error("native operation failed: {0}")]
    NativeOperationFailed(NsResult),
}

impl GlueError {
    /// Status code a C caller of the glue would see
    pub fn status(&self) -> NsResult {
        match self {
            GlueError::NativeOperationFailed(code) => *code,
            _ => NsResult::LIBERROR,
        }
    }
}

/// Opaque library handle. `0` means "no library".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DllHandle(pub u32);

impl DllHandle {
    pub const NONE: DllHandle = DllHandle(0);

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Table index, if the handle is in range
    fn index(self, capacity: usize) -> Option<usize> {
        let n = self.0 as usize;
        if n >= 1 && n <= capacity {
            Some(n - 1)
        } else {
            None
        }
    }

    fn from_index(index: usize) -> Self {
        DllHandle(index as u32 + 1)
    }
}

impl From<u32> for DllHandle {
    fn from(raw: u32) -> Self {
        DllHandle(raw)
    }
}

impl fmt::Display for DllHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of one occupied slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub handle: DllHandle,
    /// Normalized identifier the slot is shared under
    pub name: String,
    /// Path handed to the loader
    pub path: PathBuf,
    pub ref_count: usize,
    /// Distinguishes successive occupants of the same slot
    pub generation: u64,
}

struct Slot {
    name: String,
    path: PathBuf,
    ref_count: usize,
    generation: u64,
    module: Arc<NativeModule>,
}

impl Slot {
    fn info(&self, index: usize) -> SlotInfo {
        SlotInfo {
            handle: DllHandle::from_index(index),
            name: self.name.clone(),
            path: self.path.clone(),
            ref_count: self.ref_count,
            generation: self.generation,
        }
    }
}

/// Builder for [`Registry`]
pub struct RegistryBuilder {
    capacity: usize,
    loader: Arc<dyn ModuleLoader>,
    resolver: Box<dyn ResolveModulePath>,
    suffix: String,
    version_policy: VersionPolicy,
}

impl RegistryBuilder {
    fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            loader: Arc::new(DlopenLoader),
            resolver: SearchStrategy::Auto.resolver(),
            suffix: NATIVE_SUFFIX.to_string(),
            version_policy: VersionPolicy::Disabled,
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    pub fn resolver(mut self, resolver: impl ResolveModulePath + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn search(mut self, strategy: SearchStrategy) -> Self {
        self.resolver = strategy.resolver();
        self
    }

    /// Shared-library suffix appended to bare names
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn version_policy(mut self, policy: VersionPolicy) -> Self {
        self.version_policy = policy;
        self
    }

    pub fn build(self) -> Registry {
        let capacity = self.capacity.min(MAX_CAPACITY);
        if capacity < self.capacity {
            tracing::warn!(
                requested = self.capacity,
                capacity,
                "registry capacity clamped"
            );
        }
        Registry {
            slots: Mutex::new((0..capacity).map(|_| None).collect()),
            loader: self.loader,
            resolver: self.resolver,
            suffix: self.suffix,
            version_policy: self.version_policy,
            generations: AtomicU64::new(1),
        }
    }
}

/// Registry of loaded Neuroshare libraries
pub struct Registry {
    slots: Mutex<Vec<Option<Slot>>>,
    loader: Arc<dyn ModuleLoader>,
    resolver: Box<dyn ResolveModulePath>,
    suffix: String,
    version_policy: VersionPolicy,
    generations: AtomicU64,
}

impl Registry {
    /// Registry with the reference capacity and the system loader
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Normalized name and resolved path for an identifier, without loading
    pub fn resolve(&self, name: &str) -> (String, PathBuf) {
        let normalized = normalize_name(name, &self.suffix);
        let path = self.resolver.resolve_module_path(&normalized);
        (normalized, path)
    }

    /// Load a library, or share an already-loaded one with the same name.
    pub fn load_library(&self, name: &str) -> Result<DllHandle, GlueError> {
        self.load_with_generation(name).map(|(handle, _)| handle)
    }

    /// [`load_library`](Self::load_library), also returning the generation
    /// of the occupant the handle was issued for
    pub(crate) fn load_with_generation(&self, name: &str) -> Result<(DllHandle, u64), GlueError> {
        if name.is_empty() || name.contains('\0') {
            return Err(GlueError::InvalidName(name.to_string()));
        }
        let normalized = normalize_name(name, &self.suffix);

        let mut slots = self.slots.lock();

        if let Some((index, slot)) = slots
            .iter_mut()
            .enumerate()
            .find_map(|(i, s)| s.as_mut().filter(|s| s.name == normalized).map(|s| (i, s)))
        {
            slot.ref_count += 1;
            tracing::debug!(
                name = %normalized,
                handle = index + 1,
                ref_count = slot.ref_count,
                "sharing loaded library"
            );
            return Ok((DllHandle::from_index(index), slot.generation));
        }

        let Some(index) = slots.iter().position(Option::is_none) else {
            tracing::warn!(name = %normalized, capacity = slots.len(), "library table full");
            return Err(GlueError::RegistryFull {
                capacity: slots.len(),
            });
        };

        let path = self.resolver.resolve_module_path(&normalized);
        let source = self.loader.open(&path).map_err(|reason| {
            tracing::error!(name = %normalized, path = %path.display(), %reason, "unable to load library");
            GlueError::ModuleNotFound {
                name: normalized.clone(),
                reason,
            }
        })?;

        // Safety: `ModuleLoader` implementors guarantee the 1.3 signatures.
        let module = unsafe { NativeModule::bind(normalized.clone(), source) }.map_err(|e| {
            tracing::error!(
                name = %normalized,
                symbol = e.operation.symbol(),
                reason = %e.reason,
                "unable to bind library function"
            );
            GlueError::SymbolResolutionFailed {
                name: normalized.clone(),
                symbol: e.operation.symbol(),
                reason: e.reason,
            }
        })?;

        self.check_version(&module)?;

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        tracing::info!(name = %normalized, path = %path.display(), handle = index + 1, "loaded library");
        slots[index] = Some(Slot {
            name: normalized,
            path,
            ref_count: 1,
            generation,
            module: Arc::new(module),
        });

        Ok((DllHandle::from_index(index), generation))
    }

    fn check_version(&self, module: &NativeModule) -> Result<(), GlueError> {
        let mut info = LibraryInfo::default();
        let result = module.get_library_info(&mut info);
        if !result.is_ok() {
            tracing::warn!(name = module.name(), %result, "library info unavailable");
        }

        let found = ApiVersion::from_info(&info);
        tracing::debug!(
            name = module.name(),
            api = %found,
            lib_version = format_args!("{}.{:02}", info.lib_version_maj, info.lib_version_min),
            "library reported version"
        );

        match self.version_policy {
            VersionPolicy::Range { min, max } if !self.version_policy.accepts(found) => {
                tracing::error!(name = module.name(), api = %found, %min, %max, "incompatible library version");
                Err(GlueError::IncompatibleVersion {
                    name: module.name().to_string(),
                    found,
                    min,
                    max,
                })
            }
            _ => Ok(()),
        }
    }

    /// Drop one reference; the module is closed when none remain.
    pub fn close_library(&self, handle: DllHandle) -> Result<(), GlueError> {
        self.release(handle, None)
    }

    /// Close only if the slot still holds the occupant `generation` refers to
    pub(crate) fn close_generation(
        &self,
        handle: DllHandle,
        generation: u64,
    ) -> Result<(), GlueError> {
        self.release(handle, Some(generation))
    }

    fn release(&self, handle: DllHandle, generation: Option<u64>) -> Result<(), GlueError> {
        let released = {
            let mut slots = self.slots.lock();
            let index = handle
                .index(slots.len())
                .ok_or(GlueError::InvalidHandle(handle))?;
            let entry = &mut slots[index];
            let slot = match entry.as_mut() {
                Some(slot) if generation.map_or(true, |g| g == slot.generation) => slot,
                _ => return Err(GlueError::InvalidHandle(handle)),
            };

            slot.ref_count -= 1;
            if slot.ref_count > 0 {
                tracing::debug!(%handle, ref_count = slot.ref_count, "released library reference");
                return Ok(());
            }
            entry.take()
        };

        if let Some(slot) = released {
            tracing::info!(name = %slot.name, %handle, "unloaded library");
        }
        Ok(())
    }

    /// The module behind a valid handle
    pub fn module(&self, handle: DllHandle) -> Result<Arc<NativeModule>, GlueError> {
        let slots = self.slots.lock();
        handle
            .index(slots.len())
            .and_then(|i| slots[i].as_ref())
            .map(|slot| Arc::clone(&slot.module))
            .ok_or(GlueError::InvalidHandle(handle))
    }

    pub fn is_valid(&self, handle: DllHandle) -> bool {
        self.module(handle).is_ok()
    }

    pub fn slot_info(&self, handle: DllHandle) -> Option<SlotInfo> {
        let slots = self.slots.lock();
        let index = handle.index(slots.len())?;
        slots[index].as_ref().map(|slot| slot.info(index))
    }

    /// Every occupied slot, in handle order
    pub fn loaded(&self) -> Vec<SlotInfo> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|slot| slot.info(i)))
            .collect()
    }

    pub fn valid_count(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("capacity", &self.capacity())
            .field("loaded", &self.loaded())
            .field("suffix", &self.suffix)
            .field("version_policy", &self.version_policy)
            .finish_non_exhaustive()
    }
}
