//! Owned Library Selection
//!
//! A [`LibraryLease`] owns one reference in a [`Registry`] and gives it back
//! exactly once, on drop. A [`Session`] holds the library a host currently
//! works with and swaps it out on request.

use std::sync::Arc;

use crate::ffi::{BoundLibrary, DllHandle, GlueError, Registry, SlotInfo};

/// One owned reference to a loaded library
#[derive(Debug)]
pub struct LibraryLease {
    registry: Arc<Registry>,
    handle: DllHandle,
    generation: u64,
    released: bool,
}

impl LibraryLease {
    /// Load `name` and take ownership of the resulting reference.
    pub fn acquire(registry: &Arc<Registry>, name: &str) -> Result<Self, GlueError> {
        let (handle, generation) = registry.load_with_generation(name)?;
        Ok(Self {
            registry: Arc::clone(registry),
            handle,
            generation,
            released: false,
        })
    }

    pub fn handle(&self) -> DllHandle {
        self.handle
    }

    /// The facade, scoped to this library
    pub fn api(&self) -> BoundLibrary<'_> {
        self.registry.bind(self.handle)
    }

    pub fn slot(&self) -> Option<SlotInfo> {
        self.registry
            .slot_info(self.handle)
            .filter(|slot| slot.generation == self.generation)
    }

    /// Give the reference back now, reporting failure
    pub fn release(mut self) -> Result<(), GlueError> {
        self.released = true;
        self.registry.close_generation(self.handle, self.generation)
    }
}

impl Drop for LibraryLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // An ambient close_library on our handle may already have freed the
        // slot; the generation check keeps us from closing a newer occupant.
        if let Err(e) = self.registry.close_generation(self.handle, self.generation) {
            tracing::warn!(handle = %self.handle, error = %e, "library lease already released");
        }
    }
}

/// The library a host is currently working with
#[derive(Debug)]
pub struct Session {
    registry: Arc<Registry>,
    current: Option<LibraryLease>,
}

impl Session {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            current: None,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Select a new library.
    ///
    /// The previous one is released first, so a failed load leaves nothing
    /// selected.
    pub fn set_library(&mut self, name: &str) -> Result<&LibraryLease, GlueError> {
        self.clear();
        let lease = LibraryLease::acquire(&self.registry, name)?;
        tracing::debug!(name, handle = %lease.handle(), "selected library");
        Ok(self.current.insert(lease))
    }

    pub fn current(&self) -> Option<&LibraryLease> {
        self.current.as_ref()
    }

    /// Release the current library, if any
    pub fn clear(&mut self) {
        self.current = None;
    }
}
