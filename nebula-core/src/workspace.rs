//! A store bound to its persistence backend
//!
//! The workspace owns the [`ProjectStore`] and saves a full snapshot after
//! every mutation that succeeds.

use anyhow::Result;
use log::{debug, warn};
use std::path::Path;

use crate::db::{create_backend, BackendType, DatabaseBackend};
use crate::store::ProjectStore;

pub struct Workspace {
    store: ProjectStore,
    backend: Box<dyn DatabaseBackend>,
}

impl Workspace {
    /// Opens the store at `path`, choosing the backend by extension.
    /// An empty or missing store is seeded with example data and saved.
    pub fn open(path: &Path) -> Result<Self> {
        let backend = create_backend(path, None)?;
        Self::with_backend(backend)
    }

    /// Opens with an explicit backend type
    pub fn open_as(path: &Path, backend_type: BackendType) -> Result<Self> {
        let backend = create_backend(path, Some(backend_type))?;
        Self::with_backend(backend)
    }

    pub fn with_backend(backend: Box<dyn DatabaseBackend>) -> Result<Self> {
        let store = match backend.load()? {
            Some(snapshot) => ProjectStore::from_snapshot(snapshot),
            None => {
                debug!("no saved data at {:?}, seeding", backend.path());
                let store = ProjectStore::seeded();
                backend.save(&store.snapshot())?;
                store
            }
        };
        Ok(Self { store, backend })
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    pub fn backend(&self) -> &dyn DatabaseBackend {
        self.backend.as_ref()
    }

    pub fn path(&self) -> &Path {
        self.backend.path()
    }

    /// Runs a mutation and saves when it succeeds.
    ///
    /// A failed save is logged and does not undo the in-memory change; call
    /// [`Workspace::flush`] to surface persistence errors.
    pub fn apply<T, E, F>(&mut self, mutation: F) -> Result<T, E>
    where
        F: FnOnce(&mut ProjectStore) -> Result<T, E>,
    {
        let value = mutation(&mut self.store)?;
        if let Err(e) = self.backend.save(&self.store.snapshot()) {
            warn!("failed to save {:?}: {:#}", self.backend.path(), e);
        }
        Ok(value)
    }

    /// Saves the current state, propagating any error
    pub fn flush(&self) -> Result<()> {
        self.backend.save(&self.store.snapshot())
    }

    pub fn into_store(self) -> ProjectStore {
        self.store
    }
}
