use std::{error::Error, path::PathBuf, sync::Arc};

use log::info;

use crate::git::{
    cache::ObjectCache,
    executor::Executor,
    registry::CacheRegistry,
    working_directory::{self, Synced, WorkingDirectory},
};

mod builder;

pub use builder::MirrorSyncBuilder;

pub struct MirrorSync {
    registry: CacheRegistry,
    executor: Arc<dyn Executor>,
}

impl MirrorSync {
    pub fn builder() -> MirrorSyncBuilder {
        MirrorSyncBuilder::default()
    }

    /// Binds `reference` of `remote` to `basedir/dirname`, sharing the object
    /// cache with every other working directory of the same remote.
    pub fn working_directory(
        &self,
        reference: &str,
        remote: &str,
        basedir: impl Into<PathBuf>,
        dirname: Option<String>,
    ) -> Result<WorkingDirectory, Box<dyn Error>> {
        let cache: Arc<dyn ObjectCache> = self.registry.cache_for(remote)?;
        Ok(WorkingDirectory::new(
            reference,
            remote,
            basedir,
            dirname,
            cache,
            self.executor.clone(),
        ))
    }

    /// Brings `basedir/dirname` to the commit `reference` currently resolves to.
    pub fn sync(
        &self,
        reference: &str,
        remote: &str,
        basedir: impl Into<PathBuf>,
        dirname: Option<String>,
    ) -> Result<Synced, Box<dyn Error>> {
        let working_directory = self.working_directory(reference, remote, basedir, dirname)?;
        Ok(working_directory.sync()?)
    }

    /// Refreshes the object cache of `remote` and resolves `reference` in it.
    pub fn resolve(&self, remote: &str, reference: &str) -> Result<String, Box<dyn Error>> {
        let cache = self.registry.cache_for(remote)?;
        cache.sync()?;
        let commit =
            working_directory::resolve_commit(self.executor.as_ref(), &cache.path(), reference)?;
        Ok(commit)
    }

    /// Deletes every object cache. Working directories borrowing objects from
    /// them will need to be cloned again.
    pub fn clear_cache(&self) -> Result<(), Box<dyn Error>> {
        info!("Clearing cache {}.", self.registry.location().display());
        self.registry.clear()?;
        Ok(())
    }
}
