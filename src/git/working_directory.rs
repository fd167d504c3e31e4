use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, error, info};
use thiserror::Error;

use super::{
    cache::{CacheError, ObjectCache},
    command::GitCommand,
    executor::{ExecutionError, Executor},
};

/// Name of the remote, inside every working directory, that points at the
/// shared object cache.
pub const CACHE_REMOTE: &str = "cache";

const METADATA_DIR: &str = ".git";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to refresh the object cache for {remote}: {source}")]
    Cache { remote: String, source: CacheError },
    #[error("Cannot resolve {reference} to a commit in object cache {cache_path}: {source}")]
    Resolution {
        reference: String,
        cache_path: String,
        source: ExecutionError,
    },
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Cloned,
    Fetched,
}

/// Outcome of a successful [`WorkingDirectory::sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synced {
    pub action: SyncAction,
    pub commit: String,
}

/// A checkout of one `(remote, reference)` pair at `basedir/dirname`, kept in
/// step with the remote through a shared object cache.
pub struct WorkingDirectory {
    reference: String,
    remote: String,
    basedir: PathBuf,
    dirname: String,
    full_path: PathBuf,
    cache: Arc<dyn ObjectCache>,
    executor: Arc<dyn Executor>,
}

impl WorkingDirectory {
    /// `dirname` defaults to `reference`.
    pub fn new(
        reference: impl Into<String>,
        remote: impl Into<String>,
        basedir: impl Into<PathBuf>,
        dirname: Option<String>,
        cache: Arc<dyn ObjectCache>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let reference = reference.into();
        let basedir = basedir.into();
        let dirname = dirname.unwrap_or_else(|| reference.clone());
        let full_path = basedir.join(&dirname);
        WorkingDirectory {
            reference,
            remote: remote.into(),
            basedir,
            dirname,
            full_path,
            cache,
            executor,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn dirname(&self) -> &str {
        &self.dirname
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// Refreshes the object cache, clones or fetches, and hard-resets the
    /// working tree to the commit `reference` resolves to.
    ///
    /// Any failure aborts the remaining steps. Nothing is retried.
    pub fn sync(&self) -> Result<Synced, SyncError> {
        self.cache.sync().map_err(|source| SyncError::Cache {
            remote: self.remote.clone(),
            source,
        })?;

        let action = if self.is_cloned() {
            self.fetch()?;
            SyncAction::Fetched
        } else {
            self.clone_repository()?;
            SyncAction::Cloned
        };

        let commit = self.reset()?;
        info!(
            "{} is at {} ({}, {:?})",
            self.full_path.display(),
            commit,
            self.reference,
            action
        );
        Ok(Synced { action, commit })
    }

    /// Whether a git metadata directory exists at the checkout path. Read from
    /// disk on every call.
    pub fn is_cloned(&self) -> bool {
        self.full_path.join(METADATA_DIR).is_dir()
    }

    /// Resolves `reference` against the object cache, not the working tree.
    pub fn resolve_commit(&self) -> Result<String, SyncError> {
        resolve_commit(
            self.executor.as_ref(),
            &self.cache.path(),
            &self.reference,
        )
    }

    /// Commit currently checked out at the checkout path.
    pub fn head(&self) -> Result<String, SyncError> {
        let output = self.executor.run(
            &GitCommand::new("rev-parse")
                .current_dir(&self.full_path)
                .arg("HEAD"),
        )?;
        Ok(output.trim_end().to_string())
    }

    fn clone_repository(&self) -> Result<(), SyncError> {
        let cache_path = self.cache.path();
        debug!(
            "Cloning {} into {} with reference {}",
            self.remote,
            self.full_path.display(),
            cache_path.display()
        );
        std::fs::create_dir_all(&self.basedir)?;

        self.executor.run(
            &GitCommand::new("clone")
                .arg("--reference")
                .arg(&cache_path)
                .arg("--")
                .arg(&self.remote)
                .arg(&self.full_path),
        )?;
        self.executor.run(
            &GitCommand::new("remote")
                .current_dir(&self.full_path)
                .args(["add", CACHE_REMOTE])
                .arg(&cache_path),
        )?;
        Ok(())
    }

    fn fetch(&self) -> Result<(), SyncError> {
        // The cache may have moved since the clone was made.
        let cache_path = self.cache.path();
        debug!(
            "Fetching {} from {}",
            self.full_path.display(),
            cache_path.display()
        );

        // A clone interrupted before `remote add` has no cache remote yet.
        let action = if self.has_cache_remote()? {
            "set-url"
        } else {
            "add"
        };
        self.executor.run(
            &GitCommand::new("remote")
                .current_dir(&self.full_path)
                .args([action, CACHE_REMOTE])
                .arg(&cache_path),
        )?;
        self.executor.run(
            &GitCommand::new("fetch")
                .current_dir(&self.full_path)
                .args(["--prune", CACHE_REMOTE]),
        )?;
        Ok(())
    }

    fn has_cache_remote(&self) -> Result<bool, SyncError> {
        let remotes = self
            .executor
            .run(&GitCommand::new("remote").current_dir(&self.full_path))?;
        Ok(remotes.lines().any(|name| name.trim() == CACHE_REMOTE))
    }

    fn reset(&self) -> Result<String, SyncError> {
        let commit = self.resolve_commit().map_err(|e| {
            error!(
                "Unable to reset {}: {} does not resolve to a commit: {}",
                self.full_path.display(),
                self.reference,
                e
            );
            e
        })?;

        self.executor
            .run(
                &GitCommand::new("reset")
                    .current_dir(&self.full_path)
                    .arg("--hard")
                    .arg(&commit),
            )
            .map_err(|e| {
                error!(
                    "Unable to reset {} to {} ({}): {}",
                    self.full_path.display(),
                    commit,
                    self.reference,
                    e
                );
                e
            })?;
        Ok(commit)
    }
}

/// Resolves `reference` to a full commit id inside the store at
/// `cache_path`. Annotated tags are peeled; anything that does not end at a
/// commit is an error.
pub fn resolve_commit(
    executor: &dyn Executor,
    cache_path: &Path,
    reference: &str,
) -> Result<String, SyncError> {
    let command = GitCommand::new("rev-parse")
        .git_dir(cache_path)
        .args(["--verify", "--end-of-options"])
        .arg(format!("{reference}^{{commit}}"));

    match executor.run(&command) {
        Ok(output) => Ok(output.trim_end().to_string()),
        Err(source) => {
            error!(
                "Unable to resolve {} in object cache {}",
                reference,
                cache_path.display()
            );
            Err(SyncError::Resolution {
                reference: reference.to_string(),
                cache_path: cache_path.to_string_lossy().to_string(),
                source,
            })
        }
    }
}
