use std::{env, error::Error, path::PathBuf, sync::Arc, time::Duration};

use home::home_dir;

use crate::{
    git::{executor::GitCli, registry::CacheRegistry},
    MirrorSync,
};

#[derive(Default)]
pub struct MirrorSyncBuilder {
    cache_directory_path: Option<PathBuf>,
    git_binary: Option<PathBuf>,
    cache_ttl: Option<Duration>,
}

impl MirrorSyncBuilder {
    /// Location of the shared object caches. Relative paths are resolved
    /// against the current directory.
    ///
    /// Defaults to `$HOME/.mirrorsync/cache`.
    pub fn cache_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_directory_path = Some(path.into());
        self
    }

    /// Git executable used for working directory operations.
    ///
    /// Defaults to `git` from `PATH`.
    pub fn git_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.git_binary = Some(path.into());
        self
    }

    /// Skip refreshing an object cache that was fetched less than `ttl` ago.
    ///
    /// By default every sync refreshes the cache.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn try_build(self) -> Result<MirrorSync, Box<dyn Error>> {
        let Self {
            cache_directory_path,
            git_binary,
            cache_ttl,
        } = self;

        let cache_directory = match cache_directory_path {
            Some(path) => path,
            None => default_cache_directory()?,
        };
        // The store path ends up in alternates files, so it must not depend on
        // the directory git runs in.
        let cache_directory = env::current_dir()?.join(cache_directory);

        let registry = CacheRegistry::new(cache_directory, cache_ttl)?;
        let executor = match git_binary {
            Some(binary) => GitCli::new(binary),
            None => GitCli::default(),
        };

        Ok(MirrorSync {
            registry,
            executor: Arc::new(executor),
        })
    }
}

fn default_cache_directory() -> Result<PathBuf, Box<dyn Error>> {
    let mut cache_directory =
        home_dir().ok_or("Could not find home dir. Please define $HOME env variable.")?;
    cache_directory.push(".mirrorsync/cache");
    Ok(cache_directory)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn builds_with_explicit_cache_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");

        let mirrorsync = MirrorSync::builder()
            .cache_directory(&cache)
            .cache_ttl(Duration::from_secs(60))
            .try_build()
            .unwrap();

        assert!(cache.is_dir());
        let wd = mirrorsync
            .working_directory("main", "https://example.com/org/repo.git", dir.path(), None)
            .unwrap();
        assert_eq!(wd.full_path(), dir.path().join("main"));
    }

    #[test]
    fn bad_remote_is_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let mirrorsync = MirrorSync::builder()
            .cache_directory(dir.path().join("cache"))
            .try_build()
            .unwrap();

        assert!(mirrorsync
            .working_directory("main", "   ", dir.path(), None)
            .is_err());
    }

    #[test]
    fn clear_cache_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let mirrorsync = MirrorSync::builder()
            .cache_directory(&cache)
            .try_build()
            .unwrap();

        mirrorsync.clear_cache().unwrap();

        assert!(!cache.exists());
    }
}
