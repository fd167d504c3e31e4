use std::{
    fs::File,
    path::PathBuf,
    time::{Duration, SystemTime},
};

use git2::{
    AutotagOption, Config, Cred, CredentialType, FetchOptions, FetchPrune, RemoteCallbacks,
    Repository,
};
use log::{debug, info, trace};
use thiserror::Error;

use crate::flock::FileLock;

const ORIGIN: &str = "origin";
const BRANCHES_REFSPEC: &str = "+refs/heads/*:refs/heads/*";
const TAGS_REFSPEC: &str = "+refs/tags/*:refs/tags/*";
const SYNC_MARKER: &str = "mirrorsync-synced";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("Cache location {location} is not a directory")]
    BadLocation { location: String },
    #[error("Remote url {url:?} cannot be used as a cache key")]
    BadRemote { url: String },
    #[error("Cache lock cannot be acquired")]
    Lock(#[from] crate::flock::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// A shared bare object store for a single remote.
pub trait ObjectCache {
    /// Brings the store up to date with the remote. Safe to call repeatedly.
    fn sync(&self) -> Result<(), CacheError>;

    /// Location of the bare store, usable as a clone reference or fetch source.
    fn path(&self) -> PathBuf;
}

#[derive(Debug)]
pub struct GitObjectCache {
    url: String,
    location: PathBuf,
    ttl: Option<Duration>,
}

impl GitObjectCache {
    pub fn new(url: impl Into<String>, location: PathBuf, ttl: Option<Duration>) -> Self {
        GitObjectCache {
            url: url.into(),
            location,
            ttl,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn acquire_lock(&self) -> Result<FileLock, CacheError> {
        let mut location = self.location.clone().into_os_string();
        location.push(".lock");
        let location = PathBuf::from(location);
        if let Some(parent) = location.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Acquiring a lock on the object cache: {}", location.display());
        let lock = FileLock::new(&location)?;
        trace!("Acquired a lock on {}", location.display());
        Ok(lock)
    }

    fn open_or_create(&self) -> Result<Repository, CacheError> {
        if self.location.exists() {
            if !self.location.is_dir() {
                return Err(CacheError::BadLocation {
                    location: self.location.to_string_lossy().to_string(),
                });
            }
            self.open_entry()
        } else {
            self.create_repo()
        }
    }

    fn open_entry(&self) -> Result<Repository, CacheError> {
        trace!("Opening existing object cache at {}", self.location.display());

        let repo = Repository::open_bare(&self.location)?;

        {
            let remote = repo.find_remote(ORIGIN)?;
            if remote.url() != Some(self.url.as_str()) {
                trace!(
                    "Updating remote existing url {:?} to new url {}",
                    remote.url(),
                    self.url
                );
                repo.remote_set_url(ORIGIN, &self.url)?;
            }
        }

        Ok(repo)
    }

    fn create_repo(&self) -> Result<Repository, CacheError> {
        info!(
            "Creating a new object cache for {} at {}",
            self.url,
            self.location.display()
        );

        let repo = Repository::init_bare(&self.location)?;
        repo.remote_with_fetch(ORIGIN, &self.url, BRANCHES_REFSPEC)?;
        repo.remote_add_fetch(ORIGIN, TAGS_REFSPEC)?;

        Ok(repo)
    }

    fn is_fresh(&self) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        let marker = self.location.join(SYNC_MARKER);
        let age = std::fs::metadata(&marker)
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok());
        matches!(age, Some(age) if age < ttl)
    }

    fn mark_synced(&self) -> Result<(), CacheError> {
        File::create(self.location.join(SYNC_MARKER))?;
        Ok(())
    }

    fn fetch_options(config: &Config) -> FetchOptions<'_> {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username, allowed_types| {
            trace!(
                "Requested credentials for {}, username {:?}, allowed types {:?}",
                url,
                username,
                allowed_types
            );
            if allowed_types.contains(CredentialType::USERNAME) {
                return Cred::username("git");
            }
            if allowed_types.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(username.unwrap_or("git"));
            }
            if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
                return Cred::credential_helper(config, url, username);
            }
            Err(git2::Error::from_str("no valid authentication available"))
        });

        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(callbacks)
            .prune(FetchPrune::On)
            .download_tags(AutotagOption::All);
        fetch_options
    }
}

impl ObjectCache for GitObjectCache {
    fn sync(&self) -> Result<(), CacheError> {
        let _lock = self.acquire_lock()?;

        // Checked under the lock so a concurrent refresh counts.
        if self.is_fresh() {
            debug!("Object cache {} is fresh, skipping fetch", self.location.display());
            return Ok(());
        }

        let repo = self.open_or_create()?;
        let git_config = Config::open_default()?;
        let mut remote = repo.find_remote(ORIGIN)?;

        info!("Fetching {} into {}", self.url, self.location.display());
        remote.fetch(
            &[] as &[&str],
            Some(&mut Self::fetch_options(&git_config)),
            None,
        )?;

        self.mark_synced()
    }

    fn path(&self) -> PathBuf {
        self.location.clone()
    }
}
