use std::{
    fs::File,
    path::Path,
    time::{Duration, Instant},
};

use fs4::fs_std::FileExt;
use log::debug;
use thiserror::Error;

const DEFAULT_WAIT: Duration = Duration::from_secs(300);
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Exclusive advisory lock, released when dropped.
pub struct FileLock {
    _file: File,
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error(#[from] std::io::Error);

impl FileLock {
    pub fn new(path: &Path) -> Result<Self, Error> {
        Self::with_wait(path, DEFAULT_WAIT)
    }

    /// Polls for the lock until `wait` has elapsed, then gives up with the
    /// contention error.
    pub fn with_wait(path: &Path, wait: Duration) -> Result<Self, Error> {
        let file = File::create(path)?;
        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(_) => {
                    return Ok(Self { _file: file });
                }
                Err(error)
                    if error.raw_os_error() == fs4::lock_contended_error().raw_os_error()
                        && start.elapsed() < wait =>
                {
                    debug!("{} is locked by another process, retrying", path.display());
                    std::thread::sleep(RETRY_INTERVAL.min(wait));
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}
