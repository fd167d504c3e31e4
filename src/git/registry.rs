use std::{
    fmt::Write,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
    time::Duration,
};

use dashmap::DashMap;
use log::{debug, info};
use regex_lite::Regex;

use super::cache::{CacheError, GitObjectCache};

const GIT_SUFFIX: &str = ".git";
/// Leaf directory of every store. Escaping guarantees no key segment can
/// produce this name.
const STORE_DIR: &str = "@store.git";
const LOCAL_DIR: &str = "local";
const NETWORK_DIR: &str = "remote";

/// Hands out one object cache per remote, so every working directory of the
/// same upstream shares one store on disk.
pub struct CacheRegistry {
    location: PathBuf,
    ttl: Option<Duration>,
    caches: DashMap<PathBuf, Arc<GitObjectCache>>,
}

impl CacheRegistry {
    pub fn new(location: PathBuf, ttl: Option<Duration>) -> Result<Self, CacheError> {
        if location.exists() {
            if !location.is_dir() {
                return Err(CacheError::BadLocation {
                    location: location.to_str().unwrap_or("").to_string(),
                });
            }
        } else {
            std::fs::create_dir_all(&location)?;
        }

        Ok(CacheRegistry {
            location,
            ttl,
            caches: DashMap::new(),
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Returns the cache for `url`, creating the handle on first use.
    ///
    /// Urls that normalize to the same key share the handle; the store keeps
    /// fetching from the url it was first requested with.
    pub fn cache_for(&self, url: &str) -> Result<Arc<GitObjectCache>, CacheError> {
        let key = normalize_remote(url)?;
        let store = self.location.join(store_path(&key));

        let cache = self
            .caches
            .entry(store.clone())
            .or_insert_with(|| {
                debug!("Registering object cache for {} at {}", url, store.display());
                Arc::new(GitObjectCache::new(url, store, self.ttl))
            })
            .clone();
        Ok(cache)
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        if self.location.exists() {
            info!("Clearing object caches in {}.", self.location.display());
            std::fs::remove_dir_all(&self.location)?;
        }
        self.caches.clear();
        Ok(())
    }
}

/// Reduces the spellings of a remote to one key: `https://Host/org/repo.git`,
/// `ssh://git@host/org/repo` and `git@host:org/repo` all become
/// `host/org/repo`. Local paths become absolute, always start with `/`, and
/// have `.` and `..` resolved lexically.
pub fn normalize_remote(url: &str) -> Result<String, CacheError> {
    static URL: OnceLock<Regex> = OnceLock::new();
    static SCP: OnceLock<Regex> = OnceLock::new();

    let bad_remote = || CacheError::BadRemote {
        url: url.to_string(),
    };

    let trimmed = url.trim().trim_end_matches(is_separator);
    let trimmed = trimmed
        .strip_suffix(GIT_SUFFIX)
        .unwrap_or(trimmed)
        .trim_end_matches(is_separator);
    if trimmed.is_empty() {
        return Err(bad_remote());
    }

    let url_re = URL.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://(?:[^@/]*@)?(?P<host>[^/]*)(?P<path>/.*)?$")
            .unwrap()
    });
    let scp_re =
        SCP.get_or_init(|| Regex::new(r"^(?:[^@/]+@)?(?P<host>[^:/]{2,}):(?P<path>.+)$").unwrap());

    let (host, path) = match url_re.captures(trimmed).or_else(|| scp_re.captures(trimmed)) {
        Some(captures) => (
            captures
                .name("host")
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default(),
            captures
                .name("path")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        ),
        None => (String::new(), trimmed.to_string()),
    };

    let key = if host.is_empty() {
        // A local path, or file:///some/path.
        let path = Path::new(&path);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let absolute = absolute.to_string_lossy();
        let segments = clean_segments(&absolute);
        if segments.is_empty() {
            return Err(bad_remote());
        }
        format!("/{}", segments.join("/"))
    } else {
        let segments = clean_segments(&path);
        if segments.is_empty() {
            host
        } else {
            format!("{host}/{}", segments.join("/"))
        }
    };
    Ok(key)
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Splits a path on either separator, dropping empty and `.` segments and
/// letting `..` remove its parent.
fn clean_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for segment in path.split(is_separator) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments
}

/// Relative location of the store for a normalized key. Distinct keys never
/// share a store, and no store is nested inside another.
fn store_path(key: &str) -> PathBuf {
    let (kind, rest) = match key.strip_prefix('/') {
        Some(rest) => (LOCAL_DIR, rest),
        None => (NETWORK_DIR, key),
    };

    let mut path = PathBuf::from(kind);
    for segment in rest.split('/') {
        path.push(escape_segment(segment));
    }
    path.push(STORE_DIR);
    path
}

fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for (i, c) in segment.char_indices() {
        match c {
            '%' | ':' | '@' | '\\' => {
                let _ = write!(escaped, "%{:02X}", c as u32);
            }
            '.' if i == 0 => escaped.push_str("%2E"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::git::cache::ObjectCache;

    #[test]
    fn normalizes_common_url_spellings() {
        let expected = "github.com/org/repo";
        for url in [
            "https://github.com/org/repo",
            "https://github.com/org/repo.git",
            "https://GitHub.com/org/repo/",
            "https://user@github.com/org/repo.git",
            "ssh://git@github.com/org/repo.git",
            "git@github.com:org/repo.git",
            "  git@github.com:org/repo  ",
            "https://github.com/org/tools/../repo",
        ] {
            assert_eq!(normalize_remote(url).unwrap(), expected, "{url}");
        }
    }

    #[test]
    fn keeps_ports_and_local_paths() {
        assert_eq!(
            normalize_remote("ssh://git@example.com:2222/org/repo.git").unwrap(),
            "example.com:2222/org/repo"
        );
        assert_eq!(
            normalize_remote("/srv/git/repo.git").unwrap(),
            "/srv/git/repo"
        );
        assert_eq!(
            normalize_remote("file:///srv/git/repo.git").unwrap(),
            "/srv/git/repo"
        );
    }

    #[test]
    fn local_paths_are_made_absolute() {
        assert_eq!(
            normalize_remote("/srv/a/../git/./repo").unwrap(),
            "/srv/git/repo"
        );

        let cwd = std::env::current_dir().unwrap();
        let expected = format!("/{}/repo", clean_segments(&cwd.to_string_lossy()).join("/"));
        assert_eq!(normalize_remote("repo").unwrap(), expected);
        assert_eq!(normalize_remote("./repo.git").unwrap(), expected);
    }

    #[test]
    fn rejects_empty_remote() {
        for url in ["  ", ".git", "/", "/.."] {
            assert!(
                matches!(normalize_remote(url), Err(CacheError::BadRemote { .. })),
                "{url}"
            );
        }
    }

    #[test]
    fn store_path_separates_local_and_network_keys() {
        assert_eq!(
            store_path("example.com:2222/org/repo"),
            PathBuf::from("remote/example.com%3A2222/org/repo/@store.git")
        );
        assert_eq!(
            store_path("/srv/git/repo"),
            PathBuf::from("local/srv/git/repo/@store.git")
        );
        assert_eq!(
            store_path("srv/git/repo"),
            PathBuf::from("remote/srv/git/repo/@store.git")
        );
        assert_eq!(
            store_path("host/org/.hidden/@store.git"),
            PathBuf::from("remote/host/org/%2Ehidden/%40store.git/@store.git")
        );
    }

    #[test]
    fn equivalent_urls_share_one_cache() {
        let dir = tempfile::tempdir().unwrap();
        let registry = CacheRegistry::new(dir.path().join("cache"), None).unwrap();

        let first = registry.cache_for("https://example.com/org/repo.git").unwrap();
        let second = registry.cache_for("git@example.com:org/repo").unwrap();
        let other = registry.cache_for("https://example.com/org/other").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(first.url(), "https://example.com/org/repo.git");
        assert_eq!(
            first.path(),
            dir.path()
                .join("cache/remote/example.com/org/repo/@store.git")
        );
    }

    #[test]
    fn distinct_remotes_get_distinct_stores() {
        let dir = tempfile::tempdir().unwrap();
        let registry = CacheRegistry::new(dir.path().join("cache"), None).unwrap();

        let pairs = [
            ("https://srv/git/repo.git", "/srv/git/repo.git"),
            ("/d/a/../b/repo", "/d/a/b/repo"),
            ("https://host/org", "https://host/org/@store.git"),
            ("https://host/org", "https://host/org/repo"),
            ("ssh://host:22/repo", "ssh://host_22/repo"),
            ("https://host/a%3Ab", "https://host/a:b"),
        ];
        for (left, right) in pairs {
            let left_cache = registry.cache_for(left).unwrap();
            let right_cache = registry.cache_for(right).unwrap();

            assert!(!Arc::ptr_eq(&left_cache, &right_cache), "{left} {right}");
            let (left_path, right_path) = (left_cache.path(), right_cache.path());
            assert_ne!(left_path, right_path, "{left} {right}");
            assert!(!left_path.starts_with(&right_path), "{left} {right}");
            assert!(!right_path.starts_with(&left_path), "{left} {right}");
        }
    }

    #[test]
    fn new_rejects_file_location() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("cache");
        std::fs::write(&location, "").unwrap();

        assert!(matches!(
            CacheRegistry::new(location, None),
            Err(CacheError::BadLocation { .. })
        ));
    }

    #[test]
    fn clear_forgets_caches() {
        let dir = tempfile::tempdir().unwrap();
        let registry = CacheRegistry::new(dir.path().join("cache"), None).unwrap();
        let before = registry.cache_for("https://example.com/org/repo").unwrap();

        registry.clear().unwrap();

        assert!(!registry.location().exists());
        let after = registry.cache_for("https://example.com/org/repo").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
