use std::{collections::HashMap, path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

pub struct MirrorSyncConfig {
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl: Option<Duration>,
    pub git_binary: Option<PathBuf>,
}

impl MirrorSyncConfig {
    pub fn load() -> anyhow::Result<Self> {
        let raw_config = RawConfig::load(None)?;

        Ok(Self {
            cache_dir: raw_config.cache.dir,
            cache_ttl: raw_config.cache.ttl.map(Duration::from_secs),
            git_binary: raw_config.git.binary,
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    git: GitConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CacheConfig {
    dir: Option<PathBuf>,
    /// Seconds.
    ttl: Option<u64>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct GitConfig {
    binary: Option<PathBuf>,
}

impl RawConfig {
    fn load(env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                Environment::with_prefix("MIRRORSYNC")
                    .separator("_")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn load_empty() {
        let env = HashMap::from([]);
        let config = RawConfig::load(Some(env)).unwrap();
        assert_eq!(
            config,
            RawConfig {
                cache: CacheConfig {
                    dir: None,
                    ttl: None
                },
                git: GitConfig { binary: None }
            }
        )
    }

    #[test]
    fn load_environment() {
        let env = HashMap::from([
            ("MIRRORSYNC_CACHE_DIR".to_owned(), "/cache".to_owned()),
            ("MIRRORSYNC_CACHE_TTL".to_owned(), "300".to_owned()),
            ("MIRRORSYNC_GIT_BINARY".to_owned(), "/usr/bin/git".to_owned()),
        ]);
        let config = RawConfig::load(Some(env)).unwrap();
        assert_eq!(
            config,
            RawConfig {
                cache: CacheConfig {
                    dir: Some("/cache".into()),
                    ttl: Some(300)
                },
                git: GitConfig {
                    binary: Some("/usr/bin/git".into())
                }
            }
        )
    }
}
