//! Configuration for the unzip archive cache.
//!
//! ```toml
//! [cache]
//! root = "/var/cache/unzip"
//!
//! [master]
//! root = "/srv/releases"
//! repository_policy = "release"
//! write_policy = "allow-write"
//!
//! [logging]
//! level = "unzip.cache=debug,info"
//! ```

mod logging;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use unzip_cache::{
    repository_cache_dir, ArchiveCache, CacheConfig, CacheError, FsRepository, RepositoryPolicy,
    WritePolicy,
};

pub use logging::{init_tracing, LoggingConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnzipConfig {
    #[serde(default)]
    pub cache: CacheSection,

    /// Directory-backed master repository fronted by the cache.
    #[serde(default)]
    pub master: Option<MasterSection>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    /// Cache root; defaults to `UNZIP_CACHE_DIR`, then `~/.unzip/cache`.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MasterSection {
    pub root: PathBuf,

    /// Omit for repositories that are not versioned.
    #[serde(default)]
    pub repository_policy: Option<RepositoryPolicy>,

    #[serde(default = "MasterSection::default_write_policy")]
    pub write_policy: WritePolicy,
}

impl MasterSection {
    fn default_write_policy() -> WritePolicy {
        WritePolicy::ReadOnly
    }

    pub fn repository(&self) -> FsRepository {
        FsRepository::with_policies(&self.root, self.repository_policy, self.write_policy)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("no [master] repository is configured")]
    MissingMaster,
    #[error(transparent)]
    Cache(#[from] CacheError),
}

fn sanitize_toml_error_message(message: &str) -> String {
    // `toml::de::Error::message()` can include user-provided scalar values, e.g.
    // `invalid type: string "secret", expected a boolean`. Redact quoted substrings, allowing
    // escaped quotes inside them.
    static QUOTED_STRING_RE: OnceLock<Option<Regex>> = OnceLock::new();
    static SINGLE_QUOTED_STRING_RE: OnceLock<Option<Regex>> = OnceLock::new();

    let mut out = message.to_owned();
    if let Some(re) = QUOTED_STRING_RE
        .get_or_init(|| Regex::new(r#""(?:\\.|[^"\\])*""#).ok())
        .as_ref()
    {
        out = re.replace_all(&out, r#""<redacted>""#).into_owned();
    }
    if let Some(re) = SINGLE_QUOTED_STRING_RE
        .get_or_init(|| Regex::new(r"'(?:\\.|[^'\\])*'").ok())
        .as_ref()
    {
        out = re.replace_all(&out, "'<redacted>'").into_owned();
    }

    // `unknown field `x`` and `unknown variant `x`` echo user-controlled names; `missing field`
    // names come from the schema and are kept.
    for pattern in ["unknown field `", "unknown variant `"] {
        let Some(pos) = out.find(pattern) else {
            continue;
        };
        let start = pos + pattern.len();
        if let Some(end_rel) = out[start..].find('`') {
            out.replace_range(start..start + end_rel, "<redacted>");
        }
    }

    out
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` includes a source snippet; keep only the message.
        ConfigError::Toml(sanitize_toml_error_message(err.message()))
    }
}

impl UnzipConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::load_from_str(&text)?;
        tracing::debug!(
            target: "unzip.config",
            path = %path.display(),
            master = config.master.is_some(),
            "loaded config"
        );
        Ok(config)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Cache root selection; an explicit `cache.root` wins over `UNZIP_CACHE_DIR`.
    pub fn cache_config(&self) -> CacheConfig {
        match &self.cache.root {
            Some(root) => CacheConfig {
                cache_root_override: Some(root.clone()),
            },
            None => CacheConfig::from_env(),
        }
    }

    /// Builds a cache for the configured master repository, storing archives under
    /// `<cache_root>/repositories/<repository_id>/`.
    pub fn open_cache(&self, repository_id: &str) -> Result<ArchiveCache, ConfigError> {
        let master = self.master.as_ref().ok_or(ConfigError::MissingMaster)?;
        let dir = repository_cache_dir(&self.cache_config(), repository_id)?;
        tracing::debug!(
            target: "unzip.config",
            repository = repository_id,
            cache_dir = %dir.display(),
            master = %master.root.display(),
            "opening archive cache"
        );
        Ok(ArchiveCache::new(
            Arc::new(FsRepository::new(dir)),
            Arc::new(master.repository()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = UnzipConfig::load_from_str("").unwrap();
        assert_eq!(config, UnzipConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.stderr);
        assert!(config.master.is_none());
    }

    #[test]
    fn master_policies_use_kebab_case() {
        let config = UnzipConfig::load_from_str(
            r#"
            [master]
            root = "/srv/releases"
            repository_policy = "release"
            write_policy = "allow-write"
            "#,
        )
        .unwrap();
        let master = config.master.unwrap();
        assert_eq!(master.repository_policy, Some(RepositoryPolicy::Release));
        assert_eq!(master.write_policy, WritePolicy::AllowWrite);
        assert!(unzip_cache::release_redeploy_enabled(&master.repository()));
    }

    #[test]
    fn master_defaults_to_read_only_unversioned() {
        let config = UnzipConfig::load_from_str("[master]\nroot = \"/srv/share\"\n").unwrap();
        let master = config.master.unwrap();
        assert_eq!(master.repository_policy, None);
        assert_eq!(master.write_policy, WritePolicy::ReadOnly);
    }

    #[test]
    fn unknown_keys_are_rejected_without_echoing_them() {
        let err = UnzipConfig::load_from_str("[cache]\nsecret_token = \"hunter2\"\n").unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, ConfigError::Toml(_)), "{err:?}");
        assert!(!message.contains("secret_token"), "{message}");
        assert!(!message.contains("hunter2"), "{message}");
    }

    #[test]
    fn invalid_values_are_redacted() {
        let err =
            UnzipConfig::load_from_str("[logging]\njson = \"super-secret\"\n").unwrap_err();
        let message = err.to_string();
        assert!(!message.contains("super-secret"), "{message}");
    }

    #[test]
    fn explicit_cache_root_wins() {
        let config = UnzipConfig::load_from_str("[cache]\nroot = \"/var/cache/unzip\"\n").unwrap();
        assert_eq!(
            config.cache_config().cache_root_override,
            Some(PathBuf::from("/var/cache/unzip"))
        );
    }

    #[test]
    fn opening_a_cache_requires_a_master() {
        let err = UnzipConfig::default().open_cache("releases").unwrap_err();
        assert!(matches!(err, ConfigError::MissingMaster), "{err:?}");
    }
}
