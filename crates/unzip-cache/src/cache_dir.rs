use std::path::PathBuf;

use crate::error::CacheError;

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "UNZIP_CACHE_DIR";

/// Configuration for selecting the on-disk cache root.
#[derive(Clone, Debug, Default)]
pub struct CacheConfig {
    /// Override the global cache directory.
    pub cache_root_override: Option<PathBuf>,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            cache_root_override: std::env::var_os(CACHE_DIR_ENV).map(PathBuf::from),
        }
    }
}

/// Returns the cache root directory, without creating it.
///
/// By default this is `~/.unzip/cache`, but it respects
/// `CacheConfig.cache_root_override` (and therefore `UNZIP_CACHE_DIR`).
pub fn cache_root(config: &CacheConfig) -> Result<PathBuf, CacheError> {
    match &config.cache_root_override {
        Some(root) => Ok(root.clone()),
        None => default_cache_root(),
    }
}

/// Returns (and creates) the directory caching archives of the repository `repository_id`.
pub fn repository_cache_dir(
    config: &CacheConfig,
    repository_id: &str,
) -> Result<PathBuf, CacheError> {
    let id = sanitize_repository_id(repository_id);
    let root = cache_root(config)?.join("repositories").join(id);
    std::fs::create_dir_all(&root)?;
    Ok(root)
}

fn sanitize_repository_id(id: &str) -> String {
    let sanitized: String = id
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => ch,
            _ => '_',
        })
        .collect();
    match sanitized.as_str() {
        "" | "." | ".." => "_".to_owned(),
        _ => sanitized,
    }
}

pub(crate) fn default_cache_root() -> Result<PathBuf, CacheError> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or(CacheError::MissingHomeDir)?;

    Ok(home.join(".unzip").join("cache"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_home() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            cache_root_override: Some(dir.path().to_path_buf()),
        };
        assert_eq!(cache_root(&config).unwrap(), dir.path());
    }

    #[test]
    fn repository_dirs_are_created_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            cache_root_override: Some(dir.path().to_path_buf()),
        };

        let releases = repository_cache_dir(&config, "releases").unwrap();
        assert_eq!(releases, dir.path().join("repositories").join("releases"));
        assert!(releases.is_dir());

        let escaped = repository_cache_dir(&config, "../outside").unwrap();
        assert!(escaped.starts_with(dir.path().join("repositories")));
        assert_eq!(escaped.file_name().unwrap(), ".._outside");
    }

    #[test]
    fn degenerate_ids_are_replaced() {
        assert_eq!(sanitize_repository_id(""), "_");
        assert_eq!(sanitize_repository_id(".."), "_");
        assert_eq!(sanitize_repository_id("thirdparty"), "thirdparty");
    }
}
