use std::io::Read;

use tempfile::TempDir;
use unzip_cache::CACHE_DIR_ENV;
use unzip_config::{ConfigError, UnzipConfig};
use unzip_test_utils::{env_lock, write_zip, EnvVarGuard};

#[test]
fn loads_a_config_file_and_serves_archives_through_it() {
    let master = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let archive = master.path().join("org/site/1.0/site-1.0.zip");
    std::fs::create_dir_all(archive.parent().unwrap()).unwrap();
    write_zip(&archive, &[("index.html", b"<html></html>".as_slice())]).unwrap();

    let config_path = cache.path().join("unzip.toml");
    std::fs::write(
        &config_path,
        format!(
            "[cache]\nroot = {:?}\n\n[master]\nroot = {:?}\nrepository_policy = \"release\"\n",
            cache.path().join("root"),
            master.path(),
        ),
    )
    .unwrap();

    let config = UnzipConfig::load_from_path(&config_path).unwrap();
    let archive_cache = config.open_cache("releases").unwrap();

    let file = archive_cache
        .get_archive("org/site/1.0/site-1.0.zip")
        .unwrap();
    assert!(file
        .path
        .starts_with(cache.path().join("root").join("repositories").join("releases")));

    let entry = archive_cache
        .member("/org/site/1.0/site-1.0.zip", "index.html")
        .unwrap()
        .unwrap();
    let mut html = String::new();
    entry.open_content().unwrap().read_to_string(&mut html).unwrap();
    assert_eq!(html, "<html></html>");
}

#[test]
fn missing_config_file_reports_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.toml");

    let err = UnzipConfig::load_from_path(&path).unwrap_err();
    match err {
        ConfigError::Io { path: reported, .. } => assert_eq!(reported, path.display().to_string()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn cache_root_falls_back_to_the_environment() {
    let _lock = env_lock();
    let dir = TempDir::new().unwrap();
    let _env = EnvVarGuard::set_path(CACHE_DIR_ENV, dir.path());

    let config = UnzipConfig::load_from_str("").unwrap();
    assert_eq!(
        config.cache_config().cache_root_override.as_deref(),
        Some(dir.path())
    );
}
