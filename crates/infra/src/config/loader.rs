//! Configuration loader
//!
//! Loads the application configuration from a TOML or JSON file and applies
//! environment overrides on top.
//!
//! ## Lookup Order
//! 1. The explicit path passed by the caller (`--config`)
//! 2. `DBARCHIVE_CONFIG`
//! 3. [`find_config_path`]: `./dbarchive.toml`, `./dbarchive.json`,
//!    `./config/dbarchive.toml`, `./config/dbarchive.json`
//!
//! ## Environment Overrides
//! - `DBARCHIVE_SOURCE_DB`: source database path
//! - `DBARCHIVE_ARCHIVE_DB`: archive database path
//! - `DBARCHIVE_POOL_SIZE`: connection pool size
//! - `DBARCHIVE_ENABLE_LOGGING`: whether run progress is logged (true/false)
//!
//! Relative database paths in a file are resolved against the file's
//! directory.

use std::path::{Path, PathBuf};

use dbarchive_domain::{AppConfig, DbArchiveError, Result};

pub const CONFIG_PATH_ENV: &str = "DBARCHIVE_CONFIG";
pub const SOURCE_DB_ENV: &str = "DBARCHIVE_SOURCE_DB";
pub const ARCHIVE_DB_ENV: &str = "DBARCHIVE_ARCHIVE_DB";
pub const POOL_SIZE_ENV: &str = "DBARCHIVE_POOL_SIZE";
pub const ENABLE_LOGGING_ENV: &str = "DBARCHIVE_ENABLE_LOGGING";

/// Load, override and validate the configuration.
///
/// # Errors
/// Returns `DbArchiveError::Configuration` if no file is found, the file
/// cannot be parsed, an override is malformed, or validation fails.
pub fn load(explicit: Option<PathBuf>) -> Result<AppConfig> {
    let path = explicit.or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
    let mut config = load_from_file(path)?;
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations.
///
/// # Errors
/// Returns `DbArchiveError::Configuration` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DbArchiveError::Configuration(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            DbArchiveError::Configuration(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(|e| {
        DbArchiveError::Configuration(format!("Failed to read config file: {e}"))
    })?;

    let mut config = parse_config(&contents, &config_path)?;
    if let Some(base) = config_path.parent() {
        resolve_relative_paths(&mut config, base);
    }
    Ok(config)
}

/// Apply `DBARCHIVE_*` overrides.
///
/// # Errors
/// Returns `DbArchiveError::Configuration` if `DBARCHIVE_POOL_SIZE` is not a
/// positive integer.
pub fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    if let Some(source) = std::env::var_os(SOURCE_DB_ENV) {
        config.database.source_path = PathBuf::from(source);
    }
    if let Some(archive) = std::env::var_os(ARCHIVE_DB_ENV) {
        config.database.archive_path =
            if archive.is_empty() { None } else { Some(PathBuf::from(archive)) };
    }
    if let Ok(raw) = std::env::var(POOL_SIZE_ENV) {
        config.database.pool_size = raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| DbArchiveError::Configuration(format!("Invalid pool size: {raw}")))?;
    }
    config.enable_logging = env_bool(ENABLE_LOGGING_ENV, config.enable_logging);
    Ok(())
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `DbArchiveError::Configuration` if format is invalid or parsing
/// fails.
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DbArchiveError::Configuration(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DbArchiveError::Configuration(format!("Invalid JSON format: {e}"))),
        _ => Err(DbArchiveError::Configuration(format!("Unsupported config format: {extension}"))),
    }
}

fn resolve_relative_paths(config: &mut AppConfig, base: &Path) {
    let resolve = |path: &Path| {
        if path.is_relative() && !base.as_os_str().is_empty() {
            base.join(path)
        } else {
            path.to_path_buf()
        }
    };

    config.database.source_path = resolve(&config.database.source_path);
    config.database.archive_path = config.database.archive_path.as_deref().map(resolve);
}

/// Probe the standard paths for configuration files
///
/// Searches the current working directory for `dbarchive.{toml,json}`, then
/// `config/dbarchive.{toml,json}`.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_path() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    search_in(&cwd)
}

fn search_in(dir: &Path) -> Option<PathBuf> {
    [
        dir.join("dbarchive.toml"),
        dir.join("dbarchive.json"),
        dir.join("config").join("dbarchive.toml"),
        dir.join("config").join("dbarchive.json"),
    ]
    .into_iter()
    .find(|path| path.exists())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
///
/// # Returns
/// The parsed boolean value, or `default` if not set.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use dbarchive_domain::{DatabaseConfig, SchedulingMode};
    use once_cell::sync::Lazy;
    use tempfile::TempDir;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn clear_overrides() {
        for key in [SOURCE_DB_ENV, ARCHIVE_DB_ENV, POOL_SIZE_ENV, ENABLE_LOGGING_ENV, CONFIG_PATH_ENV] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("DBARCHIVE_TEST_BOOL_ON", "on");
        std::env::set_var("DBARCHIVE_TEST_BOOL_UPPER", "TRUE");
        std::env::set_var("DBARCHIVE_TEST_BOOL_OFF", "off");
        std::env::remove_var("DBARCHIVE_TEST_BOOL_MISSING");

        assert!(env_bool("DBARCHIVE_TEST_BOOL_ON", false));
        assert!(env_bool("DBARCHIVE_TEST_BOOL_UPPER", false));
        assert!(!env_bool("DBARCHIVE_TEST_BOOL_OFF", true));
        assert!(env_bool("DBARCHIVE_TEST_BOOL_MISSING", true));
        assert!(!env_bool("DBARCHIVE_TEST_BOOL_MISSING", false));

        std::env::remove_var("DBARCHIVE_TEST_BOOL_ON");
        std::env::remove_var("DBARCHIVE_TEST_BOOL_UPPER");
        std::env::remove_var("DBARCHIVE_TEST_BOOL_OFF");
    }

    #[test]
    fn test_env_overrides_replace_database_settings() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_overrides();

        std::env::set_var(SOURCE_DB_ENV, "/data/live.db");
        std::env::set_var(ARCHIVE_DB_ENV, "/data/cold.db");
        std::env::set_var(POOL_SIZE_ENV, "8");
        std::env::set_var(ENABLE_LOGGING_ENV, "false");

        let mut config = AppConfig::new(DatabaseConfig::new("app.db"));
        apply_env_overrides(&mut config).unwrap();
        clear_overrides();

        assert_eq!(config.database.source_path, PathBuf::from("/data/live.db"));
        assert_eq!(config.database.archive_path, Some(PathBuf::from("/data/cold.db")));
        assert_eq!(config.database.pool_size, 8);
        assert!(!config.enable_logging);
    }

    #[test]
    fn test_invalid_pool_size_is_rejected() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_overrides();
        std::env::set_var(POOL_SIZE_ENV, "zero");

        let mut config = AppConfig::new(DatabaseConfig::new("app.db"));
        let result = apply_env_overrides(&mut config);
        clear_overrides();

        assert!(matches!(result, Err(DbArchiveError::Configuration(_))));
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_content = r#"
tables = ["events", { name = "audit_log", batch_size = 50 }]

[database]
source_path = "app.db"
archive_path = "archive.db"

[settings]
batch_size = 500
archive_older_than_days = 30

[queueing]
enable_batching = true
"#;

        let config = parse_config(toml_content, Path::new("dbarchive.toml")).unwrap();
        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.config_for("events").batch_size, 500);
        assert_eq!(config.config_for("audit_log").batch_size, 50);
        assert_eq!(config.config_for("audit_log").cutoff_days, 30);
        assert_eq!(config.queueing.mode(), SchedulingMode::Grouped);
    }

    #[test]
    fn test_parse_config_json() {
        let json_content = r#"{
            "database": { "source_path": "app.db" },
            "settings": { "table_prefix": "archive" },
            "tables": ["events"],
            "queueing": { "process_tables_async": false }
        }"#;

        let config = parse_config(json_content, Path::new("dbarchive.json")).unwrap();
        assert!(config.database.is_same_store());
        assert_eq!(config.config_for("events").archive_table_name("events"), "archive_events");
        assert_eq!(config.queueing.mode(), SchedulingMode::Parallel);
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", Path::new("dbarchive.yaml"));
        assert!(matches!(result, Err(DbArchiveError::Configuration(_))));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/dbarchive.toml")));
        assert!(matches!(result, Err(DbArchiveError::Configuration(_))));
    }

    #[test]
    fn test_relative_database_paths_follow_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dbarchive.toml");
        std::fs::write(
            &path,
            "tables = []\n[database]\nsource_path = \"data/app.db\"\narchive_path = \"/abs/archive.db\"\n",
        )
        .unwrap();

        let config = load_from_file(Some(path)).unwrap();
        assert_eq!(config.database.source_path, dir.path().join("data/app.db"));
        assert_eq!(config.database.archive_path, Some(PathBuf::from("/abs/archive.db")));
    }

    #[test]
    fn test_search_prefers_root_toml_over_config_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(search_in(dir.path()), None);

        std::fs::create_dir(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config").join("dbarchive.json"), "{}").unwrap();
        assert_eq!(search_in(dir.path()), Some(dir.path().join("config").join("dbarchive.json")));

        std::fs::write(dir.path().join("dbarchive.toml"), "").unwrap();
        assert_eq!(search_in(dir.path()), Some(dir.path().join("dbarchive.toml")));
    }
}
