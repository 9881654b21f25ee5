//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--policy`, `--no-mapping`, `--cache-size`, etc.)
//! 2. `--config FILE`
//! 3. `$ORBIT_CONFIG` environment variable (path to config file)
//! 4. Project-local `.orbit.toml` in the current working directory
//! 5. Global `~/.config/orbit/config.toml`
//! 6. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::fs::cache::{DEFAULT_MAX_SIZE, DEFAULT_TRIM_INTERVAL};
use crate::fs::policy::ExpansionPolicy;

// ── Section configs ──────────────────────────────────────────────────────────

/// General application settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Starting directory (overridden by CLI positional arg).
    pub default_path: Option<String>,
    /// Enable mouse support.
    pub mouse: Option<bool>,
}

/// Tree panel settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TreeConfig {
    /// Expansion policy: "single", "recursive", "main-recursive", "default".
    pub policy: Option<String>,
}

/// Node cache settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached directory listings.
    pub max_size: Option<usize>,
    /// Seconds between background trims.
    pub trim_interval_secs: Option<u64>,
}

/// Background mapping settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MappingConfig {
    /// Warm the cache when a tree is opened.
    pub enabled: Option<bool>,
    /// Mapping pool size.
    pub workers: Option<usize>,
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Log file path.
    pub file: Option<String>,
    /// Filter directive, e.g. "info" or "orbit=debug".
    pub level: Option<String>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub tree: TreeConfig,
    pub cache: CacheConfig,
    pub mapping: MappingConfig,
    pub log: LogConfig,
}

/// Default log filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path; that is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("ORBIT_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".orbit.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("orbit").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning printed to stderr).
///
/// Logging is not set up yet while config loads, hence stderr.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            eprintln!(
                "Warning: failed to parse config file {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                default_path: other
                    .general
                    .default_path
                    .clone()
                    .or(self.general.default_path),
                mouse: other.general.mouse.or(self.general.mouse),
            },
            tree: TreeConfig {
                policy: other.tree.policy.clone().or(self.tree.policy),
            },
            cache: CacheConfig {
                max_size: other.cache.max_size.or(self.cache.max_size),
                trim_interval_secs: other
                    .cache
                    .trim_interval_secs
                    .or(self.cache.trim_interval_secs),
            },
            mapping: MappingConfig {
                enabled: other.mapping.enabled.or(self.mapping.enabled),
                workers: other.mapping.workers.or(self.mapping.workers),
            },
            log: LogConfig {
                file: other.log.file.clone().or(self.log.file),
                level: other.log.level.clone().or(self.log.level),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Lowest priority first so higher ones overwrite.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    /// Whether mouse support is enabled.
    pub fn mouse_enabled(&self) -> bool {
        self.general.mouse.unwrap_or(true)
    }

    /// Configured expansion policy. Unknown names fall back to the default.
    pub fn policy(&self) -> ExpansionPolicy {
        self.tree
            .policy
            .as_deref()
            .and_then(ExpansionPolicy::parse)
            .unwrap_or_default()
    }

    /// Maximum number of cached listings.
    pub fn cache_max_size(&self) -> usize {
        self.cache.max_size.unwrap_or(DEFAULT_MAX_SIZE)
    }

    /// Period of the background cache trim. Zero is treated as one second.
    pub fn trim_interval(&self) -> Duration {
        match self.cache.trim_interval_secs {
            Some(0) => Duration::from_secs(1),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TRIM_INTERVAL,
        }
    }

    /// Whether a mapping pass runs when the tree opens.
    pub fn mapping_enabled(&self) -> bool {
        self.mapping.enabled.unwrap_or(true)
    }

    /// Mapping pool size; `None` means available parallelism.
    pub fn mapping_workers(&self) -> Option<usize> {
        self.mapping.workers.filter(|w| *w > 0)
    }

    /// Log file path, defaulting to `<cache_dir>/orbit/orbit.log`.
    pub fn log_file(&self) -> PathBuf {
        match &self.log.file {
            Some(file) => PathBuf::from(file),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("orbit")
                .join("orbit.log"),
        }
    }

    /// Log filter directive.
    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let cfg = AppConfig::default();
        assert!(cfg.mouse_enabled());
        assert_eq!(cfg.policy(), ExpansionPolicy::Default);
        assert_eq!(cfg.cache_max_size(), 100);
        assert_eq!(cfg.trim_interval(), Duration::from_secs(10));
        assert!(cfg.mapping_enabled());
        assert_eq!(cfg.mapping_workers(), None);
        assert_eq!(cfg.log_level(), "info");
        assert!(cfg.log_file().ends_with("orbit/orbit.log"));
    }

    #[test]
    fn test_toml_parsing_full() {
        let toml = r#"
[general]
default_path = "/srv"
mouse = false

[tree]
policy = "recursive"

[cache]
max_size = 500
trim_interval_secs = 30

[mapping]
enabled = false
workers = 3

[log]
file = "/tmp/orbit-test.log"
level = "orbit=debug"
"#;
        let cfg: AppConfig = toml::from_str(toml).expect("parse failed");
        assert_eq!(cfg.general.default_path.as_deref(), Some("/srv"));
        assert!(!cfg.mouse_enabled());
        assert_eq!(cfg.policy(), ExpansionPolicy::Recursive);
        assert_eq!(cfg.cache_max_size(), 500);
        assert_eq!(cfg.trim_interval(), Duration::from_secs(30));
        assert!(!cfg.mapping_enabled());
        assert_eq!(cfg.mapping_workers(), Some(3));
        assert_eq!(cfg.log_file(), PathBuf::from("/tmp/orbit-test.log"));
        assert_eq!(cfg.log_level(), "orbit=debug");
    }

    #[test]
    fn test_toml_parsing_partial() {
        let toml = r#"
[tree]
policy = "main-recursive"
"#;
        let cfg: AppConfig = toml::from_str(toml).expect("parse failed");
        assert_eq!(cfg.policy(), ExpansionPolicy::MainRecursive);
        // Everything else should be defaults
        assert_eq!(cfg.cache_max_size(), 100);
        assert!(cfg.mapping_enabled());
    }

    #[test]
    fn test_toml_parsing_empty() {
        let cfg: AppConfig = toml::from_str("").expect("parse failed");
        assert_eq!(cfg.policy(), ExpansionPolicy::Default);
        assert!(cfg.mouse_enabled());
    }

    #[test]
    fn test_unknown_policy_falls_back() {
        let toml = r#"
[tree]
policy = "sideways"
"#;
        let cfg: AppConfig = toml::from_str(toml).expect("parse failed");
        assert_eq!(cfg.policy(), ExpansionPolicy::Default);
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let cfg = AppConfig {
            cache: CacheConfig {
                trim_interval_secs: Some(0),
                ..Default::default()
            },
            mapping: MappingConfig {
                workers: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(cfg.trim_interval(), Duration::from_secs(1));
        assert_eq!(cfg.mapping_workers(), None);
    }

    #[test]
    fn test_merge_overrides() {
        let base = AppConfig {
            tree: TreeConfig {
                policy: Some("single".into()),
            },
            cache: CacheConfig {
                max_size: Some(50),
                trim_interval_secs: Some(5),
            },
            ..Default::default()
        };

        let over = AppConfig {
            cache: CacheConfig {
                max_size: Some(200),
                // trim_interval_secs not set, should keep base
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = base.merge(&over);
        assert_eq!(merged.policy(), ExpansionPolicy::Single); // from base
        assert_eq!(merged.cache_max_size(), 200); // overridden
        assert_eq!(merged.trim_interval(), Duration::from_secs(5)); // from base
    }

    #[test]
    fn test_merge_none_does_not_clear_some() {
        let base = AppConfig {
            mapping: MappingConfig {
                enabled: Some(false),
                workers: Some(2),
            },
            ..Default::default()
        };
        let over = AppConfig::default();

        let merged = base.merge(&over);
        assert!(!merged.mapping_enabled());
        assert_eq!(merged.mapping_workers(), Some(2));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("test-config.toml");
        let mut f = std::fs::File::create(&cfg_path).expect("create");
        writeln!(
            f,
            r#"
[tree]
policy = "single"

[cache]
max_size = 7
"#
        )
        .expect("write");

        let cfg = load_file(&cfg_path).expect("load");
        assert_eq!(cfg.policy(), ExpansionPolicy::Single);
        assert_eq!(cfg.cache_max_size(), 7);
        // Unset fields fall through to defaults
        assert_eq!(cfg.trim_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_file(Path::new("/nonexistent/config.toml")).is_none());
    }

    #[test]
    fn test_load_invalid_toml_returns_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("bad.toml");
        std::fs::write(&cfg_path, "this is { not valid toml").expect("write");
        assert!(load_file(&cfg_path).is_none());
    }

    #[test]
    fn test_load_with_cli_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("config.toml");
        std::fs::write(
            &cfg_path,
            r#"
[general]
mouse = false

[cache]
max_size = 75
"#,
        )
        .expect("write");

        let cli_overrides = AppConfig {
            cache: CacheConfig {
                max_size: Some(300),
                ..Default::default()
            },
            ..Default::default()
        };

        let cfg = AppConfig::load(Some(&cfg_path), Some(&cli_overrides));
        // CLI override wins
        assert_eq!(cfg.cache_max_size(), 300);
        // File value preserved
        assert!(!cfg.mouse_enabled());
    }
}
