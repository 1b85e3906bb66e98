//! TOML settings for hosts and the `tiercache` binary.
//!
//! Precedence: explicit path > `TIERCACHE_CONFIG` > `./tiercache.toml` > defaults, then
//! `TIERCACHE_STORE` and `TIERCACHE_SCHEMA_VERSION` override what was loaded.

use crate::cache::CacheConfig;
use crate::errors::CacheError;
use crate::tiered::{DEFAULT_MEDIUM_EVICTION_FRACTION, DERIVATION_SCHEMA_VERSION, TieredConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SETTINGS_FILE: &str = "tiercache.toml";
pub const DEFAULT_STORE_FILE: &str = "tiercache-medium.log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericSettings {
    pub name: String,
    pub max_size: usize,
    pub default_ttl_ms: u64,
    pub sweep_interval_ms: u64,
    pub sweep_batch_size: usize,
}

impl Default for GenericSettings {
    fn default() -> Self {
        Self {
            name: "generic".to_string(),
            max_size: 1000,
            default_ttl_ms: 5 * 60 * 1000,
            sweep_interval_ms: 60 * 1000,
            sweep_batch_size: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TieredSettings {
    /// Overrides the compiled-in schema version; mostly for migrations and tests.
    pub schema_version: Option<u32>,
    pub fast_max_entries: usize,
    pub fast_ttl_ms: u64,
    pub medium_max_entries: usize,
    pub medium_ttl_ms: u64,
    pub medium_eviction_fraction: f64,
    pub medium_quota_bytes: Option<usize>,
    pub slow_ttl_ms: Option<u64>,
    /// Background purge and stats report period; 0 disables it.
    pub report_interval_ms: u64,
}

impl Default for TieredSettings {
    fn default() -> Self {
        Self {
            schema_version: None,
            fast_max_entries: 100,
            fast_ttl_ms: 5 * 60 * 1000,
            medium_max_entries: 1000,
            medium_ttl_ms: 24 * 60 * 60 * 1000,
            medium_eviction_fraction: DEFAULT_MEDIUM_EVICTION_FRACTION,
            medium_quota_bytes: None,
            slow_ttl_ms: None,
            report_interval_ms: 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: Option<PathBuf>,
    pub level: Option<String>,
    pub retention: Option<usize>,
    pub dev6: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Medium tier log file used by the admin binary.
    pub store_path: Option<PathBuf>,
    pub generic: GenericSettings,
    pub tiered: TieredSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load from the first settings file found, then apply environment overrides.
    ///
    /// # Errors
    /// `CacheError::Config` if `explicit` does not exist or a file does not parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CacheError> {
        let env = |k: &str| std::env::var(k).ok();
        let mut settings = match find_settings_file(explicit, &env)? {
            Some(path) => {
                log::debug!("settings: loading {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        settings.apply_env(env)?;
        Ok(settings)
    }

    /// # Errors
    /// `CacheError::Io` if unreadable, `CacheError::Config` if not valid settings TOML.
    pub fn from_file(path: &Path) -> Result<Self, CacheError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| CacheError::Config(format!("{}: {e}", path.display())))
    }

    /// # Errors
    /// `CacheError::Config` on a parse error.
    pub fn from_toml_str(text: &str) -> Result<Self, CacheError> {
        toml::from_str(text).map_err(|e| CacheError::Config(e.to_string()))
    }

    /// Apply `TIERCACHE_STORE` and `TIERCACHE_SCHEMA_VERSION` as read through `lookup`.
    ///
    /// # Errors
    /// `CacheError::Config` if the schema version is not an integer.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), CacheError> {
        if let Some(store) = lookup("TIERCACHE_STORE") {
            self.store_path = Some(PathBuf::from(store));
        }
        if let Some(raw) = lookup("TIERCACHE_SCHEMA_VERSION") {
            let v = raw
                .trim()
                .parse::<u32>()
                .map_err(|e| CacheError::Config(format!("TIERCACHE_SCHEMA_VERSION={raw}: {e}")))?;
            self.tiered.schema_version = Some(v);
        }
        Ok(())
    }

    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE))
    }

    /// # Errors
    /// `CacheError::Config` for zero capacities or batch size.
    pub fn generic_config(&self) -> Result<CacheConfig, CacheError> {
        let g = &self.generic;
        if g.max_size == 0 {
            return Err(CacheError::Config("generic.max_size cannot be 0".to_string()));
        }
        if g.sweep_batch_size == 0 {
            return Err(CacheError::Config("generic.sweep_batch_size cannot be 0".to_string()));
        }
        if g.sweep_interval_ms == 0 {
            return Err(CacheError::Config("generic.sweep_interval_ms cannot be 0".to_string()));
        }
        Ok(CacheConfig {
            name: g.name.clone(),
            max_size: g.max_size,
            default_ttl: Duration::from_millis(g.default_ttl_ms),
            sweep_interval: Duration::from_millis(g.sweep_interval_ms),
            sweep_batch_size: g.sweep_batch_size,
        })
    }

    /// # Errors
    /// `CacheError::Config` for zero capacities or a fraction outside (0, 1].
    pub fn tiered_config(&self) -> Result<TieredConfig, CacheError> {
        let t = &self.tiered;
        let config = TieredConfig {
            schema_version: t.schema_version.unwrap_or(DERIVATION_SCHEMA_VERSION),
            fast_max_entries: t.fast_max_entries,
            fast_ttl: Duration::from_millis(t.fast_ttl_ms),
            medium_max_entries: t.medium_max_entries,
            medium_ttl: Duration::from_millis(t.medium_ttl_ms),
            medium_eviction_fraction: t.medium_eviction_fraction,
            slow_ttl: t.slow_ttl_ms.map(Duration::from_millis),
            report_interval: (t.report_interval_ms > 0).then(|| Duration::from_millis(t.report_interval_ms)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Configure log4rs from the `[logging]` section.
    ///
    /// # Errors
    /// Propagates logger setup failures.
    pub fn init_logging(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let l = &self.logging;
        crate::logger::configure_logging(l.dir.as_deref(), l.level.as_deref(), l.retention, l.dev6)
    }
}

fn find_settings_file(explicit: Option<&Path>, env: &impl Fn(&str) -> Option<String>) -> Result<Option<PathBuf>, CacheError> {
    if let Some(p) = explicit {
        if p.exists() {
            return Ok(Some(p.to_path_buf()));
        }
        return Err(CacheError::Config(format!("settings file {} not found", p.display())));
    }
    let mut candidates = Vec::new();
    if let Some(p) = env("TIERCACHE_CONFIG") {
        candidates.push(PathBuf::from(p));
    }
    candidates.push(PathBuf::from(DEFAULT_SETTINGS_FILE));
    Ok(candidates.into_iter().find(|p| p.exists()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let s = Settings::from_toml_str(
            r#"
            store_path = "/var/cache/derivations.log"

            [tiered]
            fast_max_entries = 8
            medium_eviction_fraction = 0.25
            report_interval_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(s.store_path(), PathBuf::from("/var/cache/derivations.log"));
        let t = s.tiered_config().unwrap();
        assert_eq!(t.fast_max_entries, 8);
        assert!((t.medium_eviction_fraction - 0.25).abs() < f64::EPSILON);
        assert_eq!(t.schema_version, DERIVATION_SCHEMA_VERSION);
        assert_eq!(t.report_interval, None);
        assert_eq!(Settings::default().tiered_config().unwrap().report_interval, Some(Duration::from_secs(60)));
        assert_eq!(s.generic_config().unwrap().max_size, 1000);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let s = Settings::from_toml_str("[tiered]\nmedium_eviction_fraction = 1.5\n").unwrap();
        assert!(matches!(s.tiered_config(), Err(CacheError::Config(_))));
        let s = Settings::from_toml_str("[generic]\nmax_size = 0\n").unwrap();
        assert!(matches!(s.generic_config(), Err(CacheError::Config(_))));
        assert!(matches!(Settings::from_toml_str("[generic\n"), Err(CacheError::Config(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut s = Settings::default();
        s.apply_env(|k| match k {
            "TIERCACHE_STORE" => Some("/tmp/other.log".to_string()),
            "TIERCACHE_SCHEMA_VERSION" => Some("7".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(s.store_path(), PathBuf::from("/tmp/other.log"));
        assert_eq!(s.tiered_config().unwrap().schema_version, 7);

        let mut s = Settings::default();
        let bad = s.apply_env(|k| (k == "TIERCACHE_SCHEMA_VERSION").then(|| "seven".to_string()));
        assert!(matches!(bad, Err(CacheError::Config(_))));
    }

    #[test]
    fn explicit_path_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(matches!(Settings::load(Some(&missing)), Err(CacheError::Config(_))));

        let present = tmp.path().join("tiercache.toml");
        std::fs::write(&present, "[generic]\nname = \"api\"\n").unwrap();
        let s = Settings::load(Some(&present)).unwrap();
        assert_eq!(s.generic.name, "api");
    }
}
