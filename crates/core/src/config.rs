//! Shell settings
//!
//! Settings come from built-in defaults, optionally overlaid by a TOML file
//! and then by `DOCSHELL_*` environment variables. Unknown TOML keys are
//! ignored.
//!
//! ```toml
//! debounce_interval_ms = 250
//! memory_ceiling_mb = 1024
//!
//! [cache_max_entries]
//! pages = 12
//! ```

use crate::error::ConfigError;
use docshell_cache::GovernorConfig;
use docshell_render::ZoomBounds;
use docshell_scheduler::IoWorkerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "DOCSHELL_";

/// Maximum entry counts of each cache kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheLimits {
    /// Rendered pages per paginated view
    pub pages: usize,
    /// Highlighted texts per editor view
    pub highlight: usize,
    /// Rendered previews per markdown view
    pub preview: usize,
    /// Thumbnails per asset browser
    pub thumbnails: usize,
    /// Rendered zoom levels per image view
    pub images: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            pages: 8,
            highlight: 16,
            preview: 16,
            thumbnails: 128,
            images: 4,
        }
    }
}

/// Effective shell settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub cache_max_entries: CacheLimits,

    /// Quiet period after the last edit before derived artifacts refresh
    pub debounce_interval_ms: u64,

    /// Quiet period after the last scroll before rendering
    pub scroll_idle_ms: u64,

    pub memory_ceiling_mb: u64,
    pub sweep_interval_ms: u64,
    pub pressure_interval_ms: u64,
    pub worker_poll_ms: u64,
    pub worker_join_timeout_ms: u64,

    /// Suppress duplicate reads of a target already being read
    pub dedupe_in_flight: bool,

    /// Zoom bounds in percent
    pub min_zoom: u32,
    pub max_zoom: u32,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            cache_max_entries: CacheLimits::default(),
            debounce_interval_ms: 300,
            scroll_idle_ms: 200,
            memory_ceiling_mb: 500,
            sweep_interval_ms: 30_000,
            pressure_interval_ms: 10_000,
            worker_poll_ms: 100,
            worker_join_timeout_ms: 1000,
            dedupe_in_flight: false,
            min_zoom: 25,
            max_zoom: 400,
        }
    }
}

impl ShellConfig {
    /// Default settings file: `<config dir>/docshell/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("docshell").join("config.toml"))
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Load effective settings
    ///
    /// Uses `path` if given, else the default settings file if it exists,
    /// else the built-in defaults. Environment overrides apply last and the
    /// result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => {
                    log::debug!("loading settings from {}", path.display());
                    Self::from_file(path)?
                }
                None => Self::default(),
            },
        };
        let config = config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCSHELL_*` variables from the process environment
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(std::env::vars())
    }

    /// Apply `DOCSHELL_*` overrides from `vars`
    ///
    /// Names are the setting names upper-cased (`DOCSHELL_SCROLL_IDLE_MS`);
    /// cache limits use `DOCSHELL_CACHE_<KIND>`. Other variables are ignored.
    pub fn with_overrides<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in vars {
            let (name, value) = (name.as_ref(), value.as_ref());
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            let limits = &mut self.cache_max_entries;
            match key {
                "CACHE_PAGES" => limits.pages = parse_env(name, value)?,
                "CACHE_HIGHLIGHT" => limits.highlight = parse_env(name, value)?,
                "CACHE_PREVIEW" => limits.preview = parse_env(name, value)?,
                "CACHE_THUMBNAILS" => limits.thumbnails = parse_env(name, value)?,
                "CACHE_IMAGES" => limits.images = parse_env(name, value)?,
                "DEBOUNCE_INTERVAL_MS" => self.debounce_interval_ms = parse_env(name, value)?,
                "SCROLL_IDLE_MS" => self.scroll_idle_ms = parse_env(name, value)?,
                "MEMORY_CEILING_MB" => self.memory_ceiling_mb = parse_env(name, value)?,
                "SWEEP_INTERVAL_MS" => self.sweep_interval_ms = parse_env(name, value)?,
                "PRESSURE_INTERVAL_MS" => self.pressure_interval_ms = parse_env(name, value)?,
                "WORKER_POLL_MS" => self.worker_poll_ms = parse_env(name, value)?,
                "WORKER_JOIN_TIMEOUT_MS" => self.worker_join_timeout_ms = parse_env(name, value)?,
                "DEDUPE_IN_FLIGHT" => self.dedupe_in_flight = parse_env(name, value)?,
                "MIN_ZOOM" => self.min_zoom = parse_env(name, value)?,
                "MAX_ZOOM" => self.max_zoom = parse_env(name, value)?,
                _ => log::debug!("ignoring unknown setting {}", name),
            }
        }
        Ok(self)
    }

    /// Reject zero intervals, zero cache sizes and empty zoom ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("debounce_interval_ms", self.debounce_interval_ms),
            ("scroll_idle_ms", self.scroll_idle_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("pressure_interval_ms", self.pressure_interval_ms),
            ("worker_poll_ms", self.worker_poll_ms),
            ("worker_join_timeout_ms", self.worker_join_timeout_ms),
            ("memory_ceiling_mb", self.memory_ceiling_mb),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        let limits = &self.cache_max_entries;
        let caches = [
            ("cache_max_entries.pages", limits.pages),
            ("cache_max_entries.highlight", limits.highlight),
            ("cache_max_entries.preview", limits.preview),
            ("cache_max_entries.thumbnails", limits.thumbnails),
            ("cache_max_entries.images", limits.images),
        ];
        for (field, value) in caches {
            if value == 0 {
                return Err(invalid(field, "must hold at least one entry"));
            }
        }

        if self.min_zoom == 0 {
            return Err(invalid("min_zoom", "must be greater than zero"));
        }
        if self.min_zoom > self.max_zoom {
            return Err(invalid(
                "max_zoom",
                &format!("{} is below min_zoom {}", self.max_zoom, self.min_zoom),
            ));
        }
        Ok(())
    }

    /// Quiet period for text edits
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_interval_ms)
    }

    /// Quiet period for scrolling
    pub fn scroll_idle(&self) -> Duration {
        Duration::from_millis(self.scroll_idle_ms)
    }

    pub fn zoom_bounds(&self) -> ZoomBounds {
        ZoomBounds::new(self.min_zoom, self.max_zoom)
    }

    pub fn worker_config(&self) -> IoWorkerConfig {
        IoWorkerConfig::new()
            .with_poll_interval(Duration::from_millis(self.worker_poll_ms))
            .with_join_timeout(Duration::from_millis(self.worker_join_timeout_ms))
            .with_dedupe_in_flight(self.dedupe_in_flight)
    }

    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig::new(self.memory_ceiling_mb)
            .with_sweep_interval(Duration::from_millis(self.sweep_interval_ms))
            .with_pressure_interval(Duration::from_millis(self.pressure_interval_ms))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
