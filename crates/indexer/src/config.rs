// crates/indexer/src/config.rs
//! Runtime configuration, read once from the environment at boot and passed
//! explicitly to every component.

use std::path::PathBuf;

use dex_core::ONE_WEEK_SECS;

/// All tunables for a session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for the catalog, queue, and sink files.
    pub data_dir: PathBuf,
    /// Root of the per-(worker, repo) working directories.
    pub workdir: PathBuf,
    /// Number of workers.
    pub workers: u32,
    /// Retry ceiling shared by feed eligibility (`<`) and on-report (`>=`).
    pub max_retries: i64,
    /// Rows selected per feed cycle.
    pub feed_size: i64,
    /// Exponential smoothing constant, in `(0, 1]`.
    pub smoothing_constant: f64,
    /// Upper clamp on the controller's sleep, seconds.
    pub max_sleep_secs: f64,
    /// Feed debounce window, seconds.
    pub debounce_secs: u64,
    /// Boot cool-off between connection phases, seconds.
    pub cooling_secs: u64,
    /// Pause between worker spawns, milliseconds.
    pub worker_cooling_ms: u64,
    /// Sector width for the metric sampler, seconds.
    pub sector_resolution: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("dex-data"),
            workdir: PathBuf::from("dex-data/workspace"),
            workers: 4,
            max_retries: 3,
            feed_size: 100,
            smoothing_constant: 0.3,
            max_sleep_secs: 10.0,
            debounce_secs: 10,
            cooling_secs: 3,
            worker_cooling_ms: 200,
            sector_resolution: ONE_WEEK_SECS,
        }
    }
}

impl Config {
    /// Build from `DEX_*` environment variables, defaults for anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let data_dir = lookup("DEX_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let workdir = lookup("DEX_WORKDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("workspace"));

        let mut config = Self {
            data_dir,
            workdir,
            workers: parse(&lookup, "DEX_WORKERS", defaults.workers),
            max_retries: parse(&lookup, "DEX_MAX_RETRIES", defaults.max_retries),
            feed_size: parse(&lookup, "DEX_FEED_SIZE", defaults.feed_size),
            smoothing_constant: parse(
                &lookup,
                "DEX_SMOOTHING_CONSTANT",
                defaults.smoothing_constant,
            ),
            max_sleep_secs: parse(&lookup, "DEX_MAX_SLEEP", defaults.max_sleep_secs),
            debounce_secs: parse(&lookup, "DEX_DEBOUNCE", defaults.debounce_secs),
            cooling_secs: parse(&lookup, "DEX_COOLING", defaults.cooling_secs),
            worker_cooling_ms: parse(&lookup, "DEX_WORKER_COOLING_MS", defaults.worker_cooling_ms),
            sector_resolution: parse(
                &lookup,
                "DEX_SECTOR_RESOLUTION",
                defaults.sector_resolution,
            ),
        };

        // The smoothing constant must lie in (0, 1].
        if !(config.smoothing_constant > 0.0 && config.smoothing_constant <= 1.0) {
            tracing::warn!(
                value = config.smoothing_constant,
                "smoothing constant out of (0, 1], using default"
            );
            config.smoothing_constant = defaults.smoothing_constant;
        }

        config
    }

    /// `FEED_BUFFER`: 20% of the feed size.
    pub fn feed_buffer(&self) -> f64 {
        self.feed_size as f64 * 0.2
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.db")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join("queue.db")
    }

    pub fn sink_dir(&self) -> PathBuf {
        self.data_dir.join("sink")
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.workers, 4);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.feed_size, 100);
        assert_eq!(config.sector_resolution, ONE_WEEK_SECS);
        assert_eq!(config.workdir, PathBuf::from("dex-data/workspace"));
        assert!((config.feed_buffer() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DEX_DATA_DIR", "/var/dex"),
            ("DEX_WORKERS", "8"),
            ("DEX_FEED_SIZE", "50"),
            ("DEX_MAX_SLEEP", "2.5"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/var/dex"));
        assert_eq!(config.workdir, PathBuf::from("/var/dex/workspace"));
        assert_eq!(config.workers, 8);
        assert_eq!(config.feed_size, 50);
        assert!((config.max_sleep_secs - 2.5).abs() < 1e-9);
        assert!((config.feed_buffer() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_smoothing_constant_clamped() {
        for bad in ["0", "-0.5", "1.5", "nonsense"] {
            let config = Config::from_lookup(lookup_from(&[("DEX_SMOOTHING_CONSTANT", bad)]));
            assert!(
                config.smoothing_constant > 0.0 && config.smoothing_constant <= 1.0,
                "{bad} should fall back into range"
            );
        }
        let config = Config::from_lookup(lookup_from(&[("DEX_SMOOTHING_CONSTANT", "1.0")]));
        assert!((config.smoothing_constant - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_storage_paths_under_data_dir() {
        let config = Config::from_lookup(lookup_from(&[("DEX_DATA_DIR", "/srv/dex")]));
        assert_eq!(config.catalog_path(), PathBuf::from("/srv/dex/catalog.db"));
        assert_eq!(config.queue_path(), PathBuf::from("/srv/dex/queue.db"));
        assert_eq!(config.sink_dir(), PathBuf::from("/srv/dex/sink"));
    }
}
