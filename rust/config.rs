//! Process-wide tunables.
//!
//! Values start from [`Config::default`], overridden by environment variables on first
//! access, and may be replaced at runtime with [`set`]:
//!
//! - `THTENSOR_PARALLEL_THRESHOLD`: minimum element count before elementwise kernels fan out
//! - `THTENSOR_RENORM_EPSILON`: added to the norm in `renorm` before dividing
//! - `THTENSOR_HISTC_EPSILON`: shaved off the bin count in `histc` so the maximum lands in the last bin

use std::sync::OnceLock;

use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Contiguous elementwise kernels run on the rayon pool above this many elements.
    pub parallel_threshold: usize,
    pub renorm_epsilon: f64,
    pub histc_epsilon: f64,
    /// Depth of the explicit quicksort stack.
    pub sort_max_levels: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parallel_threshold: 100_000,
            renorm_epsilon: 1e-7,
            histc_epsilon: 1e-6,
            sort_max_levels: 300,
        }
    }
}

impl Config {
    /// Defaults with any well-formed environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_value("THTENSOR_PARALLEL_THRESHOLD") {
            config.parallel_threshold = v;
        }
        if let Some(v) = env_value("THTENSOR_RENORM_EPSILON") {
            config.renorm_epsilon = v;
        }
        if let Some(v) = env_value("THTENSOR_HISTC_EPSILON") {
            config.histc_epsilon = v;
        }
        config
    }
}

fn env_value<V: std::str::FromStr>(name: &str) -> Option<V> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring malformed configuration value");
            None
        }
    }
}

fn cell() -> &'static RwLock<Config> {
    static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();
    CONFIG.get_or_init(|| RwLock::new(Config::from_env()))
}

/// Current configuration.
pub fn get() -> Config {
    *cell().read()
}

/// Replaces the configuration for the whole process.
pub fn set(config: Config) {
    *cell().write() = config;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = Config::default();
        assert_eq!(config.parallel_threshold, 100_000);
        assert_eq!(config.renorm_epsilon, 1e-7);
        assert_eq!(config.histc_epsilon, 1e-6);
        assert_eq!(config.sort_max_levels, 300);
    }

    #[test]
    fn unset_variables_yield_nothing() {
        assert_eq!(env_value::<usize>("THTENSOR_SURELY_UNSET_VARIABLE"), None);
    }
}
