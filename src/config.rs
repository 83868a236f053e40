//! Runtime configuration for the binding layer.

/// Environment variable naming the dedicated owner thread.
pub const ENV_OWNER_THREAD: &str = "QLIPHOTH_OWNER_THREAD";

/// Environment variable capping the number of live headless windows.
pub const ENV_WINDOW_LIMIT: &str = "QLIPHOTH_WINDOW_LIMIT";

/// Largest coordinate an X11 server accepts for window geometry.
pub const DEFAULT_COORDINATE_LIMIT: i32 = 32767;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConfig {
    /// Name given to the thread started by [`OwnerThread::spawn`](crate::owner::OwnerThread::spawn)
    pub owner_thread_name: String,
    /// Maximum number of live windows a headless backend hands out (None = unlimited)
    pub window_limit: Option<usize>,
    /// Geometry clamp applied by the headless backend
    pub coordinate_limit: i32,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            owner_thread_name: "qliphoth-owner".to_string(),
            window_limit: None,
            coordinate_limit: DEFAULT_COORDINATE_LIMIT,
        }
    }
}

impl BindingConfig {
    /// Defaults, overridden by `QLIPHOTH_*` environment variables when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_OWNER_THREAD) {
            if name.trim().is_empty() {
                log::warn!("{} is empty, keeping '{}'", ENV_OWNER_THREAD, config.owner_thread_name);
            } else {
                config.owner_thread_name = name;
            }
        }

        if let Some(raw) = lookup(ENV_WINDOW_LIMIT) {
            match raw.trim().parse::<usize>() {
                Ok(limit) => config.window_limit = Some(limit),
                Err(e) => log::warn!("Ignoring {}={:?}: {}", ENV_WINDOW_LIMIT, raw, e),
            }
        }

        config
    }

    pub fn with_owner_thread_name(mut self, name: impl Into<String>) -> Self {
        self.owner_thread_name = name.into();
        self
    }

    pub fn with_window_limit(mut self, limit: usize) -> Self {
        self.window_limit = Some(limit);
        self
    }

    pub fn with_coordinate_limit(mut self, limit: i32) -> Self {
        self.coordinate_limit = limit.max(1);
        self
    }
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = BindingConfig::from_lookup(|_| None);
        assert_eq!(config, BindingConfig::default());
        assert_eq!(config.coordinate_limit, 32767);
    }

    #[test]
    fn test_environment_overrides() {
        let config = BindingConfig::from_lookup(lookup_from(&[
            (ENV_OWNER_THREAD, "ui-main"),
            (ENV_WINDOW_LIMIT, " 12 "),
        ]));
        assert_eq!(config.owner_thread_name, "ui-main");
        assert_eq!(config.window_limit, Some(12));
    }

    #[test]
    fn test_invalid_overrides_keep_defaults() {
        let config = BindingConfig::from_lookup(lookup_from(&[
            (ENV_OWNER_THREAD, "   "),
            (ENV_WINDOW_LIMIT, "lots"),
        ]));
        assert_eq!(config.owner_thread_name, "qliphoth-owner");
        assert_eq!(config.window_limit, None);
    }

    #[test]
    fn test_coordinate_limit_never_below_one() {
        let config = BindingConfig::default().with_coordinate_limit(-5);
        assert_eq!(config.coordinate_limit, 1);
    }
}
