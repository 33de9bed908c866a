// Application configuration, read from the environment

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3200";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub redis_url: String,
    pub bind_addr: String,
    /// Extra time allowed for a worker verdict on top of the question's own timeout
    pub runner_timeout_ms: u64,
    pub runner_poll_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        Self {
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            runner_timeout_ms: number("RUNNER_TIMEOUT_MS", 10_000),
            runner_poll_ms: number("RUNNER_POLL_MS", 100).max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.runner_timeout_ms, 10_000);
        assert_eq!(config.runner_poll_ms, 100);
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let vars: HashMap<&str, &str> = [
            ("REDIS_URL", "redis://cache:6379"),
            ("RUNNER_TIMEOUT_MS", "2500"),
            ("RUNNER_POLL_MS", "soon"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.redis_url, "redis://cache:6379");
        assert_eq!(config.runner_timeout_ms, 2500);
        assert_eq!(config.runner_poll_ms, 100);
    }
}
