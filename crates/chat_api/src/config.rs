use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use tracing::warn;

use crate::retry::RetryPolicy;
use crate::url::DEFAULT_BASE_URL;

pub const BASE_URL_ENV: &str = "CHAT_API_BASE_URL";
pub const TIMEOUT_ENV: &str = "CHAT_API_TIMEOUT_SECS";
pub const USER_AGENT_ENV: &str = "CHAT_API_USER_AGENT";

/// Transport configuration for chat service requests.
#[derive(Debug, Clone)]
pub struct ChatApiConfig {
    /// Origin of the chat service; endpoint paths are appended to it.
    pub base_url: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into every request.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional request timeout. Applies to whole streamed responses too.
    pub timeout: Option<Duration>,
    /// Backoff for history loads.
    pub retry: RetryPolicy,
}

impl Default for ChatApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ChatApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `CHAT_API_*` variables; unset or blank values
    /// keep the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(base_url) = env_string_opt(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        if let Some(raw) = env_string_opt(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Some(Duration::from_secs(secs)),
                _ => warn!(key = TIMEOUT_ENV, value = %raw, "ignoring invalid timeout"),
            }
        }
        config.user_agent = env_string_opt(USER_AGENT_ENV);
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    use super::{ChatApiConfig, BASE_URL_ENV, TIMEOUT_ENV, USER_AGENT_ENV};
    use crate::url::DEFAULT_BASE_URL;

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    #[test]
    fn env_defaults_apply_when_unset() {
        let _lock = env_lock();
        let _g1 = set_env_guard(BASE_URL_ENV, None);
        let _g2 = set_env_guard(TIMEOUT_ENV, None);
        let _g3 = set_env_guard(USER_AGENT_ENV, None);

        let config = ChatApiConfig::from_env();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.timeout.is_none());
        assert!(config.user_agent.is_none());
    }

    #[test]
    fn env_values_override_defaults() {
        let _lock = env_lock();
        let _g1 = set_env_guard(BASE_URL_ENV, Some("http://127.0.0.1:6190"));
        let _g2 = set_env_guard(TIMEOUT_ENV, Some("30"));
        let _g3 = set_env_guard(USER_AGENT_ENV, Some("transcript-test"));

        let config = ChatApiConfig::from_env();
        assert_eq!(config.base_url, "http://127.0.0.1:6190");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.user_agent.as_deref(), Some("transcript-test"));
    }

    #[test]
    fn blank_and_invalid_values_are_ignored() {
        let _lock = env_lock();
        let _g1 = set_env_guard(BASE_URL_ENV, Some("  "));
        let _g2 = set_env_guard(TIMEOUT_ENV, Some("soon"));
        let _g3 = set_env_guard(USER_AGENT_ENV, None);

        let config = ChatApiConfig::from_env();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.timeout.is_none());
    }
}
