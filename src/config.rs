use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Arogya";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Triage service used when `AROGYA_API_BASE` is unset.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// Local app API address used when `AROGYA_BIND` is unset.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3030";

/// Web shell origin allowed by CORS when `AROGYA_WEB_ORIGIN` is unset.
pub const DEFAULT_WEB_ORIGIN: &str = "http://localhost:3000";

/// File name of the SQLite profile cache inside the data directory.
pub const PROFILE_CACHE_FILE: &str = "profile_cache.db";

/// Log filter applied when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "arogya=info,arogya_lib=info,tower_http=info"
}

/// Get the application data directory.
/// ~/Arogya/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the triage inference service, without trailing slash.
    pub api_base_url: String,
    /// Address the local app API binds to.
    pub bind_addr: SocketAddr,
    /// Origin of the web shell allowed to call the app API.
    pub web_origin: String,
    /// Strict triage form: all three vitals are required.
    pub require_vitals: bool,
    /// Directory holding the local profile cache.
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Build the configuration from `AROGYA_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Empty values count as unset. Unparseable values fall back to the
    /// default and are logged.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base_url = normalize_base_url(
            &get("AROGYA_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        );

        let bind_addr = get("AROGYA_BIND")
            .and_then(|raw| match raw.parse::<SocketAddr>() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "Invalid AROGYA_BIND, using default");
                    None
                }
            })
            .unwrap_or_else(default_bind_addr);

        let require_vitals = get("AROGYA_REQUIRE_VITALS")
            .map(|raw| !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        Self {
            api_base_url,
            bind_addr,
            web_origin: get("AROGYA_WEB_ORIGIN").unwrap_or_else(|| DEFAULT_WEB_ORIGIN.to_string()),
            require_vitals,
            data_dir: get("AROGYA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(app_data_dir),
        }
    }

    /// Path of the SQLite profile cache.
    pub fn profile_cache_path(&self) -> PathBuf {
        self.data_dir.join(PROFILE_CACHE_FILE)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3030))
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> AppConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.web_origin, DEFAULT_WEB_ORIGIN);
        assert!(config.require_vitals);
    }

    #[test]
    fn api_base_trailing_slash_trimmed() {
        let config = config_with(&[("AROGYA_API_BASE", "https://triage.example.org/")]);
        assert_eq!(config.api_base_url, "https://triage.example.org");
    }

    #[test]
    fn empty_api_base_falls_back() {
        let config = config_with(&[("AROGYA_API_BASE", "   ")]);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE);
    }

    #[test]
    fn invalid_bind_falls_back() {
        let config = config_with(&[("AROGYA_BIND", "not-an-address")]);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn require_vitals_can_be_disabled() {
        assert!(!config_with(&[("AROGYA_REQUIRE_VITALS", "false")]).require_vitals);
        assert!(!config_with(&[("AROGYA_REQUIRE_VITALS", "0")]).require_vitals);
        assert!(config_with(&[("AROGYA_REQUIRE_VITALS", "yes")]).require_vitals);
    }

    #[test]
    fn profile_cache_under_data_dir() {
        let config = config_with(&[("AROGYA_DATA_DIR", "/tmp/arogya-test")]);
        assert_eq!(
            config.profile_cache_path(),
            PathBuf::from("/tmp/arogya-test").join(PROFILE_CACHE_FILE)
        );
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("Arogya"));
    }
}
