//! Sync timing configuration and server address handling.
//!
//! `SyncSettings` is shared by the CLI profiles and the sync service so both
//! agree on intervals and the offline switch.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_LAZY_INTERVAL_SECS: u64 = 5;
const DEFAULT_NETWORK_RETRY_SECS: u64 = 30;
const DEFAULT_PERIODIC_SECS: u64 = 15 * 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Timing and mode switches for background sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncSettings {
    /// Debounce window for syncs triggered by local writes
    pub lazy_interval_secs: u64,
    /// Delay before retrying after a network failure
    pub network_retry_interval_secs: u64,
    /// Delay between cycles when nothing went wrong
    pub periodic_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Never contact the server; local writes still work.
    pub offline_mode: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            lazy_interval_secs: DEFAULT_LAZY_INTERVAL_SECS,
            network_retry_interval_secs: DEFAULT_NETWORK_RETRY_SECS,
            periodic_interval_secs: DEFAULT_PERIODIC_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            offline_mode: false,
        }
    }
}

impl SyncSettings {
    pub const fn lazy_interval(&self) -> Duration {
        Duration::from_secs(self.lazy_interval_secs)
    }

    pub const fn network_retry_interval(&self) -> Duration {
        Duration::from_secs(self.network_retry_interval_secs)
    }

    pub const fn periodic_interval(&self) -> Duration {
        Duration::from_secs(self.periodic_interval_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Replace zero intervals with their defaults.
    #[must_use]
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let pick = |value: u64, fallback: u64| if value == 0 { fallback } else { value };
        Self {
            lazy_interval_secs: pick(self.lazy_interval_secs, defaults.lazy_interval_secs),
            network_retry_interval_secs: pick(
                self.network_retry_interval_secs,
                defaults.network_retry_interval_secs,
            ),
            periodic_interval_secs: pick(
                self.periodic_interval_secs,
                defaults.periodic_interval_secs,
            ),
            request_timeout_secs: pick(self.request_timeout_secs, defaults.request_timeout_secs),
            offline_mode: self.offline_mode,
        }
    }
}

/// Build the service base URL from a configured server address.
///
/// Accepts either a bare host (`todo.example.com:8080`), which gets a scheme
/// from `use_https`, or a full `http(s)://` URL, which is kept as is. Trailing
/// slashes are dropped. Returns `None` for blank input.
pub fn server_base_url(address: &str, use_https: bool) -> Option<String> {
    let address = normalize_text_option(Some(address.to_string()))?;
    let address = address.trim_end_matches('/');
    if address.is_empty() {
        return None;
    }

    if is_http_url(address) {
        Some(address.to_string())
    } else {
        let scheme = if use_https { "https" } else { "http" };
        Some(format!("{scheme}://{address}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_timings() {
        let settings = SyncSettings::default();
        assert_eq!(settings.lazy_interval(), Duration::from_secs(5));
        assert_eq!(settings.network_retry_interval(), Duration::from_secs(30));
        assert_eq!(settings.periodic_interval(), Duration::from_secs(900));
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));
        assert!(!settings.offline_mode);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let settings: SyncSettings =
            serde_json::from_str(r#"{"periodic_interval_secs": 60}"#).unwrap();
        assert_eq!(settings.periodic_interval_secs, 60);
        assert_eq!(settings.lazy_interval_secs, DEFAULT_LAZY_INTERVAL_SECS);
    }

    #[test]
    fn normalized_replaces_zero_intervals() {
        let settings = SyncSettings {
            periodic_interval_secs: 0,
            offline_mode: true,
            ..SyncSettings::default()
        }
        .normalized();
        assert_eq!(settings.periodic_interval_secs, DEFAULT_PERIODIC_SECS);
        assert!(settings.offline_mode);
    }

    #[test]
    fn server_base_url_adds_scheme_to_bare_host() {
        assert_eq!(
            server_base_url("todo.example.com:8080/", true).as_deref(),
            Some("https://todo.example.com:8080")
        );
        assert_eq!(
            server_base_url(" localhost:3000 ", false).as_deref(),
            Some("http://localhost:3000")
        );
    }

    #[test]
    fn server_base_url_keeps_explicit_scheme() {
        assert_eq!(
            server_base_url("http://todo.example.com/", true).as_deref(),
            Some("http://todo.example.com")
        );
        assert_eq!(server_base_url("   ", true), None);
        assert_eq!(server_base_url("/", true), None);
    }
}
