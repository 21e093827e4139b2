//! Service configuration read from the environment.
//!
//! # Environment Variables
//!
//! - `SHELTERFINDER_DATA_DIR`: directory holding the shelter CSV (default: `.`)
//! - `SERVICE_HOST`: bind address (default: `0.0.0.0`)
//! - `SERVICE_PORT` or `PORT`: bind port (default: `8000`)
//! - `SHELTERFINDER_PRELOAD`: load the dataset at startup (default: `false`)
//! - `GOOGLE_MAPS_API_KEY` or `GOOGLE_API_KEY`: geocoding credential (optional)
//! - `GEOCODE_ENDPOINT`: geocoding endpoint override
//! - `GEOCODE_TIMEOUT_SECS`: geocoding timeout in seconds (default: `10`)

use std::path::PathBuf;
use std::time::Duration;

use shelterfinder_lib::geocode::{GeocoderConfig, DEFAULT_GEOCODE_ENDPOINT, DEFAULT_GEOCODE_TIMEOUT};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Runtime configuration for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory searched for the candidate shelter CSV files.
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    /// Load the dataset before accepting traffic.
    pub preload: bool,
    /// `None` when no geocoding credential is configured.
    pub geocoder: Option<GeocoderConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            preload: false,
            geocoder: None,
        }
    }
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = var("SHELTERFINDER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let host = var("SERVICE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = var("SERVICE_PORT")
            .or_else(|| var("PORT"))
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let preload = var("SHELTERFINDER_PRELOAD")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let geocoder = var("GOOGLE_MAPS_API_KEY")
            .or_else(|| var("GOOGLE_API_KEY"))
            .map(|api_key| {
                let timeout = var("GEOCODE_TIMEOUT_SECS")
                    .and_then(|secs| secs.parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_GEOCODE_TIMEOUT);
                GeocoderConfig::new(api_key)
                    .with_endpoint(
                        var("GEOCODE_ENDPOINT")
                            .unwrap_or_else(|| DEFAULT_GEOCODE_ENDPOINT.to_string()),
                    )
                    .with_timeout(timeout)
            });

        Self {
            data_dir,
            host,
            port,
            preload,
            geocoder,
        }
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn zip_supported(&self) -> bool {
        self.geocoder.is_some()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServiceConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = config(&[]);
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert!(!config.preload);
        assert!(!config.zip_supported());
    }

    #[test]
    fn port_falls_back_to_port_variable() {
        assert_eq!(config(&[("PORT", "9000")]).port, 9000);
        assert_eq!(
            config(&[("SERVICE_PORT", "7000"), ("PORT", "9000")]).port,
            7000
        );
        assert_eq!(config(&[("SERVICE_PORT", "http")]).port, DEFAULT_PORT);
    }

    #[test]
    fn geocoder_requires_api_key() {
        let without_key = config(&[("GEOCODE_TIMEOUT_SECS", "3")]);
        assert!(without_key.geocoder.is_none());

        let with_key = config(&[("GOOGLE_API_KEY", "secret"), ("GEOCODE_TIMEOUT_SECS", "3")]);
        let geocoder = with_key.geocoder.expect("geocoder configured");
        assert_eq!(geocoder.api_key, "secret");
        assert_eq!(geocoder.timeout, Duration::from_secs(3));
        assert_eq!(geocoder.endpoint, DEFAULT_GEOCODE_ENDPOINT);
    }

    #[test]
    fn blank_api_key_is_ignored() {
        assert!(config(&[("GOOGLE_MAPS_API_KEY", "  ")]).geocoder.is_none());
    }

    #[test]
    fn preload_flag_parsing() {
        assert!(config(&[("SHELTERFINDER_PRELOAD", "TRUE")]).preload);
        assert!(config(&[("SHELTERFINDER_PRELOAD", "1")]).preload);
        assert!(!config(&[("SHELTERFINDER_PRELOAD", "no")]).preload);
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let config = config(&[("SERVICE_HOST", "::1"), ("SERVICE_PORT", "8080")]);
        assert_eq!(config.bind_addr(), "[::1]:8080");
    }
}
