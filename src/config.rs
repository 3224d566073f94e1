//! Application settings, read from `appsettings.json`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::error::IngressError;
use crate::omf::Compression;
use crate::parser::ALL;
use crate::sink::{DEFAULT_EDS_PORT, SinkConfig};

pub const DEFAULT_CONFIG_PATH: &str = "appsettings.json";

/// Settings for the BART source and every OMF destination.
///
/// Stored as a JSON object on disk:
/// ```json
/// {
///   "bart_api_key": "MW9S-E7SL-26DU-VV8V",
///   "bart_api_orig": "12TH",
///   "bart_api_dest": "all",
///   "send_to_eds": true,
///   "eds_port": 5590
/// }
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bart_api_key: String,
    pub bart_api_orig: String,
    pub bart_api_dest: String,

    pub send_to_cds: bool,
    pub cds_uri: Option<String>,
    pub cds_tenant_id: Option<String>,
    pub cds_namespace_id: Option<String>,
    pub cds_client_id: Option<String>,
    pub cds_client_secret: Option<String>,

    pub send_to_eds: bool,
    pub eds_port: u16,

    pub send_to_pi: bool,
    pub pi_web_api_uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Turning this off is only meant for test servers with self-signed certificates.
    pub validate_endpoint_certificate: bool,

    pub interval_secs: u64,
    pub gzip: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bart_api_key: String::new(),
            bart_api_orig: ALL.to_string(),
            bart_api_dest: ALL.to_string(),
            send_to_cds: false,
            cds_uri: None,
            cds_tenant_id: None,
            cds_namespace_id: None,
            cds_client_id: None,
            cds_client_secret: None,
            send_to_eds: false,
            eds_port: DEFAULT_EDS_PORT,
            send_to_pi: false,
            pi_web_api_uri: None,
            username: None,
            password: None,
            validate_endpoint_certificate: true,
            interval_secs: 10,
            gzip: false,
        }
    }
}

impl Settings {
    /// Loads settings from the JSON file at `path`.
    ///
    /// `BART_API_KEY`, when set, replaces the key from the file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {path}"))?;
        let mut settings = Self::from_json(&content)
            .with_context(|| format!("parsing settings in {path}"))?;

        if let Ok(key) = std::env::var("BART_API_KEY") {
            settings.bart_api_key = key;
        }
        Ok(settings)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn compression(&self) -> Compression {
        if self.gzip {
            Compression::Gzip
        } else {
            Compression::None
        }
    }

    /// One [`SinkConfig`] per enabled destination.
    ///
    /// # Errors
    ///
    /// [`IngressError::Config`] if an enabled destination is missing a field,
    /// or if the key or interval are unusable.
    pub fn sink_configs(&self) -> Result<Vec<SinkConfig>, IngressError> {
        if self.bart_api_key.trim().is_empty() {
            return Err(IngressError::Config("bart_api_key is required".to_string()));
        }
        if self.interval_secs == 0 {
            return Err(IngressError::Config("interval_secs must be at least 1".to_string()));
        }

        let mut sinks = Vec::new();

        if self.send_to_cds {
            sinks.push(SinkConfig::managed_cloud(
                required(&self.cds_uri, "cds_uri")?,
                required(&self.cds_tenant_id, "cds_tenant_id")?,
                required(&self.cds_namespace_id, "cds_namespace_id")?,
                required(&self.cds_client_id, "cds_client_id")?,
                required(&self.cds_client_secret, "cds_client_secret")?,
            ));
        }

        if self.send_to_eds {
            sinks.push(SinkConfig::local_edge(self.eds_port));
        }

        if self.send_to_pi {
            sinks.push(SinkConfig::web_api(
                required(&self.pi_web_api_uri, "pi_web_api_uri")?,
                required(&self.username, "username")?,
                required(&self.password, "password")?,
                self.validate_endpoint_certificate,
            ));
        }

        Ok(sinks)
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, IngressError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| IngressError::Config(format!("{name} is required for the enabled destination")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{SinkAuth, SinkKind};

    #[test]
    fn test_defaults() {
        let settings = Settings::from_json(r#"{"bart_api_key": "k"}"#).unwrap();

        assert_eq!(settings.bart_api_orig, "all");
        assert_eq!(settings.bart_api_dest, "all");
        assert_eq!(settings.eds_port, 5590);
        assert_eq!(settings.interval(), Duration::from_secs(10));
        assert!(settings.validate_endpoint_certificate);
        assert_eq!(settings.compression(), Compression::None);
        assert!(settings.sink_configs().unwrap().is_empty());
    }

    #[test]
    fn test_all_destinations_enabled() {
        let settings = Settings::from_json(
            r#"{
                "bart_api_key": "k",
                "send_to_cds": true,
                "cds_uri": "https://cloud.example.com",
                "cds_tenant_id": "t",
                "cds_namespace_id": "n",
                "cds_client_id": "id",
                "cds_client_secret": "secret",
                "send_to_eds": true,
                "eds_port": 5591,
                "send_to_pi": true,
                "pi_web_api_uri": "https://pi/piwebapi",
                "username": "u",
                "password": "p",
                "validate_endpoint_certificate": false
            }"#,
        )
        .unwrap();

        let sinks = settings.sink_configs().unwrap();
        let kinds: Vec<_> = sinks.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SinkKind::ManagedCloud, SinkKind::LocalEdge, SinkKind::WebApi]);
        assert_eq!(
            sinks[1].base_address,
            "http://localhost:5591/api/v1/tenants/default/namespaces/default/omf"
        );
        assert!(!sinks[2].validate_certificate);
        assert_eq!(
            sinks[2].auth,
            SinkAuth::Basic {
                username: "u".to_string(),
                password: "p".to_string()
            }
        );
    }

    #[test]
    fn test_enabled_destination_missing_field() {
        let settings =
            Settings::from_json(r#"{"bart_api_key": "k", "send_to_pi": true, "username": "u"}"#)
                .unwrap();

        let err = settings.sink_configs().unwrap_err();
        assert!(matches!(err, IngressError::Config(msg) if msg.contains("pi_web_api_uri")));
    }

    #[test]
    fn test_missing_api_key() {
        let settings = Settings::from_json("{}").unwrap();
        assert!(matches!(settings.sink_configs(), Err(IngressError::Config(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let settings = Settings::from_json(r#"{"bart_api_key": "k", "interval_secs": 0}"#).unwrap();
        assert!(matches!(settings.sink_configs(), Err(IngressError::Config(_))));
    }
}
