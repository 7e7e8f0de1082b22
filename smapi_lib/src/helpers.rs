//! Helpers for configuration, access token resolution, base URL handling and timestamps.

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::Error;

/// Public Synthetic Monitoring API endpoint.
pub const DEFAULT_API_URL: &str = "https://synthetic-monitoring-api.grafana.net";

/// Path prefix appended to the base URL by [`Client::new`](crate::Client::new).
pub const API_PREFIX: &str = "/api/v1";

/// Source from which the access token was obtained (for diagnostics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    OnePassword,
    Bitwarden,
    Keepassxc,
}

/// Get the Synthetic Monitoring access token from a secret backend (1Password, Bitwarden, KeePassXC).
///
/// Plain-text tokens in env vars are not read. Configure one backend via its env vars (see [secret](crate::secret)):
/// - 1Password: `SM_OP_ENTRY_PATH` (op://Vault/Item) or `SM_OP_VAULT` + `SM_OP_ITEM`; optional `SM_OP_FIELD` (default ACCESS_TOKEN).
/// - Bitwarden: `SM_BW_ITEM_ID` (login item UUID); optional `SM_BW_SESSION`.
/// - KeePassXC: `SM_KPXC_DB`, `SM_KPXC_ENTRY`; optional `SM_KPXC_ATTRIBUTE` (default Password).
pub fn get_access_token() -> Result<(String, TokenSource), String> {
    if let Some(k) = crate::secret::one_password() {
        if !k.is_empty() {
            return Ok((k, TokenSource::OnePassword));
        }
    }
    if let Some(k) = crate::secret::bitwarden() {
        if !k.is_empty() {
            return Ok((k, TokenSource::Bitwarden));
        }
    }
    if let Some(k) = crate::secret::keepassxc() {
        if !k.is_empty() {
            return Ok((k, TokenSource::Keepassxc));
        }
    }
    Err(
        "access token not found. Configure a secret backend: SM_OP_ENTRY_PATH (1Password), \
         SM_BW_ITEM_ID (Bitwarden), or SM_KPXC_DB+SM_KPXC_ENTRY (KeePassXC), or register with install."
            .to_string(),
    )
}

/// API base URL from `SM_API_URL`, or [`DEFAULT_API_URL`].
pub fn api_url_from_env() -> String {
    std::env::var("SM_API_URL")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

/// Normalize a server URL into the API base: clean the path and append [`API_PREFIX`].
///
/// `https://host`, `https://host/` and `https://host//` all become `https://host/api/v1`.
pub fn api_base_url(base_url: &str) -> Result<String, Error> {
    let mut u = parse(base_url)?;
    let path = clean_path(&format!("{}{}", u.path(), API_PREFIX));
    u.set_path(&path);
    Ok(u.as_str().trim_end_matches('/').to_string())
}

/// Normalize a datasource proxy URL: the path is kept as is, minus a trailing slash.
pub fn datasource_base_url(base_url: &str) -> Result<String, Error> {
    let mut u = parse(base_url)?;
    let path = u.path().trim_end_matches('/').to_string();
    u.set_path(&path);
    Ok(u.as_str().trim_end_matches('/').to_string())
}

fn parse(base_url: &str) -> Result<Url, Error> {
    Url::parse(base_url).map_err(|source| Error::InvalidBaseUrl {
        url: base_url.to_string(),
        source,
    })
}

/// Collapse empty segments; `.` and `..` were already resolved by the URL parser.
fn clean_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Convert an API timestamp (Unix seconds, possibly fractional) into a UTC time.
///
/// Zero means "not set" and yields `None`.
pub fn timestamp_to_datetime(ts: f64) -> Option<DateTime<Utc>> {
    if ts == 0.0 || !ts.is_finite() {
        return None;
    }
    let secs = ts.trunc() as i64;
    let nanos = ((ts.fract()) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_url() {
        assert_eq!(
            api_base_url("https://host").unwrap(),
            "https://host/api/v1"
        );
        assert_eq!(
            api_base_url("https://host/").unwrap(),
            "https://host/api/v1"
        );
        assert_eq!(
            api_base_url("http://127.0.0.1:8080//").unwrap(),
            "http://127.0.0.1:8080/api/v1"
        );
        assert_eq!(
            api_base_url("https://host/sm/").unwrap(),
            "https://host/sm/api/v1"
        );
    }

    #[test]
    fn test_datasource_base_url() {
        let u = "https://grafana.example/api/datasources/proxy/42";
        assert_eq!(datasource_base_url(u).unwrap(), u);
        assert_eq!(datasource_base_url(&format!("{}/", u)).unwrap(), u);
        assert_eq!(
            datasource_base_url("https://grafana.example/").unwrap(),
            "https://grafana.example"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            api_base_url("://"),
            Err(Error::InvalidBaseUrl { .. })
        ));
        assert!(datasource_base_url("not a url").is_err());
    }

    #[test]
    fn test_timestamp_to_datetime() {
        assert!(timestamp_to_datetime(0.0).is_none());
        let dt = timestamp_to_datetime(1_600_000_000.5).unwrap();
        assert_eq!(dt.timestamp(), 1_600_000_000);
        assert_eq!(dt.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_timestamp_to_datetime_calendar() {
        let dt = timestamp_to_datetime(1_600_000_000.0).unwrap();
        assert_eq!(dt.to_rfc3339(), "2020-09-13T12:26:40+00:00");
        assert!(timestamp_to_datetime(f64::NAN).is_none());
    }
}
