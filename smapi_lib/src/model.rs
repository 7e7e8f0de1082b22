//! Request and response types for the Synthetic Monitoring API.
//!
//! Field names follow the API's camelCase JSON. Records carry an `extra` map
//! so that fields this crate does not know about survive a read-modify-write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::helpers::timestamp_to_datetime;

pub const INSTANCE_TYPE_PROMETHEUS: &str = "prometheus";
pub const INSTANCE_TYPE_LOGS: &str = "logs";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationInstallRequest {
    pub stack_id: i64,
    pub metrics_instance_id: i64,
    pub logs_instance_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationInstallResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_info: Option<TenantDescription>,
}

/// Legacy admin-token registration request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {
    #[serde(rename = "apiToken")]
    pub admin_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_info: Option<TenantDescription>,
    #[serde(default)]
    pub instances: Vec<HostedInstance>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(rename = "apiToken")]
    pub admin_token: String,
    pub metrics_instance_id: i64,
    pub logs_instance_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantDescription {
    pub id: i64,
    #[serde(default)]
    pub metric_instance: HostedInstance,
    #[serde(default)]
    pub log_instance: HostedInstance,
}

/// A hosted metrics or logs instance the tenant publishes to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedInstance {
    #[serde(default)]
    pub id: i64,
    /// [`INSTANCE_TYPE_PROMETHEUS`] or [`INSTANCE_TYPE_LOGS`].
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreateResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDeleteResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefreshResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenValidateResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
    #[serde(default)]
    pub is_valid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

/// A probe: a worker that runs checks. Server-assigned fields are `id`,
/// `tenant_id`, `online_change`, `created` and `modified`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Probe {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub latitude: f32,
    pub longitude: f32,
    pub labels: Vec<Label>,
    pub region: String,
    pub public: bool,
    pub online: bool,
    pub online_change: f64,
    pub deprecated: bool,
    pub created: f64,
    pub modified: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Probe {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp_to_datetime(self.created)
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        timestamp_to_datetime(self.modified)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeAddResponse {
    pub probe: Probe,
    #[serde(default, with = "base64_bytes")]
    pub token: Vec<u8>,
}

/// Response to `/probe/update`. `token` is only set when a reset was requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeUpdateResponse {
    pub probe: Probe,
    #[serde(
        default,
        with = "base64_bytes_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeDeleteResponse {
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub probe_id: i64,
}

/// A scheduled synthetic test. `settings` holds the check-type specific
/// configuration (ping, http, dns, tcp, ...) untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Check {
    pub id: i64,
    pub tenant_id: i64,
    pub frequency: i64,
    pub offset: i64,
    pub timeout: i64,
    pub enabled: bool,
    pub labels: Vec<Label>,
    pub settings: Value,
    pub probes: Vec<i64>,
    pub target: String,
    pub job: String,
    pub basic_metrics_only: bool,
    pub alert_sensitivity: String,
    pub created: f64,
    pub modified: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Check {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp_to_datetime(self.created)
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        timestamp_to_datetime(self.modified)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDeleteResponse {
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub check_id: i64,
}

/// Alert configured on a check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAlert {
    pub name: String,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub period: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runbook_url: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub modified: i64,
}

/// Alert as reported by the server, including its current state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckAlertWithStatus {
    #[serde(flatten)]
    pub alert: CheckAlert,
    #[serde(default)]
    pub status: String,
}

impl std::ops::Deref for CheckAlertWithStatus {
    type Target = CheckAlert;

    fn deref(&self) -> &CheckAlert {
        &self.alert
    }
}

/// Wire wrapper for the alerts sub-resource: `{"alerts": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckAlerts<T> {
    #[serde(default = "Vec::new")]
    pub alerts: Vec<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteInfo {
    pub name: String,
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Tenant state; numeric on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum TenantStatus {
    #[default]
    Active,
    Disabled,
    Unknown(i32),
}

impl From<i32> for TenantStatus {
    fn from(v: i32) -> Self {
        match v {
            0 => TenantStatus::Active,
            1 => TenantStatus::Disabled,
            other => TenantStatus::Unknown(other),
        }
    }
}

impl From<TenantStatus> for i32 {
    fn from(s: TenantStatus) -> Self {
        match s {
            TenantStatus::Active => 0,
            TenantStatus::Disabled => 1,
            TenantStatus::Unknown(v) => v,
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantStatus::Active => f.write_str("ACTIVE"),
            TenantStatus::Disabled => f.write_str("DISABLED"),
            TenantStatus::Unknown(v) => write!(f, "UNKNOWN({})", v),
        }
    }
}

/// The tenant the access token belongs to. Remote passwords come back redacted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tenant {
    pub id: i64,
    pub org_id: i64,
    pub stack_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_remote: Option<RemoteInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_remote: Option<RemoteInfo>,
    pub status: TenantStatus,
    pub reason: String,
    pub created: f64,
    pub modified: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tenant {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp_to_datetime(self.created)
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        timestamp_to_datetime(self.modified)
    }
}

// Probe tokens are raw bytes, carried as standard base64 strings.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s: Option<String> = Option::deserialize(d)?;
        match s {
            Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

mod base64_bytes_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_str(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(d)?;
        s.filter(|s| !s.is_empty())
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
