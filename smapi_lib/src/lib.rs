//! Synthetic Monitoring API client library.
//!
//! Provides a typed client for the Synthetic Monitoring control-plane REST API:
//! tenant registration, access token lifecycle, probes, checks, check alerts and
//! the tenant record.

pub mod client;
pub mod error;
pub mod helpers;
pub mod model;
pub mod secret;

pub use client::{validate_response, Client, DEFAULT_CLIENT_ID};
pub use error::{ApiMessage, Error, HttpError, Result};
pub use helpers::{api_url_from_env, get_access_token, TokenSource, API_PREFIX, DEFAULT_API_URL};
pub use model::{Check, CheckAlert, CheckAlertWithStatus, Probe, Tenant};

/// Library version, sent as the default `X-Client-Version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
