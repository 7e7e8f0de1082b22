//! Shared fixtures: one org (1000) owning tenant 2000 and stack 3.

#![allow(dead_code)]

use serde_json::{json, Value};
use smapi_lib::Client;
use wiremock::{MockServer, ResponseTemplate};

pub const ORG_ID: i64 = 1000;
pub const TENANT_ID: i64 = 2000;
pub const TENANT_TOKEN: &str = "token-tenant-2000";
pub const PUBLISHER_TOKEN: &str = "publisher-token-org-1000";
pub const ADMIN_TOKEN: &str = "token-org-1000";
pub const INVALID_TOKEN: &str = "invalid token";

pub const STACK_ID: i64 = 3;
pub const METRICS_INSTANCE_ID: i64 = 1;
pub const LOGS_INSTANCE_ID: i64 = 2;

pub const PROBE_ID: i64 = 1;
/// `[0x01, 0x02, 0x03, 0x04]` in base64.
pub const PROBE_TOKEN_B64: &str = "AQIDBA==";

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn client(server: &MockServer, token: &str) -> Client {
    Client::new(&server.uri(), token, None).expect("client")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Error body in the server's `{msg, err}` format.
pub fn error_response(code: u16, msg: &str) -> ResponseTemplate {
    ResponseTemplate::new(code).set_body_json(json!({ "msg": msg }))
}

pub fn ok_json(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}
