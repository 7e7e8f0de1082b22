//! HTTP client for the Synthetic Monitoring REST API.

use crate::error::{ApiMessage, Error, HttpError, Result};
use crate::helpers::{api_base_url, api_url_from_env, datasource_base_url, get_access_token};
use crate::model::{
    Check, CheckAlert, CheckAlertWithStatus, CheckAlerts, CheckDeleteResponse, InitRequest,
    InitResponse, Probe, ProbeAddResponse, ProbeDeleteResponse, ProbeUpdateResponse,
    RegistrationInstallRequest, RegistrationInstallResponse, SaveRequest, SaveResponse, Tenant,
    TokenCreateResponse, TokenDeleteResponse, TokenRefreshResponse, TokenValidateResponse,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client as HttpClient, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Default value of the `X-Client-ID` header.
pub const DEFAULT_CLIENT_ID: &str = "sm-rust-client";
pub const HEADER_CLIENT_ID: &str = "X-Client-ID";
pub const HEADER_CLIENT_VERSION: &str = "X-Client-Version";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Synthetic Monitoring API client.
///
/// The only mutable state is the access token. Calls that replace or clear it
/// ([`install`](Self::install), [`init`](Self::init),
/// [`refresh_token`](Self::refresh_token), [`delete_token`](Self::delete_token))
/// take `&mut self`; everything else takes `&self` and can run concurrently.
#[derive(Clone)]
pub struct Client {
    http: HttpClient,
    base_url: String,
    /// Empty means unauthenticated.
    access_token: String,
    client_id: Option<String>,
    client_version: Option<String>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.is_authenticated())
            .field("client_id", &self.client_headers().0)
            .field("client_version", &self.client_headers().1)
            .finish()
    }
}

impl Client {
    /// Create a client for the API served at `base_url` (`/api/v1` is appended).
    ///
    /// `access_token` may be empty, in which case only [`install`](Self::install)
    /// and [`init`](Self::init) are usable until a token is obtained. If no HTTP
    /// client is given, one with a 15 second timeout is built.
    pub fn new(
        base_url: &str,
        access_token: impl Into<String>,
        http: Option<HttpClient>,
    ) -> Result<Self> {
        Self::with_base(api_base_url(base_url)?, access_token.into(), http)
    }

    /// Create a client that reaches the API through a Grafana datasource proxy.
    ///
    /// `base_url` is used as is (minus a trailing slash), and `access_token`
    /// should be the Grafana token.
    pub fn new_datasource(
        base_url: &str,
        access_token: impl Into<String>,
        http: Option<HttpClient>,
    ) -> Result<Self> {
        Self::with_base(datasource_base_url(base_url)?, access_token.into(), http)
    }

    /// Create a client from `SM_API_URL` and a configured secret backend.
    ///
    /// Without a secret backend the client starts unauthenticated.
    pub fn from_env() -> Result<Self> {
        let token = match get_access_token() {
            Ok((token, source)) => {
                debug!(?source, "access token loaded from secret backend");
                token
            }
            Err(reason) => {
                debug!(%reason, "starting without access token");
                String::new()
            }
        };
        Self::new(&api_url_from_env(), token, None)
    }

    fn with_base(base_url: String, access_token: String, http: Option<HttpClient>) -> Result<Self> {
        let http = match http {
            Some(http) => http,
            None => HttpClient::builder()
                .timeout(DEFAULT_TIMEOUT)
                .user_agent(format!("{}/{}", DEFAULT_CLIENT_ID, crate::VERSION))
                .build()
                .map_err(|e| Error::transport("building HTTP client", e))?,
        };
        Ok(Self {
            http,
            base_url,
            access_token,
            client_id: None,
            client_version: None,
        })
    }

    /// Normalized API base URL, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The access token in use, or `None` when unauthenticated.
    pub fn access_token(&self) -> Option<&str> {
        if self.access_token.is_empty() {
            None
        } else {
            Some(&self.access_token)
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Replace the access token, e.g. with one saved from an earlier session. Empty clears it.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!(authenticated = self.is_authenticated(), "access token set by caller");
    }

    /// Override the `X-Client-ID` header. An empty string restores the default.
    pub fn set_custom_client_id(&mut self, id: impl Into<String>) {
        self.client_id = Some(id.into()).filter(|s: &String| !s.is_empty());
    }

    /// Override the `X-Client-Version` header. An empty string restores the default.
    pub fn set_custom_client_version(&mut self, version: impl Into<String>) {
        self.client_version = Some(version.into()).filter(|s: &String| !s.is_empty());
    }

    /// Effective `(X-Client-ID, X-Client-Version)` values.
    pub fn client_headers(&self) -> (&str, &str) {
        (
            self.client_id.as_deref().unwrap_or(DEFAULT_CLIENT_ID),
            self.client_version.as_deref().unwrap_or(crate::VERSION),
        )
    }

    /// Set up a tenant for the given stack and hosted metrics/logs instances.
    ///
    /// `publisher_token` authorizes this call in place of the access token.
    /// On success the returned access token is stored in the client. The
    /// arguments are passed to the server unvalidated.
    pub async fn install(
        &mut self,
        stack_id: i64,
        metrics_instance_id: i64,
        logs_instance_id: i64,
        publisher_token: &str,
    ) -> Result<RegistrationInstallResponse> {
        let request = RegistrationInstallRequest {
            stack_id,
            metrics_instance_id,
            logs_instance_id,
        };
        let body = serde_json::to_vec(&request).map_err(Error::CannotEncodeRequest)?;

        let mut headers = json_headers();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", publisher_token))
            .map_err(|_| Error::InvalidArgument("invalid publisher token".to_string()))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let resp = self
            .post("/register/install", false, Some(headers), Some(body))
            .await
            .map_err(|e| e.with_action("sending install request"))?;
        let result: RegistrationInstallResponse =
            decode("registration install request", resp).await?;

        if result.access_token.is_empty() {
            return Err(Error::UnexpectedResponse(
                "install returned an empty access token".to_string(),
            ));
        }
        self.access_token = result.access_token.clone();
        debug!(stack_id, "access token stored after install");

        Ok(result)
    }

    /// Legacy registration: exchange an admin token for an access token.
    ///
    /// The admin token travels in the JSON body. On success the access token is stored.
    pub async fn init(&mut self, admin_token: &str) -> Result<InitResponse> {
        let request = InitRequest {
            admin_token: admin_token.to_string(),
        };
        let resp = self
            .post_json("/register/init", false, &request)
            .await
            .map_err(|e| e.with_action("sending init request"))?;
        let result: InitResponse = decode("registration init request", resp).await?;

        if result.access_token.is_empty() {
            return Err(Error::UnexpectedResponse(
                "init returned an empty access token".to_string(),
            ));
        }
        self.access_token = result.access_token.clone();
        debug!("access token stored after init");

        Ok(result)
    }

    /// Legacy registration: select the hosted instances for a tenant set up with [`init`](Self::init).
    pub async fn save(
        &self,
        admin_token: &str,
        metrics_instance_id: i64,
        logs_instance_id: i64,
    ) -> Result<()> {
        self.require_auth_token()?;
        let request = SaveRequest {
            admin_token: admin_token.to_string(),
            metrics_instance_id,
            logs_instance_id,
        };
        let resp = self
            .post_json("/register/save", true, &request)
            .await
            .map_err(|e| e.with_action("sending save request"))?;
        let _: SaveResponse = decode("registration save request", resp).await?;
        Ok(())
    }

    /// Obtain an additional access token. The token in use is not replaced.
    pub async fn create_token(&self) -> Result<String> {
        self.require_auth_token()?;
        let resp = self
            .post("/token/create", true, None, None)
            .await
            .map_err(|e| e.with_action("creating token"))?;
        let result: TokenCreateResponse = decode("token create request", resp).await?;
        if result.access_token.is_empty() {
            return Err(Error::UnexpectedResponse(
                "token create returned an empty token".to_string(),
            ));
        }
        Ok(result.access_token)
    }

    /// Delete the access token in use. On success the client becomes unauthenticated;
    /// on failure the token is kept.
    pub async fn delete_token(&mut self) -> Result<()> {
        self.require_auth_token()?;
        let resp = self
            .delete("/token/delete", true)
            .await
            .map_err(|e| e.with_action("deleting token"))?;
        let _: TokenDeleteResponse = decode("token delete request", resp).await?;

        self.access_token.clear();
        debug!("access token cleared after delete");
        Ok(())
    }

    /// Replace the access token in use with a new one issued by the server.
    pub async fn refresh_token(&mut self) -> Result<()> {
        self.require_auth_token()?;
        let resp = self
            .post("/token/refresh", true, None, None)
            .await
            .map_err(|e| e.with_action("refreshing token"))?;
        let result: TokenRefreshResponse = decode("token refresh request", resp).await?;

        if result.access_token.is_empty() {
            return Err(Error::UnexpectedResponse(
                "token refresh returned an empty token".to_string(),
            ));
        }
        self.access_token = result.access_token;
        debug!("access token replaced after refresh");
        Ok(())
    }

    /// Ask the server whether the access token in use is still valid.
    pub async fn validate_token(&self) -> Result<()> {
        self.require_auth_token()?;
        let resp = self
            .post("/token/validate", true, None, None)
            .await
            .map_err(|e| e.with_action("validating token"))?;
        let result: TokenValidateResponse = decode("token validate request", resp).await?;
        if !result.is_valid {
            return Err(Error::UnexpectedResponse(
                "server reports the token as invalid".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a probe. Returns the probe with its assigned ID and the token the
    /// probe must use to talk to the API.
    pub async fn add_probe(&self, probe: &Probe) -> Result<(Probe, Vec<u8>)> {
        self.require_auth_token()?;
        let resp = self
            .post_json("/probe/add", true, probe)
            .await
            .map_err(|e| e.with_action("sending probe add request"))?;
        let result: ProbeAddResponse = decode("probe add request", resp).await?;
        if result.token.is_empty() {
            return Err(Error::UnexpectedResponse(
                "probe add response carries no probe token".to_string(),
            ));
        }
        Ok((result.probe, result.token))
    }

    /// Delete a probe.
    pub async fn delete_probe(&self, id: i64) -> Result<ProbeDeleteResponse> {
        self.require_auth_token()?;
        let resp = self
            .delete(&format!("/probe/delete/{}", id), true)
            .await
            .map_err(|e| e.with_action("sending probe delete request"))?;
        decode("probe delete request", resp).await
    }

    /// Update a probe. The probe token is left alone.
    pub async fn update_probe(&self, probe: &Probe) -> Result<Probe> {
        self.require_auth_token()?;
        let resp = self
            .post_json("/probe/update", true, probe)
            .await
            .map_err(|e| e.with_action("sending probe update request"))?;
        let result: ProbeUpdateResponse = decode("probe update request", resp).await?;
        Ok(result.probe)
    }

    /// Update a probe and rotate its token. Returns the probe and the new token.
    pub async fn reset_probe_token(&self, probe: &Probe) -> Result<(Probe, Vec<u8>)> {
        self.require_auth_token()?;
        let resp = self
            .post_json("/probe/update?reset-token", true, probe)
            .await
            .map_err(|e| e.with_action("sending probe update request"))?;
        let result: ProbeUpdateResponse = decode("probe update request", resp).await?;
        match result.token {
            Some(token) if !token.is_empty() => Ok((result.probe, token)),
            _ => Err(Error::UnexpectedResponse(
                "probe token reset response carries no probe token".to_string(),
            )),
        }
    }

    /// Get a single probe by ID.
    pub async fn get_probe(&self, id: i64) -> Result<Probe> {
        self.require_auth_token()?;
        let resp = self
            .get(&format!("/probe/{}", id), true, None)
            .await
            .map_err(|e| e.with_action("sending probe get request"))?;
        decode("probe get request", resp).await
    }

    /// List the probes visible to the tenant, in server order.
    pub async fn list_probes(&self) -> Result<Vec<Probe>> {
        self.require_auth_token()?;
        let resp = self
            .get("/probe/list", true, None)
            .await
            .map_err(|e| e.with_action("sending probe list request"))?;
        decode("probe list request", resp).await
    }

    /// Create a check. The returned check carries the assigned ID.
    pub async fn add_check(&self, check: &Check) -> Result<Check> {
        self.require_auth_token()?;
        let resp = self
            .post_json("/check/add", true, check)
            .await
            .map_err(|e| e.with_action("sending check add request"))?;
        decode("check add request", resp).await
    }

    /// Get a single check by ID.
    pub async fn get_check(&self, id: i64) -> Result<Check> {
        self.require_auth_token()?;
        let resp = self
            .get(&format!("/check/{}", id), true, None)
            .await
            .map_err(|e| e.with_action("sending check get request"))?;
        decode("check get request", resp).await
    }

    /// Find the check with the given job and target.
    pub async fn query_check(&self, job: &str, target: &str) -> Result<Check> {
        self.require_auth_token()?;
        if job.is_empty() || target.is_empty() {
            return Err(Error::InvalidArgument(
                "check query request: target and job must be set".to_string(),
            ));
        }
        let path = format!(
            "/check/query?job={}&target={}",
            urlencoding::encode(job),
            urlencoding::encode(target)
        );
        let resp = self
            .get(&path, true, None)
            .await
            .map_err(|e| e.with_action("sending check query request"))?;
        decode("check query request", resp).await
    }

    /// Update a check. `check` must carry its `id` and `tenant_id`.
    pub async fn update_check(&self, check: &Check) -> Result<Check> {
        self.require_auth_token()?;
        let resp = self
            .post_json("/check/update", true, check)
            .await
            .map_err(|e| e.with_action("sending check update request"))?;
        decode("check update request", resp).await
    }

    /// Delete a check.
    pub async fn delete_check(&self, id: i64) -> Result<CheckDeleteResponse> {
        self.require_auth_token()?;
        let resp = self
            .delete(&format!("/check/delete/{}", id), true)
            .await
            .map_err(|e| e.with_action("sending check delete request"))?;
        decode("check delete request", resp).await
    }

    /// List the tenant's checks, in server order.
    pub async fn list_checks(&self) -> Result<Vec<Check>> {
        self.require_auth_token()?;
        let resp = self
            .get("/check/list", true, None)
            .await
            .map_err(|e| e.with_action("sending check list request"))?;
        decode("check list request", resp).await
    }

    /// Replace the alerts configured on a check.
    pub async fn update_check_alerts(
        &self,
        check_id: i64,
        alerts: &[CheckAlert],
    ) -> Result<Vec<CheckAlert>> {
        self.require_auth_token()?;

        #[derive(Serialize)]
        struct AlertsRequest<'a> {
            alerts: &'a [CheckAlert],
        }

        let resp = self
            .put_json(
                &format!("/check/{}/alerts", check_id),
                true,
                &AlertsRequest { alerts },
            )
            .await
            .map_err(|e| e.with_action("sending check alerts update request"))?;
        let result: CheckAlerts<CheckAlert> = decode("check alerts update request", resp).await?;
        Ok(result.alerts)
    }

    /// Get the alerts configured on a check, with their current status.
    pub async fn get_check_alerts(&self, check_id: i64) -> Result<Vec<CheckAlertWithStatus>> {
        self.require_auth_token()?;
        let resp = self
            .get(&format!("/check/{}/alerts", check_id), true, None)
            .await
            .map_err(|e| e.with_action("sending check alerts get request"))?;
        let result: CheckAlerts<CheckAlertWithStatus> =
            decode("check alerts get request", resp).await?;
        Ok(result.alerts)
    }

    /// Get the tenant the access token belongs to.
    pub async fn get_tenant(&self) -> Result<Tenant> {
        self.require_auth_token()?;
        let resp = self
            .get("/tenant", true, None)
            .await
            .map_err(|e| e.with_action("sending get tenant request"))?;
        decode("get tenant request", resp).await
    }

    /// Update the tenant. Returns the tenant as stored by the server.
    pub async fn update_tenant(&self, tenant: &Tenant) -> Result<Tenant> {
        self.require_auth_token()?;
        let resp = self
            .post_json("/tenant/update", true, tenant)
            .await
            .map_err(|e| e.with_action("sending tenant update request"))?;
        decode("tenant update request", resp).await
    }

    fn require_auth_token(&self) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(Error::AuthorizationRequired);
        }
        Ok(())
    }

    /// Send one request to `url` (a full URL, not a path).
    ///
    /// `auth` attaches the stored access token as a bearer token. The client
    /// identification headers are always sent.
    pub async fn do_request(
        &self,
        method: Method,
        url: &str,
        auth: bool,
        headers: Option<HeaderMap>,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        debug!(%method, %url, auth, "sending API request");

        let mut req = self.http.request(method, url);
        if let Some(headers) = headers {
            req = req.headers(headers);
        }
        let (client_id, client_version) = self.client_headers();
        req = req
            .header(HEADER_CLIENT_ID, client_id)
            .header(HEADER_CLIENT_VERSION, client_version);
        if auth {
            req = req.bearer_auth(&self.access_token);
        }
        if let Some(body) = body {
            req = req.body(body);
        }

        req.send()
            .await
            .map_err(|e| Error::transport("sending HTTP request", e))
    }

    /// GET `path` (relative to the base URL).
    pub async fn get(&self, path: &str, auth: bool, headers: Option<HeaderMap>) -> Result<Response> {
        self.do_request(Method::GET, &self.url(path), auth, headers, None)
            .await
    }

    /// POST `body` to `path` (relative to the base URL).
    pub async fn post(
        &self,
        path: &str,
        auth: bool,
        headers: Option<HeaderMap>,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        self.do_request(Method::POST, &self.url(path), auth, headers, body)
            .await
    }

    /// PUT `body` to `path` (relative to the base URL).
    pub async fn put(
        &self,
        path: &str,
        auth: bool,
        headers: Option<HeaderMap>,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        self.do_request(Method::PUT, &self.url(path), auth, headers, body)
            .await
    }

    /// DELETE `path` (relative to the base URL).
    pub async fn delete(&self, path: &str, auth: bool) -> Result<Response> {
        self.do_request(Method::DELETE, &self.url(path), auth, None, None)
            .await
    }

    /// POST `req` encoded as JSON.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        auth: bool,
        req: &T,
    ) -> Result<Response> {
        let body = serde_json::to_vec(req).map_err(Error::CannotEncodeRequest)?;
        self.post(path, auth, Some(json_headers()), Some(body)).await
    }

    /// PUT `req` encoded as JSON.
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        auth: bool,
        req: &T,
    ) -> Result<Response> {
        let body = serde_json::to_vec(req).map_err(Error::CannotEncodeRequest)?;
        self.put(path, auth, Some(json_headers()), Some(body)).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    headers
}

/// Error body as sent by the server. `err` is usually a string but is
/// tolerated as any JSON value.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    err: Option<serde_json::Value>,
}

impl From<ErrorBody> for ApiMessage {
    fn from(b: ErrorBody) -> Self {
        let err = match b.err {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
        };
        ApiMessage {
            msg: b.msg.unwrap_or_default(),
            err,
        }
    }
}

/// Check an API response and decode its body.
///
/// - Status other than 200 or 202: [`Error::Http`] with the server's `{msg, err}`
///   body when it has one. An undecodable body, including an empty one, is
///   recorded as the message.
/// - Success with a body: the body decoded as `T`, or [`Error::Decode`].
/// - Success with an empty body: `None`.
pub async fn validate_response<T: DeserializeOwned>(
    action: &str,
    resp: Response,
) -> Result<Option<T>> {
    let status = resp.status();

    if status != StatusCode::OK && status != StatusCode::ACCEPTED {
        let api = match resp.bytes().await {
            Ok(body) => match serde_json::from_slice::<ErrorBody>(&body) {
                Ok(b) => b.into(),
                Err(e) => ApiMessage {
                    msg: "cannot decode response".to_string(),
                    err: e.to_string(),
                },
            },
            Err(e) => ApiMessage {
                msg: "cannot read response".to_string(),
                err: e.to_string(),
            },
        };
        let err = HttpError::new(status.as_u16(), status_text(status), action, api);
        warn!(%action, code = err.code, msg = %err.api.msg, "API request failed");
        return Err(err.into());
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| Error::transport(format!("{}, reading response", action), e))?;
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|source| Error::Decode {
            action: action.to_string(),
            source,
        })
}

/// [`validate_response`], with an empty success body decoding to `T::default()`.
async fn decode<T: DeserializeOwned + Default>(action: &str, resp: Response) -> Result<T> {
    Ok(validate_response(action, resp).await?.unwrap_or_default())
}

fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
