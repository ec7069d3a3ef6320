// API client module: a small blocking HTTP client for the dental CAD order
// service. Holds the canonical base URL and the API version, and performs
// the anti-forgery/login handshake that every later call depends on.

use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, SET_COOKIE};
use serde_json::Value;

/// Production host used when no endpoint argument is given.
pub const DEFAULT_ENDPOINT: &str = "portal.dentcadcloud.com";

/// Normalize a base URL: strip one trailing slash and default the scheme to
/// `https://` when none is present. Applying it twice gives the same result
/// as once.
pub fn resolve_endpoint(raw: Option<&str>) -> String {
    let raw = raw.unwrap_or(DEFAULT_ENDPOINT);
    let trimmed = raw.strip_suffix('/').unwrap_or(raw);
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// The two vendor API generations. Everything that differs between them
/// (endpoint paths, header and token-field naming) is answered here, so the
/// rest of the crate never branches on raw version strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ApiVersion {
    V2,
    V3,
}

impl ApiVersion {
    pub fn token_path(&self) -> &'static str {
        match self {
            ApiVersion::V2 => "api/v2/account/token",
            ApiVersion::V3 => "api/v3/auth/antiforgery",
        }
    }

    pub fn login_path(&self) -> &'static str {
        match self {
            ApiVersion::V2 => "api/v2/account/login",
            ApiVersion::V3 => "api/v3/auth/login",
        }
    }

    /// Header that carries the verification token on state-changing calls.
    pub fn verification_header(&self) -> &'static str {
        match self {
            ApiVersion::V2 => "__RequestVerificationToken",
            ApiVersion::V3 => "X-Request-Verification-Token",
        }
    }

    /// JSON field of the token-fetch response body holding the token value.
    pub fn token_field(&self) -> &'static str {
        match self {
            ApiVersion::V2 => "token",
            ApiVersion::V3 => "verificationToken",
        }
    }

    /// Path the order descriptor is POSTed to: creation in v3, the
    /// qualification pre-check in v2.
    pub fn submit_path(&self) -> &'static str {
        match self {
            ApiVersion::V2 => "api/v2/orders/qualify",
            ApiVersion::V3 => "api/v3/orders",
        }
    }

    pub fn upload_path(&self, order_id: &str) -> String {
        match self {
            ApiVersion::V2 => format!("api/v2/upload/{}", order_id),
            ApiVersion::V3 => format!("api/v3/orders/{}/files", order_id),
        }
    }

    pub fn status_path(&self, order_id: &str) -> String {
        match self {
            ApiVersion::V2 => format!("api/v2/orders/status/{}", order_id),
            ApiVersion::V3 => format!("api/v3/orders/{}/status", order_id),
        }
    }

    pub fn review_path(&self, order_id: &str) -> String {
        match self {
            ApiVersion::V2 => format!("api/v2/orders/accept/{}", order_id),
            ApiVersion::V3 => format!("api/v3/orders/{}/review", order_id),
        }
    }

    pub fn download_path(&self, order_id: &str) -> String {
        match self {
            ApiVersion::V2 => format!("api/v2/orders/download/{}", order_id),
            ApiVersion::V3 => format!("api/v3/orders/{}/file", order_id),
        }
    }
}

/// Header set issued by a successful login: the session cookie, the
/// session-bound verification token and a JSON content type. Built once by
/// [`ApiClient::login`] and passed by reference into every later call.
pub struct Session {
    headers: HeaderMap,
}

impl Session {
    fn new(version: ApiVersion, cookie: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(cookie).context("Session cookie is not a valid header value")?,
        );
        let name = HeaderName::from_bytes(version.verification_header().as_bytes())
            .context("Invalid verification header name")?;
        headers.insert(
            name,
            HeaderValue::from_str(token)
                .context("Verification token is not a valid header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(Session { headers })
    }

    /// Full header set for JSON calls.
    pub fn headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    /// Cookie and verification token only. Multipart uploads and binary
    /// downloads keep their own content type.
    pub fn upload_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.remove(CONTENT_TYPE);
        headers
    }
}

/// Blocking HTTP client bound to one resolved endpoint and one API version.
pub struct ApiClient {
    client: Client,
    base_url: String,
    version: ApiVersion,
}

impl ApiClient {
    /// Build a client for the given base URL. The per-request timeout is
    /// disabled: result archives can take longer than the 30s default, and
    /// the status wait is intentionally unbounded.
    pub fn new(base_url: impl Into<String>, version: ApiVersion) -> Result<Self> {
        let client = Client::builder()
            .timeout(None)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url: base_url.into(),
            version,
        })
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Fetch a session cookie and verification token from the token
    /// endpoint, optionally under an existing cookie. Tokens are bound to
    /// the cookie context they were issued under.
    fn fetch_tokens(&self, cookie: Option<&str>) -> Result<(String, String)> {
        let mut request = self.client.get(self.url(self.version.token_path()));
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let res = request.send().context("Failed to send token request")?;
        let res = ensure_success(res, "Token fetch")?;

        let cookie = collect_cookies(res.headers());
        let body: Value = res.json().context("Parsing token response json")?;
        let token = body
            .get(self.version.token_field())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow!(
                    "Token response did not contain `{}`",
                    self.version.token_field()
                )
            })?;
        Ok((cookie, token))
    }

    /// Log in and compose the reusable [`Session`]:
    /// 1. fetch anonymous tokens,
    /// 2. POST the credentials under those tokens,
    /// 3. take the authenticated session cookie from the login response,
    /// 4. re-fetch tokens under that cookie, since the server rejects
    ///    pre-login tokens once the session is authenticated,
    /// 5. combine the merged cookies with the fresh verification token.
    pub fn login(&self, email: &str, password: &str) -> Result<Session> {
        let (anon_cookie, anon_token) = self.fetch_tokens(None)?;

        let res = self
            .client
            .post(self.url(self.version.login_path()))
            .header(COOKIE, &anon_cookie)
            .header(self.version.verification_header(), &anon_token)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .context("Failed to send login request")?;
        let res = ensure_success(res, "Login")?;

        let auth_cookie = collect_cookies(res.headers());
        if auth_cookie.is_empty() {
            bail!("Login did not issue a session cookie");
        }

        let (fresh_cookie, fresh_token) = self.fetch_tokens(Some(&auth_cookie))?;
        let cookie = merge_cookies(&auth_cookie, &fresh_cookie);
        Session::new(self.version, &cookie, &fresh_token)
    }
}

/// Pass the response through when it is a success, otherwise abort with the
/// failing step, the HTTP status and whatever body the server sent.
pub(crate) fn ensure_success(res: Response, step: &str) -> Result<Response> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let txt = res.text().unwrap_or_else(|_| "".into());
    bail!("{} failed: {} - {}", step, status, txt);
}

/// Collect every `Set-Cookie` pair from a response, attributes stripped,
/// joined the way a `Cookie` request header expects.
fn collect_cookies(headers: &HeaderMap) -> String {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Merge two cookie strings by name, keeping the base order; a fresh value
/// replaces a base value of the same name.
fn merge_cookies(base: &str, fresh: &str) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for part in base.split(';').chain(fresh.split(';')) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (name, value) = part.split_once('=').unwrap_or((part, ""));
        if let Some(existing) = pairs.iter_mut().find(|(n, _)| n == name) {
            existing.1 = value.to_string();
        } else {
            pairs.push((name.to_string(), value.to_string()));
        }
    }
    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}
