//! services/portal/src/adapters/http.rs
//!
//! The REST adapter. It implements every backend port from the `core` crate
//! over `reqwest`, attaching the bearer token from the injected session store.

use async_trait::async_trait;
use learning_plan_core::domain::{
    ApplicationId, ApplicationQuery, ApplicationRecord, ApplicationSummary, AuthSession,
    GmailSettings, GmailSettingsUpdate, PdfExport, Registration, ReviewRequest, StudentQuery,
    StudentRecord, User,
};
use learning_plan_core::payload::{ApplicationPayload, ApplicationResponse, ApplicationUpdate};
use learning_plan_core::ports::{
    ApplicationService, AuthService, DraftService, PortError, PortResult, SessionStore,
    SettingsService, StudentDirectory,
};
use regex::Regex;
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Saved name of an exported PDF when the backend does not suggest one.
pub const DEFAULT_PDF_FILENAME: &str = "自主學習申請表.pdf";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the backend ports against the REST API.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    api_url: String,
    session: Arc<dyn SessionStore>,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` with its own connection pool.
    pub fn new(
        api_url: impl Into<String>,
        timeout: Duration,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url, session))
    }

    /// Creates an adapter reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_url,
            session,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.api_url, path));
        match self.session.load() {
            Some(session) => builder.header(AUTHORIZATION, format!("Bearer {}", session.access_token)),
            None => builder,
        }
    }

    /// Sends the request and maps every non-success status onto a `PortError`.
    async fn send(&self, builder: RequestBuilder) -> PortResult<Response> {
        let response = builder.send().await.map_err(transport_error)?;
        self.ensure_success(response).await
    }

    async fn ensure_success(&self, response: Response) -> PortResult<Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "Backend rejected the session, logging out");
            if let Err(e) = self.session.clear() {
                warn!(error = %e, "Could not clear the stored session");
            }
            return Err(PortError::Unauthorized);
        }
        if status.is_success() {
            return Ok(response);
        }

        let message = read_error_message(response).await;
        debug!(status = status.as_u16(), message = %message, "Backend request failed");
        if status == StatusCode::NOT_FOUND {
            Err(PortError::NotFound(message))
        } else {
            Err(PortError::Rejected(message))
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> PortResult<T> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid response body: {}", e)))
    }
}

fn transport_error(e: reqwest::Error) -> PortError {
    PortError::Unexpected(format!("Request failed: {}", e))
}

//=========================================================================================
// Error Body Decoding
//=========================================================================================

/// Turns a failed response into the message shown to the user.
async fn read_error_message(response: Response) -> String {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    if !is_json {
        return format!("伺服器錯誤 ({}): 返回了非 JSON 響應", status.as_u16());
    }
    match response.json::<Value>().await {
        Ok(body) => error_message(status, &body, "請求失敗"),
        Err(_) => format!("伺服器錯誤 ({}): 返回了非 JSON 響應", status.as_u16()),
    }
}

/// Picks the backend's `detail`. Field validation failures (422 with a list
/// of `{loc, msg}`) are flattened into one line per field.
pub fn error_message(status: StatusCode, body: &Value, fallback: &str) -> String {
    match body.get("detail") {
        Some(Value::Array(items)) if status == StatusCode::UNPROCESSABLE_ENTITY => {
            let lines: Vec<String> = items
                .iter()
                .map(|item| {
                    let loc = item
                        .get("loc")
                        .and_then(Value::as_array)
                        .map(|parts| {
                            parts
                                .iter()
                                .map(|p| match p {
                                    Value::String(s) => s.clone(),
                                    other => other.to_string(),
                                })
                                .collect::<Vec<_>>()
                                .join(".")
                        })
                        .unwrap_or_default();
                    let msg = item.get("msg").and_then(Value::as_str).unwrap_or_default();
                    format!("{}: {}", loc, msg)
                })
                .collect();
            format!("資料驗證失敗:\n{}", lines.join("\n"))
        }
        Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
        _ => fallback.to_string(),
    }
}

//=========================================================================================
// Download Filenames
//=========================================================================================

fn encoded_filename_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)filename\*\s*=\s*UTF-8''([^;]+)").expect("valid regex"))
}

fn quoted_filename_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)filename\s*=\s*"([^"]+)""#).expect("valid regex"))
}

/// Derives the saved filename from a `Content-Disposition` header.
pub fn filename_from_disposition(header: Option<&str>) -> String {
    let Some(header) = header else {
        return DEFAULT_PDF_FILENAME.to_string();
    };
    if let Some(encoded) = encoded_filename_regex().captures(header).and_then(|c| c.get(1)) {
        if let Some(decoded) = percent_decode(encoded.as_str().trim()) {
            return decoded;
        }
    }
    quoted_filename_regex()
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_PDF_FILENAME.to_string())
}

/// Decodes `%XX` escapes. `None` when an escape is malformed or the bytes are not UTF-8.
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

//=========================================================================================
// Wire Bodies
//=========================================================================================

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
    user: User,
}

#[derive(Serialize)]
struct ChangePasswordBody<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

#[derive(Serialize, Deserialize)]
struct DraftBody {
    form_data: Value,
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl AuthService for HttpBackend {
    /// Login carries no token, and a 401 here means bad credentials rather
    /// than an expired session.
    async fn login(&self, username: &str, password: &str) -> PortResult<AuthSession> {
        let response = self
            .client
            .post(format!("{}/auth/login", self.api_url))
            .json(&LoginBody { username, password })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            return Err(PortError::Rejected(error_message(status, &body, "登入失敗")));
        }
        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid login response: {}", e)))?;
        Ok(AuthSession {
            access_token: body.access_token,
            user: body.user,
        })
    }

    async fn register(&self, registration: &Registration) -> PortResult<User> {
        self.fetch(self.request(Method::POST, "/auth/register").json(registration))
            .await
    }

    async fn change_password(&self, old_password: &str, new_password: &str) -> PortResult<()> {
        let body = ChangePasswordBody {
            old_password,
            new_password,
        };
        self.send(self.request(Method::POST, "/auth/change-password").json(&body))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ApplicationService for HttpBackend {
    async fn create_application(&self, payload: &ApplicationPayload)
        -> PortResult<ApplicationRecord> {
        let response: ApplicationResponse = self
            .fetch(self.request(Method::POST, "/applications/").json(payload))
            .await?;
        Ok(response.into_record())
    }

    async fn update_application(
        &self,
        id: &ApplicationId,
        update: &ApplicationUpdate,
    ) -> PortResult<ApplicationRecord> {
        let path = format!("/applications/{}", id);
        let response: ApplicationResponse =
            self.fetch(self.request(Method::PUT, &path).json(update)).await?;
        Ok(response.into_record())
    }

    async fn get_application(&self, id: &ApplicationId) -> PortResult<ApplicationRecord> {
        let path = format!("/applications/{}", id);
        let response: ApplicationResponse = self.fetch(self.request(Method::GET, &path)).await?;
        Ok(response.into_record())
    }

    async fn list_applications(&self, query: &ApplicationQuery)
        -> PortResult<Vec<ApplicationSummary>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(skip) = query.skip {
            params.push(("skip", skip.to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(status) = query.status {
            params.push(("status", status.as_wire().to_string()));
        }
        self.fetch(self.request(Method::GET, "/applications/").query(&params))
            .await
    }

    async fn delete_application(&self, id: &ApplicationId) -> PortResult<()> {
        let path = format!("/applications/{}", id);
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn review_application(
        &self,
        id: &ApplicationId,
        review: &ReviewRequest,
    ) -> PortResult<ApplicationRecord> {
        let path = format!("/applications/{}/review", id);
        let response: ApplicationResponse =
            self.fetch(self.request(Method::PATCH, &path).json(review)).await?;
        Ok(response.into_record())
    }

    async fn export_pdf(&self, id: &ApplicationId) -> PortResult<PdfExport> {
        if self.session.load().is_none() {
            return Err(PortError::Unauthorized);
        }
        let path = format!("/applications/{}/export-pdf", id);
        let response = self.send(self.request(Method::GET, &path)).await?;
        let filename = filename_from_disposition(
            response
                .headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok()),
        );
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(PdfExport {
            filename,
            bytes: bytes.to_vec(),
        })
    }
}

#[async_trait]
impl DraftService for HttpBackend {
    async fn fetch_draft(&self) -> PortResult<Value> {
        let draft: DraftBody = self.fetch(self.request(Method::GET, "/drafts/")).await?;
        Ok(draft.form_data)
    }

    async fn store_draft(&self, form_data: &Value) -> PortResult<()> {
        let body = DraftBody {
            form_data: form_data.clone(),
        };
        self.send(self.request(Method::POST, "/drafts/").json(&body)).await?;
        Ok(())
    }

    async fn remove_draft(&self) -> PortResult<()> {
        self.send(self.request(Method::DELETE, "/drafts/")).await?;
        Ok(())
    }
}

#[async_trait]
impl StudentDirectory for HttpBackend {
    async fn get_student(&self, student_id: &str) -> PortResult<StudentRecord> {
        let path = format!("/students/{}", student_id.trim());
        self.fetch(self.request(Method::GET, &path)).await
    }

    async fn search_students(&self, query: &StudentQuery) -> PortResult<Vec<StudentRecord>> {
        self.fetch(self.request(Method::GET, "/students/search").query(query))
            .await
    }
}

#[async_trait]
impl SettingsService for HttpBackend {
    async fn gmail_settings(&self) -> PortResult<GmailSettings> {
        self.fetch(self.request(Method::GET, "/settings/gmail")).await
    }

    async fn update_gmail_settings(&self, update: &GmailSettingsUpdate)
        -> PortResult<GmailSettings> {
        self.fetch(self.request(Method::PUT, "/settings/gmail").json(update))
            .await
    }
}
