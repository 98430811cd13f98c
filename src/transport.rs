//! Request plumbing for the MECHA-LUNG API.
//!
//! [`ApiClient`] owns the base URL and reads the bearer token from the
//! [`SessionStore`]; the actual HTTP exchange is delegated to an
//! [`HttpBackend`] so the status handling can be exercised without a network.

use std::rc::Rc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ApiError;
use crate::models::WireContract;
use crate::session::SessionStore;

/// A fully resolved request handed to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Raw response: status plus the body text, not yet interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }
}

/// Performs one HTTP exchange.
///
/// Implementations only report failures where no response arrived
/// ([`ApiError::Network`] / [`ApiError::Timeout`]); every received status,
/// including 4xx and 5xx, is returned as an `HttpResponse`.
#[allow(async_fn_in_trait)]
pub trait HttpBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Successful outcome of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: u16,
}

pub struct ApiClient<B> {
    base_url: String,
    backend: B,
    session: Rc<SessionStore>,
}

impl<B: HttpBackend> ApiClient<B> {
    pub fn new(base_url: &Url, backend: B, session: Rc<SessionStore>) -> Self {
        Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            backend,
            session,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Request sent without credentials.
    pub async fn public_request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned + WireContract,
    {
        self.dispatch(method, path, None, body).await
    }

    /// Request carrying the stored bearer token. Fails with
    /// [`ApiError::NoCredential`] before touching the network when no token
    /// is stored.
    pub async fn authenticated_request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned + WireContract,
    {
        let token = match self.session.get() {
            Some(token) => token,
            None => {
                warn!("{} {} refused: no session token", method, path);
                return Err(ApiError::NoCredential);
            }
        };
        self.dispatch(method, path, Some(token), body).await
    }

    async fn dispatch<T>(
        &self,
        method: Method,
        path: &str,
        bearer: Option<String>,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned + WireContract,
    {
        let url = self.url_for(path)?;
        debug!("{} {}", method, url);
        let request = HttpRequest {
            method: method.clone(),
            url,
            bearer,
            body,
        };

        let response = match self.backend.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{} {} failed without a response: {}", method, path, e);
                return Err(e);
            }
        };

        let outcome = interpret(response);
        match &outcome {
            Ok(ok) => info!("{} {} -> {}", method, path, ok.status),
            Err(e) => warn!("{} {} -> {} ({})", method, path, e.status(), e),
        }
        outcome
    }

    fn url_for(&self, path: &str) -> Result<Url, ApiError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))
    }
}

/// Serialize a request body up front so encoding problems surface before dispatch.
pub fn encode_body<T: Serialize>(body: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))
}

/// Map a raw response onto the status taxonomy and decode success bodies.
pub fn interpret<T>(response: HttpResponse) -> Result<ApiResponse<T>, ApiError>
where
    T: DeserializeOwned + WireContract,
{
    let HttpResponse { status, body } = response;

    match status {
        200..=299 => {
            // DELETE and friends may answer with no body at all.
            let text = if body.trim().is_empty() { "null" } else { body.as_str() };
            let data: T = serde_json::from_str(text).map_err(|e| ApiError::Malformed {
                status,
                reason: e.to_string(),
            })?;
            data.verify()
                .map_err(|reason| ApiError::Malformed { status, reason })?;
            Ok(ApiResponse { data, status })
        }
        401 | 403 => Err(ApiError::AuthRejected {
            status,
            detail: error_detail(&body),
        }),
        _ => Err(ApiError::Rejected {
            status,
            detail: error_detail(&body),
        }),
    }
}

/// Pull the human-readable message out of an error body.
///
/// FastAPI answers `{"detail": "..."}` for handled errors and
/// `{"detail": [{"msg": ...}, ...]}` for validation failures.
pub fn error_detail(body: &str) -> String {
    const FALLBACK: &str = "Request failed";

    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return FALLBACK.to_string(),
    };

    match value.get("detail") {
        Some(serde_json::Value::String(detail)) if !detail.is_empty() => detail.clone(),
        Some(serde_json::Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if messages.is_empty() {
                FALLBACK.to_string()
            } else {
                messages.join("; ")
            }
        }
        _ => FALLBACK.to_string(),
    }
}

/// Production backend built on reqwest (browser `fetch` under wasm).
pub struct ReqwestBackend {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestBackend {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        #[cfg(not(target_arch = "wasm32"))]
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        #[cfg(target_arch = "wasm32")]
        let client = reqwest::Client::new();

        Ok(Self { client, timeout })
    }

    async fn exchange(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = request.bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = request.body {
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("Failed to read response body: {}", e)))?;
        Ok(HttpResponse { status, body })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn map_send_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else {
            ApiError::Network(e.to_string())
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn map_send_error(&self, e: reqwest::Error) -> ApiError {
        ApiError::Network(e.to_string())
    }
}

impl HttpBackend for ReqwestBackend {
    #[cfg(not(target_arch = "wasm32"))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.exchange(request).await
    }

    /// `fetch` has no built-in deadline, so race it against a JS timer.
    #[cfg(target_arch = "wasm32")]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        use futures::future::{select, Either};

        let exchange = Box::pin(self.exchange(request));
        let deadline = Box::pin(browser_sleep(self.timeout));
        match select(exchange, deadline).await {
            Either::Left((outcome, _)) => outcome,
            Either::Right(_) => Err(ApiError::Timeout(self.timeout)),
        }
    }
}

#[cfg(target_arch = "wasm32")]
async fn browser_sleep(duration: Duration) {
    let millis = duration.as_millis().min(i32::MAX as u128) as i32;
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        if let Some(window) = web_sys::window() {
            if let Err(e) =
                window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
            {
                warn!("Failed to arm request timer: {:?}", e);
            }
        }
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}
