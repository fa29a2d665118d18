//! HTTP client for the remote RDI service.
//!
//! Authenticates with username/password for a JWT, caches the token, and
//! re-logs-in once when the remote answers 401. Transport and remote
//! failures surface as 424 — the RDI service is an upstream dependency.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::rdi::Pipeline;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RdiClient {
    http: reqwest::Client,
    base: url::Url,
    username: Option<String>,
    password: Option<String>,
    token: Mutex<Option<String>>,
}

impl RdiClient {
    pub fn new(
        base_url: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, ApiError> {
        let base = url::Url::parse(base_url)
            .map_err(|e| ApiError::BadRequest(format!("invalid RDI url: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("http client: {e}")))?;

        Ok(Self {
            http,
            base,
            username,
            password,
            token: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("invalid RDI path {path}: {e}")))
    }

    async fn login(&self) -> Result<String, ApiError> {
        let url = self.endpoint("/api/v1/login")?;
        let body = serde_json::json!({
            "username": self.username,
            "password": self.password,
        });

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::FailedDependency(format!("rdi login failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ApiError::FailedDependency(format!(
                "rdi login rejected with status {}",
                resp.status()
            )));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ApiError::FailedDependency(format!("rdi login response: {e}")))?;
        payload
            .get("access_token")
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                ApiError::FailedDependency("rdi login response missing access_token".into())
            })
    }

    async fn authed_token(&self) -> Result<String, ApiError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }
        let token = self.login().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        token: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint(path)?;
        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|e| ApiError::FailedDependency(format!("rdi request failed: {e}")))
    }

    /// One request with a single re-login retry on 401.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ApiError> {
        let token = self.authed_token().await?;
        let mut resp = self.send(method.clone(), path, body.as_ref(), &token).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            let fresh = self.login().await?;
            *self.token.lock().await = Some(fresh.clone());
            resp = self.send(method, path, body.as_ref(), &fresh).await?;
        }

        if !resp.status().is_success() {
            return Err(ApiError::FailedDependency(format!(
                "rdi service answered {} for {path}",
                resp.status()
            )));
        }

        if resp.content_length() == Some(0) {
            return Ok(serde_json::Value::Null);
        }
        resp.json()
            .await
            .map_err(|e| ApiError::FailedDependency(format!("rdi response for {path}: {e}")))
    }

    pub async fn get_pipeline(&self) -> Result<Pipeline, ApiError> {
        let payload = self.request(Method::GET, "/api/v1/pipeline", None).await?;
        serde_json::from_value(payload)
            .map_err(|e| ApiError::FailedDependency(format!("malformed pipeline payload: {e}")))
    }

    pub async fn deploy_pipeline(&self, pipeline: &Pipeline) -> Result<(), ApiError> {
        let body = serde_json::to_value(pipeline)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("serialize pipeline: {e}")))?;
        self.request(Method::POST, "/api/v1/pipeline/deploy", Some(body))
            .await?;
        Ok(())
    }

    /// Raw status document; `pipelines` is populated only when a pipeline
    /// is deployed on the remote side.
    pub async fn pipeline_status(&self) -> Result<serde_json::Value, ApiError> {
        self.request(Method::GET, "/api/v1/pipeline/status", None)
            .await
    }

    pub async fn strategies(&self) -> Result<serde_json::Value, ApiError> {
        self.request(Method::GET, "/api/v1/pipeline/strategies", None)
            .await
    }

    /// Remote service version. The endpoint answers either a bare JSON
    /// string or `{"version": ...}` depending on the RDI release.
    pub async fn version(&self) -> Result<Option<String>, ApiError> {
        let payload = self.request(Method::GET, "/api/v1/version", None).await?;
        Ok(match payload {
            serde_json::Value::String(v) => Some(v),
            other => other
                .get("version")
                .and_then(serde_json::Value::as_str)
                .map(ToOwned::to_owned),
        })
    }

    /// Connection check: a successful login is sufficient.
    pub async fn test(&self) -> Result<(), ApiError> {
        self.login().await.map(|_| ())
    }
}
