//! HTTP client for the remote triage service.
//!
//! One best-effort request per user action: no retries, no request
//! timeout, no cancellation. Non-2xx responses become
//! `ApiClientError::Http` carrying either the service's `detail` string
//! or a generic status message.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::models::{ChatReply, ServiceStatus, TriageResult, TriageSubmission};

pub const ANALYZE_PATH: &str = "/api/triage/analyze";
pub const CHAT_PATH: &str = "/api/chat";

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

/// Errors from the triage service client.
///
/// `Http` displays its message verbatim so it can be shown to the
/// patient as-is.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiClientError {
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("Unable to reach the triage service at {0}")]
    Connection(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unexpected response from the triage service: {0}")]
    InvalidResponse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Failure body sent by the service. `detail` is not always a string
/// (validation failures send a list), so it is kept as a raw value.
#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Message for a non-2xx response: the string `detail` when present,
/// otherwise `Request failed with status <code>`.
pub fn http_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .and_then(|d| d.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("Request failed with status {status}"))
}

// ═══════════════════════════════════════════════════════════
// TriageApi trait
// ═══════════════════════════════════════════════════════════

/// Operations the client needs from the triage service.
pub trait TriageApi: Send + Sync {
    fn analyze<'a>(
        &'a self,
        submission: &'a TriageSubmission,
    ) -> BoxFuture<'a, Result<TriageResult, ApiClientError>>;

    fn send_chat_message<'a>(
        &'a self,
        uid: &'a str,
        message: &'a str,
    ) -> BoxFuture<'a, Result<ChatReply, ApiClientError>>;

    fn health(&self) -> BoxFuture<'_, Result<ServiceStatus, ApiClientError>>;
}

// ═══════════════════════════════════════════════════════════
// HttpTriageApi
// ═══════════════════════════════════════════════════════════

/// reqwest-backed client for the triage service.
pub struct HttpTriageApi {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    uid: &'a str,
    message: &'a str,
}

impl HttpTriageApi {
    pub fn new(base_url: &str) -> Result<Self, ApiClientError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiClientError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_form(submission: &TriageSubmission) -> Result<Form, ApiClientError> {
        let mut form = Form::new();
        for (name, value) in submission.form_fields() {
            form = form.text(name, value);
        }
        if let Some(attachment) = &submission.attachment {
            let part = Part::bytes(attachment.bytes.clone())
                .file_name(attachment.file_name.clone())
                .mime_str(&attachment.mime_type)
                .map_err(|e| ApiClientError::InvalidRequest(e.to_string()))?;
            form = form.part("file", part);
        }
        Ok(form)
    }

    fn map_send_error(&self, e: reqwest::Error) -> ApiClientError {
        if e.is_connect() {
            ApiClientError::Connection(self.base_url.clone())
        } else {
            ApiClientError::Network(e.to_string())
        }
    }

    /// Turn a response into `T`, mapping non-2xx to `ApiClientError::Http`.
    async fn read_json<T>(response: reqwest::Response) -> Result<T, ApiClientError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = http_error_message(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), %message, "Triage service returned an error");
            return Err(ApiClientError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiClientError::InvalidResponse(e.to_string()))
    }
}

impl TriageApi for HttpTriageApi {
    fn analyze<'a>(
        &'a self,
        submission: &'a TriageSubmission,
    ) -> BoxFuture<'a, Result<TriageResult, ApiClientError>> {
        Box::pin(async move {
            let form = Self::build_form(submission)?;
            tracing::info!(
                symptoms = submission.symptoms.len(),
                has_file = submission.attachment.is_some(),
                "Submitting triage request"
            );

            let response = self
                .client
                .post(self.url(ANALYZE_PATH))
                .multipart(form)
                .send()
                .await
                .map_err(|e| self.map_send_error(e))?;

            Self::read_json(response).await
        })
    }

    fn send_chat_message<'a>(
        &'a self,
        uid: &'a str,
        message: &'a str,
    ) -> BoxFuture<'a, Result<ChatReply, ApiClientError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url(CHAT_PATH))
                .json(&ChatRequest { uid, message })
                .send()
                .await
                .map_err(|e| self.map_send_error(e))?;

            Self::read_json(response).await
        })
    }

    fn health(&self) -> BoxFuture<'_, Result<ServiceStatus, ApiClientError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.url("/"))
                .send()
                .await
                .map_err(|e| self.map_send_error(e))?;

            Self::read_json(response).await
        })
    }
}

// ═══════════════════════════════════════════════════════════
// MockTriageApi
// ═══════════════════════════════════════════════════════════

/// Mock triage service for testing — replays queued replies and records
/// every submission it receives.
pub struct MockTriageApi {
    analyze_replies: Mutex<VecDeque<Result<TriageResult, ApiClientError>>>,
    chat_replies: Mutex<VecDeque<Result<ChatReply, ApiClientError>>>,
    submissions: Mutex<Vec<TriageSubmission>>,
    analyze_calls: AtomicUsize,
    chat_calls: AtomicUsize,
    latency: Duration,
}

impl MockTriageApi {
    pub fn new() -> Self {
        Self {
            analyze_replies: Mutex::new(VecDeque::new()),
            chat_replies: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
            analyze_calls: AtomicUsize::new(0),
            chat_calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    pub fn with_result(self, result: TriageResult) -> Self {
        self.push_analyze(Ok(result));
        self
    }

    pub fn with_failure(self, status: u16, message: &str) -> Self {
        self.push_analyze(Err(ApiClientError::Http {
            status,
            message: message.to_string(),
        }));
        self
    }

    /// Delay every reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_chat_reply(self, reply: &str) -> Self {
        if let Ok(mut q) = self.chat_replies.lock() {
            q.push_back(Ok(ChatReply { reply: reply.to_string() }));
        }
        self
    }

    pub fn with_chat_failure(self, status: u16, message: &str) -> Self {
        if let Ok(mut q) = self.chat_replies.lock() {
            q.push_back(Err(ApiClientError::Http {
                status,
                message: message.to_string(),
            }));
        }
        self
    }

    fn push_analyze(&self, reply: Result<TriageResult, ApiClientError>) {
        if let Ok(mut q) = self.analyze_replies.lock() {
            q.push_back(reply);
        }
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    /// Submissions received so far, oldest first.
    pub fn submissions(&self) -> Vec<TriageSubmission> {
        self.submissions.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for MockTriageApi {
    fn default() -> Self {
        Self::new()
    }
}

impl TriageApi for MockTriageApi {
    fn analyze<'a>(
        &'a self,
        submission: &'a TriageSubmission,
    ) -> BoxFuture<'a, Result<TriageResult, ApiClientError>> {
        Box::pin(async move {
            self.analyze_calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut s) = self.submissions.lock() {
                s.push(submission.clone());
            }
            tokio::time::sleep(self.latency).await;
            self.analyze_replies
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| Err(ApiClientError::Network("no mock reply queued".into())))
        })
    }

    fn send_chat_message<'a>(
        &'a self,
        _uid: &'a str,
        _message: &'a str,
    ) -> BoxFuture<'a, Result<ChatReply, ApiClientError>> {
        Box::pin(async move {
            self.chat_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            self.chat_replies
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| Err(ApiClientError::Network("no mock reply queued".into())))
        })
    }

    fn health(&self) -> BoxFuture<'_, Result<ServiceStatus, ApiClientError>> {
        Box::pin(async move {
            Ok(ServiceStatus {
                status: "API Online".into(),
            })
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
