//! Per-slide AI-edit endpoint client.
//!
//! The orchestrator only sees the [`SlideEditClient`] trait. [`HttpEditClient`]
//! is the production implementation: one JSON POST per slide, with the
//! transport timeout surfacing as an ordinary [`EditFailure`].

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::batch::BatchId;
use crate::config::EditorConfig;
use crate::error::{EditFailure, EditFailureKind, Result};

// ============================================================================
// Wire types
// ============================================================================

/// Request body for one slide edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideEditRequest {
    /// Slide being edited.
    pub slide_id: String,
    /// The slide's markup when the batch started.
    pub current_markup: String,
    /// Natural-language instruction.
    pub instruction: String,
    /// Lesson topic, for context.
    pub topic: String,
    /// Lesson age group, for context.
    pub age_group: String,
    /// Batch this request belongs to.
    pub batch_id: BatchId,
    /// Position of the slide in the batch.
    pub index_in_batch: usize,
}

/// Response body for one slide edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideEditResponse {
    /// Whether the endpoint produced an edit.
    pub success: bool,
    /// The edited markup, when `success` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_markup: Option<String>,
    /// Time the endpoint spent on the edit.
    #[serde(default)]
    pub elapsed_ms: u64,
    /// Endpoint-reported error, when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SlideEditResponse {
    /// Creates a successful response.
    #[must_use]
    pub fn edited(markup: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            success: true,
            edited_markup: Some(markup.into()),
            elapsed_ms,
            error: None,
        }
    }

    /// Creates a failed response.
    #[must_use]
    pub fn failed(error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            edited_markup: None,
            elapsed_ms,
            error: Some(error.into()),
        }
    }

    /// Extracts usable markup, unwrapping a surrounding code fence.
    ///
    /// # Errors
    ///
    /// Returns an endpoint failure when `success` is false and a malformed
    /// response failure when the markup is missing or blank.
    pub fn into_markup(self) -> std::result::Result<String, EditFailure> {
        if !self.success {
            let message = self
                .error
                .unwrap_or_else(|| "edit endpoint reported failure".to_string());
            return Err(EditFailure::endpoint(message));
        }
        let Some(markup) = self.edited_markup else {
            return Err(EditFailure::malformed(
                "response reported success without editedMarkup",
            ));
        };
        let markup = normalize_markup(&markup);
        if markup.trim().is_empty() {
            return Err(EditFailure::malformed("edited markup is empty"));
        }
        Ok(markup)
    }
}

static CODE_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[a-zA-Z]*[ \t]*\r?\n(.*?)\r?\n?\s*```\s*$").ok());

/// Strips a Markdown code fence wrapped around the whole markup, if present.
#[must_use]
pub fn normalize_markup(markup: &str) -> String {
    let Some(re) = CODE_FENCE.as_ref() else {
        return markup.to_string();
    };
    re.captures(markup)
        .and_then(|cap| cap.get(1))
        .map_or_else(|| markup.to_string(), |m| m.as_str().to_string())
}

// ============================================================================
// SlideEditClient
// ============================================================================

/// Something that can apply an instruction to one slide.
#[async_trait]
pub trait SlideEditClient: Send + Sync {
    /// Sends one edit request.
    ///
    /// Transport problems and non-success HTTP statuses are returned as
    /// `Err`; an endpoint-level failure with a well-formed body may come back
    /// either way and is resolved by [`SlideEditResponse::into_markup`].
    async fn edit_slide(
        &self,
        request: SlideEditRequest,
    ) -> std::result::Result<SlideEditResponse, EditFailure>;
}

// ============================================================================
// HttpEditClient
// ============================================================================

/// [`SlideEditClient`] that POSTs JSON to the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpEditClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEditClient {
    /// Creates a client for `endpoint` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `EditorError::HttpClient` if the underlying client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Creates a client from the editor configuration.
    pub fn from_config(config: &EditorConfig) -> Result<Self> {
        Self::new(config.edit_endpoint.clone(), config.request_timeout())
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SlideEditClient for HttpEditClient {
    #[instrument(
        skip(self, request),
        fields(slide_id = %request.slide_id, batch_id = %request.batch_id)
    )]
    async fn edit_slide(
        &self,
        request: SlideEditRequest,
    ) -> std::result::Result<SlideEditResponse, EditFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_failure(&e))?;

        let status = response.status();
        debug!(status = %status, "Edit endpoint responded");

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EditFailure::new(
                EditFailureKind::RateLimit,
                format!("edit endpoint returned {status}"),
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SlideEditResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("edit endpoint returned {status}"));
            return Err(EditFailure::endpoint(message));
        }

        response
            .json::<SlideEditResponse>()
            .await
            .map_err(|e| transport_failure(&e))
    }
}

fn transport_failure(err: &reqwest::Error) -> EditFailure {
    if err.is_timeout() {
        EditFailure::timeout(format!("edit request timed out: {err}"))
    } else if err.is_decode() {
        EditFailure::malformed(format!("invalid response body: {err}"))
    } else {
        EditFailure::network(format!("edit request failed: {err}"))
    }
}
