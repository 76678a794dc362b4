use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::client::{PdfBytes, RedactorBackend};
use super::error::UploadError;
use crate::utils::notify::{Notification, NotificationSink};
use crate::utils::pdf::is_pdf;

/// Handle on the page a trigger refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TargetReference {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: Some(url.into()),
        }
    }

    /// The URL, if present and non-empty.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }
}

/// Terminal result of one run. The server response is passed through uninterpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Success { server_response: Value },
    Failure { reason: String },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }
}

impl From<Result<Value, UploadError>> for UploadOutcome {
    fn from(result: Result<Value, UploadError>) -> Self {
        match result {
            Ok(server_response) => UploadOutcome::Success { server_response },
            Err(err) => UploadOutcome::Failure {
                reason: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Idle,
    Guarding,
    Fetching,
    Uploading,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

/// Per-run state holder. Transitions only move forward and stop at a terminal state.
#[derive(Debug)]
pub(crate) struct RunTracker {
    run_id: Uuid,
    history: Vec<RunState>,
}

impl RunTracker {
    pub(crate) fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            history: vec![RunState::Idle],
        }
    }

    pub(crate) fn state(&self) -> RunState {
        *self.history.last().unwrap_or(&RunState::Idle)
    }

    #[cfg(test)]
    pub(crate) fn history(&self) -> &[RunState] {
        &self.history
    }

    fn advance(&mut self, next: RunState) {
        let current = self.state();
        if current.is_terminal() || next <= current {
            warn!(run_id = %self.run_id, from = ?current, to = ?next, "Ignoring backward state transition");
            return;
        }
        debug!(run_id = %self.run_id, from = ?current, to = ?next, "Run state transition");
        self.history.push(next);
    }
}

/// Classify, fetch, package and upload a single document.
pub struct UploadWorkflow<B> {
    backend: B,
    endpoint: Url,
}

impl<B: RedactorBackend> UploadWorkflow<B> {
    pub fn new(backend: B, endpoint: Url) -> Self {
        Self { backend, endpoint }
    }

    /// Runs the workflow to a single outcome. Never retries.
    pub async fn run(&self, target: Option<&TargetReference>) -> UploadOutcome {
        let mut tracker = RunTracker::new();
        self.run_tracked(target, &mut tracker).await
    }

    /// Runs the workflow and emits exactly one notification for its outcome.
    pub async fn run_and_notify(
        &self,
        target: Option<&TargetReference>,
        sink: &dyn NotificationSink,
    ) -> UploadOutcome {
        let outcome = self.run(target).await;
        sink.notify(&Notification::from(&outcome));
        outcome
    }

    pub(crate) async fn run_tracked(
        &self,
        target: Option<&TargetReference>,
        tracker: &mut RunTracker,
    ) -> UploadOutcome {
        let result = self.execute(target, tracker).await;
        match &result {
            Ok(_) => tracker.advance(RunState::Succeeded),
            Err(err) => {
                warn!(run_id = %tracker.run_id, "PDF processing error: {}", err);
                tracker.advance(RunState::Failed)
            }
        }
        UploadOutcome::from(result)
    }

    async fn execute(
        &self,
        target: Option<&TargetReference>,
        tracker: &mut RunTracker,
    ) -> Result<Value, UploadError> {
        tracker.advance(RunState::Guarding);
        let url = target
            .and_then(TargetReference::url)
            .ok_or(UploadError::NoActiveTarget)?;
        info!(run_id = %tracker.run_id, url = %url, "Processing tab");
        if !is_pdf(Some(url)) {
            return Err(UploadError::NotAPdf);
        }

        tracker.advance(RunState::Fetching);
        info!(run_id = %tracker.run_id, "Fetching PDF content");
        let fetched = self.backend.fetch(url).await?;
        if !fetched.status.is_success() {
            return Err(UploadError::FetchFailed {
                status: fetched.status.as_u16(),
                status_text: fetched.status_text().to_string(),
            });
        }
        let document = PdfBytes::new(fetched.body);
        info!(run_id = %tracker.run_id, bytes = document.len(), "PDF fetched");

        tracker.advance(RunState::Uploading);
        info!(run_id = %tracker.run_id, endpoint = %self.endpoint, "Sending to redaction server");
        let reply = self.backend.upload(&self.endpoint, document).await?;
        if !reply.status.is_success() {
            return Err(UploadError::UploadRejected {
                status: reply.status.as_u16(),
                body: reply.body_text(),
            });
        }

        let server_response: Value = serde_json::from_slice(&reply.body)?;
        info!(run_id = %tracker.run_id, response = %server_response, "Backend response");
        Ok(server_response)
    }
}
