use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::messages::*;
use super::transport::LineTransport;
use crate::utils::notify::NotificationSink;
use crate::utils::pdf::{is_pdf, is_pdf_content_type};
use crate::workflow::client::RedactorBackend;
use crate::workflow::upload::{TargetReference, UploadWorkflow};

/// Dispatches bus requests. Holds the last activated tab in place of a browser tab query.
///
/// Requests are handled one at a time in arrival order. Repeated send requests are not
/// deduplicated: each one is an independent run.
pub struct MessageHost<B> {
    workflow: UploadWorkflow<B>,
    sink: Arc<dyn NotificationSink>,
    active_tab: Option<TargetReference>,
}

impl<B: RedactorBackend> MessageHost<B> {
    pub fn new(workflow: UploadWorkflow<B>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            workflow,
            sink,
            active_tab: None,
        }
    }

    pub fn with_active_tab(mut self, tab: Option<TargetReference>) -> Self {
        self.active_tab = tab;
        self
    }

    pub async fn serve<R, W>(&mut self, transport: &mut LineTransport<R, W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Message host listening on stdio");

        while let Some(message) = transport.read_message().await? {
            match message {
                Inbound::Request(request) => {
                    let response = self.handle_request(request).await;
                    transport.write_response(&response).await?;
                }
                Inbound::Unrecognized { action } => {
                    let response = RuntimeResponse::Status(StatusResponse::failed(format!(
                        "Unknown action: {}",
                        action
                    )));
                    transport.write_response(&response).await?;
                }
                Inbound::Malformed { reason } => {
                    warn!("Skipping malformed message: {}", reason);
                }
            }
        }

        info!("Bus closed");
        Ok(())
    }

    pub async fn handle_request(&mut self, request: RuntimeRequest) -> RuntimeResponse {
        match request {
            RuntimeRequest::SendPdf { tab } => {
                let target = tab.or_else(|| self.active_tab.clone());
                self.send(target).await
            }
            RuntimeRequest::ActionClicked { tab } => self.send(tab).await,
            RuntimeRequest::TabActivated { tab } => {
                debug!(url = ?tab.url, "Active tab changed");
                self.active_tab = Some(tab);
                RuntimeResponse::Status(StatusResponse::ok("Active tab updated"))
            }
            RuntimeRequest::CheckPdf { content_type } => {
                RuntimeResponse::CheckPdf(CheckPdfResponse {
                    is_pdf: is_pdf_content_type(content_type.as_deref()),
                })
            }
            RuntimeRequest::PopupStatus => self.popup_status(),
        }
    }

    async fn send(&self, target: Option<TargetReference>) -> RuntimeResponse {
        let outcome = self
            .workflow
            .run_and_notify(target.as_ref(), self.sink.as_ref())
            .await;
        debug!(success = outcome.is_success(), "Send request settled");
        RuntimeResponse::Status(StatusResponse::from(outcome))
    }

    fn popup_status(&self) -> RuntimeResponse {
        let url = self.active_tab.as_ref().and_then(TargetReference::url);
        let is_pdf = is_pdf(url);
        RuntimeResponse::PopupStatus(PopupStatusResponse {
            is_pdf,
            warning: (!is_pdf).then(|| NOT_A_PDF_WARNING.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::notify::testing::RecordingSink;
    use crate::utils::notify::{ERROR_TITLE, SUCCESS_TITLE};
    use crate::workflow::testing::FakeBackend;
    use serde_json::json;
    use url::Url;

    fn host(backend: FakeBackend) -> (MessageHost<FakeBackend>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let workflow =
            UploadWorkflow::new(backend, Url::parse("http://localhost:8000/upload").unwrap());
        (MessageHost::new(workflow, sink.clone()), sink)
    }

    fn pdf_backend() -> FakeBackend {
        FakeBackend::new()
            .fetch_reply(200, b"%PDF-1.4")
            .upload_reply(200, br#"{"status":"ok"}"#)
    }

    #[tokio::test]
    async fn send_pdf_uses_active_tab() {
        let (mut host, sink) = host(pdf_backend());
        host.handle_request(RuntimeRequest::TabActivated {
            tab: TargetReference::from_url("https://example.com/doc.pdf"),
        })
        .await;

        let response = host
            .handle_request(RuntimeRequest::SendPdf { tab: None })
            .await;

        match response {
            RuntimeResponse::Status(status) => {
                assert!(status.success);
                assert_eq!(status.server_response, Some(json!({"status": "ok"})));
            }
            other => panic!("unexpected response {:?}", other),
        }
        let notes = sink.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, SUCCESS_TITLE);
    }

    #[tokio::test]
    async fn send_pdf_without_active_tab_notifies_once() {
        let (mut host, sink) = host(pdf_backend());

        let response = host
            .handle_request(RuntimeRequest::SendPdf { tab: None })
            .await;

        assert_eq!(
            response,
            RuntimeResponse::Status(StatusResponse::failed("No active tab found."))
        );
        let notes = sink.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, ERROR_TITLE);
        assert_eq!(notes[0].message, "No active tab found.");
    }

    #[tokio::test]
    async fn action_click_ignores_active_tab() {
        let (mut host, sink) = host(pdf_backend());
        host = host.with_active_tab(Some(TargetReference::from_url(
            "https://example.com/doc.pdf",
        )));

        let response = host
            .handle_request(RuntimeRequest::ActionClicked {
                tab: Some(TargetReference::from_url("https://example.com/page.html")),
            })
            .await;

        assert_eq!(
            response,
            RuntimeResponse::Status(StatusResponse::failed(
                "Current tab doesn't appear to be a PDF. URL must end with .pdf."
            ))
        );
        assert_eq!(sink.notifications().len(), 1);
    }

    #[tokio::test]
    async fn check_pdf_is_strict() {
        let (mut host, sink) = host(FakeBackend::new());

        for (content_type, expected) in [
            (Some("application/pdf"), true),
            (Some("text/html"), false),
            (Some("https://example.com/doc.pdf"), false),
            (None, false),
        ] {
            let response = host
                .handle_request(RuntimeRequest::CheckPdf {
                    content_type: content_type.map(str::to_string),
                })
                .await;
            assert_eq!(
                response,
                RuntimeResponse::CheckPdf(CheckPdfResponse { is_pdf: expected })
            );
        }
        assert!(sink.notifications().is_empty());
    }

    #[tokio::test]
    async fn popup_status_warns_for_non_pdf_tab() {
        let (host, _) = host(FakeBackend::new());
        let mut host =
            host.with_active_tab(Some(TargetReference::from_url("https://example.com/")));

        assert_eq!(
            host.handle_request(RuntimeRequest::PopupStatus).await,
            RuntimeResponse::PopupStatus(PopupStatusResponse {
                is_pdf: false,
                warning: Some(NOT_A_PDF_WARNING.to_string()),
            })
        );

        host.handle_request(RuntimeRequest::TabActivated {
            tab: TargetReference::from_url("https://example.com/x.pdf?page=2"),
        })
        .await;
        assert_eq!(
            host.handle_request(RuntimeRequest::PopupStatus).await,
            RuntimeResponse::PopupStatus(PopupStatusResponse {
                is_pdf: true,
                warning: None,
            })
        );
    }

    #[tokio::test]
    async fn serve_answers_each_request_once() {
        let (mut host, sink) = host(pdf_backend());
        let input = concat!(
            "{\"action\":\"tab-activated\",\"tab\":{\"id\":1,\"url\":\"https://example.com/doc.pdf\"}}\n",
            "garbage\n",
            "{\"action\":\"send-pdf\"}\n",
            "{\"action\":\"reload\"}\n",
            "{\"action\":\"check-pdf\",\"contentType\":\"application/pdf\"}\n",
        );
        let mut transport = LineTransport::new(input.as_bytes(), Vec::new());

        host.serve(&mut transport).await.unwrap();

        let written = String::from_utf8(transport.writer().clone()).unwrap();
        let lines: Vec<serde_json::Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["success"], json!(true));
        assert_eq!(lines[1]["serverResponse"], json!({"status": "ok"}));
        assert_eq!(lines[2], json!({"success": false, "message": "Unknown action: reload"}));
        assert_eq!(lines[3], json!({"isPdf": true}));
        assert_eq!(sink.notifications().len(), 1);
    }

    #[tokio::test]
    async fn serve_survives_undecodable_line() {
        let (mut host, _) = host(FakeBackend::new());
        let mut input = b"\xff\xfe bad\n".to_vec();
        input.extend_from_slice(b"{\"action\":\"check-pdf\",\"contentType\":\"application/pdf\"}\n");
        let mut transport = LineTransport::new(input.as_slice(), Vec::new());

        host.serve(&mut transport).await.unwrap();

        assert_eq!(transport.writer().as_slice(), b"{\"isPdf\":true}\n");
    }
}
