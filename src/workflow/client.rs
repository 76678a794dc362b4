use async_trait::async_trait;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use once_cell::sync::Lazy;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::UploadError;

/// Multipart field the redaction server reads the document from.
pub const UPLOAD_FIELD: &str = "file";
/// The original filename is never forwarded.
pub const UPLOAD_FILENAME: &str = "document.pdf";
pub const PDF_MIME: &str = "application/pdf";

const DATA_SCHEME: &str = "data:";

// Browsers accept data URIs with or without base64 padding
const DATA_URL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const USER_AGENT: &str = concat!("pdf-redactor-relay/", env!("CARGO_PKG_VERSION"));

// Shared client without an explicit deadline; reqwest defaults apply
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .expect("Failed to create HTTP client")
});

/// Fetched document bytes. Owned by a single run and moved into the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfBytes(Vec<u8>);

impl PdfBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

/// Status and full body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Unknown error")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Network seam of the upload workflow.
/// Implementations only report transport failures as errors; status handling is the caller's job.
#[async_trait]
pub trait RedactorBackend: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<HttpReply, UploadError>;

    async fn upload(&self, endpoint: &Url, document: PdfBytes) -> Result<HttpReply, UploadError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: Client,
}

impl Default for ReqwestBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestBackend {
    pub fn new() -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
        }
    }

    /// Dedicated client with an explicit request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn read_reply(response: reqwest::Response) -> Result<HttpReply, UploadError> {
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl RedactorBackend for ReqwestBackend {
    async fn fetch(&self, url: &str) -> Result<HttpReply, UploadError> {
        if is_data_url(url) {
            let body = decode_data_url(url)?;
            debug!(bytes = body.len(), "Decoded inline data URL");
            return Ok(HttpReply {
                status: StatusCode::OK,
                body,
            });
        }

        debug!(url = %url, "GET document");
        let response = self.client.get(url).send().await?;
        Self::read_reply(response).await
    }

    async fn upload(&self, endpoint: &Url, document: PdfBytes) -> Result<HttpReply, UploadError> {
        debug!(endpoint = %endpoint, bytes = document.len(), "POST multipart form");
        let part = Part::bytes(document.into_inner())
            .file_name(UPLOAD_FILENAME)
            .mime_str(PDF_MIME)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(endpoint.clone())
            .multipart(form)
            .send()
            .await?;
        Self::read_reply(response).await
    }
}

fn is_data_url(url: &str) -> bool {
    url.get(..DATA_SCHEME.len())
        .map_or(false, |scheme| scheme.eq_ignore_ascii_case(DATA_SCHEME))
}

/// Decodes `data:[<mediatype>][;base64],<payload>` into raw bytes.
fn decode_data_url(url: &str) -> Result<Vec<u8>, UploadError> {
    let (meta, payload) = url[DATA_SCHEME.len()..]
        .split_once(',')
        .ok_or_else(|| UploadError::Transport("Invalid data URL: missing ','".to_string()))?;
    let raw = urlencoding::decode_binary(payload.as_bytes());

    if !meta.to_ascii_lowercase().ends_with(";base64") {
        return Ok(raw.into_owned());
    }

    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    DATA_URL_BASE64
        .decode(compact)
        .map_err(|e| UploadError::Transport(format!("Invalid data URL: {}", e)))
}
