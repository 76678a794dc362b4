use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::upload::{TargetReference, UploadOutcome};
use crate::utils::notify::SUCCESS_MESSAGE;

pub const NOT_A_PDF_WARNING: &str = "Warning: Current page does not appear to be a PDF";

/// Every `action` tag `RuntimeRequest` accepts.
pub const KNOWN_ACTIONS: &[&str] = &[
    "send-pdf",
    "action-clicked",
    "tab-activated",
    "check-pdf",
    "popup-status",
];

/// Requests accepted on the message bus, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum RuntimeRequest {
    /// Popup button: send the active tab (or the given one).
    SendPdf {
        #[serde(default)]
        tab: Option<TargetReference>,
    },
    /// Toolbar icon activation for a specific tab.
    ActionClicked {
        #[serde(default)]
        tab: Option<TargetReference>,
    },
    TabActivated {
        tab: TargetReference,
    },
    /// Content-script check against the page's declared content type.
    CheckPdf {
        #[serde(default, rename = "contentType")]
        content_type: Option<String>,
    },
    PopupStatus,
}

/// One message read off the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Request(RuntimeRequest),
    Unrecognized { action: String },
    Malformed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "serverResponse", skip_serializing_if = "Option::is_none")]
    pub server_response: Option<Value>,
}

impl StatusResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            server_response: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            server_response: None,
        }
    }
}

impl From<UploadOutcome> for StatusResponse {
    fn from(outcome: UploadOutcome) -> Self {
        match outcome {
            UploadOutcome::Success { server_response } => Self {
                success: true,
                message: SUCCESS_MESSAGE.to_string(),
                server_response: Some(server_response),
            },
            UploadOutcome::Failure { reason } => Self::failed(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPdfResponse {
    #[serde(rename = "isPdf")]
    pub is_pdf: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupStatusResponse {
    #[serde(rename = "isPdf")]
    pub is_pdf: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RuntimeResponse {
    Status(StatusResponse),
    CheckPdf(CheckPdfResponse),
    PopupStatus(PopupStatusResponse),
}
