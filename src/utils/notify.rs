use serde::Serialize;
use tracing::{error, info};

use crate::workflow::upload::UploadOutcome;

pub const SUCCESS_TITLE: &str = "PDF Redactor";
pub const ERROR_TITLE: &str = "PDF Redactor Error";
pub const SUCCESS_MESSAGE: &str = "Upload succeeded! Check the console for details.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// A user-facing notification: one per workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success() -> Self {
        Self {
            kind: NotificationKind::Success,
            title: SUCCESS_TITLE.to_string(),
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: ERROR_TITLE.to_string(),
            message: message.into(),
        }
    }
}

impl From<&UploadOutcome> for Notification {
    fn from(outcome: &UploadOutcome) -> Self {
        match outcome {
            UploadOutcome::Success { .. } => Notification::success(),
            UploadOutcome::Failure { reason } => Notification::error(reason.clone()),
        }
    }
}

/// Fire-and-forget notification surface.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Renders notifications as a framed box on stderr and mirrors them to the log.
/// Stdout stays untouched so it can carry bus responses.
#[derive(Debug, Default)]
pub struct StderrNotifier {
    quiet: bool,
}

impl StderrNotifier {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl NotificationSink for StderrNotifier {
    fn notify(&self, notification: &Notification) {
        match notification.kind {
            NotificationKind::Success => {
                info!(title = %notification.title, "{}", notification.message)
            }
            NotificationKind::Error => {
                error!(title = %notification.title, "{}", notification.message)
            }
        }

        if self.quiet {
            return;
        }

        let color = match notification.kind {
            NotificationKind::Success => "\x1b[32m",
            NotificationKind::Error => "\x1b[31m",
        };
        eprint!("{}", render_box(color, &notification.title, &notification.message));
    }
}

const BOX_WIDTH: usize = 60; // Total width including borders
const CONTENT_WIDTH: usize = BOX_WIDTH - 4; // Excluding "║  " and "  ║"

/// Frames a title and message in a box, the title centered, the message wrapped.
fn render_box(color: &str, title: &str, message: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}╔{}╗\n", color, "═".repeat(BOX_WIDTH - 2)));
    out.push_str(&boxed_line(&centered(title)));
    out.push_str(&format!("╟{}╢\n", "─".repeat(BOX_WIDTH - 2)));
    for line in wrap(message, CONTENT_WIDTH) {
        out.push_str(&boxed_line(&line));
    }
    out.push_str(&format!("╚{}╝\x1b[0m\n", "═".repeat(BOX_WIDTH - 2)));
    out
}

fn boxed_line(content: &str) -> String {
    let pad = CONTENT_WIDTH.saturating_sub(content.chars().count());
    format!("║  {}{}  ║\n", content, " ".repeat(pad))
}

fn centered(text: &str) -> String {
    let len = text.chars().count();
    if len >= CONTENT_WIDTH {
        return text.to_string();
    }
    let left = (CONTENT_WIDTH - len) / 2;
    format!("{}{}", " ".repeat(left), text)
}

/// Wraps each line of `text` separately, breaking at the last space that fits.
/// Spacing inside a line is kept; runs without a space are cut at `width`.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for line in text.split('\n') {
        // Tabs and carriage returns would misalign the box border
        let mut rest: Vec<char> = line
            .trim_end_matches('\r')
            .chars()
            .map(|c| if c == '\t' { ' ' } else { c })
            .collect();

        while rest.len() > width {
            let cut = rest[..=width]
                .iter()
                .rposition(|c| *c == ' ')
                .filter(|&i| i > 0)
                .unwrap_or(width);
            let skip = if rest[cut] == ' ' { cut + 1 } else { cut };
            let tail = rest.split_off(skip);
            lines.push(rest[..cut].iter().collect());
            rest = tail;
        }
        lines.push(rest.into_iter().collect());
    }

    lines
}
