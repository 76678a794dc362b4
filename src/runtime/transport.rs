use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, warn};

use super::messages::{Inbound, RuntimeRequest, RuntimeResponse, KNOWN_ACTIONS};

/// Upper bound for one bus line. Inline data-URI tabs make lines large, so keep it generous.
pub const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// A frame read off the bus: either a text line or a line that had to be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BusLine {
    Text(String),
    Rejected(String),
}

/// `LinesCodec` that reports undecodable and oversized lines as frames instead of
/// errors, so one bad line does not end the stream.
struct BusLineCodec {
    lines: LinesCodec,
}

impl BusLineCodec {
    fn new(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
        }
    }

    fn classify(
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<BusLine>, io::Error> {
        match result {
            Ok(line) => Ok(line.map(BusLine::Text)),
            // The codec starts discarding up to the next newline
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(BusLine::Rejected(
                "Line exceeds maximum length".to_string(),
            ))),
            // The offending line has already been consumed from the buffer
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Ok(Some(BusLine::Rejected(e.to_string())))
            }
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }
}

impl Decoder for BusLineCodec {
    type Item = BusLine;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<BusLine>, io::Error> {
        Self::classify(self.lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<BusLine>, io::Error> {
        Self::classify(self.lines.decode_eof(buf))
    }
}

/// Newline-delimited JSON message bus.
pub struct LineTransport<R, W> {
    reader: FramedRead<BufReader<R>, BusLineCodec>,
    writer: FramedWrite<W, LinesCodec>,
}

pub type StdioTransport = LineTransport<tokio::io::Stdin, tokio::io::Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_max_line_length(reader, writer, MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(reader: R, writer: W, max_length: usize) -> Self {
        Self {
            reader: FramedRead::new(BufReader::new(reader), BusLineCodec::new(max_length)),
            writer: FramedWrite::new(writer, LinesCodec::new()),
        }
    }

    /// Reads the next message. `Ok(None)` means the peer closed the bus.
    pub async fn read_message(&mut self) -> Result<Option<Inbound>> {
        loop {
            match self.reader.next().await {
                Some(Ok(BusLine::Text(line))) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    debug!("Received: {}", line);
                    return Ok(Some(Self::parse_line(&line)));
                }
                Some(Ok(BusLine::Rejected(reason))) => {
                    error!("Dropping unreadable line: {}", reason);
                    return Ok(Some(Inbound::Malformed { reason }));
                }
                Some(Err(e)) => {
                    error!("Error reading from bus: {}", e);
                    return Err(anyhow::anyhow!("Transport error: {}", e));
                }
                None => {
                    debug!("EOF reached");
                    return Ok(None);
                }
            }
        }
    }

    fn parse_line(line: &str) -> Inbound {
        // Parse as generic JSON first so unknown actions can be told apart from garbage
        let value = match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to parse JSON: {}", e);
                return Inbound::Malformed {
                    reason: format!("Invalid JSON: {}", e),
                };
            }
        };

        let action = match value.get("action").and_then(|a| a.as_str()) {
            Some(action) => action.to_string(),
            None => {
                error!("Message without an action tag");
                return Inbound::Malformed {
                    reason: "Missing action".to_string(),
                };
            }
        };

        if !KNOWN_ACTIONS.contains(&action.as_str()) {
            warn!("Unknown action: {}", action);
            return Inbound::Unrecognized { action };
        }

        match serde_json::from_value::<RuntimeRequest>(value) {
            Ok(request) => Inbound::Request(request),
            Err(e) => {
                error!("Failed to parse {} request: {}", action, e);
                Inbound::Malformed {
                    reason: format!("Invalid request: {}", e),
                }
            }
        }
    }

    pub async fn write_response(&mut self, response: &RuntimeResponse) -> Result<()> {
        let json = serde_json::to_string(response)?;
        debug!("Sending: {}", json);

        self.writer.send(json).await?;

        Ok(())
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        self.writer.get_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::messages::CheckPdfResponse;

    #[tokio::test]
    async fn reads_requests_and_skips_blank_lines() {
        let input = b"\n{\"action\":\"popup-status\"}\n{\"action\":\"open-sesame\"}\nnot json\n{\"tab\":{}}\n{\"action\":\"tab-activated\"}\n";
        let mut transport = LineTransport::new(&input[..], Vec::new());

        assert_eq!(
            transport.read_message().await.unwrap(),
            Some(Inbound::Request(RuntimeRequest::PopupStatus))
        );
        assert_eq!(
            transport.read_message().await.unwrap(),
            Some(Inbound::Unrecognized {
                action: "open-sesame".to_string()
            })
        );
        for _ in 0..3 {
            assert!(matches!(
                transport.read_message().await.unwrap(),
                Some(Inbound::Malformed { .. })
            ));
        }
        assert_eq!(transport.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_end_the_bus() {
        let input = b"\xff\xfe bad\n{\"action\":\"check-pdf\",\"contentType\":\"application/pdf\"}\n";
        let mut transport = LineTransport::new(&input[..], Vec::new());

        match transport.read_message().await.unwrap() {
            Some(Inbound::Malformed { reason }) => assert!(reason.contains("UTF8")),
            other => panic!("expected malformed line, got {:?}", other),
        }
        assert_eq!(
            transport.read_message().await.unwrap(),
            Some(Inbound::Request(RuntimeRequest::CheckPdf {
                content_type: Some("application/pdf".to_string())
            }))
        );
        assert_eq!(transport.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_line_is_dropped_and_reading_resumes() {
        let long = format!("{{\"action\":\"send-pdf\",\"pad\":\"{}\"}}\n", "x".repeat(200));
        let input = format!("{}{{\"action\":\"popup-status\"}}\n", long);
        let mut transport = LineTransport::with_max_line_length(input.as_bytes(), Vec::new(), 64);

        match transport.read_message().await.unwrap() {
            Some(Inbound::Malformed { reason }) => assert!(reason.contains("maximum length")),
            other => panic!("expected oversized line to be rejected, got {:?}", other),
        }
        assert_eq!(
            transport.read_message().await.unwrap(),
            Some(Inbound::Request(RuntimeRequest::PopupStatus))
        );
    }

    #[tokio::test]
    async fn writes_one_line_per_response() {
        let mut transport = LineTransport::new(&b""[..], Vec::new());
        transport
            .write_response(&RuntimeResponse::CheckPdf(CheckPdfResponse { is_pdf: false }))
            .await
            .unwrap();

        assert_eq!(transport.writer().as_slice(), b"{\"isPdf\":false}\n");
    }
}
