use crate::error::{ParseErrorKind, Result, StreamError};

use super::request::{RTSP_VERSION, find_header, parse_headers};

/// A control reply.
///
/// Serializes to newline-separated text, `CSeq` first and `Session` second,
/// terminated by a blank line:
///
/// ```text
/// RTSP/1.0 200 OK
/// CSeq: 1
/// Session: 123456
///
/// ```
///
/// Uses a builder pattern: chain [`add_header`](Self::add_header), then call
/// [`serialize`](Self::serialize).
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspResponse {
    pub status_code: u16,
    pub status_text: String,
    pub cseq: u32,
    pub headers: Vec<(String, String)>,
}

impl RtspResponse {
    pub fn new(status_code: u16, status_text: &str, cseq: u32) -> Self {
        RtspResponse {
            status_code,
            status_text: status_text.to_string(),
            cseq,
            headers: Vec::new(),
        }
    }

    /// 200 OK.
    pub fn ok(cseq: u32) -> Self {
        Self::new(200, "OK", cseq)
    }

    /// 404 Not Found: the requested file could not be loaded.
    pub fn not_found(cseq: u32) -> Self {
        Self::new(404, "Not Found", cseq)
    }

    /// 500 Connection Error: the media socket could not be opened.
    pub fn connection_error(cseq: u32) -> Self {
        Self::new(500, "Connection Error", cseq)
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Session id from the `Session` header, without any `;timeout=` suffix.
    pub fn session(&self) -> Option<&str> {
        self.get_header("Session")
            .map(|s| s.split(';').next().unwrap_or(s).trim())
    }

    /// Serialize to the wire format, including the terminating blank line.
    pub fn serialize(&self) -> String {
        let mut response = format!(
            "{} {} {}\n",
            RTSP_VERSION, self.status_code, self.status_text
        );
        response.push_str(&format!("CSeq: {}\n", self.cseq));

        for (name, value) in &self.headers {
            response.push_str(&format!("{}: {}\n", name, value));
        }

        response.push('\n');
        response
    }

    /// Parse a reply from its text representation.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines = raw.lines().skip_while(|l| l.trim().is_empty());

        let status_line = lines
            .next()
            .ok_or(StreamError::parse(ParseErrorKind::EmptyMessage))?;

        let mut parts = status_line.splitn(3, ' ');
        let (Some(version), Some(code)) = (parts.next(), parts.next()) else {
            return Err(StreamError::parse(ParseErrorKind::InvalidStatusLine));
        };
        if !version.starts_with("RTSP/") {
            return Err(StreamError::parse(ParseErrorKind::InvalidStatusLine));
        }
        let status_code: u16 = code
            .trim()
            .parse()
            .map_err(|_| StreamError::parse(ParseErrorKind::InvalidStatusLine))?;
        let status_text = parts.next().unwrap_or("").trim().to_string();

        let (cseq, headers) = parse_headers(lines)?;

        Ok(Self {
            status_code,
            status_text,
            cseq,
            headers,
        })
    }
}
