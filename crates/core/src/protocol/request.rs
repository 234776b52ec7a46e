use std::fmt;
use std::str::FromStr;

use crate::error::{ParseErrorKind, Result, StreamError};

/// Protocol version token carried on every request and status line.
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// The four control methods this system implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Setup,
    Play,
    Pause,
    Teardown,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Teardown => "TEARDOWN",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SETUP" => Ok(Self::Setup),
            "PLAY" => Ok(Self::Play),
            "PAUSE" => Ok(Self::Pause),
            "TEARDOWN" => Ok(Self::Teardown),
            _ => Err(StreamError::parse(ParseErrorKind::UnknownMethod)),
        }
    }
}

/// A control request.
///
/// Newline-separated text, terminated by a blank line on the wire:
///
/// ```text
/// SETUP movie.mjpeg RTSP/1.0
/// CSeq: 1
/// Transport: RTP/UDP; client_port=25000
///
/// ```
///
/// `\r\n` line endings are accepted as well. Header lookup is
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspRequest {
    pub method: Method,
    /// Media file the session streams.
    pub filename: String,
    /// Protocol version (expected: `RTSP/1.0`).
    pub version: String,
    /// Request sequence number, echoed by the reply.
    pub cseq: u32,
    /// Headers other than `CSeq`, as ordered (name, value) pairs.
    pub headers: Vec<(String, String)>,
}

impl RtspRequest {
    pub fn new(method: Method, filename: &str, cseq: u32) -> Self {
        Self {
            method,
            filename: filename.to_string(),
            version: RTSP_VERSION.to_string(),
            cseq,
            headers: Vec::new(),
        }
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Parse a request from its text representation.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines = raw.lines().skip_while(|l| l.trim().is_empty());

        let request_line = lines
            .next()
            .ok_or(StreamError::parse(ParseErrorKind::EmptyMessage))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(StreamError::parse(ParseErrorKind::InvalidRequestLine));
        }

        let method: Method = parts[0].parse()?;
        let filename = parts[1].to_string();
        let version = parts[2].to_string();

        if version != RTSP_VERSION {
            tracing::warn!(version, "client sent non-RTSP/1.0 version");
        }

        let (cseq, headers) = parse_headers(lines)?;

        Ok(Self {
            method,
            filename,
            version,
            cseq,
            headers,
        })
    }

    /// Look up a header value by name (case-insensitive).
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
        let mut request = format!("{} {} {}\n", self.method, self.filename, self.version);
        request.push_str(&format!("CSeq: {}\n", self.cseq));
        for (name, value) in &self.headers {
            request.push_str(&format!("{}: {}\n", name, value));
        }
        request.push('\n');
        request
    }
}

/// Split header lines into the mandatory `CSeq` and the remaining pairs.
pub(crate) fn parse_headers<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> Result<(u32, Vec<(String, String)>)> {
    let mut cseq = None;
    let mut headers = Vec::new();

    for line in lines {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }

        let colon_pos = line
            .find(':')
            .ok_or(StreamError::parse(ParseErrorKind::InvalidHeader))?;

        let name = line[..colon_pos].trim();
        let value = line[colon_pos + 1..].trim();

        if name.eq_ignore_ascii_case("CSeq") {
            let n = value
                .parse()
                .map_err(|_| StreamError::parse(ParseErrorKind::InvalidHeader))?;
            cseq = Some(n);
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let cseq = cseq.ok_or(StreamError::parse(ParseErrorKind::MissingCSeq))?;
    Ok((cseq, headers))
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_setup_with_transport() {
        let raw = "SETUP movie.mjpeg RTSP/1.0\nCSeq: 1\nTransport: RTP/UDP; client_port=25000";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, Method::Setup);
        assert_eq!(req.filename, "movie.mjpeg");
        assert_eq!(req.version, "RTSP/1.0");
        assert_eq!(req.cseq, 1);
        assert_eq!(
            req.get_header("Transport"),
            Some("RTP/UDP; client_port=25000")
        );
        assert_eq!(req.session(), None);
    }

    #[test]
    fn parse_crlf_and_session() {
        let raw = "PLAY movie.mjpeg RTSP/1.0\r\nCSeq: 2\r\nSession: 123456;timeout=60\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, Method::Play);
        assert_eq!(req.cseq, 2);
        assert_eq!(req.session(), Some("123456"));
    }

    #[test]
    fn header_lookup_case_insensitive() {
        let raw = "PAUSE a RTSP/1.0\ncseq: 42\nsession: 7\n\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.cseq, 42);
        assert_eq!(req.get_header("SESSION"), Some("7"));
    }

    #[test]
    fn serialize_then_parse() {
        let req = RtspRequest::new(Method::Teardown, "movie.mjpeg", 9).add_header("Session", "123456");
        let text = req.serialize();
        assert_eq!(
            text,
            "TEARDOWN movie.mjpeg RTSP/1.0\nCSeq: 9\nSession: 123456\n\n"
        );
        assert_eq!(RtspRequest::parse(&text).unwrap(), req);
    }

    #[test]
    fn parse_empty_request() {
        let err = RtspRequest::parse("").unwrap_err();
        assert!(matches!(
            err,
            StreamError::Parse {
                kind: ParseErrorKind::EmptyMessage
            }
        ));
    }

    #[test]
    fn parse_invalid_request_line() {
        assert!(RtspRequest::parse("JUST_A_METHOD\nCSeq: 1\n\n").is_err());
    }

    #[test]
    fn parse_unknown_method() {
        let err = RtspRequest::parse("OPTIONS * RTSP/1.0\nCSeq: 1\n\n").unwrap_err();
        assert!(matches!(
            err,
            StreamError::Parse {
                kind: ParseErrorKind::UnknownMethod
            }
        ));
    }

    #[test]
    fn parse_missing_cseq() {
        let err = RtspRequest::parse("PLAY a RTSP/1.0\nSession: 1\n\n").unwrap_err();
        assert!(matches!(
            err,
            StreamError::Parse {
                kind: ParseErrorKind::MissingCSeq
            }
        ));
    }

    #[test]
    fn parse_non_numeric_cseq() {
        assert!(RtspRequest::parse("PLAY a RTSP/1.0\nCSeq: x\n\n").is_err());
    }
}
