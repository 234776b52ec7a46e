/// Parsed client-side transport info from the `Transport` request header.
///
/// The client names the single UDP port it receives media on:
///
/// ```text
/// Client → Server:
///   Transport: RTP/UDP; client_port=25000
/// ```
///
/// An RFC 2326 style `client_port=RTP-RTCP` pair is accepted as well; only
/// the RTP port is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHeader {
    /// Client's media receive port.
    pub client_rtp_port: u16,
}

impl TransportHeader {
    /// Parse the `Transport` header value.
    ///
    /// Looks for `client_port=` among semicolon-separated parameters.
    ///
    /// ## Examples
    ///
    /// ```
    /// use mjpeg_rtsp::session::transport::TransportHeader;
    ///
    /// let th = TransportHeader::parse("RTP/UDP; client_port=25000").unwrap();
    /// assert_eq!(th.client_rtp_port, 25000);
    ///
    /// assert!(TransportHeader::parse("RTP/UDP").is_none());
    /// ```
    pub fn parse(header: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|part| part.trim().strip_prefix("client_port="))
            .find_map(|ports| {
                let rtp = ports.split('-').next()?.trim();
                rtp.parse().ok().map(|client_rtp_port| TransportHeader { client_rtp_port })
            })
    }

    /// Header value sent by the client.
    pub fn to_header_value(&self) -> String {
        format!("RTP/UDP; client_port={}", self.client_rtp_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_port() {
        let th = TransportHeader::parse("RTP/UDP; client_port=5000").unwrap();
        assert_eq!(th.client_rtp_port, 5000);
    }

    #[test]
    fn parse_port_pair() {
        let th = TransportHeader::parse("RTP/AVP;unicast;client_port=8000-8001").unwrap();
        assert_eq!(th.client_rtp_port, 8000);
    }

    #[test]
    fn parse_no_client_port() {
        assert!(TransportHeader::parse("RTP/UDP;unicast").is_none());
    }

    #[test]
    fn parse_unparseable_port() {
        assert!(TransportHeader::parse("RTP/UDP; client_port=abc").is_none());
        assert!(TransportHeader::parse("RTP/UDP; client_port=70000").is_none());
    }

    #[test]
    fn header_value_parses_back() {
        let th = TransportHeader { client_rtp_port: 25000 };
        assert_eq!(th.to_header_value(), "RTP/UDP; client_port=25000");
        assert_eq!(TransportHeader::parse(&th.to_header_value()), Some(th));
    }
}
