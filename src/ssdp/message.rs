/*!
The SSDP message codec: parsing and serializing the HTTP-like request/response lines that are
carried as UDP datagram payloads.

# Specification

An SSDP message is either a request (`NOTIFY`/`M-SEARCH`) or a response, followed by a block of
`Name: value` headers, CRLF-terminated, ending in an empty line. Header names are folded to
upper case on parse (so lookups are case-insensitive); duplicate headers keep the last value
seen. A handful of headers have typed accessors layered over the raw string map.
*/

use crate::error::{invalid_header_value, missing_required_header, MessageFormatError};
use crate::syntax::{
    HTTP_HEADER_CACHE_CONTROL, HTTP_HEADER_HOST, HTTP_HEADER_LOCATION, HTTP_HEADER_MAN,
    HTTP_HEADER_MX, HTTP_HEADER_NT, HTTP_HEADER_NTS, HTTP_HEADER_ST, HTTP_HEADER_USN,
    HTTP_METHOD_NOTIFY, HTTP_METHOD_SEARCH, HTTP_PROTOCOL_NAME, HTTP_PROTOCOL_VERSION,
    MULTICAST_ADDRESS,
};
use crate::urn::Urn;
use crate::usn::Usn;
use regex::Regex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// Either a URN-typed notification/search target, or a raw string for values that UPnP allows to
/// be something other than a URN (`ssdp:all`, `upnp:rootdevice`, `uuid:...`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Target {
    Urn(Urn),
    Raw(String),
}

/// The parsed start line of an SSDP datagram.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StartLine {
    Request {
        method: String,
        target: String,
        version: String,
    },
    Response {
        version: String,
        status: u16,
        reason: String,
    },
}

///
/// A parsed (or to-be-serialized) SSDP message: a start line plus a header block.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SsdpMessage {
    start: StartLine,
    headers: HashMap<String, String>,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl SsdpMessage {
    /// Construct a request message (`NOTIFY` or `M-SEARCH`) addressed to the standard multicast
    /// host by default.
    pub fn request<S: Into<String>>(method: S) -> Self {
        let mut headers = HashMap::new();
        headers.insert(HTTP_HEADER_HOST.to_string(), MULTICAST_ADDRESS.to_string());
        SsdpMessage {
            start: StartLine::Request {
                method: method.into(),
                target: "*".to_string(),
                version: format!("{}/{}", HTTP_PROTOCOL_NAME, HTTP_PROTOCOL_VERSION),
            },
            headers,
        }
    }

    /// Construct a `200 OK` response message.
    pub fn response() -> Self {
        SsdpMessage {
            start: StartLine::Response {
                version: format!("{}/{}", HTTP_PROTOCOL_NAME, HTTP_PROTOCOL_VERSION),
                status: 200,
                reason: "OK".to_string(),
            },
            headers: HashMap::new(),
        }
    }

    /// Parse a raw UDP datagram payload.
    pub fn parse(text: &str) -> Result<Self, MessageFormatError> {
        let mut lines = text.split("\r\n").flat_map(|l| l.split('\n'));
        let start_line = lines
            .next()
            .ok_or_else(|| missing_required_header("start-line"))?;
        let start = parse_start_line(start_line)?;

        let mut headers = HashMap::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.insert(name.trim().to_uppercase(), value.trim().to_string());
                }
                None => {
                    warn!("SsdpMessage::parse - ignoring malformed header line: {}", line);
                }
            }
        }

        Ok(SsdpMessage { start, headers })
    }

    /// Serialize to the CRLF-delimited wire form, including the trailing empty line.
    pub fn to_wire_string(&self) -> String {
        let mut out = String::new();
        match &self.start {
            StartLine::Request {
                method,
                target,
                version,
            } => out.push_str(&format!("{} {} {}\r\n", method, target, version)),
            StartLine::Response {
                version,
                status,
                reason,
            } => out.push_str(&format!("{} {} {}\r\n", version, status, reason)),
        }
        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out.push_str("\r\n");
        out
    }

    /// Add or replace a header. The name is stored upper-cased.
    pub fn set_header<S1: Into<String>, S2: Into<String>>(&mut self, name: S1, value: S2) -> &mut Self {
        self.headers.insert(name.into().to_uppercase(), value.into());
        self
    }

    /// Raw, case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_uppercase()).map(|v| v.as_str())
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start, StartLine::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self.start, StartLine::Response { .. })
    }

    pub fn method(&self) -> Option<&str> {
        match &self.start {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    pub fn is_notify(&self) -> bool {
        self.method().map(|m| m == HTTP_METHOD_NOTIFY).unwrap_or(false)
    }

    pub fn is_search(&self) -> bool {
        self.method().map(|m| m == HTTP_METHOD_SEARCH).unwrap_or(false)
    }

    /// `HOST` header, split into address and port; the port defaults to `1900` when absent from
    /// the header value.
    pub fn host(&self) -> Option<SocketAddr> {
        let raw = self.header(HTTP_HEADER_HOST)?;
        match raw.parse::<SocketAddr>() {
            Ok(addr) => Some(addr),
            Err(_) => format!("{}:1900", raw).parse().ok(),
        }
    }

    /// `CACHE-CONTROL: max-age=<n>` parsed to seconds.
    pub fn max_age(&self) -> Option<u64> {
        lazy_static! {
            static ref MAX_AGE: Regex = Regex::new(r"max-age\s*=\s*(\d+)").unwrap();
        }
        let raw = self.header(HTTP_HEADER_CACHE_CONTROL)?;
        MAX_AGE
            .captures(raw)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header(HTTP_HEADER_LOCATION)
    }

    pub fn nt(&self) -> Option<Target> {
        self.header(HTTP_HEADER_NT).map(parse_target)
    }

    pub fn st(&self) -> Option<Target> {
        self.header(HTTP_HEADER_ST).map(parse_target)
    }

    pub fn nts(&self) -> Option<&str> {
        self.header(HTTP_HEADER_NTS)
    }

    pub fn usn(&self) -> Option<Usn> {
        self.header(HTTP_HEADER_USN).and_then(|s| Usn::from_str(s).ok())
    }

    pub fn man(&self) -> Option<&str> {
        self.header(HTTP_HEADER_MAN)
    }

    pub fn mx(&self) -> Option<u8> {
        self.header(HTTP_HEADER_MX).and_then(|s| s.parse().ok())
    }

    /// Validate that this response carries the required discovery headers, returning the first
    /// missing one as an error.
    pub fn require_headers(&self, names: &[&str]) -> Result<(), MessageFormatError> {
        for name in names {
            if self.header(name).is_none() {
                return Err(missing_required_header(*name));
            }
        }
        Ok(())
    }
}

fn parse_target(raw: &str) -> Target {
    if raw.starts_with("urn:") {
        match Urn::from_str(raw) {
            Ok(urn) => Target::Urn(urn),
            Err(_) => Target::Raw(raw.to_string()),
        }
    } else {
        Target::Raw(raw.to_string())
    }
}

fn parse_start_line(line: &str) -> Result<StartLine, MessageFormatError> {
    let line = line.trim_end_matches('\r');
    let tokens: Vec<&str> = line.splitn(3, ' ').collect();
    if tokens.len() < 2 {
        return Err(invalid_header_value("start-line", line));
    }
    if tokens[0].starts_with("HTTP/") {
        let status = tokens
            .get(1)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| invalid_header_value("status", line))?;
        let reason = tokens.get(2).unwrap_or(&"").to_string();
        Ok(StartLine::Response {
            version: tokens[0].to_string(),
            status,
            reason,
        })
    } else {
        Ok(StartLine::Request {
            method: tokens[0].to_string(),
            target: tokens[1].to_string(),
            version: tokens.get(2).unwrap_or(&"HTTP/1.1").to_string(),
        })
    }
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn alive_fixture() -> String {
        concat!(
            "NOTIFY * HTTP/1.1\r\n",
            "HOST: 239.255.255.250:1900\r\n",
            "CACHE-CONTROL: max-age=1800\r\n",
            "LOCATION: http://192.168.1.1:5885/description.xml\r\n",
            "NT: urn:schemas-upnp-org:device:Basic:1\r\n",
            "NTS: ssdp:alive\r\n",
            "USN: uuid:4d696e69-444c-4e41-9d41-000102030405::urn:schemas-upnp-org:device:Basic:1\r\n",
            "SERVER: unix/5.1 UPnP/1.1 MyProduct/1.0\r\n",
            "\r\n"
        )
        .to_string()
    }

    #[test]
    fn parses_notify_alive() {
        let msg = SsdpMessage::parse(&alive_fixture()).unwrap();
        assert!(msg.is_notify());
        assert_eq!(msg.nts(), Some("ssdp:alive"));
        assert_eq!(msg.max_age(), Some(1800));
        assert_eq!(
            msg.location(),
            Some("http://192.168.1.1:5885/description.xml")
        );
        assert!(matches!(msg.nt(), Some(Target::Urn(_))));
        assert!(msg.usn().is_some());
    }

    #[test]
    fn parse_generate_round_trip_preserves_semantics() {
        let msg = SsdpMessage::parse(&alive_fixture()).unwrap();
        let wire = msg.to_wire_string();
        let reparsed = SsdpMessage::parse(&wire).unwrap();
        assert_eq!(msg, reparsed);
    }

    #[test]
    fn parses_response() {
        let text = concat!(
            "HTTP/1.1 200 OK\r\n",
            "CACHE-CONTROL: max-age=1800\r\n",
            "EXT:\r\n",
            "LOCATION: http://192.168.1.1:5885/description.xml\r\n",
            "SERVER: unix/5.1 UPnP/1.1 MyProduct/1.0\r\n",
            "ST: upnp:rootdevice\r\n",
            "USN: uuid:4d696e69-444c-4e41-9d41-000102030405::upnp:rootdevice\r\n",
            "\r\n"
        );
        let msg = SsdpMessage::parse(text).unwrap();
        assert!(msg.is_response());
        assert_eq!(msg.st(), Some(Target::Raw("upnp:rootdevice".to_string())));
    }

    #[test]
    fn host_defaults_port_to_1900() {
        let mut msg = SsdpMessage::request(HTTP_METHOD_SEARCH);
        msg.set_header(HTTP_HEADER_HOST, "239.255.255.250");
        assert_eq!(msg.host().unwrap().port(), 1900);
    }
}
