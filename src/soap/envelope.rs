/*!
The SOAP 1.1 envelope: encoding an action request body and decoding a response or fault body.

```text
POST path of control URL HTTP/1.1
HOST: host of control URL:port of control URL
CONTENT-LENGTH: bytes in body
CONTENT-TYPE: text/xml; charset="utf-8"
SOAPACTION: "urn:schemas-upnp-org:service:serviceType:v#actionName"

<?xml version="1.0"?>
<s:Envelope
   xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"
   s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
   <s:Body>
      <u:actionName xmlns:u="urn:schemas-upnp-org:service:serviceType:v">
         <argumentName>in arg value</argumentName>
      </u:actionName>
   </s:Body>
</s:Envelope>
```
*/

use crate::error::{invalid_field_value, missing_required_field, MessageFormatError};
use crate::syntax::{SOAP_ELEM_BODY, SOAP_ELEM_ENVELOPE, SOAP_NS_ENCODING, SOAP_NS_ENVELOPE};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt::Write as _;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// A decoded SOAP response: either the `out` arguments of a successful call, or a UPnP error
/// fault.
#[derive(Clone, Debug)]
pub enum ActionResponse {
    Result(Vec<(String, String)>),
    Fault { upnp_error_code: i32, description: String },
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Build the envelope body for invoking `action_name` on `service_type` with the given ordered
/// `in` arguments (name, already-marshalled wire value).
pub fn encode_request(service_type: &str, action_name: &str, arguments: &[(&str, String)]) -> String {
    let mut body = String::new();
    write!(body, r#"<?xml version="1.0"?>"#).unwrap();
    write!(
        body,
        r#"<{envelope} xmlns:s="{ns_envelope}" s:encodingStyle="{ns_encoding}">"#,
        envelope = SOAP_ELEM_ENVELOPE,
        ns_envelope = SOAP_NS_ENVELOPE,
        ns_encoding = SOAP_NS_ENCODING,
    )
    .unwrap();
    write!(body, "<{}>", SOAP_ELEM_BODY).unwrap();
    write!(body, r#"<u:{action} xmlns:u="{service_type}">"#, action = action_name).unwrap();
    for (name, value) in arguments {
        write!(body, "<{name}>{value}</{name}>", name = name, value = escape(value)).unwrap();
    }
    write!(body, "</u:{}>", action_name).unwrap();
    write!(body, "</{}>", SOAP_ELEM_BODY).unwrap();
    write!(body, "</{}>", SOAP_ELEM_ENVELOPE).unwrap();
    body
}

/// Parse a response envelope: either the successful action-response element's children as
/// `(name, text)` pairs, or a `s:Fault` carrying a UPnP error code and description.
pub fn parse_response(xml: &str) -> Result<ActionResponse, MessageFormatError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name());
                if name == "Fault" {
                    return parse_fault(&mut reader);
                }
                if name == "Envelope" || name == "Body" {
                    continue;
                }
                // First non-Envelope, non-Body, non-Fault start element is the action response
                // wrapper; parse_result reads its children, not the wrapper itself.
                return parse_result(&mut reader);
            }
            Ok(Event::Eof) => return Err(missing_required_field("Envelope")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("soap envelope", "malformed xml")),
        }
        buf.clear();
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn local_name(name: &[u8]) -> &str {
    let name = std::str::from_utf8(name).unwrap_or("");
    name.rsplit(':').next().unwrap_or(name)
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Read the immediate children of the action-response wrapper element as `(name, text)` pairs.
/// `read_text` below already consumes each child's own end tag, so the next event this loop sees
/// is either the next sibling's start tag or the wrapper's own end tag.
fn parse_result(reader: &mut Reader<&[u8]>) -> Result<ActionResponse, MessageFormatError> {
    let mut arguments = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name()).to_string();
                let text = read_text(reader)?;
                arguments.push((name, text));
            }
            Ok(Event::End(_)) => return Ok(ActionResponse::Result(arguments)),
            Ok(Event::Eof) => return Ok(ActionResponse::Result(arguments)),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("soap result", "malformed xml")),
        }
        buf.clear();
    }
}

fn parse_fault(reader: &mut Reader<&[u8]>) -> Result<ActionResponse, MessageFormatError> {
    let mut description = String::new();
    let mut upnp_error_code = 0;
    let mut buf = Vec::new();

    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => match local_name(e.name()) {
                "faultstring" => description = read_text(reader)?,
                "errorCode" => {
                    upnp_error_code = read_text(reader)?.trim().parse().unwrap_or(0);
                }
                "errorDescription" => description = read_text(reader)?,
                _ => {}
            },
            Ok(Event::End(ref e)) if local_name(e.name()) == "Fault" => {
                return Ok(ActionResponse::Fault {
                    upnp_error_code,
                    description,
                })
            }
            Ok(Event::Eof) => {
                return Ok(ActionResponse::Fault {
                    upnp_error_code,
                    description,
                })
            }
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("soap fault", "malformed xml")),
        }
        buf.clear();
    }
}

fn read_text(reader: &mut Reader<&[u8]>) -> Result<String, MessageFormatError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Text(e)) => {
                text.push_str(
                    &e.unescape_and_decode(reader)
                        .map_err(|_| invalid_field_value("text", "invalid encoding"))?,
                );
            }
            Ok(Event::End(_)) => return Ok(text),
            Ok(Event::Start(_)) => {}
            Ok(Event::Eof) => return Ok(text),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("text", "malformed xml")),
        }
        buf.clear();
    }
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_request_body() {
        let body = encode_request(
            "urn:schemas-upnp-org:service:SwitchPower:1",
            "SetTarget",
            &[("newTargetValue", "1".to_string())],
        );
        assert!(body.contains("<u:SetTarget xmlns:u=\"urn:schemas-upnp-org:service:SwitchPower:1\">"));
        assert!(body.contains("<newTargetValue>1</newTargetValue>"));
        assert!(body.contains("</u:SetTarget>"));
    }

    #[test]
    fn parses_successful_response() {
        let xml = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">"#,
            r#"<s:Body><u:GetTargetResponse xmlns:u="urn:schemas-upnp-org:service:SwitchPower:1">"#,
            r#"<RetTargetValue>1</RetTargetValue>"#,
            r#"</u:GetTargetResponse></s:Body></s:Envelope>"#
        );
        match parse_response(xml).unwrap() {
            ActionResponse::Result(args) => {
                assert_eq!(args, vec![("RetTargetValue".to_string(), "1".to_string())]);
            }
            ActionResponse::Fault { .. } => panic!("expected a result"),
        }
    }

    #[test]
    fn parses_fault_response() {
        let xml = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">"#,
            r#"<s:Body><s:Fault>"#,
            r#"<faultcode>s:Client</faultcode>"#,
            r#"<faultstring>UPnPError</faultstring>"#,
            r#"<detail><UPnPError xmlns="urn:schemas-upnp-org:control-1-0">"#,
            r#"<errorCode>402</errorCode><errorDescription>Invalid Args</errorDescription>"#,
            r#"</UPnPError></detail>"#,
            r#"</s:Fault></s:Body></s:Envelope>"#
        );
        match parse_response(xml).unwrap() {
            ActionResponse::Fault {
                upnp_error_code,
                description,
            } => {
                assert_eq!(upnp_error_code, 402);
                assert_eq!(description, "Invalid Args");
            }
            ActionResponse::Result(_) => panic!("expected a fault"),
        }
    }
}
