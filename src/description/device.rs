/*!
Parsing of the `<root>`/`<device>` XML document (namespace `urn:schemas-upnp-org:device-1-0`)
into a plain description tree, prior to construction of the live [`model`](crate::model) entities.
*/

use crate::error::{invalid_field_value, missing_required_field, MessageFormatError};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// A `<service>` entry within a device's `<serviceList>`, carrying only the pointers needed to
/// fetch its SCPD and reach its control/event URLs; the URLs here are as given in the XML,
/// resolved against the device's location by the caller.
#[derive(Clone, Debug, Default)]
pub struct ServiceDescription {
    pub service_type: String,
    pub service_id: String,
    pub scpd_url: String,
    pub control_url: String,
    pub event_sub_url: String,
}

/// A parsed `<device>` element: its own metadata plus nested services and embedded devices.
#[derive(Clone, Debug, Default)]
pub struct DeviceDescription {
    pub device_type: String,
    pub friendly_name: String,
    pub udn: String,
    pub services: Vec<ServiceDescription>,
    pub embedded_devices: Vec<DeviceDescription>,
    /// Any other leaf elements not otherwise recognized (`manufacturer`, `modelName`, ...).
    pub metadata: HashMap<String, String>,
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// Parse a full device description document, returning the root `<device>` element.
pub fn parse(xml: &str) -> Result<DeviceDescription, MessageFormatError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) if local_name(e.name()) == "device" => {
                return parse_device(&mut reader);
            }
            Ok(Event::Eof) => {
                return Err(missing_required_field("device"));
            }
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("device description", "malformed xml")),
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

fn parse_device(reader: &mut Reader<&[u8]>) -> Result<DeviceDescription, MessageFormatError> {
    let mut device = DeviceDescription::default();
    let mut buf = Vec::new();
    let mut depth = 0i32;

    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name()).to_string();
                match name.as_str() {
                    "serviceList" => device.services = parse_service_list(reader)?,
                    "deviceList" => device.embedded_devices = parse_device_list(reader)?,
                    "iconList" => skip_element(reader, "iconList")?,
                    _ => {
                        let text = read_text(reader)?;
                        assign_leaf(&mut device, &name, text);
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                if local_name(e.name()) == "device" && depth == 0 {
                    return Ok(device);
                }
                depth -= 1;
            }
            Ok(Event::Eof) => return Err(missing_required_field("</device>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("device description", "malformed xml")),
        }
        buf.clear();
    }
}

fn assign_leaf(device: &mut DeviceDescription, name: &str, text: String) {
    match name {
        "deviceType" => device.device_type = text,
        "friendlyName" => device.friendly_name = text,
        "UDN" => device.udn = text.strip_prefix("uuid:").unwrap_or(&text).to_lowercase(),
        _ => {
            device.metadata.insert(name.to_string(), text);
        }
    }
}

fn parse_service_list(
    reader: &mut Reader<&[u8]>,
) -> Result<Vec<ServiceDescription>, MessageFormatError> {
    let mut services = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) if local_name(e.name()) == "service" => {
                services.push(parse_service(reader)?);
            }
            Ok(Event::End(ref e)) if local_name(e.name()) == "serviceList" => {
                return Ok(services);
            }
            Ok(Event::Eof) => return Err(missing_required_field("</serviceList>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("serviceList", "malformed xml")),
        }
        buf.clear();
    }
}

fn parse_service(reader: &mut Reader<&[u8]>) -> Result<ServiceDescription, MessageFormatError> {
    let mut service = ServiceDescription::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name()).to_string();
                let text = read_text(reader)?;
                match name.as_str() {
                    "serviceType" => service.service_type = text,
                    "serviceId" => service.service_id = text,
                    "SCPDURL" => service.scpd_url = text,
                    "controlURL" => service.control_url = text,
                    "eventSubURL" => service.event_sub_url = text,
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) if local_name(e.name()) == "service" => return Ok(service),
            Ok(Event::Eof) => return Err(missing_required_field("</service>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("service", "malformed xml")),
        }
        buf.clear();
    }
}

fn parse_device_list(
    reader: &mut Reader<&[u8]>,
) -> Result<Vec<DeviceDescription>, MessageFormatError> {
    let mut devices = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) if local_name(e.name()) == "device" => {
                devices.push(parse_device(reader)?);
            }
            Ok(Event::End(ref e)) if local_name(e.name()) == "deviceList" => {
                return Ok(devices);
            }
            Ok(Event::Eof) => return Err(missing_required_field("</deviceList>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("deviceList", "malformed xml")),
        }
        buf.clear();
    }
}

fn skip_element(reader: &mut Reader<&[u8]>, tag: &str) -> Result<(), MessageFormatError> {
    let mut buf = Vec::new();
    let mut depth = 1;
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) if local_name(e.name()) == tag => depth += 1,
            Ok(Event::End(ref e)) if local_name(e.name()) == tag => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Ok(Event::Eof) => return Err(missing_required_field(format!("</{}>", tag))),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value(tag, "malformed xml")),
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
            Ok(Event::Eof) => return Err(missing_required_field("text")),
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

    const FIXTURE: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:Basic:1</deviceType>
    <friendlyName>Example Device</friendlyName>
    <manufacturer>Acme</manufacturer>
    <UDN>uuid:4D696E69-444C-4E41-9D41-000102030405</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:Basic:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:Basic</serviceId>
        <SCPDURL>/scpd.xml</SCPDURL>
        <controlURL>/control</controlURL>
        <eventSubURL>/event</eventSubURL>
      </service>
    </serviceList>
    <deviceList>
      <device>
        <deviceType>urn:schemas-upnp-org:device:Sub:1</deviceType>
        <friendlyName>Sub Device</friendlyName>
        <UDN>uuid:sub-0001</UDN>
      </device>
    </deviceList>
  </device>
</root>"#;

    #[test]
    fn parses_device_tree() {
        let device = parse(FIXTURE).unwrap();
        assert_eq!(device.friendly_name, "Example Device");
        assert_eq!(device.udn, "4d696e69-444c-4e41-9d41-000102030405");
        assert_eq!(device.metadata.get("manufacturer").unwrap(), "Acme");
        assert_eq!(device.services.len(), 1);
        assert_eq!(device.services[0].scpd_url, "/scpd.xml");
        assert_eq!(device.embedded_devices.len(), 1);
        assert_eq!(device.embedded_devices[0].udn, "sub-0001");
    }
}
