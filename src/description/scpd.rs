/*!
Parsing of a Service Control Protocol Description (SCPD) document (namespace
`urn:schemas-upnp-org:service-1-0`): the `<actionList>` and `<serviceStateTable>` that together
define a service's schema.
*/

use crate::error::{invalid_field_value, missing_required_field, MessageFormatError};
use crate::types::DataType;
use quick_xml::events::Event;
use quick_xml::Reader;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    In,
    Out,
}

#[derive(Clone, Debug)]
pub struct ArgumentDescription {
    pub name: String,
    pub direction: Direction,
    pub retval: bool,
    pub related_state_variable: String,
}

#[derive(Clone, Debug, Default)]
pub struct ActionDescription {
    pub name: String,
    pub arguments: Vec<ArgumentDescription>,
}

#[derive(Clone, Debug)]
pub struct AllowedRange {
    pub minimum: f64,
    pub maximum: f64,
    pub step: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct StateVariableDescription {
    pub name: String,
    pub data_type: DataType,
    pub default_value: Option<String>,
    pub allowed_values: Vec<String>,
    pub allowed_range: Option<AllowedRange>,
    pub send_events: bool,
    pub multicast: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ScpdDescription {
    pub actions: Vec<ActionDescription>,
    pub state_variables: Vec<StateVariableDescription>,
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

pub fn parse(xml: &str) -> Result<ScpdDescription, MessageFormatError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut scpd = ScpdDescription::default();

    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => match local_name(e.name()) {
                "actionList" => scpd.actions = parse_action_list(&mut reader)?,
                "serviceStateTable" => scpd.state_variables = parse_state_table(&mut reader)?,
                _ => {}
            },
            Ok(Event::Eof) => return Ok(scpd),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("scpd", "malformed xml")),
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

fn parse_action_list(
    reader: &mut Reader<&[u8]>,
) -> Result<Vec<ActionDescription>, MessageFormatError> {
    let mut actions = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) if local_name(e.name()) == "action" => {
                actions.push(parse_action(reader)?);
            }
            Ok(Event::End(ref e)) if local_name(e.name()) == "actionList" => return Ok(actions),
            Ok(Event::Eof) => return Err(missing_required_field("</actionList>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("actionList", "malformed xml")),
        }
        buf.clear();
    }
}

fn parse_action(reader: &mut Reader<&[u8]>) -> Result<ActionDescription, MessageFormatError> {
    let mut action = ActionDescription::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => match local_name(e.name()) {
                "name" => action.name = read_text(reader)?,
                "argumentList" => action.arguments = parse_argument_list(reader)?,
                _ => {}
            },
            Ok(Event::End(ref e)) if local_name(e.name()) == "action" => return Ok(action),
            Ok(Event::Eof) => return Err(missing_required_field("</action>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("action", "malformed xml")),
        }
        buf.clear();
    }
}

fn parse_argument_list(
    reader: &mut Reader<&[u8]>,
) -> Result<Vec<ArgumentDescription>, MessageFormatError> {
    let mut arguments = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) if local_name(e.name()) == "argument" => {
                arguments.push(parse_argument(reader)?);
            }
            Ok(Event::End(ref e)) if local_name(e.name()) == "argumentList" => {
                return Ok(arguments)
            }
            Ok(Event::Eof) => return Err(missing_required_field("</argumentList>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("argumentList", "malformed xml")),
        }
        buf.clear();
    }
}

fn parse_argument(reader: &mut Reader<&[u8]>) -> Result<ArgumentDescription, MessageFormatError> {
    let mut name = String::new();
    let mut direction = Direction::In;
    let mut retval = false;
    let mut related_state_variable = String::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => match local_name(e.name()) {
                "name" => name = read_text(reader)?,
                "direction" => {
                    direction = if read_text(reader)? == "out" {
                        Direction::Out
                    } else {
                        Direction::In
                    }
                }
                "retval" => retval = true,
                "relatedStateVariable" => related_state_variable = read_text(reader)?,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if local_name(e.name()) == "retval" => retval = true,
            Ok(Event::End(ref e)) if local_name(e.name()) == "argument" => {
                return Ok(ArgumentDescription {
                    name,
                    direction,
                    retval,
                    related_state_variable,
                })
            }
            Ok(Event::Eof) => return Err(missing_required_field("</argument>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("argument", "malformed xml")),
        }
        buf.clear();
    }
}

fn parse_state_table(
    reader: &mut Reader<&[u8]>,
) -> Result<Vec<StateVariableDescription>, MessageFormatError> {
    let mut variables = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) if local_name(e.name()) == "stateVariable" => {
                let send_events = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key == b"sendEvents")
                    .map(|a| a.value.as_ref() == b"yes")
                    .unwrap_or(false);
                let multicast = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key == b"multicast")
                    .map(|a| a.value.as_ref() == b"yes")
                    .unwrap_or(false);
                variables.push(parse_state_variable(reader, send_events, multicast)?);
            }
            Ok(Event::End(ref e)) if local_name(e.name()) == "serviceStateTable" => {
                return Ok(variables)
            }
            Ok(Event::Eof) => return Err(missing_required_field("</serviceStateTable>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("serviceStateTable", "malformed xml")),
        }
        buf.clear();
    }
}

fn parse_state_variable(
    reader: &mut Reader<&[u8]>,
    send_events: bool,
    multicast: bool,
) -> Result<StateVariableDescription, MessageFormatError> {
    let mut name = String::new();
    let mut data_type = DataType::String;
    let mut default_value = None;
    let mut allowed_values = Vec::new();
    let mut allowed_range = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => match local_name(e.name()) {
                "name" => name = read_text(reader)?,
                "dataType" => data_type = DataType::from_upnp_name(&read_text(reader)?),
                "defaultValue" => default_value = Some(read_text(reader)?),
                "allowedValueList" => allowed_values = parse_allowed_value_list(reader)?,
                "allowedValueRange" => allowed_range = Some(parse_allowed_range(reader)?),
                _ => {}
            },
            Ok(Event::End(ref e)) if local_name(e.name()) == "stateVariable" => {
                return Ok(StateVariableDescription {
                    name,
                    data_type,
                    default_value,
                    allowed_values,
                    allowed_range,
                    send_events,
                    multicast,
                })
            }
            Ok(Event::Eof) => return Err(missing_required_field("</stateVariable>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("stateVariable", "malformed xml")),
        }
        buf.clear();
    }
}

fn parse_allowed_value_list(
    reader: &mut Reader<&[u8]>,
) -> Result<Vec<String>, MessageFormatError> {
    let mut values = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) if local_name(e.name()) == "allowedValue" => {
                values.push(read_text(reader)?);
            }
            Ok(Event::End(ref e)) if local_name(e.name()) == "allowedValueList" => {
                return Ok(values)
            }
            Ok(Event::Eof) => return Err(missing_required_field("</allowedValueList>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("allowedValueList", "malformed xml")),
        }
        buf.clear();
    }
}

fn parse_allowed_range(reader: &mut Reader<&[u8]>) -> Result<AllowedRange, MessageFormatError> {
    let mut minimum = 0.0;
    let mut maximum = 0.0;
    let mut step = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => match local_name(e.name()) {
                "minimum" => minimum = parse_f64(&read_text(reader)?)?,
                "maximum" => maximum = parse_f64(&read_text(reader)?)?,
                "step" => step = Some(parse_f64(&read_text(reader)?)?),
                _ => {}
            },
            Ok(Event::End(ref e)) if local_name(e.name()) == "allowedValueRange" => {
                return Ok(AllowedRange {
                    minimum,
                    maximum,
                    step,
                })
            }
            Ok(Event::Eof) => return Err(missing_required_field("</allowedValueRange>")),
            Ok(_) => {}
            Err(_) => return Err(invalid_field_value("allowedValueRange", "malformed xml")),
        }
        buf.clear();
    }
}

fn parse_f64(text: &str) -> Result<f64, MessageFormatError> {
    text.parse().map_err(|_| invalid_field_value("number", text))
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
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <actionList>
    <action>
      <name>SetTarget</name>
      <argumentList>
        <argument>
          <name>newTargetValue</name>
          <direction>in</direction>
          <relatedStateVariable>Target</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="yes">
      <name>Target</name>
      <dataType>boolean</dataType>
      <defaultValue>0</defaultValue>
    </stateVariable>
  </serviceStateTable>
</scpd>"#;

    #[test]
    fn parses_actions_and_state_variables() {
        let scpd = parse(FIXTURE).unwrap();
        assert_eq!(scpd.actions.len(), 1);
        assert_eq!(scpd.actions[0].name, "SetTarget");
        assert_eq!(scpd.actions[0].arguments[0].related_state_variable, "Target");
        assert_eq!(scpd.state_variables.len(), 1);
        assert!(scpd.state_variables[0].send_events);
        assert_eq!(scpd.state_variables[0].data_type, DataType::Boolean);
    }
}
