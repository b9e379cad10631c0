/*!
UPnP state-variable primitive types and the host-value `Value` used to marshal SOAP arguments
and GENA event payloads.

# Specification

A `stateVariable`'s `dataType` element names one of the UPnP primitive types; this module maps
those names to a small host-side value type and handles marshalling (host → wire string) and
unmarshalling (wire string → host) in both directions. Names not recognized as numeric or
boolean fall back to string pass-through, matching UPnP's `string`/`uri`/`uuid`/`date` family.
*/

use crate::error::{invalid_value_for_type, MessageFormatError};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// The UPnP primitive type named by a state variable's `dataType` element.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataType {
    /// `ui1`, `ui2`, `ui4`, `ui8`, `i1`, `i2`, `i4`, `int`.
    Integer,
    /// `r4`, `r8`, `number`, `fixed.14.4`, `float`.
    Float,
    /// `boolean`.
    Boolean,
    /// Everything else: `string`, `uri`, `uuid`, `date`, `bin.base64`, etc.
    String,
}

/// A host-side value for a state variable, used both as a SOAP argument value and as a GENA
/// event property value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl DataType {
    /// Classify a `dataType` element's text content.
    pub fn from_upnp_name(name: &str) -> Self {
        match name {
            "ui1" | "ui2" | "ui4" | "ui8" | "i1" | "i2" | "i4" | "i8" | "int" => {
                DataType::Integer
            }
            "r4" | "r8" | "number" | "fixed.14.4" | "float" => DataType::Float,
            "boolean" => DataType::Boolean,
            _ => DataType::String,
        }
    }

    /// Parse the wire-format text of a state variable into a host [`Value`] according to this
    /// type. Values that fail to parse as their declared type fall back to a string, since
    /// GENA/SOAP payloads are tolerant by design (see the crate's error-handling policy).
    pub fn parse(&self, text: &str) -> Result<Value, MessageFormatError> {
        match self {
            DataType::Integer => text
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| invalid_value_for_type("integer", text)),
            DataType::Float => text
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| invalid_value_for_type("float", text)),
            DataType::Boolean => match text.trim() {
                "1" | "true" | "yes" => Ok(Value::Boolean(true)),
                "0" | "false" | "no" => Ok(Value::Boolean(false)),
                other => Err(invalid_value_for_type("boolean", other)),
            },
            DataType::String => Ok(Value::String(text.to_string())),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", if *v { "1" } else { "0" }),
            Value::String(v) => write!(f, "{}", v),
        }
    }
}

impl FromStr for DataType {
    type Err = MessageFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DataType::from_upnp_name(s))
    }
}

impl Value {
    /// The value rendered as a SOAP/GENA wire-format string.
    pub fn to_wire_string(&self) -> String {
        self.to_string()
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_names() {
        assert_eq!(DataType::from_upnp_name("ui4"), DataType::Integer);
        assert_eq!(DataType::from_upnp_name("r4"), DataType::Float);
        assert_eq!(DataType::from_upnp_name("boolean"), DataType::Boolean);
        assert_eq!(DataType::from_upnp_name("string"), DataType::String);
        assert_eq!(DataType::from_upnp_name("uri"), DataType::String);
    }

    #[test]
    fn parses_boolean_variants() {
        assert_eq!(
            DataType::Boolean.parse("1").unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            DataType::Boolean.parse("0").unwrap(),
            Value::Boolean(false)
        );
        assert!(DataType::Boolean.parse("maybe").is_err());
    }

    #[test]
    fn round_trips_integer() {
        let v = DataType::Integer.parse("458").unwrap();
        assert_eq!(v.to_wire_string(), "458");
    }
}
