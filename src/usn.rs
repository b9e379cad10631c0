/*!
`Usn` is the structured form of a UPnP Unique Service Name, of the form
`uuid:<uuid>[::(<root>|<urn>)]`.

# Specification

A USN identifies a specific advertisement: either a bare device uuid, a root-device marker
(`uuid:<uuid>::upnp:rootdevice`), or a composite of a uuid and a device/service type
(`uuid:<uuid>::<urn>`). The uuid component is always lowercased on parse.
*/

use crate::error::{invalid_value_for_type, MessageFormatError};
use crate::urn::Urn;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// The optional suffix following `uuid:<uuid>::` in a USN.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Suffix {
    /// No suffix; a bare `uuid:<uuid>`.
    None,
    /// The literal `upnp:rootdevice` marker.
    RootDevice,
    /// A device or service type URN.
    Urn(Urn),
}

///
/// A parsed Unique Service Name.
///
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Usn {
    uuid: String,
    suffix: Suffix,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Display for Usn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.suffix {
            Suffix::None => write!(f, "uuid:{}", self.uuid),
            Suffix::RootDevice => write!(f, "uuid:{}::upnp:rootdevice", self.uuid),
            Suffix::Urn(urn) => write!(f, "uuid:{}::{}", self.uuid, urn),
        }
    }
}

impl FromStr for Usn {
    type Err = MessageFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref USN: Regex = Regex::new(
                r"(?i)^uuid:([^:]+)(::((upnp:rootdevice)|(urn:.+)))?$"
            )
            .unwrap();
        }
        match USN.captures(s) {
            Some(captures) => {
                let uuid = captures.get(1).unwrap().as_str().to_lowercase();
                let suffix = if captures.get(4).is_some() {
                    Suffix::RootDevice
                } else if let Some(urn) = captures.get(5) {
                    Suffix::Urn(Urn::from_str(urn.as_str())?)
                } else {
                    Suffix::None
                };
                Ok(Usn { uuid, suffix })
            }
            None => {
                error!("Usn::from_str - '{}' is not a valid USN", s);
                Err(invalid_value_for_type("Usn", s))
            }
        }
    }
}

impl Usn {
    /// Construct a bare USN for a device uuid.
    pub fn for_device<S: Into<String>>(uuid: S) -> Self {
        Self {
            uuid: uuid.into().to_lowercase(),
            suffix: Suffix::None,
        }
    }

    /// Construct a root-device USN for a device uuid.
    pub fn for_root_device<S: Into<String>>(uuid: S) -> Self {
        Self {
            uuid: uuid.into().to_lowercase(),
            suffix: Suffix::RootDevice,
        }
    }

    /// Construct a composite USN naming a uuid and a device/service type.
    pub fn for_urn<S: Into<String>>(uuid: S, urn: Urn) -> Self {
        Self {
            uuid: uuid.into().to_lowercase(),
            suffix: Suffix::Urn(urn),
        }
    }

    /// The lowercased device uuid this USN names.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The optional suffix after the uuid.
    pub fn suffix(&self) -> &Suffix {
        &self.suffix
    }

    /// The URN named by this USN, if it carries one.
    pub fn urn(&self) -> Option<&Urn> {
        match &self.suffix {
            Suffix::Urn(urn) => Some(urn),
            _ => None,
        }
    }

    /// `true` when this USN's suffix is the root-device marker.
    pub fn is_root_device(&self) -> bool {
        matches!(self.suffix, Suffix::RootDevice)
    }
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bare_uuid() {
        let s = "uuid:4d696e69-444c-4e41-9d41-000102030405";
        let usn: Usn = s.parse().unwrap();
        assert_eq!(usn.uuid(), "4d696e69-444c-4e41-9d41-000102030405");
        assert_eq!(usn.suffix(), &Suffix::None);
        assert_eq!(usn.to_string(), s);
    }

    #[test]
    fn round_trips_root_device() {
        let s = "uuid:4d696e69-444c-4e41-9d41-000102030405::upnp:rootdevice";
        let usn: Usn = s.parse().unwrap();
        assert!(usn.is_root_device());
        assert_eq!(usn.to_string(), s);
    }

    #[test]
    fn round_trips_urn_suffix() {
        let s = "uuid:4d696e69-444c-4e41-9d41-000102030405::urn:schemas-upnp-org:service:Basic:1";
        let usn: Usn = s.parse().unwrap();
        assert!(usn.urn().is_some());
        assert_eq!(usn.to_string(), s);
    }

    #[test]
    fn lowercases_uuid() {
        let usn: Usn = "uuid:ABCD-1234".parse().unwrap();
        assert_eq!(usn.uuid(), "abcd-1234");
    }

    #[test]
    fn equality_on_canonical_string() {
        let a: Usn = "uuid:ABCD".parse().unwrap();
        let b: Usn = "uuid:abcd".parse().unwrap();
        assert_eq!(a, b);
    }
}
