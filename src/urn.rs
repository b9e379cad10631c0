/*!
`URN` is the structured form of a UPnP device or service type identifier, of the form
`urn:<domain>:<kind>:<type>:<version>`.

# Specification

Device and service types are communicated in `NT`/`ST`/`USN` discovery headers and in the
`deviceType`/`serviceType` description elements. A type always names a domain (`schemas-upnp-org`
for standard types, a vendor domain otherwise), whether it identifies a `device` or a `service`,
the type name itself, and an integer version.
*/

use crate::error::{invalid_value_for_type, MessageFormatError};
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// Whether a [`Urn`] identifies a device type or a service type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Kind {
    /// `urn:<domain>:device:<type>:<version>`
    Device,
    /// `urn:<domain>:service:<type>:<version>`
    Service,
}

///
/// A parsed `urn:<domain>:<kind>:<type>:<version>` identifier.
///
/// Equality and hashing are defined on the canonical rendered string, so two `Urn` values parsed
/// from differently-cased version numbers (which UPnP never varies in practice) will compare
/// equal only if their rendered forms match exactly.
///
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Urn {
    domain: String,
    kind: Kind,
    type_name: String,
    version: String,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Display for Urn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "urn:{}:{}:{}:{}",
            self.domain,
            self.kind,
            self.type_name,
            self.version
        )
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Kind::Device => "device",
                Kind::Service => "service",
            }
        )
    }
}

impl FromStr for Urn {
    type Err = MessageFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref URN: Regex =
                Regex::new(r"^urn:([^:]+):(device|service):([^:]+):([^:]+)$").unwrap();
        }
        match URN.captures(s) {
            Some(captures) => Ok(Urn {
                domain: captures.get(1).unwrap().as_str().to_string(),
                kind: if &captures[2] == "device" {
                    Kind::Device
                } else {
                    Kind::Service
                },
                type_name: captures.get(3).unwrap().as_str().to_string(),
                version: captures.get(4).unwrap().as_str().to_string(),
            }),
            None => {
                error!("Urn::from_str - '{}' is not a valid URN", s);
                Err(invalid_value_for_type("Urn", s))
            }
        }
    }
}

impl Urn {
    /// Construct a URN from its parts directly, bypassing string parsing.
    pub fn new<S1, S2, S3>(domain: S1, kind: Kind, type_name: S2, version: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            domain: domain.into(),
            kind,
            type_name: type_name.into(),
            version: version.into(),
        }
    }

    /// The domain component; `schemas-upnp-org` for standard types.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Whether this names a device or a service type.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The bare type name, without domain, kind, or version.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The version component, rendered as given (not parsed as an integer; UPnP treats it as an
    /// opaque ASCII token, though in practice it is always numeric).
    pub fn version(&self) -> &str {
        &self.version
    }

    /// `true` when the domain is not the standard `schemas-upnp-org` namespace.
    pub fn is_vendor(&self) -> bool {
        self.domain != "schemas-upnp-org"
    }
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_standard_device_type() {
        let s = "urn:schemas-upnp-org:device:MediaRenderer:1";
        let urn: Urn = s.parse().unwrap();
        assert_eq!(urn.domain(), "schemas-upnp-org");
        assert_eq!(urn.kind(), Kind::Device);
        assert_eq!(urn.type_name(), "MediaRenderer");
        assert_eq!(urn.version(), "1");
        assert!(!urn.is_vendor());
        assert_eq!(urn.to_string(), s);
    }

    #[test]
    fn round_trips_vendor_service_type() {
        let s = "urn:example-com:service:Widget:2";
        let urn: Urn = s.parse().unwrap();
        assert!(urn.is_vendor());
        assert_eq!(urn.kind(), Kind::Service);
        assert_eq!(urn.to_string(), s);
    }

    #[test]
    fn equality_and_hash_on_canonical_form() {
        use std::collections::HashSet;
        let a: Urn = "urn:schemas-upnp-org:device:Basic:1".parse().unwrap();
        let b: Urn = "urn:schemas-upnp-org:device:Basic:1".parse().unwrap();
        assert_eq!(a, b);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn rejects_malformed_urn() {
        assert!("falsy_urn".parse::<Urn>().is_err());
        assert!("urn:schemas-upnp-org:widget:Basic:1".parse::<Urn>().is_err());
    }
}
