/*!
An asynchronous UPnP control-point runtime.

This crate implements the control-point side of the UPnP Device Architecture: SSDP discovery,
XML device/service description, SOAP action invocation, and GENA eventing. It does not implement
any device-side (server) role.

More Information:

* [UPnP Device Architecture 1.0](http://www.upnp.org/specs/arch/UPnP-arch-DeviceArchitecture-v1.0.pdf)
* [General Event Notification Architecture](http://www.upnp.org/specs/arch/gena.pdf)

*/

#![warn(missing_debug_implementations, unused_extern_crates, rust_2018_idioms)]

#[macro_use]
extern crate tracing;

#[macro_use]
extern crate lazy_static;

// ------------------------------------------------------------------------------------------------
// Modules
// ------------------------------------------------------------------------------------------------

pub mod error;

pub mod syntax;

pub mod urn;

pub mod usn;

pub mod types;

pub mod event;

pub mod ssdp;

pub mod description;

pub mod model;

pub mod registry;

pub mod soap;

pub mod gena;

pub mod control_point;

// ------------------------------------------------------------------------------------------------
// Public Values
// ------------------------------------------------------------------------------------------------

/// String used as the product token for the UPnP layer of the `SERVER`/`USER-AGENT` headers.
pub const UPNP_STRING: &str = "UPnP";

/// The specification version this runtime claims to speak. Only 1.0/1.1-era wire behavior is
/// implemented; this is reported in generated `SERVER` headers.
pub const UPNP_VERSION: &str = "1.1";

pub use control_point::ControlPoint;
pub use error::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
