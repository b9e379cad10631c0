/*!
# UPnP Device Architecture 1.0 - Description

After discovery, a control point knows only a device's location URL. This module fetches and
parses the XML documents at that location: the root device description (this module's
[`device`] submodule) and, for each service it references, the SCPD document describing that
service's actions and state variables ([`scpd`]).

Fetching is performed by [`loader`], which the device [registry](crate::registry) uses to turn a
location URL into a fully populated description tree before constructing live
[`model`](crate::model) entities.
*/

pub mod device;

pub mod loader;

pub mod scpd;

pub use device::DeviceDescription;
pub use loader::{fetch_description, fetch_scpd, DescriptionFetchOptions};
pub use scpd::ScpdDescription;
