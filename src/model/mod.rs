/*!
The live UPnP data model: devices, services, actions and their arguments, and state variables.

Everything here is constructed from [`description`](crate::description) documents by the
[registry](crate::registry); this module never reaches for the network itself, and never depends
on [`gena`](crate::gena) — state variable updates flow in through [`StateVariable::set_value`],
not the other way around.
*/

pub mod action;
pub mod device;
pub mod service;
pub mod state_variable;

pub use action::{Action, Argument, Direction};
pub use device::{Device, DeviceEvent, DeviceState};
pub use service::{Service, ServiceEvent, ServiceState};
pub use state_variable::StateVariable;
