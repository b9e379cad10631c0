/*!
# UPnP Device Architecture 1.0 - Discovery

Simple Service Discovery Protocol (SSDP) is how UPnP devices advertise themselves and how
control points search for devices of interest, all over a well-known IPv4 multicast group.

When a device joins the network it multicasts `NOTIFY` advertisements for itself, its embedded
devices, and its services; any control point listening on the multicast group observes these.
When a control point wants to find devices it multicasts an `M-SEARCH` request and collects
unicast responses for a bounded window. In both cases the message only carries enough
information to locate a device's XML description (see the [`description`](crate::description)
module) — not the description itself.

To limit network congestion the IP TTL of each multicast packet defaults to 4 and is
configurable. Because UDP delivery is unreliable, every outbound discovery message is
retransmitted several times.
*/

pub mod message;

pub mod server;

pub mod socket;

pub use message::{SsdpMessage, StartLine, Target};
pub use server::{SsdpEvent, SsdpServer, SsdpServerOptions};
pub use socket::MulticastEndpoint;
