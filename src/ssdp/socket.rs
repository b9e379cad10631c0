/*!
The UDP multicast endpoint used to speak SSDP: binding, group membership, and the retransmission
policy applied to every outbound message.

# Specification

The primary endpoint joins the SSDP multicast group and both sends and receives on it. A
separate ephemeral endpoint (no group join) is used for the duration of an `M-SEARCH` round to
collect unicast responses. Outbound messages are retransmitted `N=5` times back-to-back to
tolerate UDP loss, matching the retransmission policy of reference control-point
implementations.
*/

use crate::error::Error;
use crate::ssdp::message::SsdpMessage;
use crate::syntax::MULTICAST_ADDRESS;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;

/// Number of times an outbound message is retransmitted to counter UDP loss.
pub const RETRANSMIT_COUNT: usize = 5;

/// Default multicast packet TTL.
pub const DEFAULT_TTL: u32 = 4;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// A bound UDP endpoint speaking the SSDP wire format. Construct with
/// [`MulticastEndpoint::bind`] to join the standard multicast group, or
/// [`MulticastEndpoint::ephemeral`] for a search-only, non-group-joined socket.
///
#[derive(Debug)]
pub struct MulticastEndpoint {
    socket: UdpSocket,
    multicast_addr: SocketAddr,
}

impl MulticastEndpoint {
    /// Bind the primary multicast endpoint: joins the SSDP group on all interfaces, sets the
    /// packet TTL, and enables address/port reuse so multiple control points can coexist on one
    /// host.
    pub fn bind(ttl: u32) -> Result<Self, Error> {
        let multicast_addr: SocketAddr = MULTICAST_ADDRESS.parse().unwrap();
        let multicast_v4 = match multicast_addr {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => unreachable!("MULTICAST_ADDRESS is always IPv4"),
        };

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.set_multicast_ttl_v4(ttl)?;
        socket.set_nonblocking(true)?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, multicast_v4.port());
        socket.bind(&bind_addr.into())?;
        socket.join_multicast_v4(multicast_v4.ip(), &Ipv4Addr::UNSPECIFIED)?;

        let socket = UdpSocket::from_std(socket.into())?;
        info!("MulticastEndpoint::bind - joined {}", multicast_addr);
        Ok(MulticastEndpoint {
            socket,
            multicast_addr,
        })
    }

    /// Bind an ephemeral, non-group-joined endpoint used only to issue an `M-SEARCH` and collect
    /// unicast responses for the duration of one search round.
    pub fn ephemeral(ttl: u32) -> Result<Self, Error> {
        let multicast_addr: SocketAddr = MULTICAST_ADDRESS.parse().unwrap();
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_multicast_ttl_v4(ttl)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())?;
        let socket = UdpSocket::from_std(socket.into())?;
        trace!(
            "MulticastEndpoint::ephemeral - bound to {:?}",
            socket.local_addr()
        );
        Ok(MulticastEndpoint {
            socket,
            multicast_addr,
        })
    }

    /// Send a message to the standard multicast group, retransmitting it
    /// [`RETRANSMIT_COUNT`] times to counter UDP loss.
    pub async fn send_multicast(&self, message: &SsdpMessage) -> Result<(), Error> {
        self.send_to(message, self.multicast_addr).await
    }

    /// Send a message to a specific address (used for unicast search and search responses),
    /// applying the same retransmission policy.
    pub async fn send_to(&self, message: &SsdpMessage, addr: SocketAddr) -> Result<(), Error> {
        let wire = message.to_wire_string();
        for attempt in 0..RETRANSMIT_COUNT {
            trace!(
                "MulticastEndpoint::send_to - attempt {}/{} to {}",
                attempt + 1,
                RETRANSMIT_COUNT,
                addr
            );
            self.socket.send_to(wire.as_bytes(), addr).await?;
        }
        Ok(())
    }

    /// Receive the next datagram, parsing it as an [`SsdpMessage`]. Malformed payloads are
    /// dropped and logged rather than returned as an error, per the crate's tolerant-ingress
    /// policy; callers should loop calling this method.
    pub async fn recv(&self) -> Result<(SsdpMessage, SocketAddr), Error> {
        let mut buf = [0u8; 4096];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            let text = match std::str::from_utf8(&buf[..len]) {
                Ok(t) => t,
                Err(e) => {
                    warn!("MulticastEndpoint::recv - non-utf8 datagram from {}: {}", from, e);
                    continue;
                }
            };
            match SsdpMessage::parse(text) {
                Ok(message) => return Ok((message, from)),
                Err(e) => {
                    warn!("MulticastEndpoint::recv - dropping malformed datagram from {}: {}", from, e);
                    continue;
                }
            }
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
