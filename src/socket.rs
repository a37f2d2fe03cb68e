use crate::{net::TargetInterface, MDNS_PORT, MDNS_V4_IP};
use std::{
	collections::BTreeSet,
	net::{IpAddr, Ipv4Addr, SocketAddr},
};
use tokio::net::UdpSocket as AsyncUdpSocket;

/// Receive buffer size for every discovery socket. mDNS packets may be as large as a jumbo frame.
pub(crate) const RECV_BUFFER_SIZE: usize = 9000;

/// A socket bound to the mDNS port and joined to the mDNS group, so it sees every multicast answer on the link.
///
/// Several of these may coexist (one per browsing session), which is why address and port reuse are enabled.
pub(crate) fn mdns_listener(loopback: bool, interface: &TargetInterface) -> Result<std::net::UdpSocket, std::io::Error> {
	let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))?;
	socket.set_reuse_address(true)?;
	socket.set_multicast_loop_v4(loopback)?;

	#[cfg(unix)]
	{
		socket.set_reuse_port(true)?;
	}

	match interface {
		TargetInterface::Default => {
			socket.join_multicast_v4(&MDNS_V4_IP, &Ipv4Addr::UNSPECIFIED)?;
		}

		TargetInterface::Specific(iface) => {
			socket.join_multicast_v4(&MDNS_V4_IP, iface)?;
			socket.set_multicast_if_v4(iface)?;
		}

		TargetInterface::All => {
			let mut did_join = false;
			for iface in if_addrs::get_if_addrs()
				.map(|ifaces| {
					ifaces
						.into_iter()
						.filter(|iface| !iface.is_loopback())
						.filter_map(|iface| if let IpAddr::V4(iface) = iface.ip() { Some(iface) } else { None })
						.collect::<BTreeSet<Ipv4Addr>>()
				})
				.unwrap_or_default()
			{
				if socket.join_multicast_v4(&MDNS_V4_IP, &iface).is_ok() {
					did_join = true;
				}
			}
			if !did_join {
				// Fallback to default
				socket.join_multicast_v4(&MDNS_V4_IP, &Ipv4Addr::UNSPECIFIED)?;
			}
		}
	}

	// Binding to a unicast interface address would filter out the multicast traffic we joined for.
	socket.bind(&socket2::SockAddr::from(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), MDNS_PORT)))?;
	socket.set_nonblocking(true)?;

	Ok(socket.into())
}

/// A socket on an ephemeral port that sends to a multicast group and receives the unicast replies.
///
/// Used for one-shot mDNS queries (answered as legacy unicast) and for the SSDP search.
pub(crate) fn multicast_sender(interface: Option<Ipv4Addr>, multicast_ttl: u32, loopback: bool) -> Result<std::net::UdpSocket, std::io::Error> {
	let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))?;
	socket.set_multicast_ttl_v4(multicast_ttl)?;
	socket.set_multicast_loop_v4(loopback)?;

	if let Some(iface) = interface {
		socket.set_multicast_if_v4(&iface)?;
	}

	socket.bind(&socket2::SockAddr::from(SocketAddr::new(
		IpAddr::V4(interface.unwrap_or(Ipv4Addr::UNSPECIFIED)),
		0,
	)))?;
	socket.set_nonblocking(true)?;

	Ok(socket.into())
}

/// Registers a socket with the current tokio runtime. Must be called from within the runtime.
#[inline]
pub(crate) fn into_async(socket: std::net::UdpSocket) -> Result<AsyncUdpSocket, std::io::Error> {
	AsyncUdpSocket::from_std(socket)
}

impl TargetInterface {
	/// The interface address one-shot senders should use, if any.
	pub(crate) fn sender_addr(&self) -> Option<Ipv4Addr> {
		match self {
			TargetInterface::Specific(addr) => Some(*addr),
			TargetInterface::Default | TargetInterface::All => None,
		}
	}
}
