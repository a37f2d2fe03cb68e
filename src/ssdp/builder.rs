use super::{search_request, SsdpDiscovery};
use crate::{net::TargetInterface, socket, SSDP_PORT, SSDP_V4_IP};
use std::net::{IpAddr, SocketAddr};

#[derive(Clone, Debug)]
pub struct SsdpBuilder {
	search_target: String,
	mx: u8,
	multicast_ttl: u32,
	loopback: bool,
	interface: TargetInterface,
	destination: SocketAddr,
}
impl SsdpBuilder {
	pub fn new() -> Self {
		Self {
			search_target: "ssdp:all".to_string(),
			mx: 2,
			multicast_ttl: 2,
			loopback: false,
			interface: TargetInterface::Default,
			destination: SocketAddr::new(IpAddr::V4(SSDP_V4_IP), SSDP_PORT),
		}
	}

	/// The `ST` header of the search.
	pub fn search_target(mut self, search_target: impl Into<String>) -> Self {
		self.search_target = search_target.into();
		self
	}

	/// Seconds responders may wait before replying.
	pub fn mx(mut self, mx: u8) -> Self {
		self.mx = mx;
		self
	}

	pub fn multicast_ttl(mut self, ttl: u32) -> Self {
		self.multicast_ttl = ttl;
		self
	}

	pub fn loopback(mut self) -> Self {
		self.loopback = true;
		self
	}

	/// Only [`TargetInterface::Specific`] changes anything; the search goes out on one interface either way.
	pub fn interface(mut self, interface: TargetInterface) -> Self {
		self.interface = interface;
		self
	}

	/// Where the search is sent, the SSDP multicast group by default.
	pub fn destination(mut self, destination: SocketAddr) -> Self {
		self.destination = destination;
		self
	}

	/// Opens the search socket.
	pub fn build(self) -> Result<SsdpDiscovery, std::io::Error> {
		let SsdpBuilder {
			search_target,
			mx,
			multicast_ttl,
			loopback,
			interface,
			destination,
		} = self;

		Ok(SsdpDiscovery {
			socket: socket::multicast_sender(interface.sender_addr(), multicast_ttl, loopback)?,
			request: search_request(&search_target, mx),
			destination,
		})
	}
}
impl Default for SsdpBuilder {
	fn default() -> Self {
		Self::new()
	}
}
