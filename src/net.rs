//! Local interface detection and the /24 that the subnet sweep walks.

use crate::errors::SubnetError;
use std::{
	fmt,
	net::{IpAddr, Ipv4Addr},
	ops::RangeInclusive,
};

/// The [`if_addrs`](https://crates.io/crates/if_addrs) crate is used to discover network interfaces on the system.
///
/// Here is a re-export for your convenience.
pub use if_addrs;

/// Host octets a /24 can hand out (`.0` is the network and `.255` the broadcast address).
pub const HOST_OCTETS: RangeInclusive<u8> = 1..=254;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
/// The interface to use for multicast.
pub enum TargetInterface {
	/// Let the OS decide which interface to use.
	#[default]
	Default,

	/// Join on every non-loopback IPv4 interface, falling back to `Default` if none accept.
	All,

	/// Use the interface with the given address.
	Specific(Ipv4Addr),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// The /24 this machine lives in, anchored on its own interface address.
///
/// The own address is part of the range but is never probed or reported.
pub struct LocalSubnet {
	addr: Ipv4Addr,
}
impl LocalSubnet {
	/// Anchors a subnet on the given interface address.
	pub fn new(addr: Ipv4Addr) -> Result<Self, SubnetError> {
		let [.., host] = addr.octets();
		if addr.is_unspecified() || addr.is_loopback() || addr.is_multicast() || addr.is_broadcast() || !HOST_OCTETS.contains(&host) {
			return Err(SubnetError::UnusableAddress(addr));
		}
		Ok(Self { addr })
	}

	/// Detects the local subnet from the system's network interfaces.
	///
	/// Private (RFC 1918) addresses win over anything else, link-local and loopback addresses are never picked.
	pub fn detect() -> Result<Self, SubnetError> {
		let ifaces = if_addrs::get_if_addrs()?;
		let addr = pick_local_ipv4(ifaces.iter().filter(|iface| !iface.is_loopback()).filter_map(|iface| match iface.ip() {
			IpAddr::V4(addr) => Some(addr),
			IpAddr::V6(_) => None,
		}))
		.ok_or(SubnetError::NoIpv4Interface)?;

		log::debug!("Using local address {addr} for the subnet sweep");
		Self::new(addr)
	}

	#[inline(always)]
	/// This machine's own address.
	pub fn local_addr(&self) -> Ipv4Addr {
		self.addr
	}

	/// The textual /24 prefix, e.g. `"10.0.0."` for `10.0.0.9`.
	pub fn prefix(&self) -> String {
		let [a, b, c, _] = self.addr.octets();
		format!("{a}.{b}.{c}.")
	}

	#[inline]
	/// The address with the given host octet inside this subnet.
	pub fn host(&self, octet: u8) -> Ipv4Addr {
		let [a, b, c, _] = self.addr.octets();
		Ipv4Addr::new(a, b, c, octet)
	}

	#[inline]
	pub fn contains(&self, addr: Ipv4Addr) -> bool {
		addr.octets()[..3] == self.addr.octets()[..3]
	}

	/// Every address of `octets` inside this subnet, minus this machine's own address.
	pub fn hosts(&self, octets: RangeInclusive<u8>) -> impl Iterator<Item = Ipv4Addr> + '_ {
		let own = self.addr;
		octets
			.filter(|octet| HOST_OCTETS.contains(octet))
			.map(move |octet| self.host(octet))
			.filter(move |addr| *addr != own)
	}
}
impl fmt::Display for LocalSubnet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}0/24", self.prefix())
	}
}

fn pick_local_ipv4(candidates: impl Iterator<Item = Ipv4Addr>) -> Option<Ipv4Addr> {
	let mut fallback = None;
	for addr in candidates {
		if addr.is_loopback() || addr.is_link_local() || addr.is_unspecified() {
			continue;
		}
		if addr.is_private() {
			return Some(addr);
		}
		fallback.get_or_insert(addr);
	}
	fallback
}
