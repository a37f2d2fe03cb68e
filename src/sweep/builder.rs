use super::Sweep;
use crate::{
	net::{LocalSubnet, HOST_OCTETS},
	probe::Prober,
};
use std::{ops::RangeInclusive, sync::Arc, time::Duration};

/// Ports whose answer is enough to call a host alive: web, SSH, SMB/NetBIOS, common appliance and media ports, printing,
/// RTSP and UPnP.
pub const DEFAULT_PORTS: &[u16] = &[80, 443, 22, 445, 139, 8080, 5000, 62078, 7000, 9100, 631, 554, 1900];

#[derive(Clone, Debug)]
pub struct SweepBuilder {
	ports: Vec<u16>,
	batch_size: usize,
	tcp_timeout: Duration,
	icmp_timeout: Duration,
	host_octets: RangeInclusive<u8>,
}
impl SweepBuilder {
	pub fn new() -> Self {
		Self {
			ports: DEFAULT_PORTS.to_vec(),
			batch_size: 10,
			tcp_timeout: Duration::from_millis(1000),
			icmp_timeout: Duration::from_millis(1000),
			host_octets: HOST_OCTETS,
		}
	}

	/// The ports probed on every host. The first one (in this order) that accepts a connection is reported.
	pub fn ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
		self.ports = ports.into_iter().collect();
		self
	}

	/// How many hosts are probed at once. A batch is fully drained before the next one starts.
	pub fn batch_size(mut self, batch_size: usize) -> Self {
		self.batch_size = batch_size.max(1);
		self
	}

	pub fn tcp_timeout(mut self, timeout: Duration) -> Self {
		self.tcp_timeout = timeout;
		self
	}

	pub fn icmp_timeout(mut self, timeout: Duration) -> Self {
		self.icmp_timeout = timeout;
		self
	}

	/// Restricts the sweep to these host octets of the /24 (`1..=254` by default).
	pub fn host_octets(mut self, octets: RangeInclusive<u8>) -> Self {
		self.host_octets = octets;
		self
	}

	pub fn build<P: Prober>(self, subnet: LocalSubnet, prober: Arc<P>) -> Sweep<P> {
		let SweepBuilder {
			ports,
			batch_size,
			tcp_timeout,
			icmp_timeout,
			host_octets,
		} = self;

		Sweep {
			subnet,
			prober,
			ports: ports.into(),
			batch_size,
			tcp_timeout,
			icmp_timeout,
			host_octets,
		}
	}
}
impl Default for SweepBuilder {
	fn default() -> Self {
		Self::new()
	}
}
