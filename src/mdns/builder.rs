use super::MdnsBackend;
use crate::net::TargetInterface;
use std::time::Duration;

pub struct MdnsBuilder {
	loopback: bool,
	interface: TargetInterface,
	browse_interval: Duration,
}
impl MdnsBuilder {
	pub fn new() -> Self {
		Self {
			loopback: false,
			interface: TargetInterface::All,
			browse_interval: Duration::from_secs(3),
		}
	}

	/// How often each browsing session repeats its PTR query.
	pub fn browse_interval(mut self, interval: Duration) -> Self {
		self.browse_interval = interval;
		self
	}

	/// Also see queries and answers sent by this machine.
	pub fn loopback(mut self) -> Self {
		self.loopback = true;
		self
	}

	pub fn interface(mut self, interface: TargetInterface) -> Self {
		self.interface = interface;
		self
	}

	pub fn build(self) -> MdnsBackend {
		let MdnsBuilder {
			loopback,
			interface,
			browse_interval,
		} = self;

		MdnsBackend {
			loopback,
			interface,
			browse_interval,
		}
	}
}
impl Default for MdnsBuilder {
	fn default() -> Self {
		Self::new()
	}
}
