//! DNS-SD browsing and resolution over multicast DNS.
//!
//! One browsing session is opened per [catalog](crate::catalog) entry. Every instance a session reports is inserted into
//! the registry straight away, then resolved in the background: first through the backend's full SRV/TXT/address
//! resolution, and if that produced no usable address, through a plain host address query seeded with whatever the
//! first step learned.
//!
//! The network side is abstracted behind [`Backend`], so the discovery logic can be driven by a synthetic backend.
//! [`MdnsBackend`] is the real one.

use crate::{
	catalog::ServiceType,
	device::DeviceIdentity,
	errors::{BadDnsNameError, ResolveError},
	util::dns_name_from_labels,
};
use std::{fmt, future::Future, net::IpAddr, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle};
use trust_dns_client::rr::Name as DnsName;

mod backend;
pub use backend::MdnsBackend;
#[cfg(test)]
pub(crate) use backend::query_packet;

mod builder;
pub use builder::MdnsBuilder;

mod discovery;
pub use discovery::MdnsDiscovery;

mod txt;
pub use txt::TxtMetadata;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// One advertised instance of a service type, e.g. `Printer1` of `_ipp._tcp.local`.
pub struct ServiceInstance {
	pub name: String,
	pub service_type: ServiceType,
}
impl ServiceInstance {
	pub fn new(name: impl Into<String>, service_type: ServiceType) -> Self {
		Self {
			name: name.into(),
			service_type,
		}
	}

	/// Extracts the instance from a PTR answer's target, which must be exactly one label below the browsed name.
	pub fn from_ptr(target: &DnsName, service_type: &ServiceType) -> Option<Self> {
		let browsed = service_type.dns_name().ok()?;
		if target.num_labels() != browsed.num_labels() + 1 || !browsed.zone_of(target) {
			return None;
		}

		let label = target.iter().next()?;
		if label.is_empty() {
			return None;
		}

		Some(Self::new(String::from_utf8_lossy(label), service_type.clone()))
	}

	/// `Printer1._ipp._tcp.local.`, built label by label so any instance name is representable.
	pub fn fqdn(&self) -> Result<DnsName, BadDnsNameError> {
		dns_name_from_labels(
			std::iter::once(self.name.as_str())
				.chain(self.service_type.service().split('.'))
				.chain(self.service_type.domain().split('.')),
		)
		.map_err(|_| BadDnsNameError)
	}

	/// The registry identity of this instance: its `(name, domain, service type)` triple.
	pub fn identity(&self) -> DeviceIdentity {
		DeviceIdentity::Service {
			name: self.name.clone(),
			domain: self.service_type.domain().to_string(),
			service_type: self.service_type.service().to_string(),
		}
	}
}
impl fmt::Display for ServiceInstance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.name, self.service_type)
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowseEvent {
	Added(ServiceInstance),
	Removed(ServiceInstance),
}

/// A running browse for one service type.
///
/// Events arrive in the order the network reported them. A transport error is delivered as the last event. Dropping the
/// session stops the browse and closes its socket.
pub struct BrowseSession {
	events: mpsc::Receiver<Result<BrowseEvent, std::io::Error>>,
	worker: Option<JoinHandle<()>>,
}
impl BrowseSession {
	/// A session fed by an arbitrary producer. The session ends when every sender is dropped.
	pub fn new(events: mpsc::Receiver<Result<BrowseEvent, std::io::Error>>) -> Self {
		Self { events, worker: None }
	}

	pub(crate) fn with_worker(events: mpsc::Receiver<Result<BrowseEvent, std::io::Error>>, worker: JoinHandle<()>) -> Self {
		Self {
			events,
			worker: Some(worker),
		}
	}

	/// The next event, or `None` once the session is over.
	pub async fn next(&mut self) -> Option<Result<BrowseEvent, std::io::Error>> {
		self.events.recv().await
	}
}
impl Drop for BrowseSession {
	fn drop(&mut self) {
		if let Some(worker) = self.worker.take() {
			worker.abort();
		}
	}
}

#[derive(Clone, Debug, Default)]
/// What the full resolution of an instance turned up.
pub struct Resolution {
	/// The SRV target.
	pub host: Option<DnsName>,
	pub port: Option<u16>,
	pub addresses: Vec<IpAddr>,
	pub txt: TxtMetadata,
}
impl Resolution {
	/// See [`preferred_address`].
	pub fn preferred_address(&self) -> Option<IpAddr> {
		preferred_address(&self.addresses)
	}
}

#[derive(Clone, Debug)]
/// Everything the host address fallback needs, handed over explicitly by the step that failed.
pub struct ResolveContext {
	pub instance: ServiceInstance,

	/// The SRV target, if the full resolution got that far.
	pub host: Option<DnsName>,
	pub port: Option<u16>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostResolution {
	pub address: IpAddr,
	pub port: Option<u16>,
}

/// The network side of service discovery.
pub trait Backend: Send + Sync + 'static {
	/// Starts browsing for `service_type`. Must be called from within a tokio runtime.
	fn browse(&self, service_type: &ServiceType) -> Result<BrowseSession, std::io::Error>;

	/// Resolves an instance through its SRV, TXT and address records.
	fn resolve(&self, instance: &ServiceInstance, timeout: Duration) -> impl Future<Output = Result<Resolution, ResolveError>> + Send;

	/// Looks up only a host address, for when [`Backend::resolve`] produced none.
	fn resolve_host(&self, context: &ResolveContext, timeout: Duration) -> impl Future<Output = Result<HostResolution, ResolveError>> + Send;
}

/// The first usable address: IPv4 wins, then a global IPv6 address, then a link-local one.
pub fn preferred_address(addresses: &[IpAddr]) -> Option<IpAddr> {
	let usable = || addresses.iter().copied().filter(|addr| !addr.is_unspecified() && !addr.is_multicast());

	usable()
		.find(IpAddr::is_ipv4)
		.or_else(|| usable().find(|addr| matches!(addr, IpAddr::V6(v6) if !is_unicast_link_local(v6))))
		.or_else(|| usable().next())
}

#[inline]
fn is_unicast_link_local(addr: &std::net::Ipv6Addr) -> bool {
	(addr.segments()[0] & 0xffc0) == 0xfe80
}
