use super::{ScanConfig, Scanner};
use crate::{
	catalog::{self, ServiceType},
	device::DeviceSource,
	event::{EventHandler, ScanEvent},
	mdns::{Backend, MdnsBackend, MdnsBuilder},
	net::LocalSubnet,
	probe::{NetProber, Prober},
	registry::DeviceRegistry,
	ssdp::SsdpBuilder,
	sweep::SweepBuilder,
	vendor::ManufacturerLookup,
};
use std::{collections::BTreeSet, sync::Arc, time::Duration};

/// Configures a [`Scanner`].
///
/// `P` is the prober behind the subnet sweep and `B` the multicast DNS backend; both default to the real network.
pub struct ScanBuilder<P = NetProber, B = MdnsBackend> {
	duration: Duration,
	strict: bool,
	subnet: Option<LocalSubnet>,
	vendors: Option<Arc<dyn ManufacturerLookup>>,
	handler: Option<EventHandler>,
	sweep: SweepBuilder,
	prober: Arc<P>,
	backend: Arc<B>,
	service_types: Vec<ServiceType>,
	resolve_timeout: Duration,
	ssdp: SsdpBuilder,
	disabled: BTreeSet<DeviceSource>,
}
impl ScanBuilder {
	pub fn new() -> Self {
		Self {
			duration: Duration::from_secs(30),
			strict: false,
			subnet: None,
			vendors: None,
			handler: None,
			sweep: SweepBuilder::new(),
			prober: Arc::new(NetProber),
			backend: Arc::new(MdnsBuilder::new().build()),
			service_types: catalog::catalog(),
			resolve_timeout: Duration::from_secs(5),
			ssdp: SsdpBuilder::new(),
			disabled: BTreeSet::new(),
		}
	}
}
impl Default for ScanBuilder {
	fn default() -> Self {
		Self::new()
	}
}
impl<P: Prober, B: Backend> ScanBuilder<P, B> {
	/// How long [`Scanner::start`] scans for.
	pub fn duration(mut self, duration: Duration) -> Self {
		self.duration = duration;
		self
	}

	/// End the whole scan as soon as any discovery source fails, instead of carrying on without it.
	pub fn strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}

	/// Sweep this subnet instead of detecting it from the network interfaces.
	pub fn subnet(mut self, subnet: LocalSubnet) -> Self {
		self.subnet = Some(subnet);
		self
	}

	pub fn vendors(mut self, vendors: impl ManufacturerLookup + 'static) -> Self {
		self.vendors = Some(Arc::new(vendors));
		self
	}

	/// Observes every [`ScanEvent`] of every scan.
	pub fn on_event<F>(mut self, handler: F) -> Self
	where
		F: Fn(ScanEvent) + Send + Sync + 'static,
	{
		self.handler = Some(Arc::new(handler));
		self
	}

	pub fn sweep(mut self, sweep: SweepBuilder) -> Self {
		self.sweep = sweep;
		self
	}

	/// Replaces the service types browsed over multicast DNS (the whole [catalog](crate::catalog) by default).
	pub fn service_types(mut self, service_types: impl IntoIterator<Item = ServiceType>) -> Self {
		self.service_types = service_types.into_iter().collect();
		self
	}

	/// Bound on each of the two resolution steps of a service instance.
	pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
		self.resolve_timeout = timeout;
		self
	}

	pub fn ssdp(mut self, ssdp: SsdpBuilder) -> Self {
		self.ssdp = ssdp;
		self
	}

	/// Leaves a discovery source out of every scan.
	pub fn disable_source(mut self, source: DeviceSource) -> Self {
		self.disabled.insert(source);
		self
	}

	/// Probes the subnet sweep's hosts with `prober`.
	pub fn prober<Q: Prober>(self, prober: Q) -> ScanBuilder<Q, B> {
		let ScanBuilder {
			duration,
			strict,
			subnet,
			vendors,
			handler,
			sweep,
			prober: _,
			backend,
			service_types,
			resolve_timeout,
			ssdp,
			disabled,
		} = self;

		ScanBuilder {
			duration,
			strict,
			subnet,
			vendors,
			handler,
			sweep,
			prober: Arc::new(prober),
			backend,
			service_types,
			resolve_timeout,
			ssdp,
			disabled,
		}
	}

	/// Browses and resolves services through `backend`, e.g. an [`MdnsBackend`] built with non-default options.
	pub fn mdns_backend<C: Backend>(self, backend: C) -> ScanBuilder<P, C> {
		let ScanBuilder {
			duration,
			strict,
			subnet,
			vendors,
			handler,
			sweep,
			prober,
			backend: _,
			service_types,
			resolve_timeout,
			ssdp,
			disabled,
		} = self;

		ScanBuilder {
			duration,
			strict,
			subnet,
			vendors,
			handler,
			sweep,
			prober,
			backend: Arc::new(backend),
			service_types,
			resolve_timeout,
			ssdp,
			disabled,
		}
	}

	pub fn build(self) -> Scanner<P, B> {
		let ScanBuilder {
			duration,
			strict,
			subnet,
			vendors,
			handler,
			sweep,
			prober,
			backend,
			service_types,
			resolve_timeout,
			ssdp,
			disabled,
		} = self;

		Scanner::new(
			Arc::new(DeviceRegistry::with_event_handler(handler)),
			ScanConfig {
				duration,
				strict,
				subnet,
				vendors,
				sweep,
				prober,
				backend,
				service_types,
				resolve_timeout,
				ssdp,
				disabled,
			},
		)
	}
}
