use super::{Backend, BrowseEvent, ResolveContext, ServiceInstance};
use crate::{
	catalog::ServiceType,
	device::Device,
	errors::SourceError,
	registry::DeviceRegistry,
	vendor::{parse_composite_name, ManufacturerLookup},
};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinSet;

/// Browses a set of service types and resolves every instance found into the registry.
pub struct MdnsDiscovery<B> {
	backend: Arc<B>,
	service_types: Vec<ServiceType>,
	resolve_timeout: Duration,
	vendors: Option<Arc<dyn ManufacturerLookup>>,
	strict: bool,
}
impl<B: Backend> MdnsDiscovery<B> {
	pub fn new(backend: Arc<B>, service_types: Vec<ServiceType>) -> Self {
		Self {
			backend,
			service_types,
			resolve_timeout: Duration::from_secs(5),
			vendors: None,
			strict: false,
		}
	}

	/// Bound on each of the two resolution steps of an instance.
	pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
		self.resolve_timeout = timeout;
		self
	}

	/// Looks up the vendor of hardware addresses found in instance names.
	pub fn vendors(mut self, vendors: Arc<dyn ManufacturerLookup>) -> Self {
		self.vendors = Some(vendors);
		self
	}

	/// Makes [`run`](Self::run) fail as soon as any browsing session fails, instead of carrying on without it.
	pub fn strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}

	/// Browses every service type until all sessions end, or until the returned future is dropped.
	///
	/// Dropping the future closes every session and cancels every resolution in flight.
	pub async fn run(&self, registry: Arc<DeviceRegistry>) -> Result<(), SourceError> {
		let mut sessions = JoinSet::new();
		for service_type in self.service_types.iter().cloned() {
			sessions.spawn(browse(
				self.backend.clone(),
				service_type,
				registry.clone(),
				self.vendors.clone(),
				self.resolve_timeout,
			));
		}

		while let Some(session) = sessions.join_next().await {
			match session {
				Ok(Ok(())) => {}
				Ok(Err(err)) if self.strict => return Err(err),
				Ok(Err(err)) => log::warn!("{err}"),
				Err(err) => log::warn!("Browsing task failed: {err}"),
			}
		}

		Ok(())
	}
}

async fn browse<B: Backend>(
	backend: Arc<B>,
	service_type: ServiceType,
	registry: Arc<DeviceRegistry>,
	vendors: Option<Arc<dyn ManufacturerLookup>>,
	resolve_timeout: Duration,
) -> Result<(), SourceError> {
	let browse_error = |error: std::io::Error| SourceError::Browse {
		service_type: service_type.to_string(),
		error,
	};

	let mut session = backend.browse(&service_type).map_err(browse_error)?;
	log::trace!("Browsing for {service_type}");

	let mut resolutions = JoinSet::new();
	loop {
		tokio::select! {
			event = session.next() => match event {
				Some(Ok(BrowseEvent::Added(instance))) => {
					let candidate = service_device(&instance, vendors.as_deref());
					if let Some(device) = registry.insert_or_ignore(candidate) {
						resolutions.spawn(resolve(backend.clone(), instance, device, resolve_timeout));
					}
				}

				Some(Ok(BrowseEvent::Removed(instance))) => log::debug!("{instance} is no longer advertised"),

				Some(Err(error)) => return Err(browse_error(error)),

				None => break,
			},

			Some(_) = resolutions.join_next(), if !resolutions.is_empty() => {}
		}
	}

	while resolutions.join_next().await.is_some() {}
	Ok(())
}

/// The registry record for a freshly browsed instance, with whatever its name gives away already filled in.
fn service_device(instance: &ServiceInstance, vendors: Option<&dyn ManufacturerLookup>) -> Device {
	let composite = parse_composite_name(&instance.name);
	let vendor = composite.oui().zip(vendors).and_then(|(oui, vendors)| vendors.vendor(oui));

	Device::new(instance.identity()).with_fields(|fields| {
		fields.hardware_addr = composite.hardware_addr.clone();
		fields.link_local = composite.link_local;
		fields.vendor = vendor;
	})
}

async fn resolve<B: Backend>(backend: Arc<B>, instance: ServiceInstance, device: Arc<Device>, timeout: Duration) {
	let context = match backend.resolve(&instance, timeout).await {
		Ok(resolution) => {
			if let Some(friendly_name) = resolution.txt.friendly_name() {
				device.set_friendly_name(friendly_name);
			}
			if let Some(model) = resolution.txt.model() {
				device.set_model(model);
			}
			if let Some(port) = resolution.port {
				device.set_port(port);
			}

			let address = resolution.preferred_address();
			if !resolution.txt.is_empty() {
				device.set_metadata(resolution.txt.into_map());
			}

			if let Some(address) = address {
				device.set_address(address);
				log::debug!("Resolved {instance} to {address}");
				return;
			}

			ResolveContext {
				instance,
				host: resolution.host,
				port: resolution.port,
			}
		}

		Err(err) => {
			log::debug!("Resolving {instance} failed: {err}");
			ResolveContext {
				instance,
				host: None,
				port: None,
			}
		}
	};

	match backend.resolve_host(&context, timeout).await {
		Ok(resolved) => {
			if let (None, Some(port)) = (device.port(), resolved.port) {
				device.set_port(port);
			}
			device.set_address(resolved.address);
			log::debug!("Resolved {} to {} by host lookup", context.instance, resolved.address);
		}
		Err(err) => log::debug!("{} stays unresolved: {err}", context.instance),
	}
}
