//! The unit of discovery: a [`Device`], identified by whichever source found it.

use crate::{event::ScanEvent, registry::Publisher};
use std::{
	collections::HashMap,
	fmt,
	net::{IpAddr, Ipv6Addr},
	sync::{Arc, OnceLock, RwLock},
	time::Instant,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceSource {
	Sweep,
	Mdns,
	Ssdp,
}
impl fmt::Display for DeviceSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			DeviceSource::Sweep => "subnet sweep",
			DeviceSource::Mdns => "mDNS",
			DeviceSource::Ssdp => "SSDP",
		})
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// What makes a device distinct from every other device found by the same source.
pub enum DeviceIdentity {
	/// A DNS-SD service instance.
	Service { name: String, domain: String, service_type: String },

	/// An SSDP responder, keyed by its USN (or its location URL when the reply had no USN).
	Upnp { usn: String },

	/// A host that answered the subnet sweep.
	Host { addr: IpAddr },
}
impl DeviceIdentity {
	pub fn source(&self) -> DeviceSource {
		match self {
			DeviceIdentity::Service { .. } => DeviceSource::Mdns,
			DeviceIdentity::Upnp { .. } => DeviceSource::Ssdp,
			DeviceIdentity::Host { .. } => DeviceSource::Sweep,
		}
	}
}
impl fmt::Display for DeviceIdentity {
	/// The raw source identity: the service instance name, the USN, or the address.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DeviceIdentity::Service { name, .. } => f.write_str(name),
			DeviceIdentity::Upnp { usn } => f.write_str(usn),
			DeviceIdentity::Host { addr } => addr.fmt(f),
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// How a swept host proved it was alive.
pub struct HostActivity {
	/// The first port of the sweep's port set that accepted a connection.
	pub open_port: Option<u16>,

	/// Whether the host answered an ICMP echo.
	pub echo: bool,
}
impl HostActivity {
	#[inline]
	pub fn is_active(&self) -> bool {
		self.open_port.is_some() || self.echo
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Names one resolved field in a [`ScanEvent::DeviceUpdated`].
pub enum DeviceField {
	Address,
	Port,
	FriendlyName,
	Model,
	Metadata,
	Server,
	Vendor,
	HardwareAddr,
	LinkLocal,
	Activity,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Everything about a device that is learned after it was first seen.
pub struct ResolvedFields {
	pub address: Option<IpAddr>,
	pub port: Option<u16>,
	pub friendly_name: Option<String>,
	pub model: Option<String>,
	pub metadata: HashMap<String, String>,
	pub server: Option<String>,
	pub vendor: Option<String>,
	pub hardware_addr: Option<String>,
	pub link_local: Option<Ipv6Addr>,
	pub activity: Option<HostActivity>,
}

/// A discovered device.
///
/// Devices are owned by the [`DeviceRegistry`](crate::DeviceRegistry) and handed out as `Arc<Device>`. The identity never
/// changes; the resolved fields are filled in as resolution steps complete, and every change is published to the
/// registry's observers as a [`ScanEvent::DeviceUpdated`].
pub struct Device {
	identity: DeviceIdentity,
	discovered_at: Instant,
	fields: RwLock<ResolvedFields>,
	publisher: OnceLock<Publisher>,
}
impl Device {
	pub fn new(identity: DeviceIdentity) -> Self {
		Self {
			identity,
			discovered_at: Instant::now(),
			fields: RwLock::new(ResolvedFields::default()),
			publisher: OnceLock::new(),
		}
	}

	pub fn service(name: impl Into<String>, domain: impl Into<String>, service_type: impl Into<String>) -> Self {
		Self::new(DeviceIdentity::Service {
			name: name.into(),
			domain: domain.into(),
			service_type: service_type.into(),
		})
	}

	pub fn upnp(usn: impl Into<String>) -> Self {
		Self::new(DeviceIdentity::Upnp { usn: usn.into() })
	}

	pub fn host(addr: IpAddr) -> Self {
		Self::new(DeviceIdentity::Host { addr })
	}

	/// Fills in fields before the device is handed to the registry, so observers see them with the very first event.
	pub fn with_fields(mut self, fill: impl FnOnce(&mut ResolvedFields)) -> Self {
		fill(self.fields.get_mut().unwrap());
		self
	}

	#[inline(always)]
	pub fn identity(&self) -> &DeviceIdentity {
		&self.identity
	}

	#[inline(always)]
	pub fn source(&self) -> DeviceSource {
		self.identity.source()
	}

	#[inline(always)]
	pub fn discovered_at(&self) -> Instant {
		self.discovered_at
	}

	/// The friendly name if one was resolved, the raw source identity otherwise.
	pub fn display_name(&self) -> String {
		self.fields
			.read()
			.unwrap()
			.friendly_name
			.clone()
			.unwrap_or_else(|| self.identity.to_string())
	}

	/// A copy of every resolved field.
	pub fn snapshot(&self) -> ResolvedFields {
		self.fields.read().unwrap().clone()
	}

	pub fn address(&self) -> Option<IpAddr> {
		self.fields.read().unwrap().address
	}

	pub fn port(&self) -> Option<u16> {
		self.fields.read().unwrap().port
	}

	pub fn friendly_name(&self) -> Option<String> {
		self.fields.read().unwrap().friendly_name.clone()
	}

	pub fn model(&self) -> Option<String> {
		self.fields.read().unwrap().model.clone()
	}

	pub fn metadata(&self) -> HashMap<String, String> {
		self.fields.read().unwrap().metadata.clone()
	}

	pub fn metadata_value(&self, key: &str) -> Option<String> {
		self.fields.read().unwrap().metadata.get(key).cloned()
	}

	pub fn server(&self) -> Option<String> {
		self.fields.read().unwrap().server.clone()
	}

	pub fn vendor(&self) -> Option<String> {
		self.fields.read().unwrap().vendor.clone()
	}

	pub fn hardware_addr(&self) -> Option<String> {
		self.fields.read().unwrap().hardware_addr.clone()
	}

	pub fn link_local(&self) -> Option<Ipv6Addr> {
		self.fields.read().unwrap().link_local
	}

	pub fn activity(&self) -> Option<HostActivity> {
		self.fields.read().unwrap().activity
	}

	pub fn set_address(self: &Arc<Self>, address: IpAddr) {
		self.update(DeviceField::Address, |fields| replace_if_changed(&mut fields.address, address));
	}

	pub fn set_port(self: &Arc<Self>, port: u16) {
		self.update(DeviceField::Port, |fields| replace_if_changed(&mut fields.port, port));
	}

	pub fn set_friendly_name(self: &Arc<Self>, friendly_name: impl Into<String>) {
		let friendly_name = friendly_name.into();
		self.update(DeviceField::FriendlyName, |fields| replace_if_changed(&mut fields.friendly_name, friendly_name));
	}

	pub fn set_model(self: &Arc<Self>, model: impl Into<String>) {
		let model = model.into();
		self.update(DeviceField::Model, |fields| replace_if_changed(&mut fields.model, model));
	}

	/// Replaces the whole metadata map.
	pub fn set_metadata(self: &Arc<Self>, metadata: HashMap<String, String>) {
		self.update(DeviceField::Metadata, |fields| {
			if fields.metadata == metadata {
				return false;
			}
			fields.metadata = metadata;
			true
		});
	}

	pub fn insert_metadata(self: &Arc<Self>, key: impl Into<String>, value: impl Into<String>) {
		let (key, value) = (key.into(), value.into());
		self.update(DeviceField::Metadata, |fields| fields.metadata.insert(key, value.clone()).as_ref() != Some(&value));
	}

	pub fn set_server(self: &Arc<Self>, server: impl Into<String>) {
		let server = server.into();
		self.update(DeviceField::Server, |fields| replace_if_changed(&mut fields.server, server));
	}

	pub fn set_vendor(self: &Arc<Self>, vendor: impl Into<String>) {
		let vendor = vendor.into();
		self.update(DeviceField::Vendor, |fields| replace_if_changed(&mut fields.vendor, vendor));
	}

	pub fn set_hardware_addr(self: &Arc<Self>, hardware_addr: impl Into<String>) {
		let hardware_addr = hardware_addr.into();
		self.update(DeviceField::HardwareAddr, |fields| replace_if_changed(&mut fields.hardware_addr, hardware_addr));
	}

	pub fn set_link_local(self: &Arc<Self>, link_local: Ipv6Addr) {
		self.update(DeviceField::LinkLocal, |fields| replace_if_changed(&mut fields.link_local, link_local));
	}

	pub fn set_activity(self: &Arc<Self>, activity: HostActivity) {
		self.update(DeviceField::Activity, |fields| replace_if_changed(&mut fields.activity, activity));
	}

	pub(crate) fn attach(&self, publisher: Publisher) {
		self.publisher.set(publisher).ok();
	}

	fn update(self: &Arc<Self>, field: DeviceField, apply: impl FnOnce(&mut ResolvedFields) -> bool) {
		let changed = apply(&mut self.fields.write().unwrap());
		if !changed {
			return;
		}
		// The lock is released by now, so observers may read the device back.
		if let Some(publisher) = self.publisher.get() {
			publisher.publish(ScanEvent::DeviceUpdated { device: self.clone(), field });
		}
	}
}
impl fmt::Debug for Device {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Device")
			.field("identity", &self.identity)
			.field("fields", &*self.fields.read().unwrap())
			.finish()
	}
}

fn replace_if_changed<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
	if slot.as_ref() == Some(&value) {
		return false;
	}
	*slot = Some(value);
	true
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::Ipv4Addr;

	#[test]
	fn display_name_prefers_friendly_name() {
		let device = Arc::new(Device::service("Printer1", "local", "_ipp._tcp"));
		assert_eq!(device.display_name(), "Printer1");

		device.set_friendly_name("Office Printer");
		assert_eq!(device.display_name(), "Office Printer");

		let host = Device::host(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
		assert_eq!(host.display_name(), "10.0.0.5");
		assert_eq!(host.source(), DeviceSource::Sweep);
	}

	#[test]
	fn fields_given_up_front_are_visible() {
		let device = Device::upnp("uuid:1234").with_fields(|fields| {
			fields.port = Some(8080);
			fields.server = Some("Linux UPnP/1.0".into());
		});
		assert_eq!(device.port(), Some(8080));
		assert_eq!(device.server().as_deref(), Some("Linux UPnP/1.0"));
		assert_eq!(device.address(), None);
	}

	#[test]
	fn metadata_insertions_merge() {
		let device = Arc::new(Device::service("Speaker", "local", "_raop._tcp"));
		device.insert_metadata("md", "AirPort");
		device.insert_metadata("vs", "366.0");
		device.insert_metadata("md", "AirPort Express");
		assert_eq!(device.metadata().len(), 2);
		assert_eq!(device.metadata_value("md").as_deref(), Some("AirPort Express"));
	}
}
