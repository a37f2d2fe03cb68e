//! The single store of discovered devices.

use crate::{
	device::{Device, DeviceIdentity},
	errors::RegistryError,
	event::{EventHandler, ScanEvent},
};
use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};

#[derive(Clone, Default)]
/// Delivers events to the registry's observer, if it has one.
pub(crate) struct Publisher(Option<EventHandler>);
impl Publisher {
	#[inline]
	pub(crate) fn publish(&self, event: ScanEvent) {
		if let Some(handler) = &self.0 {
			handler(event);
		}
	}
}

#[derive(Default)]
struct RegistryInner {
	devices: Vec<Arc<Device>>,
	index: HashMap<DeviceIdentity, usize>,
}

/// The devices found during the current scan, in the order they were first seen.
///
/// All three discovery sources insert concurrently; identities are compared by value, so the same service, USN or
/// address reported twice still yields a single entry.
#[derive(Default)]
pub struct DeviceRegistry {
	inner: Mutex<RegistryInner>,
	publisher: Publisher,
	scanning: AtomicBool,
}
impl DeviceRegistry {
	/// A registry without an observer.
	pub fn new() -> Self {
		Self::default()
	}

	/// A registry whose insertions and device updates are published to `handler`.
	pub fn with_handler<F>(handler: F) -> Self
	where
		F: Fn(ScanEvent) + Send + Sync + 'static,
	{
		Self::with_event_handler(Some(Arc::new(handler)))
	}

	pub(crate) fn with_event_handler(handler: Option<EventHandler>) -> Self {
		Self {
			publisher: Publisher(handler),
			..Default::default()
		}
	}

	/// Adds `candidate` unless a device with the same identity is already known.
	///
	/// Returns the stored device if it was inserted, `None` if it was a duplicate. Duplicates are dropped as is; fields of
	/// known devices are updated through the device's own setters instead.
	pub fn insert_or_ignore(&self, candidate: Device) -> Option<Arc<Device>> {
		let device = {
			let mut inner = self.inner.lock().unwrap();
			if inner.index.contains_key(candidate.identity()) {
				log::trace!("Ignoring duplicate {} device {}", candidate.source(), candidate.identity());
				return None;
			}

			let device = Arc::new(candidate);
			device.attach(self.publisher.clone());

			let position = inner.devices.len();
			inner.index.insert(device.identity().clone(), position);
			inner.devices.push(device.clone());
			device
		};

		log::debug!("Discovered {} via {}", device.display_name(), device.source());
		self.publisher.publish(ScanEvent::DeviceAdded(device.clone()));

		Some(device)
	}

	pub fn get(&self, identity: &DeviceIdentity) -> Option<Arc<Device>> {
		let inner = self.inner.lock().unwrap();
		inner.index.get(identity).map(|&position| inner.devices[position].clone())
	}

	/// A snapshot of every device, in insertion order.
	pub fn devices(&self) -> Vec<Arc<Device>> {
		self.inner.lock().unwrap().devices.clone()
	}

	pub fn len(&self) -> usize {
		self.inner.lock().unwrap().devices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Forgets every device. Refused while a scan is in progress.
	pub fn clear(&self) -> Result<(), RegistryError> {
		let mut inner = self.inner.lock().unwrap();
		if self.is_scanning() {
			return Err(RegistryError::ScanInProgress);
		}
		*inner = RegistryInner::default();
		Ok(())
	}

	#[inline]
	pub fn is_scanning(&self) -> bool {
		self.scanning.load(Ordering::Acquire)
	}

	/// Clears the registry and marks a scan as running. Returns `false` if one already was.
	pub(crate) fn begin_scan(&self) -> bool {
		let mut inner = self.inner.lock().unwrap();
		if self.scanning.swap(true, Ordering::AcqRel) {
			return false;
		}
		*inner = RegistryInner::default();
		true
	}

	/// Marks the scan as over and publishes [`ScanEvent::ScanFinished`]; only the first call per scan does anything.
	pub(crate) fn finish_scan(&self, elapsed: Duration) -> bool {
		if !self.scanning.swap(false, Ordering::AcqRel) {
			return false;
		}
		log::info!("Scan finished after {:.1}s with {} devices", elapsed.as_secs_f64(), self.len());
		self.publisher.publish(ScanEvent::ScanFinished { elapsed });
		true
	}

	/// Drops the scanning mark of a scan that never got to run; nothing is published.
	pub(crate) fn abandon_scan(&self) {
		self.scanning.store(false, Ordering::Release);
	}

	#[inline]
	pub(crate) fn publish(&self, event: ScanEvent) {
		self.publisher.publish(event);
	}
}
