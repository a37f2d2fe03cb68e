//! The scan lifecycle.
//!
//! A [`Scanner`] is idle or scanning. Starting a scan clears the registry and runs every enabled source side by side on
//! a dedicated worker thread until the scan window elapses or the scan is stopped. Either way every source is torn
//! down (sockets closed, browsing sessions ended, resolutions cancelled) before the scanner reports itself idle again
//! and publishes [`ScanEvent::ScanFinished`].

use crate::{
	catalog::ServiceType,
	device::{Device, DeviceSource},
	errors::{ScanError, SourceError, SubnetError},
	event::ScanEvent,
	mdns::{Backend, MdnsBackend, MdnsDiscovery},
	net::LocalSubnet,
	probe::{NetProber, Prober},
	registry::DeviceRegistry,
	ssdp::{SsdpBuilder, SsdpDiscovery},
	sweep::{Sweep, SweepBuilder},
	vendor::ManufacturerLookup,
};
use std::{
	collections::BTreeSet,
	sync::{Arc, Mutex},
	time::{Duration, Instant},
};
use tokio::{sync::oneshot, task::JoinSet};

mod builder;
pub use builder::ScanBuilder;

mod handle;
use handle::{Finished, SessionHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
	Started,

	/// A scan was already running; nothing was changed.
	AlreadyScanning,
}

struct ScanConfig<P, B> {
	duration: Duration,
	strict: bool,
	subnet: Option<LocalSubnet>,
	vendors: Option<Arc<dyn ManufacturerLookup>>,
	sweep: SweepBuilder,
	prober: Arc<P>,
	backend: Arc<B>,
	service_types: Vec<ServiceType>,
	resolve_timeout: Duration,
	ssdp: SsdpBuilder,
	disabled: BTreeSet<DeviceSource>,
}

/// Runs device discovery scans. Built with [`ScanBuilder`].
///
/// Dropping the scanner stops the scan in progress, if any, and waits for it to be torn down.
pub struct Scanner<P = NetProber, B = MdnsBackend> {
	registry: Arc<DeviceRegistry>,
	config: ScanConfig<P, B>,
	session: Mutex<Option<SessionHandle>>,
}
impl<P: Prober, B: Backend> Scanner<P, B> {
	fn new(registry: Arc<DeviceRegistry>, config: ScanConfig<P, B>) -> Self {
		Self {
			registry,
			config,
			session: Mutex::new(None),
		}
	}

	/// Starts a scan for the configured duration. See [`start_scan`](Self::start_scan).
	pub fn start(&self) -> Result<StartOutcome, ScanError> {
		self.start_scan(self.config.duration)
	}

	/// Starts a scan that ends by itself after `duration`.
	///
	/// If a scan is already running this does nothing and returns [`StartOutcome::AlreadyScanning`]: the running scan
	/// keeps its deadline and the registry keeps its devices.
	pub fn start_scan(&self, duration: Duration) -> Result<StartOutcome, ScanError> {
		let mut session = self.session.lock().unwrap();

		if self.registry.is_scanning() {
			log::warn!("Ignoring start request, a scan is already in progress");
			return Ok(StartOutcome::AlreadyScanning);
		}

		// The previous session ended on its own; its thread is on its way out.
		if let Some(previous) = session.take() {
			previous.join()?;
		}

		if !self.registry.begin_scan() {
			log::warn!("Ignoring start request, a scan is already in progress");
			return Ok(StartOutcome::AlreadyScanning);
		}

		let prepared = Session::prepare(&self.config, duration);
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let finished = Arc::new(Finished::default());

		let registry = self.registry.clone();
		let started = Instant::now();
		let teardown_finished = finished.clone();

		let thread = std::thread::Builder::new().name("lantern-scan".to_string()).spawn(move || {
			let teardown = Teardown {
				registry: registry.clone(),
				started,
				finished: teardown_finished,
			};

			let runtime = tokio::runtime::Builder::new_current_thread()
				.thread_name("Lantern Scan (Tokio)")
				.enable_all()
				.build()
				.unwrap();

			runtime.block_on(prepared.run(&registry, shutdown_rx));

			// Whatever is still parked on the runtime goes down with it, sockets included.
			drop(runtime);
			drop(teardown);
		});

		match thread {
			Ok(thread) => {
				*session = Some(SessionHandle {
					thread,
					shutdown_tx,
					finished,
				});
				Ok(StartOutcome::Started)
			}

			Err(err) => {
				self.registry.abandon_scan();
				Err(ScanError::SpawnError(err))
			}
		}
	}
}
impl<P, B> Scanner<P, B> {
	/// Ends the scan in progress early and waits until it is torn down. Does nothing if no scan is running.
	pub fn stop(&self) -> Result<(), ScanError> {
		let session = self.session.lock().unwrap().take();
		if let Some(session) = session {
			session.shutdown()?;
		}
		Ok(())
	}

	/// Blocks until the scan in progress ends, by itself or through [`stop`](Self::stop) on another thread.
	pub fn wait(&self) -> Result<(), ScanError> {
		// The handle stays in place while waiting so that `stop` can still reach it.
		let finished = match &*self.session.lock().unwrap() {
			Some(session) => session.finished.clone(),
			None => return Ok(()),
		};
		finished.wait();

		let mut session = self.session.lock().unwrap();
		if session.as_ref().is_some_and(|session| Arc::ptr_eq(&session.finished, &finished)) {
			if let Some(session) = session.take() {
				session.join()?;
			}
		}
		Ok(())
	}

	#[inline]
	pub fn is_scanning(&self) -> bool {
		self.registry.is_scanning()
	}

	/// Every device found by the current (or last) scan, in discovery order.
	pub fn devices(&self) -> Vec<Arc<Device>> {
		self.registry.devices()
	}

	#[inline(always)]
	pub fn registry(&self) -> &Arc<DeviceRegistry> {
		&self.registry
	}
}
impl<P, B> Drop for Scanner<P, B> {
	fn drop(&mut self) {
		if let Err(err) = self.stop() {
			log::warn!("Failed to tear down the scan: {err}");
		}
	}
}

/// Marks the scan as over once the session's runtime is gone, even if the worker thread is unwinding.
struct Teardown {
	registry: Arc<DeviceRegistry>,
	started: Instant,
	finished: Arc<Finished>,
}
impl Drop for Teardown {
	fn drop(&mut self) {
		self.registry.finish_scan(self.started.elapsed());
		self.finished.set();
	}
}

/// The sources of one scan, ready to run.
struct Session<P, B> {
	duration: Duration,
	strict: bool,
	sweep: Option<Sweep<P>>,
	mdns: Option<MdnsDiscovery<B>>,
	ssdp: Option<SsdpDiscovery>,

	/// Sources that could not be set up and end a strict session at once. A missing subnet is not counted.
	unavailable: usize,
}
impl<P: Prober, B: Backend> Session<P, B> {
	/// Sets up every enabled source. A source that cannot be set up is left out of the session.
	fn prepare(config: &ScanConfig<P, B>, duration: Duration) -> Self {
		Self::prepare_with(config, duration, LocalSubnet::detect)
	}

	/// A missing local subnet only ever disables the sweep, even in strict mode.
	fn prepare_with<D>(config: &ScanConfig<P, B>, duration: Duration, detect_subnet: D) -> Self
	where
		D: FnOnce() -> Result<LocalSubnet, SubnetError>,
	{
		let enabled = |source: DeviceSource| {
			let enabled = !config.disabled.contains(&source);
			if !enabled {
				log::debug!("{source} is disabled");
			}
			enabled
		};
		let mut unavailable = 0;

		let sweep = if enabled(DeviceSource::Sweep) {
			let subnet = match config.subnet {
				Some(subnet) => Ok(subnet),
				None => detect_subnet(),
			};
			match subnet {
				Ok(subnet) => Some(config.sweep.clone().build(subnet, config.prober.clone())),
				Err(err) => {
					log::warn!("{}", SourceError::from(err));
					None
				}
			}
		} else {
			None
		};

		let mdns = enabled(DeviceSource::Mdns).then(|| {
			let mdns = MdnsDiscovery::new(config.backend.clone(), config.service_types.clone())
				.resolve_timeout(config.resolve_timeout)
				.strict(config.strict);

			match &config.vendors {
				Some(vendors) => mdns.vendors(vendors.clone()),
				None => mdns,
			}
		});

		let ssdp = if enabled(DeviceSource::Ssdp) {
			match config.ssdp.clone().build() {
				Ok(ssdp) => Some(ssdp),
				Err(err) => {
					log::warn!("{}", SourceError::Ssdp(err));
					unavailable += 1;
					None
				}
			}
		} else {
			None
		};

		Session {
			duration,
			strict: config.strict,
			sweep,
			mdns,
			ssdp,
			unavailable,
		}
	}

	async fn run(self, registry: &Arc<DeviceRegistry>, mut shutdown_rx: oneshot::Receiver<()>) {
		let Session {
			duration,
			strict,
			sweep,
			mdns,
			ssdp,
			unavailable,
		} = self;

		let deadline = tokio::time::Instant::now() + duration;

		log::info!("Scanning for {:.1}s", duration.as_secs_f64());
		registry.publish(ScanEvent::ScanStarted { duration });

		let mut running = BTreeSet::new();
		let mut sources = JoinSet::new();

		if let Some(sweep) = sweep {
			let registry = registry.clone();
			running.insert(DeviceSource::Sweep);
			sources.spawn(async move {
				sweep.run_into(&registry).await;
				(DeviceSource::Sweep, Ok(()))
			});
		}

		if let Some(mdns) = mdns {
			let registry = registry.clone();
			running.insert(DeviceSource::Mdns);
			sources.spawn(async move { (DeviceSource::Mdns, mdns.run(registry).await) });
		}

		if let Some(ssdp) = ssdp {
			let registry = registry.clone();
			running.insert(DeviceSource::Ssdp);
			sources.spawn(async move { (DeviceSource::Ssdp, ssdp.run(&registry).await) });
		}

		let mut failed = strict && unavailable > 0;
		while !failed {
			tokio::select! {
				biased;
				_ = &mut shutdown_rx => {
					log::debug!("Scan stopped early");
					break;
				}

				_ = tokio::time::sleep_until(deadline) => {
					log::debug!("Scan window elapsed");
					break;
				}

				Some(finished) = sources.join_next() => match finished {
					Ok((source, result)) => {
						running.remove(&source);
						match result {
							Ok(()) => log::debug!("{source} finished"),
							Err(err) => {
								log::warn!("{err}");
								failed = strict;
							}
						}
						registry.publish(ScanEvent::SourceStopped(source));
					}
					Err(err) => log::warn!("Discovery task failed: {err}"),
				},
			}
		}

		sources.shutdown().await;
		for source in running {
			registry.publish(ScanEvent::SourceStopped(source));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::Ipv4Addr;

	fn idle_scanner() -> Scanner {
		ScanBuilder::new()
			.subnet(LocalSubnet::new(Ipv4Addr::new(10, 0, 0, 9)).unwrap())
			.disable_source(DeviceSource::Sweep)
			.disable_source(DeviceSource::Mdns)
			.disable_source(DeviceSource::Ssdp)
			.build()
	}

	#[test]
	fn stopping_an_idle_scanner_does_nothing() {
		let scanner = idle_scanner();
		assert!(!scanner.is_scanning());
		scanner.stop().unwrap();
		scanner.stop().unwrap();
		scanner.wait().unwrap();
		assert!(!scanner.is_scanning());
	}

	#[test]
	fn second_start_is_ignored() {
		let scanner = idle_scanner();
		assert_eq!(scanner.start_scan(Duration::from_secs(30)).unwrap(), StartOutcome::Started);
		assert!(scanner.is_scanning());
		assert_eq!(scanner.start_scan(Duration::from_secs(30)).unwrap(), StartOutcome::AlreadyScanning);

		scanner.stop().unwrap();
		assert!(!scanner.is_scanning());
		assert_eq!(scanner.start_scan(Duration::from_millis(10)).unwrap(), StartOutcome::Started);
		scanner.wait().unwrap();
		assert!(!scanner.is_scanning());
	}

	#[test]
	fn stop_reaches_a_scan_someone_is_waiting_on() {
		let scanner = idle_scanner();
		assert_eq!(scanner.start_scan(Duration::from_secs(30)).unwrap(), StartOutcome::Started);

		let started = Instant::now();
		std::thread::scope(|scope| {
			let waiter = scope.spawn(|| scanner.wait());

			std::thread::sleep(Duration::from_millis(200));
			scanner.stop().unwrap();
			assert!(!scanner.is_scanning());

			waiter.join().unwrap().unwrap();
		});
		assert!(started.elapsed() < Duration::from_secs(10));

		// The session is gone for good: nothing left to stop or wait for.
		scanner.stop().unwrap();
		scanner.wait().unwrap();
	}

	#[test]
	fn missing_subnet_does_not_end_a_strict_scan() {
		let scanner = ScanBuilder::new()
			.strict(true)
			.disable_source(DeviceSource::Mdns)
			.disable_source(DeviceSource::Ssdp)
			.build();

		let duration = Duration::from_millis(200);
		let session = Session::prepare_with(&scanner.config, duration, || Err(SubnetError::NoIpv4Interface));
		assert!(session.sweep.is_none());
		assert_eq!(session.unavailable, 0);

		let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
		let (_shutdown_tx, shutdown_rx) = oneshot::channel();

		let started = Instant::now();
		runtime.block_on(session.run(scanner.registry(), shutdown_rx));
		assert!(started.elapsed() >= duration);
	}
}
