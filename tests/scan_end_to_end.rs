use lantern::{
	catalog::ServiceType,
	device::HostActivity,
	errors::ResolveError,
	mdns::{Backend, BrowseEvent, BrowseSession, HostResolution, ResolveContext, Resolution, ServiceInstance, TxtMetadata},
	net::LocalSubnet,
	probe::Prober,
	ssdp::SsdpBuilder,
	sweep::SweepBuilder,
	DeviceIdentity, DeviceSource, ScanBuilder, ScanEvent, StartOutcome,
};
use std::{
	collections::{HashMap, HashSet},
	future::Future,
	net::{IpAddr, Ipv4Addr},
	sync::{mpsc, Arc, Mutex},
	time::{Duration, Instant},
};
use tokio::sync::mpsc as async_mpsc;

const LOCAL_ADDR: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 9);

fn service_type(service: &str) -> ServiceType {
	service.parse().unwrap()
}

fn init_logger() {
	simple_logger::SimpleLogger::new().with_level(log::LevelFilter::Debug).init().ok();
}

/// A /24 where only the listed hosts answer.
#[derive(Default)]
struct FakeNetwork {
	open: HashMap<Ipv4Addr, Vec<u16>>,
	echo: HashSet<Ipv4Addr>,
	probed: Arc<Mutex<HashSet<Ipv4Addr>>>,
}
impl Prober for FakeNetwork {
	fn tcp(&self, addr: Ipv4Addr, port: u16, _timeout: Duration) -> impl Future<Output = bool> + Send {
		self.probed.lock().unwrap().insert(addr);
		let open = self.open.get(&addr).is_some_and(|ports| ports.contains(&port));
		async move { open }
	}

	fn icmp(&self, addr: Ipv4Addr, _timeout: Duration) -> impl Future<Output = bool> + Send {
		let echo = self.echo.contains(&addr);
		async move { echo }
	}
}

/// Announces a fixed set of instances and keeps every browsing session open until the scanner closes it.
#[derive(Default)]
struct FakeResponders {
	announced: Vec<(ServiceInstance, Resolution)>,
	failing: Vec<ServiceType>,
	sessions: Mutex<Vec<async_mpsc::Sender<Result<BrowseEvent, std::io::Error>>>>,
}
impl FakeResponders {
	fn printer() -> Self {
		Self {
			announced: vec![(
				ServiceInstance::new("Printer1", service_type("_ipp._tcp")),
				Resolution {
					host: None,
					port: Some(631),
					addresses: vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 20))],
					txt: TxtMetadata::from_strings([&b"txtvers=1"[..], &b"md=LaserJet"[..]]),
				},
			)],
			..Default::default()
		}
	}

	fn open_sessions(&self) -> usize {
		self.sessions.lock().unwrap().iter().filter(|session| !session.is_closed()).count()
	}
}
impl Backend for FakeResponders {
	fn browse(&self, service_type: &ServiceType) -> Result<BrowseSession, std::io::Error> {
		if self.failing.contains(service_type) {
			return Err(std::io::Error::new(std::io::ErrorKind::AddrInUse, "mDNS port is busy"));
		}

		let (tx, rx) = async_mpsc::channel(8);
		for (instance, _) in self.announced.iter().filter(|(instance, _)| instance.service_type == *service_type) {
			tx.try_send(Ok(BrowseEvent::Added(instance.clone()))).unwrap();
		}
		self.sessions.lock().unwrap().push(tx);
		Ok(BrowseSession::new(rx))
	}

	fn resolve(&self, instance: &ServiceInstance, _timeout: Duration) -> impl Future<Output = Result<Resolution, ResolveError>> + Send {
		let resolution = self
			.announced
			.iter()
			.find(|(announced, _)| announced == instance)
			.map(|(_, resolution)| resolution.clone());
		async move { resolution.ok_or(ResolveError::TimedOut) }
	}

	fn resolve_host(&self, _context: &ResolveContext, _timeout: Duration) -> impl Future<Output = Result<HostResolution, ResolveError>> + Send {
		async move { Err(ResolveError::TimedOut) }
	}
}

fn event_channel() -> (impl Fn(ScanEvent) + Send + Sync + 'static, mpsc::Receiver<ScanEvent>) {
	let (tx, rx) = mpsc::channel();
	let tx = Mutex::new(tx);
	(move |event| {
		tx.lock().unwrap().send(event).ok();
	}, rx)
}

#[test]
fn sweep_finds_active_hosts_but_never_itself() {
	init_logger();

	let network = FakeNetwork {
		open: HashMap::from([(Ipv4Addr::new(10, 0, 0, 5), vec![80]), (LOCAL_ADDR, vec![80, 22])]),
		echo: HashSet::from([Ipv4Addr::new(10, 0, 0, 5), LOCAL_ADDR]),
		..Default::default()
	};
	let probed = network.probed.clone();
	let (handler, events) = event_channel();

	let scanner = ScanBuilder::new()
		.subnet(LocalSubnet::new(LOCAL_ADDR).unwrap())
		.sweep(SweepBuilder::new().host_octets(1..=20).batch_size(10))
		.prober(network)
		.disable_source(DeviceSource::Mdns)
		.disable_source(DeviceSource::Ssdp)
		.on_event(handler)
		.build();

	scanner.start_scan(Duration::from_secs(10)).unwrap();

	let summary = loop {
		match events.recv_timeout(Duration::from_secs(10)).expect("Timed out waiting for the sweep") {
			ScanEvent::SweepFinished(summary) => break summary,
			_ => continue,
		}
	};
	assert_eq!(summary.prefix, "10.0.0.");
	assert_eq!(summary.probed, 19);
	assert_eq!(summary.active, 1);
	assert_eq!(summary.batches, 2);

	let probed = probed.lock().unwrap().clone();
	assert_eq!(probed.len(), 19);
	assert!(!probed.contains(&LOCAL_ADDR));

	let devices = scanner.devices();
	assert_eq!(devices.len(), 1);

	let host = &devices[0];
	assert_eq!(host.identity(), &DeviceIdentity::Host { addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)) });
	assert_eq!(host.address(), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
	assert_eq!(host.port(), Some(80));
	assert_eq!(host.activity(), Some(HostActivity { open_port: Some(80), echo: true }));

	scanner.stop().unwrap();
	assert!(!scanner.is_scanning());
}

#[test]
fn mdns_instance_is_resolved() {
	init_logger();

	let scanner = ScanBuilder::new()
		.mdns_backend(FakeResponders::printer())
		.service_types([service_type("_ipp._tcp"), service_type("_smb._tcp")])
		.disable_source(DeviceSource::Sweep)
		.disable_source(DeviceSource::Ssdp)
		.build();

	scanner.start_scan(Duration::from_millis(500)).unwrap();
	scanner.wait().unwrap();

	let devices = scanner.devices();
	assert_eq!(devices.len(), 1);

	let printer = &devices[0];
	assert_eq!(
		printer.identity(),
		&DeviceIdentity::Service {
			name: "Printer1".into(),
			domain: "local".into(),
			service_type: "_ipp._tcp".into(),
		}
	);
	assert_eq!(printer.display_name(), "Printer1");
	assert_eq!(printer.model().as_deref(), Some("LaserJet"));
	assert_eq!(printer.address(), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 20))));
	assert_eq!(printer.port(), Some(631));
	assert_eq!(printer.metadata_value("txtvers").as_deref(), Some("1"));
}

#[test]
fn deadline_tears_everything_down_once() {
	init_logger();

	let (handler, events) = event_channel();
	let backend = Arc::new(FakeResponders::printer());

	let scanner = ScanBuilder::new()
		.mdns_backend(SharedBackend(backend.clone()))
		.service_types([service_type("_ipp._tcp"), service_type("_http._tcp")])
		.disable_source(DeviceSource::Sweep)
		.disable_source(DeviceSource::Ssdp)
		.on_event(handler)
		.build();

	assert_eq!(scanner.start_scan(Duration::from_millis(300)).unwrap(), StartOutcome::Started);
	scanner.wait().unwrap();

	assert!(!scanner.is_scanning());
	assert_eq!(backend.sessions.lock().unwrap().len(), 2);
	assert_eq!(backend.open_sessions(), 0);

	let events = events.try_iter().collect::<Vec<_>>();
	assert!(matches!(events.first(), Some(ScanEvent::ScanStarted { .. })));
	assert!(matches!(events.last(), Some(ScanEvent::ScanFinished { .. })));
	assert_eq!(events.iter().filter(|event| matches!(event, ScanEvent::ScanFinished { .. })).count(), 1);
	assert_eq!(
		events.iter().filter(|event| matches!(event, ScanEvent::SourceStopped(DeviceSource::Mdns))).count(),
		1
	);

	// Stopping after the fact must not finish the scan a second time.
	scanner.stop().unwrap();
	assert!(!scanner.is_scanning());
}

#[test]
fn start_while_scanning_changes_nothing() {
	init_logger();

	let (handler, events) = event_channel();
	let scanner = ScanBuilder::new()
		.mdns_backend(FakeResponders::printer())
		.service_types([service_type("_ipp._tcp")])
		.disable_source(DeviceSource::Sweep)
		.disable_source(DeviceSource::Ssdp)
		.on_event(handler)
		.build();

	scanner.start_scan(Duration::from_secs(30)).unwrap();
	loop {
		if let ScanEvent::DeviceAdded(_) = events.recv_timeout(Duration::from_secs(10)).expect("Timed out waiting for the printer") {
			break;
		}
	}
	let before = scanner.devices();

	assert_eq!(scanner.start_scan(Duration::from_secs(1)).unwrap(), StartOutcome::AlreadyScanning);
	assert!(scanner.is_scanning());

	let after = scanner.devices();
	assert_eq!(after.len(), 1);
	assert!(Arc::ptr_eq(&before[0], &after[0]));

	drop(scanner);
	let started = events.try_iter().filter(|event| matches!(event, ScanEvent::ScanStarted { .. })).count();
	assert_eq!(started, 0, "the ignored start must not begin a second session");
}

#[test]
fn ssdp_socket_is_released_at_the_deadline() {
	init_logger();

	let responder = std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	responder.set_read_timeout(Some(Duration::from_secs(10))).unwrap();

	let (handler, events) = event_channel();
	let scanner = ScanBuilder::new()
		.ssdp(SsdpBuilder::new().destination(responder.local_addr().unwrap()))
		.disable_source(DeviceSource::Sweep)
		.disable_source(DeviceSource::Mdns)
		.on_event(handler)
		.build();

	scanner.start_scan(Duration::from_secs(1)).unwrap();

	let mut buf = [0; 1024];
	let (count, searcher) = responder.recv_from(&mut buf).expect("Timed out waiting for the search");
	assert!(buf[..count].starts_with(b"M-SEARCH * HTTP/1.1\r\n"));

	responder
		.send_to(
			b"HTTP/1.1 200 OK\r\n\
			LOCATION: http://192.168.1.40:49152/description.xml\r\n\
			USN: uuid:tv::upnp:rootdevice\r\n\
			SERVER: Linux UPnP/1.0\r\n\r\n",
			searcher,
		)
		.unwrap();

	scanner.wait().unwrap();

	let devices = scanner.devices();
	assert_eq!(devices.len(), 1);
	assert_eq!(devices[0].identity(), &DeviceIdentity::Upnp { usn: "uuid:tv::upnp:rootdevice".into() });
	assert_eq!(devices[0].address(), Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40))));

	let events = events.try_iter().collect::<Vec<_>>();
	let stopped = events
		.iter()
		.position(|event| matches!(event, ScanEvent::SourceStopped(DeviceSource::Ssdp)))
		.expect("SSDP was never reported stopped");
	let finished = events
		.iter()
		.position(|event| matches!(event, ScanEvent::ScanFinished { .. }))
		.expect("The scan never finished");
	assert!(stopped < finished);

	// The search port is free again, so nothing is left reading from it.
	std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, searcher.port())).expect("The search socket is still open");
}

#[test]
fn strict_scan_ends_on_the_first_browse_failure() {
	init_logger();

	let (handler, events) = event_channel();
	let scanner = ScanBuilder::new()
		.strict(true)
		.mdns_backend(FakeResponders {
			failing: vec![service_type("_smb._tcp")],
			..FakeResponders::printer()
		})
		.service_types([service_type("_ipp._tcp"), service_type("_smb._tcp")])
		.disable_source(DeviceSource::Sweep)
		.disable_source(DeviceSource::Ssdp)
		.on_event(handler)
		.build();

	let started = Instant::now();
	scanner.start_scan(Duration::from_secs(30)).unwrap();
	scanner.wait().unwrap();

	assert!(started.elapsed() < Duration::from_secs(10));
	assert!(!scanner.is_scanning());

	let events = events.try_iter().collect::<Vec<_>>();
	assert!(matches!(events.last(), Some(ScanEvent::ScanFinished { .. })));
	assert_eq!(events.iter().filter(|event| matches!(event, ScanEvent::ScanFinished { .. })).count(), 1);
	assert_eq!(
		events.iter().filter(|event| matches!(event, ScanEvent::SourceStopped(DeviceSource::Mdns))).count(),
		1
	);
}

#[test]
fn stop_from_another_thread_ends_a_waited_scan() {
	init_logger();

	let backend = Arc::new(FakeResponders::printer());
	let scanner = Arc::new(
		ScanBuilder::new()
			.mdns_backend(SharedBackend(backend.clone()))
			.service_types([service_type("_ipp._tcp")])
			.disable_source(DeviceSource::Sweep)
			.disable_source(DeviceSource::Ssdp)
			.build(),
	);

	scanner.start_scan(Duration::from_secs(30)).unwrap();

	let (done_tx, done_rx) = mpsc::channel();
	let waiter = {
		let scanner = scanner.clone();
		std::thread::spawn(move || {
			scanner.wait().unwrap();
			done_tx.send(()).unwrap();
		})
	};

	std::thread::sleep(Duration::from_millis(200));
	scanner.stop().unwrap();
	assert!(!scanner.is_scanning());
	assert_eq!(backend.open_sessions(), 0);

	done_rx.recv_timeout(Duration::from_secs(5)).expect("wait() outlived stop()");
	waiter.join().unwrap();
}

/// Lets a test keep its own handle on a backend the scanner owns.
struct SharedBackend(Arc<FakeResponders>);
impl Backend for SharedBackend {
	fn browse(&self, service_type: &ServiceType) -> Result<BrowseSession, std::io::Error> {
		self.0.browse(service_type)
	}

	fn resolve(&self, instance: &ServiceInstance, timeout: Duration) -> impl Future<Output = Result<Resolution, ResolveError>> + Send {
		self.0.resolve(instance, timeout)
	}

	fn resolve_host(&self, context: &ResolveContext, timeout: Duration) -> impl Future<Output = Result<HostResolution, ResolveError>> + Send {
		self.0.resolve_host(context, timeout)
	}
}

#[test]
#[ignore = "scans the real local network"]
fn live_scan() {
	init_logger();

	let scanner = ScanBuilder::new()
		.on_event(|event| {
			if let ScanEvent::DeviceAdded(device) = event {
				println!("{} via {}", device.display_name(), device.source());
			}
		})
		.build();

	scanner.start_scan(Duration::from_secs(10)).unwrap();
	scanner.wait().unwrap();

	for device in scanner.devices() {
		println!("{device:?}");
	}
}
