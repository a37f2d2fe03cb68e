use super::{Backend, BrowseEvent, BrowseSession, HostResolution, ResolveContext, Resolution, ServiceInstance};
use crate::{
	catalog::ServiceType,
	errors::ResolveError,
	net::TargetInterface,
	socket::{self, RECV_BUFFER_SIZE},
	util::{dns_key, dns_name_from_labels},
	MDNS_PORT, MDNS_V4_IP,
};
use std::{collections::HashSet, future::Future, net::IpAddr, time::Duration};
use tokio::{net::UdpSocket, sync::mpsc, time::Instant};
use trust_dns_client::{
	op::{Message as DnsMessage, MessageType as DnsMessageType, OpCode as DnsOpCode, Query as DnsQuery},
	proto::error::ProtoResult,
	rr::{DNSClass as DnsClass, Name as DnsName, RData, RecordType as DnsRecordType},
	serialize::binary::{BinDecodable, BinEncodable},
};

/// mDNS packets must be sent with the maximum hop limit.
const MDNS_TTL: u32 = 255;

/// One-shot queries are repeated this often until answered or timed out.
const REQUERY_INTERVAL: Duration = Duration::from_secs(1);

/// The real [`Backend`], talking multicast DNS on the local link.
///
/// Browsing listens on the mDNS port and repeats a PTR query every browse interval; resolution sends one-shot queries
/// from an ephemeral port with the unicast-response bit set, so the answers come straight back to that port.
pub struct MdnsBackend {
	pub(super) loopback: bool,
	pub(super) interface: TargetInterface,
	pub(super) browse_interval: Duration,
}
impl Backend for MdnsBackend {
	fn browse(&self, service_type: &ServiceType) -> Result<BrowseSession, std::io::Error> {
		let browsed = service_type
			.dns_name()
			.map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;

		let query = query_packet([(browsed.clone(), DnsRecordType::PTR)], false)
			.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, format!("Browse packet failed to serialize: {err}")))?;

		let socket = socket::into_async(socket::mdns_listener(self.loopback, &self.interface)?)?;

		let (events_tx, events_rx) = mpsc::channel(64);
		let worker = tokio::spawn(browse_loop(
			socket,
			browsed,
			service_type.clone(),
			query,
			self.browse_interval,
			events_tx,
		));

		Ok(BrowseSession::with_worker(events_rx, worker))
	}

	fn resolve(&self, instance: &ServiceInstance, timeout: Duration) -> impl Future<Output = Result<Resolution, ResolveError>> + Send {
		async move {
			let deadline = Instant::now() + timeout;

			let fqdn = instance.fqdn()?;
			let instance_key = dns_key(&fqdn);

			let mut resolution = Resolution::default();
			let packet = query_packet([(fqdn.clone(), DnsRecordType::SRV), (fqdn, DnsRecordType::TXT)], true)?;
			self.exchange(&packet, deadline, |message| {
				absorb_instance_records(&mut resolution, &instance_key, message);
				resolution.port.is_some()
			})
			.await?;

			// Responders usually send the addresses along with the SRV answer; ask for them if this one didn't.
			if let Some(host) = resolution.host.clone().filter(|_| resolution.addresses.is_empty()) {
				let host_key = dns_key(&host);
				let packet = query_packet([(host.clone(), DnsRecordType::A), (host, DnsRecordType::AAAA)], true)?;
				let lookup = self
					.exchange(&packet, deadline, |message| {
						resolution.addresses.extend(addresses_of(&host_key, message));
						!resolution.addresses.is_empty()
					})
					.await;

				match lookup {
					Ok(()) | Err(ResolveError::TimedOut) => {}
					Err(err) => return Err(err),
				}
			}

			Ok(resolution)
		}
	}

	fn resolve_host(&self, context: &ResolveContext, timeout: Duration) -> impl Future<Output = Result<HostResolution, ResolveError>> + Send {
		async move {
			let deadline = Instant::now() + timeout;

			let host = match &context.host {
				Some(host) => host.clone(),
				None => dns_name_from_labels(
					std::iter::once(context.instance.name.as_str()).chain(context.instance.service_type.domain().split('.')),
				)?,
			};
			let host_key = dns_key(&host);

			let mut addresses = Vec::new();
			let packet = query_packet([(host.clone(), DnsRecordType::A), (host, DnsRecordType::AAAA)], true)?;
			self.exchange(&packet, deadline, |message| {
				addresses.extend(addresses_of(&host_key, message));
				super::preferred_address(&addresses).is_some()
			})
			.await?;

			super::preferred_address(&addresses)
				.map(|address| HostResolution { address, port: context.port })
				.ok_or(ResolveError::TimedOut)
		}
	}
}
impl MdnsBackend {
	/// Sends `packet` from a fresh ephemeral socket (repeating it every [`REQUERY_INTERVAL`]) and feeds every response
	/// to `absorb` until it returns `true` or the deadline passes. The socket is closed on return.
	async fn exchange<F>(&self, packet: &[u8], deadline: Instant, mut absorb: F) -> Result<(), ResolveError>
	where
		F: FnMut(&DnsMessage) -> bool + Send,
	{
		let socket = socket::into_async(socket::multicast_sender(self.interface.sender_addr(), MDNS_TTL, self.loopback)?)?;

		let mut buf = vec![0; RECV_BUFFER_SIZE];
		let mut requery = tokio::time::interval(REQUERY_INTERVAL);
		requery.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				biased;
				_ = tokio::time::sleep_until(deadline) => return Err(ResolveError::TimedOut),

				recv = socket.recv_from(&mut buf) => {
					let (count, from) = recv?;
					match DnsMessage::from_bytes(&buf[..count]) {
						Ok(message) if message.message_type() == DnsMessageType::Response => {
							if absorb(&message) {
								return Ok(());
							}
						}
						_ => log::trace!("Ignoring {count} byte packet from {from}"),
					}
				}

				_ = requery.tick() => {
					socket.send_to(packet, (MDNS_V4_IP, MDNS_PORT)).await?;
				}
			}
		}
	}
}

async fn browse_loop(
	socket: UdpSocket,
	browsed: DnsName,
	service_type: ServiceType,
	query: Vec<u8>,
	browse_interval: Duration,
	events: mpsc::Sender<Result<BrowseEvent, std::io::Error>>,
) {
	let mut seen = HashSet::new();
	let mut buf = vec![0; RECV_BUFFER_SIZE];

	let mut browse_interval = tokio::time::interval(browse_interval);
	browse_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

	loop {
		let result = tokio::select! {
			biased; // Prefer handling packets
			recv = socket.recv_from(&mut buf) => recv.map(|(count, from)| {
				match DnsMessage::from_bytes(&buf[..count]) {
					Ok(message) => browse_events(&browsed, &service_type, &message, &mut seen),
					Err(err) => {
						log::trace!("Ignoring malformed packet from {from}: {err}");
						Vec::new()
					}
				}
			}),

			_ = browse_interval.tick() => socket.send_to(&query, (MDNS_V4_IP, MDNS_PORT)).await.map(|_| Vec::new()),
		};

		match result {
			Ok(found) => {
				for event in found {
					if events.send(Ok(event)).await.is_err() {
						return;
					}
				}
			}
			Err(err) => {
				events.send(Err(err)).await.ok();
				return;
			}
		}
	}
}

/// Builds a query for the given questions; `unicast` asks responders to answer the sender directly.
pub(crate) fn query_packet(questions: impl IntoIterator<Item = (DnsName, DnsRecordType)>, unicast: bool) -> ProtoResult<Vec<u8>> {
	let mut message = DnsMessage::new();
	message.set_message_type(DnsMessageType::Query).set_op_code(DnsOpCode::Query);

	for (name, record_type) in questions {
		message.add_query({
			let mut query = DnsQuery::new();

			query
				.set_name(name)
				.set_query_type(record_type)
				.set_query_class(DnsClass::IN)
				.set_mdns_unicast_response(unicast);

			query
		});
	}

	message.to_bytes()
}

/// Turns the PTR records of a response into browse events.
///
/// `seen` holds the instances already reported. An instance is added the first time it appears and removed when a
/// goodbye (TTL 0) arrives for it; repeats of either are dropped.
pub(crate) fn browse_events(browsed: &DnsName, service_type: &ServiceType, message: &DnsMessage, seen: &mut HashSet<String>) -> Vec<BrowseEvent> {
	if message.message_type() != DnsMessageType::Response {
		return Vec::new();
	}

	let browsed_key = dns_key(browsed);
	let mut events = Vec::new();

	for record in message.answers().iter().chain(message.additionals()) {
		let Some(RData::PTR(target)) = record.data() else {
			continue;
		};
		if dns_key(record.name()) != browsed_key {
			continue;
		}
		let Some(instance) = ServiceInstance::from_ptr(target, service_type) else {
			continue;
		};

		let key = dns_key(target);
		if record.ttl() == 0 {
			if seen.remove(&key) {
				events.push(BrowseEvent::Removed(instance));
			}
		} else if seen.insert(key) {
			events.push(BrowseEvent::Added(instance));
		}
	}

	events
}

/// Picks the SRV and TXT records of the instance out of a response, and any addresses of the SRV target.
fn absorb_instance_records(resolution: &mut Resolution, instance_key: &str, message: &DnsMessage) {
	for record in message.answers().iter().chain(message.additionals()) {
		if dns_key(record.name()) != instance_key {
			continue;
		}
		match record.data() {
			Some(RData::SRV(srv)) => {
				resolution.host = Some(srv.target().clone());
				resolution.port = Some(srv.port());
			}
			Some(RData::TXT(txt)) => resolution.txt.extend(txt.txt_data().iter().map(|string| &string[..])),
			_ => {}
		}
	}

	if let Some(host) = &resolution.host {
		let host_key = dns_key(host);
		for address in addresses_of(&host_key, message) {
			if !resolution.addresses.contains(&address) {
				resolution.addresses.push(address);
			}
		}
	}
}

fn addresses_of<'a>(host_key: &'a str, message: &'a DnsMessage) -> impl Iterator<Item = IpAddr> + 'a {
	message
		.answers()
		.iter()
		.chain(message.additionals())
		.filter(move |record| dns_key(record.name()) == host_key)
		.filter_map(|record| match record.data() {
			Some(RData::A(addr)) => Some(IpAddr::V4(*addr)),
			Some(RData::AAAA(addr)) => Some(IpAddr::V6(*addr)),
			_ => None,
		})
}
