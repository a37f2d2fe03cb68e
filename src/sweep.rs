//! Active inventory of the local /24.
//!
//! Every candidate address gets the whole port set probed concurrently, then one ICMP echo. A host is active if any port
//! accepted a connection or the echo was answered. Hosts are processed in fixed-size batches and a batch is fully drained
//! before the next one starts, which bounds the number of sockets in flight.

use crate::{
	device::{Device, HostActivity},
	event::ScanEvent,
	net::LocalSubnet,
	probe::Prober,
	registry::DeviceRegistry,
};
use std::{
	net::{IpAddr, Ipv4Addr},
	ops::RangeInclusive,
	sync::Arc,
	time::{Duration, Instant},
};
use tokio::task::JoinSet;

mod builder;
pub use builder::{SweepBuilder, DEFAULT_PORTS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// What one candidate address did during the sweep.
pub struct HostReport {
	pub addr: Ipv4Addr,
	pub activity: HostActivity,
}
impl HostReport {
	#[inline]
	pub fn is_active(&self) -> bool {
		self.activity.is_active()
	}

	/// The registry record for this host.
	pub fn into_device(self) -> Device {
		let HostReport { addr, activity } = self;
		Device::host(IpAddr::V4(addr)).with_fields(|fields| {
			fields.address = Some(IpAddr::V4(addr));
			fields.port = activity.open_port;
			fields.activity = Some(activity);
		})
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepSummary {
	/// The /24 prefix that was swept, e.g. `"10.0.0."`.
	pub prefix: String,
	pub probed: usize,
	pub active: usize,
	pub batches: usize,
	pub elapsed: Duration,
}

pub struct Sweep<P> {
	subnet: LocalSubnet,
	prober: Arc<P>,
	ports: Arc<[u16]>,
	batch_size: usize,
	tcp_timeout: Duration,
	icmp_timeout: Duration,
	host_octets: RangeInclusive<u8>,
}
impl<P: Prober> Sweep<P> {
	#[inline(always)]
	pub fn subnet(&self) -> &LocalSubnet {
		&self.subnet
	}

	/// Every address that will be probed, in order. This machine's own address is never among them.
	pub fn candidates(&self) -> Vec<Ipv4Addr> {
		self.subnet.hosts(self.host_octets.clone()).collect()
	}

	/// Sweeps the subnet, handing each active host to `on_active` as soon as its batch reports it.
	pub async fn run<F>(&self, mut on_active: F) -> SweepSummary
	where
		F: FnMut(HostReport),
	{
		let started = Instant::now();
		let candidates = self.candidates();
		let batches = candidates.len().div_ceil(self.batch_size);

		log::debug!(
			"Sweeping {} ({} hosts, {} ports, {batches} batches)",
			self.subnet,
			candidates.len(),
			self.ports.len()
		);

		let mut active = 0;
		for (index, batch) in candidates.chunks(self.batch_size).enumerate() {
			let mut pending = JoinSet::new();
			for &addr in batch {
				pending.spawn(Self::probe_host(
					self.prober.clone(),
					self.ports.clone(),
					addr,
					self.tcp_timeout,
					self.icmp_timeout,
				));
			}

			// Barrier: nothing from the next batch starts until this one has no probes left.
			while let Some(report) = pending.join_next().await {
				match report {
					Ok(report) if report.is_active() => {
						active += 1;
						on_active(report);
					}
					Ok(_) => {}
					Err(err) => log::debug!("Host probe task failed: {err}"),
				}
			}

			log::trace!("Sweep batch {}/{batches} drained", index + 1);
		}

		let summary = SweepSummary {
			prefix: self.subnet.prefix(),
			probed: candidates.len(),
			active,
			batches,
			elapsed: started.elapsed(),
		};

		log::info!(
			"Swept {}0/24: {} of {} hosts active in {:.1}s",
			summary.prefix,
			summary.active,
			summary.probed,
			summary.elapsed.as_secs_f64()
		);

		summary
	}

	/// Sweeps into the registry and publishes the summary as [`ScanEvent::SweepFinished`].
	pub async fn run_into(&self, registry: &DeviceRegistry) -> SweepSummary {
		let summary = self
			.run(|report| {
				registry.insert_or_ignore(report.into_device());
			})
			.await;

		registry.publish(ScanEvent::SweepFinished(summary.clone()));
		summary
	}

	async fn probe_host(prober: Arc<P>, ports: Arc<[u16]>, addr: Ipv4Addr, tcp_timeout: Duration, icmp_timeout: Duration) -> HostReport {
		let mut probes = JoinSet::new();
		for (position, &port) in ports.iter().enumerate() {
			let prober = prober.clone();
			probes.spawn(async move { (position, prober.tcp(addr, port, tcp_timeout).await) });
		}

		let mut first_open: Option<usize> = None;
		while let Some(probe) = probes.join_next().await {
			if let Ok((position, true)) = probe {
				first_open = Some(first_open.map_or(position, |first| first.min(position)));
			}
		}

		let echo = prober.icmp(addr, icmp_timeout).await;

		HostReport {
			addr,
			activity: HostActivity {
				open_port: first_open.map(|position| ports[position]),
				echo,
			},
		}
	}
}
