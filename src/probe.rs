//! Single-host TCP connect and ICMP echo probes.
//!
//! Both primitives never fail: anything that goes wrong (refused, unreachable, no privileges for ICMP) is simply a
//! negative result. Their worst-case latency is their timeout.

use std::{
	future::Future,
	net::{IpAddr, Ipv4Addr, SocketAddr},
	sync::Arc,
	time::Duration,
};
use tokio::net::TcpStream;

mod completion;
pub use completion::Completion;

const ICMP_PAYLOAD: [u8; 56] = [0; 56];

/// Attempts a TCP connection to `addr:port`, calling `on_complete` exactly once with whether it was established in time.
///
/// The connection attempt and the timer race each other; whichever finishes first delivers the result. If the timer wins
/// the pending attempt is cancelled, and an established connection is closed right after the result is delivered.
///
/// Must be called from within a tokio runtime.
pub fn tcp_probe_with<F>(addr: IpAddr, port: u16, timeout: Duration, on_complete: F)
where
	F: FnOnce(bool) + Send + 'static,
{
	let completion = Arc::new(Completion::new(on_complete));

	let connect = tokio::spawn({
		let completion = completion.clone();
		async move {
			let stream = TcpStream::connect(SocketAddr::new(addr, port)).await;
			completion.complete(stream.is_ok());
			drop(stream);
		}
	});

	tokio::spawn(async move {
		tokio::time::sleep(timeout).await;
		if completion.complete(false) {
			connect.abort();
		}
	});
}

/// Whether `addr:port` accepts a TCP connection within `timeout`.
pub async fn tcp_probe(addr: IpAddr, port: u16, timeout: Duration) -> bool {
	let (tx, rx) = tokio::sync::oneshot::channel();
	tcp_probe_with(addr, port, timeout, move |open| {
		tx.send(open).ok();
	});
	rx.await.unwrap_or(false)
}

/// Whether `addr` answers a single ICMP echo request within `timeout`.
pub async fn icmp_probe(addr: IpAddr, timeout: Duration) -> bool {
	match tokio::time::timeout(timeout, surge_ping::ping(addr, &ICMP_PAYLOAD)).await {
		Ok(Ok(_)) => true,
		Ok(Err(err)) => {
			log::trace!("ICMP echo to {addr} failed: {err}");
			false
		}
		Err(_) => false,
	}
}

/// The probes the subnet sweep runs against each candidate host.
pub trait Prober: Send + Sync + 'static {
	fn tcp(&self, addr: Ipv4Addr, port: u16, timeout: Duration) -> impl Future<Output = bool> + Send;
	fn icmp(&self, addr: Ipv4Addr, timeout: Duration) -> impl Future<Output = bool> + Send;
}

#[derive(Clone, Copy, Debug, Default)]
/// Probes the real network with [`tcp_probe`] and [`icmp_probe`].
pub struct NetProber;
impl Prober for NetProber {
	fn tcp(&self, addr: Ipv4Addr, port: u16, timeout: Duration) -> impl Future<Output = bool> + Send {
		tcp_probe(IpAddr::V4(addr), port, timeout)
	}

	fn icmp(&self, addr: Ipv4Addr, timeout: Duration) -> impl Future<Output = bool> + Send {
		icmp_probe(IpAddr::V4(addr), timeout)
	}
}
