//! UPnP device discovery with a single SSDP search.

use crate::{
	errors::SourceError,
	registry::DeviceRegistry,
	socket::{self, RECV_BUFFER_SIZE},
};
use std::net::SocketAddr;

mod builder;
pub use builder::SsdpBuilder;

mod reply;
pub use reply::{parse_reply, SsdpReply};

/// Builds the `M-SEARCH` request sent to the SSDP group.
pub fn search_request(search_target: &str, mx: u8) -> String {
	format!(
		"M-SEARCH * HTTP/1.1\r\n\
		HOST: {}:{}\r\n\
		MAN: \"ssdp:discover\"\r\n\
		MX: {mx}\r\n\
		ST: {search_target}\r\n\
		\r\n",
		crate::SSDP_V4_IP,
		crate::SSDP_PORT
	)
}

/// An SSDP search, with its socket already open.
pub struct SsdpDiscovery {
	socket: std::net::UdpSocket,
	request: String,
	destination: SocketAddr,
}
impl SsdpDiscovery {
	pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
		self.socket.local_addr()
	}

	/// Sends the search, then records every reply until the returned future is dropped, which closes the socket.
	///
	/// Must be called from within a tokio runtime.
	pub async fn run(self, registry: &DeviceRegistry) -> Result<(), SourceError> {
		let SsdpDiscovery {
			socket,
			request,
			destination,
		} = self;

		let socket = socket::into_async(socket).map_err(SourceError::Ssdp)?;
		socket.send_to(request.as_bytes(), destination).await.map_err(SourceError::Ssdp)?;
		log::trace!("Sent SSDP search to {destination}");

		let mut buf = vec![0; RECV_BUFFER_SIZE];
		loop {
			let (count, from) = socket.recv_from(&mut buf).await.map_err(SourceError::Ssdp)?;
			let text = String::from_utf8_lossy(&buf[..count]);

			match parse_reply(&text) {
				Some(reply) => {
					registry.insert_or_ignore(reply.into_device(from.ip()));
				}
				None => log::trace!("Discarding SSDP reply from {from} without a location"),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::{
		net::{IpAddr, Ipv4Addr},
		sync::Arc,
		time::Duration,
	};
	use tokio::net::UdpSocket;

	#[test]
	fn request_format() {
		assert_eq!(
			search_request("ssdp:all", 2),
			"M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\nMX: 2\r\nST: ssdp:all\r\n\r\n"
		);
	}

	#[tokio::test]
	async fn replies_are_deduplicated_into_the_registry() {
		let responder = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
		let search = SsdpBuilder::new()
			.destination(responder.local_addr().unwrap())
			.build()
			.unwrap();

		let registry = Arc::new(DeviceRegistry::new());
		let task = tokio::spawn({
			let registry = registry.clone();
			async move { search.run(&registry).await }
		});

		let mut buf = vec![0; 1024];
		let (count, searcher) = responder.recv_from(&mut buf).await.unwrap();
		assert!(String::from_utf8_lossy(&buf[..count]).starts_with("M-SEARCH * HTTP/1.1\r\n"));

		let tv = "HTTP/1.1 200 OK\r\nLOCATION: http://10.0.0.50:8008/ssdp/device-desc.xml\r\nUSN: uuid:tv\r\n\r\n";
		let unlocated = "HTTP/1.1 200 OK\r\nUSN: uuid:ghost\r\n\r\n";
		for reply in [tv, tv, unlocated] {
			responder.send_to(reply.as_bytes(), searcher).await.unwrap();
		}

		tokio::time::timeout(Duration::from_secs(5), async {
			while registry.is_empty() {
				tokio::time::sleep(Duration::from_millis(10)).await;
			}
		})
		.await
		.unwrap();
		tokio::time::sleep(Duration::from_millis(100)).await;

		task.abort();
		assert!(task.await.unwrap_err().is_cancelled());

		let devices = registry.devices();
		assert_eq!(devices.len(), 1);
		assert_eq!(devices[0].address(), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 50))));
		assert_eq!(devices[0].port(), Some(8008));
	}
}
