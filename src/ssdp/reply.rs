use crate::device::Device;
use std::{collections::HashMap, net::IpAddr};
use url::{Host, Url};

#[derive(Clone, Debug, PartialEq, Eq)]
/// A search reply (or announcement) from an SSDP responder.
pub struct SsdpReply {
	pub status_line: String,

	/// Every header, keyed by its lowercased name.
	pub headers: HashMap<String, String>,

	pub location: String,
	pub usn: Option<String>,
	pub server: Option<String>,
}
impl SsdpReply {
	/// The USN, or the location when the responder sent no USN.
	pub fn identity_key(&self) -> &str {
		self.usn.as_deref().unwrap_or(&self.location)
	}

	/// Looks up a header by its case-insensitive name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	pub fn location_url(&self) -> Option<Url> {
		Url::parse(&self.location).ok()
	}

	/// The host and port of the location URL. The port is the scheme's default when the URL has none.
	pub fn location_host(&self) -> Option<(String, Option<u16>)> {
		let url = self.location_url()?;
		let host = url.host_str()?.to_string();
		Some((host, url.port_or_known_default()))
	}

	/// The registry record for this responder.
	///
	/// The address comes from the location when it names an IP literal, from the reply's `source` otherwise.
	pub fn into_device(self, source: IpAddr) -> Device {
		let url = self.location_url();
		let address = match url.as_ref().and_then(Url::host) {
			Some(Host::Ipv4(addr)) => IpAddr::V4(addr),
			Some(Host::Ipv6(addr)) => IpAddr::V6(addr),
			Some(Host::Domain(_)) | None => source,
		};
		let port = url.as_ref().and_then(Url::port_or_known_default);

		let SsdpReply { headers, usn, location, server, .. } = self;
		Device::upnp(usn.unwrap_or(location)).with_fields(|fields| {
			fields.address = Some(address);
			fields.port = port;
			fields.server = server;
			fields.metadata = headers;
		})
	}
}

/// Parses an SSDP reply.
///
/// The first line is the status line; every following `name: value` line is a header, split at the first colon. Lines
/// may end in CRLF or bare LF. Returns `None` for replies without a `LOCATION`, which cannot be followed up on.
pub fn parse_reply(reply: &str) -> Option<SsdpReply> {
	let mut lines = reply.lines();
	let status_line = lines.next()?.trim();
	if status_line.is_empty() {
		return None;
	}

	let mut headers = HashMap::new();
	for line in lines {
		let Some((name, value)) = line.split_once(':') else {
			continue;
		};
		let name = name.trim();
		if name.is_empty() {
			continue;
		}
		headers.entry(name.to_ascii_lowercase()).or_insert_with(|| value.trim().to_string());
	}

	let non_empty = |name: &str| headers.get(name).filter(|value| !value.is_empty()).cloned();
	let location = non_empty("location")?;
	let usn = non_empty("usn");
	let server = non_empty("server");

	Some(SsdpReply {
		status_line: status_line.to_string(),
		headers,
		location,
		usn,
		server,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::Ipv4Addr;

	const ROUTER: &str = "HTTP/1.1 200 OK\r\n\
		CACHE-CONTROL: max-age=1800\r\n\
		Location: http://192.168.1.1:49152/rootDesc.xml\r\n\
		SERVER: Linux/5.4 UPnP/1.1 MiniUPnPd/2.2\r\n\
		ST: urn:schemas-upnp-org:device:InternetGatewayDevice:1\r\n\
		usn: uuid:3f2a9c1e-0000-0000-0000-000000000001::urn:schemas-upnp-org:device:InternetGatewayDevice:1\r\n\
		EXT:\r\n\
		\r\n";

	#[test]
	fn parses_a_search_reply() {
		let reply = parse_reply(ROUTER).unwrap();
		assert_eq!(reply.status_line, "HTTP/1.1 200 OK");
		assert_eq!(reply.location, "http://192.168.1.1:49152/rootDesc.xml");
		assert_eq!(reply.server.as_deref(), Some("Linux/5.4 UPnP/1.1 MiniUPnPd/2.2"));
		assert!(reply.identity_key().starts_with("uuid:3f2a9c1e"));
		assert_eq!(reply.header("Cache-Control"), Some("max-age=1800"));
		assert_eq!(reply.header("ext"), Some(""));
		assert_eq!(reply.location_host(), Some(("192.168.1.1".to_string(), Some(49152))));
	}

	#[test]
	fn replies_without_location_are_discarded() {
		assert_eq!(parse_reply("HTTP/1.1 200 OK\r\nUSN: uuid:1\r\nST: ssdp:all\r\n\r\n"), None);
		assert_eq!(parse_reply("HTTP/1.1 200 OK\r\nLOCATION:   \r\n\r\n"), None);
		assert_eq!(parse_reply(""), None);
		assert_eq!(parse_reply("M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\n\r\n"), None);
	}

	#[test]
	fn bare_line_feeds_and_missing_usn() {
		let reply = parse_reply("HTTP/1.1 200 OK\nLOCATION: http://nas.local/desc.xml\nST: upnp:rootdevice\n").unwrap();
		assert_eq!(reply.usn, None);
		assert_eq!(reply.identity_key(), "http://nas.local/desc.xml");
		assert_eq!(reply.location_host(), Some(("nas.local".to_string(), Some(80))));

		let source = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 44));
		let device = reply.into_device(source);
		assert_eq!(device.address(), Some(source));
		assert_eq!(device.port(), Some(80));
		assert_eq!(device.metadata_value("st").as_deref(), Some("upnp:rootdevice"));
		assert_eq!(device.display_name(), "http://nas.local/desc.xml");
	}

	#[test]
	fn location_literal_wins_over_source() {
		let device = parse_reply(ROUTER).unwrap().into_device(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
		assert_eq!(device.address(), Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
		assert_eq!(device.port(), Some(49152));
		assert_eq!(device.server().as_deref(), Some("Linux/5.4 UPnP/1.1 MiniUPnPd/2.2"));
	}

	#[test]
	fn unparseable_location_still_identifies() {
		let reply = parse_reply("HTTP/1.1 200 OK\r\nLOCATION: not a url\r\n\r\n").unwrap();
		assert_eq!(reply.location_host(), None);

		let source = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
		let device = reply.into_device(source);
		assert_eq!(device.address(), Some(source));
		assert_eq!(device.port(), None);
	}
}
