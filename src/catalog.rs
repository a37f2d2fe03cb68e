//! Well-known DNS-SD service types browsed by [multicast discovery](crate::mdns).
//!
//! One browsing session is opened per entry, so this list bounds which kinds of services can be seen at all.

use crate::{errors::BadDnsNameError, util::dns_name_from_labels};
use std::{fmt, str::FromStr};
use trust_dns_client::rr::Name as DnsName;

pub const DEFAULT_DOMAIN: &str = "local";

pub const SERVICE_TYPES: &[&str] = &[
	// Printing and scanning
	"_ipp._tcp",
	"_ipps._tcp",
	"_printer._tcp",
	"_pdl-datastream._tcp",
	"_uscan._tcp",
	"_scanner._tcp",
	// File sharing
	"_smb._tcp",
	"_afpovertcp._tcp",
	"_nfs._tcp",
	"_ftp._tcp",
	"_webdav._tcp",
	"_adisk._tcp",
	// Media
	"_airplay._tcp",
	"_raop._tcp",
	"_googlecast._tcp",
	"_spotify-connect._tcp",
	"_sonos._tcp",
	"_daap._tcp",
	"_amzn-wplay._tcp",
	// IoT and home automation
	"_hap._tcp",
	"_matter._tcp",
	"_hue._tcp",
	"_mqtt._tcp",
	"_esphomelib._tcp",
	// Remote access
	"_ssh._tcp",
	"_sftp-ssh._tcp",
	"_rfb._tcp",
	"_rdp._tcp",
	// Web and general
	"_http._tcp",
	"_https._tcp",
	"_workstation._tcp",
	"_device-info._tcp",
	"_companion-link._tcp",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceCategory {
	Printer,
	FileSharing,
	Media,
	HomeAutomation,
	RemoteAccess,
	Web,
	Other,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A DNS-SD service type such as `_ipp._tcp` in the `local` domain.
pub struct ServiceType {
	service: String,
	domain: String,
}
impl ServiceType {
	/// Creates a service type from its `_name._proto` part and a domain.
	pub fn new(service: &str, domain: &str) -> Result<Self, BadDnsNameError> {
		let service = service.trim_end_matches('.');
		let domain = domain.trim_matches('.');

		let (name, proto) = service.split_once('.').ok_or(BadDnsNameError)?;
		if name.len() < 2 || !name.starts_with('_') || !matches!(proto, "_tcp" | "_udp") || domain.is_empty() {
			return Err(BadDnsNameError);
		}

		Ok(Self {
			service: service.to_ascii_lowercase(),
			domain: domain.to_ascii_lowercase(),
		})
	}

	#[inline(always)]
	/// The `_name._proto` part, e.g. `_ipp._tcp`.
	pub fn service(&self) -> &str {
		&self.service
	}

	#[inline(always)]
	pub fn domain(&self) -> &str {
		&self.domain
	}

	/// The fully qualified name browsed for, e.g. `_ipp._tcp.local.`
	pub fn dns_name(&self) -> Result<DnsName, BadDnsNameError> {
		dns_name_from_labels(self.service.split('.').chain(self.domain.split('.'))).map_err(|_| BadDnsNameError)
	}

	pub fn category(&self) -> ServiceCategory {
		match self.service.split('.').next().unwrap_or_default() {
			"_ipp" | "_ipps" | "_printer" | "_pdl-datastream" | "_uscan" | "_scanner" => ServiceCategory::Printer,
			"_smb" | "_afpovertcp" | "_nfs" | "_ftp" | "_webdav" | "_adisk" => ServiceCategory::FileSharing,
			"_airplay" | "_raop" | "_googlecast" | "_spotify-connect" | "_sonos" | "_daap" | "_amzn-wplay" => ServiceCategory::Media,
			"_hap" | "_matter" | "_hue" | "_mqtt" | "_esphomelib" => ServiceCategory::HomeAutomation,
			"_ssh" | "_sftp-ssh" | "_rfb" | "_rdp" => ServiceCategory::RemoteAccess,
			"_http" | "_https" => ServiceCategory::Web,
			_ => ServiceCategory::Other,
		}
	}
}
impl FromStr for ServiceType {
	type Err = BadDnsNameError;

	/// Parses `_ipp._tcp`, `_ipp._tcp.local` or `_ipp._tcp.local.`; the domain defaults to `local`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim_end_matches('.');
		let mut parts = s.splitn(3, '.');
		match (parts.next(), parts.next(), parts.next()) {
			(Some(name), Some(proto), domain) => Self::new(&format!("{name}.{proto}"), domain.unwrap_or(DEFAULT_DOMAIN)),
			_ => Err(BadDnsNameError),
		}
	}
}
impl fmt::Display for ServiceType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.service, self.domain)
	}
}

/// The built-in catalog, one entry per [`SERVICE_TYPES`] item in the `local` domain.
pub fn catalog() -> Vec<ServiceType> {
	SERVICE_TYPES
		.iter()
		.filter_map(|service| ServiceType::new(service, DEFAULT_DOMAIN).ok())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn whole_catalog_is_valid() {
		assert_eq!(catalog().len(), SERVICE_TYPES.len());
		for service_type in catalog() {
			assert!(service_type.dns_name().is_ok(), "{service_type}");
		}
	}

	#[test]
	fn parses_with_and_without_domain() {
		let short = "_ipp._tcp".parse::<ServiceType>().unwrap();
		let long = "_IPP._tcp.local.".parse::<ServiceType>().unwrap();
		assert_eq!(short, long);
		assert_eq!(short.to_string(), "_ipp._tcp.local");
		assert_eq!(short.dns_name().unwrap().to_utf8(), "_ipp._tcp.local.");
		assert_eq!(short.category(), ServiceCategory::Printer);
	}

	#[test]
	fn rejects_malformed_types() {
		for bad in ["ipp._tcp", "_ipp", "_ipp._sctp", "_._tcp", ""] {
			assert!(bad.parse::<ServiceType>().is_err(), "{bad}");
		}
	}
}
