use std::net::Ipv4Addr;

#[derive(Debug)]
pub struct BadDnsNameError;
impl std::fmt::Display for BadDnsNameError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("Bad DNS name")
	}
}
impl std::error::Error for BadDnsNameError {}

#[derive(Debug, Error)]
/// The local /24 could not be determined, so the subnet sweep cannot run.
pub enum SubnetError {
	#[error("I/O error while listing network interfaces: {0}")]
	IoError(#[from] std::io::Error),

	#[error("No usable IPv4 interface was found")]
	NoIpv4Interface,

	#[error("{0} is not a usable host address")]
	UnusableAddress(Ipv4Addr),
}

#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("The device registry cannot be cleared while a scan is in progress")]
	ScanInProgress,
}

#[derive(Debug, Error)]
/// A discovery source could not run (or stopped running) for this scan.
///
/// These never abort the other sources; they are logged and the source simply contributes no devices.
pub enum SourceError {
	#[error("Subnet sweep unavailable: {0}")]
	Subnet(#[from] SubnetError),

	#[error("Browsing for {service_type} failed: {error}")]
	Browse { service_type: String, error: std::io::Error },

	#[error("SSDP socket error: {0}")]
	Ssdp(std::io::Error),
}

#[derive(Debug, Error)]
/// A service instance could not be resolved to an address.
pub enum ResolveError {
	#[error("Resolution timed out")]
	TimedOut,

	#[error("{0}")]
	BadDnsName(#[from] BadDnsNameError),

	#[error("DNS packet error: {0}")]
	ProtoError(#[from] trust_dns_client::proto::error::ProtoError),

	#[error("I/O error: {0}")]
	IoError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ShutdownError {
	#[error("The scan worker thread panicked")]
	ThreadJoinError(Box<dyn std::any::Any + Send + 'static>),
}

#[derive(Debug, Error)]
pub enum ScanError {
	#[error("Failed to spawn the scan worker thread: {0}")]
	SpawnError(std::io::Error),

	#[error("{0}")]
	ShutdownError(#[from] ShutdownError),
}
