//! Local network device discovery.
//!
//! Lantern finds devices on the local network with three independent strategies running side by side:
//!
//! * a [subnet sweep](sweep) that probes every address of the local /24 with TCP connects and ICMP echoes,
//! * [multicast DNS service discovery](mdns) that browses a [catalog](catalog) of well-known service types and resolves each instance,
//! * an [SSDP](ssdp) search that collects the replies of UPnP devices.
//!
//! Everything they find is merged into a single [`DeviceRegistry`], and a [`Scanner`] owns the lifecycle of a scan:
//! it starts the three sources, stops them when the scan window elapses, and releases every socket they opened.
//!
//! ```no_run
//! use lantern::{ScanBuilder, ScanEvent};
//! use std::time::Duration;
//!
//! let scanner = ScanBuilder::new()
//! 	.on_event(|event| {
//! 		if let ScanEvent::DeviceAdded(device) = event {
//! 			println!("Found {}", device.display_name());
//! 		}
//! 	})
//! 	.build();
//!
//! scanner.start_scan(Duration::from_secs(30)).unwrap();
//! scanner.wait().unwrap();
//! ```

use std::net::Ipv4Addr;

#[macro_use]
extern crate thiserror;

mod socket;
mod util;

pub mod catalog;
pub mod device;
pub mod errors;
pub mod event;
pub mod mdns;
pub mod net;
pub mod probe;
pub mod registry;
pub mod scan;
pub mod ssdp;
pub mod sweep;
pub mod vendor;

pub const MDNS_PORT: u16 = 5353;
pub const MDNS_V4_IP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

pub const SSDP_PORT: u16 = 1900;
pub const SSDP_V4_IP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

pub use device::{Device, DeviceField, DeviceIdentity, DeviceSource};
pub use event::ScanEvent;
pub use registry::DeviceRegistry;
pub use scan::{ScanBuilder, Scanner, StartOutcome};

pub use trust_dns_client as dns;
