use lantern::{vendor::StaticVendorTable, Device, ScanBuilder, ScanEvent};
use std::time::Duration;

fn describe(device: &Device) -> String {
	let mut description = format!("{} ({})", device.display_name(), device.source());
	if let Some(addr) = device.address() {
		match device.port() {
			Some(port) => description.push_str(&format!(" at {addr}:{port}")),
			None => description.push_str(&format!(" at {addr}")),
		}
	}
	if let Some(vendor) = device.vendor() {
		description.push_str(&format!(", made by {vendor}"));
	}
	description
}

fn main() {
	simple_logger::SimpleLogger::new().with_level(log::LevelFilter::Info).init().unwrap();

	let vendors = [("B8:27:EB", "Raspberry Pi Foundation"), ("00:17:88", "Philips Lighting"), ("F0:9F:C2", "Ubiquiti")]
		.into_iter()
		.collect::<StaticVendorTable>();

	let scanner = ScanBuilder::new()
		.vendors(vendors)
		.on_event(|event| match event {
			ScanEvent::DeviceAdded(device) => println!("Found {}", describe(&device)),

			ScanEvent::DeviceUpdated { device, field } => println!("Updated {field:?} of {}", describe(&device)),

			ScanEvent::SweepFinished(summary) => println!(
				"Swept {}0/24: {} of {} hosts answered",
				summary.prefix, summary.active, summary.probed
			),

			ScanEvent::ScanFinished { elapsed } => println!("Done after {:.1}s", elapsed.as_secs_f64()),

			ScanEvent::ScanStarted { .. } | ScanEvent::SourceStopped(_) => {}
		})
		.build();

	scanner.start_scan(Duration::from_secs(15)).unwrap();
	scanner.wait().unwrap();

	println!();
	for device in scanner.devices() {
		println!("{}", describe(&device));
	}
}
