//! Manufacturer lookup and cosmetic parsing of composite service instance names.

use std::{collections::HashMap, net::Ipv6Addr};

/// Maps a 3-octet hardware address prefix (`"AA:BB:CC"`) to a vendor name.
///
/// The table itself lives outside this crate; lookups must be cheap and must not block.
pub trait ManufacturerLookup: Send + Sync {
	fn vendor(&self, oui: &str) -> Option<String>;
}
impl<F> ManufacturerLookup for F
where
	F: Fn(&str) -> Option<String> + Send + Sync,
{
	#[inline]
	fn vendor(&self, oui: &str) -> Option<String> {
		self(oui)
	}
}

#[derive(Clone, Debug, Default)]
/// An in-memory [`ManufacturerLookup`].
pub struct StaticVendorTable(HashMap<String, String>);
impl StaticVendorTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an entry; `oui` may use `:`, `-` or no separators and any case.
	pub fn insert(&mut self, oui: &str, vendor: impl Into<String>) {
		if let Some(oui) = normalize_hardware_addr(oui, 3) {
			self.0.insert(oui, vendor.into());
		}
	}
}
impl ManufacturerLookup for StaticVendorTable {
	fn vendor(&self, oui: &str) -> Option<String> {
		self.0.get(&normalize_hardware_addr(oui, 3)?).cloned()
	}
}
impl<'a> FromIterator<(&'a str, &'a str)> for StaticVendorTable {
	fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
		let mut table = Self::new();
		for (oui, vendor) in iter {
			table.insert(oui, vendor);
		}
		table
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// The pieces some devices pack into their advertised instance name.
pub struct CompositeName {
	/// What is left for humans once the encoded parts are removed.
	pub label: String,

	/// A hardware address given as `AABBCCDDEEFF@Label`, normalized to `AA:BB:CC:DD:EE:FF`.
	pub hardware_addr: Option<String>,

	/// A link-local IPv6 address embedded as dash-separated groups, e.g. `Mac-mini-fe80-0-0-0-1c2d-3e4f-5a6b-7c8d`.
	pub link_local: Option<Ipv6Addr>,
}
impl CompositeName {
	/// The vendor part (first three octets) of the hardware address.
	pub fn oui(&self) -> Option<&str> {
		self.hardware_addr.as_deref().and_then(|addr| addr.get(..8))
	}
}

/// Splits an advertised instance name into its label, hardware address and link-local address.
///
/// Nothing standardizes this encoding. It is best-effort cosmetic metadata: `@` separates a 12 hex digit hardware address
/// from the label, and a `fe80-` run of hex groups separated by `-` stands for a link-local address with `:` separators.
/// Names that don't follow either form come back as a plain label.
pub fn parse_composite_name(name: &str) -> CompositeName {
	let (hardware_addr, label) = match name.split_once('@') {
		Some((head, tail)) => match normalize_hardware_addr(head, 6) {
			Some(addr) => (Some(addr), tail),
			None => (None, name),
		},
		None => (None, name),
	};

	let (label, link_local) = match extract_link_local(label) {
		Some((start, addr)) => (label[..start].trim_end_matches(['-', ' ']), Some(addr)),
		None => (label, None),
	};

	CompositeName {
		label: label.trim().to_string(),
		hardware_addr,
		link_local,
	}
}

fn extract_link_local(label: &str) -> Option<(usize, Ipv6Addr)> {
	let start = label.to_ascii_lowercase().find("fe80-")?;
	if start > 0 && !label[..start].ends_with(['-', ' ']) {
		return None;
	}

	let encoded = label[start..]
		.split(|c: char| !(c.is_ascii_hexdigit() || c == '-'))
		.next()?
		.trim_end_matches('-');

	encoded.replace('-', ":").parse::<Ipv6Addr>().ok().map(|addr| (start, addr))
}

/// Normalizes `octets` hex octets (with or without `:`/`-` separators) to upper-case colon-separated form.
fn normalize_hardware_addr(raw: &str, octets: usize) -> Option<String> {
	let digits = raw.chars().filter(|c| !matches!(c, ':' | '-')).collect::<String>();
	if digits.len() != octets * 2 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
		return None;
	}

	let digits = digits.to_ascii_uppercase();
	Some(
		(0..octets)
			.map(|octet| &digits[octet * 2..octet * 2 + 2])
			.collect::<Vec<_>>()
			.join(":"),
	)
}
