use trust_dns_client::{
	proto::error::ProtoResult,
	rr::{IntoName, Name as DnsName},
};

pub trait IntoDnsName: IntoName {
	fn into_fqdn(self) -> ProtoResult<DnsName> {
		let name = self.into_name()?;
		if !name.is_fqdn() {
			// Attempt to append the root label
			return name.append_name(&".".into_name()?);
		}
		Ok(name)
	}
}
impl<T: IntoName> IntoDnsName for T {}

/// Lowercased, root-terminated text form of a name, for comparing names that came off the wire.
pub fn dns_key(name: &DnsName) -> String {
	let mut key = name.to_lowercase().to_utf8();
	if !key.ends_with('.') {
		key.push('.');
	}
	key
}

/// Builds a fully qualified name from raw labels without any IDNA processing.
///
/// Service instance names are free-form UTF-8 and may contain spaces or dots, so they must never go through the
/// textual name parser.
pub fn dns_name_from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> ProtoResult<DnsName> {
	DnsName::from_labels(labels.into_iter().map(str::as_bytes))
}
