use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Decoded DNS-SD TXT attributes.
///
/// Each character string is one `key=value` attribute. Keys are case-insensitive and stored lowercased; values are
/// decoded as UTF-8, replacing invalid sequences. A string without `=` is a boolean attribute with an empty value. Only
/// the first occurrence of a key counts.
pub struct TxtMetadata(HashMap<String, String>);
impl TxtMetadata {
	pub fn from_strings<'a>(strings: impl IntoIterator<Item = &'a [u8]>) -> Self {
		let mut metadata = Self::default();
		metadata.extend(strings);
		metadata
	}

	/// Adds attributes from further TXT strings; keys already present keep their value.
	pub fn extend<'a>(&mut self, strings: impl IntoIterator<Item = &'a [u8]>) {
		for string in strings {
			let (key, value) = match string.iter().position(|&byte| byte == b'=') {
				Some(split) => (&string[..split], &string[split + 1..]),
				None => (string, &[][..]),
			};

			if key.is_empty() {
				continue;
			}

			self.0
				.entry(String::from_utf8_lossy(key).to_lowercase())
				.or_insert_with(|| String::from_utf8_lossy(value).into_owned());
		}
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(&key.to_lowercase()).map(String::as_str)
	}

	/// `fn`, or `n` when there is no `fn`.
	pub fn friendly_name(&self) -> Option<&str> {
		self.non_empty("fn").or_else(|| self.non_empty("n"))
	}

	pub fn model(&self) -> Option<&str> {
		self.non_empty("md")
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn into_map(self) -> HashMap<String, String> {
		self.0
	}

	fn non_empty(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str).filter(|value| !value.is_empty())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn decode(strings: &[&[u8]]) -> TxtMetadata {
		TxtMetadata::from_strings(strings.iter().copied())
	}

	#[test]
	fn well_known_keys() {
		let txt = decode(&[b"txtvers=1", b"MD=LaserJet 400", b"fn=Office Printer", b"n=Ignored"]);
		assert_eq!(txt.model(), Some("LaserJet 400"));
		assert_eq!(txt.friendly_name(), Some("Office Printer"));
		assert_eq!(txt.get("TXTVERS"), Some("1"));
		assert_eq!(txt.len(), 4);

		let txt = decode(&[b"n=Kitchen", b"fn="]);
		assert_eq!(txt.friendly_name(), Some("Kitchen"));
	}

	#[test]
	fn odd_strings() {
		let txt = decode(&[b"Duplex", b"=nokey", b"url=http://a/?x=1", b"url=second", b"md=caf\xc3\xa9 \xff"]);
		assert_eq!(txt.get("duplex"), Some(""));
		assert_eq!(txt.get("url"), Some("http://a/?x=1"));
		assert_eq!(txt.model(), Some("café \u{fffd}"));
		assert_eq!(txt.len(), 3);
		assert_eq!(txt.friendly_name(), None);
	}
}
