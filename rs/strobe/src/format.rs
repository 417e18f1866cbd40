use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

/// A typed value in a [MediaFormat].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormatValue {
	Str(String),
	Int(i64),
	Float(f64),
	Bytes(Bytes),
}

/// Opaque key/value codec configuration.
///
/// Produced by an upstream format-extraction step; the only contract is that a mime type
/// is present under [MediaFormat::KEY_MIME]. Everything else is codec-specific and passed
/// through to the engine untouched.
///
/// We use a BTreeMap so keys are sorted alphabetically for deterministic diagnostics.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaFormat {
	entries: BTreeMap<String, FormatValue>,
}

impl MediaFormat {
	/// The mime type of the track, e.g. `video/avc`.
	pub const KEY_MIME: &'static str = "mime";

	/// Frame width in pixels (video).
	pub const KEY_WIDTH: &'static str = "width";

	/// Frame height in pixels (video).
	pub const KEY_HEIGHT: &'static str = "height";

	/// Pixel format of raw video output, e.g. `YUV420P`.
	pub const KEY_PIXEL_FORMAT: &'static str = "pixel-format";

	/// Sample rate in Hz (audio).
	pub const KEY_SAMPLE_RATE: &'static str = "sample-rate";

	/// Number of interleaved channels (audio).
	pub const KEY_CHANNEL_COUNT: &'static str = "channel-count";

	/// Sample encoding of raw audio output, e.g. `F32`.
	pub const KEY_PCM_ENCODING: &'static str = "pcm-encoding";

	/// Codec-specific initialization data (e.g. SPS/PPS for H.264).
	pub const KEY_CODEC_DATA: &'static str = "codec-data";

	pub fn new(mime: &str) -> Self {
		let mut format = Self::default();
		format.set_str(Self::KEY_MIME, mime);
		format
	}

	/// The mandatory mime type, if the upstream extractor actually provided one.
	pub fn mime(&self) -> Option<&str> {
		self.get_str(Self::KEY_MIME)
	}

	pub fn set_str(&mut self, key: &str, value: &str) {
		self.entries.insert(key.to_string(), FormatValue::Str(value.to_string()));
	}

	pub fn get_str(&self, key: &str) -> Option<&str> {
		match self.entries.get(key) {
			Some(FormatValue::Str(value)) => Some(value),
			_ => None,
		}
	}

	pub fn set_int(&mut self, key: &str, value: i64) {
		self.entries.insert(key.to_string(), FormatValue::Int(value));
	}

	pub fn get_int(&self, key: &str) -> Option<i64> {
		match self.entries.get(key) {
			Some(FormatValue::Int(value)) => Some(*value),
			_ => None,
		}
	}

	pub fn set_float(&mut self, key: &str, value: f64) {
		self.entries.insert(key.to_string(), FormatValue::Float(value));
	}

	pub fn get_float(&self, key: &str) -> Option<f64> {
		match self.entries.get(key) {
			Some(FormatValue::Float(value)) => Some(*value),
			_ => None,
		}
	}

	pub fn set_bytes(&mut self, key: &str, value: Bytes) {
		self.entries.insert(key.to_string(), FormatValue::Bytes(value));
	}

	pub fn get_bytes(&self, key: &str) -> Option<&Bytes> {
		match self.entries.get(key) {
			Some(FormatValue::Bytes(value)) => Some(value),
			_ => None,
		}
	}

	pub fn contains(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &FormatValue)> {
		self.entries.iter().map(|(key, value)| (key.as_str(), value))
	}
}

impl fmt::Display for MediaFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut first = true;
		for (key, value) in &self.entries {
			if !first {
				write!(f, " ")?;
			}
			first = false;

			match value {
				FormatValue::Str(value) => write!(f, "{key}={value}")?,
				FormatValue::Int(value) => write!(f, "{key}={value}")?,
				FormatValue::Float(value) => write!(f, "{key}={value}")?,
				FormatValue::Bytes(value) => write!(f, "{key}=<{} bytes>", value.len())?,
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_mime_is_just_another_entry() {
		let format = MediaFormat::new("video/avc");
		assert_eq!(format.mime(), Some("video/avc"));
		assert_eq!(format.get_str(MediaFormat::KEY_MIME), Some("video/avc"));

		assert_eq!(MediaFormat::default().mime(), None);
	}

	#[test]
	fn test_typed_accessors_do_not_coerce() {
		let mut format = MediaFormat::new("audio/opus");
		format.set_int(MediaFormat::KEY_SAMPLE_RATE, 48_000);

		assert_eq!(format.get_int(MediaFormat::KEY_SAMPLE_RATE), Some(48_000));
		assert_eq!(format.get_str(MediaFormat::KEY_SAMPLE_RATE), None);
		assert_eq!(format.get_float(MediaFormat::KEY_SAMPLE_RATE), None);
	}

	#[test]
	fn test_display_is_deterministic() {
		let mut format = MediaFormat::new("video/avc");
		format.set_int(MediaFormat::KEY_WIDTH, 1920);
		format.set_bytes(MediaFormat::KEY_CODEC_DATA, Bytes::from_static(&[0, 1, 2]));

		assert_eq!(format.to_string(), "codec-data=<3 bytes> mime=video/avc width=1920");
	}
}
