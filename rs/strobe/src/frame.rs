use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::Timestamp;

/// Flags describing the payload of a submitted or decoded buffer.
///
/// Values match the platform codec facility so descriptors can be forwarded verbatim.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameFlags(u32);

impl FrameFlags {
	/// The buffer contains a key (sync) frame.
	pub const KEY_FRAME: Self = Self(1);

	/// The buffer contains codec initialization data, not media.
	pub const CODEC_CONFIG: Self = Self(1 << 1);

	/// The last buffer of the stream.
	pub const END_OF_STREAM: Self = Self(1 << 2);

	/// The buffer holds a partial frame; the rest follows in later buffers.
	pub const PARTIAL_FRAME: Self = Self(1 << 3);

	pub const fn empty() -> Self {
		Self(0)
	}

	pub const fn from_bits(bits: u32) -> Self {
		Self(bits)
	}

	pub const fn bits(self) -> u32 {
		self.0
	}

	pub const fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}

	pub const fn end_of_stream(self) -> bool {
		self.contains(Self::END_OF_STREAM)
	}
}

impl BitOr for FrameFlags {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self {
		Self(self.0 | rhs.0)
	}
}

impl BitOrAssign for FrameFlags {
	fn bitor_assign(&mut self, rhs: Self) {
		self.0 |= rhs.0;
	}
}

impl fmt::Debug for FrameFlags {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut list = f.debug_list();
		for (flag, name) in [
			(Self::KEY_FRAME, "KEY_FRAME"),
			(Self::CODEC_CONFIG, "CODEC_CONFIG"),
			(Self::END_OF_STREAM, "END_OF_STREAM"),
			(Self::PARTIAL_FRAME, "PARTIAL_FRAME"),
		] {
			if self.contains(flag) {
				list.entry(&name);
			}
		}
		list.finish()
	}
}

/// Metadata describing the valid region and timing of a buffer.
///
/// Callers fill one in before submitting input; the adapter captures one per dequeued
/// output buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameDescriptor {
	/// Byte offset of the valid region within the buffer.
	pub offset: usize,

	/// Byte length of the valid region.
	pub size: usize,

	/// Presentation timestamp.
	pub timestamp: Timestamp,

	/// Payload flags, e.g. end-of-stream.
	pub flags: FrameFlags,
}

/// A writable view of a free input slot.
///
/// Valid until the matching [crate::Decoder::queue_input_frame]; the borrow on the
/// adapter ends the view before the slot can be handed back, so a submitted buffer can
/// never be touched again.
#[derive(Debug)]
pub struct InputFrame<'a> {
	/// The slot index assigned by the codec.
	pub tag: u32,

	/// Codec-pooled memory to write the compressed payload into.
	pub buffer: &'a mut [u8],
}

/// A decoded buffer claimed from the codec.
///
/// Valid until the matching [crate::Decoder::release_output_frame].
#[derive(Debug)]
pub struct OutputFrame<'a> {
	/// The slot index assigned by the codec.
	pub tag: u32,

	/// Codec-pooled memory holding the decoded payload.
	pub buffer: &'a [u8],

	/// The descriptor captured when this buffer was dequeued.
	pub descriptor: FrameDescriptor,
}

impl OutputFrame<'_> {
	/// The valid region of the buffer, as delimited by the descriptor.
	pub fn payload(&self) -> &[u8] {
		let end = self.descriptor.offset.saturating_add(self.descriptor.size);
		self.buffer.get(self.descriptor.offset..end).unwrap_or(&[])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_flag_composition() {
		let flags = FrameFlags::KEY_FRAME | FrameFlags::END_OF_STREAM;
		assert!(flags.contains(FrameFlags::KEY_FRAME));
		assert!(flags.end_of_stream());
		assert!(!flags.contains(FrameFlags::CODEC_CONFIG));
		assert_eq!(flags.bits(), 0b101);
	}

	#[test]
	fn test_empty_contains_nothing() {
		let flags = FrameFlags::empty();
		assert!(!flags.contains(FrameFlags::KEY_FRAME));
		assert!(!flags.end_of_stream());

		// Everything contains the empty set.
		assert!(flags.contains(FrameFlags::empty()));
	}

	#[test]
	fn test_output_payload_respects_descriptor() {
		let data = [0u8, 1, 2, 3, 4, 5];
		let frame = OutputFrame {
			tag: 0,
			buffer: &data,
			descriptor: FrameDescriptor {
				offset: 2,
				size: 3,
				..Default::default()
			},
		};
		assert_eq!(frame.payload(), &[2, 3, 4]);
	}

	#[test]
	fn test_output_payload_clamps_out_of_bounds() {
		let data = [0u8; 4];
		let frame = OutputFrame {
			tag: 0,
			buffer: &data,
			descriptor: FrameDescriptor {
				offset: 2,
				size: 100,
				..Default::default()
			},
		};
		assert_eq!(frame.payload(), &[] as &[u8]);
	}
}
