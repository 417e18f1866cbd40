//! FFmpeg-backed codec engines.
//!
//! A software backend implementing the buffer-exchange contract over `ffmpeg-next`, for
//! hosts without a platform codec service. The pooled, tag-indexed handshake that a
//! hardware facility provides natively is emulated here: a fixed set of input slots is
//! handed out to the caller, queued payloads are pushed through the decoder
//! synchronously, and decoded frames are staged in a bounded output slot pool until the
//! caller releases them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use ffmpeg_next as ffmpeg;

use crate::{
	CodecBackend, CodecEngine, CodecRegistry, EngineError, FrameDescriptor, FrameFlags,
	InputStatus, MediaFormat, OutputStatus, RenderTarget, Timestamp,
};

/// Number of pooled input slots handed out to the caller.
const INPUT_SLOTS: usize = 4;

/// Capacity of each input slot, sized for one compressed frame.
const INPUT_SLOT_SIZE: usize = 1 << 20;

/// Number of pooled output slots.
const OUTPUT_SLOTS: usize = 8;

/// Mime types this backend resolves, in the naming the platform facility uses.
const MIME_TABLE: &[(&str, ffmpeg::codec::Id)] = &[
	("video/avc", ffmpeg::codec::Id::H264),
	("video/hevc", ffmpeg::codec::Id::HEVC),
	("video/x-vnd.on2.vp8", ffmpeg::codec::Id::VP8),
	("video/x-vnd.on2.vp9", ffmpeg::codec::Id::VP9),
	("video/av01", ffmpeg::codec::Id::AV1),
	("audio/mp4a-latm", ffmpeg::codec::Id::AAC),
	("audio/opus", ffmpeg::codec::Id::OPUS),
	("audio/mpeg", ffmpeg::codec::Id::MP3),
	("audio/flac", ffmpeg::codec::Id::FLAC),
	("audio/vorbis", ffmpeg::codec::Id::VORBIS),
];

fn codec_id_for_mime(mime: &str) -> Option<ffmpeg::codec::Id> {
	MIME_TABLE
		.iter()
		.find(|(known, _)| *known == mime)
		.map(|(_, id)| *id)
}

fn init() -> Result<(), EngineError> {
	// Idempotent; just registers codecs and formats.
	ffmpeg::init().map_err(|e| EngineError::Io(format!("ffmpeg init failed: {e}")))
}

/// Capability registry backed by FFmpeg's codec tables.
pub struct FfmpegRegistry;

impl CodecRegistry for FfmpegRegistry {
	fn find_decoder(&self, format: &MediaFormat) -> Option<String> {
		init().ok()?;

		let mime = format.mime()?;
		let id = codec_id_for_mime(mime)?;
		let codec = ffmpeg::codec::decoder::find(id)?;
		Some(codec.name().to_string())
	}

	fn describe(&self) -> String {
		format!("ffmpeg codec tables ({} mime mappings)", MIME_TABLE.len())
	}
}

/// Platform backend producing FFmpeg software engines.
pub struct FfmpegBackend {
	registry: Option<FfmpegRegistry>,
}

impl FfmpegBackend {
	/// Backend with the capability registry available.
	pub fn new() -> Self {
		Self {
			registry: Some(FfmpegRegistry),
		}
	}

	/// Backend without a registry, forcing the adapter's mime-type fallback.
	pub fn without_registry() -> Self {
		Self { registry: None }
	}

	fn engine(name: &str, medium: ffmpeg::media::Type) -> Result<Box<dyn CodecEngine>, EngineError> {
		match medium {
			ffmpeg::media::Type::Video => Ok(Box::new(FfmpegEngine::new(name.to_string(), true))),
			ffmpeg::media::Type::Audio => Ok(Box::new(FfmpegEngine::new(name.to_string(), false))),
			_ => Err(EngineError::Io(format!("{name} is not an audio or video codec"))),
		}
	}
}

impl Default for FfmpegBackend {
	fn default() -> Self {
		Self::new()
	}
}

impl CodecBackend for FfmpegBackend {
	fn registry(&self) -> Option<&dyn CodecRegistry> {
		self.registry.as_ref().map(|r| r as &dyn CodecRegistry)
	}

	fn create_by_name(&self, name: &str) -> Result<Box<dyn CodecEngine>, EngineError> {
		init()?;

		let codec = ffmpeg::codec::decoder::find_by_name(name)
			.ok_or_else(|| EngineError::Io(format!("no ffmpeg decoder named {name}")))?;
		Self::engine(codec.name(), codec.medium())
	}

	fn create_by_mime(&self, mime: &str) -> Result<Box<dyn CodecEngine>, EngineError> {
		init()?;

		let id = codec_id_for_mime(mime)
			.ok_or_else(|| EngineError::Io(format!("no decoder for mime type {mime}")))?;
		let codec = ffmpeg::codec::decoder::find(id)
			.ok_or_else(|| EngineError::Io(format!("ffmpeg has no decoder for {mime}")))?;
		Self::engine(codec.name(), codec.medium())
	}
}

enum Opened {
	Video(ffmpeg::decoder::Video),
	Audio(ffmpeg::decoder::Audio),
}

impl Opened {
	fn send_packet(&mut self, packet: &ffmpeg::codec::packet::Packet) -> Result<(), ffmpeg::Error> {
		match self {
			Self::Video(video) => video.send_packet(packet),
			Self::Audio(audio) => audio.send_packet(packet),
		}
	}

	fn send_eof(&mut self) -> Result<(), ffmpeg::Error> {
		match self {
			Self::Video(video) => video.send_eof(),
			Self::Audio(audio) => audio.send_eof(),
		}
	}
}

/// One decoded frame staged for the caller.
struct OutputSlot {
	data: Vec<u8>,
	descriptor: FrameDescriptor,
}

/// Signals staged for the caller, oldest first.
enum Ready {
	FormatChanged,
	Buffer(u32),
}

/// Software codec engine over one FFmpeg decoder.
pub struct FfmpegEngine {
	codec_name: String,
	video: bool,

	// None until configure, None again after release.
	decoder: Option<Opened>,
	render: Option<Arc<dyn RenderTarget>>,
	started: bool,
	released: bool,

	input_free: VecDeque<u32>,
	input_dequeued: Vec<bool>,
	input_buffers: Vec<Vec<u8>>,

	// Decoded frames waiting for a free output slot.
	pending: VecDeque<OutputSlot>,
	output_free: VecDeque<u32>,
	output_slots: Vec<Option<OutputSlot>>,
	ready: VecDeque<Ready>,

	negotiated: Option<MediaFormat>,
}

impl FfmpegEngine {
	fn new(codec_name: String, video: bool) -> Self {
		Self {
			codec_name,
			video,
			decoder: None,
			render: None,
			started: false,
			released: false,
			input_free: (0..INPUT_SLOTS as u32).collect(),
			input_dequeued: vec![false; INPUT_SLOTS],
			input_buffers: vec![vec![0; INPUT_SLOT_SIZE]; INPUT_SLOTS],
			pending: VecDeque::new(),
			output_free: (0..OUTPUT_SLOTS as u32).collect(),
			output_slots: (0..OUTPUT_SLOTS).map(|_| None).collect(),
			ready: VecDeque::new(),
			negotiated: None,
		}
	}

	/// Move pending frames into free output slots, oldest first.
	fn promote(&mut self) {
		while !self.pending.is_empty() {
			let Some(tag) = self.output_free.pop_front() else { break };
			let Some(slot) = self.pending.pop_front() else {
				self.output_free.push_front(tag);
				break;
			};

			self.output_slots[tag as usize] = Some(slot);
			self.ready.push_back(Ready::Buffer(tag));
		}
	}

	/// Record the negotiated output format, signaling the caller on change.
	fn negotiate(&mut self, format: MediaFormat) {
		if self.negotiated.as_ref() == Some(&format) {
			return;
		}

		self.negotiated = Some(format);
		self.ready.push_back(Ready::FormatChanged);
	}

	fn stage_video(&mut self, decoded: &ffmpeg::frame::Video) {
		let mut format = MediaFormat::new("video/raw");
		format.set_int(MediaFormat::KEY_WIDTH, decoded.width() as i64);
		format.set_int(MediaFormat::KEY_HEIGHT, decoded.height() as i64);
		format.set_str(MediaFormat::KEY_PIXEL_FORMAT, &format!("{:?}", decoded.format()));
		self.negotiate(format);

		// Concatenate the planes (Y, U, V for planar formats; one plane when packed).
		let planes = decoded.planes();
		let mut data = Vec::new();
		for plane in 0..planes {
			data.extend_from_slice(decoded.data(plane));
		}

		let descriptor = FrameDescriptor {
			offset: 0,
			size: data.len(),
			timestamp: Timestamp::from_micros(decoded.pts().unwrap_or(0).max(0) as u64),
			flags: FrameFlags::empty(),
		};

		self.pending.push_back(OutputSlot { data, descriptor });
	}

	fn stage_audio(&mut self, decoded: &ffmpeg::frame::Audio) {
		let mut format = MediaFormat::new("audio/raw");
		format.set_int(MediaFormat::KEY_SAMPLE_RATE, decoded.rate() as i64);
		format.set_int(MediaFormat::KEY_CHANNEL_COUNT, decoded.channels() as i64);
		format.set_str(MediaFormat::KEY_PCM_ENCODING, &format!("{:?}", decoded.format()));
		self.negotiate(format);

		// FFmpeg may use planar format (one plane per channel) or packed format.
		let channels = decoded.channels() as usize;
		let sample_size = sample_size(decoded.format());
		let data = if decoded.is_planar() && channels > 1 && sample_size > 0 {
			// Interleave the channel planes.
			let samples = decoded.samples();
			let mut interleaved = Vec::with_capacity(samples * channels * sample_size);

			for sample in 0..samples {
				for channel in 0..channels {
					let plane = decoded.data(channel);
					let offset = sample * sample_size;
					interleaved.extend_from_slice(&plane[offset..offset + sample_size]);
				}
			}

			interleaved
		} else {
			decoded.data(0).to_vec()
		};

		let descriptor = FrameDescriptor {
			offset: 0,
			size: data.len(),
			timestamp: Timestamp::from_micros(decoded.pts().unwrap_or(0).max(0) as u64),
			flags: FrameFlags::empty(),
		};

		self.pending.push_back(OutputSlot { data, descriptor });
	}

	/// Pull every frame the decoder has ready and stage it for the caller.
	fn drain(&mut self) {
		enum Staged {
			Video(ffmpeg::frame::Video),
			Audio(ffmpeg::frame::Audio),
		}

		loop {
			let staged = {
				let Some(decoder) = self.decoder.as_mut() else { break };

				match decoder {
					Opened::Video(video) => {
						let mut decoded = ffmpeg::frame::Video::empty();
						if video.receive_frame(&mut decoded).is_err() {
							break;
						}
						Staged::Video(decoded)
					}
					Opened::Audio(audio) => {
						let mut decoded = ffmpeg::frame::Audio::empty();
						if audio.receive_frame(&mut decoded).is_err() {
							break;
						}
						Staged::Audio(decoded)
					}
				}
			};

			match staged {
				Staged::Video(decoded) => self.stage_video(&decoded),
				Staged::Audio(decoded) => self.stage_audio(&decoded),
			}
		}

		self.promote();
	}
}

impl CodecEngine for FfmpegEngine {
	fn configure(
		&mut self,
		format: &MediaFormat,
		render: Option<Arc<dyn RenderTarget>>,
	) -> Result<(), EngineError> {
		if self.decoder.is_some() {
			return Err(EngineError::IllegalState("codec already configured".into()));
		}

		let codec = ffmpeg::codec::decoder::find_by_name(&self.codec_name)
			.ok_or_else(|| EngineError::Io(format!("ffmpeg decoder {} disappeared", self.codec_name)))?;

		let context = ffmpeg::codec::context::Context::new_with_codec(codec);
		let opened = if self.video {
			let mut video = context
				.decoder()
				.video()
				.map_err(|e| EngineError::Io(format!("not a video codec: {e}")))?;

			if let Some(data) = format.get_bytes(MediaFormat::KEY_CODEC_DATA) {
				unsafe { set_extradata(video.as_mut_ptr(), data) };
			}

			Opened::Video(video)
		} else {
			let mut audio = context
				.decoder()
				.audio()
				.map_err(|e| EngineError::Io(format!("not an audio codec: {e}")))?;

			if let Some(data) = format.get_bytes(MediaFormat::KEY_CODEC_DATA) {
				unsafe { set_extradata(audio.as_mut_ptr(), data) };
			}

			Opened::Audio(audio)
		};

		tracing::debug!(codec = %self.codec_name, %format, "ffmpeg engine configured");

		self.decoder = Some(opened);
		self.render = render;

		// Until the first frame negotiates the real output, report the configured
		// format; the caller sees a FormatChanged signal once decoding starts.
		self.negotiated = Some(format.clone());

		Ok(())
	}

	fn start(&mut self) -> Result<(), EngineError> {
		if self.decoder.is_none() {
			return Err(EngineError::IllegalState("codec is not configured".into()));
		}

		self.started = true;
		Ok(())
	}

	fn stop(&mut self) {
		self.started = false;
	}

	fn release(&mut self) {
		self.decoder = None;
		self.render = None;
		self.started = false;
		self.released = true;
	}

	fn name(&self) -> Result<String, EngineError> {
		if self.released {
			return Err(EngineError::IllegalState("codec is released".into()));
		}

		Ok(self.codec_name.clone())
	}

	fn dequeue_input(&mut self, _timeout: Duration) -> Result<InputStatus, EngineError> {
		if !self.started {
			return Err(EngineError::IllegalState("codec is not running".into()));
		}

		// Decode work happens synchronously in queue_input, so a slot that is busy now
		// will not free up by waiting out the timeout.
		match self.input_free.pop_front() {
			Some(tag) => {
				self.input_dequeued[tag as usize] = true;
				Ok(InputStatus::Available(tag))
			}
			None => Ok(InputStatus::TryAgainLater),
		}
	}

	fn input_buffer(&mut self, tag: u32) -> Option<&mut [u8]> {
		if !*self.input_dequeued.get(tag as usize)? {
			return None;
		}

		Some(&mut self.input_buffers[tag as usize])
	}

	fn queue_input(&mut self, tag: u32, descriptor: FrameDescriptor) -> Result<(), EngineError> {
		let index = tag as usize;
		if !self.input_dequeued.get(index).copied().unwrap_or(false) {
			return Err(EngineError::IllegalState(format!("input slot {tag} was not dequeued")));
		}

		let end = descriptor
			.offset
			.checked_add(descriptor.size)
			.filter(|end| *end <= self.input_buffers[index].len())
			.ok_or_else(|| EngineError::Other(format!("descriptor out of bounds for slot {tag}")))?;

		if descriptor.size > 0 {
			let payload = &self.input_buffers[index][descriptor.offset..end];
			let mut packet = ffmpeg::codec::packet::Packet::copy(payload);
			packet.set_pts(Some(descriptor.timestamp.as_micros() as i64));

			let decoder = self
				.decoder
				.as_mut()
				.ok_or_else(|| EngineError::IllegalState("codec is not configured".into()))?;
			decoder
				.send_packet(&packet)
				.map_err(|e| EngineError::Other(format!("send_packet failed: {e}")))?;
		}

		if descriptor.flags.end_of_stream() {
			let decoder = self
				.decoder
				.as_mut()
				.ok_or_else(|| EngineError::IllegalState("codec is not configured".into()))?;
			decoder
				.send_eof()
				.map_err(|e| EngineError::Other(format!("send_eof failed: {e}")))?;
		}

		self.input_dequeued[index] = false;
		self.input_free.push_back(tag);

		self.drain();

		if descriptor.flags.end_of_stream() {
			// Mirror the platform facility: end-of-stream rides out on a final,
			// empty output buffer after the last decoded frame.
			self.pending.push_back(OutputSlot {
				data: Vec::new(),
				descriptor: FrameDescriptor {
					offset: 0,
					size: 0,
					timestamp: descriptor.timestamp,
					flags: FrameFlags::END_OF_STREAM,
				},
			});
			self.promote();
		}

		Ok(())
	}

	fn dequeue_output(&mut self, _timeout: Duration) -> Result<OutputStatus, EngineError> {
		if !self.started {
			return Err(EngineError::IllegalState("codec is not running".into()));
		}

		match self.ready.pop_front() {
			Some(Ready::FormatChanged) => Ok(OutputStatus::FormatChanged),
			Some(Ready::Buffer(tag)) => {
				let descriptor = self.output_slots[tag as usize]
					.as_ref()
					.map(|slot| slot.descriptor)
					.unwrap_or_default();
				Ok(OutputStatus::Available { tag, descriptor })
			}
			None => Ok(OutputStatus::TryAgainLater),
		}
	}

	fn output_buffer(&mut self, tag: u32) -> Option<&[u8]> {
		self.output_slots
			.get(tag as usize)?
			.as_ref()
			.map(|slot| slot.data.as_slice())
	}

	fn release_output(&mut self, tag: u32, render: bool) -> Result<(), EngineError> {
		let slot = self
			.output_slots
			.get_mut(tag as usize)
			.and_then(Option::take)
			.ok_or_else(|| EngineError::IllegalState(format!("output slot {tag} was not dequeued")))?;

		if render {
			if let Some(target) = &self.render {
				target.render(&slot.data, &slot.descriptor);
			}
		}

		self.output_free.push_back(tag);
		self.promote();
		Ok(())
	}

	fn output_format(&self) -> Result<MediaFormat, EngineError> {
		self.negotiated
			.clone()
			.ok_or_else(|| EngineError::IllegalState("output format not negotiated".into()))
	}
}

/// Install codec-specific initialization data before the first packet.
///
/// # Safety
///
/// `context` must point to a live, not-yet-opened codec context.
unsafe fn set_extradata(context: *mut ffmpeg::sys::AVCodecContext, data: &[u8]) {
	unsafe {
		(*context).extradata = ffmpeg::sys::av_malloc(data.len()) as *mut u8;
		(*context).extradata_size = data.len() as i32;
		std::ptr::copy_nonoverlapping(data.as_ptr(), (*context).extradata, data.len());
	}
}

fn sample_size(format: ffmpeg::format::Sample) -> usize {
	use ffmpeg::format::Sample;
	match format {
		Sample::U8(_) => 1,
		Sample::I16(_) => 2,
		Sample::I32(_) => 4,
		Sample::I64(_) => 8,
		Sample::F32(_) => 4,
		Sample::F64(_) => 8,
		Sample::None => 0,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_mime_mapping() {
		assert_eq!(codec_id_for_mime("video/avc"), Some(ffmpeg::codec::Id::H264));
		assert_eq!(codec_id_for_mime("audio/opus"), Some(ffmpeg::codec::Id::OPUS));
		assert_eq!(codec_id_for_mime("video/unknown"), None);
	}

	#[test]
	fn test_registry_resolves_avc() {
		let registry = FfmpegRegistry;
		let name = registry.find_decoder(&MediaFormat::new("video/avc"));
		assert!(name.is_some(), "ffmpeg build is missing an H.264 decoder");
	}

	#[test]
	fn test_registry_misses_unknown_mime() {
		let registry = FfmpegRegistry;
		assert_eq!(registry.find_decoder(&MediaFormat::new("video/unknown")), None);
	}

	#[test]
	fn test_create_by_unknown_mime_is_io() {
		let backend = FfmpegBackend::new();
		let err = backend.create_by_mime("video/unknown").unwrap_err();
		assert!(matches!(err, EngineError::Io(_)), "got {err:?}");
	}
}
