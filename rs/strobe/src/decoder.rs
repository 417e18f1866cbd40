use std::sync::Arc;
use std::time::Duration;

use crate::{
	CodecBackend, CodecEngine, Diagnostics, EngineError, Error, FrameDescriptor, InputFrame,
	InputStatus, MediaFormat, OutputFrame, OutputStatus, RenderTarget, Result,
};

/// No buffer became available within the timeout; poll again later.
///
/// This is a normal outcome under backpressure, not an error.
pub const TRY_AGAIN_LATER: i32 = -1;

/// The negotiated output format changed; query [Decoder::output_format].
pub const OUTPUT_FORMAT_CHANGED: i32 = -2;

/// The output buffer set changed (legacy platforms); cached views are stale.
pub const OUTPUT_BUFFERS_CHANGED: i32 = -3;

/// Lifecycle of a [Decoder].
///
/// Transitions are monotonic: Running and Stopped are visited at most once each, Stopped
/// is terminal for decoding, and Released is terminal absolutely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
	Uninitialized,
	Initialized,
	Running,
	Stopped,
	Released,
}

/// Decode-side adapter around one platform codec.
///
/// One instance per decoded track. The adapter owns the underlying codec resource
/// exclusively and exposes its pooled, tag-indexed buffer handshake: acquire an input
/// slot, fill and queue it, poll for decoded output, release every dequeued output tag
/// exactly once. Exchange calls never block beyond their timeout; negative sentinel
/// returns mean "nothing available now" and callers are expected to poll both directions
/// cooperatively.
///
/// The adapter is a single-owner object: all exchange calls take `&mut self` and there
/// is no internal locking. Escaping a stuck codec means [Decoder::release].
pub struct Decoder {
	backend: Box<dyn CodecBackend>,

	// None until initialize resolves and configures an implementation. Kept after
	// release so name() can surface the platform's released-state report.
	engine: Option<Box<dyn CodecEngine>>,

	state: DecoderState,

	// True whenever no live codec resource exists, making release() a no-op.
	released: bool,

	// Overwritten by every dequeue_output_frame; consumed via get_output_frame.
	output_descriptor: FrameDescriptor,
}

impl Decoder {
	/// Create an adapter driven by the given platform backend.
	pub fn new(backend: Box<dyn CodecBackend>) -> Self {
		Self {
			backend,
			engine: None,
			state: DecoderState::Uninitialized,
			released: true,
			output_descriptor: FrameDescriptor::default(),
		}
	}

	/// Resolve, create, and configure a codec for `format`.
	///
	/// On a capability-aware backend the registry picks the best-matching
	/// implementation; otherwise a generic implementation is instantiated from the
	/// format's mime type. `render` optionally attaches a caller-owned target that
	/// decoded buffers can be delivered to on release.
	///
	/// Every failure path tears down whatever was created first: no codec handle
	/// outlives an `initialize` error, and a later [Decoder::release] stays a safe
	/// no-op. A failed attempt leaves the adapter Uninitialized, so it may be retried.
	pub fn initialize(
		&mut self,
		format: MediaFormat,
		render: Option<Arc<dyn RenderTarget>>,
	) -> Result<()> {
		if self.state != DecoderState::Uninitialized {
			return Err(Error::InvalidState {
				op: "initialize",
				state: self.state,
			});
		}

		self.engine = None;
		self.released = true;

		let registry_state = self.backend.registry().map(|r| r.describe());
		let diagnostics = |codec: Option<String>| Diagnostics {
			format: format.clone(),
			codec,
			registry: registry_state.clone(),
		};

		// Tier one: the capability registry picks an implementation for the format.
		// Tier two: no registry on this platform revision, instantiate by mime type.
		let created = match self.backend.registry() {
			Some(registry) => registry
				.find_decoder(&format)
				.map(|name| (self.backend.create_by_name(&name), name)),
			None => format
				.mime()
				.map(|mime| (self.backend.create_by_mime(mime), mime.to_string())),
		};

		let (created, resolved) = match created {
			Some((created, resolved)) => (created, resolved),
			None => {
				// Nothing resolvable: the registry had no match, or there was no mime
				// type to fall back on.
				let err = Error::NotFound {
					context: diagnostics(None),
				};
				tracing::warn!(%err, "no decoder implementation for format");
				return Err(err);
			}
		};

		let mut engine = match created {
			Ok(engine) => engine,
			Err(source @ EngineError::Io(_)) => {
				let err = Error::FormatNotFound {
					context: diagnostics(Some(resolved)),
					source,
				};
				tracing::warn!(%err, "format rejected during codec creation");
				return Err(err);
			}
			Err(source) => {
				// Creation failed without producing a handle; nothing to tear down.
				let err = Error::Configuration {
					context: diagnostics(Some(resolved)),
					source,
				};
				tracing::warn!(%err, "codec creation failed");
				return Err(err);
			}
		};

		if let Err(source) = engine.configure(&format, render) {
			// The codec exists but refused the format. Tear it down before surfacing
			// so the handle never outlives the error.
			engine.release();

			let context = diagnostics(Some(resolved));
			let err = match source {
				EngineError::Io(_) => Error::FormatNotFound { context, source },
				_ => Error::Configuration { context, source },
			};
			tracing::warn!(%err, "codec configuration failed");
			return Err(err);
		}

		tracing::debug!(codec = %resolved, "decoder initialized");
		self.engine = Some(engine);
		self.released = false;
		self.state = DecoderState::Initialized;

		Ok(())
	}

	/// Start the codec so it begins accepting buffers.
	///
	/// A second call while Running is a no-op. Start-time failures on a configured
	/// codec indicate an internal fault, not a usage error.
	pub fn start(&mut self) -> Result<()> {
		match self.state {
			DecoderState::Running => return Ok(()),
			DecoderState::Initialized => {}
			state => return Err(Error::InvalidState { op: "start", state }),
		}

		let engine = match self.engine.as_mut() {
			Some(engine) => engine,
			None => {
				return Err(Error::InvalidState {
					op: "start",
					state: self.state,
				});
			}
		};

		if let Err(source) = engine.start() {
			tracing::warn!(%source, "codec failed to start");
			return Err(Error::Internal(source));
		}

		self.state = DecoderState::Running;
		Ok(())
	}

	/// Whether the codec is currently accepting buffers.
	pub fn is_running(&self) -> bool {
		self.state == DecoderState::Running
	}

	/// Whether no live codec resource exists, i.e. [Decoder::release] would be a no-op.
	pub fn is_released(&self) -> bool {
		self.released
	}

	/// The current lifecycle state.
	pub fn state(&self) -> DecoderState {
		self.state
	}

	/// Wait up to `timeout` for a free input slot.
	///
	/// Returns the slot tag, or [TRY_AGAIN_LATER] under backpressure.
	pub fn dequeue_input_frame(&mut self, timeout: Duration) -> Result<i32> {
		let status = self.engine_mut("dequeue_input_frame")?.dequeue_input(timeout);

		match status {
			Ok(InputStatus::Available(tag)) => Ok(tag as i32),
			Ok(InputStatus::TryAgainLater) => Ok(TRY_AGAIN_LATER),
			Err(source) => Err(Error::Internal(source)),
		}
	}

	/// Writable view of a previously dequeued input slot.
	///
	/// Negative tags (the dequeue sentinels) yield no frame. The caller fills the
	/// buffer and a [FrameDescriptor], then submits via [Decoder::queue_input_frame].
	pub fn get_input_frame(&mut self, tag: i32) -> Option<InputFrame<'_>> {
		let tag = u32::try_from(tag).ok()?;
		let buffer = self.engine.as_mut()?.input_buffer(tag)?;
		Some(InputFrame { tag, buffer })
	}

	/// Hand a filled input slot back to the codec.
	///
	/// The descriptor supplies the valid region, presentation timestamp, and flags
	/// (e.g. [crate::FrameFlags::END_OF_STREAM]). Ownership of the slot returns to the
	/// codec; nothing is buffered or validated here, the codec is the sole arbiter of
	/// tag validity.
	pub fn queue_input_frame(&mut self, tag: u32, descriptor: FrameDescriptor) -> Result<()> {
		self.engine_mut("queue_input_frame")?
			.queue_input(tag, descriptor)
			.map_err(Error::Internal)
	}

	/// Wait up to `timeout` for a decoded buffer.
	///
	/// A non-negative tag means the reusable output descriptor was captured for that
	/// buffer; consume it via [Decoder::get_output_frame] before the next dequeue.
	/// Every negative return means "no frame available now": [TRY_AGAIN_LATER],
	/// [OUTPUT_FORMAT_CHANGED] (query [Decoder::output_format]), or
	/// [OUTPUT_BUFFERS_CHANGED]. Callers that don't care may treat them uniformly.
	pub fn dequeue_output_frame(&mut self, timeout: Duration) -> Result<i32> {
		let status = self.engine_mut("dequeue_output_frame")?.dequeue_output(timeout);

		match status {
			Ok(OutputStatus::Available { tag, descriptor }) => {
				self.output_descriptor = descriptor;
				Ok(tag as i32)
			}
			Ok(OutputStatus::TryAgainLater) => Ok(TRY_AGAIN_LATER),
			Ok(OutputStatus::FormatChanged) => Ok(OUTPUT_FORMAT_CHANGED),
			Ok(OutputStatus::BuffersChanged) => Ok(OUTPUT_BUFFERS_CHANGED),
			Err(source) => Err(Error::Internal(source)),
		}
	}

	/// Read-only view of a dequeued output buffer, plus the descriptor captured when it
	/// was dequeued.
	///
	/// Negative tags (the dequeue sentinels) yield no frame.
	pub fn get_output_frame(&mut self, tag: i32) -> Option<OutputFrame<'_>> {
		let tag = u32::try_from(tag).ok()?;
		let descriptor = self.output_descriptor;
		let buffer = self.engine.as_mut()?.output_buffer(tag)?;
		Some(OutputFrame {
			tag,
			buffer,
			descriptor,
		})
	}

	/// Return an output slot to the codec's free pool.
	///
	/// Must be called exactly once for every dequeued output tag or the codec's pool
	/// starves. `render` additionally delivers the buffer to the render target supplied
	/// at initialization; without one it is ignored.
	pub fn release_output_frame(&mut self, tag: u32, render: bool) -> Result<()> {
		self.engine_mut("release_output_frame")?
			.release_output(tag, render)
			.map_err(Error::Internal)
	}

	/// The codec's negotiated output format.
	///
	/// Only meaningful after initialization or once the codec has signaled
	/// [OUTPUT_FORMAT_CHANGED], per platform semantics; callers must not assume
	/// validity before first use.
	pub fn output_format(&self) -> Result<MediaFormat> {
		self.engine_ref("output_format")?
			.output_format()
			.map_err(Error::Internal)
	}

	/// Stop the codec. No-op unless Running; resources stay allocated.
	pub fn stop(&mut self) {
		if self.state != DecoderState::Running {
			return;
		}

		if let Some(engine) = self.engine.as_mut() {
			engine.stop();
		}

		tracing::debug!("decoder stopped");
		self.state = DecoderState::Stopped;
	}

	/// Release the underlying codec resource.
	///
	/// Idempotent and infallible: safe from any state, including after a failed
	/// [Decoder::initialize], and the underlying release happens at most once.
	pub fn release(&mut self) {
		if !self.released {
			if let Some(engine) = self.engine.as_mut() {
				engine.release();
			}

			tracing::debug!("decoder released");
			self.released = true;
		}

		self.state = DecoderState::Released;
	}

	/// The resolved codec implementation's identifying name.
	///
	/// The platform reports an illegal state once the resource is released; that
	/// surfaces as [Error::Released], so stale names are never returned.
	pub fn name(&self) -> Result<String> {
		let engine = match self.engine.as_ref() {
			Some(engine) => engine,
			None => {
				return Err(Error::InvalidState {
					op: "name",
					state: self.state,
				});
			}
		};

		match engine.name() {
			Ok(name) => Ok(name),
			Err(EngineError::IllegalState(_)) => Err(Error::Released),
			Err(source) => Err(Error::Internal(source)),
		}
	}

	fn engine_mut(&mut self, op: &'static str) -> Result<&mut dyn CodecEngine> {
		if self.state == DecoderState::Released {
			return Err(Error::InvalidState { op, state: self.state });
		}

		match self.engine.as_mut() {
			Some(engine) => Ok(engine.as_mut()),
			None => Err(Error::InvalidState { op, state: self.state }),
		}
	}

	fn engine_ref(&self, op: &'static str) -> Result<&dyn CodecEngine> {
		if self.state == DecoderState::Released {
			return Err(Error::InvalidState { op, state: self.state });
		}

		match self.engine.as_ref() {
			Some(engine) => Ok(engine.as_ref()),
			None => Err(Error::InvalidState { op, state: self.state }),
		}
	}
}

#[cfg(test)]
impl Decoder {
	pub fn assert_state(&self, state: DecoderState) {
		assert_eq!(self.state, state, "unexpected lifecycle state");
	}
}
