use crate::{CodecEngine, EngineError, MediaFormat};

/// Capability query resolving a decoder implementation for a format.
///
/// Present on platform revisions that can enumerate their codecs; absent on older ones,
/// where the adapter falls back to instantiation by mime type.
pub trait CodecRegistry: Send {
	/// The best-matching decoder implementation name for the format, if any.
	fn find_decoder(&self, format: &MediaFormat) -> Option<String>;

	/// Human-readable registry state, included in failure diagnostics.
	fn describe(&self) -> String;
}

/// The platform strategy injected into [crate::Decoder] at construction.
///
/// Owns implementation resolution and engine instantiation. The two-tier selection
/// policy (capability registry vs. mime-type fallback) is decided by whether
/// [Self::registry] returns one, so the adapter stays decoupled from any particular
/// platform-versioning scheme.
pub trait CodecBackend: Send {
	/// The capability registry, if this platform revision has one.
	fn registry(&self) -> Option<&dyn CodecRegistry>;

	/// Instantiate a specific implementation by registry name.
	fn create_by_name(&self, name: &str) -> Result<Box<dyn CodecEngine>, EngineError>;

	/// Instantiate a generic implementation for a mime type.
	fn create_by_mime(&self, mime: &str) -> Result<Box<dyn CodecEngine>, EngineError>;
}
