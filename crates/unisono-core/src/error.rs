//! Error taxonomy shared by every unisono layer.
//!
//! Native engines and emulated ("faked") nodes raise the same three error
//! kinds so that call sites never need to know which one they are talking to.
//! Each kind carries the numeric code and name of the corresponding DOM
//! exception.

#[cfg(not(feature = "std"))]
use alloc::string::String;

/// Errors raised by parameters, nodes, contexts and renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The operation or argument shape is structurally impossible.
    ///
    /// Examples: an IIR coefficient array that is empty or longer than 20,
    /// frequency-response arrays of different lengths, a capability the
    /// engine does not provide.
    NotSupported(String),
    /// The arguments are well formed but illegal in the current state.
    ///
    /// Examples: a leading zero IIR coefficient, constructing a node on a
    /// closed context, rendering an offline graph twice.
    InvalidState(String),
    /// A numeric argument lies outside its defined range.
    IndexSize(String),
}

impl AudioError {
    /// Creates a [`NotSupported`](Self::NotSupported) error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// Creates an [`InvalidState`](Self::InvalidState) error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Creates an [`IndexSize`](Self::IndexSize) error.
    pub fn index_size(message: impl Into<String>) -> Self {
        Self::IndexSize(message.into())
    }

    /// Legacy numeric exception code.
    pub fn code(&self) -> u16 {
        match self {
            Self::IndexSize(_) => 1,
            Self::NotSupported(_) => 9,
            Self::InvalidState(_) => 11,
        }
    }

    /// Exception name, e.g. `"InvalidStateError"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IndexSize(_) => "IndexSizeError",
            Self::NotSupported(_) => "NotSupportedError",
            Self::InvalidState(_) => "InvalidStateError",
        }
    }

    /// The human readable message.
    pub fn message(&self) -> &str {
        match self {
            Self::NotSupported(msg) | Self::InvalidState(msg) | Self::IndexSize(msg) => msg,
        }
    }
}

impl core::fmt::Display for AudioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AudioError {}

/// Convenience result alias.
pub type Result<T> = core::result::Result<T, AudioError>;
