//! Error taxonomy for the modesetting core.

use drm_ffi::SystemError;

/// Errors produced by the modesetting core.
///
/// Every fallible operation returns one of these variants rather than a
/// bare OS error code, so callers can match on failure kind instead of
/// parsing a message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device could not be opened, or the kernel could not satisfy an
    /// allocation (resource listing, property bag, blob).
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(#[source] std::io::Error),

    /// The kernel refused to enable the atomic or universal-planes client
    /// capability. Fatal for device construction.
    #[error("required capability not supported by this device: {0}")]
    CapabilityUnsupported(&'static str),

    /// `configure` was called with a connector/encoder/CRTC tuple that does
    /// not form a legal signal path, or with a mode not present in the
    /// connector's mode list.
    #[error("invalid output topology: {0}")]
    TopologyInvalid(&'static str),

    /// A property lookup by name found no matching descriptor on the
    /// target object.
    #[error("property `{0}` not found on object {1}")]
    PropertyNotFound(String, u32),

    /// The kernel rejected an atomic commit (including a negative
    /// `TEST_ONLY` result).
    #[error("atomic commit rejected: {0}")]
    CommitRejected(#[source] std::io::Error),

    /// An operation that requires a prior successful `configure` was
    /// attempted before one succeeded.
    #[error("pipeline not configured")]
    NotConfigured,

    /// A lower-level ioctl failed in a way not covered by a more specific
    /// variant above.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<SystemError> for Error {
    fn from(err: SystemError) -> Self {
        Error::Io(err.into())
    }
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;
