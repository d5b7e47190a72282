use std::fmt;

use nix::errno::Errno;

/// An error caused by the underlying system call failing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SystemError {
    /// Invalid file descriptor given.
    InvalidFileDescriptor,
    /// Invalid pointer given.
    MemoryFault,
    /// Invalid value given.
    InvalidArgument,
    /// Given file descriptor is not for the right kind of device.
    InvalidFileType,
    /// Attempted to write to a read-only resource, or read a write-only one.
    PermissionDenied,
    /// Unknown DRM fourcc code.
    UnknownFourcc,
    /// Unknown system error.
    Unknown {
        /// The underlying errno
        errno: Errno,
    },
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemError::InvalidFileDescriptor => write!(f, "invalid file descriptor"),
            SystemError::MemoryFault => write!(f, "memory fault"),
            SystemError::InvalidArgument => write!(f, "invalid argument"),
            SystemError::InvalidFileType => write!(f, "invalid file type"),
            SystemError::PermissionDenied => write!(f, "permission denied"),
            SystemError::UnknownFourcc => write!(f, "unknown fourcc code"),
            SystemError::Unknown { errno } => write!(f, "unknown error: {errno}"),
        }
    }
}

impl std::error::Error for SystemError {}

impl From<Errno> for SystemError {
    fn from(errno: Errno) -> Self {
        match errno {
            Errno::EBADF => SystemError::InvalidFileDescriptor,
            Errno::EFAULT => SystemError::MemoryFault,
            Errno::EINVAL => SystemError::InvalidArgument,
            Errno::ENOTTY => SystemError::InvalidFileDescriptor,
            Errno::EACCES => SystemError::PermissionDenied,
            _ => SystemError::Unknown { errno },
        }
    }
}

impl From<SystemError> for std::io::Error {
    fn from(err: SystemError) -> Self {
        match err {
            SystemError::Unknown { errno } => std::io::Error::from(errno),
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}
