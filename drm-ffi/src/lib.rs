//!
//! Foreign function interface
//!
//! Thin, synchronous wrappers around the subset of the DRM ioctl surface
//! used for atomic modesetting: client capability negotiation, resource and
//! property enumeration, property blob lifecycle, and atomic commit. This
//! crate has no notion of device inventories, pipelines, or requests; it
//! only turns ioctl numbers and raw structs into safe Rust functions.
//!

#![warn(missing_docs)]
#![allow(unused_doc_comments)]

pub use drm_sys::{self, *};

#[macro_use]
pub(crate) mod utils;

mod ioctl;
pub mod mode;
pub mod result;

use std::{io, os::unix::io::BorrowedFd};

pub use result::SystemError;

/// Attempt to enable a client capability (atomic modesetting, universal
/// planes) on this file descriptor.
pub fn set_capability(fd: BorrowedFd<'_>, cty: u64, val: bool) -> io::Result<drm_set_client_cap> {
    let cap = drm_set_client_cap {
        capability: cty,
        value: val as u64,
    };

    unsafe {
        ioctl::set_cap(fd, &cap)?;
    }

    Ok(cap)
}
