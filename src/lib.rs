//!
//! Atomic KMS modesetting core.
//!
//! This crate opens a Direct Rendering Manager primary node, enumerates its
//! connectors, encoders, CRTCs, and planes (caching every object's property
//! bag), lets a caller select a coherent output pipeline, and builds and
//! submits atomic property-delta requests against that pipeline.
//!
//! Buffer allocation, rendering, event-loop integration, and legacy
//! (non-atomic) modesetting are explicitly out of scope; this crate only
//! speaks the atomic subset of the DRM ioctl surface.
//!

#![warn(missing_docs)]

mod device;
mod error;
mod pipeline;
mod request;

pub use device::{
    ConnectionState, Connector, Crtc, Device, Encoder, Mode, Plane, PlaneType, PropertyBag,
    PropertyDescriptor,
};
pub use error::{Error, Result};
pub use request::{CommitFlags, Request};
