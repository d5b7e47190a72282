//! Atomic request builder and committer.
//!
//! A [`Request`] borrows the device's state mutex for its entire lifetime,
//! from creation through commit or drop. This makes "at most one live
//! atomic request per device" a type-level guarantee: the only way to get a
//! second `Request` is for the first to have already been committed or
//! dropped, since both release the guard.

use std::sync::MutexGuard;

use crate::device::{Device, MutableState};
use crate::error::{Error, Result};

bitflags::bitflags! {
    /// Flags accepted by [`Request::commit`], mirroring the kernel's
    /// `DRM_MODE_ATOMIC_*` and `DRM_MODE_PAGE_FLIP_*` bits.
    pub struct CommitFlags: u32 {
        /// Request a page-flip completion event carrying the commit's
        /// user-data value.
        const PAGE_FLIP_EVENT = drm_ffi::drm_sys::DRM_MODE_PAGE_FLIP_EVENT;
        /// Allow the flip to complete asynchronously with respect to
        /// vblank.
        const PAGE_FLIP_ASYNC = drm_ffi::drm_sys::DRM_MODE_PAGE_FLIP_ASYNC;
        /// Validate the request without applying it.
        const TEST_ONLY = drm_ffi::drm_sys::DRM_MODE_ATOMIC_TEST_ONLY;
        /// Do not block waiting for the commit to complete.
        const NONBLOCK = drm_ffi::drm_sys::DRM_MODE_ATOMIC_NONBLOCK;
        /// Permit a full mode change as part of this commit.
        const ALLOW_MODESET = drm_ffi::drm_sys::DRM_MODE_ATOMIC_ALLOW_MODESET;
    }
}

/// A pending, not-yet-submitted set of atomic property changes.
pub struct Request<'a> {
    device: &'a Device,
    guard: Option<MutexGuard<'a, MutableState>>,
    objects: Vec<u32>,
    count_props_per_object: Vec<u32>,
    props: Vec<u32>,
    values: Vec<u64>,
}

impl<'a> Request<'a> {
    /// Begin a new atomic request against `device`, locking it for the
    /// request's lifetime.
    pub fn new(device: &'a Device) -> Self {
        let guard = device.state.lock().expect("device state mutex poisoned");
        Request {
            device,
            guard: Some(guard),
            objects: Vec::new(),
            count_props_per_object: Vec::new(),
            props: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append a raw (object, property, value) triple, deduplicating
    /// against any earlier entry for the same object/property so the last
    /// write for a given pair wins.
    fn add_raw_property(&mut self, object_id: u32, prop_id: u32, value: u64) {
        let obj_pos = match self.objects.binary_search(&object_id) {
            Ok(pos) => pos,
            Err(pos) => {
                self.objects.insert(pos, object_id);
                self.count_props_per_object.insert(pos, 0);
                pos
            }
        };

        let start: usize = self.count_props_per_object[..obj_pos]
            .iter()
            .map(|&c| c as usize)
            .sum();
        let count = self.count_props_per_object[obj_pos] as usize;

        match self.props[start..start + count].binary_search(&prop_id) {
            Ok(rel) => {
                self.values[start + rel] = value;
            }
            Err(rel) => {
                self.props.insert(start + rel, prop_id);
                self.values.insert(start + rel, value);
                self.count_props_per_object[obj_pos] += 1;
            }
        }
    }

    fn guard(&self) -> &MutableState {
        self.guard.as_ref().expect("request already consumed")
    }

    /// Set a property on the currently selected connector by name.
    pub fn put_connector_property(&mut self, name: &str, value: u64) -> Result<&mut Self> {
        let selection_idx = self.guard().selection.as_ref().ok_or(Error::NotConfigured)?.connector_idx;
        let connector = &self.device.connectors()[selection_idx];
        let prop_id = connector
            .properties()
            .id_of(name)
            .ok_or_else(|| Error::PropertyNotFound(name.to_string(), connector.id()))?;
        self.add_raw_property(connector.id(), prop_id, value);
        Ok(self)
    }

    /// Set a property on the currently selected CRTC by name.
    pub fn put_crtc_property(&mut self, name: &str, value: u64) -> Result<&mut Self> {
        let selection_idx = self.guard().selection.as_ref().ok_or(Error::NotConfigured)?.crtc_idx;
        let crtc = &self.device.crtcs()[selection_idx];
        let prop_id = crtc
            .properties()
            .id_of(name)
            .ok_or_else(|| Error::PropertyNotFound(name.to_string(), crtc.id()))?;
        self.add_raw_property(crtc.id(), prop_id, value);
        Ok(self)
    }

    /// Set a property on an explicitly named plane by name.
    pub fn put_plane_property(&mut self, plane_id: u32, name: &str, value: u64) -> Result<&mut Self> {
        let plane = self
            .device
            .find_plane(plane_id)
            .ok_or_else(|| Error::PropertyNotFound(name.to_string(), plane_id))?;
        let prop_id = plane
            .properties()
            .id_of(name)
            .ok_or_else(|| Error::PropertyNotFound(name.to_string(), plane_id))?;
        self.add_raw_property(plane_id, prop_id, value);
        Ok(self)
    }

    /// Append the minimum property set needed to activate the selected
    /// pipeline (`CRTC_ID` on the connector, `MODE_ID`/`ACTIVE` on the
    /// CRTC), and OR `ALLOW_MODESET` into `flags`.
    pub fn put_modeset_properties(&mut self, flags: &mut CommitFlags) -> Result<&mut Self> {
        let (crtc_id, mode_blob_id) = {
            let state = self.guard();
            let selection = state.selection.as_ref().ok_or(Error::NotConfigured)?;
            let crtc = &self.device.crtcs()[selection.crtc_idx];
            (crtc.id(), state.mode_blob_id)
        };

        self.put_connector_property("CRTC_ID", crtc_id as u64)?;
        self.put_crtc_property("MODE_ID", mode_blob_id as u64)?;
        self.put_crtc_property("ACTIVE", 1)?;
        *flags |= CommitFlags::ALLOW_MODESET;

        Ok(self)
    }

    /// Submit the pending property set to the kernel as a single atomic
    /// transition, consuming the request and releasing the device lock
    /// regardless of outcome.
    pub fn commit(mut self, flags: CommitFlags, user_data: u64) -> Result<()> {
        let _guard = self.guard.take().expect("request already consumed");

        log::debug!(
            "committing atomic request: {} objects, {} properties, flags={:#x}",
            self.objects.len(),
            self.props.len(),
            flags.bits(),
        );

        drm_ffi::mode::atomic_commit(
            self.device.fd(),
            flags.bits(),
            &mut self.objects,
            &mut self.count_props_per_object,
            &mut self.props,
            &mut self.values,
            user_data,
        )
        .map_err(Error::CommitRejected)
    }
}

impl<'a> Drop for Request<'a> {
    fn drop(&mut self) {
        if self.guard.is_some() {
            log::trace!("discarding uncommitted atomic request ({} properties)", self.props.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_insert(req: &mut Request, triples: &[(u32, u32, u64)]) {
        for &(obj, prop, val) in triples {
            req.add_raw_property(obj, prop, val);
        }
    }

    fn fake_request<'a>(device: &'a Device) -> Request<'a> {
        Request {
            device,
            guard: Some(device.state.lock().unwrap()),
            objects: Vec::new(),
            count_props_per_object: Vec::new(),
            props: Vec::new(),
            values: Vec::new(),
        }
    }

    #[test]
    fn dedups_same_object_and_property() {
        // Two CRTC properties, one overwritten, plus one connector property
        // inserted afterward: verifies both the object-level and
        // property-level binary-search insert/overwrite paths.
        let device = crate::device::Device::test_stub();
        let mut req = fake_request(&device);

        raw_insert(&mut req, &[(10, 5, 1), (10, 3, 2), (10, 3, 9), (7, 1, 4)]);

        assert_eq!(req.objects, vec![7, 10]);
        assert_eq!(req.count_props_per_object, vec![1, 2]);
        assert_eq!(req.props, vec![1, 3, 5]);
        assert_eq!(req.values, vec![4, 9, 1]);
    }
}
