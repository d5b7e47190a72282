//! Device inventory: opens a DRM node, negotiates atomic capabilities, and
//! enumerates every connector, encoder, CRTC, and plane along with their
//! cached property bags.

use std::os::raw::c_char;
use std::os::unix::io::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;
use std::sync::Mutex;

use drm_ffi::drm_sys::{
    drm_mode_modeinfo, DRM_CLIENT_CAP_ATOMIC, DRM_CLIENT_CAP_UNIVERSAL_PLANES,
    DRM_MODE_OBJECT_CONNECTOR, DRM_MODE_OBJECT_CRTC, DRM_MODE_OBJECT_ENCODER,
    DRM_MODE_OBJECT_PLANE,
};
use drm_fourcc::DrmFourcc;

use crate::error::{Error, Result};

fn cstr_to_string(buf: &[c_char]) -> String {
    buf.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as u8 as char)
        .collect()
}

/// A single named, typed property on a DRM object.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    id: u32,
    name: String,
    flags: u32,
    values: Vec<u64>,
    enums: Vec<(String, u64)>,
}

impl PropertyDescriptor {
    /// The kernel's property ID.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The property's DRM name, e.g. `"CRTC_ID"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw `DRM_MODE_PROP_*` flags describing this property's value
    /// type (range, enum, blob, bitmask, signed range, object).
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// For a `RANGE`/`SIGNED_RANGE` property, `[min, max]`. Empty for any
    /// other property type.
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// For an `ENUM`/`BITMASK` property, the name/value table the kernel
    /// reported. Empty for any other property type.
    pub fn enums(&self) -> &[(String, u64)] {
        &self.enums
    }
}

/// The property-ID/value pairs set on one DRM object, paired with the
/// descriptor for each ID so that a name can be resolved to an ID.
///
/// `ids[i]` and `descriptors[i]` always describe the same property; this
/// parallel-array layout keeps a name lookup to a single linear scan, which
/// is adequate since objects carry only tens of properties.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    ids: Vec<u32>,
    values: Vec<u64>,
    descriptors: Vec<PropertyDescriptor>,
}

impl PropertyBag {
    fn fetch(fd: BorrowedFd<'_>, obj_id: u32, obj_type: u32) -> Result<Self> {
        let mut ids = Vec::new();
        let mut values = Vec::new();
        drm_ffi::mode::get_properties(fd, obj_id, obj_type, Some(&mut ids), Some(&mut values))
            .map_err(Error::ResourceUnavailable)?;

        let mut descriptors = Vec::with_capacity(ids.len());
        for &id in &ids {
            let mut prop_values = Vec::new();
            let mut prop_enums = Vec::new();
            let info = drm_ffi::mode::get_property(fd, id, Some(&mut prop_values), Some(&mut prop_enums))
                .map_err(Error::ResourceUnavailable)?;
            descriptors.push(PropertyDescriptor {
                id,
                name: cstr_to_string(&info.name),
                flags: info.flags,
                values: prop_values,
                enums: prop_enums
                    .into_iter()
                    .map(|e| (cstr_to_string(&e.name), e.value))
                    .collect(),
            });
        }

        Ok(PropertyBag {
            ids,
            values,
            descriptors,
        })
    }

    /// Resolve a property name to its kernel ID on this object.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.descriptors
            .iter()
            .position(|d| d.name == name)
            .map(|i| self.ids[i])
    }

    /// The value the kernel reported for `name` at the time this bag was
    /// fetched (not updated by subsequent commits).
    pub fn value_of(&self, name: &str) -> Option<u64> {
        self.descriptors
            .iter()
            .position(|d| d.name == name)
            .map(|i| self.values[i])
    }

    /// All property descriptors on this object.
    pub fn descriptors(&self) -> &[PropertyDescriptor] {
        &self.descriptors
    }

    /// Property ID/value pairs for properties the kernel will actually
    /// accept in an atomic commit (excludes `DRM_MODE_PROP_IMMUTABLE`
    /// properties such as a connector's EDID blob).
    fn mutable_snapshot(&self) -> Vec<(u32, u64)> {
        self.ids
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .zip(self.descriptors.iter())
            .filter(|(_, d)| d.flags & drm_ffi::drm_sys::DRM_MODE_PROP_IMMUTABLE == 0)
            .map(|(pair, _)| pair)
            .collect()
    }
}

/// A display mode: timings and flags for one way a connector can be driven.
#[derive(Debug, Clone, Copy)]
pub struct Mode(pub(crate) drm_mode_modeinfo);

impl Mode {
    /// The mode's human-readable name as reported by the kernel (e.g.
    /// `"1920x1080"`).
    pub fn name(&self) -> String {
        cstr_to_string(&self.0.name)
    }

    /// Horizontal resolution in pixels.
    pub fn hdisplay(&self) -> u16 {
        self.0.hdisplay
    }

    /// Vertical resolution in pixels.
    pub fn vdisplay(&self) -> u16 {
        self.0.vdisplay
    }

    /// Vertical refresh rate in Hz.
    pub fn vrefresh(&self) -> u32 {
        self.0.vrefresh
    }
}

impl PartialEq for Mode {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Mode {}

/// Connection status of a connector, as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Unknown,
}

/// A physical output port (HDMI, DSI, eDP, ...).
#[derive(Debug, Clone)]
pub struct Connector {
    id: u32,
    state: ConnectionState,
    modes: Vec<Mode>,
    possible_encoders: Vec<u32>,
    props: PropertyBag,
}

impl Connector {
    /// The connector's kernel object ID.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Whether a display is currently attached to this port.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// All modes this connector can be driven at.
    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    /// Encoder IDs this connector can be routed through.
    pub fn possible_encoders(&self) -> &[u32] {
        &self.possible_encoders
    }

    /// The connector's cached property bag.
    pub fn properties(&self) -> &PropertyBag {
        &self.props
    }
}

/// Translates a CRTC's pixel stream into a signal for one or more
/// connectors.
#[derive(Debug, Clone)]
pub struct Encoder {
    id: u32,
    possible_crtcs: u32,
}

impl Encoder {
    /// The encoder's kernel object ID.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Bitmask of CRTC indices (bit N set means the CRTC at index N in the
    /// device's CRTC list) this encoder can be driven by.
    pub fn possible_crtcs(&self) -> u32 {
        self.possible_crtcs
    }
}

/// A scanout engine.
#[derive(Debug, Clone)]
pub struct Crtc {
    id: u32,
    index: usize,
    props: PropertyBag,
}

impl Crtc {
    /// The CRTC's kernel object ID.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The CRTC's position in the device's CRTC list; this is the bit
    /// position used in encoders' and planes' `possible_crtcs` masks.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The CRTC's cached property bag.
    pub fn properties(&self) -> &PropertyBag {
        &self.props
    }
}

/// A plane's compositing role, discovered via its `"type"` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneType {
    Primary,
    Overlay,
    Cursor,
}

/// A composition layer feeding a CRTC.
#[derive(Debug, Clone)]
pub struct Plane {
    id: u32,
    possible_crtcs: u32,
    plane_type: PlaneType,
    formats: Vec<DrmFourcc>,
    props: PropertyBag,
}

impl Plane {
    /// The plane's kernel object ID.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Bitmask of CRTC indices this plane may be attached to.
    pub fn possible_crtcs(&self) -> u32 {
        self.possible_crtcs
    }

    /// Whether this is the primary, an overlay, or the cursor plane.
    pub fn plane_type(&self) -> PlaneType {
        self.plane_type
    }

    /// Pixel formats this plane can scan out.
    pub fn formats(&self) -> &[DrmFourcc] {
        &self.formats
    }

    /// The plane's cached property bag.
    pub fn properties(&self) -> &PropertyBag {
        &self.props
    }
}

pub(crate) struct Selection {
    pub(crate) connector_idx: usize,
    pub(crate) encoder_idx: usize,
    pub(crate) crtc_idx: usize,
    pub(crate) mode: Mode,
}

pub(crate) struct MutableState {
    pub(crate) selection: Option<Selection>,
    pub(crate) mode_blob_id: u32,
}

/// A handle to a DRM primary node: its full object inventory plus the
/// mutable pipeline selection and mode blob.
///
/// Inventory contents (`connectors`, `encoders`, `crtcs`, `planes`) are
/// immutable after construction and may be read without locking. Pipeline
/// selection and request submission share a single device-level mutex (see
/// [`crate::request::Request`]).
pub struct Device {
    fd: OwnedFd,
    connectors: Vec<Connector>,
    encoders: Vec<Encoder>,
    crtcs: Vec<Crtc>,
    planes: Vec<Plane>,
    initial_state: Vec<(u32, u32, u64)>,
    pub(crate) state: Mutex<MutableState>,
}

impl Device {
    /// Open a DRM primary node at `path` and build its inventory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(Error::ResourceUnavailable)?;
        Self::from_fd(OwnedFd::from(file))
    }

    /// Adopt an already-open file descriptor to a DRM primary node.
    pub fn from_fd(fd: OwnedFd) -> Result<Self> {
        let borrowed = fd.as_fd();

        drm_ffi::set_capability(borrowed, DRM_CLIENT_CAP_UNIVERSAL_PLANES, true)
            .map_err(|_| Error::CapabilityUnsupported("universal planes"))?;
        drm_ffi::set_capability(borrowed, DRM_CLIENT_CAP_ATOMIC, true)
            .map_err(|_| Error::CapabilityUnsupported("atomic"))?;

        let mut raw_crtcs = Vec::new();
        let mut raw_connectors = Vec::new();
        let mut raw_encoders = Vec::new();
        drm_ffi::mode::get_resources(
            borrowed,
            None,
            Some(&mut raw_crtcs),
            Some(&mut raw_connectors),
            Some(&mut raw_encoders),
        )
        .map_err(Error::ResourceUnavailable)?;

        let mut raw_planes = Vec::new();
        drm_ffi::mode::get_plane_resources(borrowed, Some(&mut raw_planes))
            .map_err(Error::ResourceUnavailable)?;

        let mut initial_state = Vec::new();

        let crtcs: Vec<Crtc> = raw_crtcs
            .iter()
            .enumerate()
            .map(|(index, &id)| {
                let props = PropertyBag::fetch(borrowed, id, DRM_MODE_OBJECT_CRTC)?;
                for &(prop_id, value) in &props.mutable_snapshot() {
                    initial_state.push((id, prop_id, value));
                }
                Ok(Crtc { id, index, props })
            })
            .collect::<Result<_>>()?;

        let encoders: Vec<Encoder> = raw_encoders
            .iter()
            .map(|&id| {
                let info = drm_ffi::mode::get_encoder(borrowed, id).map_err(Error::ResourceUnavailable)?;
                // Encoders carry no atomic-settable properties in practice, but
                // the fetch still happens so construction uniformly validates
                // every enumerated object against the kernel.
                let props = PropertyBag::fetch(borrowed, id, DRM_MODE_OBJECT_ENCODER)?;
                for &(prop_id, value) in &props.mutable_snapshot() {
                    initial_state.push((id, prop_id, value));
                }
                Ok(Encoder {
                    id,
                    possible_crtcs: info.possible_crtcs,
                })
            })
            .collect::<Result<_>>()?;

        let connectors: Vec<Connector> = raw_connectors
            .iter()
            .map(|&id| {
                let mut modes = Vec::new();
                let mut props_ids = Vec::new();
                let mut prop_values = Vec::new();
                let mut possible_encoders = Vec::new();
                let info = drm_ffi::mode::get_connector(
                    borrowed,
                    id,
                    Some(&mut modes),
                    Some(&mut props_ids),
                    Some(&mut prop_values),
                    Some(&mut possible_encoders),
                )
                .map_err(Error::ResourceUnavailable)?;

                let props = PropertyBag::fetch(borrowed, id, DRM_MODE_OBJECT_CONNECTOR)?;
                for &(prop_id, value) in &props.mutable_snapshot() {
                    initial_state.push((id, prop_id, value));
                }

                let state = match info.connection {
                    drm_ffi::drm_sys::DRM_MODE_CONNECTED => ConnectionState::Connected,
                    drm_ffi::drm_sys::DRM_MODE_DISCONNECTED => ConnectionState::Disconnected,
                    _ => ConnectionState::Unknown,
                };

                Ok(Connector {
                    id,
                    state,
                    modes: modes.into_iter().map(Mode).collect(),
                    possible_encoders,
                    props,
                })
            })
            .collect::<Result<_>>()?;

        let planes: Vec<Plane> = raw_planes
            .iter()
            .map(|&id| {
                let mut format_ids = Vec::new();
                let info = drm_ffi::mode::get_plane(borrowed, id, Some(&mut format_ids))
                    .map_err(Error::ResourceUnavailable)?;

                let props = PropertyBag::fetch(borrowed, id, DRM_MODE_OBJECT_PLANE)?;
                for &(prop_id, value) in &props.mutable_snapshot() {
                    initial_state.push((id, prop_id, value));
                }

                let plane_type = match props.value_of("type") {
                    Some(v) if v == drm_ffi::drm_sys::DRM_PLANE_TYPE_PRIMARY as u64 => PlaneType::Primary,
                    Some(v) if v == drm_ffi::drm_sys::DRM_PLANE_TYPE_CURSOR as u64 => PlaneType::Cursor,
                    _ => PlaneType::Overlay,
                };

                let formats = format_ids
                    .into_iter()
                    .filter_map(|f| DrmFourcc::try_from(f).ok())
                    .collect();

                Ok(Plane {
                    id,
                    possible_crtcs: info.possible_crtcs,
                    plane_type,
                    formats,
                    props,
                })
            })
            .collect::<Result<_>>()?;

        // Encoders carry no meaningful atomic properties but the querying
        // still happens for topology diagnostics in debug logging.
        for encoder in &encoders {
            log::trace!("encoder {} possible_crtcs={:#x}", encoder.id, encoder.possible_crtcs);
        }

        log::debug!(
            "opened DRM device: {} connectors, {} encoders, {} crtcs, {} planes",
            connectors.len(),
            encoders.len(),
            crtcs.len(),
            planes.len(),
        );

        Ok(Device {
            fd,
            connectors,
            encoders,
            crtcs,
            planes,
            initial_state,
            state: Mutex::new(MutableState {
                selection: None,
                mode_blob_id: 0,
            }),
        })
    }

    pub(crate) fn fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    /// All connectors discovered at construction time.
    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    /// All encoders discovered at construction time.
    pub fn encoders(&self) -> &[Encoder] {
        &self.encoders
    }

    /// All CRTCs discovered at construction time.
    pub fn crtcs(&self) -> &[Crtc] {
        &self.crtcs
    }

    /// All planes discovered at construction time.
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub(crate) fn find_connector(&self, id: u32) -> Option<(usize, &Connector)> {
        self.connectors.iter().enumerate().find(|(_, c)| c.id == id)
    }

    pub(crate) fn find_encoder(&self, id: u32) -> Option<(usize, &Encoder)> {
        self.encoders.iter().enumerate().find(|(_, e)| e.id == id)
    }

    pub(crate) fn find_crtc(&self, id: u32) -> Option<(usize, &Crtc)> {
        self.crtcs.iter().enumerate().find(|(_, c)| c.id == id)
    }

    pub(crate) fn find_plane(&self, id: u32) -> Option<&Plane> {
        self.planes.iter().find(|p| p.id == id)
    }

    /// Build a `Device` with no inventory and no kernel backing, for unit
    /// tests that exercise pure logic (request dedup, topology validation)
    /// without a real DRM node. The returned device's `Drop` restores
    /// nothing, since its `initial_state` is empty.
    #[cfg(test)]
    pub(crate) fn test_stub() -> Self {
        Self::test_stub_with_inventory(Vec::new(), Vec::new(), Vec::new(), Vec::new())
    }

    /// Build a `Device` from caller-supplied inventory, for tests that need
    /// to exercise topology validation or property lookup without a real
    /// DRM node.
    #[cfg(test)]
    pub(crate) fn test_stub_with_inventory(
        connectors: Vec<Connector>,
        encoders: Vec<Encoder>,
        crtcs: Vec<Crtc>,
        planes: Vec<Plane>,
    ) -> Self {
        let fd = std::fs::File::open("/dev/null").expect("/dev/null must exist");
        Device {
            fd: OwnedFd::from(fd),
            connectors,
            encoders,
            crtcs,
            planes,
            initial_state: Vec::new(),
            state: Mutex::new(MutableState {
                selection: None,
                mode_blob_id: 0,
            }),
        }
    }
}

#[cfg(test)]
impl PropertyBag {
    pub(crate) fn test_stub(entries: &[(&str, u64)]) -> Self {
        let mut ids = Vec::new();
        let mut values = Vec::new();
        let mut descriptors = Vec::new();
        for (i, &(name, value)) in entries.iter().enumerate() {
            let id = (i + 1) as u32;
            ids.push(id);
            values.push(value);
            descriptors.push(PropertyDescriptor {
                id,
                name: name.to_string(),
                flags: 0,
                values: Vec::new(),
                enums: Vec::new(),
            });
        }
        PropertyBag {
            ids,
            values,
            descriptors,
        }
    }
}

#[cfg(test)]
impl Connector {
    pub(crate) fn test_stub(id: u32, modes: Vec<Mode>, possible_encoders: Vec<u32>) -> Self {
        Connector {
            id,
            state: ConnectionState::Connected,
            modes,
            possible_encoders,
            props: PropertyBag::default(),
        }
    }
}

#[cfg(test)]
impl Encoder {
    pub(crate) fn test_stub(id: u32, possible_crtcs: u32) -> Self {
        Encoder { id, possible_crtcs }
    }
}

#[cfg(test)]
impl Crtc {
    pub(crate) fn test_stub(id: u32, index: usize) -> Self {
        Crtc {
            id,
            index,
            props: PropertyBag::default(),
        }
    }
}

#[cfg(test)]
impl Mode {
    pub(crate) fn test_stub(name: &str) -> Self {
        let mut info = drm_mode_modeinfo::default();
        for (dst, src) in info.name.iter_mut().zip(name.bytes()) {
            *dst = src as c_char;
        }
        Mode(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_bag_lookup_finds_and_misses() {
        let bag = PropertyBag::test_stub(&[("CRTC_ID", 42), ("ACTIVE", 1)]);
        assert_eq!(bag.id_of("CRTC_ID"), Some(1));
        assert_eq!(bag.value_of("ACTIVE"), Some(1));
        assert_eq!(bag.id_of("NOT_A_PROP"), None);
    }

    #[test]
    fn property_bag_ids_and_descriptors_stay_parallel() {
        let bag = PropertyBag::test_stub(&[("A", 0), ("B", 1), ("C", 2)]);
        assert_eq!(bag.ids.len(), bag.descriptors.len());
        for (id, desc) in bag.ids.iter().zip(bag.descriptors.iter()) {
            assert_eq!(*id, desc.id);
        }
    }

    #[test]
    fn cstr_to_string_stops_at_nul() {
        let mut buf = [0 as c_char; 8];
        for (dst, src) in buf.iter_mut().zip(b"abc".iter()) {
            *dst = *src as c_char;
        }
        assert_eq!(cstr_to_string(&buf), "abc");
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        let mode_blob_id = self
            .state
            .lock()
            .map(|state| state.mode_blob_id)
            .unwrap_or(0);
        if mode_blob_id != 0 {
            if let Err(err) = drm_ffi::mode::destroy_property_blob(self.fd.as_fd(), mode_blob_id) {
                log::warn!("failed to destroy mode blob {mode_blob_id} on device close: {err}");
            }
        }

        if self.initial_state.is_empty() {
            return;
        }

        let mut objects: Vec<u32> = Vec::new();
        let mut counts: Vec<u32> = Vec::new();
        let mut props: Vec<u32> = Vec::new();
        let mut values: Vec<u64> = Vec::new();

        for &(obj_id, prop_id, value) in &self.initial_state {
            match objects.iter().position(|&o| o == obj_id) {
                Some(idx) => {
                    counts[idx] += 1;
                }
                None => {
                    objects.push(obj_id);
                    counts.push(1);
                }
            }
            props.push(prop_id);
            values.push(value);
        }

        let flags = drm_ffi::drm_sys::DRM_MODE_ATOMIC_ALLOW_MODESET;
        if let Err(err) = drm_ffi::mode::atomic_commit(
            self.fd.as_fd(),
            flags,
            &mut objects,
            &mut counts,
            &mut props,
            &mut values,
            0,
        ) {
            log::warn!("failed to restore prior display state on device close: {err}");
        }
    }
}
