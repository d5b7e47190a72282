//! Pipeline selection: choosing and locking in a (connector, encoder, CRTC,
//! mode) tuple and publishing the mode blob the CRTC's `MODE_ID` property
//! will point at.

use crate::device::{Device, Mode, Selection};
use crate::error::{Error, Result};

impl Device {
    /// Validate and lock in an output pipeline.
    ///
    /// `mode` must be byte-identical to one already present in the named
    /// connector's mode list. On success, a fresh mode blob is allocated and
    /// any blob from a prior `configure` call is released.
    pub fn configure(&self, connector_id: u32, encoder_id: u32, crtc_id: u32, mode: Mode) -> Result<()> {
        let (connector_idx, connector) = self
            .find_connector(connector_id)
            .ok_or(Error::TopologyInvalid("unknown connector"))?;
        let (encoder_idx, encoder) = self
            .find_encoder(encoder_id)
            .ok_or(Error::TopologyInvalid("unknown encoder"))?;
        let (crtc_idx, crtc) = self
            .find_crtc(crtc_id)
            .ok_or(Error::TopologyInvalid("unknown crtc"))?;

        validate_topology(
            connector.possible_encoders(),
            encoder_id,
            encoder.possible_crtcs(),
            crtc.index(),
        )?;
        if !connector.modes().contains(&mode) {
            return Err(Error::TopologyInvalid(
                "mode is not offered by this connector",
            ));
        }

        let blob = drm_ffi::mode::create_property_blob(self.fd(), mode_as_bytes(&mode))
            .map_err(Error::ResourceUnavailable)?;

        let mut state = self.state.lock().expect("device state mutex poisoned");
        let previous_blob = state.mode_blob_id;

        state.selection = Some(Selection {
            connector_idx,
            encoder_idx,
            crtc_idx,
            mode,
        });
        state.mode_blob_id = blob.blob_id;
        drop(state);

        if previous_blob != 0 {
            if let Err(err) = drm_ffi::mode::destroy_property_blob(self.fd(), previous_blob) {
                log::warn!("failed to release prior mode blob {previous_blob}: {err}");
            }
        }

        log::debug!(
            "configured pipeline: connector={} encoder={} crtc={} mode={} blob={}",
            connector_id,
            encoder_id,
            crtc_id,
            mode.name(),
            blob.blob_id,
        );

        Ok(())
    }
}

fn mode_as_bytes(mode: &Mode) -> &[u8] {
    let ptr = &mode.0 as *const _ as *const u8;
    let len = std::mem::size_of_val(&mode.0);
    unsafe { std::slice::from_raw_parts(ptr, len) }
}

/// The topology legality check at the heart of `configure`: the encoder
/// must be reachable from the connector, and the CRTC's bit must be set in
/// the encoder's possible-CRTCs mask.
fn validate_topology(
    connector_possible_encoders: &[u32],
    encoder_id: u32,
    encoder_possible_crtcs: u32,
    crtc_index: usize,
) -> Result<()> {
    if !connector_possible_encoders.contains(&encoder_id) {
        return Err(Error::TopologyInvalid(
            "encoder is not reachable from connector",
        ));
    }
    if encoder_possible_crtcs & (1 << crtc_index) == 0 {
        return Err(Error::TopologyInvalid(
            "crtc is not reachable from encoder",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Connector, Crtc, Encoder};

    #[test]
    fn validate_topology_accepts_matching_pair() {
        assert!(validate_topology(&[5], 5, 0b0010, 1).is_ok());
    }

    #[test]
    fn validate_topology_rejects_unreachable_encoder() {
        let err = validate_topology(&[5], 6, 0b0010, 1).unwrap_err();
        assert!(matches!(err, Error::TopologyInvalid(_)));
    }

    #[test]
    fn validate_topology_rejects_unreachable_crtc() {
        let err = validate_topology(&[5], 5, 0b0001, 1).unwrap_err();
        assert!(matches!(err, Error::TopologyInvalid(_)));
    }

    #[test]
    fn configure_rejects_unknown_connector() {
        let device = crate::device::Device::test_stub_with_inventory(
            vec![Connector::test_stub(1, vec![], vec![2])],
            vec![Encoder::test_stub(2, 0b1)],
            vec![Crtc::test_stub(3, 0)],
            vec![],
        );
        let mode = Mode::test_stub("1920x1080");
        let err = device.configure(99, 2, 3, mode).unwrap_err();
        assert!(matches!(err, Error::TopologyInvalid(_)));
    }

    #[test]
    fn configure_rejects_mismatched_topology() {
        let device = crate::device::Device::test_stub_with_inventory(
            vec![Connector::test_stub(1, vec![], vec![2])],
            vec![Encoder::test_stub(2, 0b1)],
            vec![Crtc::test_stub(3, 4)],
            vec![],
        );
        let mode = Mode::test_stub("1920x1080");
        let err = device.configure(1, 2, 3, mode).unwrap_err();
        assert!(matches!(err, Error::TopologyInvalid(_)));
    }
}
