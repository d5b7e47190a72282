//!
//! Bindings for the atomic modesetting ioctls.
//!

use std::{io, os::unix::io::BorrowedFd};

use drm_sys::*;

use crate::ioctl;

/// Enumerate the card's connectors, encoders, and CRTCs.
///
/// The kernel fills in only the counts on a first call with empty buffers;
/// callers size their buffers to those counts and call again to fill them.
pub fn get_resources(
    fd: BorrowedFd<'_>,
    mut fbs: Option<&mut Vec<u32>>,
    mut crtcs: Option<&mut Vec<u32>>,
    mut connectors: Option<&mut Vec<u32>>,
    mut encoders: Option<&mut Vec<u32>>,
) -> io::Result<drm_mode_card_res> {
    let mut sizes = drm_mode_card_res::default();
    unsafe {
        ioctl::mode::get_resources(fd, &mut sizes)?;
    }

    map_reserve!(fbs, sizes.count_fbs as usize);
    map_reserve!(crtcs, sizes.count_crtcs as usize);
    map_reserve!(connectors, sizes.count_connectors as usize);
    map_reserve!(encoders, sizes.count_encoders as usize);

    let mut res = drm_mode_card_res {
        fb_id_ptr: map_ptr!(&fbs),
        crtc_id_ptr: map_ptr!(&crtcs),
        connector_id_ptr: map_ptr!(&connectors),
        encoder_id_ptr: map_ptr!(&encoders),
        count_fbs: map_len!(&fbs),
        count_crtcs: map_len!(&crtcs),
        count_connectors: map_len!(&connectors),
        count_encoders: map_len!(&encoders),
        ..sizes
    };

    unsafe {
        ioctl::mode::get_resources(fd, &mut res)?;
    }

    map_set!(fbs, res.count_fbs as usize);
    map_set!(crtcs, res.count_crtcs as usize);
    map_set!(connectors, res.count_connectors as usize);
    map_set!(encoders, res.count_encoders as usize);

    Ok(res)
}

/// Enumerate the card's planes.
pub fn get_plane_resources(
    fd: BorrowedFd<'_>,
    mut planes: Option<&mut Vec<u32>>,
) -> io::Result<drm_mode_get_plane_res> {
    let mut sizes = drm_mode_get_plane_res::default();
    unsafe {
        ioctl::mode::get_plane_resources(fd, &mut sizes)?;
    }

    map_reserve!(planes, sizes.count_planes as usize);

    let mut res = drm_mode_get_plane_res {
        plane_id_ptr: map_ptr!(&planes),
        count_planes: map_len!(&planes),
    };

    unsafe {
        ioctl::mode::get_plane_resources(fd, &mut res)?;
    }

    map_set!(planes, res.count_planes as usize);

    Ok(res)
}

/// Get detailed information about a connector, including its modes and
/// compatible encoders.
pub fn get_connector(
    fd: BorrowedFd<'_>,
    connector_id: u32,
    mut modes: Option<&mut Vec<drm_mode_modeinfo>>,
    mut props: Option<&mut Vec<u32>>,
    mut prop_values: Option<&mut Vec<u64>>,
    mut encoders: Option<&mut Vec<u32>>,
) -> io::Result<drm_mode_get_connector> {
    let mut sizes = drm_mode_get_connector {
        connector_id,
        ..Default::default()
    };
    unsafe {
        ioctl::mode::get_connector(fd, &mut sizes)?;
    }

    map_reserve!(modes, sizes.count_modes as usize);
    map_reserve!(props, sizes.count_props as usize);
    map_reserve!(prop_values, sizes.count_props as usize);
    map_reserve!(encoders, sizes.count_encoders as usize);

    let mut info = drm_mode_get_connector {
        modes_ptr: map_ptr!(&modes),
        props_ptr: map_ptr!(&props),
        prop_values_ptr: map_ptr!(&prop_values),
        encoders_ptr: map_ptr!(&encoders),
        count_modes: map_len!(&modes),
        count_props: map_len!(&props),
        count_encoders: map_len!(&encoders),
        connector_id,
        ..sizes
    };

    unsafe {
        ioctl::mode::get_connector(fd, &mut info)?;
    }

    map_set!(modes, info.count_modes as usize);
    map_set!(props, info.count_props as usize);
    map_set!(prop_values, info.count_props as usize);
    map_set!(encoders, info.count_encoders as usize);

    Ok(info)
}

/// Get detailed information about an encoder.
pub fn get_encoder(fd: BorrowedFd<'_>, encoder_id: u32) -> io::Result<drm_mode_get_encoder> {
    let mut info = drm_mode_get_encoder {
        encoder_id,
        ..Default::default()
    };

    unsafe {
        ioctl::mode::get_encoder(fd, &mut info)?;
    }

    Ok(info)
}

/// Get detailed information about a CRTC.
pub fn get_crtc(fd: BorrowedFd<'_>, crtc_id: u32) -> io::Result<drm_mode_crtc> {
    let mut info = drm_mode_crtc {
        crtc_id,
        ..Default::default()
    };

    unsafe {
        ioctl::mode::get_crtc(fd, &mut info)?;
    }

    Ok(info)
}

/// Get detailed information about a plane.
pub fn get_plane(
    fd: BorrowedFd<'_>,
    plane_id: u32,
    mut format_types: Option<&mut Vec<u32>>,
) -> io::Result<drm_mode_get_plane> {
    let mut sizes = drm_mode_get_plane {
        plane_id,
        ..Default::default()
    };
    unsafe {
        ioctl::mode::get_plane(fd, &mut sizes)?;
    }

    map_reserve!(format_types, sizes.count_format_types as usize);

    let mut info = drm_mode_get_plane {
        format_type_ptr: map_ptr!(&format_types),
        count_format_types: map_len!(&format_types),
        plane_id,
        ..sizes
    };

    unsafe {
        ioctl::mode::get_plane(fd, &mut info)?;
    }

    map_set!(format_types, info.count_format_types as usize);

    Ok(info)
}

/// Get a property's descriptor (name, flags, and possible values) by ID.
pub fn get_property(
    fd: BorrowedFd<'_>,
    prop_id: u32,
    mut values: Option<&mut Vec<u64>>,
    mut enums: Option<&mut Vec<drm_mode_property_enum>>,
) -> io::Result<drm_mode_get_property> {
    let mut sizes = drm_mode_get_property {
        prop_id,
        ..Default::default()
    };
    unsafe {
        ioctl::mode::get_property(fd, &mut sizes)?;
    }

    map_reserve!(values, sizes.count_values as usize);
    map_reserve!(enums, sizes.count_enum_blobs as usize);

    let mut info = drm_mode_get_property {
        values_ptr: map_ptr!(&values),
        enum_blob_ptr: map_ptr!(&enums),
        count_values: map_len!(&values),
        count_enum_blobs: map_len!(&enums),
        prop_id,
        ..sizes
    };

    unsafe {
        ioctl::mode::get_property(fd, &mut info)?;
    }

    map_set!(values, info.count_values as usize);
    map_set!(enums, info.count_enum_blobs as usize);

    Ok(info)
}

/// Get the (property ID, value) pairs currently set on an object.
pub fn get_properties(
    fd: BorrowedFd<'_>,
    obj_id: u32,
    obj_type: u32,
    mut props: Option<&mut Vec<u32>>,
    mut prop_values: Option<&mut Vec<u64>>,
) -> io::Result<drm_mode_obj_get_properties> {
    let mut sizes = drm_mode_obj_get_properties {
        obj_id,
        obj_type,
        ..Default::default()
    };
    unsafe {
        ioctl::mode::obj_get_properties(fd, &mut sizes)?;
    }

    map_reserve!(props, sizes.count_props as usize);
    map_reserve!(prop_values, sizes.count_props as usize);

    let mut info = drm_mode_obj_get_properties {
        props_ptr: map_ptr!(&props),
        prop_values_ptr: map_ptr!(&prop_values),
        count_props: map_len!(&props),
        obj_id,
        obj_type,
    };

    unsafe {
        ioctl::mode::obj_get_properties(fd, &mut info)?;
    }

    map_set!(props, info.count_props as usize);
    map_set!(prop_values, info.count_props as usize);

    Ok(info)
}

/// Create a property blob (used to hold a mode descriptor) from raw bytes.
pub fn create_property_blob(fd: BorrowedFd<'_>, data: &[u8]) -> io::Result<drm_mode_create_blob> {
    let mut blob = drm_mode_create_blob {
        data: data.as_ptr() as u64,
        length: data.len() as u32,
        blob_id: 0,
    };

    unsafe {
        ioctl::mode::create_blob(fd, &mut blob)?;
    }

    Ok(blob)
}

/// Destroy a previously created property blob.
pub fn destroy_property_blob(fd: BorrowedFd<'_>, blob_id: u32) -> io::Result<()> {
    let mut blob = drm_mode_destroy_blob { blob_id };

    unsafe {
        ioctl::mode::destroy_blob(fd, &mut blob)?;
    }

    Ok(())
}

/// Submit an atomic commit: a set of (object, property, value) triples to
/// apply as a single indivisible transition.
///
/// `objects` and `count_props_per_object` must be the same length; `props`
/// and `values` must together hold exactly the sum of
/// `count_props_per_object`.
pub fn atomic_commit(
    fd: BorrowedFd<'_>,
    flags: u32,
    objects: &mut [u32],
    count_props_per_object: &mut [u32],
    props: &mut [u32],
    values: &mut [u64],
    user_data: u64,
) -> io::Result<()> {
    let mut req = drm_mode_atomic {
        flags,
        count_objs: objects.len() as u32,
        objs_ptr: objects.as_mut_ptr() as u64,
        count_props_ptr: count_props_per_object.as_mut_ptr() as u64,
        props_ptr: props.as_mut_ptr() as u64,
        prop_values_ptr: values.as_mut_ptr() as u64,
        reserved: 0,
        user_data,
    };

    unsafe {
        ioctl::mode::atomic(fd, &mut req)?;
    }

    Ok(())
}
