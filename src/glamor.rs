// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! glamor: surface import/export through the accelerated rendering library.
//!
//! The library itself is an external collaborator; this module adapts its
//! pixmap object model to the screen's surface type and validates the
//! client-supplied parameters before they reach it.

use std::sync::Arc;

use crate::dri3_core::Surface;
use crate::dri3_core::SurfaceBackend;
use crate::dri3_os::Descriptor;
use crate::dri3_utils::*;

/// Library-native pixel formats addressable by depth.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GlamorFormat {
    Argb1555,
    Rgb565,
    Xrgb8888,
    Argb2101010,
    Argb8888,
}

/// Maps a client-supplied depth to the library-native format.  Unmapped
/// depths fail the import.
pub fn format_for_depth(depth: u8) -> Dri3Result<GlamorFormat> {
    match depth {
        15 => Ok(GlamorFormat::Argb1555),
        16 => Ok(GlamorFormat::Rgb565),
        24 => Ok(GlamorFormat::Xrgb8888),
        30 => Ok(GlamorFormat::Argb2101010),
        32 => Ok(GlamorFormat::Argb8888),
        _ => Err(Dri3Error::InvalidDepth(depth)),
    }
}

/// An imported pixmap object owned by the accelerated library.  Dropping the
/// box releases the library's reference.
pub trait GlamorPixmap {}

/// The accelerated library's pixmap operations consumed by this module.
pub trait GlamorPixmaps {
    /// Imports a single-plane buffer as a textured pixmap.  The descriptor is
    /// borrowed; the library takes its own reference on success.
    fn pixmap_from_fd(
        &self,
        fd: Descriptor,
        width: u16,
        height: u16,
        stride: u16,
        format: GlamorFormat,
    ) -> Dri3Result<Box<dyn GlamorPixmap>>;

    /// Imports a multi-plane buffer carrying an explicit tiling modifier.
    fn pixmap_from_fds(
        &self,
        planes: &[ImportPlane],
        width: u16,
        height: u16,
        format: GlamorFormat,
        modifier: u64,
    ) -> Dri3Result<Box<dyn GlamorPixmap>>;

    /// Exports the pixmap's storage as one descriptor plus stride and size.
    fn fd_from_pixmap(&self, pixmap: &dyn GlamorPixmap) -> Dri3Result<ExportedBuffer>;

    /// Blocks until all drawing commands previously issued against library
    /// pixmaps have been submitted to the device.
    fn flush(&self) -> Dri3Result<()>;
}

/// The accelerated surface backend.
pub struct GlamorBackend {
    glamor: Arc<dyn GlamorPixmaps>,
}

impl GlamorBackend {
    pub fn new(glamor: Arc<dyn GlamorPixmaps>) -> GlamorBackend {
        GlamorBackend { glamor }
    }
}

impl SurfaceBackend for GlamorBackend {
    fn import(&self, geometry: SurfaceGeometry, planes: &ImportPlanes) -> Dri3Result<Surface> {
        let format = format_for_depth(geometry.depth)?;

        let pixmap = if planes.modifier != DRM_FORMAT_MOD_INVALID && planes.num_planes > 1 {
            let mut plane_list = Vec::with_capacity(planes.num_planes);
            for idx in 0..planes.num_planes {
                plane_list.push(planes.plane(idx)?);
            }
            self.glamor.pixmap_from_fds(
                &plane_list,
                geometry.width,
                geometry.height,
                format,
                planes.modifier,
            )?
        } else {
            // Without a modifier the layout is implicit, which only works for
            // exactly one plane.  The modifier is dropped on this path.
            if planes.num_planes != 1 {
                return Err(Dri3Error::InvalidPlaneLayout);
            }
            let plane = planes.plane(0)?;
            let stride = u16::try_from(plane.stride)?;
            self.glamor
                .pixmap_from_fd(plane.fd, geometry.width, geometry.height, stride, format)?
        };

        let stride = planes.plane(0)?.stride;
        Ok(Surface::with_pixmap(
            geometry,
            stride,
            pixmap,
            SurfaceUsage::empty().shared(true),
        ))
    }

    fn export_single(&self, surface: &Surface) -> Dri3Result<ExportedBuffer> {
        let exported = self.glamor.fd_from_pixmap(surface.pixmap()?)?;

        // Pending drawing must reach the kernel before the consumer starts
        // reading through the descriptor.
        self.glamor.flush()?;
        Ok(exported)
    }

    fn export_multi(&self, surface: &Surface) -> Dri3Result<BufferDescriptor> {
        let exported = self.glamor.fd_from_pixmap(surface.pixmap()?)?;
        self.glamor.flush()?;

        let mut desc = BufferDescriptor::default();
        desc.num_planes = 1;
        desc.strides[0] = u32::from(exported.stride);
        desc.offsets[0] = 0;
        desc.fds[0] = Some(exported.fd);
        // The library does not expose the object behind the pixmap, so the
        // layout is reported as unspecified.
        desc.modifier = DRM_FORMAT_MOD_INVALID;
        Ok(desc)
    }

    fn flush(&self) -> Dri3Result<()> {
        self.glamor.flush()
    }
}
