// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! screen: binds the buffer-sharing handler to the display server's
//! surface-sharing extension and adapts its callback conventions.

use log::error;
use log::info;
use log::warn;

use crate::dri3_core::Dri3;
use crate::dri3_core::Dri3Builder;
use crate::dri3_core::Surface;
use crate::dri3_os::Descriptor;
use crate::dri3_os::SafeDescriptor;
use crate::dri3_utils::*;
use crate::formats::DrmFormat;
use crate::rendernode;

/// Version of the callback surface offered to the host extension.
pub const DRI3_SCREEN_INFO_VERSION: u32 = 2;

/// The per-screen handler registered with the host's surface-sharing
/// extension.  Methods mirror the extension's callback table and report
/// failure in the sentinel forms the host expects: `None` for the protocol's
/// null/-1 returns, `HostStatus` where the protocol carries a status code.
pub struct Dri3Screen {
    dri3: Dri3,
}

impl Dri3Screen {
    /// Binds a screen: discovers the render-capable node when the builder
    /// does not name one, then builds the per-screen context.
    pub fn bind(builder: Dri3Builder) -> Dri3Result<Dri3Screen> {
        let builder = if builder.render_node().is_none() {
            let discovered = rendernode::render_node_from_device(builder.device_node());
            if let Some(node) = &discovered {
                info!("using render node {}", node.display());
            }
            builder.set_render_node(discovered)
        } else {
            builder
        };

        match builder.build() {
            Ok(dri3) => Ok(Dri3Screen { dri3 }),
            Err(e) => {
                warn!("dri3 screen binding failed: {}", e);
                Err(e)
            }
        }
    }

    /// `open` callback: hands the client an opened, authenticated device
    /// handle, or the status explaining why not.
    pub fn open(&self) -> Result<SafeDescriptor, HostStatus> {
        self.dri3.open_device().map_err(|e| e.host_status())
    }

    /// Single-descriptor import callback.
    pub fn surface_from_single_fd(
        &self,
        fd: Descriptor,
        width: u16,
        height: u16,
        stride: u16,
        depth: u8,
        bits_per_pixel: u8,
    ) -> Option<Surface> {
        let planes = ImportPlanes::single(fd, u32::from(stride));
        let geometry = SurfaceGeometry {
            width,
            height,
            depth,
            bits_per_pixel,
        };
        self.dri3.import_surface(geometry, &planes).ok()
    }

    /// Per-plane import callback, carrying an explicit modifier.
    pub fn surface_from_fds(
        &self,
        planes: &ImportPlanes,
        width: u16,
        height: u16,
        depth: u8,
        bits_per_pixel: u8,
    ) -> Option<Surface> {
        let geometry = SurfaceGeometry {
            width,
            height,
            depth,
            bits_per_pixel,
        };
        self.dri3.import_surface(geometry, planes).ok()
    }

    /// Single-descriptor export callback.  `None` stands for the protocol's
    /// -1 return.
    pub fn single_fd_from_surface(&self, surface: &Surface) -> Option<ExportedBuffer> {
        self.dri3.export_surface(surface).ok()
    }

    /// Per-plane export callback.  `None` stands for the protocol's -1
    /// return; output arrays are never partially populated.
    pub fn fds_from_surface(&self, surface: &Surface) -> Option<BufferDescriptor> {
        self.dri3.export_surface_planes(surface).ok()
    }

    /// Format enumeration callback: the fixed catalog, as raw fourccs.
    pub fn list_formats(&self) -> Vec<u32> {
        self.dri3.list_formats().iter().map(|f| f.0).collect()
    }

    /// Modifier enumeration callback.  Catalog errors are reported and
    /// produce an empty list rather than failing the request.
    pub fn list_modifiers(&self, format: u32) -> Vec<u64> {
        match self.dri3.list_modifiers(DrmFormat(format)) {
            Ok(modifiers) => modifiers,
            Err(e) => {
                error!("modifier query for {:?} failed: {}", DrmFormat(format), e);
                Vec::new()
            }
        }
    }

    /// Drawable-scoped modifier enumeration callback.  No drawable-specific
    /// constraints are applied yet; the screen list is authoritative.
    pub fn list_drawable_modifiers(&self, _drawable: &Surface, format: u32) -> Vec<u64> {
        self.list_modifiers(format)
    }

    /// The bound context, for host layers that need direct access.
    pub fn dri3(&self) -> &Dri3 {
        &self.dri3
    }
}
