// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! dri3_core: the surface type, the backend capability trait, and the
//! per-screen context that dispatches buffer import/export requests.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use crate::direct::BufferDevice;
use crate::direct::BufferObject;
use crate::direct::DirectBackend;
use crate::dri3_os::SafeDescriptor;
use crate::dri3_utils::*;
use crate::formats;
use crate::formats::DrmFormat;
use crate::formats::GpuGeneration;
use crate::glamor::GlamorBackend;
use crate::glamor::GlamorPixmap;
use crate::glamor::GlamorPixmaps;
use crate::rendernode;
use crate::rendernode::DrmAuth;

/// Backing storage attached to a surface.
pub enum SurfaceBacking {
    /// No storage yet; the state of a freshly allocated zero-size surface.
    Unbacked,
    /// Storage managed by the accelerated rendering library.
    Pixmap(Box<dyn GlamorPixmap>),
    /// A kernel buffer object bound through the direct path.
    BufferObject(Box<dyn BufferObject>),
}

/// An internal 2D pixel buffer shareable across process boundaries.
///
/// The display server's surface registry owns surfaces once they are
/// returned; this module only destroys them (by dropping) on import failure
/// paths.
pub struct Surface {
    width: u16,
    height: u16,
    depth: u8,
    bits_per_pixel: u8,
    stride: u32,
    usage: SurfaceUsage,
    backing: SurfaceBacking,
}

impl Surface {
    /// Allocates a zero-size surface with no associated storage.
    pub(crate) fn new_unbacked(depth: u8, usage: SurfaceUsage) -> Surface {
        Surface {
            width: 0,
            height: 0,
            depth,
            bits_per_pixel: 0,
            stride: 0,
            usage,
            backing: SurfaceBacking::Unbacked,
        }
    }

    /// Wraps an imported library pixmap in a surface.
    pub(crate) fn with_pixmap(
        geometry: SurfaceGeometry,
        stride: u32,
        pixmap: Box<dyn GlamorPixmap>,
        usage: SurfaceUsage,
    ) -> Surface {
        Surface {
            width: geometry.width,
            height: geometry.height,
            depth: geometry.depth,
            bits_per_pixel: geometry.bits_per_pixel,
            stride,
            usage,
            backing: SurfaceBacking::Pixmap(pixmap),
        }
    }

    /// Re-sizes and re-strides the surface in place, leaving storage alone.
    /// The geometry is client-supplied and must stay addressable through
    /// 32-bit offsets.
    pub(crate) fn modify_header(
        &mut self,
        width: u16,
        height: u16,
        bits_per_pixel: u8,
        stride: u32,
    ) -> Dri3Result<()> {
        let bytes_per_pixel = u32::from(bits_per_pixel) / 8;
        let row_width = u32::from(width);
        let min_stride = checked_arithmetic!(row_width * bytes_per_pixel)?;
        checked_range!(min_stride; <= stride)?;

        let rows = u32::from(height);
        checked_arithmetic!(stride * rows)?;

        self.width = width;
        self.height = height;
        self.bits_per_pixel = bits_per_pixel;
        self.stride = stride;
        Ok(())
    }

    pub(crate) fn set_backing(&mut self, backing: SurfaceBacking) {
        self.backing = backing;
    }

    pub(crate) fn pixmap(&self) -> Dri3Result<&dyn GlamorPixmap> {
        match &self.backing {
            SurfaceBacking::Pixmap(pixmap) => Ok(pixmap.as_ref()),
            _ => Err(Dri3Error::InvalidSurfaceBacking),
        }
    }

    pub(crate) fn buffer_object(&self) -> Dri3Result<&dyn BufferObject> {
        match &self.backing {
            SurfaceBacking::BufferObject(bo) => Ok(bo.as_ref()),
            _ => Err(Dri3Error::InvalidSurfaceBacking),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn bits_per_pixel(&self) -> u8 {
        self.bits_per_pixel
    }

    /// Length in bytes of one pixel row.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn usage(&self) -> SurfaceUsage {
        self.usage
    }
}

/// Capability interface over the two buffer-management paths.  One
/// implementation is selected when the screen is bound; requests dispatch
/// through it without re-checking which path is active.
pub trait SurfaceBackend {
    /// Constructs a surface from externally supplied plane descriptors.
    fn import(&self, geometry: SurfaceGeometry, planes: &ImportPlanes) -> Dri3Result<Surface>;

    /// Produces a single-descriptor export of `surface`.
    fn export_single(&self, surface: &Surface) -> Dri3Result<ExportedBuffer>;

    /// Produces a per-plane export of `surface`.
    fn export_multi(&self, surface: &Surface) -> Dri3Result<BufferDescriptor>;

    /// Submits outstanding drawing operations touching exported storage to
    /// the device.  A no-op for backends that never queue work.
    fn flush(&self) -> Dri3Result<()> {
        Ok(())
    }
}

/// Per-screen DRI3 state: the active backend, the device node paths, the
/// authentication capability, and the hardware generation.  All state is
/// explicit; independent instances never interfere.
pub struct Dri3 {
    backend: Box<dyn SurfaceBackend>,
    auth: Arc<dyn DrmAuth>,
    device_node: PathBuf,
    render_node: Option<PathBuf>,
    generation: GpuGeneration,
}

impl Dri3 {
    /// Opens a device handle for a client, preferring the unauthenticated
    /// render node and falling back to an authenticated primary handle.
    pub fn open_device(&self) -> Dri3Result<SafeDescriptor> {
        rendernode::open_client_device(
            &self.device_node,
            self.render_node.as_deref(),
            self.auth.as_ref(),
        )
    }

    /// Imports client-supplied plane descriptors into a new surface.
    ///
    /// Depths below 8 are never shareable, on either path.
    pub fn import_surface(
        &self,
        geometry: SurfaceGeometry,
        planes: &ImportPlanes,
    ) -> Dri3Result<Surface> {
        if geometry.depth < 8 {
            return Err(Dri3Error::InvalidDepth(geometry.depth));
        }
        if planes.num_planes == 0 || planes.num_planes > DRI3_MAX_PLANES {
            return Err(Dri3Error::InvalidPlaneCount(planes.num_planes));
        }

        self.backend.import(geometry, planes)
    }

    /// Exports `surface` as one descriptor plus stride and allocation size.
    pub fn export_surface(&self, surface: &Surface) -> Dri3Result<ExportedBuffer> {
        self.backend.export_single(surface)
    }

    /// Exports `surface` as per-plane descriptors plus the layout modifier.
    pub fn export_surface_planes(&self, surface: &Surface) -> Dri3Result<BufferDescriptor> {
        self.backend.export_multi(surface)
    }

    /// The fixed format catalog.
    pub fn list_formats(&self) -> &'static [DrmFormat] {
        formats::list_formats()
    }

    /// Modifiers legal for `format` on this screen's hardware generation.
    pub fn list_modifiers(&self, format: DrmFormat) -> Dri3Result<Vec<u64>> {
        formats::list_modifiers(format, self.generation)
    }

    pub fn generation(&self) -> GpuGeneration {
        self.generation
    }

    pub fn device_node(&self) -> &Path {
        &self.device_node
    }

    pub fn render_node(&self) -> Option<&Path> {
        self.render_node.as_deref()
    }
}

/// Dri3 builder, following the Rust builder pattern.
pub struct Dri3Builder {
    device_node: PathBuf,
    render_node: Option<PathBuf>,
    gpu_family: u32,
    glamor: Option<Arc<dyn GlamorPixmaps>>,
    buffer_device: Option<Arc<dyn BufferDevice>>,
    auth: Option<Arc<dyn DrmAuth>>,
}

impl Dri3Builder {
    /// Creates a new builder for the screen living on `device_node`, whose
    /// hardware reports kernel family `gpu_family`.
    pub fn new<P: Into<PathBuf>>(device_node: P, gpu_family: u32) -> Dri3Builder {
        Dri3Builder {
            device_node: device_node.into(),
            render_node: None,
            gpu_family,
            glamor: None,
            buffer_device: None,
            auth: None,
        }
    }

    /// Sets the render-capable node path, when one is already known.
    pub fn set_render_node(mut self, render_node: Option<PathBuf>) -> Dri3Builder {
        self.render_node = render_node;
        self
    }

    /// Activates the accelerated backend on top of `glamor`.
    pub fn set_glamor(mut self, glamor: Arc<dyn GlamorPixmaps>) -> Dri3Builder {
        self.glamor = Some(glamor);
        self
    }

    /// Supplies the kernel buffer-object capability used by the direct path.
    pub fn set_buffer_device(mut self, device: Arc<dyn BufferDevice>) -> Dri3Builder {
        self.buffer_device = Some(device);
        self
    }

    /// Supplies the device authentication capability.
    pub fn set_auth(mut self, auth: Arc<dyn DrmAuth>) -> Dri3Builder {
        self.auth = Some(auth);
        self
    }

    pub fn device_node(&self) -> &Path {
        &self.device_node
    }

    pub fn render_node(&self) -> Option<&Path> {
        self.render_node.as_deref()
    }

    /// Builds the per-screen context, selecting the backend exactly once:
    /// the accelerated path when a glamor capability was supplied, the direct
    /// kernel path otherwise.
    pub fn build(self) -> Dri3Result<Dri3> {
        let auth = self
            .auth
            .ok_or(Dri3Error::InvalidDri3Build("missing authentication capability"))?;

        let backend: Box<dyn SurfaceBackend> = match (self.glamor, self.buffer_device) {
            (Some(glamor), _) => Box::new(GlamorBackend::new(glamor)),
            (None, Some(device)) => Box::new(DirectBackend::new(device)),
            (None, None) => {
                return Err(Dri3Error::InvalidDri3Build(
                    "missing both glamor and buffer-device capabilities",
                ))
            }
        };

        Ok(Dri3 {
            backend,
            auth,
            device_node: self.device_node,
            render_node: self.render_node,
            generation: GpuGeneration::from_family(self.gpu_family),
        })
    }
}
