// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! direct: surface import/export over kernel buffer objects, used when the
//! accelerated library is not active.

use std::sync::Arc;

use crate::dri3_core::Surface;
use crate::dri3_core::SurfaceBackend;
use crate::dri3_core::SurfaceBacking;
use crate::dri3_os::Descriptor;
use crate::dri3_os::SafeDescriptor;
use crate::dri3_utils::*;

/// A kernel buffer object bound to a surface.
pub trait BufferObject {
    /// Size in bytes of the underlying allocation.
    fn alloc_size(&self) -> Dri3Result<u64>;

    /// Exports a fresh descriptor referencing the same memory.
    fn export_dmabuf(&self) -> Dri3Result<SafeDescriptor>;

    /// Tiling layout of the object.  Only objects allocated through the
    /// device-memory layer know their layout; kernel-allocated objects report
    /// no modifier until legacy tiling metadata can be translated.
    fn format_modifier(&self) -> u64 {
        DRM_FORMAT_MOD_INVALID
    }
}

/// The kernel side of the direct path: turns client descriptors into buffer
/// objects.
pub trait BufferDevice {
    /// Imports `fd` as a buffer object without allocating new storage.  The
    /// descriptor is borrowed; the kernel takes its own reference.
    fn import_dmabuf(&self, fd: Descriptor) -> Dri3Result<Box<dyn BufferObject>>;
}

/// The direct surface backend.
pub struct DirectBackend {
    device: Arc<dyn BufferDevice>,
}

impl DirectBackend {
    pub fn new(device: Arc<dyn BufferDevice>) -> DirectBackend {
        DirectBackend { device }
    }
}

impl SurfaceBackend for DirectBackend {
    fn import(&self, geometry: SurfaceGeometry, planes: &ImportPlanes) -> Dri3Result<Surface> {
        if planes.num_planes != 1 {
            return Err(Dri3Error::InvalidPlaneCount(planes.num_planes));
        }
        match geometry.bits_per_pixel {
            8 | 16 | 32 => {}
            bpp => return Err(Dri3Error::InvalidBitsPerPixel(bpp)),
        }

        let plane = planes.plane(0)?;

        // Zero-size first, then size in place, then bind storage.  A failure
        // at any step drops the half-built surface before returning.
        let mut surface = Surface::new_unbacked(geometry.depth, SurfaceUsage::empty().shared(true));
        surface.modify_header(
            geometry.width,
            geometry.height,
            geometry.bits_per_pixel,
            plane.stride,
        )?;

        let bo = self.device.import_dmabuf(plane.fd)?;
        surface.set_backing(SurfaceBacking::BufferObject(bo));
        Ok(surface)
    }

    fn export_single(&self, surface: &Surface) -> Dri3Result<ExportedBuffer> {
        let bo = surface.buffer_object()?;

        let stride = surface.stride();
        let max_stride = u32::from(u16::MAX);
        checked_range!(stride; <= max_stride)?;

        let size = bo.alloc_size()?;
        let max_size = u64::from(u32::MAX);
        checked_range!(size; <= max_size)?;

        let fd = bo.export_dmabuf()?;
        Ok(ExportedBuffer {
            fd,
            stride: stride as u16,
            size: size as u32,
        })
    }

    fn export_multi(&self, surface: &Surface) -> Dri3Result<BufferDescriptor> {
        let bo = surface.buffer_object()?;

        // Object liveness check; the size itself is not part of the
        // per-plane reply.
        bo.alloc_size()?;
        let fd = bo.export_dmabuf()?;

        let mut desc = BufferDescriptor::default();
        // Only one plane is reported for directly backed surfaces.
        // TODO: report additional planes once per-plane layouts for tiled
        // kernel allocations are plumbed through.
        desc.num_planes = 1;
        desc.fds[0] = Some(fd);
        desc.strides[0] = surface.stride();
        desc.offsets[0] = 0;
        desc.modifier = bo.format_modifier();
        Ok(desc)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::sync::Arc;

    use super::*;

    struct FakeKernelBo {
        size: u64,
    }

    impl BufferObject for FakeKernelBo {
        fn alloc_size(&self) -> Dri3Result<u64> {
            Ok(self.size)
        }

        fn export_dmabuf(&self) -> Dri3Result<SafeDescriptor> {
            Ok(SafeDescriptor::from(File::open("/dev/null").unwrap()))
        }
    }

    struct FakeGbmBo {
        size: u64,
        modifier: u64,
    }

    impl BufferObject for FakeGbmBo {
        fn alloc_size(&self) -> Dri3Result<u64> {
            Ok(self.size)
        }

        fn export_dmabuf(&self) -> Dri3Result<SafeDescriptor> {
            Ok(SafeDescriptor::from(File::open("/dev/null").unwrap()))
        }

        fn format_modifier(&self) -> u64 {
            self.modifier
        }
    }

    struct FakeDevice {
        gbm_modifier: Option<u64>,
    }

    impl BufferDevice for FakeDevice {
        fn import_dmabuf(&self, _fd: Descriptor) -> Dri3Result<Box<dyn BufferObject>> {
            match self.gbm_modifier {
                Some(modifier) => Ok(Box::new(FakeGbmBo {
                    size: 4096 * 1024,
                    modifier,
                })),
                None => Ok(Box::new(FakeKernelBo { size: 4096 * 1024 })),
            }
        }
    }

    fn backend(gbm_modifier: Option<u64>) -> DirectBackend {
        DirectBackend::new(Arc::new(FakeDevice { gbm_modifier }))
    }

    fn null_fd() -> (File, Descriptor) {
        use std::os::unix::io::AsRawFd;

        let file = File::open("/dev/null").unwrap();
        let fd = Descriptor(file.as_raw_fd());
        (file, fd)
    }

    fn geometry(width: u16, height: u16, depth: u8, bits_per_pixel: u8) -> SurfaceGeometry {
        SurfaceGeometry {
            width,
            height,
            depth,
            bits_per_pixel,
        }
    }

    #[test]
    fn import_requires_exactly_one_plane() {
        let (_file, fd) = null_fd();
        let mut planes = ImportPlanes::single(fd, 2560);
        planes.num_planes = 2;
        planes.planes[1] = planes.planes[0];

        let result = backend(None).import(geometry(640, 480, 24, 32), &planes);
        assert!(matches!(result, Err(Dri3Error::InvalidPlaneCount(2))));
    }

    #[test]
    fn import_rejects_unrepresentable_bpp() {
        let (_file, fd) = null_fd();

        for bpp in [0, 4, 15, 24, 64] {
            let result = backend(None).import(
                geometry(640, 480, 24, bpp),
                &ImportPlanes::single(fd, 2560),
            );
            assert!(matches!(result, Err(Dri3Error::InvalidBitsPerPixel(_))));
        }
        for bpp in [8, 16, 32] {
            let stride = 640 * u32::from(bpp) / 8;
            let result = backend(None).import(
                geometry(640, 480, 24, bpp),
                &ImportPlanes::single(fd, stride),
            );
            assert!(result.is_ok());
        }
    }

    #[test]
    fn import_rejects_understated_stride() {
        let (_file, fd) = null_fd();

        // 640 pixels at 32bpp need at least 2560 bytes per row.
        let result = backend(None).import(
            geometry(640, 480, 24, 32),
            &ImportPlanes::single(fd, 2048),
        );
        assert!(matches!(result, Err(Dri3Error::CheckedRange { .. })));
    }

    #[test]
    fn round_trip_preserves_geometry() {
        let (_file, fd) = null_fd();
        let backend = backend(None);

        let surface = backend
            .import(geometry(640, 480, 24, 32), &ImportPlanes::single(fd, 2560))
            .unwrap();
        assert_eq!(surface.width(), 640);
        assert_eq!(surface.height(), 480);
        assert_eq!(surface.depth(), 24);
        assert_eq!(surface.bits_per_pixel(), 32);
        assert_eq!(surface.stride(), 2560);

        let exported = backend.export_single(&surface).unwrap();
        assert_eq!(exported.stride, 2560);
        assert_eq!(exported.size, 4096 * 1024);

        use std::os::unix::io::AsRawFd;
        let reimported = backend
            .import(
                geometry(640, 480, 24, 32),
                &ImportPlanes::single(
                    Descriptor(exported.fd.as_raw_fd()),
                    u32::from(exported.stride),
                ),
            )
            .unwrap();
        assert_eq!(reimported.width(), surface.width());
        assert_eq!(reimported.height(), surface.height());
        assert_eq!(reimported.stride(), surface.stride());
        assert_eq!(reimported.depth(), surface.depth());
    }

    #[test]
    fn export_rejects_strides_beyond_the_wire_width() {
        let (_file, fd) = null_fd();
        let backend = backend(None);

        // A stride above 16 bits imports fine but cannot be exported through
        // the single-descriptor reply.
        let surface = backend
            .import(geometry(16, 16, 24, 32), &ImportPlanes::single(fd, 70000))
            .unwrap();
        let result = backend.export_single(&surface);
        assert!(matches!(result, Err(Dri3Error::CheckedRange { .. })));
    }

    #[test]
    fn unbacked_surface_cannot_be_exported() {
        let backend = backend(None);
        let surface = Surface::new_unbacked(24, SurfaceUsage::empty());

        assert!(backend.export_single(&surface).is_err());
        assert!(backend.export_multi(&surface).is_err());
    }

    #[test]
    fn plane_export_of_kernel_allocations_has_no_modifier() {
        let (_file, fd) = null_fd();
        let backend = backend(None);

        let surface = backend
            .import(geometry(640, 480, 24, 32), &ImportPlanes::single(fd, 2560))
            .unwrap();
        let desc = backend.export_multi(&surface).unwrap();
        assert_eq!(desc.num_planes, 1);
        assert!(desc.fds[0].is_some());
        assert_eq!(desc.strides[0], 2560);
        assert_eq!(desc.offsets[0], 0);
        assert_eq!(desc.modifier, DRM_FORMAT_MOD_INVALID);
    }

    #[test]
    fn plane_export_reports_the_device_memory_layout() {
        let modifier = 0x0200_0000_0002_4000;
        let (_file, fd) = null_fd();
        let backend = backend(Some(modifier));

        let surface = backend
            .import(geometry(640, 480, 24, 32), &ImportPlanes::single(fd, 2560))
            .unwrap();
        let desc = backend.export_multi(&surface).unwrap();
        assert_eq!(desc.num_planes, 1);
        assert_eq!(desc.modifier, modifier);
    }
}
