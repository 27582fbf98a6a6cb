// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! dri3_utils: Utility enums, structs, and implementations needed by the rest
//! of the crate.

use std::io::Error as IoError;
use std::num::TryFromIntError;

use nix::Error as NixError;
use remain::sorted;
use thiserror::Error;

use crate::dri3_os::Descriptor;
use crate::dri3_os::SafeDescriptor;

/// Maximum number of memory planes a shared buffer may carry, per the DRI3
/// wire format.
pub const DRI3_MAX_PLANES: usize = 4;

/// The 64-bit tiling-layout identifier reserved to mean "no modifier": the
/// buffer is linear, or layout information travels out of band.  Always legal
/// on every hardware generation.
pub const DRM_FORMAT_MOD_INVALID: u64 = 0x00ff_ffff_ffff_ffff;

/// Status codes reported to the host surface-sharing extension.  Values are
/// bit-compatible with the host's Success/BadMatch/BadAlloc taxonomy.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostStatus {
    Success = 0,
    MatchError = 8,
    AllocationError = 11,
}

/// An error generated while using this crate.
#[sorted]
#[derive(Error, Debug)]
pub enum Dri3Error {
    /// The kernel rejected the one-time authentication token.
    #[error("device authentication rejected")]
    AuthenticationRejected,
    /// Checked arithmetic error.
    #[error("arithmetic failed: {}({}) {op} {}({})", .field1.0, .field1.1, .field2.0, .field2.1)]
    CheckedArithmetic {
        field1: (&'static str, usize),
        field2: (&'static str, usize),
        op: &'static str,
    },
    /// Checked range error.
    #[error("range check failed: {}({}) vs {}({})", .field1.0, .field1.1, .field2.0, .field2.1)]
    CheckedRange {
        field1: (&'static str, usize),
        field2: (&'static str, usize),
    },
    /// An internal backend component error was returned.
    #[error("backend component failed with error {0}")]
    ComponentError(i32),
    /// A bits-per-pixel value the direct path cannot represent.
    #[error("unsupported bits per pixel: {0}")]
    InvalidBitsPerPixel(u8),
    /// A pixel depth no import path can map.
    #[error("unsupported pixel depth: {0}")]
    InvalidDepth(u8),
    /// Indicates an error in the Dri3Builder.
    #[error("invalid dri3 build parameters: {0}")]
    InvalidDri3Build(&'static str),
    /// A fourcc outside the advertised format catalog.
    #[error("invalid DRM format")]
    InvalidDrmFormat,
    /// Plane count is zero, above the wire limit, or wrong for the active
    /// path.
    #[error("invalid plane count: {0}")]
    InvalidPlaneCount(usize),
    /// The plane count and modifier cannot be combined.
    #[error("plane count and modifier combination is unsupported")]
    InvalidPlaneLayout,
    /// The surface carries no backing object the operation can use.
    #[error("surface has no usable backing storage")]
    InvalidSurfaceBacking,
    /// An input/output error occurred.
    #[error("an input/output error occurred: {0}")]
    IoError(IoError),
    /// Nix crate error.
    #[error("the errno is {0}")]
    NixError(NixError),
    /// An attempted integer conversion failed.
    #[error("int conversion failed: {0}")]
    TryFromIntError(TryFromIntError),
    /// The requested function is not implemented.
    #[error("the requested function is not implemented")]
    Unsupported,
}

impl From<NixError> for Dri3Error {
    fn from(e: NixError) -> Dri3Error {
        Dri3Error::NixError(e)
    }
}

impl From<IoError> for Dri3Error {
    fn from(e: IoError) -> Dri3Error {
        Dri3Error::IoError(e)
    }
}

impl From<TryFromIntError> for Dri3Error {
    fn from(e: TryFromIntError) -> Dri3Error {
        Dri3Error::TryFromIntError(e)
    }
}

impl Dri3Error {
    /// Collapses the error into the host extension's status taxonomy:
    /// protocol and capability mismatches become `MatchError`, resource
    /// exhaustion becomes `AllocationError`.
    pub fn host_status(&self) -> HostStatus {
        match self {
            Dri3Error::AuthenticationRejected
            | Dri3Error::CheckedArithmetic { .. }
            | Dri3Error::CheckedRange { .. }
            | Dri3Error::InvalidBitsPerPixel(_)
            | Dri3Error::InvalidDepth(_)
            | Dri3Error::InvalidDrmFormat
            | Dri3Error::InvalidPlaneCount(_)
            | Dri3Error::InvalidPlaneLayout
            | Dri3Error::InvalidSurfaceBacking
            | Dri3Error::TryFromIntError(_)
            | Dri3Error::Unsupported => HostStatus::MatchError,
            Dri3Error::ComponentError(_)
            | Dri3Error::InvalidDri3Build(_)
            | Dri3Error::IoError(_)
            | Dri3Error::NixError(_) => HostStatus::AllocationError,
        }
    }
}

/// The result of an operation in this crate.
pub type Dri3Result<T> = std::result::Result<T, Dri3Error>;

const DRI3_SURFACE_SHARED: u32 = 1 << 0;
const DRI3_SURFACE_SCANOUT: u32 = 1 << 1;

/// Usage flags attached to a surface when it is created or imported.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct SurfaceUsage(pub u32);

impl SurfaceUsage {
    /// Returns empty set of flags.
    #[inline(always)]
    pub fn empty() -> SurfaceUsage {
        SurfaceUsage(0)
    }

    /// Sets the shared flag's presence.  Shared surfaces reference storage
    /// owned by another process or by the rendering library.
    #[inline(always)]
    pub fn shared(self, e: bool) -> SurfaceUsage {
        if e {
            SurfaceUsage(self.0 | DRI3_SURFACE_SHARED)
        } else {
            SurfaceUsage(self.0 & !DRI3_SURFACE_SHARED)
        }
    }

    /// Sets the scanout flag's presence.
    #[inline(always)]
    pub fn scanout(self, e: bool) -> SurfaceUsage {
        if e {
            SurfaceUsage(self.0 | DRI3_SURFACE_SCANOUT)
        } else {
            SurfaceUsage(self.0 & !DRI3_SURFACE_SCANOUT)
        }
    }

    /// Returns true if the shared flag is set.
    #[inline(always)]
    pub fn is_shared(self) -> bool {
        self.0 & DRI3_SURFACE_SHARED != 0
    }

    /// Returns true if the scanout flag is set.
    #[inline(always)]
    pub fn is_scanout(self) -> bool {
        self.0 & DRI3_SURFACE_SCANOUT != 0
    }
}

/// Client-supplied geometry of an import request.  All fields are untrusted
/// and validated by the importing backend.
#[derive(Copy, Clone, Debug)]
pub struct SurfaceGeometry {
    pub width: u16,
    pub height: u16,
    pub depth: u8,
    pub bits_per_pixel: u8,
}

/// One plane of an import request: a borrowed descriptor plus its layout
/// within the buffer.
#[derive(Copy, Clone, Debug)]
pub struct ImportPlane {
    pub fd: Descriptor,
    pub stride: u32,
    pub offset: u32,
}

/// Import-side plane set.  Descriptors are borrowed: the host retains
/// responsibility for request descriptors, and backends duplicate or import
/// what they keep.
pub struct ImportPlanes {
    pub num_planes: usize,
    pub planes: [Option<ImportPlane>; DRI3_MAX_PLANES],
    pub modifier: u64,
}

impl ImportPlanes {
    /// A single-plane request with no modifier, as produced by the legacy
    /// one-descriptor import entry point.
    pub fn single(fd: Descriptor, stride: u32) -> ImportPlanes {
        let mut planes: [Option<ImportPlane>; DRI3_MAX_PLANES] = Default::default();
        planes[0] = Some(ImportPlane {
            fd,
            stride,
            offset: 0,
        });
        ImportPlanes {
            num_planes: 1,
            planes,
            modifier: DRM_FORMAT_MOD_INVALID,
        }
    }

    /// Returns plane `idx`, which must be populated.
    pub fn plane(&self, idx: usize) -> Dri3Result<ImportPlane> {
        self.planes
            .get(idx)
            .and_then(|p| *p)
            .ok_or(Dri3Error::InvalidPlaneCount(idx))
    }
}

/// Wire-level representation of an exported surface: one duplicate descriptor
/// per plane, matching stride and offset arrays, and a single modifier shared
/// by all planes.  Produced transiently per export call.
pub struct BufferDescriptor {
    pub num_planes: usize,
    pub fds: [Option<SafeDescriptor>; DRI3_MAX_PLANES],
    pub strides: [u32; DRI3_MAX_PLANES],
    pub offsets: [u32; DRI3_MAX_PLANES],
    pub modifier: u64,
}

impl Default for BufferDescriptor {
    fn default() -> BufferDescriptor {
        BufferDescriptor {
            num_planes: 0,
            fds: Default::default(),
            strides: [0; DRI3_MAX_PLANES],
            offsets: [0; DRI3_MAX_PLANES],
            modifier: DRM_FORMAT_MOD_INVALID,
        }
    }
}

/// Result of a single-descriptor export: a freshly duplicated descriptor, the
/// row stride, and the allocation size, in the wire widths of the host reply.
pub struct ExportedBuffer {
    pub fd: SafeDescriptor,
    pub stride: u16,
    pub size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_status_values_match_host_taxonomy() {
        assert_eq!(HostStatus::Success as u8, 0);
        assert_eq!(HostStatus::MatchError as u8, 8);
        assert_eq!(HostStatus::AllocationError as u8, 11);
    }

    #[test]
    fn mismatches_map_to_match_error() {
        assert_eq!(
            Dri3Error::AuthenticationRejected.host_status(),
            HostStatus::MatchError
        );
        assert_eq!(
            Dri3Error::InvalidDepth(4).host_status(),
            HostStatus::MatchError
        );
        assert_eq!(
            Dri3Error::InvalidPlaneLayout.host_status(),
            HostStatus::MatchError
        );
    }

    #[test]
    fn exhaustion_maps_to_allocation_error() {
        let open_failure = Dri3Error::IoError(std::io::Error::from_raw_os_error(libc::ENOENT));
        assert_eq!(open_failure.host_status(), HostStatus::AllocationError);
        assert_eq!(
            Dri3Error::ComponentError(-22).host_status(),
            HostStatus::AllocationError
        );
    }

    #[test]
    fn single_plane_request_has_no_modifier() {
        let planes = ImportPlanes::single(Descriptor(-1), 256);
        assert_eq!(planes.num_planes, 1);
        assert_eq!(planes.modifier, DRM_FORMAT_MOD_INVALID);
        assert_eq!(planes.plane(0).unwrap().stride, 256);
        assert!(planes.plane(1).is_err());
    }
}
