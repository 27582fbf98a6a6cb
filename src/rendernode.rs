// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! rendernode: client device-node opening and the authentication gate.

use std::fs::OpenOptions;
use std::os::raw::c_uint;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::path::PathBuf;

use log::debug;
use nix::errno::Errno;
use nix::ioctl_read;
use nix::ioctl_write_ptr;
use nix::sys::stat;

use crate::dri3_os::AsRawDescriptor;
use crate::dri3_os::RawDescriptor;
use crate::dri3_os::SafeDescriptor;
use crate::dri3_utils::*;

const DRM_IOCTL_BASE: c_uint = 0x64;
const DRM_IOCTL_GET_MAGIC: c_uint = 0x02;
const DRM_IOCTL_AUTH_MAGIC: c_uint = 0x11;

// Consistent with struct drm_auth in the kernel uapi.
#[repr(C)]
#[derive(Copy, Clone)]
#[allow(non_camel_case_types)]
pub struct drm_auth {
    magic: c_uint,
}

ioctl_read!(drm_get_magic, DRM_IOCTL_BASE, DRM_IOCTL_GET_MAGIC, drm_auth);
ioctl_write_ptr!(drm_auth_magic, DRM_IOCTL_BASE, DRM_IOCTL_AUTH_MAGIC, drm_auth);

/// One-time-token authentication against the kernel: the capability the
/// display server holds through its privileged device handle.
///
/// Before descriptor passing existed, the kernel had to let the server decide
/// which clients could touch the GPU: a client fetched a unique token for its
/// handle, and the server submitted that token back to mark the handle
/// authenticated.  With descriptor passing the server performs both halves
/// itself and hands the client a ready handle.
pub trait DrmAuth {
    /// Requests a one-time authentication token for the opened handle.
    fn get_token(&self, fd: RawDescriptor) -> nix::Result<u32>;

    /// Submits a token through the privileged context, authenticating the
    /// handle the token was issued for.
    fn submit_token(&self, token: u32) -> nix::Result<()>;
}

/// `DrmAuth` over the real kernel interface.  `master` is the server's
/// already-privileged handle for this device.
pub struct KernelDrmAuth {
    master: SafeDescriptor,
}

impl KernelDrmAuth {
    pub fn new(master: SafeDescriptor) -> KernelDrmAuth {
        KernelDrmAuth { master }
    }
}

impl DrmAuth for KernelDrmAuth {
    fn get_token(&self, fd: RawDescriptor) -> nix::Result<u32> {
        let mut auth = drm_auth { magic: 0 };
        // Safe because the kernel only writes into the struct we hand it.
        unsafe { drm_get_magic(fd, &mut auth) }?;
        Ok(auth.magic)
    }

    fn submit_token(&self, token: u32) -> nix::Result<()> {
        let auth = drm_auth { magic: token };
        // Safe because the kernel only reads the struct for the duration of
        // the call.
        unsafe { drm_auth_magic(self.master.as_raw_descriptor(), &auth) }?;
        Ok(())
    }
}

fn open_node(path: &Path) -> Dri3Result<SafeDescriptor> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_CLOEXEC)
        .open(path)?;
    Ok(file.into())
}

/// Opens the primary node and runs the one-time-token handshake.
///
/// A permission-denied token request means the handle actually refers to a
/// render node reached through a legacy path and is already as authenticated
/// as it needs to be.
fn open_card_node(device_node: &Path, auth: &dyn DrmAuth) -> Dri3Result<SafeDescriptor> {
    let fd = open_node(device_node)?;

    let token = match auth.get_token(fd.as_raw_descriptor()) {
        Ok(token) => token,
        Err(Errno::EACCES) => return Ok(fd),
        Err(_) => return Err(Dri3Error::AuthenticationRejected),
    };

    auth.submit_token(token)
        .map_err(|_| Dri3Error::AuthenticationRejected)?;
    Ok(fd)
}

/// Opens a device handle for a client: the render node when one is known,
/// otherwise the primary node behind the authentication handshake.  The
/// returned handle belongs to the caller; nothing is retained here.
pub fn open_client_device(
    device_node: &Path,
    render_node: Option<&Path>,
    auth: &dyn DrmAuth,
) -> Dri3Result<SafeDescriptor> {
    if let Some(render_node) = render_node {
        match open_node(render_node) {
            Ok(fd) => return Ok(fd),
            Err(e) => debug!("render node {} not openable: {}", render_node.display(), e),
        }
    }

    open_card_node(device_node, auth)
}

/// Finds the render-capable node belonging to the primary node at
/// `device_node`, by walking the device's sysfs DRM directory.
pub fn render_node_from_device(device_node: &Path) -> Option<PathBuf> {
    let st = stat::stat(device_node).ok()?;
    let major = stat::major(st.st_rdev);
    let minor = stat::minor(st.st_rdev);

    let sys_dir = PathBuf::from(format!("/sys/dev/char/{}:{}/device/drm", major, minor));
    for entry in std::fs::read_dir(sys_dir).ok()?.flatten() {
        let name = entry.file_name();
        if let Some(name) = name.to_str() {
            if name.starts_with("renderD") {
                return Some(Path::new("/dev/dri").join(name));
            }
        }
    }

    None
}
