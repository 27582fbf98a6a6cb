// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A crate for handling DRI3 buffer sharing between GPU rendering clients
//! and the display server, along with tiling-modifier negotiation.

cfg_if::cfg_if! {
    if #[cfg(not(any(target_os = "android", target_os = "linux")))] {
        compile_error!("dri3_gfx requires a Linux DRM platform");
    }
}

#[macro_use]
mod macros;

mod direct;
mod dri3_core;
mod dri3_os;
mod dri3_utils;
mod formats;
mod glamor;
mod rendernode;
mod screen;

pub use crate::direct::BufferDevice;
pub use crate::direct::BufferObject;
pub use crate::direct::DirectBackend;
pub use crate::dri3_core::Dri3;
pub use crate::dri3_core::Dri3Builder;
pub use crate::dri3_core::Surface;
pub use crate::dri3_core::SurfaceBacking;
pub use crate::dri3_core::SurfaceBackend;
pub use crate::dri3_os::AsRawDescriptor;
pub use crate::dri3_os::Descriptor;
pub use crate::dri3_os::FromRawDescriptor;
pub use crate::dri3_os::IntoRawDescriptor;
pub use crate::dri3_os::RawDescriptor;
pub use crate::dri3_os::SafeDescriptor;
pub use crate::dri3_utils::*;
pub use crate::formats::*;
pub use crate::glamor::GlamorBackend;
pub use crate::glamor::GlamorFormat;
pub use crate::glamor::GlamorPixmap;
pub use crate::glamor::GlamorPixmaps;
pub use crate::rendernode::open_client_device;
pub use crate::rendernode::render_node_from_device;
pub use crate::rendernode::DrmAuth;
pub use crate::rendernode::KernelDrmAuth;
pub use crate::screen::Dri3Screen;
pub use crate::screen::DRI3_SCREEN_INFO_VERSION;
