// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! formats: fourcc pixel formats and the per-generation tiling-modifier
//! catalog.

use std::fmt;

use crate::dri3_utils::*;

/// A [fourcc](https://en.wikipedia.org/wiki/FourCC) format identifier.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct DrmFormat(pub u32);

impl DrmFormat {
    /// Constructs a format identifier using a fourcc byte sequence.
    #[inline(always)]
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> DrmFormat {
        DrmFormat(a as u32 | (b as u32) << 8 | (c as u32) << 16 | (d as u32) << 24)
    }

    /// Returns the fourcc code as a sequence of bytes.
    #[inline(always)]
    pub fn to_bytes(&self) -> [u8; 4] {
        let f = self.0;
        [f as u8, (f >> 8) as u8, (f >> 16) as u8, (f >> 24) as u8]
    }
}

impl From<u32> for DrmFormat {
    fn from(u: u32) -> DrmFormat {
        DrmFormat(u)
    }
}

impl From<DrmFormat> for u32 {
    fn from(f: DrmFormat) -> u32 {
        f.0
    }
}

impl fmt::Debug for DrmFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.to_bytes();
        if b.iter().all(u8::is_ascii_graphic) {
            write!(
                f,
                "fourcc({}{}{}{})",
                b[0] as char, b[1] as char, b[2] as char, b[3] as char
            )
        } else {
            write!(
                f,
                "fourcc(0x{:02x}{:02x}{:02x}{:02x})",
                b[0], b[1], b[2], b[3]
            )
        }
    }
}

pub const DRM_FORMAT_C8: DrmFormat = DrmFormat::new(b'C', b'8', b' ', b' ');
pub const DRM_FORMAT_R8: DrmFormat = DrmFormat::new(b'R', b'8', b' ', b' ');
pub const DRM_FORMAT_GR88: DrmFormat = DrmFormat::new(b'G', b'R', b'8', b'8');

pub const DRM_FORMAT_RGB565: DrmFormat = DrmFormat::new(b'R', b'G', b'1', b'6');
pub const DRM_FORMAT_XRGB1555: DrmFormat = DrmFormat::new(b'X', b'R', b'1', b'5');
pub const DRM_FORMAT_ARGB1555: DrmFormat = DrmFormat::new(b'A', b'R', b'1', b'5');

pub const DRM_FORMAT_XRGB8888: DrmFormat = DrmFormat::new(b'X', b'R', b'2', b'4');
pub const DRM_FORMAT_ARGB8888: DrmFormat = DrmFormat::new(b'A', b'R', b'2', b'4');
pub const DRM_FORMAT_XBGR8888: DrmFormat = DrmFormat::new(b'X', b'B', b'2', b'4');
pub const DRM_FORMAT_ABGR8888: DrmFormat = DrmFormat::new(b'A', b'B', b'2', b'4');

pub const DRM_FORMAT_XRGB2101010: DrmFormat = DrmFormat::new(b'X', b'R', b'3', b'0');
pub const DRM_FORMAT_ARGB2101010: DrmFormat = DrmFormat::new(b'A', b'R', b'3', b'0');
pub const DRM_FORMAT_XBGR2101010: DrmFormat = DrmFormat::new(b'X', b'B', b'3', b'0');
pub const DRM_FORMAT_ABGR2101010: DrmFormat = DrmFormat::new(b'A', b'B', b'3', b'0');

pub const DRM_FORMAT_NV12: DrmFormat = DrmFormat::new(b'N', b'V', b'1', b'2');
pub const DRM_FORMAT_NV21: DrmFormat = DrmFormat::new(b'N', b'V', b'2', b'1');
pub const DRM_FORMAT_YUV420: DrmFormat = DrmFormat::new(b'Y', b'U', b'1', b'2');
pub const DRM_FORMAT_YVU420: DrmFormat = DrmFormat::new(b'Y', b'V', b'1', b'2');

pub const DRM_FORMAT_YUYV: DrmFormat = DrmFormat::new(b'Y', b'U', b'Y', b'V');
pub const DRM_FORMAT_UYVY: DrmFormat = DrmFormat::new(b'U', b'Y', b'V', b'Y');
pub const DRM_FORMAT_NV16: DrmFormat = DrmFormat::new(b'N', b'V', b'1', b'6');

pub const DRM_FORMAT_YUV444: DrmFormat = DrmFormat::new(b'Y', b'U', b'2', b'4');
pub const DRM_FORMAT_P010: DrmFormat = DrmFormat::new(b'P', b'0', b'1', b'0');

/// The fixed format catalog advertised to clients, independent of hardware
/// generation: packed RGB, legacy and low-bit-depth packed, planar YUV in
/// 4:2:0, 4:2:2 and 4:4:4 flavors, and the 10-bit variants.
pub const FORMATS: [DrmFormat; 23] = [
    DRM_FORMAT_C8,
    DRM_FORMAT_R8,
    DRM_FORMAT_GR88,
    DRM_FORMAT_RGB565,
    DRM_FORMAT_XRGB1555,
    DRM_FORMAT_ARGB1555,
    DRM_FORMAT_XRGB8888,
    DRM_FORMAT_ARGB8888,
    DRM_FORMAT_XBGR8888,
    DRM_FORMAT_ABGR8888,
    DRM_FORMAT_XRGB2101010,
    DRM_FORMAT_ARGB2101010,
    DRM_FORMAT_XBGR2101010,
    DRM_FORMAT_ABGR2101010,
    DRM_FORMAT_NV12,
    DRM_FORMAT_NV21,
    DRM_FORMAT_YUV420,
    DRM_FORMAT_YVU420,
    DRM_FORMAT_YUYV,
    DRM_FORMAT_UYVY,
    DRM_FORMAT_NV16,
    DRM_FORMAT_YUV444,
    DRM_FORMAT_P010,
];

// Kernel hardware family identifiers, as reported by the device-info query.
pub const FAMILY_AI: u32 = 141;
pub const FAMILY_NV: u32 = 143;
pub const FAMILY_GFX1200: u32 = 152;

/// Hardware generation tier used to scope tiling-layout advertisement,
/// ordered oldest to newest.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum GpuGeneration {
    PreGfx9,
    Gfx9,
    Gfx10,
    Gfx12,
}

impl GpuGeneration {
    /// Classifies a kernel family identifier into a generation tier.
    /// Families between the gfx10 and gfx12 thresholds are gfx10/gfx11 parts
    /// and share the GFX10+ tier.
    pub fn from_family(family: u32) -> GpuGeneration {
        if family >= FAMILY_GFX1200 {
            GpuGeneration::Gfx12
        } else if family >= FAMILY_NV {
            GpuGeneration::Gfx10
        } else if family >= FAMILY_AI {
            GpuGeneration::Gfx9
        } else {
            GpuGeneration::PreGfx9
        }
    }
}

const DRM_FORMAT_MOD_VENDOR_AMD: u64 = 0x02;

const AMD_FMT_MOD_TILE_VERSION_SHIFT: u64 = 8;
const AMD_FMT_MOD_TILE_SHIFT: u64 = 13;

const AMD_FMT_MOD_TILE_VER_GFX9: u64 = 1;
const AMD_FMT_MOD_TILE_VER_GFX10: u64 = 2;
const AMD_FMT_MOD_TILE_VER_GFX12: u64 = 5;

const AMD_FMT_MOD_TILE_GFX9_64K_S: u64 = 9;
const AMD_FMT_MOD_TILE_GFX9_64K_D: u64 = 10;
const AMD_FMT_MOD_TILE_GFX9_64K_R_X: u64 = 27;

const AMD_FMT_MOD_TILE_GFX12_256B_2D: u64 = 1;
const AMD_FMT_MOD_TILE_GFX12_4K_2D: u64 = 2;
const AMD_FMT_MOD_TILE_GFX12_64K_2D: u64 = 3;
const AMD_FMT_MOD_TILE_GFX12_256K_2D: u64 = 4;

const fn amd_fmt_mod(tile_version: u64, tile: u64) -> u64 {
    (DRM_FORMAT_MOD_VENDOR_AMD << 56)
        | (tile_version << AMD_FMT_MOD_TILE_VERSION_SHIFT)
        | (tile << AMD_FMT_MOD_TILE_SHIFT)
}

/// Conceptual tile-layout family of a modifier.  Tile encodings are
/// incompatible across hardware generations; the class is what stays
/// comparable when newer tiers supersede older ones.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TileClass {
    Untiled,
    Standard,
    Display,
    Render,
    Compact,
}

/// A modifier together with its conceptual class.
#[derive(Copy, Clone, Debug)]
pub struct ModifierEntry {
    pub modifier: u64,
    pub class: TileClass,
}

const fn entry(modifier: u64, class: TileClass) -> ModifierEntry {
    ModifierEntry { modifier, class }
}

static PRE_GFX9_MODIFIERS: [ModifierEntry; 1] =
    [entry(DRM_FORMAT_MOD_INVALID, TileClass::Untiled)];

static GFX9_MODIFIERS: [ModifierEntry; 3] = [
    entry(DRM_FORMAT_MOD_INVALID, TileClass::Untiled),
    entry(
        amd_fmt_mod(AMD_FMT_MOD_TILE_VER_GFX9, AMD_FMT_MOD_TILE_GFX9_64K_S),
        TileClass::Standard,
    ),
    entry(
        amd_fmt_mod(AMD_FMT_MOD_TILE_VER_GFX9, AMD_FMT_MOD_TILE_GFX9_64K_D),
        TileClass::Display,
    ),
];

static GFX10_MODIFIERS: [ModifierEntry; 4] = [
    entry(DRM_FORMAT_MOD_INVALID, TileClass::Untiled),
    entry(
        amd_fmt_mod(AMD_FMT_MOD_TILE_VER_GFX10, AMD_FMT_MOD_TILE_GFX9_64K_R_X),
        TileClass::Render,
    ),
    entry(
        amd_fmt_mod(AMD_FMT_MOD_TILE_VER_GFX10, AMD_FMT_MOD_TILE_GFX9_64K_S),
        TileClass::Standard,
    ),
    entry(
        amd_fmt_mod(AMD_FMT_MOD_TILE_VER_GFX10, AMD_FMT_MOD_TILE_GFX9_64K_D),
        TileClass::Display,
    ),
];

static GFX12_MODIFIERS: [ModifierEntry; 5] = [
    entry(DRM_FORMAT_MOD_INVALID, TileClass::Untiled),
    entry(
        amd_fmt_mod(AMD_FMT_MOD_TILE_VER_GFX12, AMD_FMT_MOD_TILE_GFX12_256K_2D),
        TileClass::Render,
    ),
    entry(
        amd_fmt_mod(AMD_FMT_MOD_TILE_VER_GFX12, AMD_FMT_MOD_TILE_GFX12_64K_2D),
        TileClass::Standard,
    ),
    entry(
        amd_fmt_mod(AMD_FMT_MOD_TILE_VER_GFX12, AMD_FMT_MOD_TILE_GFX12_4K_2D),
        TileClass::Display,
    ),
    entry(
        amd_fmt_mod(AMD_FMT_MOD_TILE_VER_GFX12, AMD_FMT_MOD_TILE_GFX12_256B_2D),
        TileClass::Compact,
    ),
];

/// Ordered modifier table for a generation tier.  Every tier starts with the
/// always-legal untiled entry, and every tier's class set strictly contains
/// the class set of the tier before it.
pub fn modifier_table(generation: GpuGeneration) -> &'static [ModifierEntry] {
    match generation {
        GpuGeneration::PreGfx9 => &PRE_GFX9_MODIFIERS,
        GpuGeneration::Gfx9 => &GFX9_MODIFIERS,
        GpuGeneration::Gfx10 => &GFX10_MODIFIERS,
        GpuGeneration::Gfx12 => &GFX12_MODIFIERS,
    }
}

/// The fixed format list advertised to clients.
pub fn list_formats() -> &'static [DrmFormat] {
    &FORMATS
}

/// Ordered modifier list for `format` on `generation`.  Formats outside the
/// catalog are rejected; the untiled entry always leads the list.
pub fn list_modifiers(format: DrmFormat, generation: GpuGeneration) -> Dri3Result<Vec<u64>> {
    if !FORMATS.contains(&format) {
        return Err(Dri3Error::InvalidDrmFormat);
    }

    Ok(modifier_table(generation)
        .iter()
        .map(|e| e.modifier)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fmt::Write;

    use super::*;

    const ALL_GENERATIONS: [GpuGeneration; 4] = [
        GpuGeneration::PreGfx9,
        GpuGeneration::Gfx9,
        GpuGeneration::Gfx10,
        GpuGeneration::Gfx12,
    ];

    #[test]
    fn format_debug() {
        let f = DrmFormat::new(b'X', b'R', b'2', b'4');
        let mut buf = String::new();
        write!(&mut buf, "{:?}", f).unwrap();
        assert_eq!(buf, "fourcc(XR24)");

        let f = DrmFormat::new(0, 1, 2, 16);
        let mut buf = String::new();
        write!(&mut buf, "{:?}", f).unwrap();
        assert_eq!(buf, "fourcc(0x00010210)");
    }

    #[test]
    fn catalog_is_fixed_and_ordered() {
        assert_eq!(list_formats().len(), 23);
        assert_eq!(list_formats()[0], DRM_FORMAT_C8);
        assert_eq!(list_formats()[22], DRM_FORMAT_P010);
    }

    #[test]
    fn untiled_listed_exactly_once_everywhere() {
        for generation in ALL_GENERATIONS {
            for format in list_formats() {
                let modifiers = list_modifiers(*format, generation).unwrap();
                let untiled = modifiers
                    .iter()
                    .filter(|m| **m == DRM_FORMAT_MOD_INVALID)
                    .count();
                assert_eq!(untiled, 1, "{:?} {:?}", generation, format);
                assert_eq!(modifiers[0], DRM_FORMAT_MOD_INVALID);
            }
        }
    }

    fn classes(generation: GpuGeneration) -> Vec<TileClass> {
        modifier_table(generation).iter().map(|e| e.class).collect()
    }

    #[test]
    fn tiers_grow_by_class() {
        let pre = classes(GpuGeneration::PreGfx9);
        let gfx9 = classes(GpuGeneration::Gfx9);
        let gfx10 = classes(GpuGeneration::Gfx10);
        let gfx12 = classes(GpuGeneration::Gfx12);

        assert_eq!(pre, vec![TileClass::Untiled]);
        for class in &pre {
            assert!(gfx9.contains(class));
        }
        for class in &gfx9 {
            assert!(gfx10.contains(class));
        }
        for class in &gfx10 {
            assert!(gfx12.contains(class));
        }

        // Strictly growing, not merely non-shrinking.
        assert!(gfx9.len() > pre.len());
        assert!(gfx10.len() > gfx9.len());
        assert!(gfx12.len() > gfx10.len());
    }

    #[test]
    fn tiled_layouts_are_generation_scoped() {
        // A gfx9 swizzle must not be advertised for pre-gfx9 parts, and each
        // tier's tiled entries carry that tier's own encoding.
        let gfx9 = list_modifiers(DRM_FORMAT_XRGB8888, GpuGeneration::Gfx9).unwrap();
        let pre = list_modifiers(DRM_FORMAT_XRGB8888, GpuGeneration::PreGfx9).unwrap();
        for modifier in gfx9.iter().skip(1) {
            assert!(!pre.contains(modifier));
        }

        let gfx10 = list_modifiers(DRM_FORMAT_XRGB8888, GpuGeneration::Gfx10).unwrap();
        for modifier in gfx10.iter().skip(1) {
            assert!(!gfx9.contains(modifier));
        }
    }

    #[test]
    fn family_thresholds() {
        assert_eq!(GpuGeneration::from_family(110), GpuGeneration::PreGfx9);
        assert_eq!(GpuGeneration::from_family(130), GpuGeneration::PreGfx9);
        assert_eq!(GpuGeneration::from_family(FAMILY_AI), GpuGeneration::Gfx9);
        assert_eq!(GpuGeneration::from_family(142), GpuGeneration::Gfx9);
        assert_eq!(GpuGeneration::from_family(FAMILY_NV), GpuGeneration::Gfx10);
        assert_eq!(GpuGeneration::from_family(148), GpuGeneration::Gfx10);
        assert_eq!(
            GpuGeneration::from_family(FAMILY_GFX1200),
            GpuGeneration::Gfx12
        );
    }

    #[test]
    fn unknown_format_is_rejected() {
        let bogus = DrmFormat::new(b'Z', b'Z', b'9', b'9');
        for generation in ALL_GENERATIONS {
            assert!(list_modifiers(bogus, generation).is_err());
        }
    }
}
