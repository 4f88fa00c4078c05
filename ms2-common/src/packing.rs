//! Vertex data packing utilities
//!
//! Provides functions to convert f32 vertex data to packed GPU formats:
//! - f32 → f16 (IEEE 754 half-float)
//! - f32 → snorm16 (signed normalized, -1.0 to 1.0)
//! - f32 → unorm8 (unsigned normalized, 0.0 to 1.0)
//! - direction → octahedral u32
//!
//! Used by `ms2-export` to turn deduplicated vertices into a GPU buffer.

use half::f16;
use serde::{Deserialize, Serialize};

// ============================================================================
// Vertex Layout
// ============================================================================

/// Layout flag: per-vertex RGBA color (unorm8x4)
pub const LAYOUT_COLOR: u8 = 1;
/// Layout flag: bone indices + weights (u8x4 + unorm8x4)
pub const LAYOUT_WEIGHTS: u8 = 2;
/// Layout flag: LOD shape key position (f16x4)
pub const LAYOUT_SHAPE_KEY: u8 = 4;
/// Layout flag: custom normal next to the vertex normal (octahedral u32)
pub const LAYOUT_CUSTOM_NORMAL: u8 = 8;
/// Layout flag: full precision positions (f32x3 + pad) instead of f16x4
pub const LAYOUT_FULL_PRECISION: u8 = 16;

/// Vertex buffer arrangement selected by the target format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshFormat {
    /// Attribute streams, half precision positions
    #[default]
    #[serde(rename = "SEPARATE")]
    Separate,
    /// Interleaved, vertex normal plus custom normal
    #[serde(rename = "INTERLEAVED_32")]
    Interleaved32,
    /// Interleaved, full precision positions plus custom normal
    #[serde(rename = "INTERLEAVED_48")]
    Interleaved48,
}

impl MeshFormat {
    /// Interleaved formats store the vertex normal and the corner normal separately
    pub fn is_interleaved(self) -> bool {
        matches!(self, Self::Interleaved32 | Self::Interleaved48)
    }

    /// Base layout flags implied by the format
    pub fn layout_flags(self) -> u8 {
        match self {
            Self::Separate => 0,
            Self::Interleaved32 => LAYOUT_CUSTOM_NORMAL,
            Self::Interleaved48 => LAYOUT_CUSTOM_NORMAL | LAYOUT_FULL_PRECISION,
        }
    }
}

/// Calculate vertex stride in bytes for packed GPU format
#[inline]
pub const fn vertex_stride_packed(layout: u8, uv_count: u8) -> u32 {
    let mut stride = if layout & LAYOUT_FULL_PRECISION != 0 {
        16 // Float32x3 + pad
    } else {
        8 // Float16x4
    };

    stride += 4; // Normal: octahedral u32
    stride += 8; // Tangent: Snorm16x4, w = bitangent sign
    stride += 4 * uv_count as u32; // Float16x2 per layer

    if layout & LAYOUT_CUSTOM_NORMAL != 0 {
        stride += 4; // Octahedral u32
    }
    if layout & LAYOUT_COLOR != 0 {
        stride += 4; // Unorm8x4
    }
    if layout & LAYOUT_WEIGHTS != 0 {
        stride += 8; // Bone indices (u8x4) + weights (unorm8x4)
    }
    if layout & LAYOUT_SHAPE_KEY != 0 {
        stride += 8; // Float16x4
    }

    stride
}

// ============================================================================
// Basic Conversion Functions
// ============================================================================

/// Convert f32 to signed normalized 16-bit integer (snorm16)
///
/// Maps f32 range [-1.0, 1.0] to i16 range [-32767, 32767].
#[inline]
pub fn f32_to_snorm16(value: f32) -> i16 {
    let clamped = value.clamp(-1.0, 1.0);
    (clamped * 32767.0) as i16
}

/// Convert f32 to unsigned normalized 8-bit integer (unorm8)
///
/// Maps f32 range [0.0, 1.0] to u8 range [0, 255].
#[inline]
pub fn f32_to_unorm8(value: f32) -> u8 {
    let clamped = value.clamp(0.0, 1.0);
    (clamped * 255.0).round() as u8
}

// ============================================================================
// Position Packing
// ============================================================================

/// Pack a 3D position (f32x3) to Float16x4 format (with w=1.0 padding)
#[inline]
pub fn pack_position_f16(x: f32, y: f32, z: f32) -> [f16; 4] {
    [
        f16::from_f32(x),
        f16::from_f32(y),
        f16::from_f32(z),
        f16::from_f32(1.0),
    ]
}

/// Pack a 3D position (f32x3) to Float32x4 format (with w=1.0 padding)
#[inline]
pub fn pack_position_f32(x: f32, y: f32, z: f32) -> [f32; 4] {
    [x, y, z, 1.0]
}

// ============================================================================
// UV Packing
// ============================================================================

/// Pack a 2D UV coordinate (f32x2) to Float16x2 format
///
/// Half floats keep tiling UVs and the fur remap range (-16..16) intact.
#[inline]
pub fn pack_uv_f16(u: f32, v: f32) -> [f16; 2] {
    [f16::from_f32(u), f16::from_f32(v)]
}

// ============================================================================
// Normal / Tangent Packing
// ============================================================================

/// Encode normalized direction to octahedral coordinates in [-1, 1]²
#[inline]
pub fn encode_octahedral(dir: glam::Vec3) -> (f32, f32) {
    let dir = dir.normalize_or_zero();

    let l1_norm = dir.x.abs() + dir.y.abs() + dir.z.abs();
    if l1_norm == 0.0 {
        return (0.0, 0.0);
    }

    let mut u = dir.x / l1_norm;
    let mut v = dir.y / l1_norm;

    if dir.z < 0.0 {
        let u_abs = u.abs();
        let v_abs = v.abs();
        u = (1.0 - v_abs) * u.signum();
        v = (1.0 - u_abs) * v.signum();
    }

    (u, v)
}

/// Decode octahedral coordinates in [-1, 1]² back to normalized direction
#[inline]
pub fn decode_octahedral(u: f32, v: f32) -> glam::Vec3 {
    let mut dir = glam::Vec3::new(u, v, 1.0 - u.abs() - v.abs());

    if dir.z < 0.0 {
        let old_x = dir.x;
        dir.x = (1.0 - dir.y.abs()) * old_x.signum();
        dir.y = (1.0 - old_x.abs()) * dir.y.signum();
    }

    dir.normalize_or_zero()
}

/// Pack Vec3 direction to u32 using octahedral encoding (2x snorm16)
#[inline]
pub fn pack_octahedral_u32(dir: glam::Vec3) -> u32 {
    let (u, v) = encode_octahedral(dir);
    let u_snorm = f32_to_snorm16(u);
    let v_snorm = f32_to_snorm16(v);
    (u_snorm as u16 as u32) | ((v_snorm as u16 as u32) << 16)
}

/// Unpack u32 to Vec3 direction using octahedral decoding
#[inline]
pub fn unpack_octahedral_u32(packed: u32) -> glam::Vec3 {
    let u_i16 = (packed & 0xFFFF) as i16;
    let v_i16 = (packed >> 16) as i16;
    let u = u_i16 as f32 / 32767.0;
    let v = v_i16 as f32 / 32767.0;
    decode_octahedral(u, v)
}

/// Pack a 3D normal to octahedral-encoded u32 (4 bytes)
#[inline]
pub fn pack_normal_octahedral(n: [f32; 3]) -> u32 {
    pack_octahedral_u32(glam::Vec3::from_array(n))
}

/// Pack a tangent to Snorm16x4, w carries the bitangent sign
#[inline]
pub fn pack_tangent_snorm16(t: [f32; 3], negate_bitangent: bool) -> [i16; 4] {
    [
        f32_to_snorm16(t[0]),
        f32_to_snorm16(t[1]),
        f32_to_snorm16(t[2]),
        if negate_bitangent { -32767 } else { 32767 },
    ]
}

// ============================================================================
// Color Packing
// ============================================================================

/// Pack an RGBA color (f32x4) to Unorm8x4 format
#[inline]
pub fn pack_color_rgba_unorm8(c: [f32; 4]) -> [u8; 4] {
    [
        f32_to_unorm8(c[0]),
        f32_to_unorm8(c[1]),
        f32_to_unorm8(c[2]),
        f32_to_unorm8(c[3]),
    ]
}

// ============================================================================
// Bone Weight Packing
// ============================================================================

/// Pack bone weights as unorm8x4 (4 bytes)
#[inline]
pub fn pack_bone_weights_unorm8(weights: [f32; 4]) -> [u8; 4] {
    weights.map(f32_to_unorm8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_position_f16() {
        let packed = pack_position_f16(1.0, 2.0, 3.0);
        assert_eq!(packed[0], f16::from_f32(1.0));
        assert_eq!(packed[1], f16::from_f32(2.0));
        assert_eq!(packed[2], f16::from_f32(3.0));
        assert_eq!(packed[3], f16::from_f32(1.0));
    }

    #[test]
    fn test_f32_to_snorm16_range() {
        assert_eq!(f32_to_snorm16(-1.0), -32767);
        assert_eq!(f32_to_snorm16(0.0), 0);
        assert_eq!(f32_to_snorm16(1.0), 32767);
        assert_eq!(f32_to_snorm16(4.0), 32767);
    }

    #[test]
    fn test_f32_to_unorm8_range() {
        assert_eq!(f32_to_unorm8(0.0), 0);
        assert_eq!(f32_to_unorm8(0.5), 128);
        assert_eq!(f32_to_unorm8(1.0), 255);
        assert_eq!(f32_to_unorm8(-1.0), 0);
    }

    #[test]
    fn test_octahedral_roundtrip() {
        let test_dirs = [
            glam::Vec3::new(1.0, 0.0, 0.0),
            glam::Vec3::new(0.0, -1.0, 0.0),
            glam::Vec3::new(0.0, 0.0, -1.0),
            glam::Vec3::new(0.577, -0.577, 0.577),
            glam::Vec3::new(-0.3, 0.2, -0.9),
        ];

        for dir in test_dirs {
            let normalized = dir.normalize();
            let decoded = unpack_octahedral_u32(pack_octahedral_u32(normalized));
            let error = (decoded - normalized).length();
            assert!(error < 0.01, "Roundtrip failed for {:?}", normalized);
        }
    }

    #[test]
    fn test_tangent_sign_in_w() {
        assert_eq!(pack_tangent_snorm16([1.0, 0.0, 0.0], false)[3], 32767);
        assert_eq!(pack_tangent_snorm16([1.0, 0.0, 0.0], true)[3], -32767);
    }

    #[test]
    fn test_vertex_stride_packed() {
        // pos + normal + tangent
        assert_eq!(vertex_stride_packed(0, 0), 20);
        // + 2 uv layers
        assert_eq!(vertex_stride_packed(0, 2), 28);
        assert_eq!(vertex_stride_packed(LAYOUT_COLOR | LAYOUT_WEIGHTS, 1), 36);
        assert_eq!(
            vertex_stride_packed(MeshFormat::Interleaved48.layout_flags(), 1),
            36
        );
    }

    #[test]
    fn test_mesh_format_names() {
        let format: MeshFormat = serde_json::from_str("\"INTERLEAVED_32\"").unwrap();
        assert_eq!(format, MeshFormat::Interleaved32);
        assert!(format.is_interleaved());
        assert!(!MeshFormat::Separate.is_interleaved());
    }
}
