//! Shared types and utilities for ms2 mesh buffers
//!
//! This crate provides the GPU-side contract shared by the exporter and
//! anything that reads its output:
//!
//! # Modules
//!
//! - [`packing`] - Vertex data packing utilities (f32 → f16/snorm16/unorm8/octahedral)
//! - [`formats`] - `.ms2mesh` header and chunk table records

pub mod formats;
pub mod packing;

// Re-export commonly used packing items
pub use packing::{
    LAYOUT_COLOR, LAYOUT_CUSTOM_NORMAL, LAYOUT_FULL_PRECISION, LAYOUT_SHAPE_KEY, LAYOUT_WEIGHTS,
    MeshFormat, encode_octahedral, pack_bone_weights_unorm8, pack_color_rgba_unorm8,
    pack_normal_octahedral, pack_octahedral_u32, pack_position_f16, pack_position_f32,
    pack_tangent_snorm16, pack_uv_f16, unpack_octahedral_u32, vertex_stride_packed,
};

// Re-export commonly used format items
pub use formats::{BinarySerializable, MS2_MESH_EXT, Ms2ChunkRecord, Ms2MeshHeader};
