//! ms2-export library
//!
//! Turns evaluated source meshes into chunked, deduplicated ms2 vertex and
//! index buffers. The `ms2-export` binary wraps this with a manifest driven
//! batch build.

pub mod formats;
pub mod manifest;
pub mod mesh;

// Re-export packing primitives and layout constants from ms2-common
pub use ms2_common::{
    pack_bone_weights_unorm8, pack_color_rgba_unorm8, pack_normal_octahedral, pack_position_f16,
    pack_tangent_snorm16, pack_uv_f16, unpack_octahedral_u32, vertex_stride_packed, MeshFormat,
    LAYOUT_COLOR, LAYOUT_CUSTOM_NORMAL, LAYOUT_FULL_PRECISION, LAYOUT_SHAPE_KEY, LAYOUT_WEIGHTS,
};

// Re-export key types for mesh export
pub use mesh::{
    export_mesh, pack_mesh, BonesTable, ExportContext, ExportError, ExportSettings, ExportedMesh,
    FormatDescriptor, PackedMesh, SourceMesh,
};
