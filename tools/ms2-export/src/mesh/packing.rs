//! Vertex packing into the `.ms2mesh` buffers

use anyhow::{bail, Result};
use bytemuck::cast_slice;

use ms2_common::{
    pack_bone_weights_unorm8, pack_color_rgba_unorm8, pack_normal_octahedral, pack_position_f16,
    pack_position_f32, pack_tangent_snorm16, pack_uv_f16, vertex_stride_packed, Ms2ChunkRecord,
    Ms2MeshHeader, LAYOUT_COLOR, LAYOUT_CUSTOM_NORMAL, LAYOUT_FULL_PRECISION, LAYOUT_SHAPE_KEY,
    LAYOUT_WEIGHTS,
};

use super::types::{CornerAttributes, ExportedMesh, MeshMetadata, MAX_WEIGHTS};

/// Packed, GPU-ready mesh
#[derive(Debug, Clone, PartialEq)]
pub struct PackedMesh {
    pub header: Ms2MeshHeader,
    pub chunks: Vec<Ms2ChunkRecord>,
    pub vertex_data: Vec<u8>,
    pub indices: Vec<u16>,
}

/// Vertex layout flags for a mesh
pub fn layout_for(metadata: &MeshMetadata) -> u8 {
    let mut layout = metadata.mesh_format.layout_flags();
    if metadata.has_colors {
        layout |= LAYOUT_COLOR;
    }
    if metadata.has_weights {
        layout |= LAYOUT_WEIGHTS;
    }
    if metadata.has_shape_key {
        layout |= LAYOUT_SHAPE_KEY;
    }
    layout
}

/// Pack one vertex
///
/// Order: position → normal → custom normal → tangent → UVs → color →
/// weights → shape key
fn pack_vertex(data: &mut Vec<u8>, vertex: &CornerAttributes, layout: u8, uv_count: usize) -> Result<()> {
    let [x, y, z] = vertex.position;
    if layout & LAYOUT_FULL_PRECISION != 0 {
        data.extend_from_slice(cast_slice(&pack_position_f32(x, y, z)));
    } else {
        data.extend_from_slice(cast_slice(&pack_position_f16(x, y, z)));
    }

    data.extend_from_slice(&pack_normal_octahedral(vertex.normal).to_le_bytes());
    if layout & LAYOUT_CUSTOM_NORMAL != 0 {
        data.extend_from_slice(&pack_normal_octahedral(vertex.custom_normal).to_le_bytes());
    }
    data.extend_from_slice(cast_slice(&pack_tangent_snorm16(vertex.tangent, vertex.negate_bitangent)));

    for slot in 0..uv_count {
        let [u, v] = vertex.uvs.get(slot).copied().unwrap_or_default();
        data.extend_from_slice(cast_slice(&pack_uv_f16(u, v)));
    }

    if layout & LAYOUT_COLOR != 0 {
        data.extend_from_slice(&pack_color_rgba_unorm8(vertex.color));
    }

    if layout & LAYOUT_WEIGHTS != 0 {
        let mut bones = [0u8; MAX_WEIGHTS];
        let mut weights = [0.0f32; MAX_WEIGHTS];
        for (i, &(bone, weight)) in vertex.weights.iter().enumerate() {
            let Ok(bone) = u8::try_from(bone) else {
                bail!("Bone index {} does not fit the u8 bone slots", bone);
            };
            bones[i] = bone;
            weights[i] = weight;
        }
        data.extend_from_slice(&bones);
        data.extend_from_slice(&pack_bone_weights_unorm8(weights));
    }

    if layout & LAYOUT_SHAPE_KEY != 0 {
        let [x, y, z] = vertex.shape_key;
        data.extend_from_slice(cast_slice(&pack_position_f16(x, y, z)));
    }
    Ok(())
}

/// Pack an exported mesh into header, chunk table, vertex and index buffers
pub fn pack_mesh(exported: &ExportedMesh) -> Result<PackedMesh> {
    let ExportedMesh { mesh, metadata } = exported;
    let layout = layout_for(metadata);
    let Ok(uv_count) = u8::try_from(metadata.uv_count) else {
        bail!("{} has {} UV slots, at most 255 fit", metadata.name, metadata.uv_count);
    };
    if mesh.vertices.len() > usize::from(u16::MAX) {
        bail!("{} has {} vertices, u16 indices address at most 65535", metadata.name, mesh.vertices.len());
    }
    let stride = vertex_stride_packed(layout, uv_count);

    let mut vertex_data = Vec::with_capacity(mesh.vertices.len() * stride as usize);
    for vertex in &mesh.vertices {
        pack_vertex(&mut vertex_data, vertex, layout, metadata.uv_count)?;
    }

    let mut indices = Vec::with_capacity(mesh.index_count());
    let mut chunks = Vec::with_capacity(mesh.chunks.len());
    for chunk in &mesh.chunks {
        let index_offset = indices.len() as u32;
        // global indices stay below 65536, checked above
        indices.extend(chunk.triangles.iter().flatten().map(|&i| i as u16));
        chunks.push(Ms2ChunkRecord {
            bone_id: chunk.bone.id(),
            index_offset,
            index_count: indices.len() as u32 - index_offset,
            vertex_offset: chunk.vertex_offset,
            vertex_count: chunk.vertex_count,
            shell_index: chunk.shell.index,
            shell_count: chunk.shell.count,
        });
    }

    let header = Ms2MeshHeader {
        vertex_count: mesh.vertices.len() as u32,
        index_count: indices.len() as u32,
        chunk_count: chunks.len() as u32,
        stride,
        flag: metadata.flag,
        bone_cutoff: metadata.bone_cutoff,
        fur_length: metadata.fur_length,
        unk_floats: metadata.unk_floats,
        bounds_min: metadata.bounds.min.to_array(),
        bounds_max: metadata.bounds.max.to_array(),
        layout,
        uv_count,
        _padding: [0; 2],
    };

    tracing::debug!(
        "Packed {}: stride {} bytes, layout {:#04x}, {} KB vertex data",
        metadata.name,
        stride,
        layout,
        vertex_data.len() / 1024
    );

    Ok(PackedMesh {
        header,
        chunks,
        vertex_data,
        indices,
    })
}
