//! Binary format definitions for ms2 mesh files
//!
//! Re-exports from ms2-common for writing mesh records.

pub use ms2_common::formats::*;

use anyhow::{ensure, Context, Result};
use std::io::Write;

use crate::mesh::PackedMesh;

/// Write a complete `.ms2mesh` file
///
/// Header, chunk table, packed vertices, then little endian u16 indices.
pub fn write_ms2_mesh<W: Write>(w: &mut W, mesh: &PackedMesh) -> Result<()> {
    let header = &mesh.header;
    ensure!(
        header.chunk_count as usize == mesh.chunks.len()
            && header.index_count as usize == mesh.indices.len()
            && vertex_bytes(header)? == mesh.vertex_data.len(),
        "Packed mesh header does not match its buffers"
    );

    w.write_all(&header.to_bytes())?;
    for chunk in &mesh.chunks {
        w.write_all(&chunk.to_bytes())?;
    }
    w.write_all(&mesh.vertex_data)?;
    for i in &mesh.indices {
        w.write_all(&i.to_le_bytes())?;
    }
    Ok(())
}

/// Byte size of the packed vertex buffer a header describes
fn vertex_bytes(header: &Ms2MeshHeader) -> Result<usize> {
    (header.vertex_count as usize)
        .checked_mul(header.stride as usize)
        .with_context(|| {
            format!(
                "{} vertices of stride {} overflow the vertex buffer size",
                header.vertex_count, header.stride
            )
        })
}

/// End offsets of the chunk table, vertex data and index data
fn section_ends(header: &Ms2MeshHeader) -> Result<(usize, usize, usize)> {
    let overflow = || anyhow::anyhow!("ms2mesh header describes more data than fits in memory");
    let table_end = (header.chunk_count as usize)
        .checked_mul(Ms2ChunkRecord::SIZE)
        .and_then(|n| n.checked_add(Ms2MeshHeader::SIZE))
        .ok_or_else(overflow)?;
    let vertex_end = table_end
        .checked_add(vertex_bytes(header)?)
        .ok_or_else(overflow)?;
    let index_end = (header.index_count as usize)
        .checked_mul(2)
        .and_then(|n| n.checked_add(vertex_end))
        .ok_or_else(overflow)?;
    Ok((table_end, vertex_end, index_end))
}

/// Read back a `.ms2mesh` file written by [`write_ms2_mesh`]
pub fn read_ms2_mesh(bytes: &[u8]) -> Result<PackedMesh> {
    let header = Ms2MeshHeader::deserialize(bytes)
        .ok_or_else(|| anyhow::anyhow!("Truncated ms2mesh header"))?;

    let (table_end, vertex_end, index_end) = section_ends(&header)?;
    ensure!(
        bytes.len() == index_end,
        "ms2mesh is {} bytes, header describes {}",
        bytes.len(),
        index_end
    );

    let chunks = bytes[Ms2MeshHeader::SIZE..table_end]
        .chunks_exact(Ms2ChunkRecord::SIZE)
        .filter_map(Ms2ChunkRecord::deserialize)
        .collect();
    let indices = bytes[vertex_end..index_end]
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect();

    Ok(PackedMesh {
        header,
        chunks,
        vertex_data: bytes[table_end..vertex_end].to_vec(),
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed() -> PackedMesh {
        PackedMesh {
            header: Ms2MeshHeader {
                vertex_count: 3,
                index_count: 3,
                chunk_count: 1,
                stride: 20,
                flag: 0,
                bone_cutoff: 0,
                fur_length: 0.0,
                unk_floats: [0.0; 2],
                bounds_min: [0.0; 3],
                bounds_max: [1.0; 3],
                layout: 0,
                uv_count: 0,
                _padding: [0; 2],
            },
            chunks: vec![Ms2ChunkRecord {
                bone_id: -2,
                index_offset: 0,
                index_count: 3,
                vertex_offset: 0,
                vertex_count: 3,
                shell_index: 0,
                shell_count: 0,
            }],
            vertex_data: (0..60).collect(),
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_write_then_read() {
        let mesh = packed();
        let mut bytes = Vec::new();
        write_ms2_mesh(&mut bytes, &mesh).unwrap();
        assert_eq!(bytes.len(), 64 + 24 + 60 + 6);
        assert_eq!(read_ms2_mesh(&bytes).unwrap(), mesh);
    }

    #[test]
    fn test_write_rejects_inconsistent_header() {
        let mut mesh = packed();
        mesh.indices.push(0);
        assert!(write_ms2_mesh(&mut Vec::new(), &mesh).is_err());
    }

    #[test]
    fn test_read_rejects_truncated_file() {
        let mut bytes = Vec::new();
        write_ms2_mesh(&mut bytes, &packed()).unwrap();
        bytes.pop();
        assert!(read_ms2_mesh(&bytes).is_err());
        assert!(read_ms2_mesh(&bytes[..10]).is_err());
    }

    #[test]
    fn test_huge_vertex_buffer_is_an_error() {
        let mut mesh = packed();
        mesh.header.vertex_count = 0x0100_0000;
        mesh.header.stride = 0x100;
        let bytes = mesh.header.to_bytes();
        assert!(read_ms2_mesh(&bytes).is_err());

        mesh.header.vertex_count = u32::MAX;
        mesh.header.stride = u32::MAX;
        mesh.header.index_count = u32::MAX;
        let bytes = mesh.header.to_bytes();
        assert!(read_ms2_mesh(&bytes).is_err());
        assert!(write_ms2_mesh(&mut Vec::new(), &mesh).is_err());
    }
}
