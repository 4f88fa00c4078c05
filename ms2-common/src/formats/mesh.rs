//! Ms2Mesh binary format (.ms2mesh)
//!
//! GPU-ready chunked mesh record with packed vertices and u16 indices.
//! POD format - no magic bytes.
//!
//! # Layout
//! ```text
//! 0x00: vertex_count u32
//! 0x04: index_count u32
//! 0x08: chunk_count u32
//! 0x0C: stride u32 (bytes per packed vertex)
//! 0x10: flag u32
//! 0x14: bone_cutoff u32 (highest referenced bone index + 1)
//! 0x18: fur_length f32
//! 0x1C: unk_floats [f32; 2]
//! 0x24: bounds_min [f32; 3]
//! 0x30: bounds_max [f32; 3]
//! 0x3C: layout u8 (vertex layout flags)
//! 0x3D: uv_count u8
//! 0x3E: padding (2 bytes)
//! 0x40: chunk table (chunk_count * Ms2ChunkRecord::SIZE)
//! var:  vertex_data (vertex_count * stride)
//! var:  index_data (index_count * 2 bytes)
//! ```
//!
//! For vertex layout constants and stride calculation, see `ms2_common::packing`.

/// Ms2Mesh header (64 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Ms2MeshHeader {
    pub vertex_count: u32,
    pub index_count: u32,
    pub chunk_count: u32,
    pub stride: u32,
    pub flag: u32,
    pub bone_cutoff: u32,
    pub fur_length: f32,
    pub unk_floats: [f32; 2],
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    pub layout: u8,
    pub uv_count: u8,
    pub _padding: [u8; 2],
}

impl Ms2MeshHeader {
    pub const SIZE: usize = 64;

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let words = [
            self.vertex_count,
            self.index_count,
            self.chunk_count,
            self.stride,
            self.flag,
            self.bone_cutoff,
            self.fur_length.to_bits(),
            self.unk_floats[0].to_bits(),
            self.unk_floats[1].to_bits(),
            self.bounds_min[0].to_bits(),
            self.bounds_min[1].to_bits(),
            self.bounds_min[2].to_bits(),
            self.bounds_max[0].to_bits(),
            self.bounds_max[1].to_bits(),
            self.bounds_max[2].to_bits(),
        ];
        for (slot, word) in bytes.chunks_exact_mut(4).zip(words) {
            slot.copy_from_slice(&word.to_le_bytes());
        }
        bytes[0x3C] = self.layout;
        bytes[0x3D] = self.uv_count;
        // padding bytes stay 0
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let word = |i: usize| {
            let o = i * 4;
            u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]])
        };
        let float = |i: usize| f32::from_bits(word(i));
        Some(Self {
            vertex_count: word(0),
            index_count: word(1),
            chunk_count: word(2),
            stride: word(3),
            flag: word(4),
            bone_cutoff: word(5),
            fur_length: float(6),
            unk_floats: [float(7), float(8)],
            bounds_min: [float(9), float(10), float(11)],
            bounds_max: [float(12), float(13), float(14)],
            layout: bytes[0x3C],
            uv_count: bytes[0x3D],
            _padding: [0; 2],
        })
    }
}

/// One draw-indexable chunk of an Ms2Mesh (24 bytes)
///
/// `bone_id` is -1 for dynamic chunks, -2 for meshes without bones,
/// otherwise the index of the single bone driving every vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Ms2ChunkRecord {
    pub bone_id: i32,
    pub index_offset: u32,
    pub index_count: u32,
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub shell_index: u16,
    pub shell_count: u16,
}

impl Ms2ChunkRecord {
    pub const SIZE: usize = 24;

    /// Write record to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.bone_id.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.index_offset.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.index_count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.vertex_offset.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.vertex_count.to_le_bytes());
        bytes[20..22].copy_from_slice(&self.shell_index.to_le_bytes());
        bytes[22..24].copy_from_slice(&self.shell_count.to_le_bytes());
        bytes
    }

    /// Read record from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let word = |o: usize| [bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]];
        Some(Self {
            bone_id: i32::from_le_bytes(word(0)),
            index_offset: u32::from_le_bytes(word(4)),
            index_count: u32::from_le_bytes(word(8)),
            vertex_offset: u32::from_le_bytes(word(12)),
            vertex_count: u32::from_le_bytes(word(16)),
            shell_index: u16::from_le_bytes([bytes[20], bytes[21]]),
            shell_count: u16::from_le_bytes([bytes[22], bytes[23]]),
        })
    }
}
