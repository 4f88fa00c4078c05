//! Types and constants for mesh export

use std::fmt;

use glam::{Mat4, Vec3};
use smallvec::SmallVec;

use ms2_common::MeshFormat;

/// Maximum distinct vertices per chunk (u16 indices)
/// Meshes that exceed this must be split before export.
pub const MAX_CHUNK_VERTICES: usize = u16::MAX as usize;

/// Maximum bone influences kept per vertex
pub const MAX_WEIGHTS: usize = 4;

/// Chunk id of chunks whose vertices follow more than one bone
pub const DYNAMIC_ID: i32 = -1;

/// Chunk id of meshes exported without a bones table
pub const NO_BONES_ID: i32 = -2;

/// Format version from which faces are chunked by weights and partitioned
pub const CHUNKED_FORMAT_VERSION: u32 = 52;

/// Mesh flag of meshes that want the vertex normal next to the corner normal
pub const FLAG_VERTEX_NORMALS: u32 = 517;

/// Static chunks with fewer faces are moved into the dynamic chunk
pub const DEFAULT_STATIC_CHUNK_THRESHOLD: usize = 100;

/// Default vertex budget of a partitioned sub-chunk
pub const DEFAULT_PARTITION_BUDGET: usize = 4096;

/// Bone influence: (bone index, weight)
pub type BoneWeight = (u16, f32);

/// Bone usage of a vertex, face or chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BoneTag {
    /// Influenced by several bones
    Dynamic,
    /// Exported without a bones table
    NoBones,
    /// Rigidly bound to one bone
    Static(u16),
}

impl BoneTag {
    /// Chunk id as stored in the ms2 chunk table
    pub fn id(self) -> i32 {
        match self {
            Self::Dynamic => DYNAMIC_ID,
            Self::NoBones => NO_BONES_ID,
            Self::Static(bone) => bone as i32,
        }
    }
}

impl fmt::Display for BoneTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic => write!(f, "dynamic"),
            Self::NoBones => write!(f, "no bones"),
            Self::Static(bone) => write!(f, "bone {bone}"),
        }
    }
}

/// Fully resolved attributes of one output vertex
///
/// Built once per unique corner by the deduplicator and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerAttributes {
    pub position: [f32; 3],
    /// LOD shape key position, zero when the mesh has none
    pub shape_key: [f32; 3],
    /// Vertex normal for interleaved formats, corner normal otherwise
    pub normal: [f32; 3],
    pub custom_normal: [f32; 3],
    pub tangent: [f32; 3],
    pub negate_bitangent: bool,
    /// One entry per UV layer (V flipped), plus the fur slot if used
    pub uvs: SmallVec<[[f32; 2]; 4]>,
    pub color: [f32; 4],
    pub weights: SmallVec<[BoneWeight; MAX_WEIGHTS]>,
}

/// Chunk of local triangles over its own deduplicated vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub bone: BoneTag,
    pub vertices: Vec<CornerAttributes>,
    pub triangles: Vec<[u16; 3]>,
}

/// Shell placement carried by every output chunk of a shell mesh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShellSlot {
    pub index: u16,
    pub count: u16,
}

/// Final chunk of the output mesh
#[derive(Debug, Clone, PartialEq)]
pub struct TriChunk {
    pub bone: BoneTag,
    /// First vertex of this chunk in the global vertex array
    pub vertex_offset: u32,
    pub vertex_count: u32,
    /// Triangles in global vertex indices
    pub triangles: Vec<[u32; 3]>,
    pub shell: ShellSlot,
}

/// Deduplicated, chunked mesh handed to the packer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputMesh {
    pub vertices: Vec<CornerAttributes>,
    pub chunks: Vec<TriChunk>,
}

impl OutputMesh {
    pub fn triangle_count(&self) -> usize {
        self.chunks.iter().map(|c| c.triangles.len()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.triangle_count() * 3
    }
}

/// Axis-aligned bounds of a mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn from_points(points: &[[f32; 3]]) -> Self {
        let mut iter = points.iter().map(|p| Vec3::from_array(*p));
        let Some(first) = iter.next() else {
            return Self {
                min: Vec3::ZERO,
                max: Vec3::ZERO,
            };
        };
        iter.fold(Self { min: first, max: first }, |b, p| Self {
            min: b.min.min(p),
            max: b.max.max(p),
        })
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of the transformed box corners
    pub fn transformed(&self, transform: &Mat4) -> Self {
        let corners = self.corners().map(|c| transform.transform_point3(c).to_array());
        Self::from_points(&corners)
    }
}

/// Mesh-level scalars exported next to the buffers
#[derive(Debug, Clone, PartialEq)]
pub struct MeshMetadata {
    pub name: String,
    pub flag: u32,
    pub unk_floats: [f32; 2],
    pub fur_length: f32,
    pub bounds: BoundingBox,
    pub shell: ShellSlot,
    /// Highest referenced bone index + 1
    pub bone_cutoff: u32,
    pub mesh_format: MeshFormat,
    /// UV slots per vertex, including the fur slot
    pub uv_count: usize,
    pub has_colors: bool,
    pub has_weights: bool,
    pub has_shape_key: bool,
}

/// Result of exporting one mesh
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedMesh {
    pub mesh: OutputMesh,
    pub metadata: MeshMetadata,
}
