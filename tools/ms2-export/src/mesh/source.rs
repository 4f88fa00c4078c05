//! Source geometry handed over by the host
//!
//! These types are the only contract between the editor side and the export
//! core. They deserialize from the JSON mesh dumps written by the host.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use ms2_common::MeshFormat;

use super::types::{
    CHUNKED_FORMAT_VERSION, DEFAULT_PARTITION_BUDGET, DEFAULT_STATIC_CHUNK_THRESHOLD,
};

/// Vertex group membership: (group index, weight)
pub type GroupWeight = (u32, f32);

/// How a mesh takes part in a fur shell/fin setup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshRole {
    #[default]
    Regular,
    Shell,
    /// Borrows normals and tangents from the paired shell
    Fin,
}

/// Per face-corner attribute layers, indexed by corner
///
/// Corners are numbered consecutively across faces in face order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CornerLayers {
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 3]>,
    /// Sign of the bitangent, negative when mirrored
    pub bitangent_signs: Vec<f32>,
    #[serde(default)]
    pub uv_layers: Vec<Vec<[f32; 2]>>,
    #[serde(default)]
    pub color_layers: Vec<Vec<[f32; 4]>>,
    /// Normals stored on import, reused instead of recomputed ones
    #[serde(default)]
    pub stock_normals: Option<Vec<[f32; 3]>>,
    #[serde(default)]
    pub stock_tangents: Option<Vec<[f32; 3]>>,
}

/// Secondary position per vertex
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeKey {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
}

impl ShapeKey {
    /// Only LOD keys are exported
    pub fn is_lod(&self) -> bool {
        self.name.starts_with("LOD")
    }
}

/// Evaluated, triangulated mesh as supplied by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    #[serde(default)]
    pub vertex_normals: Vec<[f32; 3]>,
    /// Vertex indices per face
    pub faces: Vec<Vec<u32>>,
    pub corners: CornerLayers,
    /// Vertex group names, referenced by index from `vertex_weights`
    #[serde(default)]
    pub vertex_groups: Vec<String>,
    /// Group memberships per vertex, empty when the mesh has no groups
    #[serde(default)]
    pub vertex_weights: Vec<Vec<GroupWeight>>,
    #[serde(default)]
    pub shape_key: Option<ShapeKey>,
    /// Stored chunk index per face, reused with stock normals
    #[serde(default)]
    pub face_maps: Option<Vec<u32>>,
    #[serde(default)]
    pub hair_length: f32,
    #[serde(default)]
    pub flag: u32,
    #[serde(default)]
    pub unk_floats: [f32; 2],
    #[serde(default)]
    pub mesh_format: Option<MeshFormat>,
    #[serde(default)]
    pub role: MeshRole,
    /// Material stores fur length and width in an extra UV slot
    #[serde(default)]
    pub fur_as_weights: bool,
    /// Mesh flag says the mesh is not skinned
    #[serde(default)]
    pub weights_optional: bool,
    /// Object local transform, column-major
    #[serde(default)]
    pub local_transform: Option<[f32; 16]>,
}

impl SourceMesh {
    /// Build a mesh whose corners carry flat default attributes
    ///
    /// Every corner gets a +Z normal, a +X tangent, a positive bitangent sign
    /// and one UV layer taken from the vertex XY position.
    pub fn with_flat_corners(
        name: impl Into<String>,
        positions: Vec<[f32; 3]>,
        faces: Vec<Vec<u32>>,
    ) -> Self {
        let corner_count: usize = faces.iter().map(Vec::len).sum();
        let uv0 = faces
            .iter()
            .flatten()
            .map(|&v| {
                let p = positions.get(v as usize).copied().unwrap_or_default();
                [p[0], p[1]]
            })
            .collect();
        Self {
            name: name.into(),
            vertex_normals: vec![[0.0, 0.0, 1.0]; positions.len()],
            positions,
            faces,
            corners: CornerLayers {
                normals: vec![[0.0, 0.0, 1.0]; corner_count],
                tangents: vec![[1.0, 0.0, 0.0]; corner_count],
                bitangent_signs: vec![1.0; corner_count],
                uv_layers: vec![uv0],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn corner_count(&self) -> usize {
        self.faces.iter().map(Vec::len).sum()
    }

    /// Index of the first corner of every face
    pub fn corner_starts(&self) -> Vec<usize> {
        self.faces
            .iter()
            .scan(0usize, |next, face| {
                let start = *next;
                *next += face.len();
                Some(start)
            })
            .collect()
    }

    /// Shape key positions, if the mesh has a LOD shape key
    pub fn lod_shape_key(&self) -> Option<&[[f32; 3]]> {
        self.shape_key
            .as_ref()
            .filter(|key| key.is_lod())
            .map(|key| key.positions.as_slice())
    }

    /// Interleaved formats and flag 517 export the vertex normal as normal
    pub fn wants_vertex_normals(&self) -> bool {
        self.mesh_format.is_some_and(MeshFormat::is_interleaved)
            || self.flag == super::types::FLAG_VERTEX_NORMALS
    }
}

/// Bone name to bone index lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BonesTable(HashMap<String, u16>);

impl BonesTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.0.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, index: u16) {
        self.0.insert(name.into(), index);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: Into<String>> FromIterator<(S, u16)> for BonesTable {
    fn from_iter<I: IntoIterator<Item = (S, u16)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(name, index)| (name.into(), index)).collect())
    }
}

/// Target format parameters, treated as opaque by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub version: u32,
    /// UV slots per vertex, including the fur slot
    pub uv_count: usize,
    pub vcol_count: usize,
}

impl FormatDescriptor {
    /// Describe a format that matches the layers the mesh already has
    pub fn infer(mesh: &SourceMesh, version: u32) -> Self {
        Self {
            version,
            uv_count: mesh.corners.uv_layers.len() + usize::from(mesh.fur_as_weights),
            vcol_count: mesh.corners.color_layers.len(),
        }
    }

    /// Faces are chunked by bone weights and chunks partitioned
    pub fn chunks_by_weight(&self) -> bool {
        self.version >= CHUNKED_FORMAT_VERSION
    }

    /// Meshes choose their vertex buffer arrangement
    pub fn selects_mesh_format(&self) -> bool {
        self.version >= CHUNKED_FORMAT_VERSION
    }
}

/// Tunables of the chunking pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Static chunks below this face count merge into the dynamic chunk
    pub static_chunk_threshold: usize,
    /// Vertex budget of partitioned sub-chunks
    pub partition_vertex_budget: usize,
    /// Transform bounds by the object's local transform
    pub apply_transforms: bool,
    /// Reuse normals, tangents and chunking stored on import
    pub use_stock_normals_tangents: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            static_chunk_threshold: DEFAULT_STATIC_CHUNK_THRESHOLD,
            partition_vertex_budget: DEFAULT_PARTITION_BUDGET,
            apply_transforms: false,
            use_stock_normals_tangents: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_starts() {
        let mesh = SourceMesh::with_flat_corners(
            "quad",
            vec![[0.0; 3]; 5],
            vec![vec![0, 1, 2], vec![1, 2, 3, 4], vec![0, 2, 4]],
        );
        assert_eq!(mesh.corner_starts(), vec![0, 3, 7]);
        assert_eq!(mesh.corner_count(), 10);
        assert_eq!(mesh.corners.uv_layers[0].len(), 10);
    }

    #[test]
    fn test_lod_shape_key_only() {
        let mut mesh = SourceMesh::with_flat_corners("m", vec![[0.0; 3]; 3], vec![vec![0, 1, 2]]);
        mesh.shape_key = Some(ShapeKey {
            name: "Basis_morph".into(),
            positions: vec![[1.0; 3]; 3],
        });
        assert!(mesh.lod_shape_key().is_none());
        mesh.shape_key = Some(ShapeKey {
            name: "LOD1".into(),
            positions: vec![[1.0; 3]; 3],
        });
        assert_eq!(mesh.lod_shape_key().map(<[_]>::len), Some(3));
    }

    #[test]
    fn test_source_mesh_from_json_defaults() {
        let mesh: SourceMesh = serde_json::from_str(
            r#"{
                "name": "tri",
                "positions": [[0,0,0],[1,0,0],[0,1,0]],
                "faces": [[0,1,2]],
                "corners": {
                    "normals": [[0,0,1],[0,0,1],[0,0,1]],
                    "tangents": [[1,0,0],[1,0,0],[1,0,0]],
                    "bitangent_signs": [1,1,-1],
                    "uv_layers": [[[0,0],[1,0],[0,1]]]
                },
                "vertex_groups": ["root"],
                "vertex_weights": [[[0, 1.0]], [], []],
                "mesh_format": "INTERLEAVED_48",
                "role": "fin"
            }"#,
        )
        .unwrap();

        assert_eq!(mesh.role, MeshRole::Fin);
        assert_eq!(mesh.vertex_weights[0], vec![(0, 1.0)]);
        assert!(mesh.wants_vertex_normals());
        assert_eq!(mesh.hair_length, 0.0);
        assert!(mesh.shape_key.is_none());
    }

    #[test]
    fn test_format_versions() {
        let old = FormatDescriptor {
            version: 51,
            uv_count: 2,
            vcol_count: 1,
        };
        assert!(!old.chunks_by_weight());
        let new = FormatDescriptor { version: 52, ..old };
        assert!(new.chunks_by_weight());
        assert!(new.selects_mesh_format());
    }

    #[test]
    fn test_bones_table_from_pairs() {
        let bones: BonesTable = [("root", 0u16), ("spine", 1)].into_iter().collect();
        assert_eq!(bones.get("spine"), Some(1));
        assert_eq!(bones.get("tail"), None);
        assert_eq!(bones.len(), 2);
    }
}
