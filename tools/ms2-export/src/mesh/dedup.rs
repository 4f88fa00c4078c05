//! Per-chunk vertex deduplication
//!
//! Source meshes store attributes per face corner. Corners of the same source
//! vertex collapse into one output vertex when their UVs (first two layers),
//! normal and bitangent sign match bit for bit; everything else (UV seams,
//! hard edges, mirrored tangent space) splits the vertex.

use hashbrown::HashMap;
use smallvec::SmallVec;

use super::error::{CapacityError, ExportError, ValidationError};
use super::prechunk::FaceGroup;
use super::shell::{lookup_point, ShellLookup};
use super::source::SourceMesh;
use super::types::{BoneTag, Chunk, CornerAttributes, MAX_CHUNK_VERTICES};
use super::weights::ResolvedVertex;

/// Fur width is stored remapped to this range in the fur UV slot
const FUR_WIDTH_RANGE: (f32, f32) = (-16.0, 16.0);

/// Identity of an output vertex within a chunk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    vertex: u32,
    negate_bitangent: bool,
    uvs: SmallVec<[[u32; 2]; 2]>,
    normal: [u32; 3],
}

impl DedupKey {
    /// Only the first two UV layers take part in the key
    pub fn new(vertex: u32, negate_bitangent: bool, uvs: &[[f32; 2]], normal: [f32; 3]) -> Self {
        Self {
            vertex,
            negate_bitangent,
            uvs: uvs
                .iter()
                .take(2)
                .map(|uv| uv.map(f32::to_bits))
                .collect(),
            normal: normal.map(f32::to_bits),
        }
    }
}

/// Everything the deduplicator reads from the source mesh
pub struct CornerContext<'a> {
    pub mesh: &'a SourceMesh,
    /// First corner index of every face
    pub corner_starts: &'a [usize],
    pub vertices: &'a [ResolvedVertex],
    /// Stored normals and tangents overriding the computed ones
    pub stock: Option<(&'a [[f32; 3]], &'a [[f32; 3]])>,
    /// Shell to copy normals and tangents from, fins only
    pub shell: Option<&'a dyn ShellLookup>,
}

/// Normal frame of one corner before deduplication
struct CornerFrame {
    normal: [f32; 3],
    custom_normal: [f32; 3],
    tangent: [f32; 3],
    negate_bitangent: bool,
}

/// Builds one chunk's vertex and triangle arrays
pub struct Deduplicator<'a> {
    ctx: &'a CornerContext<'a>,
    bone: BoneTag,
    lookup: HashMap<DedupKey, u16>,
    vertices: Vec<CornerAttributes>,
    triangles: Vec<[u16; 3]>,
    reused: usize,
}

impl<'a> Deduplicator<'a> {
    pub fn new(ctx: &'a CornerContext<'a>, bone: BoneTag) -> Self {
        Self {
            ctx,
            bone,
            lookup: HashMap::new(),
            vertices: Vec::new(),
            triangles: Vec::new(),
            reused: 0,
        }
    }

    /// Add one triangle, reusing vertices of matching corners
    pub fn push_face(&mut self, face: usize) -> Result<(), ExportError> {
        let mesh = self.ctx.mesh;
        let face_vertices = &mesh.faces[face];
        let &[a, b, c] = face_vertices.as_slice() else {
            return Err(ValidationError::NotTriangulated {
                mesh: mesh.name.clone(),
                face,
                corners: face_vertices.len(),
            }
            .into());
        };

        let start = self.ctx.corner_starts[face];
        let tri = [
            self.resolve_corner(start, a)?,
            self.resolve_corner(start + 1, b)?,
            self.resolve_corner(start + 2, c)?,
        ];
        self.triangles.push(tri);
        Ok(())
    }

    fn resolve_corner(&mut self, corner: usize, vertex: u32) -> Result<u16, ExportError> {
        let mesh = self.ctx.mesh;
        let position = mesh.positions[vertex as usize];
        let frame = self.corner_frame(corner, vertex, position)?;
        let mut uvs: SmallVec<[[f32; 2]; 4]> = mesh
            .corners
            .uv_layers
            .iter()
            .map(|layer| {
                let [u, v] = layer[corner];
                [u, 1.0 - v]
            })
            .collect();

        let key = DedupKey::new(vertex, frame.negate_bitangent, &uvs, frame.normal);
        if let Some(&index) = self.lookup.get(&key) {
            self.reused += 1;
            return Ok(index);
        }

        if self.vertices.len() >= MAX_CHUNK_VERTICES {
            return Err(CapacityError::new(mesh.name.as_str()).into());
        }
        let index = self.vertices.len() as u16;
        self.lookup.insert(key, index);

        let resolved = &self.ctx.vertices[vertex as usize];
        let color = match mesh.corners.color_layers.first() {
            Some(layer) => {
                let [r, g, b, _] = layer[corner];
                [r, g, b, 1.0 - resolved.fur.clump]
            }
            None => [0.0; 4],
        };
        if mesh.fur_as_weights {
            uvs.push([
                resolved.fur.length,
                remap(resolved.fur.width, (0.0, 1.0), FUR_WIDTH_RANGE),
            ]);
        }
        let shape_key = mesh
            .lod_shape_key()
            .map(|positions| positions[vertex as usize])
            .unwrap_or_default();

        self.vertices.push(CornerAttributes {
            position,
            shape_key,
            normal: frame.normal,
            custom_normal: frame.custom_normal,
            tangent: frame.tangent,
            negate_bitangent: frame.negate_bitangent,
            uvs,
            color,
            weights: resolved.weights.clone(),
        });
        Ok(index)
    }

    fn corner_frame(
        &self,
        corner: usize,
        vertex: u32,
        position: [f32; 3],
    ) -> Result<CornerFrame, ValidationError> {
        let mesh = self.ctx.mesh;
        let (mut normal, mut tangent, negate_bitangent) = match self.ctx.shell {
            Some(shell) => {
                let point = lookup_point(mesh.corners.uv_layers[0][corner], position);
                let frame = shell
                    .nearest(point)
                    .ok_or_else(|| ValidationError::ShellLookup {
                        mesh: mesh.name.clone(),
                        point,
                    })?;
                (frame.normal, frame.tangent, false)
            }
            None => (
                mesh.corners.normals[corner],
                mesh.corners.tangents[corner],
                mesh.corners.bitangent_signs[corner] < 0.0,
            ),
        };
        if let Some((normals, tangents)) = self.ctx.stock {
            normal = normals[corner];
            tangent = tangents[corner];
        }

        let custom_normal = normal;
        if mesh.wants_vertex_normals() {
            normal = mesh.vertex_normals[vertex as usize];
        }

        Ok(CornerFrame {
            normal,
            custom_normal,
            tangent,
            negate_bitangent,
        })
    }

    pub fn finish(self) -> Chunk {
        tracing::debug!(
            "Preliminary chunk: unique {}, reused {} verts",
            self.vertices.len(),
            self.reused
        );
        Chunk {
            bone: self.bone,
            vertices: self.vertices,
            triangles: self.triangles,
        }
    }
}

/// Deduplicate the corners of one face group into a chunk
pub fn deduplicate(ctx: &CornerContext<'_>, group: &FaceGroup) -> Result<Chunk, ExportError> {
    tracing::debug!("Exporting {} tris for {}", group.len(), group.bone);
    let mut dedup = Deduplicator::new(ctx, group.bone);
    for &face in &group.faces {
        dedup.push_face(face)?;
    }
    Ok(dedup.finish())
}

fn remap(x: f32, (old_min, old_max): (f32, f32), (new_min, new_max): (f32, f32)) -> f32 {
    new_min + (x - old_min) * (new_max - new_min) / (old_max - old_min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shell::ShellFrame;
    use ms2_common::MeshFormat;

    fn resolved(mesh: &SourceMesh) -> Vec<ResolvedVertex> {
        vec![ResolvedVertex::default(); mesh.positions.len()]
    }

    fn run(mesh: &SourceMesh, vertices: &[ResolvedVertex]) -> Result<Chunk, ExportError> {
        let starts = mesh.corner_starts();
        let ctx = CornerContext {
            mesh,
            corner_starts: &starts,
            vertices,
            stock: None,
            shell: None,
        };
        let group = FaceGroup {
            bone: BoneTag::NoBones,
            faces: (0..mesh.faces.len()).collect(),
        };
        deduplicate(&ctx, &group)
    }

    fn quad() -> SourceMesh {
        SourceMesh::with_flat_corners(
            "quad",
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            vec![vec![0, 1, 2], vec![0, 2, 3]],
        )
    }

    /// Triangle list where every corner sits on its own vertex
    fn unique_corner_mesh(corners: usize) -> SourceMesh {
        let faces = (0..corners.div_ceil(3) as u32)
            .map(|f| vec![f * 3, f * 3 + 1, f * 3 + 2])
            .collect::<Vec<_>>();
        let positions = vec![[0.0; 3]; faces.len() * 3];
        SourceMesh::with_flat_corners("dense", positions, faces)
    }

    #[test]
    fn test_shared_edge_reuses_vertices() {
        let mesh = quad();
        let chunk = run(&mesh, &resolved(&mesh)).unwrap();
        assert_eq!(chunk.vertices.len(), 4);
        assert_eq!(chunk.triangles, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(chunk.bone, BoneTag::NoBones);
    }

    #[test]
    fn test_disjoint_triangles_keep_all_corners() {
        let mesh = SourceMesh::with_flat_corners(
            "pair",
            vec![[0.0; 3]; 6],
            vec![vec![0, 1, 2], vec![3, 4, 5]],
        );
        let chunk = run(&mesh, &resolved(&mesh)).unwrap();
        assert_eq!(chunk.vertices.len(), 6);
        assert_eq!(chunk.triangles.len(), 2);
    }

    #[test]
    fn test_uv_seam_splits_vertex() {
        let mut mesh = quad();
        // corner 3 is vertex 0 of the second face
        mesh.corners.uv_layers[0][3] = [0.5, 0.5];
        let chunk = run(&mesh, &resolved(&mesh)).unwrap();
        assert_eq!(chunk.vertices.len(), 5);
        assert_eq!(chunk.triangles[1], [3, 2, 4]);
        assert_eq!(chunk.vertices[3].uvs[0], [0.5, 0.5]);
        // V is flipped on export
        assert_eq!(chunk.vertices[2].uvs[0], [1.0, 0.0]);
    }

    #[test]
    fn test_bitangent_sign_splits_vertex() {
        let mut mesh = quad();
        mesh.corners.bitangent_signs[4] = -1.0;
        let chunk = run(&mesh, &resolved(&mesh)).unwrap();
        assert_eq!(chunk.vertices.len(), 5);
        assert!(chunk.vertices[3].negate_bitangent);
        assert!(!chunk.vertices[2].negate_bitangent);
    }

    #[test]
    fn test_third_uv_layer_does_not_split() {
        let mut mesh = quad();
        let uv0 = mesh.corners.uv_layers[0].clone();
        mesh.corners.uv_layers.push(uv0.clone());
        let mut uv2 = uv0;
        uv2[3] = [9.0, 9.0];
        mesh.corners.uv_layers.push(uv2);
        let chunk = run(&mesh, &resolved(&mesh)).unwrap();
        assert_eq!(chunk.vertices.len(), 4);
        // first corner wins
        assert_eq!(chunk.vertices[0].uvs[2], [0.0, 1.0]);
    }

    #[test]
    fn test_negative_zero_normal_is_distinct() {
        let mut mesh = quad();
        mesh.corners.normals[3] = [-0.0, 0.0, 1.0];
        let chunk = run(&mesh, &resolved(&mesh)).unwrap();
        assert_eq!(chunk.vertices.len(), 5);
    }

    #[test]
    fn test_equal_keys_share_index() {
        let mesh = quad();
        let starts = mesh.corner_starts();
        let chunk = run(&mesh, &resolved(&mesh)).unwrap();

        let mut by_key: HashMap<DedupKey, u16> = HashMap::new();
        for (face, tri) in chunk.triangles.iter().enumerate() {
            for (k, &index) in tri.iter().enumerate() {
                let corner = starts[face] + k;
                let vertex = mesh.faces[face][k];
                let [u, v] = mesh.corners.uv_layers[0][corner];
                let key = DedupKey::new(vertex, false, &[[u, 1.0 - v]], mesh.corners.normals[corner]);
                assert_eq!(*by_key.entry(key).or_insert(index), index);
            }
        }
        let mut indices: Vec<u16> = by_key.values().copied().collect();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), by_key.len(), "distinct keys must not alias");
    }

    #[test]
    fn test_not_triangulated() {
        let mesh = SourceMesh::with_flat_corners("ngon", vec![[0.0; 3]; 4], vec![vec![0, 1, 2, 3]]);
        let err = run(&mesh, &resolved(&mesh)).unwrap_err();
        assert_eq!(
            err,
            ExportError::Validation(ValidationError::NotTriangulated {
                mesh: "ngon".into(),
                face: 0,
                corners: 4
            })
        );
    }

    #[test]
    fn test_capacity_limit_is_inclusive() {
        let mesh = unique_corner_mesh(MAX_CHUNK_VERTICES);
        assert_eq!(mesh.corner_count(), 65535);
        let chunk = run(&mesh, &resolved(&mesh)).unwrap();
        assert_eq!(chunk.vertices.len(), 65535);
        assert_eq!(chunk.triangles.last(), Some(&[65532, 65533, 65534]));
    }

    #[test]
    fn test_capacity_overflow() {
        let mesh = unique_corner_mesh(MAX_CHUNK_VERTICES + 1);
        let err = run(&mesh, &resolved(&mesh)).unwrap_err();
        assert_eq!(err, ExportError::Capacity(CapacityError::new("dense")));
    }

    #[test]
    fn test_color_alpha_and_fur_slot() {
        let mut mesh = quad();
        mesh.corners.color_layers = vec![vec![[0.2, 0.4, 0.6, 0.9]; 6]];
        mesh.fur_as_weights = true;
        let mut vertices = resolved(&mesh);
        vertices[1].fur.clump = 0.25;
        vertices[1].fur.length = 0.3;
        vertices[1].fur.width = 0.75;

        let chunk = run(&mesh, &vertices).unwrap();
        let v = &chunk.vertices[1];
        assert_eq!(v.color, [0.2, 0.4, 0.6, 0.75]);
        assert_eq!(v.uvs.len(), 2);
        assert_eq!(v.uvs[1], [0.3, 8.0]);
        assert_eq!(chunk.vertices[0].color[3], 1.0);
    }

    #[test]
    fn test_no_color_layer_is_zero() {
        let mesh = quad();
        let chunk = run(&mesh, &resolved(&mesh)).unwrap();
        assert_eq!(chunk.vertices[0].color, [0.0; 4]);
    }

    #[test]
    fn test_interleaved_uses_vertex_normal() {
        let mut mesh = quad();
        mesh.mesh_format = Some(MeshFormat::Interleaved32);
        mesh.vertex_normals = vec![[0.0, 1.0, 0.0]; 4];
        mesh.corners.normals[0] = [0.0, 0.0, -1.0];
        let chunk = run(&mesh, &resolved(&mesh)).unwrap();
        assert_eq!(chunk.vertices[0].normal, [0.0, 1.0, 0.0]);
        assert_eq!(chunk.vertices[0].custom_normal, [0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_lod_shape_key() {
        let mut mesh = quad();
        mesh.shape_key = Some(crate::mesh::source::ShapeKey {
            name: "LOD0".into(),
            positions: vec![[0.0, 0.0, 2.0]; 4],
        });
        let chunk = run(&mesh, &resolved(&mesh)).unwrap();
        assert_eq!(chunk.vertices[2].shape_key, [0.0, 0.0, 2.0]);
    }

    struct FixedShell;

    impl ShellLookup for FixedShell {
        fn nearest(&self, _point: [f32; 3]) -> Option<ShellFrame> {
            Some(ShellFrame {
                normal: [0.0, -1.0, 0.0],
                tangent: [0.0, 0.0, 1.0],
            })
        }
    }

    #[test]
    fn test_fin_copies_shell_frame() {
        let mut mesh = quad();
        mesh.corners.bitangent_signs = vec![-1.0; 6];
        let starts = mesh.corner_starts();
        let vertices = resolved(&mesh);
        let shell = FixedShell;
        let ctx = CornerContext {
            mesh: &mesh,
            corner_starts: &starts,
            vertices: &vertices,
            stock: None,
            shell: Some(&shell),
        };
        let group = FaceGroup {
            bone: BoneTag::Dynamic,
            faces: vec![0, 1],
        };
        let chunk = deduplicate(&ctx, &group).unwrap();
        assert_eq!(chunk.vertices.len(), 4);
        for v in &chunk.vertices {
            assert_eq!(v.normal, [0.0, -1.0, 0.0]);
            assert_eq!(v.tangent, [0.0, 0.0, 1.0]);
            assert!(!v.negate_bitangent);
        }
    }

    #[test]
    fn test_stock_frames_override() {
        let mesh = quad();
        let starts = mesh.corner_starts();
        let vertices = resolved(&mesh);
        let normals = vec![[1.0, 0.0, 0.0]; 6];
        let tangents = vec![[0.0, 1.0, 0.0]; 6];
        let ctx = CornerContext {
            mesh: &mesh,
            corner_starts: &starts,
            vertices: &vertices,
            stock: Some((&normals, &tangents)),
            shell: None,
        };
        let group = FaceGroup {
            bone: BoneTag::Dynamic,
            faces: vec![1],
        };
        let chunk = deduplicate(&ctx, &group).unwrap();
        assert_eq!(chunk.vertices.len(), 3);
        assert_eq!(chunk.vertices[0].normal, [1.0, 0.0, 0.0]);
        assert_eq!(chunk.vertices[0].tangent, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_remap_fur_width() {
        assert_eq!(remap(0.0, (0.0, 1.0), FUR_WIDTH_RANGE), -16.0);
        assert_eq!(remap(0.5, (0.0, 1.0), FUR_WIDTH_RANGE), 0.0);
        assert_eq!(remap(1.0, (0.0, 1.0), FUR_WIDTH_RANGE), 16.0);
    }
}
