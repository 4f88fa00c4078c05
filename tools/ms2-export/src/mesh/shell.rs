//! Normal/tangent transfer from a shell mesh to its fins

use kdtree::KdTree;
use kdtree::distance::squared_euclidean;

use super::error::ValidationError;
use super::source::SourceMesh;

/// Normal and tangent borrowed from the shell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShellFrame {
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
}

/// Nearest-corner lookup into a shell mesh
pub trait ShellLookup {
    fn nearest(&self, point: [f32; 3]) -> Option<ShellFrame>;
}

/// Lookup point of a corner: its UV0 plus the X coordinate of its vertex
///
/// The X coordinate separates mirrored UV islands.
#[inline]
pub fn lookup_point(uv: [f32; 2], position: [f32; 3]) -> [f32; 3] {
    [uv[0], uv[1], position[0]]
}

/// Static k-d tree over every corner of a shell mesh
pub struct KdShellIndex {
    tree: KdTree<f32, usize, [f32; 3]>,
    frames: Vec<ShellFrame>,
}

impl KdShellIndex {
    pub fn build(shell: &SourceMesh) -> Result<Self, ValidationError> {
        let corner_count = shell.corner_count();
        let uv0 = shell
            .corners
            .uv_layers
            .first()
            .ok_or_else(|| ValidationError::MissingUv0 {
                mesh: shell.name.clone(),
            })?;
        for (attribute, found) in [
            ("UV0", uv0.len()),
            ("normal", shell.corners.normals.len()),
            ("tangent", shell.corners.tangents.len()),
        ] {
            if found != corner_count {
                return Err(ValidationError::AttributeLength {
                    mesh: shell.name.clone(),
                    attribute,
                    found,
                    expected: corner_count,
                });
            }
        }

        let mut tree = KdTree::with_capacity(3, corner_count.max(1));
        let mut frames = Vec::with_capacity(corner_count);
        let corners = shell
            .faces
            .iter()
            .enumerate()
            .flat_map(|(face, vertices)| vertices.iter().map(move |&vertex| (face, vertex)));
        for (corner, (face, vertex)) in corners.enumerate() {
            let position = shell.positions.get(vertex as usize).ok_or_else(|| {
                ValidationError::VertexOutOfRange {
                    mesh: shell.name.clone(),
                    face,
                    vertex,
                    count: shell.positions.len(),
                }
            })?;
            let point = lookup_point(uv0[corner], *position);
            tree.add(point, corner)
                .map_err(|_| ValidationError::ShellLookup {
                    mesh: shell.name.clone(),
                    point,
                })?;
            frames.push(ShellFrame {
                normal: shell.corners.normals[corner],
                tangent: shell.corners.tangents[corner],
            });
        }

        tracing::debug!("Built shell index over {} corners of {}", frames.len(), shell.name);
        Ok(Self { tree, frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl ShellLookup for KdShellIndex {
    fn nearest(&self, point: [f32; 3]) -> Option<ShellFrame> {
        let found = self.tree.nearest(&point, 1, &squared_euclidean).ok()?;
        let (_, &corner) = found.first()?;
        self.frames.get(corner).copied()
    }
}
