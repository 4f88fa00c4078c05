//! Export error taxonomy
//!
//! Every variant aborts the current mesh only; batch callers skip the mesh
//! and continue with the next one.

use std::fmt;

use thiserror::Error;

use super::types::MAX_CHUNK_VERTICES;

/// User-fixable problems with the source data
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Mesh {mesh} has no vertices!")]
    NoVertices { mesh: String },

    #[error("Mesh {mesh} has no polygons!")]
    NoFaces { mesh: String },

    #[error("Mesh {mesh} has {found} {layer}, but {expected} were expected!")]
    LayerCount {
        mesh: String,
        layer: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("Mesh {mesh} has {found} {attribute} entries, but {expected} were expected")]
    AttributeLength {
        mesh: String,
        attribute: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("Mesh {mesh} face {face} references vertex {vertex}, but there are only {count} vertices")]
    VertexOutOfRange {
        mesh: String,
        face: usize,
        vertex: u32,
        count: usize,
    },

    #[error("Mesh {mesh} is not triangulated! Face {face} has {corners} corners")]
    NotTriangulated {
        mesh: String,
        face: usize,
        corners: usize,
    },

    #[error("{mesh} has {count} unweighted vertices!")]
    UnweightedVertices { mesh: String, count: usize },

    #[error("Tangent space calculation for {mesh} needs UV0")]
    MissingUv0 { mesh: String },

    #[error("Mesh {mesh} has no stored normals and tangents to reuse")]
    MissingStockAttributes { mesh: String },

    #[error("Shell lookup for {mesh} failed at point {point:?}")]
    ShellLookup { mesh: String, point: [f32; 3] },

    #[error("Partition budget {budget} is too small, a triangle needs 3 vertices")]
    PartitionBudget { budget: usize },
}

/// A chunk would need more vertices than u16 indices can address
#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "{mesh} has too many ms2 verts. The limit is {limit}. \
     \nSource vertices have to be duplicated on every UV seam, hence the increase."
)]
pub struct CapacityError {
    pub mesh: String,
    pub limit: usize,
}

impl CapacityError {
    pub fn new(mesh: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            limit: MAX_CHUNK_VERTICES,
        }
    }
}

/// Chunking pass checked for triangle conservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPass {
    PreChunk,
    Final,
}

impl fmt::Display for ChunkPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreChunk => write!(f, "1st"),
            Self::Final => write!(f, "2nd"),
        }
    }
}

/// Internal invariant violation: triangles were lost or duplicated
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{mesh}: {expected} tris in, {found} tris out of the {pass} chunking")]
pub struct ConsistencyError {
    pub mesh: String,
    pub pass: ChunkPass,
    pub expected: usize,
    pub found: usize,
}

/// Error kind, for callers that report per class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Capacity,
    Consistency,
}

/// Any error that aborts a mesh export
#[derive(Debug, Error, PartialEq)]
pub enum ExportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Capacity(_) => ErrorKind::Capacity,
            Self::Consistency(_) => ErrorKind::Consistency,
        }
    }
}
