//! Mesh export pipeline (source mesh -> chunked output -> .ms2mesh buffers)

mod dedup;
mod error;
mod export;
mod packing;
mod partition;
mod prechunk;
mod shell;
mod source;
mod types;
mod weights;

// Re-export public API
pub use dedup::{deduplicate, CornerContext, DedupKey, Deduplicator};
pub use error::{
    CapacityError, ChunkPass, ConsistencyError, ErrorKind, ExportError, ValidationError,
};
pub use export::{export_mesh, validate_source, ExportContext};
pub use packing::{layout_for, pack_mesh, PackedMesh};
pub use partition::{split_triangles, OutputBuilder};
pub use prechunk::{classify_face, group_by_face_maps, pre_chunk, single_group, FaceGroup};
pub use shell::{lookup_point, KdShellIndex, ShellFrame, ShellLookup};
pub use source::{
    BonesTable, CornerLayers, ExportSettings, FormatDescriptor, GroupWeight, MeshRole, ShapeKey,
    SourceMesh,
};
pub use types::{
    BoneTag, BoneWeight, BoundingBox, Chunk, CornerAttributes, ExportedMesh, MeshMetadata,
    OutputMesh, ShellSlot, TriChunk, CHUNKED_FORMAT_VERSION, DEFAULT_PARTITION_BUDGET,
    DEFAULT_STATIC_CHUNK_THRESHOLD, DYNAMIC_ID, MAX_CHUNK_VERTICES, MAX_WEIGHTS, NO_BONES_ID,
};
pub use weights::{
    check_unweighted, resolve_vertex, resolve_weights, Dominant, FurAttributes, GroupSlot,
    GroupSlots, ResolvedVertex, WeightReport,
};
