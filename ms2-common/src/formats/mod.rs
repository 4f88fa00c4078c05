//! ms2 binary mesh formats
//!
//! POD (Plain Old Data) records for GPU-ready mesh buffers.
//! No magic bytes - the record type is determined by context.
//!
//! All records implement the [`BinarySerializable`] trait for consistent
//! serialization/deserialization.

pub mod mesh;
mod serialization;

pub use mesh::*;
pub use serialization::BinarySerializable;

/// File extension for packed mesh records
pub const MS2_MESH_EXT: &str = "ms2mesh";
