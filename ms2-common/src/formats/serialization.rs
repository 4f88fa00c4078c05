//! Binary serialization trait for format records.
//!
//! Every fixed-size ms2 record implements `BinarySerializable` so writers and
//! readers can treat them uniformly. Each record also keeps its type-specific
//! `to_bytes()` returning a fixed-size array.

/// Trait for binary-serializable format records.
///
/// The trait uses `Vec<u8>` for the return type because associated const
/// generics in return types (`[u8; Self::SIZE]`) are not yet stable in Rust.
///
/// # Example
///
/// ```
/// use ms2_common::formats::{BinarySerializable, Ms2ChunkRecord};
///
/// let record = Ms2ChunkRecord {
///     bone_id: -1,
///     index_offset: 0,
///     index_count: 3,
///     vertex_offset: 0,
///     vertex_count: 3,
///     shell_index: 0,
///     shell_count: 0,
/// };
/// let bytes = record.serialize();
/// assert_eq!(Ms2ChunkRecord::deserialize(&bytes), Some(record));
/// ```
pub trait BinarySerializable: Sized {
    /// Size of the serialized record in bytes.
    const SIZE: usize;

    /// Serialize to bytes.
    fn serialize(&self) -> Vec<u8>;

    /// Deserialize from bytes.
    ///
    /// Returns `None` if the byte slice is too short.
    fn deserialize(bytes: &[u8]) -> Option<Self>;
}

impl BinarySerializable for super::Ms2MeshHeader {
    const SIZE: usize = Self::SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}

impl BinarySerializable for super::Ms2ChunkRecord {
    const SIZE: usize = Self::SIZE;

    fn serialize(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Self::from_bytes(bytes)
    }
}
