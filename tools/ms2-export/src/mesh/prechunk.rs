//! Preliminary chunking of faces by bone usage

use indexmap::IndexMap;

use super::types::BoneTag;
use super::weights::ResolvedVertex;

/// Faces sharing one bone tag, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceGroup {
    pub bone: BoneTag,
    /// Indices into the mesh's face list
    pub faces: Vec<usize>,
}

impl FaceGroup {
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Bone tag of a face from the dominant bones of its corners
pub fn classify_face(face: &[u32], vertices: &[ResolvedVertex], has_bones: bool) -> BoneTag {
    if !has_bones {
        return BoneTag::NoBones;
    }
    let mut tags = face.iter().map(|&v| vertices[v as usize].dominant.tag());
    match tags.next() {
        Some(first) if tags.all(|tag| tag == first) => first,
        _ => BoneTag::Dynamic,
    }
}

/// Group faces by bone tag, folding small static groups into the dynamic one
///
/// Groups keep first-seen order. Static groups with fewer than `threshold`
/// faces are only merged when the mesh has a dynamic group at all.
pub fn pre_chunk(
    faces: &[Vec<u32>],
    vertices: &[ResolvedVertex],
    has_bones: bool,
    threshold: usize,
) -> Vec<FaceGroup> {
    let mut groups: IndexMap<BoneTag, Vec<usize>> = IndexMap::new();
    for (face_index, face) in faces.iter().enumerate() {
        let tag = classify_face(face, vertices, has_bones);
        groups.entry(tag).or_default().push(face_index);
    }

    if groups.contains_key(&BoneTag::Dynamic) {
        let small: Vec<BoneTag> = groups
            .iter()
            .filter(|(tag, faces)| **tag != BoneTag::Dynamic && faces.len() < threshold)
            .map(|(tag, _)| *tag)
            .collect();
        for tag in small {
            let Some(moved) = groups.shift_remove(&tag) else {
                continue;
            };
            tracing::debug!("Moving {} tris for {} to dynamic chunk", moved.len(), tag);
            if let Some(dynamic) = groups.get_mut(&BoneTag::Dynamic) {
                dynamic.extend(moved);
            }
        }
    }

    groups
        .into_iter()
        .map(|(bone, faces)| FaceGroup { bone, faces })
        .collect()
}

/// Reproduce chunks stored on import: one dynamic group per face map value
pub fn group_by_face_maps(face_maps: &[u32]) -> Vec<FaceGroup> {
    let mut groups: IndexMap<u32, Vec<usize>> = IndexMap::new();
    for (face_index, &map) in face_maps.iter().enumerate() {
        groups.entry(map).or_default().push(face_index);
    }
    groups
        .into_values()
        .map(|faces| FaceGroup {
            bone: BoneTag::Dynamic,
            faces,
        })
        .collect()
}

/// Formats without weight chunking take all faces as one group
pub fn single_group(face_count: usize) -> Vec<FaceGroup> {
    vec![FaceGroup {
        bone: BoneTag::NoBones,
        faces: (0..face_count).collect(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::weights::Dominant;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    fn vertex(dominant: Dominant) -> ResolvedVertex {
        ResolvedVertex {
            dominant,
            ..Default::default()
        }
    }

    /// Three static faces on bones 0, 1, 2 plus optionally one dynamic face
    fn static_mesh(with_dynamic: bool) -> (Vec<Vec<u32>>, Vec<ResolvedVertex>) {
        let mut vertices: Vec<ResolvedVertex> = (0..9)
            .map(|i| vertex(Dominant::Bone((i / 3) as u16)))
            .collect();
        if with_dynamic {
            vertices[6] = vertex(Dominant::Dynamic);
        }
        (vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8]], vertices)
    }

    #[test]
    fn test_no_bones_single_group() {
        let vertices = vec![vertex(Dominant::Unweighted); 4];
        let faces = vec![vec![0, 1, 2], vec![2, 1, 3]];
        let groups = pre_chunk(&faces, &vertices, false, 2);
        assert_eq!(
            groups,
            vec![FaceGroup {
                bone: BoneTag::NoBones,
                faces: vec![0, 1]
            }]
        );
    }

    #[test]
    fn test_static_groups_without_dynamic_stay() {
        let (faces, vertices) = static_mesh(false);
        let groups = pre_chunk(&faces, &vertices, true, 2);
        let tags: Vec<BoneTag> = groups.iter().map(|g| g.bone).collect();
        assert_eq!(
            tags,
            vec![BoneTag::Static(0), BoneTag::Static(1), BoneTag::Static(2)]
        );
        assert!(groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn test_small_static_groups_merge_into_dynamic() {
        let (faces, vertices) = static_mesh(true);
        let groups = pre_chunk(&faces, &vertices, true, 2);
        assert_eq!(
            groups,
            vec![FaceGroup {
                bone: BoneTag::Dynamic,
                faces: vec![2, 0, 1]
            }]
        );
    }

    #[test]
    fn test_large_static_group_survives_merge() {
        let vertices = vec![
            vertex(Dominant::Bone(0)),
            vertex(Dominant::Bone(0)),
            vertex(Dominant::Bone(0)),
            vertex(Dominant::Dynamic),
        ];
        let faces = vec![vec![0, 1, 2], vec![0, 2, 1], vec![0, 1, 3]];
        let groups = pre_chunk(&faces, &vertices, true, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].bone, BoneTag::Static(0));
        assert_eq!(groups[0].faces, vec![0, 1]);
        assert_eq!(groups[1].bone, BoneTag::Dynamic);
    }

    #[test]
    fn test_unweighted_corners_count_as_dynamic() {
        let vertices = vec![
            vertex(Dominant::Unweighted),
            vertex(Dominant::Dynamic),
            vertex(Dominant::Unweighted),
        ];
        assert_eq!(classify_face(&[0, 1, 2], &vertices, true), BoneTag::Dynamic);
    }

    #[test]
    fn test_face_maps_grouping() {
        let groups = group_by_face_maps(&[3, 1, 3, 0, 1]);
        let faces: Vec<Vec<usize>> = groups.iter().map(|g| g.faces.clone()).collect();
        assert_eq!(faces, vec![vec![0, 2], vec![1, 4], vec![3]]);
        assert!(groups.iter().all(|g| g.bone == BoneTag::Dynamic));
    }

    #[test]
    fn test_pre_chunk_conserves_faces() {
        let mut rng = Pcg64::seed_from_u64(0x5EED);
        for _ in 0..200 {
            let vertex_count = rng.random_range(3..40);
            let vertices: Vec<ResolvedVertex> = (0..vertex_count)
                .map(|_| match rng.random_range(0..4) {
                    0 => vertex(Dominant::Dynamic),
                    1 => vertex(Dominant::Unweighted),
                    _ => vertex(Dominant::Bone(rng.random_range(0..5))),
                })
                .collect();
            let faces: Vec<Vec<u32>> = (0..rng.random_range(1..120))
                .map(|_| {
                    (0..3)
                        .map(|_| rng.random_range(0..vertex_count) as u32)
                        .collect()
                })
                .collect();
            let threshold = rng.random_range(0..10);
            let has_bones = rng.random_bool(0.9);

            let groups = pre_chunk(&faces, &vertices, has_bones, threshold);
            let mut seen: Vec<usize> = groups.iter().flat_map(|g| g.faces.clone()).collect();
            assert_eq!(seen.len(), faces.len());
            seen.sort_unstable();
            assert!(seen.iter().copied().eq(0..faces.len()));
        }
    }
}
