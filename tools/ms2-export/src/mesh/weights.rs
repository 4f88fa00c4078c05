//! Bone weight resolution per source vertex

use smallvec::SmallVec;

use super::error::ValidationError;
use super::source::{BonesTable, GroupWeight, SourceMesh};
use super::types::{BoneTag, BoneWeight, MAX_WEIGHTS};

const FUR_LENGTH_GROUP: &str = "fur_length";
const FUR_WIDTH_GROUP: &str = "fur_width";
const FUR_CLUMP_GROUP: &str = "fur_clump";

/// What a vertex group name resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSlot {
    Bone(u16),
    FurLength,
    FurWidth,
    FurClump,
    /// No bone of that name, weights are dropped
    Ignored,
}

/// Vertex group names resolved against the bones table
#[derive(Debug, Clone, Default)]
pub struct GroupSlots {
    slots: Vec<GroupSlot>,
}

impl GroupSlots {
    /// Resolve every group name once, warning about extraneous groups
    pub fn resolve(mesh_name: &str, names: &[String], bones: &BonesTable) -> Self {
        let slots = names
            .iter()
            .map(|name| match name.as_str() {
                // fur groups win over bones of the same name
                FUR_LENGTH_GROUP => GroupSlot::FurLength,
                FUR_WIDTH_GROUP => GroupSlot::FurWidth,
                FUR_CLUMP_GROUP => GroupSlot::FurClump,
                _ => match bones.get(name) {
                    Some(bone) => GroupSlot::Bone(bone),
                    None => {
                        tracing::warn!(
                            "Ignored extraneous vertex group {} on mesh {}",
                            name,
                            mesh_name
                        );
                        GroupSlot::Ignored
                    }
                },
            })
            .collect();
        Self { slots }
    }

    pub fn get(&self, group: u32) -> Option<GroupSlot> {
        self.slots.get(group as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Fur parameters painted as vertex groups
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FurAttributes {
    /// Group weight scaled by the hair length
    pub length: f32,
    pub width: f32,
    pub clump: f32,
}

/// Weights and classification of one source vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedVertex {
    /// Strongest influences first, at most four
    pub weights: SmallVec<[BoneWeight; MAX_WEIGHTS]>,
    pub dominant: Dominant,
    pub fur: FurAttributes,
}

/// Dominant bone of a vertex
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dominant {
    /// No positive weight, treated as dynamic
    #[default]
    Unweighted,
    Dynamic,
    Bone(u16),
}

impl Dominant {
    /// Tag used when classifying faces
    pub fn tag(self) -> BoneTag {
        match self {
            Self::Unweighted | Self::Dynamic => BoneTag::Dynamic,
            Self::Bone(bone) => BoneTag::Static(bone),
        }
    }
}

/// Running totals of a weight pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightReport {
    /// Highest referenced bone index + 1
    pub bone_cutoff: u32,
    /// Source indices of vertices without a positive weight
    pub unweighted: Vec<usize>,
    /// Group references that could not be resolved
    pub skipped_groups: usize,
}

/// Resolve the weights of a single vertex
pub fn resolve_vertex(
    mesh_name: &str,
    index: usize,
    groups: &[GroupWeight],
    slots: &GroupSlots,
    hair_length: f32,
    report: &mut WeightReport,
) -> ResolvedVertex {
    let mut fur = FurAttributes::default();
    let mut weights: Vec<BoneWeight> = Vec::with_capacity(groups.len());

    for &(group, weight) in groups {
        match slots.get(group) {
            Some(GroupSlot::Bone(bone)) => {
                // bone cutoff counts every referenced bone, weighted or not
                report.bone_cutoff = report.bone_cutoff.max(u32::from(bone) + 1);
                if weight > 0.0 {
                    weights.push((bone, weight));
                }
            }
            Some(GroupSlot::FurLength) => fur.length = weight * hair_length,
            Some(GroupSlot::FurWidth) => fur.width = weight,
            Some(GroupSlot::FurClump) => fur.clump = weight,
            Some(GroupSlot::Ignored) => {}
            None => {
                tracing::warn!(
                    "Vert {} with {} groups, index {} into {} groups failed in {}",
                    index,
                    groups.len(),
                    group,
                    slots.len(),
                    mesh_name
                );
                report.skipped_groups += 1;
            }
        }
    }

    // stable sort keeps input order between equal weights
    weights.sort_by(|a, b| b.1.total_cmp(&a.1));
    weights.truncate(MAX_WEIGHTS);

    let dominant = match weights.as_slice() {
        [] => Dominant::Unweighted,
        [(_, top), ..] if !(*top > 0.0) => Dominant::Unweighted,
        [(bone, _)] => Dominant::Bone(*bone),
        _ => Dominant::Dynamic,
    };
    if dominant == Dominant::Unweighted {
        report.unweighted.push(index);
    }

    ResolvedVertex {
        weights: weights.into_iter().collect(),
        dominant,
        fur,
    }
}

/// Resolve the weights of every vertex of a mesh
pub fn resolve_weights(mesh: &SourceMesh, bones: &BonesTable) -> (Vec<ResolvedVertex>, WeightReport) {
    let slots = GroupSlots::resolve(&mesh.name, &mesh.vertex_groups, bones);
    let mut report = WeightReport::default();
    let vertices = (0..mesh.positions.len())
        .map(|index| {
            let groups = mesh.vertex_weights.get(index).map(Vec::as_slice).unwrap_or(&[]);
            resolve_vertex(&mesh.name, index, groups, &slots, mesh.hair_length, &mut report)
        })
        .collect();
    (vertices, report)
}

/// Fail when a skinned mesh has vertices without weights
pub fn check_unweighted(
    mesh: &SourceMesh,
    bones: &BonesTable,
    report: &WeightReport,
) -> Result<(), ValidationError> {
    if report.unweighted.is_empty() || bones.is_empty() {
        return Ok(());
    }
    if mesh.weights_optional {
        tracing::info!("Should have no weights and has none.");
        return Ok(());
    }
    Err(ValidationError::UnweightedVertices {
        mesh: mesh.name.clone(),
        count: report.unweighted.len(),
    })
}
