//! Export orchestration for one mesh
//!
//! Validates the source, resolves weights, groups faces, deduplicates and
//! partitions every group and assembles the output mesh. Any error aborts the
//! mesh as a whole; nothing partial is returned.

use glam::Mat4;

use ms2_common::MeshFormat;

use super::dedup::{deduplicate, CornerContext};
use super::error::{CapacityError, ChunkPass, ConsistencyError, ExportError, ValidationError};
use super::partition::OutputBuilder;
use super::prechunk::{group_by_face_maps, pre_chunk, single_group, FaceGroup};
use super::shell::{KdShellIndex, ShellLookup};
use super::source::{BonesTable, ExportSettings, FormatDescriptor, MeshRole, SourceMesh};
use super::types::{BoundingBox, ExportedMesh, MeshMetadata, ShellSlot, MAX_CHUNK_VERTICES};
use super::weights::{check_unweighted, resolve_weights, ResolvedVertex};

/// Inputs shared by every mesh of an export run
#[derive(Debug, Clone, Copy)]
pub struct ExportContext<'a> {
    pub bones: &'a BonesTable,
    pub format: FormatDescriptor,
    pub settings: &'a ExportSettings,
    /// Shell mesh that fins copy normals and tangents from
    pub shell_mesh: Option<&'a SourceMesh>,
    pub shell: ShellSlot,
}

impl<'a> ExportContext<'a> {
    pub fn new(bones: &'a BonesTable, format: FormatDescriptor, settings: &'a ExportSettings) -> Self {
        Self {
            bones,
            format,
            settings,
            shell_mesh: None,
            shell: ShellSlot::default(),
        }
    }
}

fn check_length(
    mesh: &SourceMesh,
    attribute: &'static str,
    found: usize,
    expected: usize,
) -> Result<(), ValidationError> {
    if found == expected {
        return Ok(());
    }
    Err(ValidationError::AttributeLength {
        mesh: mesh.name.clone(),
        attribute,
        found,
        expected,
    })
}

/// Check the source mesh before any work is done
pub fn validate_source(
    mesh: &SourceMesh,
    format: &FormatDescriptor,
    settings: &ExportSettings,
) -> Result<(), ValidationError> {
    let name = || mesh.name.clone();
    if mesh.positions.is_empty() {
        return Err(ValidationError::NoVertices { mesh: name() });
    }
    if mesh.faces.is_empty() {
        return Err(ValidationError::NoFaces { mesh: name() });
    }
    if settings.partition_vertex_budget < 3 {
        return Err(ValidationError::PartitionBudget {
            budget: settings.partition_vertex_budget,
        });
    }

    let expected_uvs = format.uv_count.saturating_sub(usize::from(mesh.fur_as_weights));
    for (layer, found, expected) in [
        ("UV Maps", mesh.corners.uv_layers.len(), expected_uvs),
        ("Color Attributes", mesh.corners.color_layers.len(), format.vcol_count),
    ] {
        tracing::debug!("{} count: {}", layer, expected);
        if found != expected {
            return Err(ValidationError::LayerCount {
                mesh: name(),
                layer,
                found,
                expected,
            });
        }
    }
    if mesh.corners.uv_layers.is_empty() {
        return Err(ValidationError::MissingUv0 { mesh: name() });
    }

    for (face, vertices) in mesh.faces.iter().enumerate() {
        if vertices.len() != 3 {
            return Err(ValidationError::NotTriangulated {
                mesh: name(),
                face,
                corners: vertices.len(),
            });
        }
        if let Some(&vertex) = vertices.iter().find(|&&v| v as usize >= mesh.positions.len()) {
            return Err(ValidationError::VertexOutOfRange {
                mesh: name(),
                face,
                vertex,
                count: mesh.positions.len(),
            });
        }
    }

    let corners = mesh.corner_count();
    let layers = &mesh.corners;
    check_length(mesh, "normal", layers.normals.len(), corners)?;
    check_length(mesh, "tangent", layers.tangents.len(), corners)?;
    check_length(mesh, "bitangent sign", layers.bitangent_signs.len(), corners)?;
    for uv in &layers.uv_layers {
        check_length(mesh, "UV", uv.len(), corners)?;
    }
    for color in &layers.color_layers {
        check_length(mesh, "color", color.len(), corners)?;
    }

    let vertices = mesh.positions.len();
    if mesh.wants_vertex_normals() {
        check_length(mesh, "vertex normal", mesh.vertex_normals.len(), vertices)?;
    }
    if !mesh.vertex_weights.is_empty() {
        check_length(mesh, "vertex weight", mesh.vertex_weights.len(), vertices)?;
    }
    if let Some(positions) = mesh.lod_shape_key() {
        check_length(mesh, "shape key", positions.len(), vertices)?;
    }

    if settings.use_stock_normals_tangents {
        let (Some(normals), Some(tangents)) = (&layers.stock_normals, &layers.stock_tangents) else {
            return Err(ValidationError::MissingStockAttributes { mesh: name() });
        };
        check_length(mesh, "stock normal", normals.len(), corners)?;
        check_length(mesh, "stock tangent", tangents.len(), corners)?;
        if let Some(face_maps) = &mesh.face_maps {
            check_length(mesh, "face map", face_maps.len(), mesh.faces.len())?;
        }
    }
    Ok(())
}

/// Group faces the way the target format expects
fn group_faces(
    mesh: &SourceMesh,
    ctx: &ExportContext<'_>,
    vertices: &[ResolvedVertex],
) -> Vec<FaceGroup> {
    if !ctx.format.chunks_by_weight() {
        return single_group(mesh.faces.len());
    }
    match &mesh.face_maps {
        Some(face_maps) if ctx.settings.use_stock_normals_tangents => group_by_face_maps(face_maps),
        _ => pre_chunk(
            &mesh.faces,
            vertices,
            !ctx.bones.is_empty(),
            ctx.settings.static_chunk_threshold,
        ),
    }
}

fn mesh_bounds(mesh: &SourceMesh, apply_transforms: bool) -> BoundingBox {
    let bounds = BoundingBox::from_points(&mesh.positions);
    match mesh.local_transform {
        Some(cols) if apply_transforms => bounds.transformed(&Mat4::from_cols_array(&cols)),
        _ => bounds,
    }
}

/// Export one source mesh into chunked, deduplicated output
pub fn export_mesh(mesh: &SourceMesh, ctx: &ExportContext<'_>) -> Result<ExportedMesh, ExportError> {
    tracing::info!("Exporting mesh {}", mesh.name);
    validate_source(mesh, &ctx.format, ctx.settings)?;

    let (vertices, report) = resolve_weights(mesh, ctx.bones);
    check_unweighted(mesh, ctx.bones, &report)?;

    let groups = group_faces(mesh, ctx, &vertices);
    let face_count = mesh.faces.len();
    let grouped: usize = groups.iter().map(FaceGroup::len).sum();
    if grouped != face_count {
        return Err(ConsistencyError {
            mesh: mesh.name.clone(),
            pass: ChunkPass::PreChunk,
            expected: face_count,
            found: grouped,
        }
        .into());
    }

    let shell_index = match (mesh.role, ctx.shell_mesh) {
        (MeshRole::Fin, Some(shell)) => {
            tracing::debug!("Copying data for {} from base mesh {}...", mesh.name, shell.name);
            Some(KdShellIndex::build(shell)?)
        }
        _ => None,
    };

    let corner_starts = mesh.corner_starts();
    let stock = if ctx.settings.use_stock_normals_tangents {
        mesh.corners
            .stock_normals
            .as_deref()
            .zip(mesh.corners.stock_tangents.as_deref())
    } else {
        None
    };
    let corner_ctx = CornerContext {
        mesh,
        corner_starts: &corner_starts,
        vertices: &vertices,
        stock,
        shell: shell_index.as_ref().map(|index| index as &dyn ShellLookup),
    };

    let mut builder = OutputBuilder::new(ctx.shell);
    for group in &groups {
        let chunk = deduplicate(&corner_ctx, group)?;
        if ctx.format.chunks_by_weight() {
            builder.append_partitioned(chunk, ctx.settings.partition_vertex_budget);
        } else {
            builder.append_whole(chunk);
        }
    }
    let output = builder.finish();
    tracing::debug!("count_chunks {}", output.chunks.len());

    let found = output.triangle_count();
    if found != face_count {
        return Err(ConsistencyError {
            mesh: mesh.name.clone(),
            pass: ChunkPass::Final,
            expected: face_count,
            found,
        }
        .into());
    }
    if output.vertices.len() > MAX_CHUNK_VERTICES {
        return Err(CapacityError::new(mesh.name.as_str()).into());
    }

    let mesh_format = if ctx.format.selects_mesh_format() {
        mesh.mesh_format.unwrap_or_default()
    } else {
        MeshFormat::Separate
    };
    let metadata = MeshMetadata {
        name: mesh.name.clone(),
        flag: mesh.flag,
        unk_floats: mesh.unk_floats,
        fur_length: mesh.hair_length,
        bounds: mesh_bounds(mesh, ctx.settings.apply_transforms),
        shell: ctx.shell,
        bone_cutoff: report.bone_cutoff,
        mesh_format,
        uv_count: ctx.format.uv_count,
        has_colors: ctx.format.vcol_count > 0,
        has_weights: !ctx.bones.is_empty(),
        has_shape_key: mesh.lod_shape_key().is_some(),
    };

    tracing::info!(
        "Exported {}: {} verts, {} tris in {} chunks",
        mesh.name,
        output.vertices.len(),
        found,
        output.chunks.len()
    );
    Ok(ExportedMesh {
        mesh: output,
        metadata,
    })
}
