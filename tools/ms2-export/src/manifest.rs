//! export.toml manifest parsing and batch builds
//!
//! A manifest names the target format, the chunking settings, the bones table
//! shared by every mesh and the list of mesh dumps to export.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::formats::{write_ms2_mesh, MS2_MESH_EXT};
use crate::mesh::{
    export_mesh, pack_mesh, BonesTable, ExportContext, ExportSettings, FormatDescriptor, MeshRole,
    PackedMesh, ShellSlot, SourceMesh, CHUNKED_FORMAT_VERSION,
};

/// export.toml manifest structure
#[derive(Debug, Deserialize)]
pub struct ExportManifest {
    pub format: FormatDescriptor,
    #[serde(default)]
    pub settings: ExportSettings,
    #[serde(default)]
    pub bones: BonesTable,
    /// Directory for meshes without an explicit output path
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub meshes: Vec<MeshJob>,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Single mesh entry
#[derive(Debug, Deserialize)]
pub struct MeshJob {
    /// Source mesh dump (JSON)
    pub input: PathBuf,
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Shell mesh dump that fins copy normals and tangents from
    #[serde(default)]
    pub shell: Option<PathBuf>,
    #[serde(default)]
    pub shell_index: u16,
    #[serde(default)]
    pub shell_count: u16,
}

impl MeshJob {
    pub fn shell_slot(&self) -> ShellSlot {
        ShellSlot {
            index: self.shell_index,
            count: self.shell_count,
        }
    }
}

/// Outcome of a batch build
#[derive(Debug, Default)]
pub struct BuildReport {
    pub exported: Vec<PathBuf>,
    /// Input path and error message of every mesh that failed
    pub failed: Vec<(PathBuf, String)>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl ExportManifest {
    /// Parse manifest from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse export.toml")
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    /// Output path of a job, `output` overriding the manifest's directory
    pub fn output_path(&self, job: &MeshJob, output: Option<&Path>) -> PathBuf {
        if let Some(explicit) = &job.output {
            return match output {
                Some(dir) => dir.join(explicit),
                None => self.resolve(explicit),
            };
        }
        let file_name = job.input.with_extension(MS2_MESH_EXT);
        let file_name = file_name.file_name().map(PathBuf::from).unwrap_or(file_name);
        match (output, &self.output_dir) {
            (Some(dir), _) => dir.join(file_name),
            (None, Some(dir)) => self.resolve(dir).join(file_name),
            (None, None) => self.resolve(&file_name),
        }
    }

    fn context(&self) -> ExportContext<'_> {
        ExportContext::new(&self.bones, self.format, &self.settings)
    }
}

/// Load manifest from file
pub fn load_manifest(path: &Path) -> Result<ExportManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let mut manifest = ExportManifest::parse(&content)?;
    manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(manifest)
}

/// Load a source mesh dump
pub fn load_source_mesh(path: &Path) -> Result<SourceMesh> {
    let file = File::open(path).with_context(|| format!("Failed to open mesh: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse mesh: {}", path.display()))
}

/// Validate manifest without building
pub fn validate(manifest: &ExportManifest) -> Result<()> {
    let settings = &manifest.settings;
    if settings.partition_vertex_budget < 3 {
        anyhow::bail!(
            "Invalid partition_vertex_budget {} (a triangle needs 3 vertices)",
            settings.partition_vertex_budget
        );
    }
    if manifest.meshes.is_empty() {
        tracing::warn!("Manifest lists no meshes");
    }
    if !manifest.bones.is_empty() && manifest.format.version < CHUNKED_FORMAT_VERSION {
        tracing::warn!(
            "Format version {} does not chunk by weights, bones only set the layout",
            manifest.format.version
        );
    }

    for job in &manifest.meshes {
        let input = manifest.resolve(&job.input);
        if !input.is_file() {
            anyhow::bail!("Mesh not found: {}", input.display());
        }
        if let Some(shell) = &job.shell {
            let shell = manifest.resolve(shell);
            if !shell.is_file() {
                anyhow::bail!("Shell mesh not found: {}", shell.display());
            }
        }
        if job.shell_count > 0 && job.shell_index >= job.shell_count {
            anyhow::bail!(
                "Invalid shell_index {} for {} (must be below shell_count {})",
                job.shell_index,
                job.input.display(),
                job.shell_count
            );
        }
    }
    Ok(())
}

/// Export, pack and write one mesh dump
pub fn export_file(
    input: &Path,
    output: &Path,
    ctx: &ExportContext<'_>,
    shell: Option<&Path>,
) -> Result<()> {
    let mesh = load_source_mesh(input)?;
    export_source(&mesh, output, ctx, shell)
}

/// Export, pack and write an already loaded mesh
pub fn export_source(
    mesh: &SourceMesh,
    output: &Path,
    ctx: &ExportContext<'_>,
    shell: Option<&Path>,
) -> Result<()> {
    let shell_mesh = match shell {
        Some(path) if mesh.role == MeshRole::Fin => Some(load_source_mesh(path)?),
        Some(path) => {
            tracing::warn!(
                "{} is not a fin, ignoring shell {}",
                mesh.name,
                path.display()
            );
            None
        }
        None => None,
    };

    let ctx = ExportContext {
        shell_mesh: shell_mesh.as_ref(),
        ..*ctx
    };
    let exported =
        export_mesh(mesh, &ctx).with_context(|| format!("Could not export {}!", mesh.name))?;
    let packed = pack_mesh(&exported)?;

    write_output(output, &packed)
}

/// Write through a temporary file in the target directory, renamed into place on success
fn write_output(output: &Path, packed: &PackedMesh) -> Result<()> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

    let tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create output: {}", output.display()))?;
    let mut w = BufWriter::new(tmp);
    write_ms2_mesh(&mut w, packed)?;
    let tmp = w.into_inner().map_err(|e| e.into_error())?;
    tmp.persist(output)
        .with_context(|| format!("Failed to write output: {}", output.display()))?;
    Ok(())
}

/// Export a single mesh dump, optionally with a manifest's format and bones
///
/// Without a manifest the format is inferred from the mesh itself.
pub fn export_single(
    input: &Path,
    output: &Path,
    manifest: Option<&ExportManifest>,
    shell: Option<&Path>,
    version: Option<u32>,
) -> Result<()> {
    match manifest {
        Some(manifest) => {
            let mut ctx = manifest.context();
            if let Some(version) = version {
                ctx.format.version = version;
            }
            export_file(input, output, &ctx, shell)
        }
        None => {
            let mesh = load_source_mesh(input)?;
            let bones = BonesTable::new();
            let settings = ExportSettings::default();
            let format =
                FormatDescriptor::infer(&mesh, version.unwrap_or(CHUNKED_FORMAT_VERSION));
            export_source(&mesh, output, &ExportContext::new(&bones, format, &settings), shell)
        }
    }
}

/// Build every mesh of a manifest, skipping the ones that fail
pub fn build_all(manifest: &ExportManifest, output: Option<&Path>) -> Result<BuildReport> {
    validate(manifest)?;
    let mut report = BuildReport::default();

    for job in &manifest.meshes {
        let input = manifest.resolve(&job.input);
        let out_path = manifest.output_path(job, output);
        let shell = job.shell.as_ref().map(|s| manifest.resolve(s));
        let ctx = ExportContext {
            shell: job.shell_slot(),
            ..manifest.context()
        };

        tracing::info!("Exporting {:?} -> {:?}", input, out_path);
        match export_file(&input, &out_path, &ctx, shell.as_deref()) {
            Ok(()) => report.exported.push(out_path),
            Err(e) => {
                tracing::error!("Skipping {}: {:#}", input.display(), e);
                report.failed.push((input, format!("{e:#}")));
            }
        }
    }

    tracing::info!(
        "Exported {} meshes, {} failed",
        report.exported.len(),
        report.failed.len()
    );
    Ok(report)
}
