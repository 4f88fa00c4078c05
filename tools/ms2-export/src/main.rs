//! ms2-export - ms2 mesh export tool
//!
//! Converts evaluated mesh dumps (JSON) into chunked, GPU-ready `.ms2mesh`
//! records, one at a time or in batches driven by an export.toml manifest.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ms2_export::formats::MS2_MESH_EXT;
use ms2_export::manifest;

#[derive(Parser)]
#[command(name = "ms2-export")]
#[command(about = "ms2 mesh export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every mesh listed in a manifest
    Build {
        /// Path to export.toml manifest
        #[arg(default_value = "export.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate manifest without building
    Check {
        /// Path to export.toml manifest
        #[arg(default_value = "export.toml")]
        manifest: PathBuf,
    },

    /// Export a single mesh dump
    Mesh {
        /// Input mesh dump (JSON)
        input: PathBuf,

        /// Manifest supplying format, settings and bones
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Output .ms2mesh file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Shell mesh dump for fins
        #[arg(short, long)]
        shell: Option<PathBuf>,

        /// Target format version (default: manifest or 52)
        #[arg(long)]
        format_version: Option<u32>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { manifest, output } => {
            tracing::info!("Building meshes from {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            let report = manifest::build_all(&config, output.as_deref())?;
            if !report.is_success() {
                for (input, error) in &report.failed {
                    tracing::error!("{}: {}", input.display(), error);
                }
                anyhow::bail!(
                    "{} of {} meshes failed to export",
                    report.failed.len(),
                    config.meshes.len()
                );
            }
            tracing::info!("Build complete!");
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::validate(&config)?;
            tracing::info!("Manifest is valid!");
        }

        Commands::Mesh {
            input,
            manifest,
            output,
            shell,
            format_version,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension(MS2_MESH_EXT));
            tracing::info!("Converting {:?} -> {:?}", input, output);
            let config = manifest
                .as_deref()
                .map(manifest::load_manifest)
                .transpose()?;
            manifest::export_single(
                &input,
                &output,
                config.as_ref(),
                shell.as_deref(),
                format_version,
            )?;
            tracing::info!("Done!");
        }
    }

    Ok(())
}
