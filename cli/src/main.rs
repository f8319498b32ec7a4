use clap::{Parser, Subcommand};
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

use entigen_codegen::error::{GenerationError, ModelError};
use entigen_codegen::{build_model, generate};
use entigen_descriptor::error::DescriptorError;
use entigen_descriptor::types::SchemaFile;

#[derive(Parser)]
#[command(name = "entigen")]
#[command(about = "Generate entity source artifacts from a descriptor set", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a descriptor set and generate or update entity source artifacts
    Generate {
        /// Descriptor-set file produced by the schema build step
        #[arg(short, long, default_value = "user-function.desc")]
        descriptor: PathBuf,

        /// Root for user-owned concrete artifacts (merged, never overwritten)
        #[arg(long, default_value = "src")]
        source_dir: PathBuf,

        /// Root for companion test artifacts (merged, never overwritten)
        #[arg(long, default_value = "tests")]
        test_source_dir: PathBuf,

        /// Root for fully generated skeleton artifacts (always rewritten)
        #[arg(long, default_value = "target/generated")]
        generated_source_dir: PathBuf,

        /// `::`-separated name whose last segment names the registration artifact
        #[arg(long, default_value = "registry")]
        main: String,

        /// Only services whose name matches this pattern are considered
        #[arg(long, default_value = ".*")]
        service_filter: String,

        /// Written paths are logged relative to this directory
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,
    },

    /// Decode a descriptor set and print the resulting model as JSON
    Inspect {
        /// Descriptor-set file to inspect
        #[arg(short, long, default_value = "user-function.desc")]
        descriptor: PathBuf,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Invalid service filter: {0}")]
    Filter(#[from] regex::Error),

    #[error("Cannot render model as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate {
            descriptor,
            source_dir,
            test_source_dir,
            generated_source_dir,
            main,
            service_filter,
            base_dir,
        } => {
            // The build step is a no-op when the schema step produced nothing.
            if !descriptor.exists() {
                println!(
                    "Skipping generation because there is no descriptor set at {}",
                    descriptor.display()
                );
                return Ok(());
            }

            println!("Inspecting descriptor set for entity generation...");
            let files = entigen_descriptor::read(descriptor)?;
            let files = filter_services(files, service_filter)?;
            let model = build_model(&files)?;
            let written = generate(&model, source_dir, test_source_dir, generated_source_dir, main)?;

            for path in &written {
                println!("Generated: {}", relativize(path, base_dir).display());
            }
            Ok(())
        }

        Commands::Inspect { descriptor } => {
            let files = entigen_descriptor::read(descriptor)?;
            let model = build_model(&files)?;
            println!("{}", serde_json::to_string_pretty(&model)?);
            Ok(())
        }
    }
}

/// Drop services whose name does not match the filter; files are kept even
/// when all their services go, since their message types may still be
/// referenced.
fn filter_services(files: Vec<SchemaFile>, pattern: &str) -> Result<Vec<SchemaFile>, regex::Error> {
    let filter = Regex::new(pattern)?;
    Ok(files
        .into_iter()
        .map(|mut file| {
            file.services.retain(|service| filter.is_match(&service.name));
            file
        })
        .collect())
}

fn relativize(path: &Path, base: &Path) -> PathBuf {
    let base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    absolute
        .strip_prefix(&base)
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|_| path.to_path_buf())
}
