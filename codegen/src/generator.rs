//! Artifact generation and writing.
//!
//! Entities are processed independently and in model order. Each entity's
//! artifact set (skeleton, concrete, test) is staged in full before any of
//! it touches disk, so a failure anywhere in the set commits nothing of that
//! entity while earlier entities' artifacts stay put. Each write is atomic
//! (temp file beside the target, then rename), and a file whose new content
//! equals its on-disk bytes is neither written nor reported, so a repeated
//! run over an unchanged model is a no-op.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{
    error::GenerationError,
    merge::{merge_source, render_fresh, MergeOutcome, MergePlan},
    model::Model,
    render,
};

/// One computed artifact that differs from what is on disk, not yet written.
struct StagedArtifact {
    path:    PathBuf,
    content: String,
}

/// Generate all artifacts for the model. Returns the paths actually created
/// or modified, in processing order, or the first fatal error. A failed
/// entity leaves none of its own artifacts behind; artifacts already
/// committed for earlier entities stay on disk.
pub fn generate(
    model: &Model,
    main_root: &Path,
    test_root: &Path,
    skeleton_root: &Path,
    main_name: &str,
) -> Result<Vec<PathBuf>, GenerationError> {
    let mut written = Vec::new();

    for entity in &model.entities {
        let mut staged = Vec::new();
        stage_write(
            &skeleton_root.join(render::skeleton_file_name(&entity.type_name)),
            render::skeleton_entity(entity),
            &mut staged,
        )?;
        stage_merge(
            &main_root.join(render::concrete_file_name(&entity.type_name)),
            &render::concrete_plan_entity(entity),
            &mut staged,
        )?;
        stage_merge(
            &test_root.join(render::test_file_name(&entity.type_name)),
            &render::test_plan_entity(entity),
            &mut staged,
        )?;
        commit(staged, &mut written)?;
    }

    for action in &model.actions {
        let mut staged = Vec::new();
        stage_write(
            &skeleton_root.join(render::skeleton_file_name(&action.type_name)),
            render::skeleton_action(action),
            &mut staged,
        )?;
        stage_merge(
            &main_root.join(render::concrete_file_name(&action.type_name)),
            &render::concrete_plan_action(action),
            &mut staged,
        )?;
        stage_merge(
            &test_root.join(render::test_file_name(&action.type_name)),
            &render::test_plan_action(action),
            &mut staged,
        )?;
        commit(staged, &mut written)?;
    }

    let registration_path = main_root.join(render::registration_file_name(main_name));
    let registration = render_registration(&registration_path, model)?;
    let mut staged = Vec::new();
    stage_write(&registration_path, registration, &mut staged)?;
    commit(staged, &mut written)?;

    Ok(written)
}

/// Regenerate the registration artifact, keeping everything up to and
/// including the marker line when an existing file carries one.
fn render_registration(path: &Path, model: &Model) -> Result<String, GenerationError> {
    match read_existing(path)? {
        Some(existing) => {
            if let Some(marker_pos) = existing.find(render::REGISTRATION_MARKER) {
                let header_end = match existing[marker_pos..].find('\n') {
                    Some(newline) => marker_pos + newline + 1,
                    None => existing.len(),
                };
                Ok(format!(
                    "{}{}",
                    &existing[..header_end],
                    render::registration_body(model)
                ))
            } else {
                Ok(render::registration(model))
            }
        }
        None => Ok(render::registration(model)),
    }
}

/// Stage `content` for `path` unless the file already holds exactly that
/// content.
fn stage_write(
    path: &Path,
    content: String,
    staged: &mut Vec<StagedArtifact>,
) -> Result<(), GenerationError> {
    if let Some(existing) = read_existing(path)? {
        if existing == content {
            return Ok(());
        }
    }
    staged.push(StagedArtifact { path: path.to_path_buf(), content });
    Ok(())
}

/// Merge `plan` against the file at `path` and stage the result if it
/// changed. A signature conflict aborts the whole entity before anything of
/// its set is committed.
fn stage_merge(
    path: &Path,
    plan: &MergePlan,
    staged: &mut Vec<StagedArtifact>,
) -> Result<(), GenerationError> {
    match read_existing(path)? {
        Some(existing) => match merge_source(&existing, plan) {
            Ok(MergeOutcome::Unchanged) => Ok(()),
            Ok(MergeOutcome::Updated(content)) => {
                staged.push(StagedArtifact { path: path.to_path_buf(), content });
                Ok(())
            }
            Err(conflict) => Err(GenerationError::SignatureConflict {
                file:   path.to_path_buf(),
                member: conflict.member,
            }),
        },
        None => stage_write(path, render_fresh(plan), staged),
    }
}

fn commit(
    staged: Vec<StagedArtifact>,
    written: &mut Vec<PathBuf>,
) -> Result<(), GenerationError> {
    for artifact in staged {
        write_file(&artifact.path, &artifact.content)?;
        written.push(artifact.path);
    }
    Ok(())
}

fn read_existing(path: &Path) -> Result<Option<String>, GenerationError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(GenerationError::UnwritableTarget {
            path:   path.to_path_buf(),
            source: err,
        }),
    }
}

/// Atomically write `content` to `path`.
fn write_file(path: &Path, content: &str) -> Result<(), GenerationError> {
    let unwritable = |source: std::io::Error| GenerationError::UnwritableTarget {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(unwritable)?;
    }

    // Temp file in the same directory so the rename stays on one filesystem.
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, content).map_err(unwritable)?;
    fs::rename(&tmp, path).map_err(unwritable)?;

    Ok(())
}
