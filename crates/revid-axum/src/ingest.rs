//! Input-directory scanning and file registration.

use std::path::{Path, PathBuf};

use futures_util::future::join_all;
use tracing::debug;

use revid_core::domain::{EncodeTask, MediaFile, NewEncodeTask, NewMediaFile, Profile};
use revid_core::{EncodeTaskRepository, FileRepository, ProfileRepository, Repos};
use revid_media::mkvtoolnix;

use crate::error::HttpError;
use crate::state::AppContext;

/// Probe a file and register it, unless it is still being written.
///
/// Statistics tags are stamped first when missing (the encode path needs
/// them later). A file whose probed size or rounded duration is zero is
/// in-flight and returns `None`.
pub async fn register_file(
    repos: &Repos,
    path: &Path,
) -> Result<Option<MediaFile>, HttpError> {
    let probe = mkvtoolnix::ensure_track_statistics(path).await?;

    let size = probe.size();
    if size == 0 || probe.duration.round() == 0.0 {
        debug!(file = %path.display(), "skipping in-flight file");
        return Ok(None);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| HttpError::BadRequest(format!("bad file path [{}]", path.display())))?;
    let directory = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    let file = repos
        .files
        .get_or_create(&NewMediaFile {
            name,
            directory,
            size,
            duration: probe.duration,
            frame_rate: (probe.avg_frame_rate() * 1000.0).round() / 1000.0,
            frames: probe.frames,
            probe_info: Some(probe.to_value()),
        })
        .await?;

    Ok(Some(file))
}

/// Scan the input root for files that are not already carried by an
/// incomplete encode task and have no artifact in the output tree.
///
/// Everything that qualifies is probed (concurrently) and registered;
/// in-flight files drop out.
pub async fn scan_input(
    repos: &Repos,
    input_root: &Path,
    output_root: &Path,
) -> Result<Vec<MediaFile>, HttpError> {
    let candidates = mkv_files(input_root, false)?;

    let mut pending_names = Vec::new();
    for task in repos.encode_tasks.list_incomplete().await? {
        if let Ok(file) = repos.files.get(task.source_file_id).await {
            pending_names.push(file.name);
        }
    }
    debug!(count = pending_names.len(), "queued encode tasks in store");

    let output_names: Vec<String> = mkv_files(output_root, true)?
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();

    let to_scan: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            !pending_names.contains(&name) && !output_names.contains(&name)
        })
        .collect();

    debug!(count = to_scan.len(), "scanning files not already queued");

    let results = join_all(to_scan.iter().map(|path| register_file(repos, path))).await;

    let mut files = Vec::new();
    for result in results {
        if let Some(file) = result? {
            files.push(file);
        }
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Create and queue an encode task for a registered source file.
///
/// The compressed-file record is pre-created as a placeholder under
/// `<output>/<profile>/` so the artifact upload has a row to finalize.
pub async fn create_encode_task(
    context: &AppContext,
    profile: &Profile,
    source: &MediaFile,
) -> Result<EncodeTask, HttpError> {
    let compressed = context
        .repos
        .files
        .get_or_create(&NewMediaFile::placeholder(
            source.name.clone(),
            context.settings.paths.output.join(&profile.name),
        ))
        .await?;

    let task = context
        .repos
        .encode_tasks
        .insert(&NewEncodeTask {
            source_file_id: source.id,
            compressed_file_id: Some(compressed.id),
            profile_id: profile.id,
            encode_type: profile.encode_type,
            encode_value: profile.encode_value,
        })
        .await?;

    context.queue_encode_task(task.id).await?;
    Ok(task)
}

/// The CLI ingest flow: scan the input root and queue an encode task with
/// the named profile for every newly registered file.
pub async fn scan_and_queue(
    context: &AppContext,
    profile_name: &str,
) -> Result<Vec<EncodeTask>, HttpError> {
    let profile = context
        .repos
        .profiles
        .list()
        .await?
        .into_iter()
        .find(|p| p.name == profile_name)
        .ok_or_else(|| HttpError::NotFound(format!("Profile named '{profile_name}'")))?;

    let files = scan_input(
        &context.repos,
        &context.settings.paths.input,
        &context.settings.paths.output,
    )
    .await?;

    let mut tasks = Vec::with_capacity(files.len());
    for file in &files {
        tasks.push(create_encode_task(context, &profile, file).await?);
    }
    Ok(tasks)
}

/// `*.mkv` files under a root, optionally recursing.
fn mkv_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>, HttpError> {
    let mut found = Vec::new();
    if !root.exists() {
        return Ok(found);
    }
    collect_mkv(root, recursive, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_mkv(
    directory: &Path,
    recursive: bool,
    found: &mut Vec<PathBuf>,
) -> Result<(), HttpError> {
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect_mkv(&path, recursive, found)?;
            }
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mkv"))
        {
            found.push(path);
        }
    }
    Ok(())
}

// register_file and scan_input shell out to the probe tools, so their
// coverage lives in the end-to-end environment; the directory filtering is
// exercised here.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkv_listing_ignores_other_extensions_and_respects_recursion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mkv"), b"x").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"x").unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c.mkv"), b"x").unwrap();

        let flat = mkv_files(dir.path(), false).unwrap();
        assert_eq!(flat.len(), 1);

        let recursive = mkv_files(dir.path(), true).unwrap();
        assert_eq!(recursive.len(), 2);
    }

    #[test]
    fn missing_root_is_empty_not_an_error() {
        assert!(mkv_files(Path::new("/nonexistent/root"), true)
            .unwrap()
            .is_empty());
    }

    // TODO: cover register_file's in-flight skip with a fake probe tool on
    // PATH once the e2e harness lands.
}
