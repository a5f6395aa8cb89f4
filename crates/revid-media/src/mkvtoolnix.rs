//! mkvpropedit wrapper.
//!
//! The scene-rule size budget works on video *stream* bytes, which mkv
//! containers only expose once `mkvpropedit --add-track-statistics-tags`
//! has stamped them. Every file entering the encode path goes through
//! [`ensure_track_statistics`] first.

use std::path::Path;
use tracing::debug;

use crate::command::{run_command, MKVPROPEDIT};
use crate::error::MediaError;
use crate::probe::MediaProbe;

/// Stamp track statistics tags onto the file.
pub async fn add_track_statistics(path: &Path) -> Result<(), MediaError> {
    debug!(file = %path.display(), "adding mkvtoolnix statistics");
    let args = vec![
        "--add-track-statistics-tags".to_string(),
        path.to_string_lossy().into_owned(),
    ];
    run_command(MKVPROPEDIT, path, &args).await?;
    Ok(())
}

/// Probe the file and stamp statistics only when they are missing.
///
/// Returns a probe taken *after* any stamping, so callers always see the
/// statistics tags.
pub async fn ensure_track_statistics(path: &Path) -> Result<MediaProbe, MediaError> {
    let probe = MediaProbe::load(path).await?;
    if probe.has_track_statistics() {
        return Ok(probe);
    }

    debug!(file = %path.display(), "file missing statistics from mkvtoolnix");
    add_track_statistics(path).await?;
    MediaProbe::load(path).await
}
