//! Progress reporting back to the coordinator.
//!
//! One POST per assembled ffmpeg progress block (ffmpeg is invoked with
//! `-stats_period 1`, bounding this to about one update per second). The
//! fps and eta sent are rolling averages over the whole run; instantaneous
//! values from the first seconds are wildly off. Failed POSTs are logged
//! and dropped; progress is advisory and the encode must not stall on it.

use tracing::warn;

use revid_core::domain::{EncodeMode, ProgressUpdate};
use revid_media::ProgressBlock;

use crate::agent::WorkerContext;

/// Progress/fps/eta values derived from one block and the fps samples
/// collected so far.
fn rolling_update(
    total_frames: i64,
    fps_samples: &[f64],
    block: &ProgressBlock,
) -> (f64, Option<f64>, Option<i64>) {
    let average_fps = if fps_samples.is_empty() {
        None
    } else {
        Some(fps_samples.iter().sum::<f64>() / fps_samples.len() as f64)
    };

    if block.end {
        return (100.0, average_fps, Some(0));
    }

    let progress = block.percent(total_frames);
    let eta = average_fps.filter(|fps| *fps > 0.0).map(|fps| {
        let remaining = (total_frames - block.frame).max(0);
        (remaining as f64 / fps) as i64
    });
    (progress, average_fps, eta)
}

pub struct ProgressReporter<'a> {
    ctx: &'a WorkerContext,
    detail_url: String,
    total_frames: i64,
    fps_samples: Vec<f64>,
    /// Encode parameters not yet acknowledged by the coordinator; attached
    /// to every update until one goes through.
    pending_parameters: Option<(EncodeMode, i64)>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(ctx: &'a WorkerContext, detail_url: &str, total_frames: i64) -> Self {
        Self {
            ctx,
            detail_url: detail_url.to_string(),
            total_frames,
            fps_samples: Vec::new(),
            pending_parameters: None,
        }
    }

    /// Announce changed encode parameters with the next update.
    pub fn set_parameters(&mut self, mode: EncodeMode, value: i64) {
        self.pending_parameters = Some((mode, value));
    }

    /// A new encode pass starts from zero; old samples would skew the
    /// averages.
    pub fn reset_samples(&mut self) {
        self.fps_samples.clear();
    }

    /// POST one assembled progress block.
    pub async fn report(&mut self, block: &ProgressBlock) {
        if block.fps > 0.0 {
            self.fps_samples.push(block.fps);
        }

        let (progress, fps, eta) = rolling_update(self.total_frames, &self.fps_samples, block);

        let update = ProgressUpdate {
            progress,
            fps,
            eta,
            encode_type: self.pending_parameters.map(|(mode, _)| mode),
            encode_value: self.pending_parameters.map(|(_, value)| value),
        };

        let result = self
            .ctx
            .client
            .post(self.detail_url.as_str())
            .header("Worker", &self.ctx.hostname)
            .json(&update)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                self.pending_parameters = None;
            }
            Ok(response) => {
                warn!(status = %response.status(), "progress update rejected");
            }
            Err(e) => {
                warn!(error = %e, "could not send progress update to coordinator");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(frame: i64, end: bool) -> ProgressBlock {
        ProgressBlock {
            frame,
            fps: 0.0,
            bitrate: 0.0,
            total_size: 0,
            out_time_us: 0,
            dup_frames: 0,
            drop_frames: 0,
            speed: 1.0,
            end,
        }
    }

    #[test]
    fn eta_uses_the_rolling_average() {
        // 100 of 400 frames done, averaging 50 fps: 300 remaining -> 6 s.
        let (progress, fps, eta) = rolling_update(400, &[40.0, 60.0], &block(100, false));
        assert_eq!(progress, 25.0);
        assert_eq!(fps, Some(50.0));
        assert_eq!(eta, Some(6));
    }

    #[test]
    fn no_samples_means_no_fps_or_eta() {
        let (progress, fps, eta) = rolling_update(400, &[], &block(100, false));
        assert_eq!(progress, 25.0);
        assert!(fps.is_none());
        assert!(eta.is_none());
    }

    #[test]
    fn end_block_reports_complete_with_zero_eta() {
        // Frame counter on the end block may fall short of the total
        // (e.g. deinterlacing changed frame pacing); the end block wins.
        let (progress, _, eta) = rolling_update(400, &[50.0], &block(398, true));
        assert_eq!(progress, 100.0);
        assert_eq!(eta, Some(0));
    }

    #[test]
    fn frames_past_the_total_clamp_eta_at_zero() {
        let (_, _, eta) = rolling_update(400, &[50.0], &block(405, false));
        assert_eq!(eta, Some(0));
    }
}
