//! ffmpeg `-progress` stream parsing.
//!
//! With `-progress - -nostats`, ffmpeg prints one `key=value` per line and
//! terminates each update with a `progress=continue|end` line. The
//! assembler is fed lines as they arrive and yields one [`ProgressBlock`]
//! per completed update.
//!
//! The stream is noisy: `stream_0_1_q=0.0` lines interleave, values can be
//! `N/A`, and log messages occasionally splice into an update, e.g.
//! `[null @ 0x7f...] frame=380` when a warning and an update race.

/// One assembled progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressBlock {
    pub frame: i64,
    pub fps: f64,
    /// kbit/s; -1 while ffmpeg reports N/A.
    pub bitrate: f64,
    pub total_size: i64,
    pub out_time_us: i64,
    pub dup_frames: i64,
    pub drop_frames: i64,
    /// Realtime multiplier. When ffmpeg reports N/A it is derived as
    /// `fps / source_fps` if the source rate is known, else -1.
    pub speed: f64,
    /// True for the final `progress=end` update.
    pub end: bool,
}

impl ProgressBlock {
    /// Completed percentage against the source frame count.
    pub fn percent(&self, frame_count: i64) -> f64 {
        if frame_count <= 0 {
            return 0.0;
        }
        self.frame as f64 / frame_count as f64 * 100.0
    }
}

/// Accumulates progress lines into blocks.
#[derive(Debug)]
pub struct BlockAssembler {
    source_fps: Option<f64>,
    pending: Vec<(String, String)>,
    in_progress: bool,
    hit_end: bool,
}

impl BlockAssembler {
    /// `source_fps` enables speed derivation when ffmpeg reports N/A.
    pub fn new(source_fps: Option<f64>) -> Self {
        Self {
            source_fps,
            pending: Vec::new(),
            in_progress: false,
            hit_end: false,
        }
    }

    /// Feed one line; returns a block when this line completed an update.
    pub fn push_line(&mut self, line: &str) -> Option<ProgressBlock> {
        let line = line.trim();
        if line.is_empty() || self.hit_end {
            return None;
        }

        if !self.in_progress {
            if line.contains("frame=") {
                self.in_progress = true;
            } else {
                return None;
            }
        }

        if line.matches('=').count() != 1 {
            return None;
        }

        let line = if line.starts_with('[') {
            // A log prefix swallowed the update line. Keep it only when the
            // frame counter is recoverable, e.g. "[null @ 0x55..] frame=380".
            if line.contains("frame=") {
                match line.split_once("] ") {
                    Some((_, rest)) => rest,
                    None => return None,
                }
            } else {
                return None;
            }
        } else {
            line
        };

        let (key, value) = line.split_once('=')?;
        // An interrupted log message can leave text like
        // "Application provided invalid ... 0: 369 >= 369" on this line;
        // real progress keys never contain whitespace.
        if key.contains(' ') {
            return None;
        }

        // Per-stream quality lines are not part of the update we track.
        if key.starts_with("stream_") {
            return None;
        }

        self.pending.push((key.to_string(), value.to_string()));

        if key == "progress" {
            let end = value == "end";
            if end {
                self.hit_end = true;
            }
            let block = self.assemble(end);
            self.pending.clear();
            return block;
        }

        None
    }

    fn assemble(&self, end: bool) -> Option<ProgressBlock> {
        let get = |key: &str| -> Option<&str> {
            self.pending
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let int = |key: &str| -> i64 {
            get(key)
                .filter(|v| *v != "N/A")
                .and_then(|v| v.parse().ok())
                .unwrap_or(-1)
        };

        let frame = get("frame")?.parse::<i64>().ok()?;
        let fps = get("fps")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);

        let bitrate = get("bitrate")
            .filter(|v| *v != "N/A")
            .and_then(|v| v.split("kbits").next())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(-1.0);

        let mut speed = get("speed")
            .filter(|v| *v != "N/A")
            .and_then(|v| v.split('x').next())
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(-1.0);
        if speed < 0.0 && fps > 0.0 {
            if let Some(source_fps) = self.source_fps {
                if source_fps > 0.0 {
                    speed = fps / source_fps;
                }
            }
        }

        Some(ProgressBlock {
            frame,
            fps,
            bitrate,
            total_size: int("total_size"),
            out_time_us: int("out_time_us"),
            dup_frames: int("dup_frames"),
            drop_frames: int("drop_frames"),
            speed,
            end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPDATE: &[&str] = &[
        "frame=2931",
        "fps=185.81",
        "stream_0_0_q=23.0",
        "bitrate=4078.7kbits/s",
        "total_size=60817408",
        "out_time_us=119287000",
        "out_time_ms=119287000",
        "out_time=00:01:59.287000",
        "dup_frames=0",
        "drop_frames=0",
        "speed=7.56x",
        "progress=continue",
    ];

    fn feed(assembler: &mut BlockAssembler, lines: &[&str]) -> Vec<ProgressBlock> {
        lines
            .iter()
            .filter_map(|line| assembler.push_line(line))
            .collect()
    }

    #[test]
    fn assembles_one_block_per_update() {
        let mut assembler = BlockAssembler::new(None);
        let blocks = feed(&mut assembler, UPDATE);

        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.frame, 2931);
        assert_eq!(block.fps, 185.81);
        assert_eq!(block.bitrate, 4078.7);
        assert_eq!(block.total_size, 60_817_408);
        assert_eq!(block.speed, 7.56);
        assert!(!block.end);
    }

    #[test]
    fn ignores_leading_banner_until_first_frame_key() {
        let mut assembler = BlockAssembler::new(None);
        let mut lines = vec![
            "Input #0, matroska,webm, from 'episode.mkv':",
            "Stream mapping:",
            "Press [q] to stop, [?] for help",
        ];
        lines.extend_from_slice(UPDATE);

        assert_eq!(feed(&mut assembler, &lines).len(), 1);
    }

    #[test]
    fn na_values_become_negative_one() {
        let mut assembler = BlockAssembler::new(None);
        let lines = [
            "frame=10",
            "fps=0.00",
            "bitrate=N/A",
            "total_size=N/A",
            "out_time_us=N/A",
            "dup_frames=0",
            "drop_frames=0",
            "speed=N/A",
            "progress=continue",
        ];
        let block = feed(&mut assembler, &lines).pop().unwrap();
        assert_eq!(block.bitrate, -1.0);
        assert_eq!(block.total_size, -1);
        assert_eq!(block.out_time_us, -1);
        assert_eq!(block.speed, -1.0);
    }

    #[test]
    fn na_speed_is_derived_from_source_fps() {
        let mut assembler = BlockAssembler::new(Some(25.0));
        let lines = [
            "frame=100",
            "fps=50.0",
            "bitrate=N/A",
            "total_size=1000",
            "out_time_us=4000000",
            "dup_frames=0",
            "drop_frames=0",
            "speed=N/A",
            "progress=continue",
        ];
        let block = feed(&mut assembler, &lines).pop().unwrap();
        assert_eq!(block.speed, 2.0);
    }

    #[test]
    fn bracketed_log_lines_are_filtered_but_swallowed_frames_recovered() {
        let mut assembler = BlockAssembler::new(None);
        let lines = [
            "frame=1",
            "fps=1.0",
            "bitrate=1.0kbits/s",
            "total_size=1",
            "out_time_us=1",
            "dup_frames=0",
            "drop_frames=0",
            "speed=1x",
            "progress=continue",
            "[null @ 0000029040a27780] Application provided invalid, 0: 369 >= 369",
            "[null @ 0000029040a27780] frame=380",
            "fps=74.63",
            "bitrate=2.0kbits/s",
            "total_size=2",
            "out_time_us=2",
            "dup_frames=0",
            "drop_frames=0",
            "speed=2x",
            "progress=continue",
        ];
        let blocks = feed(&mut assembler, &lines);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].frame, 380);
    }

    #[test]
    fn interrupted_log_text_does_not_poison_the_block() {
        let mut assembler = BlockAssembler::new(None);
        let lines = [
            "frame=1646",
            "Application provided invalid, non monotonically increasing dts 0: 1645 >= 1645",
            "fps=67.94",
            "bitrate=3.1kbits/s",
            "total_size=3",
            "out_time_us=3",
            "dup_frames=0",
            "drop_frames=0",
            "speed=2.8x",
            "progress=continue",
        ];
        let blocks = feed(&mut assembler, &lines);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].frame, 1646);
    }

    #[test]
    fn end_block_stops_further_parsing() {
        let mut assembler = BlockAssembler::new(None);
        let mut lines: Vec<&str> = UPDATE.to_vec();
        let end_update = [
            "frame=2960",
            "fps=180.00",
            "bitrate=4000.0kbits/s",
            "total_size=61000000",
            "out_time_us=120000000",
            "dup_frames=0",
            "drop_frames=0",
            "speed=7.5x",
            "progress=end",
            "frame=9999",
            "progress=continue",
        ];
        lines.extend_from_slice(&end_update);

        let blocks = feed(&mut assembler, &lines);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[1].end);
        assert_eq!(blocks[1].frame, 2960);
    }

    #[test]
    fn percent_is_frame_over_total() {
        let block = ProgressBlock {
            frame: 150,
            fps: 0.0,
            bitrate: 0.0,
            total_size: 0,
            out_time_us: 0,
            dup_frames: 0,
            drop_frames: 0,
            speed: 1.0,
            end: false,
        };
        assert_eq!(block.percent(300), 50.0);
        assert_eq!(block.percent(0), 0.0);
    }
}
