//! Parsing of ffmpeg `-progress` output.
//!
//! With `-progress pipe:2 -nostats` ffmpeg writes blocks of `key=value` lines
//! terminated by `progress=continue` or `progress=end`. [`ProgressParser`]
//! accumulates one block at a time and yields an [`EncodeProgress`] at each
//! terminator.

/// Progress stats from an ffmpeg encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProgress {
    /// 0.0..=1.0 of the expected output duration.
    pub fraction: f64,
    /// Output timestamp reached, in seconds.
    pub out_time_secs: f64,
    pub fps: Option<f64>,
    pub speed: Option<String>,
    /// `true` on the final block.
    pub done: bool,
}

/// Incremental parser for ffmpeg progress blocks.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    total_secs: f64,
    out_time_us: Option<i64>,
    fps: Option<f64>,
    speed: Option<String>,
}

impl ProgressParser {
    /// Create a parser for an output expected to last `total_secs`.
    pub fn new(total_secs: f64) -> Self {
        Self {
            total_secs,
            out_time_us: None,
            fps: None,
            speed: None,
        }
    }

    /// Feed one line; returns a report when the line closes a block.
    pub fn feed(&mut self, line: &str) -> Option<EncodeProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key {
            "out_time_us" => self.out_time_us = value.parse().ok().or(self.out_time_us),
            // Older ffmpeg builds report microseconds under this key too.
            "out_time_ms" => {
                if self.out_time_us.is_none() {
                    self.out_time_us = value.parse().ok();
                }
            }
            "fps" => self.fps = value.parse().ok(),
            "speed" => self.speed = (value != "N/A").then(|| value.to_string()),
            "progress" => return Some(self.report(value == "end")),
            _ => {}
        }
        None
    }

    fn report(&mut self, done: bool) -> EncodeProgress {
        let out_time_secs = self.out_time_us.unwrap_or(0).max(0) as f64 / 1_000_000.0;
        let fraction = if done {
            1.0
        } else if self.total_secs > 0.0 {
            (out_time_secs / self.total_secs).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let report = EncodeProgress {
            fraction,
            out_time_secs,
            fps: self.fps,
            speed: self.speed.clone(),
            done,
        };
        self.out_time_us = None;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut ProgressParser, text: &str) -> Vec<EncodeProgress> {
        text.lines().filter_map(|l| parser.feed(l)).collect()
    }

    #[test]
    fn block_yields_fraction() {
        let mut p = ProgressParser::new(10.0);
        let reports = feed_all(
            &mut p,
            "frame=75\nfps=30.00\nout_time_us=2500000\nspeed=2.5x\nprogress=continue\n",
        );
        assert_eq!(reports.len(), 1);
        let r = &reports[0];
        assert!((r.fraction - 0.25).abs() < 1e-9);
        assert_eq!(r.fps, Some(30.0));
        assert_eq!(r.speed.as_deref(), Some("2.5x"));
        assert!(!r.done);
    }

    #[test]
    fn end_block_is_complete() {
        let mut p = ProgressParser::new(10.0);
        let reports = feed_all(&mut p, "out_time_us=9990000\nprogress=end\n");
        assert_eq!(reports[0].fraction, 1.0);
        assert!(reports[0].done);
    }

    #[test]
    fn fraction_is_clamped() {
        let mut p = ProgressParser::new(1.0);
        let r = feed_all(&mut p, "out_time_us=5000000\nprogress=continue").remove(0);
        assert_eq!(r.fraction, 1.0);
    }

    #[test]
    fn unknown_total_reports_zero() {
        let mut p = ProgressParser::new(0.0);
        let r = feed_all(&mut p, "out_time_us=5000000\nprogress=continue").remove(0);
        assert_eq!(r.fraction, 0.0);
        assert_eq!(r.out_time_secs, 5.0);
    }

    #[test]
    fn noise_lines_are_ignored() {
        let mut p = ProgressParser::new(4.0);
        let reports = feed_all(
            &mut p,
            "[mp4 @ 0x55] Starting second pass\nspeed=N/A\nout_time_ms=1000000\nprogress=continue",
        );
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].speed, None);
        assert!((reports[0].fraction - 0.25).abs() < 1e-9);
    }
}
