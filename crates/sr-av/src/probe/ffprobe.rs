//! ffprobe JSON structures and their mapping into [`MediaProbe`].

use serde::Deserialize;

use super::{AudioStreamInfo, MediaProbe, VideoStreamInfo};

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    pix_fmt: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    bit_rate: Option<String>,
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_json(json: &str) -> Result<MediaProbe, String> {
    let output: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| format!("ffprobe JSON parse error: {e}"))?;

    let (format_name, format_duration, bit_rate) = match output.format {
        Some(f) => (
            f.format_name,
            f.duration.as_deref().and_then(parse_f64),
            f.bit_rate.as_deref().and_then(parse_u64),
        ),
        None => (None, None, None),
    };

    let mut video = None;
    let mut audio = None;
    let mut stream_duration: Option<f64> = None;

    for stream in output.streams {
        if let Some(d) = stream.duration.as_deref().and_then(parse_f64) {
            stream_duration = Some(stream_duration.map_or(d, |cur| cur.max(d)));
        }
        match stream.codec_type.as_deref() {
            Some("video") if video.is_none() => {
                // Cover art shows up as a video stream without a frame rate.
                let frame_rate = stream
                    .avg_frame_rate
                    .as_deref()
                    .and_then(parse_frame_rate)
                    .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate));
                video = Some(VideoStreamInfo {
                    codec: stream.codec_name.unwrap_or_default(),
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    frame_rate,
                    pixel_format: stream.pix_fmt,
                });
            }
            Some("audio") if audio.is_none() => {
                audio = Some(AudioStreamInfo {
                    codec: stream.codec_name.unwrap_or_default(),
                    sample_rate: stream.sample_rate.as_deref().and_then(|s| s.parse().ok()),
                    channels: stream.channels,
                    bit_rate: stream.bit_rate.as_deref().and_then(parse_u64),
                });
            }
            _ => {}
        }
    }

    Ok(MediaProbe {
        format_name,
        duration_secs: format_duration.or(stream_duration),
        bit_rate,
        video,
        audio,
    })
}

fn parse_f64(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_u64(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok()
}

/// Parse `30000/1001`, `30/1` or `25` into frames per second.
pub(crate) fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let parts: Vec<&str> = rate_str.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den != 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate_str.parse().ok().filter(|r: &f64| *r > 0.0)
}
