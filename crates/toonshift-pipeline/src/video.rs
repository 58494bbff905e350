//! Video decode/encode via the system ffmpeg binaries
//!
//! No codec is bundled. `ffprobe` reads the stream geometry, an `ffmpeg`
//! child decodes raw RGB24 frames onto a pipe, and a second `ffmpeg` child
//! encodes the transformed frames (libx264, preset medium, 2000k) while
//! copying the audio track from the source. A missing binary is a structured
//! error, not a silent fallback.

use serde::Deserialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use thiserror::Error;
use toonshift_core::RgbFrame;
use tracing::{debug, warn};

/// Errors from the ffmpeg boundary
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("{binary} not found on PATH; install ffmpeg to process video")]
    BinaryMissing { binary: &'static str },

    #[error("ffprobe could not read {path}: {message}")]
    Probe { path: PathBuf, message: String },

    #[error("{binary} exited with status {status}")]
    ChildFailed {
        binary: &'static str,
        status: std::process::ExitStatus,
    },

    #[error("could not parse ffprobe output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn spawn_error(binary: &'static str, err: std::io::Error) -> VideoError {
    if err.kind() == std::io::ErrorKind::NotFound {
        VideoError::BinaryMissing { binary }
    } else {
        VideoError::Io(err)
    }
}

/// Geometry and timing of a video's primary stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Seconds; from the stream when present, otherwise the container.
    pub duration: f64,
}

impl VideoMeta {
    /// Approximate frame count, the way a progress display wants it.
    pub fn frame_estimate(&self) -> u64 {
        (self.fps * self.duration).round() as u64
    }

    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    avg_frame_rate: String,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Read stream geometry with ffprobe. Fails before any frame is touched if
/// the file is missing or not a video.
pub fn probe(path: impl AsRef<Path>) -> Result<VideoMeta, VideoError> {
    let path = path.as_ref();

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,duration",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| spawn_error("ffprobe", e))?;

    if !output.status.success() {
        return Err(VideoError::Probe {
            path: path.to_path_buf(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)?;
    let stream = parsed.streams.first().ok_or_else(|| VideoError::Probe {
        path: path.to_path_buf(),
        message: "no video stream".to_string(),
    })?;

    let fps = parse_rate(&stream.avg_frame_rate).ok_or_else(|| VideoError::Probe {
        path: path.to_path_buf(),
        message: format!("unparsable frame rate '{}'", stream.avg_frame_rate),
    })?;

    let duration = stream
        .duration
        .as_deref()
        .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoMeta {
        width: stream.width,
        height: stream.height,
        fps,
        duration,
    })
}

/// Parse ffprobe's rational rate notation, e.g. `30000/1001` or `25`.
fn parse_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => rate.parse().ok(),
    }
}

/// Decoder argv; `start`/`end` trim in seconds.
fn decode_args(input: &Path, start: Option<f64>, end: Option<f64>) -> Vec<String> {
    let mut args = vec!["-v".to_string(), "error".to_string()];
    if let Some(s) = start {
        args.push("-ss".to_string());
        args.push(s.to_string());
    }
    if let Some(e) = end {
        args.push("-to".to_string());
        args.push(e.to_string());
    }
    args.push("-i".to_string());
    args.push(input.display().to_string());
    args.extend(
        ["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]
            .iter()
            .map(|s| s.to_string()),
    );
    args
}

/// Encoder argv: fixed codec/preset/bitrate, audio copied from `audio_from`.
fn encode_args(
    output: &Path,
    width: u32,
    height: u32,
    fps: f64,
    audio_from: Option<&Path>,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-v",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
        "-s",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(format!("{width}x{height}"));
    args.push("-r".to_string());
    args.push(fps.to_string());
    args.push("-i".to_string());
    args.push("pipe:0".to_string());

    if let Some(src) = audio_from {
        args.push("-i".to_string());
        args.push(src.display().to_string());
        // Video from the pipe, audio (when the source has any) copied over.
        args.extend(
            ["-map", "0:v:0", "-map", "1:a?", "-c:a", "copy", "-shortest"]
                .iter()
                .map(|s| s.to_string()),
        );
    }

    args.extend(
        [
            "-c:v", "libx264", "-preset", "medium", "-b:v", "2000k", "-pix_fmt", "yuv420p",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(output.display().to_string());
    args
}

/// Streams decoded RGB frames out of an ffmpeg child.
pub struct FrameReader {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    frame_bytes: usize,
    done: bool,
}

impl FrameReader {
    pub fn open(
        input: &Path,
        meta: &VideoMeta,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<Self, VideoError> {
        let mut child = Command::new("ffmpeg")
            .args(decode_args(input, start, end))
            .stdout(Stdio::piped())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error("ffmpeg", e))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VideoError::Io(std::io::Error::other("decoder stdout unavailable")))?;
        Ok(Self {
            child,
            stdout,
            width: meta.width,
            height: meta.height,
            frame_bytes: meta.frame_bytes(),
            done: false,
        })
    }

    /// Next decoded frame. A short or failed read ends the stream; per the
    /// pipeline contract that is logged, not retried.
    pub fn next_frame(&mut self) -> Option<RgbFrame> {
        if self.done {
            return None;
        }
        let mut buf = vec![0u8; self.frame_bytes];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => RgbFrame::new(self.width, self.height, buf).ok(),
            Err(e) => {
                self.done = true;
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    debug!("decoder reached end of stream");
                } else {
                    warn!(error = %e, "frame read failed, stopping extraction");
                }
                None
            }
        }
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Streams raw frames into an encoding ffmpeg child.
pub struct FrameWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    frames_written: u64,
}

impl FrameWriter {
    pub fn create(
        output: &Path,
        meta: &VideoMeta,
        audio_from: Option<&Path>,
    ) -> Result<Self, VideoError> {
        let mut child = Command::new("ffmpeg")
            .args(encode_args(
                output,
                meta.width,
                meta.height,
                meta.fps,
                audio_from,
            ))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error("ffmpeg", e))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VideoError::Io(std::io::Error::other("encoder stdin unavailable")))?;
        Ok(Self {
            child,
            stdin: Some(stdin),
            frames_written: 0,
        })
    }

    pub fn write_frame(&mut self, frame: &RgbFrame) -> Result<(), VideoError> {
        if let Some(stdin) = self.stdin.as_mut() {
            stdin.write_all(frame.data())?;
            self.frames_written += 1;
        }
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Close the pipe and wait for the encoder to finalize the container.
    pub fn finish(mut self) -> Result<u64, VideoError> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if !status.success() {
            return Err(VideoError::ChildFailed {
                binary: "ffmpeg",
                status,
            });
        }
        Ok(self.frames_written)
    }
}

impl Drop for FrameWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        let _ = self.child.wait();
    }
}
