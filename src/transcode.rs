//! Audio to video transcoding via the external ffmpeg binary
//!
//! A downloaded episode becomes an uploadable video by rendering the audio
//! over a background image. An animated `.gif` background is looped for the
//! full length of the audio and re-encoded; any other image is held as a
//! single frame with the audio stream copied through untouched.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Turns a downloaded audio file into an uploadable video
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Render `audio` over `background` into `dest_dir`, returning the
    /// path of the written video
    async fn render(&self, audio: &Path, background: &Path, dest_dir: &Path) -> Result<PathBuf>;
}

/// Transcoder backed by the external `ffmpeg` binary
///
/// # Examples
///
/// ```no_run
/// use pod2tube::transcode::{FfmpegTranscoder, Transcoder};
/// use std::path::{Path, PathBuf};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Create with explicit path
/// let transcoder = FfmpegTranscoder::new(PathBuf::from("/usr/bin/ffmpeg"));
///
/// // Or auto-discover from PATH
/// let transcoder = FfmpegTranscoder::from_path()
///     .expect("ffmpeg not found in PATH");
///
/// let video = transcoder
///     .render(
///         Path::new("audios/ep1.mp3"),
///         Path::new("background.gif"),
///         Path::new("videos"),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct FfmpegTranscoder {
    binary_path: PathBuf,
}

impl FfmpegTranscoder {
    /// Create a new transcoder with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find ffmpeg in PATH
    ///
    /// Uses the `which` crate to search for the `ffmpeg` binary in the
    /// system PATH. Returns `None` if the binary is not found.
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn render(&self, audio: &Path, background: &Path, dest_dir: &Path) -> Result<PathBuf> {
        let output_path = video_output_path(audio, dest_dir).ok_or_else(|| {
            Error::Io(std::io::Error::other(format!(
                "audio path has no file name: {}",
                audio.display()
            )))
        })?;

        fs::create_dir_all(dest_dir).await?;

        let args = build_args(background, audio, &output_path);
        debug!(binary = %self.binary_path.display(), ?args, "Running ffmpeg");

        let output = Command::new(&self.binary_path)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            // ffmpeg is chatty on stderr; the actual error is in the last lines
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(5)..].join("\n");
            return Err(Error::ExternalTool(format!(
                "ffmpeg exited with {}: {}",
                output.status, tail
            )));
        }

        info!(
            audio = %audio.display(),
            video = %output_path.display(),
            "Rendered video"
        );

        Ok(output_path)
    }
}

/// Output path: the audio file's stem with an `.mp4` extension, in `dest_dir`
///
/// Dots inside the stem are preserved, so `my.episode.mp3` renders to
/// `my.episode.mp4`.
fn video_output_path(audio: &Path, dest_dir: &Path) -> Option<PathBuf> {
    let stem = audio.file_stem()?;
    let mut name = stem.to_os_string();
    name.push(".mp4");
    Some(dest_dir.join(name))
}

/// Build the ffmpeg argument list for one render
fn build_args(background: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    // Overwrite any previous render of the same episode
    let mut args: Vec<OsString> = vec!["-y".into()];

    if is_animated_background(background) {
        // Loop the animation for the whole episode and re-encode video and audio
        args.extend(["-stream_loop", "-1", "-i"].map(OsString::from));
        args.push(background.into());
        args.push("-i".into());
        args.push(audio.into());
        args.extend(
            [
                "-map", "0", "-map", "1:a", "-c:v", "libx265", "-crf", "26", "-preset",
                "ultrafast", "-s", "1920x1080", "-pix_fmt", "yuv420p", "-c:a", "aac",
                "-movflags", "+faststart", "-shortest",
            ]
            .map(OsString::from),
        );
    } else {
        // A still image needs one frame per second; the audio is copied through
        args.extend(["-r", "1", "-loop", "1", "-i"].map(OsString::from));
        args.push(background.into());
        args.push("-i".into());
        args.push(audio.into());
        args.extend(
            ["-acodec", "copy", "-r", "1", "-shortest", "-vf", "scale=1920:1080"]
                .map(OsString::from),
        );
    }

    args.push(output.into());
    args
}

/// `.gif` backgrounds (any case) take the animated loop path
fn is_animated_background(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"))
}
