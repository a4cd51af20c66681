use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::{PipelineError, PipelineResult};

/// Façade over the local ffmpeg binary.
///
/// All primitives are blocking from the handler's perspective but await the
/// child process, so an encode never pins a worker's thread and sibling
/// workers keep draining the queue.
#[derive(Clone)]
pub struct Encoder {
    ffmpeg: PathBuf,
}

impl Encoder {
    /// Locate ffmpeg on PATH
    pub fn locate() -> PipelineResult<Self> {
        let ffmpeg = which::which("ffmpeg")
            .map_err(|e| PipelineError::EncoderMissing(e.to_string()))?;
        info!(ffmpeg = %ffmpeg.display(), "encoder located");
        Ok(Self { ffmpeg })
    }

    pub fn with_binary(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }

    /// Render a single dark solid-color frame, used as the concept-image
    /// placeholder when the provider cannot produce
    pub async fn make_solid_color_image(
        &self,
        (width, height): (u32, u32),
        out: &Path,
    ) -> PipelineResult<()> {
        let filter = format!("color=c=0x1a1a2e:s={width}x{height}");
        self.run("solid_color_image", &[
            "-y",
            "-f",
            "lavfi",
            "-i",
            &filter,
            "-frames:v",
            "1",
            &path_arg(out),
        ])
        .await
    }

    /// Scale then center-crop an image so the output is exactly the target
    /// size
    pub async fn crop_to_size(
        &self,
        input: &Path,
        (width, height): (u32, u32),
        out: &Path,
    ) -> PipelineResult<()> {
        let filter = format!(
            "scale={width}:{height}:force_original_aspect_ratio=increase,crop={width}:{height}"
        );
        self.run("crop_to_size", &[
            "-y",
            "-i",
            &path_arg(input),
            "-vf",
            &filter,
            "-frames:v",
            "1",
            "-q:v",
            "2",
            &path_arg(out),
        ])
        .await
    }

    /// Encode a still image into a video loop of the given length
    pub async fn loop_image_to_video(
        &self,
        input: &Path,
        (width, height): (u32, u32),
        seconds: u32,
        out: &Path,
    ) -> PipelineResult<()> {
        let filter = format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,format=yuv420p"
        );
        let duration = seconds.to_string();
        self.run("loop_image_to_video", &[
            "-y",
            "-loop",
            "1",
            "-i",
            &path_arg(input),
            "-t",
            &duration,
            "-vf",
            &filter,
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-r",
            "30",
            &path_arg(out),
        ])
        .await
    }

    /// Remux: copy the video stream, transcode audio to AAC 192k, truncate
    /// to the shorter stream
    pub async fn mux_audio(
        &self,
        video_in: &Path,
        audio_in: &Path,
        out: &Path,
    ) -> PipelineResult<()> {
        self.run("mux_audio", &[
            "-y",
            "-i",
            &path_arg(video_in),
            "-i",
            &path_arg(audio_in),
            "-map",
            "0:v:0",
            "-map",
            "1:a:0",
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
            "-shortest",
            &path_arg(out),
        ])
        .await
    }

    async fn run(&self, op: &'static str, args: &[&str]) -> PipelineResult<()> {
        debug!(op, args = ?args, "running ffmpeg");
        let output = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .chars()
            .rev()
            .take(800)
            .collect::<String>()
            .chars()
            .rev()
            .collect();
        Err(PipelineError::Encoder {
            command: op.to_string(),
            stderr: tail,
        })
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
