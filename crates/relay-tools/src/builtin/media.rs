//! Media generation tools: `text_to_speech`,
//! `text_to_sound_effects`, `text_to_music`, `speech_to_text`,
//! `generate_image`, `text_to_video`, `image_to_video`,
//! `video_to_video_with_sound`.
//!
//! Each tool delegates to a [`MediaProvider`] so a real backend can be
//! swapped in later; [`SimulatedMediaProvider`] gives deterministic bytes
//! for tests and for running without API credentials configured.

use crate::tool::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use relay_context::FileContent;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// A generated media artifact: raw bytes plus the extension to save it
/// under.
pub struct MediaArtifact {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub mime_type: &'static str,
}

/// Backend for media generation/transcription. Every method is
/// independent so a provider can support a subset and return
/// `KernelError::External` for the rest.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    async fn text_to_speech(&self, text: &str, voice: Option<&str>) -> Result<MediaArtifact, String>;
    async fn text_to_sound_effects(&self, prompt: &str, duration_seconds: f64) -> Result<MediaArtifact, String>;
    async fn text_to_music(&self, prompt: &str, duration_seconds: f64) -> Result<MediaArtifact, String>;
    async fn speech_to_text(&self, audio: &[u8]) -> Result<String, String>;
    async fn generate_image(&self, prompt: &str) -> Result<MediaArtifact, String>;
    async fn text_to_video(&self, prompt: &str, duration_seconds: f64) -> Result<MediaArtifact, String>;
    async fn image_to_video(&self, image: &[u8], prompt: &str) -> Result<MediaArtifact, String>;
    async fn video_to_video_with_sound(&self, video: &[u8], prompt: &str) -> Result<MediaArtifact, String>;
}

/// Deterministic provider used when no real media API key is configured.
/// Derives fixed-size placeholder bytes from the input so repeated calls
/// with the same arguments are reproducible, which tests rely on.
pub struct SimulatedMediaProvider;

fn placeholder(seed: &str, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let seed_bytes = seed.as_bytes();
    for i in 0..len {
        out.push(seed_bytes[i % seed_bytes.len().max(1)].wrapping_add(i as u8));
    }
    out
}

#[async_trait]
impl MediaProvider for SimulatedMediaProvider {
    async fn text_to_speech(&self, text: &str, _voice: Option<&str>) -> Result<MediaArtifact, String> {
        if text.trim().is_empty() {
            return Err("text must not be empty".into());
        }
        Ok(MediaArtifact { bytes: placeholder(text, 256), extension: "mp3", mime_type: "audio/mpeg" })
    }

    async fn text_to_sound_effects(&self, prompt: &str, duration_seconds: f64) -> Result<MediaArtifact, String> {
        if prompt.trim().is_empty() {
            return Err("prompt must not be empty".into());
        }
        let len = (duration_seconds.max(1.0) * 32.0) as usize;
        Ok(MediaArtifact { bytes: placeholder(prompt, len), extension: "wav", mime_type: "audio/wav" })
    }

    async fn text_to_music(&self, prompt: &str, duration_seconds: f64) -> Result<MediaArtifact, String> {
        if prompt.trim().is_empty() {
            return Err("prompt must not be empty".into());
        }
        let len = (duration_seconds.max(1.0) * 32.0) as usize;
        Ok(MediaArtifact { bytes: placeholder(prompt, len), extension: "mp3", mime_type: "audio/mpeg" })
    }

    async fn speech_to_text(&self, audio: &[u8]) -> Result<String, String> {
        if audio.is_empty() {
            return Err("audio must not be empty".into());
        }
        Ok(format!("[transcribed {} bytes of audio]", audio.len()))
    }

    async fn generate_image(&self, prompt: &str) -> Result<MediaArtifact, String> {
        if prompt.trim().is_empty() {
            return Err("prompt must not be empty".into());
        }
        Ok(MediaArtifact { bytes: placeholder(prompt, 1024), extension: "png", mime_type: "image/png" })
    }

    async fn text_to_video(&self, prompt: &str, duration_seconds: f64) -> Result<MediaArtifact, String> {
        if prompt.trim().is_empty() {
            return Err("prompt must not be empty".into());
        }
        let len = (duration_seconds.max(1.0) * 64.0) as usize;
        Ok(MediaArtifact { bytes: placeholder(prompt, len), extension: "mp4", mime_type: "video/mp4" })
    }

    async fn image_to_video(&self, image: &[u8], prompt: &str) -> Result<MediaArtifact, String> {
        if image.is_empty() {
            return Err("image must not be empty".into());
        }
        Ok(MediaArtifact { bytes: placeholder(prompt, image.len().max(64)), extension: "mp4", mime_type: "video/mp4" })
    }

    async fn video_to_video_with_sound(&self, video: &[u8], prompt: &str) -> Result<MediaArtifact, String> {
        if video.is_empty() {
            return Err("video must not be empty".into());
        }
        Ok(MediaArtifact { bytes: placeholder(prompt, video.len().max(64)), extension: "mp4", mime_type: "video/mp4" })
    }
}

async fn save_artifact(
    ctx: &ToolContext,
    output_path: &str,
    artifact: Result<MediaArtifact, String>,
) -> ToolResult {
    let artifact = match artifact {
        Ok(a) => a,
        Err(e) => return ToolResult::err(e),
    };
    let fs = ctx.router.get_filesystem();
    match fs.write(output_path, FileContent::Bytes(artifact.bytes)).await {
        Ok(()) => ToolResult::ok(serde_json::json!({
            "filePath": output_path,
            "mimeType": artifact.mime_type,
            "extension": artifact.extension,
        })),
        Err(e) => ToolResult::err(e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct TtsArgs {
    text: String,
    voice: Option<String>,
    #[serde(rename = "outputPath")]
    output_path: String,
}

pub struct TextToSpeechTool {
    provider: Arc<dyn MediaProvider>,
}

impl TextToSpeechTool {
    pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for TextToSpeechTool {
    fn name(&self) -> &str {
        "text_to_speech"
    }
    fn description(&self) -> &str {
        "Synthesize speech audio from text."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type":"object","properties":{"text":{"type":"string"},"voice":{"type":"string"},"outputPath":{"type":"string"}},"required":["text","outputPath"]})
    }
    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let args: TtsArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
        };
        let artifact = self.provider.text_to_speech(&args.text, args.voice.as_deref()).await;
        save_artifact(ctx, &args.output_path, artifact).await
    }
}

#[derive(Debug, Deserialize)]
struct DurationPromptArgs {
    prompt: String,
    #[serde(rename = "durationSeconds", default = "default_duration")]
    duration_seconds: f64,
    #[serde(rename = "outputPath")]
    output_path: String,
}

fn default_duration() -> f64 {
    5.0
}

macro_rules! duration_prompt_tool {
    ($struct_name:ident, $tool_name:literal, $description:literal, $method:ident) => {
        pub struct $struct_name {
            provider: Arc<dyn MediaProvider>,
        }

        impl $struct_name {
            pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
                Self { provider }
            }
        }

        #[async_trait]
        impl Tool for $struct_name {
            fn name(&self) -> &str {
                $tool_name
            }
            fn description(&self) -> &str {
                $description
            }
            fn parameters_schema(&self) -> Value {
                serde_json::json!({"type":"object","properties":{"prompt":{"type":"string"},"durationSeconds":{"type":"number"},"outputPath":{"type":"string"}},"required":["prompt","outputPath"]})
            }
            async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult {
                let args: DurationPromptArgs = match serde_json::from_value(arguments) {
                    Ok(a) => a,
                    Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
                };
                let artifact = self.provider.$method(&args.prompt, args.duration_seconds).await;
                save_artifact(ctx, &args.output_path, artifact).await
            }
        }
    };
}

duration_prompt_tool!(
    TextToSoundEffectsTool,
    "text_to_sound_effects",
    "Generate a short sound effect clip from a text description.",
    text_to_sound_effects
);
duration_prompt_tool!(TextToMusicTool, "text_to_music", "Generate a music clip from a text prompt.", text_to_music);
duration_prompt_tool!(TextToVideoTool, "text_to_video", "Generate a video clip from a text prompt.", text_to_video);

#[derive(Debug, Deserialize)]
struct SpeechToTextArgs {
    #[serde(rename = "audioPath")]
    audio_path: String,
}

pub struct SpeechToTextTool {
    provider: Arc<dyn MediaProvider>,
}

impl SpeechToTextTool {
    pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for SpeechToTextTool {
    fn name(&self) -> &str {
        "speech_to_text"
    }
    fn description(&self) -> &str {
        "Transcribe an audio file to text."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type":"object","properties":{"audioPath":{"type":"string"}},"required":["audioPath"]})
    }
    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let args: SpeechToTextArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
        };
        let fs = ctx.router.get_filesystem();
        let audio = match fs.read_binary(&args.audio_path).await {
            Ok(b) => b,
            Err(e) => return ToolResult::err(e.to_string()),
        };
        match self.provider.speech_to_text(&audio).await {
            Ok(text) => ToolResult::ok(serde_json::json!({ "text": text })),
            Err(e) => ToolResult::err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateImageArgs {
    prompt: String,
    #[serde(rename = "outputPath")]
    output_path: String,
}

pub struct GenerateImageTool {
    provider: Arc<dyn MediaProvider>,
}

impl GenerateImageTool {
    pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for GenerateImageTool {
    fn name(&self) -> &str {
        "generate_image"
    }
    fn description(&self) -> &str {
        "Generate an image from a text prompt."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type":"object","properties":{"prompt":{"type":"string"},"outputPath":{"type":"string"}},"required":["prompt","outputPath"]})
    }
    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let args: GenerateImageArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
        };
        let artifact = self.provider.generate_image(&args.prompt).await;
        save_artifact(ctx, &args.output_path, artifact).await
    }
}

#[derive(Debug, Deserialize)]
struct ImageToVideoArgs {
    #[serde(rename = "imagePath")]
    image_path: String,
    prompt: String,
    #[serde(rename = "outputPath")]
    output_path: String,
}

pub struct ImageToVideoTool {
    provider: Arc<dyn MediaProvider>,
}

impl ImageToVideoTool {
    pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for ImageToVideoTool {
    fn name(&self) -> &str {
        "image_to_video"
    }
    fn description(&self) -> &str {
        "Animate a still image into a short video given a prompt."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type":"object","properties":{"imagePath":{"type":"string"},"prompt":{"type":"string"},"outputPath":{"type":"string"}},"required":["imagePath","prompt","outputPath"]})
    }
    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let args: ImageToVideoArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
        };
        let fs = ctx.router.get_filesystem();
        let image = match fs.read_binary(&args.image_path).await {
            Ok(b) => b,
            Err(e) => return ToolResult::err(e.to_string()),
        };
        let artifact = self.provider.image_to_video(&image, &args.prompt).await;
        save_artifact(ctx, &args.output_path, artifact).await
    }
}

#[derive(Debug, Deserialize)]
struct VideoToVideoArgs {
    #[serde(rename = "videoPath")]
    video_path: String,
    prompt: String,
    #[serde(rename = "outputPath")]
    output_path: String,
}

pub struct VideoToVideoWithSoundTool {
    provider: Arc<dyn MediaProvider>,
}

impl VideoToVideoWithSoundTool {
    pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for VideoToVideoWithSoundTool {
    fn name(&self) -> &str {
        "video_to_video_with_sound"
    }
    fn description(&self) -> &str {
        "Add generated sound to an existing video given a prompt."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type":"object","properties":{"videoPath":{"type":"string"},"prompt":{"type":"string"},"outputPath":{"type":"string"}},"required":["videoPath","prompt","outputPath"]})
    }
    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let args: VideoToVideoArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid arguments: {e}")),
        };
        let fs = ctx.router.get_filesystem();
        let video = match fs.read_binary(&args.video_path).await {
            Ok(b) => b,
            Err(e) => return ToolResult::err(e.to_string()),
        };
        let artifact = self.provider.video_to_video_with_sound(&video, &args.prompt).await;
        save_artifact(ctx, &args.output_path, artifact).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_context::ContextRouter;

    fn ctx() -> (tempfile::TempDir, ToolContext) {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(ContextRouter::new(dir.path()));
        (dir, ToolContext::new(router))
    }

    #[tokio::test]
    async fn text_to_speech_writes_artifact() {
        let (_dir, ctx) = ctx();
        let tool = TextToSpeechTool::new(Arc::new(SimulatedMediaProvider));
        let result = tool
            .invoke(serde_json::json!({"text": "hello", "outputPath": "out.mp3"}), &ctx)
            .await;
        assert!(result.success);
        let bytes = ctx.router.get_filesystem().read_binary("out.mp3").await.unwrap();
        assert_eq!(bytes.len(), 256);
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let (_dir, ctx) = ctx();
        let tool = GenerateImageTool::new(Arc::new(SimulatedMediaProvider));
        let result = tool.invoke(serde_json::json!({"prompt": "", "outputPath": "o.png"}), &ctx).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn speech_to_text_reads_input_file() {
        let (_dir, ctx) = ctx();
        ctx.router
            .get_filesystem()
            .write("in.wav", FileContent::Bytes(vec![1, 2, 3, 4]))
            .await
            .unwrap();
        let tool = SpeechToTextTool::new(Arc::new(SimulatedMediaProvider));
        let result = tool.invoke(serde_json::json!({"audioPath": "in.wav"}), &ctx).await;
        assert!(result.success);
        assert!(result.data.unwrap()["text"].as_str().unwrap().contains("4 bytes"));
    }

    #[tokio::test]
    async fn deterministic_output_for_same_input() {
        let provider = SimulatedMediaProvider;
        let a = provider.generate_image("a cat").await.unwrap();
        let b = provider.generate_image("a cat").await.unwrap();
        assert_eq!(a.bytes, b.bytes);
    }
}
