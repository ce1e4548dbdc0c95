//! Builtin tool implementations and the registration helper that
//! populates a fresh [`crate::registry::ToolRegistry`] with all of them.

mod create_file;
mod doc;
mod media;
mod read_file;
mod replace_string;
mod run_terminal;
mod semantic_search;
mod web_fetch;

pub use create_file::CreateFileTool;
pub use doc::{CsvHandler, DocHandler, DocHandlerRegistry, PlainTextHandler, ReadDocTool, UnsupportedBinaryHandler, WriteDocTool};
pub use media::{
    GenerateImageTool, ImageToVideoTool, MediaArtifact, MediaProvider, SimulatedMediaProvider, SpeechToTextTool,
    TextToMusicTool, TextToSoundEffectsTool, TextToSpeechTool, TextToVideoTool, VideoToVideoWithSoundTool,
};
pub use read_file::ReadFileTool;
pub use replace_string::ReplaceStringTool;
pub use run_terminal::RunInTerminalTool;
pub use semantic_search::SemanticSearchTool;
pub use web_fetch::{WebFetchState, WebFetchTool};

use crate::registry::ToolRegistry;
use std::sync::Arc;

/// Registers every builtin tool — filesystem, terminal, search, document,
/// web, and media — using `provider` for the media tools and a fresh
/// [`WebFetchState`] for `web_fetch`'s cache and rate limiter.
pub fn register_all(registry: &ToolRegistry, media_provider: Arc<dyn MediaProvider>) {
    registry.register(Arc::new(ReadFileTool));
    registry.register(Arc::new(CreateFileTool));
    registry.register(Arc::new(ReplaceStringTool));
    registry.register(Arc::new(RunInTerminalTool));
    registry.register(Arc::new(SemanticSearchTool));
    registry.register(Arc::new(ReadDocTool::new()));
    registry.register(Arc::new(WriteDocTool::new()));
    registry.register(Arc::new(WebFetchTool::new()));
    registry.register(Arc::new(TextToSpeechTool::new(media_provider.clone())));
    registry.register(Arc::new(TextToSoundEffectsTool::new(media_provider.clone())));
    registry.register(Arc::new(TextToMusicTool::new(media_provider.clone())));
    registry.register(Arc::new(SpeechToTextTool::new(media_provider.clone())));
    registry.register(Arc::new(GenerateImageTool::new(media_provider.clone())));
    registry.register(Arc::new(TextToVideoTool::new(media_provider.clone())));
    registry.register(Arc::new(ImageToVideoTool::new(media_provider.clone())));
    registry.register(Arc::new(VideoToVideoWithSoundTool::new(media_provider)));
}
