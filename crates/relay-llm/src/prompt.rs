//! Multimodal prompt construction for the OpenAI-style adapter: a user
//! turn is either a plain string or a list of `text` / `image_url`
//! parts, with a three-tier rule for resolving each image attachment to
//! a URL.

use std::path::{Path, PathBuf};

use base64::Engine;
use relay_kernel::Attachment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
}

#[derive(Debug, Clone)]
pub enum TurnContent {
    Text(String),
    Multimodal(Vec<ContentPart>),
}

#[derive(Debug, Clone)]
pub struct PromptTurn {
    pub role: Role,
    pub content: TurnContent,
}

/// An ordered sequence of turns ready to hand to a provider's chat
/// completion request.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    pub turns: Vec<PromptTurn>,
}

impl Prompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_system(mut self, text: impl Into<String>) -> Self {
        self.turns.push(PromptTurn { role: Role::System, content: TurnContent::Text(text.into()) });
        self
    }

    pub fn push_text(mut self, role: Role, text: impl Into<String>) -> Self {
        self.turns.push(PromptTurn { role, content: TurnContent::Text(text.into()) });
        self
    }

    /// Appends a user turn built from text plus any image attachments,
    /// resolving each image per [`ImageResolver::resolve`]. Falls back to a
    /// plain text turn when there are no image attachments, matching the
    /// "single text part" shorthand.
    pub fn push_user_multimodal(mut self, text: impl Into<String>, images: Vec<ContentPart>) -> Self {
        let text = text.into();
        if images.is_empty() {
            self.turns.push(PromptTurn { role: Role::User, content: TurnContent::Text(text) });
            return self;
        }
        let mut parts = vec![ContentPart::Text { text }];
        parts.extend(images);
        self.turns.push(PromptTurn { role: Role::User, content: TurnContent::Multimodal(parts) });
        self
    }
}

/// Resolves image attachments to `image_url` parts using the three-tier
/// rule: media-service base dir, workspace-sandboxed absolute path, then
/// an API URL referencing the attachment id.
pub struct ImageResolver {
    pub media_base_dir: PathBuf,
    pub workspace_root: PathBuf,
    pub api_url_prefix: String,
}

impl ImageResolver {
    pub fn new(media_base_dir: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>, api_url_prefix: impl Into<String>) -> Self {
        Self {
            media_base_dir: media_base_dir.into(),
            workspace_root: workspace_root.into(),
            api_url_prefix: api_url_prefix.into(),
        }
    }

    pub fn resolve(&self, attachment: &Attachment) -> ContentPart {
        if let Some(url) = self.try_media_base_dir(attachment) {
            return ContentPart::ImageUrl { url };
        }
        if let Some(url) = self.try_workspace_path(attachment) {
            return ContentPart::ImageUrl { url };
        }
        ContentPart::ImageUrl { url: format!("{}/{}", self.api_url_prefix.trim_end_matches('/'), attachment.id) }
    }

    fn try_media_base_dir(&self, attachment: &Attachment) -> Option<String> {
        let candidate = self.media_base_dir.join(&attachment.relative_path);
        let bytes = read_if_contained(&candidate, &self.media_base_dir)?;
        Some(data_url(&attachment.mime_type, &bytes))
    }

    fn try_workspace_path(&self, attachment: &Attachment) -> Option<String> {
        let absolute = attachment.absolute_path.as_ref()?;
        let candidate = PathBuf::from(absolute);
        let bytes = read_if_contained(&candidate, &self.workspace_root)?;
        Some(data_url(&attachment.mime_type, &bytes))
    }
}

fn read_if_contained(candidate: &Path, root: &Path) -> Option<Vec<u8>> {
    let root = root.canonicalize().ok()?;
    let resolved = candidate.canonicalize().ok()?;
    if !resolved.starts_with(&root) {
        return None;
    }
    std::fs::read(&resolved).ok()
}

fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{encoded}")
}
