//! Filesystem abstraction exposed by the context router, plus the local
//! implementation and its sandboxing rule.

use async_trait::async_trait;
use relay_kernel::{KernelError, KernelResult};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One entry returned by `list_directory`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size_bytes: u64,
}

/// One hit returned by `search`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchHit {
    pub path: String,
    pub line: Option<u64>,
    pub snippet: Option<String>,
}

/// Options accepted by [`Filesystem::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub regex: bool,
    pub max_results: usize,
}

/// The filesystem surface a tool needs, independent of whether it is
/// backed by the local disk or a remote hop.
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn read(&self, path: &str) -> KernelResult<String>;
    async fn read_binary(&self, path: &str) -> KernelResult<Vec<u8>>;
    async fn write(&self, path: &str, content: FileContent) -> KernelResult<()>;
    async fn create_directory(&self, path: &str) -> KernelResult<()>;
    async fn search(&self, query: &str, opts: SearchOptions) -> KernelResult<Vec<SearchHit>>;
    async fn list_directory(&self, path: &str) -> KernelResult<Vec<DirEntry>>;
}

/// Content passed to `write` — either text or raw bytes.
pub enum FileContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileContent {
    fn into_bytes(self) -> Vec<u8> {
        match self {
            FileContent::Text(s) => s.into_bytes(),
            FileContent::Bytes(b) => b,
        }
    }
}

/// A filesystem rooted at `workspace_root`. Every operation resolves its
/// path to an absolute form, resolves symlinks, and rejects any result
/// that escapes the root. Violations never touch the filesystem and
/// surface as `KernelError::InvalidPath`, never a raw errno string.
pub struct LocalFilesystem {
    workspace_root: PathBuf,
}

impl LocalFilesystem {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Resolve `raw` to an absolute path and verify containment within the
    /// workspace root. Symlinks are resolved for any existing path; for a
    /// path that does not yet exist (e.g. a file about to be created) the
    /// deepest existing ancestor is canonicalized instead, and the
    /// remaining components are appended lexically.
    fn resolve_sandboxed(&self, raw: &str) -> KernelResult<PathBuf> {
        let candidate = if Path::new(raw).is_absolute() {
            PathBuf::from(raw)
        } else {
            self.workspace_root.join(raw)
        };

        let root = self
            .workspace_root
            .canonicalize()
            .map_err(|e| KernelError::invalid_path(format!("workspace root unusable: {e}")))?;

        let resolved = canonicalize_best_effort(&candidate)?;

        if !resolved.starts_with(&root) {
            warn!(path = %raw, "path escaped workspace root");
            return Err(KernelError::invalid_path(format!(
                "path escapes workspace root: {raw}"
            )));
        }

        Ok(resolved)
    }
}

/// Canonicalize `path`, walking up to the nearest existing ancestor when
/// `path` itself (or a component of it) does not exist yet, then
/// re-appending the non-existent suffix lexically (no further symlink
/// resolution on a path that has no filesystem entry).
fn canonicalize_best_effort(path: &Path) -> KernelResult<PathBuf> {
    if let Ok(real) = path.canonicalize() {
        return Ok(real);
    }

    let mut existing = path.to_path_buf();
    let mut suffix: Vec<std::ffi::OsString> = Vec::new();
    loop {
        if existing.as_os_str().is_empty() {
            return Err(KernelError::invalid_path("no existing ancestor"));
        }
        if let Ok(real) = existing.canonicalize() {
            let mut out = real;
            for seg in suffix.into_iter().rev() {
                out.push(seg);
            }
            return Ok(out);
        }
        let Some(name) = existing.file_name().map(|n| n.to_os_string()) else {
            return Err(KernelError::invalid_path("path has no existing ancestor"));
        };
        suffix.push(name);
        if !existing.pop() {
            return Err(KernelError::invalid_path("path has no existing ancestor"));
        }
    }
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn read(&self, path: &str) -> KernelResult<String> {
        let resolved = self.resolve_sandboxed(path)?;
        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(KernelError::from)
    }

    async fn read_binary(&self, path: &str) -> KernelResult<Vec<u8>> {
        let resolved = self.resolve_sandboxed(path)?;
        tokio::fs::read(&resolved).await.map_err(KernelError::from)
    }

    async fn write(&self, path: &str, content: FileContent) -> KernelResult<()> {
        let resolved = self.resolve_sandboxed(path)?;
        tokio::fs::write(&resolved, content.into_bytes())
            .await
            .map_err(KernelError::from)
    }

    async fn create_directory(&self, path: &str) -> KernelResult<()> {
        let resolved = self.resolve_sandboxed(path)?;
        tokio::fs::create_dir_all(&resolved)
            .await
            .map_err(KernelError::from)
    }

    async fn search(&self, query: &str, opts: SearchOptions) -> KernelResult<Vec<SearchHit>> {
        let root = self.workspace_root.canonicalize().map_err(KernelError::from)?;
        let mut hits = Vec::new();
        let needle = if opts.case_sensitive {
            query.to_string()
        } else {
            query.to_lowercase()
        };
        walk_for_search(&root, &needle, opts.case_sensitive, opts.max_results.max(1), &mut hits)?;
        Ok(hits)
    }

    async fn list_directory(&self, path: &str) -> KernelResult<Vec<DirEntry>> {
        let resolved = self.resolve_sandboxed(path)?;
        let mut out = Vec::new();
        let mut rd = tokio::fs::read_dir(&resolved).await.map_err(KernelError::from)?;
        while let Some(entry) = rd.next_entry().await.map_err(KernelError::from)? {
            let meta = entry.metadata().await.map_err(KernelError::from)?;
            out.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: meta.is_dir(),
                size_bytes: meta.len(),
            });
        }
        Ok(out)
    }
}

fn walk_for_search(
    dir: &Path,
    needle: &str,
    case_sensitive: bool,
    max_results: usize,
    out: &mut Vec<SearchHit>,
) -> KernelResult<()> {
    if out.len() >= max_results {
        return Ok(());
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Ok(()),
    };
    for entry in entries.flatten() {
        if out.len() >= max_results {
            return Ok(());
        }
        let path = entry.path();
        if path.is_dir() {
            walk_for_search(&path, needle, case_sensitive, max_results, out)?;
            continue;
        }
        let Ok(contents) = std::fs::read_to_string(&path) else {
            continue;
        };
        for (idx, line) in contents.lines().enumerate() {
            let haystack = if case_sensitive { line.to_string() } else { line.to_lowercase() };
            if haystack.contains(needle) {
                out.push(SearchHit {
                    path: path.to_string_lossy().to_string(),
                    line: Some((idx + 1) as u64),
                    snippet: Some(line.trim().to_string()),
                });
                if out.len() >= max_results {
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}
