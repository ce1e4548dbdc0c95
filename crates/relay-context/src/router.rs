//! The context router itself: resolves "which filesystem / which shell"
//! for the active session, either `local` or a named remote hop.

use crate::filesystem::{Filesystem, LocalFilesystem};
use crate::paths::{self, LOCAL};
use crate::terminal::{LocalTerminal, Terminal};
use dashmap::DashMap;
use relay_kernel::{KernelError, KernelResult};
use std::path::PathBuf;
use std::sync::Arc;

/// A snapshot of the active context, returned by `get_context()`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextInfo {
    pub context_id: String,
    pub status: String,
    pub workspace_root: String,
    pub cwd: String,
}

/// A registered remote hop: a named context with its own workspace root.
/// Filesystem/terminal construction for a hop is left to the caller that
/// registers it (e.g. an SSH-backed implementation supplied by an
/// integration crate outside this core) — the router only tracks which
/// hops exist and their workspace roots.
#[derive(Clone)]
pub struct Hop {
    pub workspace_root: PathBuf,
    pub filesystem: Arc<dyn Filesystem>,
    pub terminal: Arc<dyn Terminal>,
}

/// Resolves the active context (local or a named hop) to concrete
/// filesystem/terminal implementations.
pub struct ContextRouter {
    current: parking_lot::RwLock<String>,
    local_root: PathBuf,
    local_fs: Arc<dyn Filesystem>,
    local_terminal: Arc<dyn Terminal>,
    hops: DashMap<String, Hop>,
}

impl ContextRouter {
    pub fn new(local_workspace_root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = local_workspace_root.into();
        Self {
            current: parking_lot::RwLock::new(LOCAL.to_string()),
            local_fs: Arc::new(LocalFilesystem::new(root.clone())),
            local_terminal: Arc::new(LocalTerminal::new(LOCAL, root.clone())),
            local_root: root,
            hops: DashMap::new(),
        }
    }

    /// Register a remote hop under `id`.
    pub fn register_hop(&self, id: impl Into<String>, hop: Hop) {
        self.hops.insert(id.into(), hop);
    }

    pub fn remove_hop(&self, id: &str) {
        self.hops.remove(id);
    }

    /// Switch the active context. Returns `NotFound` if `id` is neither
    /// `local` nor a registered hop.
    pub fn set_active(&self, id: impl Into<String>) -> KernelResult<()> {
        let id = id.into();
        if id != LOCAL && !self.hops.contains_key(&id) {
            return Err(KernelError::not_found(format!("unknown context: {id}")));
        }
        *self.current.write() = id;
        Ok(())
    }

    pub fn active_context_id(&self) -> String {
        self.current.read().clone()
    }

    pub fn get_filesystem(&self) -> Arc<dyn Filesystem> {
        self.get_filesystem_for(&self.active_context_id())
    }

    pub fn get_filesystem_for(&self, context_id: &str) -> Arc<dyn Filesystem> {
        if context_id == LOCAL {
            self.local_fs.clone()
        } else if let Some(hop) = self.hops.get(context_id) {
            hop.filesystem.clone()
        } else {
            self.local_fs.clone()
        }
    }

    pub fn get_terminal(&self) -> Arc<dyn Terminal> {
        self.get_terminal_for(&self.active_context_id())
    }

    pub fn get_terminal_for(&self, context_id: &str) -> Arc<dyn Terminal> {
        if context_id == LOCAL {
            self.local_terminal.clone()
        } else if let Some(hop) = self.hops.get(context_id) {
            hop.terminal.clone()
        } else {
            self.local_terminal.clone()
        }
    }

    pub fn get_context(&self) -> ContextInfo {
        let id = self.active_context_id();
        let workspace_root = if id == LOCAL {
            self.local_root.to_string_lossy().to_string()
        } else {
            self.hops
                .get(&id)
                .map(|h| h.workspace_root.to_string_lossy().to_string())
                .unwrap_or_default()
        };
        ContextInfo {
            context_id: id.clone(),
            status: if id == LOCAL || self.hops.contains_key(&id) {
                "active".to_string()
            } else {
                "unknown".to_string()
            },
            cwd: workspace_root.clone(),
            workspace_root,
        }
    }

    pub fn parse_namespaced_path(&self, raw: &str) -> (String, String) {
        paths::parse_namespaced_path(raw)
    }

    pub fn format_namespaced_path(&self, context_id: &str, absolute_path: &str) -> String {
        paths::format_namespaced_path(context_id, absolute_path)
    }

    pub fn local_workspace_root(&self) -> &std::path::Path {
        &self.local_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_to_local_context() {
        let dir = tempdir().unwrap();
        let router = ContextRouter::new(dir.path());
        assert_eq!(router.active_context_id(), "local");
        let info = router.get_context();
        assert_eq!(info.context_id, "local");
    }

    #[test]
    fn switching_to_unknown_hop_fails() {
        let dir = tempdir().unwrap();
        let router = ContextRouter::new(dir.path());
        assert!(router.set_active("ghost").is_err());
    }

    #[tokio::test]
    async fn local_filesystem_is_sandboxed_to_workspace_root() {
        let dir = tempdir().unwrap();
        let router = ContextRouter::new(dir.path());
        let fs = router.get_filesystem();
        let result = fs.read("../outside.txt").await;
        assert!(result.is_err());
    }
}
