//! The context router: transparent local/remote routing for filesystem and
//! terminal operations used by tools.

pub mod filesystem;
pub mod paths;
pub mod router;
pub mod terminal;

pub use filesystem::{DirEntry, FileContent, Filesystem, LocalFilesystem, SearchHit, SearchOptions};
pub use paths::{format_namespaced_path, parse_namespaced_path, LOCAL};
pub use router::{ContextInfo, ContextRouter, Hop};
pub use terminal::{CommandOutput, LocalTerminal, Terminal};
