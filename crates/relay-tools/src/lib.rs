//! Tool trait, dispatcher, and builtin tool implementations.

pub mod builtin;
pub mod registry;
pub mod tool;

pub use builtin::register_all;
pub use registry::{ToolDescriptor, ToolRegistry};
pub use tool::{Tool, ToolContext, ToolResult};
