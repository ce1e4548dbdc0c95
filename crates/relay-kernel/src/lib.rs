//! Core data model, error taxonomy, and in-process message broker shared by
//! every other `relay-*` crate.

pub mod bus;
pub mod error;
pub mod message;

pub use bus::{Event, MessageBroker, Subscription};
pub use error::{KernelError, KernelResult};
pub use message::{Attachment, AttachmentKind, Message, MessageKind, Sender};
