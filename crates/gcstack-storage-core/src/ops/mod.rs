//! Storage operation handlers.
//!
//! This module contains the implementations of all emulator operations,
//! organized into submodules by category. Each submodule exposes methods on
//! [`crate::provider::StorageEmulator`]; the protocol adapters bridge their
//! wire formats to these methods and project the results through
//! [`crate::resource`].

pub mod acl;
pub mod bucket;
pub mod compose;
pub mod object;
pub mod rewrite;
pub mod upload;

pub use compose::{ComposeSource, MAX_COMPOSE_SOURCES};
pub use rewrite::CopySpec;
pub use upload::StreamingWrite;
