//! # gflow-core
//!
//! Shared types, the unified error taxonomy, deterministic id helpers and the
//! narrow capability traits (`TaskTool`, `Retriever`) that every other crate
//! in the gflow workspace builds on.
//!
//! This crate defines contracts only — it never instantiates a concrete
//! `TaskTool` or `Retriever`. Concrete wiring belongs to the caller.

pub mod error;
pub mod ids;
pub mod traits;
pub mod value;

pub use error::{GflowError, Result};
pub use traits::{Chunk, Retriever, TaskTool, ToolInvocation, ToolOutcome};
pub use value::{props, PropertyMap};
