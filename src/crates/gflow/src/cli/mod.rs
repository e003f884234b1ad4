//! Command handlers, grouped by the resource they operate on.

pub mod graph;
pub mod reasoner;
pub mod workflow;

pub use crate::init::is_initialized;

/// Printed when a subcommand needs `~/.gflow` but it hasn't been set up yet.
pub fn get_init_instructions() -> String {
    "gflow is not initialized. Run 'gflow init' first.".to_string()
}
