//! Terminal UI components for Synapse Studio.

pub mod icons;
pub mod progress;

pub use progress::{UiMode, WorkflowUI};
