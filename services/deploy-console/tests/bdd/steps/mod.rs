//! BDD step definitions for the deploy console

pub mod engine_steps;
pub mod reorder_steps;
pub mod sync_steps;
