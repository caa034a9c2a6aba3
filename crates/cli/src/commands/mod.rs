//! Subcommand implementations

pub mod alert;
pub mod sample;
pub mod score;
