//! Sandbox infrastructure

pub mod command;
pub mod workspace;
