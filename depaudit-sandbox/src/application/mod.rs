//! Sandbox application layer

pub mod runner;
