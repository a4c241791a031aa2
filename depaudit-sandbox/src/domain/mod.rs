//! Sandbox domain layer

pub mod traits;
