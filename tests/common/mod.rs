//! Common test utilities shared by the application tests

#![allow(dead_code)]

pub mod test_helpers;

pub use test_helpers::*;
