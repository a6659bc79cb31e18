//! CLI command implementations.

pub mod common;
pub mod config;
pub mod duck;
pub mod export;
pub mod graph;
pub mod mix;
pub mod offsets;
pub mod timeline;
