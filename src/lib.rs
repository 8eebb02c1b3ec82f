// Library root — exposes internals for integration tests and future crate consumers.
// The binary entry point is src/main.rs.

pub mod agent;
pub mod config;
pub mod docstore;
pub mod error;
pub mod llm;
pub mod logger;
pub mod web;
