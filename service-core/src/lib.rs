//! service-core: Shared infrastructure for the chat gateway services.
pub mod config;
pub mod error;
pub mod observability;
