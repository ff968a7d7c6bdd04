//! Multi-tenant chat gateway.
//!
//! Brokers conversations between tenant end users and a hosted LLM API:
//! entitlement and daily-quota gating, rolling conversation context,
//! credential rotation across upstream API keys, conversation persistence,
//! and lead alerting over a push channel.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
