//! Webhook server library: configuration and the HTTP delivery layer.

pub mod config;
pub mod server;
