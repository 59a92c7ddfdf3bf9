//! Caller-facing layer: wire shapes, request handlers and the HTTP server.

pub mod api;
pub mod content;
pub mod guidance;
pub mod server;
