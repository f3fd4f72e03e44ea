//! HTTP Adapter - axum Router and Renderers
//!
//! One listener serves the exposition, the swap board and the probes.

pub mod render;
pub mod server;

pub use server::{AppState, HttpServer, router};
