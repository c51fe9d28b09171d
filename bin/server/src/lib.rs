//! lingochat HTTP server.
//!
//! Exposes the conversation manager together with translation, speech
//! synthesis and speech recognition over a small JSON API.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod sweeper;
