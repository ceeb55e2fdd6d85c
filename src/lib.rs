#![forbid(unsafe_code)]

//! Streaming protocol client and human-in-the-loop coordinator for a remote
//! conversational agent service.

pub mod cli;
pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod session;
pub mod stream;
pub mod transport;

pub use client::{AgentClient, StreamHandle, StreamOutcome};
pub use config::ClientConfig;
pub use errors::{AppError, Result};
