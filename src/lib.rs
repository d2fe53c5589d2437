//! DJ catalog server library
//!
//! Exposes the server modules to the binaries and to the end-to-end tests.

pub mod asset_cache;
pub mod catalog_store;
pub mod config;
pub mod playback;
pub mod sampler;
pub mod server;
pub mod sqlite_persistence;

pub use server::{run_server, RequestsLoggingLevel};
