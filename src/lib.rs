//! Modern Mermaid: runtime loader for the Mermaid diagram library.
//!
//! Downloads the library from the npm registry on first use, caches the
//! last working version, and renders diagram code blocks once it is ready.
//! Only one load runs at a time no matter how many blocks render at once.

pub mod cache;
pub mod config;
pub mod error;
pub mod host;
pub mod loader;
pub mod plugin;
pub mod registry;
pub mod render;
pub mod settings;

pub use error::{LoaderError, LoaderResult};
pub use plugin::MermaidPlugin;
