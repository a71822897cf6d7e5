//! Version and asset resolution.
//!
//! The loader only needs two questions answered: what is the newest
//! published version, and what is the library source for a given version.
//! `AssetSource` captures both so the coordinator can be driven by the real
//! npm registry or by an in-process fake.

mod http;
mod npm;

pub use npm::{NpmRegistry, RegistryPackage};

use async_trait::async_trait;

use crate::error::LoaderResult;

/// Remote source of library versions and code
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Query the registry for the newest published version.
    ///
    /// Fails with `LoaderError::Network` on timeout or transport failure.
    async fn resolve_latest_version(&self) -> LoaderResult<String>;

    /// Download the full library source for `version`.
    ///
    /// Fails with `LoaderError::Network` on non-success status or timeout.
    async fn fetch_asset(&self, version: &str) -> LoaderResult<String>;
}
