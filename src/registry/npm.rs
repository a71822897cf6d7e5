use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::http::send_with_retry;
use super::AssetSource;
use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};

/// Subset of the npm `/<package>/latest` document we care about
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryPackage {
    #[serde(default)]
    pub name: Option<String>,
    pub version: String,
}

/// `AssetSource` backed by the npm registry and a package CDN
pub struct NpmRegistry {
    client: Client,
    package: String,
    registry_url: Url,
    cdn_url: Url,
    asset_path: String,
    registry_timeout: Duration,
    asset_timeout: Duration,
    max_retries: usize,
}

impl NpmRegistry {
    /// Create a registry client from loader configuration
    pub fn new(config: &LoaderConfig) -> LoaderResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LoaderError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            package: config.package.clone(),
            registry_url: config.registry_url.clone(),
            cdn_url: config.cdn_url.clone(),
            asset_path: config.asset_path.clone(),
            registry_timeout: config.registry_timeout,
            asset_timeout: config.asset_timeout,
            max_retries: config.max_retries,
        })
    }

    fn latest_url(&self) -> LoaderResult<Url> {
        self.registry_url
            .join(&format!("{}/latest", self.package))
            .map_err(|e| LoaderError::Config(format!("Failed to build registry URL: {}", e)))
    }

    fn asset_url(&self, version: &str) -> LoaderResult<Url> {
        validate_version(version)?;
        self.cdn_url
            .join(&format!("{}@{}/{}", self.package, version, self.asset_path))
            .map_err(|e| LoaderError::Config(format!("Failed to build asset URL: {}", e)))
    }
}

impl NpmRegistry {
    async fn query_latest(&self, url: &Url) -> LoaderResult<String> {
        let response = send_with_retry(self.max_retries, || {
            self.client
                .get(url.clone())
                .header("Accept", "application/json")
                .timeout(self.registry_timeout)
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::network(format!(
                "registry returned HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let package: RegistryPackage = response
            .json()
            .await
            .map_err(|e| LoaderError::network(format!("invalid registry response: {}", e)))?;

        validate_version(&package.version)?;
        debug!(
            "Registry reports {} {}",
            package.name.as_deref().unwrap_or(&self.package),
            package.version
        );
        Ok(package.version)
    }

    async fn download(&self, url: &Url, version: &str) -> LoaderResult<String> {
        let response = send_with_retry(self.max_retries, || {
            self.client.get(url.clone()).timeout(self.asset_timeout)
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::network(format!(
                "HTTP error! status: {}",
                status.as_u16()
            )));
        }

        let code = response
            .text()
            .await
            .map_err(|e| LoaderError::network(format!("failed to read asset body: {}", e)))?;

        if code.trim().is_empty() {
            return Err(LoaderError::network(format!(
                "empty asset body for version {}",
                version
            )));
        }

        Ok(code)
    }
}

/// Bound a whole operation, retries and body read included, by `limit`.
async fn with_deadline<T>(
    limit: Duration,
    what: &str,
    operation: impl std::future::Future<Output = LoaderResult<T>>,
) -> LoaderResult<T> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(LoaderError::network(format!(
            "{} timed out after {:?}",
            what, limit
        ))),
    }
}

#[async_trait]
impl AssetSource for NpmRegistry {
    async fn resolve_latest_version(&self) -> LoaderResult<String> {
        let url = self.latest_url()?;
        debug!("Resolving latest version from {}", url);

        with_deadline(self.registry_timeout, "registry query", self.query_latest(&url))
            .await
            .map_err(|e| {
                error!("Failed to fetch latest version: {}", e);
                e
            })
    }

    async fn fetch_asset(&self, version: &str) -> LoaderResult<String> {
        let url = self.asset_url(version)?;
        debug!("Fetching library code from {}", url);

        let download = self.download(&url, version);
        let code = with_deadline(self.asset_timeout, "asset download", download)
            .await
            .map_err(|e| {
                error!("Failed to fetch library code: {}", e);
                e
            })?;

        debug!("Fetched {} bytes for version {}", code.len(), version);
        Ok(code)
    }
}

/// Reject version identifiers that would escape the CDN path.
fn validate_version(version: &str) -> LoaderResult<()> {
    let valid = !version.is_empty()
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'));
    if valid {
        Ok(())
    } else {
        Err(LoaderError::network(format!(
            "registry returned an invalid version identifier: {:?}",
            version
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_base_url;
    use std::time::Instant;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn registry() -> NpmRegistry {
        let tmp = tempdir().unwrap();
        let config = LoaderConfig::with_data_dir(tmp.path().to_path_buf()).unwrap();
        NpmRegistry::new(&config).unwrap()
    }

    /// Registry and CDN both pointed at `base`, with short timeouts
    fn local_registry(base: &str, timeout: Duration) -> NpmRegistry {
        let tmp = tempdir().unwrap();
        let mut config = LoaderConfig::with_data_dir(tmp.path().to_path_buf()).unwrap();
        config.registry_url = parse_base_url(base).unwrap();
        config.cdn_url = parse_base_url(base).unwrap();
        config.registry_timeout = timeout;
        config.asset_timeout = timeout;
        config.max_retries = 1;
        NpmRegistry::new(&config).unwrap()
    }

    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    /// Serve the same canned response to every connection
    async fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                read_request(&mut stream).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    /// Accept connections and never answer
    async fn serve_silent() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_latest_url() {
        let url = registry().latest_url().unwrap();
        assert_eq!(url.as_str(), "https://registry.npmjs.org/mermaid/latest");
    }

    #[test]
    fn test_asset_url() {
        let url = registry().asset_url("11.4.1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://cdn.jsdelivr.net/npm/mermaid@11.4.1/dist/mermaid.min.js"
        );
    }

    #[test]
    fn test_validate_version() {
        assert!(validate_version("10.9.0").is_ok());
        assert!(validate_version("11.0.0-alpha.1").is_ok());
        assert!(validate_version("").is_err());
        assert!(validate_version("../evil").is_err());
        assert!(validate_version("1.0.0/dist").is_err());
    }

    #[test]
    fn test_parse_registry_package() {
        let raw = r#"{"name":"mermaid","version":"11.4.1","main":"./dist/mermaid.core.mjs"}"#;
        let package: RegistryPackage = serde_json::from_str(raw).unwrap();
        assert_eq!(package.version, "11.4.1");
        assert_eq!(package.name.as_deref(), Some("mermaid"));
    }

    #[tokio::test]
    async fn test_resolve_latest_version() {
        let base = serve("200 OK", r#"{"name":"mermaid","version":"11.4.1"}"#).await;
        let registry = local_registry(&base, Duration::from_secs(5));

        assert_eq!(registry.resolve_latest_version().await.unwrap(), "11.4.1");
    }

    #[tokio::test]
    async fn test_resolve_without_version_is_network_error() {
        let base = serve("200 OK", r#"{"name":"mermaid"}"#).await;
        let registry = local_registry(&base, Duration::from_secs(5));

        let err = registry.resolve_latest_version().await.unwrap_err();
        assert!(err.is_network());
        assert!(err.to_string().contains("invalid registry response"));
    }

    #[tokio::test]
    async fn test_resolve_error_status_is_network_error() {
        let base = serve("404 Not Found", "not found").await;
        let registry = local_registry(&base, Duration::from_secs(5));

        let err = registry.resolve_latest_version().await.unwrap_err();
        assert!(err.is_network());
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[tokio::test]
    async fn test_resolve_timeout_covers_retries() {
        let base = serve_silent().await;
        let timeout = Duration::from_millis(300);
        let registry = local_registry(&base, timeout);

        let started = Instant::now();
        let err = registry.resolve_latest_version().await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_network());
        assert!(
            elapsed < Duration::from_millis(800),
            "timeout {:?} but waited {:?}",
            timeout,
            elapsed
        );
    }

    #[tokio::test]
    async fn test_fetch_asset() {
        let base = serve("200 OK", "globalThis.mermaid={initialize(c){},render(i,s){}};").await;
        let registry = local_registry(&base, Duration::from_secs(5));

        let code = registry.fetch_asset("11.4.1").await.unwrap();
        assert!(code.starts_with("globalThis.mermaid="));
    }

    #[tokio::test]
    async fn test_fetch_asset_not_found() {
        let base = serve("404 Not Found", "Couldn't find the requested release version").await;
        let registry = local_registry(&base, Duration::from_secs(5));

        let err = registry.fetch_asset("99.0.0").await.unwrap_err();
        assert_eq!(err, LoaderError::network("HTTP error! status: 404"));
    }

    #[tokio::test]
    async fn test_fetch_asset_empty_body() {
        let base = serve("200 OK", "").await;
        let registry = local_registry(&base, Duration::from_secs(5));

        let err = registry.fetch_asset("11.4.1").await.unwrap_err();
        assert!(err.is_network());
        assert!(err.to_string().contains("empty asset body"));
    }

    #[tokio::test]
    async fn test_fetch_asset_timeout_covers_retries() {
        let base = serve_silent().await;
        let registry = local_registry(&base, Duration::from_millis(300));

        let started = Instant::now();
        let err = registry.fetch_asset("11.4.1").await.unwrap_err();

        assert!(err.is_network());
        assert!(started.elapsed() < Duration::from_millis(800));
    }
}
