//! Flag sources: where flag snapshots are fetched from.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::{parse_flags, FlagError, Flags};
use crate::config::{FlagSourceKind, FlagsConfig};

/// Trait defining a remote or local origin of flag values.
#[async_trait]
pub trait FlagSource: Send + Sync {
    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    /// Fetches a complete flag snapshot.
    async fn fetch(&self) -> Result<Flags, FlagError>;
}

/// Reads flags from a JSON document on disk.
///
/// Pairs with a mounted ConfigMap or any sidecar that rewrites the file.
pub struct FileFlagSource {
    path: PathBuf,
    namespace: String,
}

impl FileFlagSource {
    pub fn new(path: PathBuf, namespace: String) -> Self {
        Self { path, namespace }
    }
}

#[async_trait]
impl FlagSource for FileFlagSource {
    fn describe(&self) -> String {
        format!("file {:?}", self.path)
    }

    async fn fetch(&self) -> Result<Flags, FlagError> {
        let document =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| FlagError::Read {
                    path: self.path.clone(),
                    source,
                })?;
        parse_flags(&document, &self.namespace)
    }
}

/// Fetches flags from an HTTP endpoint returning a JSON document.
pub struct HttpFlagSource {
    client: reqwest::Client,
    url: String,
    key: Option<String>,
    namespace: String,
}

impl HttpFlagSource {
    /// Creates a source for `url`; `key` is sent as a bearer token when set.
    pub fn new(
        url: String,
        key: Option<String>,
        namespace: String,
        timeout: Duration,
    ) -> Result<Self, FlagError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            url,
            key,
            namespace,
        })
    }
}

#[async_trait]
impl FlagSource for HttpFlagSource {
    fn describe(&self) -> String {
        format!("http {}", self.url)
    }

    async fn fetch(&self) -> Result<Flags, FlagError> {
        let mut request = self.client.get(&self.url);
        if let Some(key) = &self.key {
            request = request.bearer_auth(key);
        }

        let document = request.send().await?.error_for_status()?.text().await?;
        parse_flags(&document, &self.namespace)
    }
}

#[derive(Deserialize)]
struct KeyFile {
    #[serde(default, rename = "envKey")]
    env_key: String,
    #[serde(default)]
    key: String,
}

/// Reads the flag service environment key.
///
/// The file holds either the raw key or a JSON object with an `envKey`
/// (or `key`) field.
pub fn read_env_key(path: &Path) -> Result<String, FlagError> {
    let contents = std::fs::read_to_string(path).map_err(|source| FlagError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(FlagError::EmptyKey(path.to_path_buf()));
    }

    if !trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    let parsed: KeyFile =
        serde_json::from_str(trimmed).map_err(|source| FlagError::InvalidKeyFile {
            path: path.to_path_buf(),
            source,
        })?;

    [parsed.env_key, parsed.key]
        .into_iter()
        .find(|k| !k.is_empty())
        .ok_or_else(|| FlagError::MissingKey(path.to_path_buf()))
}

/// Builds the configured flag source, or `None` to run on defaults.
pub fn build_source(config: &FlagsConfig) -> Result<Option<Arc<dyn FlagSource>>, FlagError> {
    match config.source {
        FlagSourceKind::None => Ok(None),
        FlagSourceKind::File => {
            let path = config
                .path
                .clone()
                .ok_or(FlagError::Misconfigured("file source requires flags.path"))?;
            Ok(Some(Arc::new(FileFlagSource::new(
                path,
                config.namespace.clone(),
            ))))
        }
        FlagSourceKind::Http => {
            let url = config
                .url
                .clone()
                .ok_or(FlagError::Misconfigured("http source requires flags.url"))?;

            let key = match read_env_key(&config.key_file) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!("No flag service key: {} (requests are unauthenticated)", e);
                    None
                }
            };

            Ok(Some(Arc::new(HttpFlagSource::new(
                url,
                key,
                config.namespace.clone(),
                config.init_timeout(),
            )?)))
        }
    }
}
