//! Downloads of the dataset archive and the content-type map
//!
//! Files land in the data directory under their remote name and are never
//! downloaded again once present.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::IngestConfig;
use crate::enricher::TypeMap;
use crate::error::{IngestError, Result};

const PROGRESS_EVERY_CHUNKS: u64 = 64;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Local files needed for an ingestion run
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub archive: PathBuf,
    pub type_map: Arc<TypeMap>,
}

/// Last path segment of `url`, used as the local file name.
pub fn file_name_from_url(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| IngestError::Config(format!("invalid download url {url}: {e}")))?;

    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| IngestError::Config(format!("download url {url} has no file name")))
}

/// Fetch `url` into `folder` unless a file with the same name exists there.
pub async fn download_file(client: &reqwest::Client, url: &str, folder: &Path) -> Result<PathBuf> {
    let target = folder.join(file_name_from_url(url)?);
    if fs::try_exists(&target).await? {
        info!(path = %target.display(), "Using local copy");
        return Ok(target);
    }

    fs::create_dir_all(folder).await?;
    info!(url, "Downloading");

    let mut response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(IngestError::DownloadStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let partial = target.with_extension(match target.extension() {
        Some(ext) => format!("{}.part", ext.to_string_lossy()),
        None => "part".to_string(),
    });
    let mut file = fs::File::create(&partial).await?;

    let mut chunks = 0u64;
    let mut bytes = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        chunks += 1;
        bytes += chunk.len() as u64;
        if chunks % PROGRESS_EVERY_CHUNKS == 0 {
            info!(url, downloaded_mb = bytes as f64 / BYTES_PER_MB, "Download progress");
        }
    }
    file.flush().await?;
    drop(file);

    fs::rename(&partial, &target).await?;
    info!(path = %target.display(), mb = bytes as f64 / BYTES_PER_MB, "Download complete");
    Ok(target)
}

pub async fn load_type_map(client: &reqwest::Client, config: &IngestConfig) -> Result<TypeMap> {
    let path = download_file(client, &config.type_map_url, &config.data_dir).await?;
    let json = fs::read_to_string(&path).await?;
    let type_map = TypeMap::from_json(&json)?;
    info!(entries = type_map.len(), "Type map loaded");
    Ok(type_map)
}

/// Download the training archive and the type map concurrently.
pub async fn prepare(config: &IngestConfig) -> Result<PreparedDataset> {
    // No total timeout for archive bodies.
    let client = reqwest::Client::builder()
        .connect_timeout(config.fetch_timeout)
        .build()?;

    let archive_url = config.training_archive_url();
    let (archive, type_map) = tokio::try_join!(
        download_file(&client, &archive_url, &config.data_dir),
        load_type_map(&client, config),
    )?;

    Ok(PreparedDataset {
        archive,
        type_map: Arc::new(type_map),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetSize;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.test/release/MINDsmall_train.zip").unwrap(),
            "MINDsmall_train.zip"
        );
        assert_eq!(
            file_name_from_url("https://example.test/crawler/doc_type.json?raw=1").unwrap(),
            "doc_type.json"
        );
        assert!(file_name_from_url("https://example.test/").is_err());
        assert!(file_name_from_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_existing_file_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MINDsmall_train.zip"), b"local").unwrap();

        // Unroutable host: any request would fail
        let client = reqwest::Client::new();
        let path = download_file(&client, "http://127.0.0.1:1/MINDsmall_train.zip", dir.path())
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("MINDsmall_train.zip"));
        assert_eq!(std::fs::read(path).unwrap(), b"local");
    }

    #[tokio::test]
    async fn test_prepare_uses_local_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MINDsmall_train.zip"), b"zip").unwrap();
        std::fs::write(dir.path().join("doc_type.json"), r#"{"AA1": "ar"}"#).unwrap();

        let mut config = IngestConfig::new(DatasetSize::Small);
        config.data_dir = dir.path().to_path_buf();
        config.base_url = "http://127.0.0.1:1/release".into();
        config.type_map_url = "http://127.0.0.1:1/doc_type.json".into();

        let prepared = prepare(&config).await.unwrap();
        assert_eq!(prepared.archive, dir.path().join("MINDsmall_train.zip"));
        assert_eq!(prepared.type_map.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_download_fails() {
        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let result = download_file(&client, "http://127.0.0.1:1/missing.zip", dir.path()).await;
        assert!(matches!(result, Err(IngestError::Http(_))));
        assert!(!dir.path().join("missing.zip").exists());
    }
}
