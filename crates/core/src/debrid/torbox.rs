//! TorBox debrid provider implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::TorboxConfig;

use super::{
    CachedTorrent, DebridError, DebridFile, DebridProvider, DebridTorrentInfo,
    DebridTorrentStatus, TorrentId,
};

/// Debrid provider backed by the TorBox API.
pub struct TorBoxDebrid {
    client: Client,
    config: TorboxConfig,
}

impl TorBoxDebrid {
    pub fn new(config: TorboxConfig) -> Result<Self, DebridError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| DebridError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn check_cached_url(&self, infohashes: &[String]) -> String {
        let joined = infohashes
            .iter()
            .map(|h| h.to_lowercase())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}?hash={}&format=object&list_files=true",
            self.endpoint("torrents/checkcached"),
            urlencoding::encode(&joined)
        )
    }

    /// Send a request and unwrap the `{success, data}` envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, DebridError> {
        let response = request
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DebridError::Timeout
                } else if e.is_connect() {
                    DebridError::ConnectionFailed(e.to_string())
                } else {
                    DebridError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DebridError::AuthenticationFailed(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DebridError::ApiError(format!("Failed to read response: {}", e)))?;

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                DebridError::ApiError(format!("Failed to parse response: {}", e))
            } else {
                DebridError::ApiError(format!(
                    "HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ))
            }
        })?;
        envelope.into_result(status)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_result(self, status: StatusCode) -> Result<Option<T>, DebridError> {
        if self.success && status.is_success() {
            return Ok(self.data);
        }
        let message = match (self.error, self.detail) {
            (Some(error), Some(detail)) => format!("{}: {}", error, detail),
            (Some(message), None) | (None, Some(message)) => message,
            (None, None) => format!("HTTP {}", status),
        };
        Err(DebridError::ApiError(message))
    }
}

#[derive(Debug, Deserialize)]
struct TbFile {
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
}

impl From<TbFile> for DebridFile {
    fn from(file: TbFile) -> Self {
        DebridFile::new(file.name, file.size)
    }
}

#[derive(Debug, Deserialize)]
struct TbCached {
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    hash: String,
    #[serde(default)]
    files: Vec<TbFile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CachedData {
    Map(HashMap<String, TbCached>),
    List(Vec<TbCached>),
}

impl CachedData {
    fn into_torrents(self) -> HashMap<String, CachedTorrent> {
        let entries: Vec<(String, TbCached)> = match self {
            CachedData::Map(map) => map.into_iter().collect(),
            CachedData::List(list) => list.into_iter().map(|c| (c.hash.clone(), c)).collect(),
        };
        entries
            .into_iter()
            .map(|(key, cached)| {
                let infohash = if cached.hash.is_empty() {
                    key.to_lowercase()
                } else {
                    cached.hash.to_lowercase()
                };
                let torrent = CachedTorrent {
                    infohash: infohash.clone(),
                    name: cached.name,
                    size: cached.size,
                    files: cached.files.into_iter().map(DebridFile::from).collect(),
                };
                (infohash, torrent)
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct TbCreated {
    torrent_id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TbTorrent {
    id: serde_json::Value,
    #[serde(default)]
    hash: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    download_state: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    files: Vec<TbFile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TorrentData {
    One(TbTorrent),
    Many(Vec<TbTorrent>),
}

fn id_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_status(state: &str) -> DebridTorrentStatus {
    let state = state.to_lowercase();
    if ["cached", "completed", "uploading", "seeding"]
        .iter()
        .any(|s| state.contains(s))
    {
        DebridTorrentStatus::Completed
    } else if ["downloading", "metadl", "stalled", "checking"]
        .iter()
        .any(|s| state.contains(s))
    {
        DebridTorrentStatus::Downloading
    } else if state.contains("queued") || state.contains("paused") {
        DebridTorrentStatus::Queued
    } else if state.contains("error") || state.contains("failed") {
        DebridTorrentStatus::Failed
    } else {
        DebridTorrentStatus::Unknown
    }
}

impl From<TbTorrent> for DebridTorrentInfo {
    fn from(torrent: TbTorrent) -> Self {
        DebridTorrentInfo {
            id: TorrentId::new(id_string(&torrent.id)),
            infohash: torrent.hash.to_lowercase(),
            name: torrent.name,
            size: torrent.size,
            status: parse_status(&torrent.download_state),
            progress: torrent.progress,
            files: torrent.files.into_iter().map(DebridFile::from).collect(),
        }
    }
}

#[async_trait]
impl DebridProvider for TorBoxDebrid {
    fn name(&self) -> &str {
        "torbox"
    }

    async fn check_cached(
        &self,
        infohashes: &[String],
    ) -> Result<HashMap<String, CachedTorrent>, DebridError> {
        if infohashes.is_empty() {
            return Ok(HashMap::new());
        }
        let url = self.check_cached_url(infohashes);
        debug!(hashes = infohashes.len(), "Checking TorBox cache");

        let data: Option<CachedData> = self.send(self.client.get(&url)).await?;
        Ok(data.map(CachedData::into_torrents).unwrap_or_default())
    }

    async fn add_torrent(&self, infohash: &str) -> Result<TorrentId, DebridError> {
        let magnet = format!("magnet:?xt=urn:btih:{}&dn=&tr=", infohash);
        let form = reqwest::multipart::Form::new()
            .text("magnet", magnet)
            .text("seed", "1")
            .text("allow_zip", "false");

        let created: Option<TbCreated> = self
            .send(self.client.post(self.endpoint("torrents/createtorrent")).multipart(form))
            .await?;
        let created = created
            .ok_or_else(|| DebridError::ApiError("createtorrent returned no data".to_string()))?;

        let id = TorrentId::new(id_string(&created.torrent_id));
        debug!(infohash = %infohash, torrent_id = %id, "Added torrent to TorBox");
        Ok(id)
    }

    async fn get_torrent_info(&self, id: &TorrentId) -> Result<DebridTorrentInfo, DebridError> {
        let url = format!(
            "{}?id={}&bypass_cache=true",
            self.endpoint("torrents/mylist"),
            urlencoding::encode(&id.0)
        );
        let data: Option<TorrentData> = self.send(self.client.get(&url)).await?;

        let torrent = match data {
            Some(TorrentData::One(torrent)) => Some(torrent),
            Some(TorrentData::Many(list)) => list.into_iter().find(|t| id_string(&t.id) == id.0),
            None => None,
        };
        torrent
            .map(DebridTorrentInfo::from)
            .ok_or_else(|| DebridError::TorrentNotFound(id.to_string()))
    }

    async fn delete_torrent(&self, id: &TorrentId) -> Result<(), DebridError> {
        let torrent_id = id
            .0
            .parse::<u64>()
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::String(id.0.clone()));
        let body = serde_json::json!({
            "torrent_id": torrent_id,
            "operation": "delete",
        });

        let _: Option<serde_json::Value> = self
            .send(self.client.post(self.endpoint("torrents/controltorrent")).json(&body))
            .await?;
        debug!(torrent_id = %id, "Deleted torrent from TorBox");
        Ok(())
    }
}
