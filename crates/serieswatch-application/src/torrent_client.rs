// SPDX-License-Identifier: GPL-3.0-or-later
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serieswatch_config::TransmissionConfig;
use serieswatch_domain::{AddOutcome, PlacementSettings, TorrentJob};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

const SESSION_HEADER: &str = "X-Transmission-Session-Id";
const TORRENT_FIELDS: [&str; 6] = [
    "id",
    "name",
    "addedDate",
    "downloadDir",
    "bandwidthPriority",
    "labels",
];

#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("authentication failed")]
    Authentication,
    #[error("invalid rpc url: {0}")]
    InvalidBaseUrl(String),
    #[error("session handshake failed")]
    SessionHandshake,
    #[error("torrent client responded with status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("rpc call `{method}` failed: {result}")]
    Rpc { method: String, result: String },
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

/// The two torrent client operations the matcher depends on.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    async fn list_jobs(&self) -> Result<Vec<TorrentJob>, TorrentClientError>;

    /// Submit `source` (URL or magnet) with the given placement settings.
    async fn add_job(
        &self,
        source: &str,
        placement: &PlacementSettings,
    ) -> Result<AddOutcome, TorrentClientError>;
}

/// Transmission JSON-RPC client.
pub struct TransmissionClient {
    client: Client,
    rpc_url: Url,
    username: Option<String>,
    password: Option<String>,
    session_id: RwLock<Option<String>>,
}

impl TransmissionClient {
    pub fn new(
        rpc_url: &str,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TorrentClientError> {
        let rpc_url = Url::parse(rpc_url)
            .map_err(|err| TorrentClientError::InvalidBaseUrl(err.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TorrentClientError::Request(err.to_string()))?;

        Ok(Self {
            client,
            rpc_url,
            username: username.filter(|v| !v.is_empty()),
            password,
            session_id: RwLock::new(None),
        })
    }

    pub fn from_config(config: &TransmissionConfig) -> Result<Self, TorrentClientError> {
        Self::new(
            &config.rpc_url(),
            config.username.clone(),
            config.password.clone(),
            config.timeout(),
        )
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    /// Daemon version reported by `session-get`, used as a connectivity check.
    pub async fn session_version(&self) -> Result<Option<String>, TorrentClientError> {
        let session: SessionGetResponse = self
            .call("session-get", SessionGetArguments { fields: ["version"] })
            .await?;
        Ok(session.version)
    }

    async fn call<A, R>(&self, method: &str, arguments: A) -> Result<R, TorrentClientError>
    where
        A: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        let request = RpcRequest { method, arguments };

        let mut response = self.send(&request).await?;
        if response.status() == StatusCode::CONFLICT {
            let session_id = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or(TorrentClientError::SessionHandshake)?;
            debug!(target: "transmission", "refreshing rpc session id");
            *self.session_id.write().await = Some(session_id);

            response = self.send(&request).await?;
            if response.status() == StatusCode::CONFLICT {
                return Err(TorrentClientError::SessionHandshake);
            }
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TorrentClientError::Authentication);
        }

        let body = response
            .text()
            .await
            .map_err(|e| TorrentClientError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(TorrentClientError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: RpcResponse<R> = serde_json::from_str(&body)
            .map_err(|e| TorrentClientError::Deserialization(e.to_string()))?;

        if envelope.result != "success" {
            return Err(TorrentClientError::Rpc {
                method: method.to_string(),
                result: envelope.result,
            });
        }

        envelope.arguments.ok_or_else(|| {
            TorrentClientError::Deserialization(format!("`{method}` response has no arguments"))
        })
    }

    async fn send<A>(&self, request: &RpcRequest<'_, A>) -> Result<Response, TorrentClientError>
    where
        A: Serialize + Send + Sync,
    {
        let mut builder = self.client.post(self.rpc_url.clone()).json(request);

        if let Some(session_id) = self.session_id.read().await.clone() {
            builder = builder.header(SESSION_HEADER, session_id);
        }
        if let Some(username) = self.username.as_deref() {
            builder = builder.basic_auth(username, self.password.as_deref());
        }

        builder
            .send()
            .await
            .map_err(|e| TorrentClientError::Request(e.to_string()))
    }
}

#[async_trait]
impl TorrentClient for TransmissionClient {
    async fn list_jobs(&self) -> Result<Vec<TorrentJob>, TorrentClientError> {
        let response: TorrentGetResponse = self
            .call(
                "torrent-get",
                TorrentGetArguments {
                    fields: TORRENT_FIELDS,
                },
            )
            .await?;

        Ok(response
            .torrents
            .into_iter()
            .map(|torrent| TorrentJob {
                id: torrent.id,
                name: torrent.name,
                added_at: DateTime::<Utc>::from_timestamp(torrent.added_date, 0)
                    .unwrap_or_default(),
                placement: PlacementSettings {
                    download_dir: torrent.download_dir,
                    bandwidth_priority: torrent.bandwidth_priority,
                    labels: torrent.labels,
                },
            })
            .collect())
    }

    async fn add_job(
        &self,
        source: &str,
        placement: &PlacementSettings,
    ) -> Result<AddOutcome, TorrentClientError> {
        let arguments = TorrentAddArguments {
            filename: source,
            download_dir: placement.download_dir.as_deref(),
            bandwidth_priority: placement.bandwidth_priority,
            labels: (!placement.labels.is_empty()).then_some(placement.labels.as_slice()),
        };

        let response: TorrentAddResponse = self.call("torrent-add", arguments).await?;
        if response.duplicate.is_some() {
            Ok(AddOutcome::Duplicate)
        } else {
            Ok(AddOutcome::Added)
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, A> {
    method: &'a str,
    arguments: A,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: String,
    #[serde(default = "Option::default")]
    arguments: Option<R>,
}

#[derive(Debug, Serialize)]
struct SessionGetArguments {
    fields: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct SessionGetResponse {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Serialize)]
struct TorrentGetArguments {
    fields: [&'static str; 6],
}

#[derive(Debug, Deserialize)]
struct TorrentGetResponse {
    #[serde(default)]
    torrents: Vec<TransmissionTorrent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransmissionTorrent {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    added_date: i64,
    #[serde(default)]
    download_dir: Option<String>,
    #[serde(default)]
    bandwidth_priority: Option<i64>,
    #[serde(default)]
    labels: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TorrentAddArguments<'a> {
    filename: &'a str,
    #[serde(rename = "download-dir", skip_serializing_if = "Option::is_none")]
    download_dir: Option<&'a str>,
    #[serde(rename = "bandwidthPriority", skip_serializing_if = "Option::is_none")]
    bandwidth_priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct TorrentAddResponse {
    #[serde(rename = "torrent-added", default)]
    #[allow(dead_code)]
    added: Option<serde_json::Value>,
    #[serde(rename = "torrent-duplicate", default)]
    duplicate: Option<serde_json::Value>,
}
