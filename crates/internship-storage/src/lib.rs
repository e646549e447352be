//! External collaborators for the internship finder: the JSON HTTP client and
//! the durable key-value store used for filter and preset persistence.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

pub use reqwest::Method;

pub const CRATE_NAME: &str = "internship-storage";

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:3000/api".to_string(),
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

/// Envelope returned by every [`ApiClient`] call. Transport and decoding
/// failures are folded into `is_error` instead of being raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub is_error: bool,
    pub data: JsonValue,
}

impl ApiResponse {
    fn ok(data: JsonValue) -> Self {
        Self { is_error: false, data }
    }

    fn error(data: JsonValue) -> Self {
        Self { is_error: true, data }
    }

    /// Best-effort human message for an error envelope.
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(JsonValue::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn get(&self, path: &str) -> ApiResponse {
        self.request(Method::GET, path, &RequestOptions::default(), None)
            .await
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: &RequestOptions,
        body: Option<&JsonValue>,
    ) -> ApiResponse {
        let url = self.url_for(path);
        let span = info_span!("http_request", method = method.as_str(), url = url.as_str());
        self.send(method, url, options, body).instrument(span).await
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        options: &RequestOptions,
        body: Option<&JsonValue>,
    ) -> ApiResponse {
        let mut builder = self
            .client
            .request(method, &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if !options.params.is_empty() {
            builder = builder.query(&options.params);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(error = %err, "request failed before a response arrived");
                return ApiResponse::error(json!({ "message": err.to_string() }));
            }
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(err) => {
                warn!(%status, error = %err, "reading response body failed");
                return ApiResponse::error(json!({ "message": err.to_string() }));
            }
        };

        if status.is_success() {
            if text.trim().is_empty() {
                return ApiResponse::ok(JsonValue::Null);
            }
            return match serde_json::from_str(&text) {
                Ok(data) => {
                    debug!(%status, bytes = text.len(), "request succeeded");
                    ApiResponse::ok(data)
                }
                Err(err) => ApiResponse::error(json!({
                    "message": format!("invalid JSON response: {err}"),
                })),
            };
        }

        warn!(%status, "request returned an error status");
        let data = serde_json::from_str(&text).unwrap_or_else(|_| {
            let message = if text.trim().is_empty() {
                format!("http status {}", status.as_u16())
            } else {
                text
            };
            json!({ "message": message })
        });
        ApiResponse::error(data)
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
    #[error("storage io failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Synchronous string key-value store with get/set/remove semantics.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// One file per key under `root`, written via temp file + rename so readers
/// never observe a half-written value.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        std::fs::create_dir_all(&self.root).map_err(|source| StorageError::Io {
            path: self.root.clone(),
            source,
        })?;

        let path = self.path_for(key);
        let temp_path = self
            .root
            .join(format!(".{key}.{}.tmp", Uuid::new_v4()));
        std::fs::write(&temp_path, value).map_err(|source| StorageError::Io {
            path: temp_path.clone(),
            source,
        })?;

        if let Err(source) = std::fs::rename(&temp_path, &path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StorageError::Io { path, source });
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.entries().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    async fn respond_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let _ = tx.send(request.lines().next().unwrap_or_default().to_string());
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        (format!("http://{addr}/api"), rx)
    }

    fn client(base_url: String) -> ApiClient {
        ApiClient::new(HttpClientConfig {
            base_url,
            timeout: Duration::from_secs(5),
            user_agent: Some("internship-finder-test".into()),
        })
        .unwrap()
    }

    #[test]
    fn url_for_joins_without_double_slashes() {
        let api = client("https://example.test/api/".into());
        assert_eq!(api.url_for("/internships"), "https://example.test/api/internships");
        assert_eq!(api.url_for("filters/profiles"), "https://example.test/api/filters/profiles");
        assert_eq!(api.url_for("https://other.test/x"), "https://other.test/x");
    }

    #[tokio::test]
    async fn success_response_is_wrapped_without_error_flag() {
        let (base, request_line) = respond_once("200 OK", r#"{"data":{"internship_ids":[]}}"#).await;
        let api = client(base);
        let options = RequestOptions {
            params: vec![("page".into(), "2".into())],
            headers: vec![],
        };
        let resp = api.request(Method::GET, "internships", &options, None).await;
        assert!(!resp.is_error);
        assert_eq!(resp.data["data"]["internship_ids"], json!([]));
        let line = request_line.await.unwrap();
        assert!(line.starts_with("GET /api/internships?page=2 "), "{line}");
    }

    #[tokio::test]
    async fn error_status_folds_body_into_envelope() {
        let (base, _rx) = respond_once("500 Internal Server Error", r#"{"message":"boom"}"#).await;
        let resp = client(base).get("internships").await;
        assert!(resp.is_error);
        assert_eq!(resp.message(), Some("boom"));
    }

    #[tokio::test]
    async fn transport_failure_never_raises() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let resp = client(format!("http://{addr}")).get("internships").await;
        assert!(resp.is_error);
        assert!(resp.message().is_some());
    }

    #[test]
    fn file_store_round_trips_and_overwrites() {
        let dir = tempdir().expect("tempdir");
        let store = FileKeyValueStore::new(dir.path().join("prefs"));
        assert_eq!(store.get("internshipFilters").unwrap(), None);

        store.set("internshipFilters", r#"{"profile":[]}"#).unwrap();
        store.set("internshipFilters", r#"{"profile":["HR"]}"#).unwrap();
        assert_eq!(
            store.get("internshipFilters").unwrap().as_deref(),
            Some(r#"{"profile":["HR"]}"#)
        );

        let leftovers = std::fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);

        store.remove("internshipFilters").unwrap();
        store.remove("internshipFilters").unwrap();
        assert_eq!(store.get("internshipFilters").unwrap(), None);
    }

    #[test]
    fn keys_with_path_characters_are_rejected() {
        let dir = tempdir().expect("tempdir");
        let store = FileKeyValueStore::new(dir.path());
        assert!(matches!(store.set("../escape", "x"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(MemoryKeyValueStore::new().get(""), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn memory_store_get_set_remove() {
        let store = MemoryKeyValueStore::new();
        store.set("userPreferences", "[]").unwrap();
        assert_eq!(store.get("userPreferences").unwrap().as_deref(), Some("[]"));
        store.remove("userPreferences").unwrap();
        assert_eq!(store.get("userPreferences").unwrap(), None);
    }
}
