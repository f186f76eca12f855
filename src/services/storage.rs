/*!
 * # Object Storage
 *
 * Thin client for the third-party bucket API that stores uploaded files and
 * images. The backend is a black box behind the [`ObjectStorage`] trait; an
 * in-memory implementation backs the tests.
 */

use crate::config::StorageConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// A stored object's addressable location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Object storage trait for different backends
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write an object and return its public location.
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, ServiceError>;

    /// Remove an object; removing a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), ServiceError>;
}

/// HTTP-backed storage client for a bearer-token authenticated bucket API
pub struct HttpObjectStorage {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: String,
    public_base_url: Option<String>,
}

impl HttpObjectStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
            public_base_url: config
                .public_base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/object/{}/{}", self.endpoint, self.bucket, key)
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, key),
            None => format!("{}/object/public/{}/{}", self.endpoint, self.bucket, key),
        }
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    #[instrument(skip(self, bytes), fields(key = %key, size = bytes.len()))]
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, ServiceError> {
        let response = self
            .client
            .post(self.object_url(key))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ServiceError::StorageError(format!("upload failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ServiceError::StorageError(format!(
                "upload rejected with status {}",
                response.status()
            )));
        }

        debug!(key = %key, "Object stored");
        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key),
        })
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let response = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ServiceError::StorageError(format!("delete failed: {e}")))?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::StorageError(format!(
                "delete rejected with status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// In-memory storage backend for tests
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: Arc<Mutex<HashMap<String, (String, Bytes)>>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, ServiceError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (content_type.to_string(), bytes));
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("memory://{}", key),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Strip path separators and control characters from a client-supplied
/// filename so it is safe inside an object key.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_put_and_delete() {
        let storage = InMemoryObjectStorage::new();
        let stored = storage
            .put("uploads/a/b.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert_eq!(stored.key, "uploads/a/b.png");
        assert!(storage.contains("uploads/a/b.png"));

        storage.delete("uploads/a/b.png").await.unwrap();
        assert!(!storage.contains("uploads/a/b.png"));

        // Deleting a missing object is not an error
        storage.delete("uploads/a/b.png").await.unwrap();
    }

    #[test]
    fn filename_sanitization() {
        assert_eq!(sanitize_filename("report 2024.pdf"), "report_2024.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._.._etc_passwd");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[test]
    fn public_url_prefers_configured_base() {
        let cfg = StorageConfig {
            endpoint: "https://storage.example.com/".into(),
            bucket: "supply-hub".into(),
            token: "t".into(),
            public_base_url: Some("https://cdn.example.com/files/".into()),
            upload_max_bytes: 1024,
        };
        let storage = HttpObjectStorage::new(&cfg);
        assert_eq!(
            storage.public_url("uploads/x.png"),
            "https://cdn.example.com/files/uploads/x.png"
        );

        let cfg = StorageConfig {
            public_base_url: None,
            ..cfg
        };
        let storage = HttpObjectStorage::new(&cfg);
        assert_eq!(
            storage.public_url("uploads/x.png"),
            "https://storage.example.com/object/public/supply-hub/uploads/x.png"
        );
    }
}
