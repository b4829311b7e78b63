use atlas_shared::models::{DocumentError, MapStore};
use serde::Serialize;
use thiserror::Error;

use crate::config::SiloConfig;
use crate::store::DocumentRemote;

/// Header carrying the write key on save requests.
pub const WRITE_KEY_HEADER: &str = "X-MAN-API";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(u16),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Body of a save request.
#[derive(Debug, Serialize)]
pub struct PersistRequest<'a> {
    pub file_data: &'a MapStore,
}

/// Prefix site-relative URLs with `origin`. Absolute URLs pass through.
pub fn absolute_url(origin: Option<&str>, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    match origin {
        Some(origin) => format!("{}{}", origin.trim_end_matches('/'), url),
        None => url.to_string(),
    }
}

fn resolve(url: &str) -> String {
    let origin = web_sys::window().and_then(|w| w.location().origin().ok());
    absolute_url(origin.as_deref(), url)
}

/// Reads and writes the location document on a JSON silo.
pub struct SiloClient {
    http: reqwest::Client,
    config: SiloConfig,
}

impl SiloClient {
    pub fn new(config: SiloConfig) -> Self {
        SiloClient {
            http: reqwest::Client::new(),
            config,
        }
    }
}

impl DocumentRemote for SiloClient {
    async fn fetch(&self) -> Result<serde_json::Value, RemoteError> {
        let resp = self
            .http
            .get(resolve(&self.config.public_url))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RemoteError::Status(resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }

    async fn persist(&self, document: &MapStore) -> Result<(), RemoteError> {
        let resp = self
            .http
            .patch(resolve(&self.config.manage_url))
            .header(WRITE_KEY_HEADER, self.config.write_key.as_str())
            .json(&PersistRequest {
                file_data: document,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RemoteError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_shared::models::{Location, LngLat, LocationType};

    #[test]
    fn test_persist_request_wraps_document() {
        let store = MapStore::default().with_added(
            "kandarian",
            Location {
                id: "A".to_string(),
                coordinates: LngLat::new(-76.0, 42.0),
                label: "Alpha".to_string(),
                link: String::new(),
                kind: LocationType::Settlement,
            },
        );
        let json = serde_json::to_value(PersistRequest { file_data: &store }).unwrap();
        assert_eq!(json["file_data"][0]["map"], "kandarian");
        assert_eq!(json["file_data"][0]["markers"][0]["id"], "A");
        assert_eq!(json["file_data"][0]["markers"][0]["type"], "settlement");
        assert_eq!(json["file_data"][0]["markers"][0]["coordinates"][0], -76.0);
    }

    #[test]
    fn test_empty_document_is_empty_array() {
        let store = MapStore::default();
        let json = serde_json::to_value(PersistRequest { file_data: &store }).unwrap();
        assert_eq!(json, serde_json::json!({"file_data": []}));
    }

    #[test]
    fn test_absolute_url_joins_origin() {
        assert_eq!(
            absolute_url(Some("http://localhost:8080"), "/api/silo/public/x"),
            "http://localhost:8080/api/silo/public/x"
        );
        assert_eq!(
            absolute_url(Some("https://atlas.example.com/"), "/api/silo/public/x"),
            "https://atlas.example.com/api/silo/public/x"
        );
    }

    #[test]
    fn test_absolute_url_passthrough() {
        assert_eq!(
            absolute_url(Some("http://localhost:8080"), "https://api.jsonsilo.com/public/x"),
            "https://api.jsonsilo.com/public/x"
        );
        assert_eq!(absolute_url(None, "/api/silo"), "/api/silo");
    }

    #[test]
    fn test_remote_error_messages() {
        assert_eq!(RemoteError::Status(401).to_string(), "server answered 401");
        let err: RemoteError = DocumentError::NotASequence.into();
        assert!(!err.to_string().is_empty());
    }
}
