//! Source fetcher: retrieves raw feed text from a URL or a local path.
//!
//! Deliberately retry-free — retry policy belongs to the scheduling layer,
//! not the transport. Every network call carries a bounded timeout.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;

use crate::error::FetchError;

/// Cache-validation signals captured from a lightweight HEAD probe,
/// used by the scheduling gate's change detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSignature {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_length: Option<u64>,
}

/// HTTP/file client for feed sources.
///
/// A source beginning with `http://` or `https://` is fetched with a GET
/// bounded by the feed timeout; anything else is read from the filesystem
/// as UTF-8. Probes and image downloads use the shorter probe timeout.
pub struct FeedClient {
    client: Client,
    fetch_timeout: Duration,
    probe_timeout: Duration,
}

impl FeedClient {
    /// Creates a `FeedClient` with the given timeouts and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        fetch_timeout_secs: u64,
        probe_timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            probe_timeout: Duration::from_secs(probe_timeout_secs),
        })
    }

    /// Fetch the full feed text from a URL or local path.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Http`] — network failure or timeout.
    /// - [`FetchError::UnexpectedStatus`] — any non-2xx response.
    /// - [`FetchError::Io`] — filesystem source could not be read.
    pub async fn fetch(&self, source: &str) -> Result<String, FetchError> {
        if is_url(source) {
            self.fetch_url(source).await
        } else {
            tokio::fs::read_to_string(Path::new(source))
                .await
                .map_err(|e| FetchError::Io {
                    path: source.to_string(),
                    source: e,
                })
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            source: e,
        })
    }

    /// Issue a HEAD request and capture the feed's cache validators.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Http`] — network failure or timeout.
    /// - [`FetchError::UnexpectedStatus`] — any non-2xx response.
    pub async fn probe(&self, url: &str) -> Result<FeedSignature, FetchError> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };

        Ok(FeedSignature {
            etag: header(reqwest::header::ETAG),
            last_modified: header(reqwest::header::LAST_MODIFIED),
            content_length: response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok()),
        })
    }

    /// Download raw image bytes for the item-image side effect.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Http`] — network failure or timeout.
    /// - [`FetchError::UnexpectedStatus`] — any non-2xx response.
    pub async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client() -> FeedClient {
        FeedClient::new(5, 5, "feedsync-test/0.1").unwrap()
    }

    #[tokio::test]
    async fn fetch_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<SHOP/>"))
            .mount(&server)
            .await;

        let body = client()
            .fetch(&format!("{}/feed.xml", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<SHOP/>");
    }

    #[tokio::test]
    async fn fetch_maps_non_2xx_to_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client()
            .fetch(&format!("{}/feed.xml", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::UnexpectedStatus { status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn fetch_reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<SHOP><SHOPITEM/></SHOP>").unwrap();

        let body = client().fetch(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(body, "<SHOP><SHOPITEM/></SHOP>");
    }

    #[tokio::test]
    async fn fetch_missing_file_is_io_error() {
        let err = client()
            .fetch("/nonexistent/feedsync/feed.xml")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[tokio::test]
    async fn probe_captures_cache_validators() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"abc123\"")
                    .insert_header("Last-Modified", "Wed, 01 Jan 2025 00:00:00 GMT")
                    .insert_header("Content-Length", "4096"),
            )
            .mount(&server)
            .await;

        let signature = client()
            .probe(&format!("{}/feed.xml", server.uri()))
            .await
            .unwrap();
        assert_eq!(signature.etag.as_deref(), Some("\"abc123\""));
        assert_eq!(
            signature.last_modified.as_deref(),
            Some("Wed, 01 Jan 2025 00:00:00 GMT")
        );
        assert_eq!(signature.content_length, Some(4096));
    }

    #[tokio::test]
    async fn fetch_image_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/tea.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .mount(&server)
            .await;

        let bytes = client()
            .fetch_image(&format!("{}/img/tea.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF]);
    }
}
