//! Artifact download

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::response::check_status;

/// Bytes of a fetched artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Media>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpMediaFetcher {
    client: Client,
}

impl HttpMediaFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Media> {
        let response = check_status(self.client.get(url).send().await?).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();

        Ok(Media {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_fetch_reads_body_and_content_type() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/out.mp3")
            .with_status(200)
            .with_header("content-type", "audio/mpeg")
            .with_body(vec![1u8, 2, 3])
            .create_async()
            .await;

        let media = HttpMediaFetcher::new()
            .fetch(&format!("{}/out.mp3", server.url()))
            .await
            .unwrap();

        assert_eq!(media.bytes, vec![1, 2, 3]);
        assert_eq!(media.content_type.as_deref(), Some("audio/mpeg"));
    }

    #[tokio::test]
    async fn test_fetch_missing_artifact() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone.mp4")
            .with_status(404)
            .create_async()
            .await;

        let err = HttpMediaFetcher::new()
            .fetch(&format!("{}/gone.mp4", server.url()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
