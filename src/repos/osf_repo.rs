//! Repository module for reading the OSF JSON:API.
//!
//! This module pages through preprint collections, follows relationship links and
//! downloads file versions. It carries no business logic: status codes are classified
//! into [`FetchError`] variants and everything else is left to the orchestrator.

use crate::errors::FetchError;
use crate::models::osf::Collection;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

/// One page of a paginated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    pub items: Vec<Value>,
    pub next_cursor: Option<String>,
}

/// Defines the interface for reading a remote preprint source.
#[async_trait]
pub trait SourceRepo: Send + Sync {
    /// Fetches one page of records. The cursor is the URL the previous page pointed to.
    async fn fetch_page(&self, cursor: &str) -> Result<SourcePage, FetchError>;

    /// Fetches any JSON document, typically a relationship link of a record.
    async fn fetch_by_url(&self, url: &str) -> Result<Value, FetchError>;

    /// Downloads a file body.
    async fn download(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// HTTP-based implementation of the SourceRepo trait for the OSF API.
#[derive(Debug, Clone, Default)]
pub struct HTTPOsfRepo {
    pub client: Client,
    pub token: String,
}

impl HTTPOsfRepo {
    pub fn preprints_url(api_base: &str, provider: &str) -> String {
        format!("{api_base}/preprints/?filter[provider]={provider}")
    }

    async fn make_request(&self, url: &str, req: RequestBuilder) -> Result<Response, FetchError> {
        debug!(url, "Requesting OSF resource");
        let resp = req
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|err| FetchError::Transient {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        classify_status(url, resp.status())?;
        Ok(resp)
    }

    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let resp = self.make_request(url, self.client.get(url)).await?;
        resp.json::<Value>().await.map_err(|err| FetchError::Decode {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }
}

fn classify_status(url: &str, status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(FetchError::Transient {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        })
    } else {
        Err(FetchError::Fatal {
            url: url.to_string(),
            status,
        })
    }
}

#[async_trait]
impl SourceRepo for HTTPOsfRepo {
    async fn fetch_page(&self, cursor: &str) -> Result<SourcePage, FetchError> {
        let document = self.get_json(cursor).await?;
        let page: Collection<Value> =
            serde_json::from_value(document).map_err(|err| FetchError::Decode {
                url: cursor.to_string(),
                reason: err.to_string(),
            })?;
        Ok(SourcePage {
            items: page.data,
            next_cursor: page.links.and_then(|links| links.next),
        })
    }

    async fn fetch_by_url(&self, url: &str) -> Result<Value, FetchError> {
        self.get_json(url).await
    }

    async fn download(&self, url: &str) -> Result<Bytes, FetchError> {
        let resp = self.make_request(url, self.client.get(url)).await?;
        resp.bytes().await.map_err(|err| FetchError::Transient {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn repo() -> HTTPOsfRepo {
        HTTPOsfRepo {
            client: Client::new(),
            token: "token-123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_page_follows_next_link() {
        let mut server = Server::new_async().await;
        let next = format!("{}/preprints/?page=2", server.url());
        let body = json!({
            "data": [{"id": "abc12"}, {"id": "def34"}],
            "links": {"next": next}
        });
        let mock = server
            .mock("GET", "/preprints/")
            .match_query(Matcher::UrlEncoded(
                "filter[provider]".to_string(),
                "eartharxiv".to_string(),
            ))
            .match_header("authorization", "Bearer token-123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let url = HTTPOsfRepo::preprints_url(&server.url(), "eartharxiv");
        let page = repo().fetch_page(&url).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_cursor, Some(next));
    }

    #[tokio::test]
    async fn test_last_page_has_no_cursor() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/preprints/")
            .with_status(200)
            .with_body(json!({"data": [], "links": {"next": null}}).to_string())
            .create_async()
            .await;

        let page = repo()
            .fetch_page(&format!("{}/preprints/", server.url()))
            .await
            .unwrap();
        assert_eq!(page.next_cursor, None);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/preprints/")
            .with_status(503)
            .create_async()
            .await;

        let err = repo()
            .fetch_page(&format!("{}/preprints/", server.url()))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/preprints/")
            .with_status(401)
            .create_async()
            .await;

        let err = repo()
            .fetch_page(&format!("{}/preprints/", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Fatal {
                status: StatusCode::UNAUTHORIZED,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_download_returns_bytes() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/download/f1")
            .with_status(200)
            .with_body("%PDF-1.4")
            .create_async()
            .await;

        let bytes = repo()
            .download(&format!("{}/download/f1", server.url()))
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from_static(b"%PDF-1.4"));
    }
}
