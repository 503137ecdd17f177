use std::time::Instant;

use anyhow::{Context, Result};
use serde::Deserialize;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::debug;

/// Source of raw SERP markup. One call per URL, no retries.
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    /// Plain HTTP GET
    Http,
    /// Rendered through spider.cloud (needs SPIDER_API_KEY)
    Spider,
}

/// Plain HTTP GET.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let start = Instant::now();
        let html = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?
            .error_for_status()
            .with_context(|| format!("Failed to fetch {}", url))?
            .text()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;
        debug!("Fetched {} bytes from {} in {}ms", html.len(), url, start.elapsed().as_millis());
        Ok(html)
    }
}

/// Page rendered by spider.cloud, returned as raw HTML.
pub struct SpiderFetcher {
    spider: Spider,
}

impl SpiderFetcher {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SPIDER_API_KEY")
            .map_err(|_| anyhow::anyhow!("SPIDER_API_KEY environment variable must be set"))?;
        let spider = Spider::new(Some(api_key))
            .map_err(|e| anyhow::anyhow!("Failed to create Spider client: {}", e))?;
        Ok(Self { spider })
    }
}

impl PageFetcher for SpiderFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let start = Instant::now();
        let response = self
            .spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| anyhow::anyhow!("Spider scrape failed for {}: {}", url, e))?;

        let html = content_from_response(response)
            .ok_or_else(|| anyhow::anyhow!("No content in spider response for {}", url))?;
        debug!("Rendered {} in {}ms", url, start.elapsed().as_millis());
        Ok(html)
    }
}

/// Pull `[0].content` out of a spider.cloud response, which may arrive
/// either as JSON or as a JSON-encoded string.
fn content_from_response(response: serde_json::Value) -> Option<String> {
    let parsed: serde_json::Value = match response.as_str() {
        Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
        None => response,
    };
    parsed
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|obj| obj.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
}

/// Fetcher chosen at startup.
pub enum Fetcher {
    Http(HttpFetcher),
    Spider(SpiderFetcher),
}

impl Fetcher {
    pub fn new(kind: FetcherKind, user_agent: &str) -> Result<Self> {
        Ok(match kind {
            FetcherKind::Http => Fetcher::Http(HttpFetcher::new(user_agent)?),
            FetcherKind::Spider => Fetcher::Spider(SpiderFetcher::from_env()?),
        })
    }
}

impl PageFetcher for Fetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        match self {
            Fetcher::Http(f) => f.fetch(url).await,
            Fetcher::Spider(f) => f.fetch(url).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spider_content_from_array() {
        let v = json!([{ "content": "<html></html>", "status": 200 }]);
        assert_eq!(content_from_response(v).as_deref(), Some("<html></html>"));
    }

    #[test]
    fn spider_content_from_encoded_string() {
        let v = json!(r#"[{"content":"<p>hi</p>"}]"#);
        assert_eq!(content_from_response(v).as_deref(), Some("<p>hi</p>"));
    }

    #[test]
    fn spider_without_content() {
        assert_eq!(content_from_response(json!([{ "status": 500 }])), None);
        assert_eq!(content_from_response(json!({})), None);
    }

    #[tokio::test]
    async fn http_refused_names_url() {
        // Grab a free port, then close it so the connect is refused.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = format!("http://127.0.0.1:{}/jobs?q=a", port);

        let err = HttpFetcher::new("test").unwrap().fetch(&url).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Failed to fetch {}", url));
    }

    #[tokio::test]
    async fn http_error_status_names_url() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/jobs?q=a", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            sock.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let err = HttpFetcher::new("test").unwrap().fetch(&url).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Failed to fetch {}", url));
        assert!(format!("{:#}", err).contains("404"));
    }
}
