//! HTTP access to the media server.
//!
//! A thin client over `reqwest`: URL joining against the server base, the
//! `MediaBrowser` authorization header, and GET with retry for idempotent
//! API calls.

mod client;
mod http;

pub use client::{ApiClient, DeviceInfo, HttpStatusError};

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use http::RetryPolicy;

/// Plain resource fetch, the way a page fetches a URL.
#[async_trait]
pub trait TextFetcher: Send + Sync {
    async fn fetch_text(&self, url: &Url) -> Result<String>;
}

/// One attempt, no retry: a failed fetch is reported right away and the
/// caller falls back to what it already has.
#[async_trait]
impl TextFetcher for ApiClient {
    async fn fetch_text(&self, url: &Url) -> Result<String> {
        self.get_text_with(url, None, RetryPolicy::none()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local server answering every request with `status_line`.
    async fn serve_status(status_line: &'static str) -> (Url, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status_line
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, hits)
    }

    #[tokio::test]
    async fn test_fetch_text_does_not_retry_unavailable_server() {
        let (base, hits) = serve_status("503 Service Unavailable").await;
        let client = ApiClient::new(DeviceInfo::new("test-host", "device-1")).unwrap();
        let url = ApiClient::build_url(&base, "Branding/Css").unwrap();

        let started = Instant::now();
        let err = client.fetch_text(&url).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            err.downcast_ref::<HttpStatusError>().map(|e| e.status),
            Some(StatusCode::SERVICE_UNAVAILABLE)
        );
    }

    #[tokio::test]
    async fn test_fetch_text_returns_body() {
        let (base, hits) = serve_status("200 OK").await;
        let client = ApiClient::new(DeviceInfo::new("test-host", "device-1")).unwrap();

        // empty body
        assert_eq!(client.fetch_text(&base).await.unwrap(), "");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
