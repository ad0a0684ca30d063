//! Where poll cycles get their answer from.
//!
//! The poller only sees the `StatusSource` trait. `HttpSource` is the
//! production implementation; tests plug in scripted sources.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

use crate::error::PollError;

/// One fetch of the status resource.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Human-readable target, for log lines.
    fn describe(&self) -> String;

    /// Fetch and decode the current status document.
    async fn fetch(&self) -> Result<Value, PollError>;
}

/// Unauthenticated `GET` of a JSON endpoint.
pub struct HttpSource {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpSource {
    /// Resolve `path` against `base_url` and build a client that gives up
    /// after `timeout`.
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("Invalid base URL: {}", base_url))?;
        let url = base
            .join(path)
            .with_context(|| format!("Cannot resolve path {} against {}", path, base))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, url, timeout })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> PollError {
        if err.is_timeout() {
            PollError::Timeout(self.timeout)
        } else {
            PollError::Transport(err)
        }
    }
}

#[async_trait]
impl StatusSource for HttpSource {
    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn fetch(&self) -> Result<Value, PollError> {
        let resp = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }

        let body = resp.bytes().await.map_err(|e| self.classify(e))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use std::net::SocketAddr;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn test_router() -> Router {
        Router::new()
            .route("/interface/state", get(|| async { Json(json!({"status": "green"})) }))
            .route(
                "/broken",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance") }),
            )
            .route("/garbage", get(|| async { "<html>not json</html>" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Json(json!({"status": "late"}))
                }),
            )
    }

    #[test]
    fn test_path_resolves_against_base() {
        let src = HttpSource::new(
            "http://127.0.0.1:8080/ignored/",
            "/interface/state",
            Duration::from_millis(250),
        )
        .unwrap();
        assert_eq!(src.url().as_str(), "http://127.0.0.1:8080/interface/state");
        assert_eq!(src.describe(), "http://127.0.0.1:8080/interface/state");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpSource::new("not a url", "/interface/state", Duration::from_millis(250));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_json_payload() {
        let addr = serve(test_router()).await;
        let src = HttpSource::new(
            &format!("http://{}", addr),
            "/interface/state",
            Duration::from_millis(250),
        )
        .unwrap();

        let payload = src.fetch().await.unwrap();
        assert_eq!(payload, json!({"status": "green"}));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let addr = serve(test_router()).await;
        let src = HttpSource::new(
            &format!("http://{}", addr),
            "/broken",
            Duration::from_millis(250),
        )
        .unwrap();

        match src.fetch().await {
            Err(PollError::Status(code)) => assert_eq!(code, 503),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let addr = serve(test_router()).await;
        let src = HttpSource::new(
            &format!("http://{}", addr),
            "/garbage",
            Duration::from_millis(250),
        )
        .unwrap();

        let err = src.fetch().await.unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let addr = serve(test_router()).await;
        let src = HttpSource::new(&format!("http://{}", addr), "/slow", Duration::from_millis(100))
            .unwrap();

        let err = src.fetch().await.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Grab a free port, then close it so nothing is listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let src = HttpSource::new(
            &format!("http://{}", addr),
            "/interface/state",
            Duration::from_millis(250),
        )
        .unwrap();

        let err = src.fetch().await.unwrap_err();
        assert_eq!(err.kind(), "transport");
    }
}
