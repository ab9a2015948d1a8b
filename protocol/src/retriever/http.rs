//! [`LedgerIndex`] over the ledger node's web API.
//!
//! ```text
//! GET {base}/api/Mempool/GetTransaction/{id}
//! GET {base}/api/Mempool/GetTransactionsByPublickey/{publicKey}
//! GET {base}/api/Ledger/GetBlock/{reference}
//! ```
//!
//! All three answer JSON. A 404 means "no such thing" and maps to an empty
//! result. Caller-supplied ids and references are percent-encoded as single
//! path segments and can never change the endpoint.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::ledger::{BlockHeader, LedgerError, LedgerIndex, LedgerRecord};
use crate::crypto::StampPublicKey;

#[derive(Debug, Clone)]
pub struct HttpLedgerIndex {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpLedgerIndex {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let raw = base_url.into();
        let base_url = Url::parse(raw.trim())
            .map_err(|e| LedgerError::Http(format!("invalid ledger URL '{raw}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(LedgerError::Http(format!("invalid ledger URL '{raw}'")));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Http(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base_url` with `segments` appended, each encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, LedgerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LedgerError::Http(format!("invalid ledger URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<Option<T>, LedgerError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "querying ledger index");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| LedgerError::Http(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| LedgerError::Decode(e.to_string())),
            status => Err(LedgerError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

#[async_trait]
impl LedgerIndex for HttpLedgerIndex {
    async fn transactions_by_id(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        let segments = ["api", "Mempool", "GetTransaction", transaction_id];
        Ok(self.get_json(&segments).await?.unwrap_or_default())
    }

    async fn transactions_by_public_key(
        &self,
        public_key: &StampPublicKey,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        let key = public_key.to_base32();
        let segments = ["api", "Mempool", "GetTransactionsByPublickey", key.as_str()];
        Ok(self.get_json(&segments).await?.unwrap_or_default())
    }

    async fn block_header(&self, reference: &str) -> Result<Option<BlockHeader>, LedgerError> {
        self.get_json(&["api", "Ledger", "GetBlock", reference]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one canned HTTP response and returns the request line.
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let text = String::from_utf8_lossy(&request).to_string();
            text.lines().next().unwrap_or_default().to_string()
        });
        (base, handle)
    }

    #[tokio::test]
    async fn test_not_found_is_empty() {
        let (base, server) = one_shot_server("404 Not Found", "").await;
        let index = HttpLedgerIndex::new(base, Duration::from_secs(5)).unwrap();
        let records = index.transactions_by_id("ABC").await.unwrap();
        assert!(records.is_empty());
        assert_eq!(
            server.await.unwrap(),
            "GET /api/Mempool/GetTransaction/ABC HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_block_header_decodes() {
        let (base, server) =
            one_shot_server("200 OK", r#"{"reference":"B1","timestamp":1700000000000}"#).await;
        let index = HttpLedgerIndex::new(format!("{base}/"), Duration::from_secs(5)).unwrap();
        let header = index.block_header("B1").await.unwrap().unwrap();
        assert_eq!(header.timestamp, 1_700_000_000_000);
        assert_eq!(server.await.unwrap(), "GET /api/Ledger/GetBlock/B1 HTTP/1.1");
    }

    #[tokio::test]
    async fn test_server_error_is_status() {
        let (base, _server) = one_shot_server("500 Internal Server Error", "").await;
        let index = HttpLedgerIndex::new(base, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            index.block_header("B1").await,
            Err(LedgerError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_garbage_body_is_decode_error() {
        let (base, _server) = one_shot_server("200 OK", "not json").await;
        let index = HttpLedgerIndex::new(base, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            index.transactions_by_id("X").await,
            Err(LedgerError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_base_path_is_kept() {
        let (base, server) = one_shot_server("404 Not Found", "").await;
        let index = HttpLedgerIndex::new(format!("{base}/ledger/"), Duration::from_secs(5)).unwrap();
        index.block_header("B1").await.unwrap();
        assert_eq!(
            server.await.unwrap(),
            "GET /ledger/api/Ledger/GetBlock/B1 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_id_cannot_escape_its_path_segment() {
        let (base, server) = one_shot_server("404 Not Found", "").await;
        let index = HttpLedgerIndex::new(base, Duration::from_secs(5)).unwrap();
        index
            .transactions_by_id("../../LEDGER/GETBLOCK/B1?X=1")
            .await
            .unwrap();

        let line = server.await.unwrap();
        assert!(line.starts_with("GET /api/Mempool/GetTransaction/"), "{line}");
        assert!(line.contains("%2F"), "{line}");
        assert!(!line.contains('?'), "{line}");
        assert!(!line.contains("/LEDGER/"), "{line}");
    }

    #[tokio::test]
    async fn test_block_reference_cannot_escape_its_path_segment() {
        let (base, server) = one_shot_server("404 Not Found", "").await;
        let index = HttpLedgerIndex::new(base, Duration::from_secs(5)).unwrap();
        index.block_header("B1/../../Mempool/X#frag").await.unwrap();

        let line = server.await.unwrap();
        assert!(line.starts_with("GET /api/Ledger/GetBlock/B1%2F..%2F"), "{line}");
        assert!(!line.contains('#'), "{line}");
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(HttpLedgerIndex::new("not a url", Duration::from_secs(5)).is_err());
        assert!(HttpLedgerIndex::new("mailto:ledger@example.com", Duration::from_secs(5)).is_err());
    }
}
