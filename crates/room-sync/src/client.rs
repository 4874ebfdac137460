//! HTTP client for the rendezvous room API.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use room_core::Members;
use room_core::protocol::{OK_REPLY, ROOM_API_PATH, ROOM_SYNC_HEADER, join_path, room_path};
use tracing::debug;

use crate::error::{Result, SessionError};

/// Client for a rendezvous service.
///
/// Cheaply cloneable; clones share the connection pool.
#[derive(Clone)]
pub struct RendezvousClient {
    base_url: String,
    http: Client,
}

impl RendezvousClient {
    /// Create a client for `host`, either `host:port` or a full `http(s)://` URL.
    pub fn new(host: &str) -> Result<Self> {
        let http = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: base_url_for(host),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        addr: Option<&str>,
    ) -> Result<(StatusCode, String)> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url);
        if let Some(addr) = addr {
            request = request.header(ROOM_SYNC_HEADER, addr);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Create a room. Returns the new room id.
    pub async fn create_room(&self, addr: &str) -> Result<String> {
        let (status, body) = self.request(Method::POST, ROOM_API_PATH, Some(addr)).await?;
        if !status.is_success() {
            return Err(rejected(status, body));
        }
        Ok(body)
    }

    /// Join `room_id` as `peer_id` reachable at `addr`.
    pub async fn join_room(&self, room_id: &str, peer_id: &str, addr: &str) -> Result<()> {
        let (status, body) = self
            .request(Method::POST, &join_path(room_id, peer_id), Some(addr))
            .await?;
        expect_ok(status, body)
    }

    /// Fetch the membership snapshot of `room_id`.
    pub async fn members(&self, room_id: &str) -> Result<Members> {
        let (status, body) = self.request(Method::GET, &room_path(room_id), None).await?;
        if !status.is_success() {
            return Err(rejected(status, body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Tell the room's service that the peer at `addr` published new content.
    pub async fn notify_update(&self, room_id: &str, addr: &str) -> Result<()> {
        let (status, body) = self
            .request(Method::POST, &room_path(room_id), Some(addr))
            .await?;
        expect_ok(status, body)
    }
}

fn base_url_for(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

fn rejected(status: StatusCode, body: String) -> SessionError {
    SessionError::Rejected {
        status: status.as_u16(),
        body,
    }
}

fn expect_ok(status: StatusCode, body: String) -> Result<()> {
    if !status.is_success() {
        return Err(rejected(status, body));
    }
    if body != OK_REPLY {
        return Err(SessionError::UnexpectedReply(body));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_for_host_port() {
        assert_eq!(base_url_for("localhost:3100"), "http://localhost:3100");
    }

    #[test]
    fn test_base_url_keeps_scheme() {
        assert_eq!(base_url_for("https://rooms.example.com/"), "https://rooms.example.com");
        assert_eq!(base_url_for("http://10.0.0.2:3100"), "http://10.0.0.2:3100");
    }

    #[test]
    fn test_expect_ok() {
        assert!(expect_ok(StatusCode::OK, "ok".into()).is_ok());
        assert!(matches!(
            expect_ok(StatusCode::OK, "nope".into()),
            Err(SessionError::UnexpectedReply(body)) if body == "nope"
        ));
        assert!(matches!(
            expect_ok(StatusCode::BAD_REQUEST, "invalid room".into()),
            Err(SessionError::Rejected { status: 400, .. })
        ));
    }
}
